use super::*;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SetDifficulty(pub f64);

impl SetDifficulty {
    pub fn difficulty(self) -> f64 {
        self.0
    }
}

impl Serialize for SetDifficulty {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut seq = serializer.serialize_seq(Some(1))?;
        // Whole difficulties go out as integers; most miners choke on
        // "8.0" where they expect "8".
        if self.0.fract() == 0.0 && self.0 >= 1.0 && self.0 <= u64::MAX as f64 {
            seq.serialize_element(&(self.0 as u64))?;
        } else {
            seq.serialize_element(&self.0)?;
        }
        seq.end()
    }
}

impl<'de> Deserialize<'de> for SetDifficulty {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let (difficulty,): (f64,) = Deserialize::deserialize(deserializer)?;

        if !difficulty.is_finite() || difficulty <= 0.0 {
            return Err(de::Error::custom("difficulty must be finite and > 0"));
        }

        Ok(SetDifficulty(difficulty))
    }
}
