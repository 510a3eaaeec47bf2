use super::*;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, DeserializeFromStr, SerializeDisplay,
)]
pub struct Ntime(pub u32);

impl FromStr for Ntime {
    type Err = InternalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let time = ResultExt::context(
            u32::from_str_radix(s, 16),
            ParseHexIntSnafu {
                input: s.to_string(),
            },
        )?;
        Ok(Ntime(time))
    }
}

impl fmt::Display for Ntime {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{:08x}", self.0)
    }
}

impl From<Ntime> for u32 {
    fn from(ntime: Ntime) -> u32 {
        ntime.0
    }
}

impl From<u32> for Ntime {
    fn from(time: u32) -> Ntime {
        Ntime(time)
    }
}

impl TryFrom<u64> for Ntime {
    type Error = Error;

    fn try_from(time: u64) -> Result<Self> {
        Ok(Ntime(Context::context(
            u32::try_from(time),
            "ntime out of u32 range",
        )?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        assert_eq!(Ntime::from(0x504e86b9).to_string(), "504e86b9");
        assert_eq!(
            "504e86b9".parse::<Ntime>().unwrap(),
            Ntime::from(0x504e86b9)
        );
    }

    #[test]
    fn ordering_follows_time() {
        assert!(Ntime::from(100) < Ntime::from(101));
    }

    #[test]
    fn rejects_garbage() {
        assert!("xyz".parse::<Ntime>().is_err());
        assert!("".parse::<Ntime>().is_err());
    }

    #[test]
    fn try_from_u64_guards_overflow() {
        assert!(Ntime::try_from(u64::from(u32::MAX)).is_ok());
        assert!(Ntime::try_from(u64::from(u32::MAX) + 1).is_err());
    }
}
