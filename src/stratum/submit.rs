use super::*;

/// `mining.submit` params: `[workername, job_id, extranonce2, ntime, nonce]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Submit {
    pub workername: String,
    pub work_id: WorkId,
    pub extranonce2: Extranonce,
    pub ntime: Ntime,
    pub nonce: Nonce,
}

impl Serialize for Submit {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut seq = serializer.serialize_seq(Some(5))?;
        seq.serialize_element(&self.workername)?;
        seq.serialize_element(&self.work_id)?;
        seq.serialize_element(&self.extranonce2)?;
        seq.serialize_element(&self.ntime)?;
        seq.serialize_element(&self.nonce)?;
        seq.end()
    }
}

impl<'de> Deserialize<'de> for Submit {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let (workername, work_id, extranonce2, ntime, nonce) =
            <(String, WorkId, Extranonce, Ntime, Nonce)>::deserialize(deserializer)?;

        Ok(Submit {
            workername,
            work_id,
            extranonce2,
            ntime,
            nonce,
        })
    }
}
