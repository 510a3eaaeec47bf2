use super::*;

/// `mining.notify` params:
/// `[job_id, prevhash, coinb1, coinb2, merkle_branches, version, nbits, ntime, clean_jobs]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Notify {
    pub work_id: WorkId,
    pub prevhash: PrevHash,
    pub coinb1: String,
    pub coinb2: String,
    pub merkle_branches: Vec<MerkleNode>,
    pub version: Version,
    pub nbits: Nbits,
    pub ntime: Ntime,
    pub clean_jobs: bool,
}

impl Serialize for Notify {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut seq = serializer.serialize_seq(Some(9))?;
        seq.serialize_element(&self.work_id)?;
        seq.serialize_element(&self.prevhash)?;
        seq.serialize_element(&self.coinb1)?;
        seq.serialize_element(&self.coinb2)?;
        seq.serialize_element(&self.merkle_branches)?;
        seq.serialize_element(&self.version)?;
        seq.serialize_element(&self.nbits)?;
        seq.serialize_element(&self.ntime)?;
        seq.serialize_element(&self.clean_jobs)?;
        seq.end()
    }
}

impl<'de> Deserialize<'de> for Notify {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let (work_id, prevhash, coinb1, coinb2, merkle_branches, version, nbits, ntime, clean_jobs) =
            <(
                WorkId,
                PrevHash,
                String,
                String,
                Vec<MerkleNode>,
                Version,
                Nbits,
                Ntime,
                bool,
            )>::deserialize(deserializer)?;

        Ok(Notify {
            work_id,
            prevhash,
            coinb1,
            coinb2,
            merkle_branches,
            version,
            nbits,
            ntime,
            clean_jobs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Notify {
        Notify {
            work_id: WorkId::from(0xbf_u32),
            prevhash: "4d16b6f85af6e2198f44ae2a6de67f78487ae5611b77c6c0440b921e00000000"
                .parse()
                .unwrap(),
            coinb1: "01000000010000000000000000000000000000000000000000000000000000000000000000ffffffff20020862062f503253482f04b8864e5008".into(),
            coinb2: "072f736c7573682f000000000100f2052a010000001976a914d23fcdf86f7e756a64a7a9688ef9903327048ed988ac00000000".into(),
            merkle_branches: Vec::new(),
            version: Version::from(2),
            nbits: "1c2ac4af".parse().unwrap(),
            ntime: "504e86b9".parse().unwrap(),
            clean_jobs: true,
        }
    }

    #[test]
    fn roundtrip() {
        let notify = sample();
        let serialized = serde_json::to_string(&notify).unwrap();
        assert_eq!(serde_json::from_str::<Notify>(&serialized).unwrap(), notify);
    }

    #[test]
    fn serializes_as_nine_element_array() {
        let value = serde_json::to_value(sample()).unwrap();
        let array = value.as_array().unwrap();
        assert_eq!(array.len(), 9);
        assert_eq!(array[0], json!("bf"));
        assert_eq!(array[8], json!(true));
    }

    #[test]
    fn rejects_wrong_arity() {
        assert!(serde_json::from_str::<Notify>(r#"["1f","00"]"#).is_err());
    }
}
