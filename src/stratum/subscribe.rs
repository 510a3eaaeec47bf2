use super::*;

/// `mining.subscribe` params: `[user_agent, session_id?]`. The session
/// id is accepted but a fresh extranonce1 is always assigned.
#[derive(Debug, PartialEq)]
pub struct Subscribe {
    pub user_agent: String,
    pub session_id: Option<String>,
}

impl Serialize for Subscribe {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let len = if self.session_id.is_some() { 2 } else { 1 };
        let mut seq = serializer.serialize_seq(Some(len))?;
        seq.serialize_element(&self.user_agent)?;
        if let Some(session_id) = &self.session_id {
            seq.serialize_element(session_id)?;
        }
        seq.end()
    }
}

impl<'de> Deserialize<'de> for Subscribe {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            One((String,)),
            Two((String, Option<String>)),
            Other(Vec<Value>),
        }

        match Raw::deserialize(deserializer)? {
            Raw::One((user_agent,)) => Ok(Subscribe {
                user_agent,
                session_id: None,
            }),
            Raw::Two((user_agent, session_id)) => Ok(Subscribe {
                user_agent,
                session_id,
            }),
            Raw::Other(params) if params.is_empty() => Ok(Subscribe {
                user_agent: String::new(),
                session_id: None,
            }),
            Raw::Other(_) => Err(de::Error::custom("unexpected subscribe params")),
        }
    }
}

/// Subscribe result: `[[subscriptions], extranonce1, extranonce2_size]`.
#[derive(Debug, PartialEq, Clone)]
pub struct SubscribeResult {
    pub subscriptions: Vec<(String, String)>,
    pub extranonce1: Extranonce,
    pub extranonce2_size: usize,
}

impl Serialize for SubscribeResult {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut seq = serializer.serialize_seq(Some(3))?;
        seq.serialize_element(&self.subscriptions)?;
        seq.serialize_element(&self.extranonce1)?;
        seq.serialize_element(&self.extranonce2_size)?;
        seq.end()
    }
}

impl<'de> Deserialize<'de> for SubscribeResult {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let (subscriptions, extranonce1, extranonce2_size) =
            <(Vec<(String, String)>, Extranonce, usize)>::deserialize(deserializer)?;

        Ok(SubscribeResult {
            subscriptions,
            extranonce1,
            extranonce2_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_user_agent() {
        let parsed: Subscribe = serde_json::from_str(r#"["cpuminer/2.5.1"]"#).unwrap();
        assert_eq!(
            parsed,
            Subscribe {
                user_agent: "cpuminer/2.5.1".into(),
                session_id: None,
            }
        );
    }

    #[test]
    fn user_agent_and_session_id() {
        let parsed: Subscribe = serde_json::from_str(r#"["cgminer/4.10","deadbeef"]"#).unwrap();
        assert_eq!(
            parsed,
            Subscribe {
                user_agent: "cgminer/4.10".into(),
                session_id: Some("deadbeef".into()),
            }
        );
    }

    #[test]
    fn null_session_id_normalizes() {
        let parsed: Subscribe = serde_json::from_str(r#"["ua",null]"#).unwrap();
        assert_eq!(parsed.session_id, None);
    }

    #[test]
    fn empty_params_allowed() {
        let parsed: Subscribe = serde_json::from_str("[]").unwrap();
        assert_eq!(parsed.user_agent, "");
    }

    #[test]
    fn unexpected_params_rejected() {
        assert!(serde_json::from_str::<Subscribe>("[123]").is_err());
    }

    #[test]
    fn result_roundtrip() {
        let result = SubscribeResult {
            subscriptions: vec![
                ("mining.set_difficulty".into(), SUBSCRIPTION_ID.into()),
                ("mining.notify".into(), SUBSCRIPTION_ID.into()),
            ],
            extranonce1: "1f000001".parse().unwrap(),
            extranonce2_size: 4,
        };

        let serialized = serde_json::to_string(&result).unwrap();
        assert_eq!(
            serde_json::from_str::<SubscribeResult>(&serialized).unwrap(),
            result
        );
    }
}
