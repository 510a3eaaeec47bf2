use super::*;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord, Display, Clone)]
#[serde(untagged)]
pub enum Id {
    Null,
    Number(u64),
    String(String),
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(untagged)]
pub enum Message {
    Request {
        id: Id,
        method: String,
        params: Value,
    },
    Response {
        id: Id,
        result: Option<Value>,
        error: Option<JsonRpcError>,
    },
    Notification {
        method: String,
        params: Value,
    },
}

/// Stratum does id: null, which is technically wrong according to the
/// JSON-RPC spec, which states that no id field should be present. This
/// is a work around to allow both cases. If a server sends a notification
/// with an id field other than null it will be classified as a request
/// and should just be ignored by any client.
impl<'de> Deserialize<'de> for Message {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;

        let is_request = value.get("method").is_some() && value.get("id").is_some();

        let is_notification_optional_null_id = value.get("method").is_some()
            && (value.get("id") == Some(&Value::Null) || value.get("id").is_none());

        let is_response = value.get("result").is_some() || value.get("error").is_some();

        if is_response {
            #[derive(Deserialize)]
            struct Resp {
                id: Id,
                result: Option<Value>,
                error: Option<JsonRpcError>,
            }

            let r: Resp = serde_json::from_value(value).map_err(de::Error::custom)?;

            Ok(Message::Response {
                id: r.id,
                result: r.result,
                error: r.error,
            })
        } else if is_notification_optional_null_id {
            let method = value
                .get("method")
                .and_then(Value::as_str)
                .ok_or_else(|| de::Error::missing_field("method"))?
                .to_string();

            let params = value
                .get("params")
                .cloned()
                .ok_or_else(|| de::Error::missing_field("params"))?;

            Ok(Message::Notification { method, params })
        } else if is_request {
            #[derive(Deserialize)]
            struct Req {
                id: Id,
                method: String,
                params: Value,
            }

            let r: Req = serde_json::from_value(value).map_err(de::Error::custom)?;

            Ok(Message::Request {
                id: r.id,
                method: r.method,
                params: r.params,
            })
        } else {
            Err(de::Error::custom("unknown message format"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[track_caller]
    fn case(s: &str, expected: Message) {
        let actual = serde_json::from_str::<Message>(s).unwrap();
        assert_eq!(actual, expected, "deserialize Message from str");

        let serialized = serde_json::to_string(&actual).unwrap();
        let lhs: Value = serde_json::from_str(s).unwrap();
        let rhs: Value = serde_json::from_str(&serialized).unwrap();
        assert_eq!(lhs, rhs, "JSON semantic equality");

        let round_trip = serde_json::from_str::<Message>(&serialized).unwrap();
        assert_eq!(round_trip, expected, "roundtrip");
    }

    #[test]
    fn subscribe_request() {
        case(
            r#"{"id":1,"method":"mining.subscribe","params":["miner/1.0"]}"#,
            Message::Request {
                id: Id::Number(1),
                method: "mining.subscribe".into(),
                params: json!(["miner/1.0"]),
            },
        );
    }

    #[test]
    fn submit_response_true() {
        case(
            r#"{"id":4,"result":true,"error":null}"#,
            Message::Response {
                id: Id::Number(4),
                result: Some(json!(true)),
                error: None,
            },
        );
    }

    #[test]
    fn submit_response_with_error() {
        case(
            r#"{"id":4,"result":null,"error":[26,"Stale job",null]}"#,
            Message::Response {
                id: Id::Number(4),
                result: None,
                error: Some(StratumError::Stale.into_response(None)),
            },
        );
    }

    #[test]
    fn notify_notification_with_null_id() {
        let message =
            serde_json::from_str::<Message>(r#"{"id":null,"method":"mining.notify","params":[]}"#)
                .unwrap();

        assert_eq!(
            message,
            Message::Notification {
                method: "mining.notify".into(),
                params: json!([]),
            }
        );
    }

    #[test]
    fn notification_without_id() {
        case(
            r#"{"method":"mining.set_difficulty","params":[8]}"#,
            Message::Notification {
                method: "mining.set_difficulty".into(),
                params: json!([8]),
            },
        );
    }

    #[test]
    fn string_ids_are_preserved() {
        case(
            r#"{"id":"abc","method":"mining.authorize","params":["user","pass"]}"#,
            Message::Request {
                id: Id::String("abc".into()),
                method: "mining.authorize".into(),
                params: json!(["user", "pass"]),
            },
        );
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(serde_json::from_str::<Message>(r#"{"foo":"bar"}"#).is_err());
    }
}
