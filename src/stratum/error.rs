use super::*;

/// Stratum reject codes follow the de-facto convention: 20 other, 21 job
/// not found, 22 duplicate, 23 low difficulty, 24 unauthorized, 25 not
/// subscribed, 26 stale.
#[derive(Debug, Snafu, Clone, Copy, PartialEq, Eq)]
pub enum StratumError {
    #[snafu(display("Other/Unknown"))]
    Other,
    #[snafu(display("Job not found"))]
    JobNotFound,
    #[snafu(display("Duplicate share"))]
    Duplicate,
    #[snafu(display("Low difficulty share"))]
    LowDifficulty,
    #[snafu(display("Unauthorized worker"))]
    Unauthorized,
    #[snafu(display("Not subscribed"))]
    NotSubscribed,
    #[snafu(display("Stale job"))]
    Stale,
}

impl StratumError {
    pub fn code(self) -> i32 {
        match self {
            StratumError::Other => 20,
            StratumError::JobNotFound => 21,
            StratumError::Duplicate => 22,
            StratumError::LowDifficulty => 23,
            StratumError::Unauthorized => 24,
            StratumError::NotSubscribed => 25,
            StratumError::Stale => 26,
        }
    }

    pub fn into_response(self, traceback: Option<Value>) -> JsonRpcError {
        JsonRpcError {
            error_code: self.code(),
            message: self.to_string(),
            traceback,
        }
    }
}

/// Wire errors travel as `[code, message, traceback]` triples.
#[derive(Debug, Deserialize, PartialEq)]
pub struct JsonRpcError {
    pub error_code: i32,
    pub message: String,
    pub traceback: Option<Value>,
}

impl Serialize for JsonRpcError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (&self.error_code, &self.message, &self.traceback).serialize(serializer)
    }
}

impl fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match &self.traceback {
            Some(traceback) => write!(
                f,
                "Stratum error {}: {} (traceback: {})",
                self.error_code,
                self.message,
                serde_json::to_string(traceback).unwrap_or_else(|_| "<invalid traceback>".into())
            ),
            None => write!(f, "Stratum error {}: {}", self.error_code, self.message),
        }
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum InternalError {
    #[snafu(display("invalid hex integer `{input}`: {source}"))]
    ParseHexInt {
        input: String,
        source: std::num::ParseIntError,
    },
    #[snafu(display("{message}"))]
    Parse { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_follow_the_convention() {
        assert_eq!(StratumError::Other.code(), 20);
        assert_eq!(StratumError::JobNotFound.code(), 21);
        assert_eq!(StratumError::Duplicate.code(), 22);
        assert_eq!(StratumError::LowDifficulty.code(), 23);
        assert_eq!(StratumError::Unauthorized.code(), 24);
        assert_eq!(StratumError::NotSubscribed.code(), 25);
        assert_eq!(StratumError::Stale.code(), 26);
    }

    #[test]
    fn error_serializes_as_triple() {
        let response = StratumError::Stale.into_response(None);
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!([26, "Stale job", null])
        );
    }

    #[test]
    fn traceback_rides_in_third_position() {
        let response = StratumError::Duplicate.into_response(Some(json!({"job_id": "1f"})));
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!([22, "Duplicate share", {"job_id": "1f"}])
        );
    }
}
