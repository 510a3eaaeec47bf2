use super::*;

/// The job identifier miners see on the wire: a short hex counter scoped
/// to the issuing connection's work log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, DeserializeFromStr, SerializeDisplay)]
#[repr(transparent)]
pub struct WorkId(u32);

impl WorkId {
    pub fn new(n: u32) -> Self {
        Self(n)
    }
}

impl FromStr for WorkId {
    type Err = InternalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id = ResultExt::context(
            u32::from_str_radix(s, 16),
            ParseHexIntSnafu {
                input: s.to_string(),
            },
        )?;
        Ok(WorkId(id))
    }
}

impl fmt::Display for WorkId {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{:x}", self.0)
    }
}

impl From<WorkId> for u32 {
    fn from(id: WorkId) -> u32 {
        id.0
    }
}

impl From<u32> for WorkId {
    fn from(id: u32) -> WorkId {
        WorkId(id)
    }
}
