use super::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, DeserializeFromStr, SerializeDisplay)]
pub struct Nbits(CompactTarget);

impl Nbits {
    pub fn to_compact(self) -> CompactTarget {
        self.0
    }

    pub fn to_target(self) -> Target {
        Target::from_compact(self.0)
    }
}

impl FromStr for Nbits {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(Nbits(CompactTarget::from_unprefixed_hex(s)?))
    }
}

impl fmt::Display for Nbits {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{:08x}", self.0.to_consensus())
    }
}

impl From<Nbits> for CompactTarget {
    fn from(nbits: Nbits) -> CompactTarget {
        nbits.0
    }
}

impl From<CompactTarget> for Nbits {
    fn from(compact: CompactTarget) -> Nbits {
        Nbits(compact)
    }
}
