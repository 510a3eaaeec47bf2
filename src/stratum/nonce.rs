use super::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, DeserializeFromStr, SerializeDisplay)]
pub struct Nonce(u32);

impl FromStr for Nonce {
    type Err = InternalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Nonces are exactly four bytes on the wire.
        if s.len() != 8 {
            return Err(InternalError::Parse {
                message: format!("nonce must be 8 hex chars, got {}", s.len()),
            });
        }

        let nonce = ResultExt::context(
            u32::from_str_radix(s, 16),
            ParseHexIntSnafu {
                input: s.to_string(),
            },
        )?;

        Ok(Nonce(nonce))
    }
}

impl fmt::Display for Nonce {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{:08x}", self.0)
    }
}

impl From<Nonce> for u32 {
    fn from(nonce: Nonce) -> u32 {
        nonce.0
    }
}

impl From<u32> for Nonce {
    fn from(nonce: u32) -> Nonce {
        Nonce(nonce)
    }
}
