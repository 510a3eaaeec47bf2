use super::*;

/// The target a difficulty-1 share must meet, as a 256-bit integer.
pub(crate) static DIFFICULTY_1_TARGET: LazyLock<U256> =
    LazyLock::new(|| U256::from_big_endian(&Target::MAX.to_be_bytes()));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    Sha256d,
    Scrypt,
}

impl FromStr for Algorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sha256d" => Ok(Algorithm::Sha256d),
            "scrypt" => Ok(Algorithm::Scrypt),
            other => bail!("unknown PoW algorithm `{other}`"),
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Algorithm::Sha256d => write!(f, "sha256d"),
            Algorithm::Scrypt => write!(f, "scrypt"),
        }
    }
}

/// Hashes 80-byte headers with the configured algorithm and classifies
/// the resulting digest against compact targets. Digests are
/// little-endian, the byte order headers hash to on the wire.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PowVerifier {
    algorithm: Algorithm,
    share_multiplier: f64,
}

impl PowVerifier {
    pub(crate) fn new(algorithm: Algorithm, share_multiplier: f64) -> Self {
        Self {
            algorithm,
            share_multiplier,
        }
    }

    pub(crate) fn hash(&self, header: &[u8; 80]) -> [u8; 32] {
        match self.algorithm {
            Algorithm::Sha256d => sha256d::Hash::hash(header).to_byte_array(),
            Algorithm::Scrypt => {
                // Litecoin-style parameters: N=1024, r=1, p=1, salt=header.
                let params =
                    scrypt::Params::new(10, 1, 1, 32).expect("scrypt parameters are valid");
                let mut digest = [0u8; 32];
                scrypt::scrypt(header, header, &params, &mut digest)
                    .expect("output length is fixed at 32 bytes");
                digest
            }
        }
    }

    /// Interprets the digest as a 256-bit little-endian integer and
    /// compares it against the expanded compact target.
    pub(crate) fn meets_target(&self, digest: &[u8; 32], compact: CompactTarget) -> bool {
        let threshold =
            U256::from_little_endian(&Target::from_compact(compact).to_le_bytes());
        U256::from_little_endian(digest) <= threshold
    }

    /// The difficulty represented by a digest, scaled by the configured
    /// share multiplier for algorithms whose difficulty-1 convention
    /// differs from sha256d.
    pub(crate) fn share_diff(&self, digest: &[u8; 32]) -> f64 {
        let value = U256::from_little_endian(digest);

        if value.is_zero() {
            return f64::MAX;
        }

        self.share_multiplier * u256_to_f64(*DIFFICULTY_1_TARGET) / u256_to_f64(value)
    }
}

fn u256_to_f64(value: U256) -> f64 {
    value
        .0
        .iter()
        .enumerate()
        .map(|(i, limb)| (*limb as f64) * 2f64.powi(64 * i as i32))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sha256d_verifier() -> PowVerifier {
        PowVerifier::new(Algorithm::Sha256d, 1.0)
    }

    #[test]
    fn algorithm_parses_known_ids() {
        assert_eq!("sha256d".parse::<Algorithm>().unwrap(), Algorithm::Sha256d);
        assert_eq!("SCRYPT".parse::<Algorithm>().unwrap(), Algorithm::Scrypt);
    }

    #[test]
    fn algorithm_rejects_unknown_id() {
        assert!(
            "x13".parse::<Algorithm>()
                .unwrap_err()
                .to_string()
                .contains("unknown PoW algorithm")
        );
    }

    #[test]
    fn algorithm_display_roundtrip() {
        for algorithm in [Algorithm::Sha256d, Algorithm::Scrypt] {
            assert_eq!(
                algorithm.to_string().parse::<Algorithm>().unwrap(),
                algorithm
            );
        }
    }

    #[test]
    fn sha256d_digest_matches_block_hash() {
        let header = [0u8; 80];
        let digest = sha256d_verifier().hash(&header);
        assert_eq!(digest, sha256d::Hash::hash(&header).to_byte_array());
    }

    #[test]
    fn scrypt_digest_differs_from_sha256d() {
        let header = [7u8; 80];
        let sha = sha256d_verifier().hash(&header);
        let scrypt = PowVerifier::new(Algorithm::Scrypt, 256.0).hash(&header);
        assert_ne!(sha, scrypt);
    }

    #[test]
    fn zero_digest_meets_any_target() {
        let verifier = sha256d_verifier();
        let digest = [0u8; 32];
        assert!(verifier.meets_target(&digest, CompactTarget::from_consensus(0x1d00ffff)));
        assert!(verifier.meets_target(&digest, CompactTarget::from_consensus(0x1703a30c)));
    }

    #[test]
    fn max_digest_fails_real_targets() {
        let verifier = sha256d_verifier();
        let digest = [0xff; 32];
        assert!(!verifier.meets_target(&digest, CompactTarget::from_consensus(0x1d00ffff)));
    }

    #[test]
    fn difficulty_one_digest_has_unit_share_diff() {
        let verifier = sha256d_verifier();
        let digest = DIFFICULTY_1_TARGET.to_little_endian();
        let diff = verifier.share_diff(&digest);
        assert!((diff - 1.0).abs() < 1e-9, "expected ~1.0, got {diff}");
    }

    #[test]
    fn halving_the_digest_doubles_the_difficulty() {
        let verifier = sha256d_verifier();
        let half = *DIFFICULTY_1_TARGET / U256::from(2u64);
        let diff = verifier.share_diff(&half.to_little_endian());
        assert!((diff - 2.0).abs() < 1e-9, "expected ~2.0, got {diff}");
    }

    #[test]
    fn share_multiplier_scales_difficulty() {
        let plain = sha256d_verifier();
        let scaled = PowVerifier::new(Algorithm::Sha256d, 256.0);
        let digest = DIFFICULTY_1_TARGET.to_little_endian();
        assert!((scaled.share_diff(&digest) / plain.share_diff(&digest) - 256.0).abs() < 1e-6);
    }

    #[test]
    fn zero_digest_has_max_difficulty() {
        assert_eq!(sha256d_verifier().share_diff(&[0u8; 32]), f64::MAX);
    }
}
