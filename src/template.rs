use super::*;

/// An immutable snapshot of the daemon's `getblocktemplate` answer.
/// Transaction hashes for the merkle branch are computed once on first
/// use and cached.
#[derive(Clone, Debug, Deserialize)]
pub(crate) struct BlockTemplate {
    pub(crate) bits: Nbits,
    #[serde(rename = "previousblockhash")]
    pub(crate) previous_block_hash: BlockHash,
    #[serde(rename = "curtime", deserialize_with = "ntime_from_u64")]
    pub(crate) current_time: Ntime,
    pub(crate) height: u64,
    #[serde(deserialize_with = "version_from_i32")]
    pub(crate) version: Version,
    #[serde(default)]
    pub(crate) transactions: Vec<TemplateTransaction>,
    #[serde(default)]
    pub(crate) default_witness_commitment: ScriptBuf,
    #[serde(default)]
    pub(crate) coinbaseaux: BTreeMap<String, String>,
    #[serde(
        rename = "coinbasevalue",
        with = "bitcoin::amount::serde::as_sat",
        default
    )]
    pub(crate) coinbase_value: Amount,
    #[serde(skip)]
    merkle_cache: OnceLock<Vec<MerkleNode>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub(crate) struct TemplateTransaction {
    pub(crate) txid: Txid,
    #[serde(rename = "data", deserialize_with = "bytes_from_hex")]
    pub(crate) raw: Vec<u8>,
}

impl PartialEq for BlockTemplate {
    fn eq(&self, other: &Self) -> bool {
        self.bits == other.bits
            && self.previous_block_hash == other.previous_block_hash
            && self.current_time == other.current_time
            && self.height == other.height
            && self.version == other.version
            && self.transactions == other.transactions
            && self.default_witness_commitment == other.default_witness_commitment
            && self.coinbaseaux == other.coinbaseaux
            && self.coinbase_value == other.coinbase_value
    }
}

impl Eq for BlockTemplate {}

impl BlockTemplate {
    pub(crate) fn merkle_branches(&self) -> &[MerkleNode] {
        self.merkle_cache.get_or_init(|| {
            merkle_branches(self.transactions.iter().map(|tx| tx.txid).collect())
        })
    }

    pub(crate) fn build_job(
        self: &Arc<Self>,
        job_id: JobId,
        coinbaser: &Coinbaser,
        timestamp: u64,
    ) -> Result<Job> {
        let split = coinbaser
            .split(self, timestamp)
            .context("failed to build coinbase")?;

        Ok(Job {
            job_id,
            coinb1: split.coinb1,
            coinb2: split.coinb2,
            template: self.clone(),
        })
    }

    /// The 80-byte header a submission commits to.
    pub(crate) fn serialize_header(
        &self,
        job: &Job,
        extranonce1: &Extranonce,
        extranonce2: &Extranonce,
        ntime: Ntime,
        nonce: Nonce,
    ) -> Result<[u8; 80]> {
        let root = merkle_root(
            &job.coinb1,
            &job.coinb2,
            extranonce1,
            extranonce2,
            self.merkle_branches(),
        )?;

        let header = Header {
            version: self.version.into(),
            prev_blockhash: self.previous_block_hash,
            merkle_root: bitcoin::TxMerkleNode::from_raw_hash(root.to_raw_hash()),
            time: ntime.into(),
            bits: self.bits.to_compact(),
            nonce: nonce.into(),
        };

        Ok(consensus::serialize(&header)
            .try_into()
            .expect("headers serialize to 80 bytes"))
    }

    /// The full block for `submitblock`, as hex: header, transaction
    /// count, reassembled coinbase, then every template transaction in
    /// order.
    pub(crate) fn assemble_block(
        &self,
        job: &Job,
        extranonce1: &Extranonce,
        extranonce2: &Extranonce,
        ntime: Ntime,
        nonce: Nonce,
    ) -> Result<String> {
        let header = self.serialize_header(job, extranonce1, extranonce2, ntime, nonce)?;

        let coinbase = hex::decode(format!(
            "{}{}{}{}",
            job.coinb1, extranonce1, extranonce2, job.coinb2
        ))
        .context("failed to decode coinbase hex")?;

        let raw_size: usize = self.transactions.iter().map(|tx| tx.raw.len()).sum();

        let mut block = Vec::with_capacity(80 + 9 + coinbase.len() + raw_size);
        block.extend_from_slice(&header);
        VarInt((self.transactions.len() + 1) as u64).consensus_encode(&mut block)?;
        block.extend_from_slice(&coinbase);
        for tx in &self.transactions {
            block.extend_from_slice(&tx.raw);
        }

        Ok(hex::encode(block))
    }
}

fn version_from_i32<'de, D>(deserializer: D) -> Result<Version, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Version::from(i32::deserialize(deserializer)?))
}

fn ntime_from_u64<'de, D>(deserializer: D) -> Result<Ntime, D::Error>
where
    D: Deserializer<'de>,
{
    let time = u64::deserialize(deserializer)?;
    Ntime::try_from(time).map_err(de::Error::custom)
}

fn bytes_from_hex<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    let s = <&str>::deserialize(deserializer)?;
    hex::decode(s).map_err(de::Error::custom)
}

#[cfg(test)]
impl BlockTemplate {
    pub(crate) fn for_tests(height: u64, prevhash_byte: u8) -> Self {
        Self {
            bits: "1d00ffff".parse().unwrap(),
            previous_block_hash: BlockHash::from_byte_array([prevhash_byte; 32]),
            current_time: Ntime::from(0x504e86b9),
            height,
            version: Version::from(2),
            transactions: Vec::new(),
            default_witness_commitment: ScriptBuf::new(),
            coinbaseaux: BTreeMap::new(),
            coinbase_value: Amount::from_sat(50 * COIN_VALUE),
            merkle_cache: OnceLock::new(),
        }
    }

    pub(crate) fn with_bits(mut self, bits: &str) -> Self {
        self.bits = bits.parse().unwrap();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "version": 536870912,
        "rules": ["csv", "segwit"],
        "previousblockhash": "00000000440b921e1b77c6c0487ae5616de67f788f44ae2a5af6e2194d16b6f8",
        "transactions": [
            {
                "data": "0100000001000000000000000000000000000000000000000000000000000000000000000000ffffffff00ffffffff0100f2052a010000000000000000",
                "txid": "1111111111111111111111111111111111111111111111111111111111111111",
                "hash": "1111111111111111111111111111111111111111111111111111111111111111",
                "fee": 1000
            }
        ],
        "coinbaseaux": { "flags": "deadbeef" },
        "coinbasevalue": 5000000000,
        "target": "00000000ffff0000000000000000000000000000000000000000000000000000",
        "mintime": 1346275302,
        "mutable": ["time", "transactions", "prevblock"],
        "noncerange": "00000000ffffffff",
        "curtime": 1346275312,
        "bits": "1d00ffff",
        "height": 201600
    }"#;

    fn coinbaser() -> Coinbaser {
        let settings = Settings::for_tests();
        Coinbaser::from_settings(&settings).unwrap()
    }

    #[test]
    fn deserializes_daemon_template() {
        let template: BlockTemplate = serde_json::from_str(SAMPLE).unwrap();

        assert_eq!(template.height, 201600);
        assert_eq!(template.bits, "1d00ffff".parse().unwrap());
        assert_eq!(template.current_time, Ntime::from(1346275312));
        assert_eq!(template.version, Version::from(0x20000000));
        assert_eq!(template.coinbase_value, Amount::from_sat(5_000_000_000));
        assert_eq!(template.transactions.len(), 1);
        assert_eq!(template.coinbaseaux["flags"], "deadbeef");
    }

    #[test]
    fn identical_payloads_compare_equal() {
        let a: BlockTemplate = serde_json::from_str(SAMPLE).unwrap();
        let b: BlockTemplate = serde_json::from_str(SAMPLE).unwrap();

        // Warm one cache; equality must not depend on it.
        a.merkle_branches();

        assert_eq!(a, b);
    }

    #[test]
    fn merkle_branches_come_from_txids() {
        let template: BlockTemplate = serde_json::from_str(SAMPLE).unwrap();
        let txid = template.transactions[0].txid;

        assert_eq!(template.merkle_branches(), &[MerkleNode::from(txid)]);
    }

    #[test]
    fn header_is_eighty_bytes_and_commits_to_the_merkle_root() {
        let template = Arc::new(BlockTemplate::for_tests(100, 1));
        let job = template
            .build_job(JobId::new(0), &coinbaser(), 1_345_678_900)
            .unwrap();

        let extranonce1: Extranonce = "1f000001".parse().unwrap();
        let extranonce2: Extranonce = "00000000".parse().unwrap();
        let ntime = template.current_time;
        let nonce = Nonce::from(42);

        let header = template
            .serialize_header(&job, &extranonce1, &extranonce2, ntime, nonce)
            .unwrap();

        let root = merkle_root(&job.coinb1, &job.coinb2, &extranonce1, &extranonce2, &[]).unwrap();

        assert_eq!(&header[36..68], root.as_byte_array());
        assert_eq!(&header[68..72], &u32::from(ntime).to_le_bytes());
        assert_eq!(&header[76..80], &42u32.to_le_bytes());
    }

    #[test]
    fn assembled_block_contains_header_coinbase_and_transactions() {
        let template: BlockTemplate = serde_json::from_str(SAMPLE).unwrap();
        let template = Arc::new(template);

        let job = template
            .build_job(JobId::new(7), &coinbaser(), 1_345_678_900)
            .unwrap();

        let extranonce1: Extranonce = "1f000001".parse().unwrap();
        let extranonce2: Extranonce = "00000000".parse().unwrap();
        let ntime = template.current_time;
        let nonce = Nonce::from(0);

        let block = template
            .assemble_block(&job, &extranonce1, &extranonce2, ntime, nonce)
            .unwrap();

        let bytes = hex::decode(&block).unwrap();
        let header = template
            .serialize_header(&job, &extranonce1, &extranonce2, ntime, nonce)
            .unwrap();

        assert_eq!(&bytes[..80], &header);
        assert_eq!(bytes[80], 2, "two transactions including the coinbase");
        assert!(
            block.ends_with(&hex::encode(&template.transactions[0].raw)),
            "template transactions must trail the coinbase"
        );
    }
}
