use super::*;

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SplitCoinbase {
    pub(crate) coinb1: String,
    pub(crate) coinb2: String,
}

/// Builds the coinbase transaction byte-by-byte and splits it around the
/// extranonce placeholder, so that `coinb1 || extranonce1 || extranonce2
/// || coinb2` is the serialized transaction. Hand-rolled serialization
/// because the optional PoS timestamp and tx-comment trailer have no
/// home in `bitcoin::Transaction`.
#[derive(Debug, Clone)]
pub(crate) struct CoinbaseBuilder {
    script_pubkey: ScriptBuf,
    value: Amount,
    height: u64,
    extranonce_size: usize,
    aux: BTreeMap<String, String>,
    extras: Vec<u8>,
    tx_comment: Option<Vec<u8>>,
    pos_timestamp: Option<u32>,
    witness_commitment: ScriptBuf,
}

impl CoinbaseBuilder {
    pub(crate) const MAX_COINBASE_SCRIPT_SIG_SIZE: usize = 100;

    pub(crate) fn new(
        script_pubkey: ScriptBuf,
        extranonce_size: usize,
        height: u64,
        value: Amount,
    ) -> Self {
        Self {
            script_pubkey,
            value,
            height,
            extranonce_size,
            aux: BTreeMap::new(),
            extras: Vec::new(),
            tx_comment: None,
            pos_timestamp: None,
            witness_commitment: ScriptBuf::new(),
        }
    }

    pub(crate) fn with_aux(mut self, aux: BTreeMap<String, String>) -> Self {
        self.aux = aux;
        self
    }

    pub(crate) fn with_extras(mut self, extras: Vec<u8>) -> Self {
        self.extras = extras;
        self
    }

    pub(crate) fn with_tx_comment(mut self, comment: Vec<u8>) -> Self {
        self.tx_comment = Some(comment);
        self
    }

    pub(crate) fn with_pos_timestamp(mut self, timestamp: u32) -> Self {
        self.pos_timestamp = Some(timestamp);
        self
    }

    pub(crate) fn with_witness_commitment(mut self, commitment: ScriptBuf) -> Self {
        self.witness_commitment = commitment;
        self
    }

    pub(crate) fn build(self) -> Result<SplitCoinbase> {
        let mut script: Vec<u8> = Vec::with_capacity(Self::MAX_COINBASE_SCRIPT_SIG_SIZE);

        // BIP34 encode block height
        let mut minimally_encoded = [0u8; 8];
        let len = write_scriptint(
            &mut minimally_encoded,
            i64::try_from(self.height).context("block height out of range")?,
        );
        script.push(len as u8);
        script.extend_from_slice(&minimally_encoded[..len]);

        for value in self.aux.values() {
            script.extend_from_slice(hex::decode(value)?.as_slice());
        }

        let prefix_size = script.len();

        script.extend_from_slice(&vec![0u8; self.extranonce_size]);

        // Extras are the first thing to give way when the script sig
        // would overflow the consensus limit; height and extranonce
        // space are never touched.
        let budget = Self::MAX_COINBASE_SCRIPT_SIG_SIZE.saturating_sub(script.len());
        let mut extras = self.extras;
        extras.truncate(budget);
        script.extend_from_slice(&extras);

        ensure!(
            script.len() <= Self::MAX_COINBASE_SCRIPT_SIG_SIZE,
            "coinbase script sig is {} bytes (max {})",
            script.len(),
            Self::MAX_COINBASE_SCRIPT_SIG_SIZE
        );

        let mut tx: Vec<u8> = Vec::with_capacity(256);

        tx.extend_from_slice(&2u32.to_le_bytes());

        // PoS coins carry the transaction timestamp after the version.
        if let Some(timestamp) = self.pos_timestamp {
            tx.extend_from_slice(&timestamp.to_le_bytes());
        }

        VarInt(1).consensus_encode(&mut tx)?;
        tx.extend_from_slice(&[0u8; 32]);
        tx.extend_from_slice(&u32::MAX.to_le_bytes());
        VarInt(script.len() as u64).consensus_encode(&mut tx)?;

        // The split lands right before the extranonce placeholder.
        let offset = tx.len() + prefix_size;

        tx.extend_from_slice(&script);
        tx.extend_from_slice(&u32::MAX.to_le_bytes());

        let mut outputs = vec![TxOut {
            value: self.value,
            script_pubkey: self.script_pubkey,
        }];

        if !self.witness_commitment.is_empty() {
            outputs.push(TxOut {
                value: Amount::ZERO,
                script_pubkey: self.witness_commitment,
            });
        }

        VarInt(outputs.len() as u64).consensus_encode(&mut tx)?;
        for output in &outputs {
            output.consensus_encode(&mut tx)?;
        }

        tx.extend_from_slice(&0u32.to_le_bytes());

        if let Some(comment) = &self.tx_comment {
            VarInt(comment.len() as u64).consensus_encode(&mut tx)?;
            tx.extend_from_slice(comment);
        }

        Ok(SplitCoinbase {
            coinb1: hex::encode(&tx[..offset]),
            coinb2: hex::encode(&tx[offset + self.extranonce_size..]),
        })
    }
}

/// Pays the block reward to the pool's central wallet and stamps the
/// coinbase per pool policy.
#[derive(Debug, Clone)]
pub(crate) struct Coinbaser {
    script_pubkey: ScriptBuf,
    extras: Vec<u8>,
    tx_comment: Option<Vec<u8>>,
    extranonce_size: usize,
    pos_reward: bool,
}

impl Coinbaser {
    pub(crate) fn from_settings(settings: &Settings) -> Result<Self> {
        let address = settings
            .central_wallet
            .parse::<Address<NetworkUnchecked>>()
            .context("invalid central wallet address")?
            .require_network(settings.chain)
            .context("central wallet address does not match configured chain")?;

        Ok(Self {
            script_pubkey: address.script_pubkey(),
            extras: settings.coinbase_extras.clone().into_bytes(),
            tx_comment: settings
                .tx_comment
                .as_ref()
                .map(|comment| comment.clone().into_bytes()),
            extranonce_size: EXTRANONCE1_SIZE + settings.extranonce2_size,
            pos_reward: settings.reward == RewardType::Pos,
        })
    }

    pub(crate) fn extranonce_size(&self) -> usize {
        self.extranonce_size
    }

    pub(crate) fn split(&self, template: &BlockTemplate, timestamp: u64) -> Result<SplitCoinbase> {
        let mut builder = CoinbaseBuilder::new(
            self.script_pubkey.clone(),
            self.extranonce_size,
            template.height,
            template.coinbase_value,
        )
        .with_aux(template.coinbaseaux.clone())
        .with_extras(self.extras.clone())
        .with_witness_commitment(template.default_witness_commitment.clone());

        if let Some(comment) = &self.tx_comment {
            builder = builder.with_tx_comment(comment.clone());
        }

        if self.pos_reward {
            builder = builder.with_pos_timestamp(timestamp as u32);
        }

        builder.build()
    }
}
