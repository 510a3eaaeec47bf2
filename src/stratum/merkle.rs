use super::*;

/// Merkle branch nodes travel as plain hex in internal byte order, not
/// the reversed hex Txid and friends display in.
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, DeserializeFromStr, SerializeDisplay,
)]
pub struct MerkleNode(sha256d::Hash);

impl MerkleNode {
    pub fn as_byte_array(&self) -> &[u8; 32] {
        self.0.as_byte_array()
    }

    pub fn from_byte_array(bytes: [u8; 32]) -> Self {
        Self(sha256d::Hash::from_byte_array(bytes))
    }

    pub fn from_raw_hash(hash: sha256d::Hash) -> Self {
        Self(hash)
    }

    pub fn to_raw_hash(self) -> sha256d::Hash {
        self.0
    }
}

impl fmt::Display for MerkleNode {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0.as_byte_array()))
    }
}

impl FromStr for MerkleNode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ensure!(s.len() == 64, "merkle node hex must be 64 chars");
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes)?;
        Ok(MerkleNode(sha256d::Hash::from_byte_array(bytes)))
    }
}

impl From<sha256d::Hash> for MerkleNode {
    fn from(hash: sha256d::Hash) -> Self {
        Self(hash)
    }
}

impl From<MerkleNode> for sha256d::Hash {
    fn from(node: MerkleNode) -> Self {
        node.0
    }
}

impl From<Txid> for MerkleNode {
    fn from(txid: Txid) -> Self {
        Self::from_byte_array(txid.to_byte_array())
    }
}

/// Reassembles the coinbase from its split halves and folds it through
/// the merkle branches to recover the block's merkle root.
pub fn merkle_root(
    coinb1: &str,
    coinb2: &str,
    extranonce1: &Extranonce,
    extranonce2: &Extranonce,
    merkle_branches: &[MerkleNode],
) -> Result<MerkleNode> {
    let coinbase_bin = hex::decode(format!("{coinb1}{extranonce1}{extranonce2}{coinb2}"))?;
    let coinbase_hash = sha256d::Hash::hash(&coinbase_bin);

    let mut root = coinbase_hash;
    for branch in merkle_branches {
        let mut concat = Vec::with_capacity(64);
        concat.extend_from_slice(&root[..]);
        concat.extend_from_slice(branch.as_byte_array());
        root = sha256d::Hash::hash(&concat);
    }

    Ok(MerkleNode::from_raw_hash(root))
}

/// Builds the merkle branches for the coinbase from the txids of every
/// other transaction in the block: the log-sized sequence of siblings
/// that combine with the coinbase hash to reproduce the root. Odd levels
/// duplicate their last element.
pub fn merkle_branches(non_coinbase_txids: Vec<Txid>) -> Vec<MerkleNode> {
    if non_coinbase_txids.is_empty() {
        return Vec::new();
    }

    // The coinbase slot is a placeholder; only sibling hashes matter.
    let mut level = vec![sha256d::Hash::all_zeros()];
    level.extend(non_coinbase_txids.iter().map(|txid| txid.to_raw_hash()));

    let mut branches = Vec::new();
    let mut coinbase_index = 0;

    while level.len() > 1 {
        // XOR flips to the sibling on either side.
        let sibling_index = coinbase_index ^ 1;

        let sibling = if sibling_index < level.len() {
            level[sibling_index]
        } else {
            level[coinbase_index]
        };

        branches.push(sibling.into());

        let mut next_level = Vec::with_capacity(level.len() / 2 + 1);
        for pair in level.chunks(2) {
            let left = pair[0];
            let right = if pair.len() == 2 { pair[1] } else { left };

            let mut engine = <sha256d::Hash>::engine();

            left.consensus_encode(&mut engine)
                .expect("in-memory writer shouldn't error");
            right
                .consensus_encode(&mut engine)
                .expect("in-memory writer shouldn't error");

            next_level.push(sha256d::Hash::from_engine(engine));
        }

        level = next_level;
        coinbase_index /= 2;
    }

    branches
}
