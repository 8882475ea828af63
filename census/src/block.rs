//! Block data as served by the node's block API.
//!
//! Field names follow the node's PascalCase JSON. Only the parts the census
//! reads are modelled; everything else in the response is ignored.

use serde::Deserialize;

/// Transaction type of the designated reward-distribution transaction.
pub const BLOCK_REWARD_TXN_TYPE: &str = "BLOCK_REWARD";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BlockHeader {
    #[serde(rename = "Height")]
    pub height: u64,

    #[serde(rename = "BlockHashHex")]
    pub hash: String,

    /// Back-link to the predecessor. Empty only for genesis.
    #[serde(rename = "PrevBlockHashHex", default)]
    pub prev_hash: String,
}

impl BlockHeader {
    pub fn is_genesis(&self) -> bool {
        self.height == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TransactionOutput {
    #[serde(rename = "PublicKeyBase58Check")]
    pub public_key: String,

    #[serde(rename = "AmountNanos", default)]
    pub amount_nanos: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Transaction {
    #[serde(rename = "TransactionType")]
    pub transaction_type: String,

    #[serde(rename = "Outputs", default)]
    pub outputs: Vec<TransactionOutput>,
}

impl Transaction {
    pub fn is_block_reward(&self) -> bool {
        self.transaction_type == BLOCK_REWARD_TXN_TYPE
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
}

/// Raw body of `/api/v1/block` and `/api/v1`.
///
/// The node answers 200 with a non-empty `Error` for some lookups, and leaves
/// `Header` null when it has nothing to return.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BlockResponse {
    #[serde(rename = "Error", default)]
    pub error: String,

    #[serde(rename = "Header", default)]
    pub header: Option<BlockHeader>,

    #[serde(rename = "Transactions", default)]
    pub transactions: Option<Vec<Transaction>>,
}

impl BlockResponse {
    /// Turn the wire body into a [`Block`], or describe why it can't be one.
    pub fn into_block(self) -> Result<Block, String> {
        if !self.error.is_empty() {
            return Err(self.error);
        }
        let header = self
            .header
            .ok_or_else(|| "response carried no block header".to_string())?;
        Ok(Block {
            header,
            transactions: self.transactions.unwrap_or_default(),
        })
    }
}
