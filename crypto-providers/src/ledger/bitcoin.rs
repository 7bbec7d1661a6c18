//! Bitcoin (UTXO) ledger surface

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::LedgerResult;

/// An unspent output owned by the sender
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utxo {
    /// Funding transaction id
    pub txid: String,
    /// Output index
    pub vout: u32,
    /// Value in satoshis
    pub value: u64,
}

impl Utxo {
    /// `txid:vout` outpoint notation
    pub fn outpoint(&self) -> String {
        format!("{}:{}", self.txid, self.vout)
    }
}

/// A payment output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    /// Destination address
    pub address: String,
    /// Value in satoshis
    pub value: u64,
}

/// Unsigned transaction handed to the signer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsignedBitcoinTx {
    /// Inputs being spent
    pub inputs: Vec<Utxo>,
    /// Outputs, recipient first
    pub outputs: Vec<TxOutput>,
}

/// A transaction known to the node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BitcoinTransaction {
    /// Transaction id
    pub txid: String,
    /// Height of the including block, absent while in the mempool
    pub block_height: Option<u64>,
    /// Hash of the including block
    pub block_hash: Option<String>,
    /// Block time (unix seconds)
    pub block_time: Option<i64>,
    /// Untouched node response
    pub raw: serde_json::Value,
}

/// Read and submit operations a Bitcoin provider needs from a node or indexer
#[async_trait]
pub trait UtxoLedger: Send + Sync {
    /// Unspent outputs of an address
    async fn unspent(&self, address: &str) -> LedgerResult<Vec<Utxo>>;

    /// Recommended fee rate in sat/vB
    async fn fee_rate(&self) -> LedgerResult<u64>;

    /// Current chain height
    async fn block_height(&self) -> LedgerResult<u64>;

    /// Transaction by id, `None` if unknown to the index
    async fn transaction(&self, txid: &str) -> LedgerResult<Option<BitcoinTransaction>>;

    /// Whether the node's mempool holds the transaction
    async fn in_mempool(&self, txid: &str) -> LedgerResult<bool>;

    /// Submit a signed raw transaction (hex) and return its id
    async fn broadcast(&self, raw_hex: &str) -> LedgerResult<String>;
}

/// Produces signed raw transactions
pub trait BitcoinSigner: Send + Sync {
    /// Sign every input with `private_key` and return the raw transaction hex
    fn sign(&self, tx: &UnsignedBitcoinTx, private_key: &::bitcoin::PrivateKey) -> crate::Result<String>;
}
