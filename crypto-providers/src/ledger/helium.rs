//! Helium ledger surface

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::LedgerResult;

/// Account state as reported by the API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeliumAccount {
    /// Account address
    pub address: String,
    /// Balance in bones
    pub balance: u64,
    /// Nonce including pending transactions
    pub speculative_nonce: u64,
}

/// Chain variables that drive fee calculation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainVars {
    /// Data credits charged per payload chunk
    pub txn_fee_multiplier: u64,
    /// Bytes per payload chunk
    pub dc_payload_size: u64,
}

impl Default for ChainVars {
    fn default() -> Self {
        Self { txn_fee_multiplier: 5000, dc_payload_size: 24 }
    }
}

/// One predicted oracle price; `price` is USD with 8 decimals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OraclePrice {
    /// Price, absent when the feed has not reported
    pub price: Option<u64>,
    /// Height the price applies from
    pub height: Option<u64>,
}

/// A transaction found on chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeliumTransaction {
    /// Transaction hash
    pub hash: String,
    /// Transaction type, e.g. `payment_v1`
    pub kind: String,
    /// Block height, absent until included
    pub height: Option<u64>,
    /// Block time (unix seconds)
    pub time: Option<i64>,
    /// Payer address
    pub payer: Option<String>,
    /// Payee address
    pub payee: Option<String>,
    /// Amount in bones
    pub amount: Option<u64>,
    /// Untouched API response
    pub raw: serde_json::Value,
}

impl HeliumTransaction {
    /// Whether this is a payment transaction
    pub fn is_payment(&self) -> bool {
        matches!(self.kind.as_str(), "payment_v1" | "payment_v2")
    }
}

/// Mempool state of a submitted transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingStatus {
    /// Waiting for inclusion
    Pending,
    /// Dropped by the chain
    Failed,
    /// Included
    Cleared,
}

/// A mempool entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingTransaction {
    /// Transaction hash
    pub hash: String,
    /// Mempool state
    pub status: PendingStatus,
    /// Failure reason, if any
    pub failed_reason: Option<String>,
}

/// Unsigned payment handed to the signer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeliumPayment {
    /// Payer address
    pub payer: String,
    /// Payee address
    pub payee: String,
    /// Amount in bones
    pub amount: u64,
    /// Fee in bones
    pub fee: u64,
    /// Payer nonce
    pub nonce: u64,
}

/// Read and submit operations a Helium provider needs from the API
#[async_trait]
pub trait HeliumLedger: Send + Sync {
    /// Account state, `None` if the address is unknown
    async fn account(&self, address: &str) -> LedgerResult<Option<HeliumAccount>>;

    /// Current chain variables
    async fn chain_vars(&self) -> LedgerResult<ChainVars>;

    /// Predicted oracle prices
    async fn oracle_prices(&self) -> LedgerResult<Vec<OraclePrice>>;

    /// Current chain height
    async fn height(&self) -> LedgerResult<u64>;

    /// Transaction by hash, `None` if not found
    async fn transaction(&self, hash: &str) -> LedgerResult<Option<HeliumTransaction>>;

    /// Mempool entries for a hash, newest first
    async fn pending_transactions(&self, hash: &str) -> LedgerResult<Vec<PendingTransaction>>;

    /// Submit a signed, encoded transaction and return its hash
    async fn submit(&self, signed: &str) -> LedgerResult<String>;
}

/// Encoding and signing of payments
pub trait HeliumSigner: Send + Sync {
    /// Serialized size of the payment in bytes, as used for fee calculation
    fn encoded_len(&self, payment: &HeliumPayment) -> usize;

    /// Sign the payment with the payer's key and return the encoded transaction
    fn sign(&self, payment: &HeliumPayment, signing_key: &ed25519_dalek::SigningKey) -> crate::Result<String>;
}
