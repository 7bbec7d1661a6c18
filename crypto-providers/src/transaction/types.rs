//! Common transaction types

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Transaction status as derived by a single confirmation poll
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    /// Not yet observed as included
    Pending,
    /// Included, confirmation depth not reached
    Processing,
    /// Included and confirmed
    Sent,
    /// The status query itself failed; retry the query, not the transaction
    Error,
    /// The ledger reports a permanent failure
    Rejected,
}

impl TransactionStatus {
    /// Whether further polling can change the status
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Sent | Self::Rejected)
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Sent => "sent",
            Self::Error => "error",
            Self::Rejected => "rejected",
        };
        f.write_str(name)
    }
}

/// Freshly generated key material, owned by the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPair {
    /// Primary address
    pub address: String,
    /// Private credential (hex key, WIF or mnemonic words depending on chain)
    pub private_key: String,
    /// Public key, hex encoded
    pub public_key: Option<String>,
    /// Mnemonic the key was derived from
    pub mnemonic: Option<String>,
    /// Alternate encoding of the same key (e.g. a segwit address)
    pub auxiliary_address: Option<String>,
}

/// The sending side of a transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    /// Sender address
    pub address: String,
    /// Sender private credential
    pub private_key: String,
    /// Caller-side identifier of the agent
    pub agent_id: String,
}

/// The receiving side of a transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Recipient address
    pub address: String,
    /// Optional memo
    pub memo: Option<String>,
}

/// Third-party fee payer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subsidy {
    /// Fee payer private credential
    pub private_key: String,
}

/// Immutable input to transaction construction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionIntent {
    /// Sender
    pub agent: Agent,
    /// Recipient
    pub credentials: Credentials,
    /// Amount in human units
    pub value: String,
    /// Optional fee payer
    pub subsidy: Option<Subsidy>,
    /// Deduct the fee from `value` instead of charging it on top
    #[serde(default)]
    pub subtract_fee: bool,
    /// Explicit nonce; fetched from the ledger when absent
    pub nonce: Option<String>,
}

impl TransactionIntent {
    /// Create an intent transferring `value` from `agent` to `to`
    pub fn new(agent: Agent, to: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            agent,
            credentials: Credentials { address: to.into(), memo: None },
            value: value.into(),
            subsidy: None,
            subtract_fee: false,
            nonce: None,
        }
    }

    /// Deduct the fee from the transferred amount
    pub fn subtracting_fee(mut self) -> Self {
        self.subtract_fee = true;
        self
    }

    /// Pin the nonce instead of fetching it
    pub fn with_nonce(mut self, nonce: u64) -> Self {
        self.nonce = Some(nonce.to_string());
        self
    }

    /// Parse the caller-supplied nonce, if any
    pub(crate) fn explicit_nonce(&self) -> crate::Result<Option<u64>> {
        self.nonce
            .as_deref()
            .map(|n| {
                n.trim()
                    .parse::<u64>()
                    .map_err(|e| crate::Error::Validation(format!("Invalid nonce '{}': {}", n, e)))
            })
            .transpose()
    }
}

/// Fee actually committed to by a constructed payload, in native units
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GasParams {
    /// Total fee (gas price × gas limit, or the equivalent)
    pub gas_value: String,
}

/// Native account-model transfer details
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvmTxInfo {
    /// Nonce used
    pub nonce: u64,
    /// Gas price in wei
    pub gas_price: String,
    /// Gas limit
    pub gas_limit: u64,
    /// Transferred value in wei
    pub value: String,
    /// Chain height when the payload was built
    pub create_block_height: u64,
}

/// Token contract transfer details
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenTxInfo {
    /// Nonce used (pending mode)
    pub nonce: u64,
    /// Gas price in wei, after margin and ceiling
    pub gas_price: String,
    /// Final gas limit (base allowance + simulated requirement)
    pub gas_limit: u64,
    /// Token contract address
    pub contract: String,
    /// Transferred token amount in contract units
    pub token_amount: String,
}

/// Data-credit priced payment details
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeliumTxInfo {
    /// Payer address
    pub payer: String,
    /// Payee address
    pub payee: String,
    /// Amount in bones
    pub amount: u64,
    /// Fee in bones
    pub fee: u64,
    /// Fee in data credits before conversion
    pub fee_dc: u64,
    /// Nonce used
    pub nonce: u64,
}

/// UTXO transfer details
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BitcoinTxInfo {
    /// Outpoints spent, as `txid:vout`
    pub inputs: Vec<String>,
    /// Satoshis sent to the recipient
    pub amount: u64,
    /// Satoshis returned to the sender, if any
    pub change: Option<u64>,
    /// Satoshis paid as fee
    pub fee: u64,
    /// Fee rate in sat/vB
    pub fee_rate: u64,
}

/// Chain-specific metadata attached to a payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PayloadInfo {
    /// Native EVM transfer
    Evm(EvmTxInfo),
    /// ERC-20 transfer
    Token(TokenTxInfo),
    /// Helium payment
    Helium(HeliumTxInfo),
    /// Bitcoin transaction
    Bitcoin(BitcoinTxInfo),
}

/// Signed payload produced by `tx_create` and consumed by `tx_transfer_raw`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionPayload {
    /// Chain-specific signed transaction, treated as opaque
    pub data: String,
    /// Construction metadata
    pub info: PayloadInfo,
    /// Committed fee
    pub gas_params: Option<GasParams>,
}

/// Details of a tracked transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendInfo {
    /// Transaction id
    pub id: String,
    /// Human-readable detail
    pub message: String,
    /// When the confirmation was observed
    pub sent_time: Option<DateTime<Utc>>,
}

/// Result of a single confirmation poll
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendResult {
    /// Derived status
    pub status: TransactionStatus,
    /// Failure cause for `error` and `rejected`
    pub error: Option<String>,
    /// Details when available
    pub info: Option<SendInfo>,
}

impl SendResult {
    /// A result carrying only a status
    pub fn status(status: TransactionStatus) -> Self {
        Self { status, error: None, info: None }
    }

    /// A failed query; the cause is preserved
    pub fn error(cause: impl fmt::Display) -> Self {
        Self { status: TransactionStatus::Error, error: Some(cause.to_string()), info: None }
    }

    /// A permanent on-ledger failure
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self { status: TransactionStatus::Rejected, error: Some(reason.into()), info: None }
    }

    /// A confirmed transaction
    pub fn sent(id: &str, message: impl Into<String>) -> Self {
        Self {
            status: TransactionStatus::Sent,
            error: None,
            info: Some(SendInfo {
                id: id.to_string(),
                message: message.into(),
                sent_time: Some(Utc::now()),
            }),
        }
    }
}

/// Event log attached to a receipt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Log {
    /// Emitting contract
    pub address: String,
    /// Log data, hex encoded
    pub data: String,
    /// Indexed topics
    pub topics: Vec<String>,
    /// Index within the block
    pub log_index: Option<u64>,
}

/// Chain-native receipt passthrough
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receipt {
    /// Block height
    pub block: Option<u64>,
    /// Block hash
    pub block_hash: Option<String>,
    /// Transaction hash
    pub hash: String,
    /// Sender(s)
    pub from: Vec<String>,
    /// Recipient(s)
    pub to: Vec<String>,
    /// Transferred amount in human units, when known
    pub amount: Option<String>,
    /// Block time, when known
    pub date: Option<DateTime<Utc>>,
    /// Confirmations at lookup time
    pub confirmations: Option<u64>,
    /// Event logs
    pub logs: Vec<Log>,
    /// Untouched chain response
    pub raw: serde_json::Value,
}

/// Historical point for balance queries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockRef {
    /// Block height
    Number(u64),
    /// Block hash
    Hash(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(TransactionStatus::Sent.is_terminal());
        assert!(TransactionStatus::Rejected.is_terminal());
        assert!(!TransactionStatus::Error.is_terminal());
        assert!(!TransactionStatus::Pending.is_terminal());
        assert!(!TransactionStatus::Processing.is_terminal());
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_string(&TransactionStatus::Processing).unwrap();
        assert_eq!(json, "\"processing\"");
    }

    #[test]
    fn test_explicit_nonce() {
        let agent = Agent {
            address: "a".to_string(),
            private_key: "k".to_string(),
            agent_id: "1".to_string(),
        };
        let intent = TransactionIntent::new(agent, "b", "1");
        assert_eq!(intent.explicit_nonce().unwrap(), None);
        assert_eq!(intent.clone().with_nonce(7).explicit_nonce().unwrap(), Some(7));

        let mut bad = intent;
        bad.nonce = Some("seven".to_string());
        assert!(bad.explicit_nonce().is_err());
    }
}
