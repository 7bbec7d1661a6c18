//! Ledger collaborators
//!
//! The providers never talk to a network directly. Each chain family
//! consumes a ledger query surface (and, where the signature scheme is not
//! available locally, a signer) through the traits in this module, so the
//! wire-level clients stay swappable and the providers stay testable.

pub mod bitcoin;
pub mod connector;
pub mod evm;
pub mod helium;

pub use connector::*;

use thiserror::Error;

/// Rejection messages meaning the ledger already holds the transaction
const ALREADY_KNOWN_MARKERS: &[&str] = &[
    "already known",
    "known transaction",
    "already imported",
    "nonce too low",
    "txn-already-in-mempool",
    "txn-already-known",
    "transaction already in block chain",
];

/// Failure reported by a ledger client
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// The request did not complete in time
    #[error("request timed out: {0}")]
    Timeout(String),

    /// Connection or decoding failure
    #[error("transport error: {0}")]
    Transport(String),

    /// The ledger answered and refused the request
    #[error("rejected by ledger: {0}")]
    Rejected(String),
}

impl LedgerError {
    /// Whether a submission that failed this way might still have landed
    pub fn may_have_been_accepted(&self) -> bool {
        match self {
            LedgerError::Timeout(_) | LedgerError::Transport(_) => true,
            LedgerError::Rejected(reason) => {
                let reason = reason.to_lowercase();
                ALREADY_KNOWN_MARKERS.iter().any(|marker| reason.contains(marker))
            }
        }
    }
}

/// Result type for ledger calls
pub type LedgerResult<T> = std::result::Result<T, LedgerError>;

/// Which state a transaction count is read from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NonceMode {
    /// Mined transactions only
    Latest,
    /// Including transactions still in the mempool
    Pending,
}
