//! Error types for the crypto-providers library

use thiserror::Error;

use crate::ledger::LedgerError;

/// Whether a failed broadcast may still have reached the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionState {
    /// The ledger refused the payload; it was definitely not accepted
    NotSubmitted,
    /// The outcome is unknown (timeout, dropped connection, "already known");
    /// the transaction may have been accepted
    Ambiguous,
}

/// Custom error type for provider operations
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed address or credential/address mismatch
    #[error("Validation error: {0}")]
    Validation(String),

    /// A readiness-gated operation ran before `initialize`
    #[error("Provider not initialized: {0}")]
    NotInitialized(String),

    /// Balance does not cover amount plus fee
    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),

    /// Amount is malformed, zero or consumed by the fee
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Read-path failure (balance, nonce, fee oracle, receipt)
    #[error("Lookup error: {0}")]
    Lookup(String),

    /// Submission failed
    #[error("Broadcast error ({state:?}): {reason}")]
    Broadcast {
        /// Whether the payload might have been accepted anyway
        state: SubmissionState,
        /// Underlying rejection reason
        reason: String,
    },

    /// Key material could not be produced
    #[error("Key generation error: {0}")]
    KeyGeneration(String),

    /// Key derivation error
    #[error("Key derivation error: {0}")]
    KeyDerivation(String),

    /// Mnemonic error
    #[error("Mnemonic error: {0}")]
    Mnemonic(String),

    /// The signer could not produce a signed payload
    #[error("Signing error: {0}")]
    Signing(String),

    /// Unknown network discriminant
    #[error("Unsupported network: {0}")]
    UnsupportedNetwork(String),

    /// Invalid or incomplete configuration
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl Error {
    /// Wrap a read-path ledger failure
    pub fn lookup(context: &str, err: LedgerError) -> Self {
        Error::Lookup(format!("{}: {}", context, err))
    }

    /// Wrap a submission failure, deciding whether it is ambiguous
    pub fn broadcast(err: LedgerError) -> Self {
        let state = if err.may_have_been_accepted() {
            SubmissionState::Ambiguous
        } else {
            SubmissionState::NotSubmitted
        };
        Error::Broadcast { state, reason: err.to_string() }
    }

    /// True when a failed broadcast definitely did not reach the ledger,
    /// so the caller may rebuild and resubmit
    pub fn is_definitely_not_submitted(&self) -> bool {
        matches!(self, Error::Broadcast { state: SubmissionState::NotSubmitted, .. })
    }
}

/// Result type for provider operations
pub type Result<T> = std::result::Result<T, Error>;
