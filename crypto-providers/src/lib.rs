//! Crypto Providers - multi-chain transaction lifecycle
//!
//! This library puts Bitcoin, Ethereum, ERC-20 tokens and Helium behind a
//! single provider contract: key generation, balance queries, fee and nonce
//! selection, signing, broadcast and confirmation tracking. Ledger access is
//! injected through the traits in [`ledger`].

pub mod error;
pub mod config;
pub mod units;
pub mod crypto;
pub mod ledger;
pub mod transaction;

// Re-export commonly used types for convenience
pub use config::{ChainConfig, ConnectorSettings, Network};
pub use error::{Error, Result, SubmissionState};
pub use ledger::{EthersConnector, LedgerConnector, LedgerError};
pub use transaction::{
    CryptoProvider, ProviderFactory, SendResult, TransactionIntent, TransactionPayload, TransactionStatus,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
