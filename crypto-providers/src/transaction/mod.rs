//! Transaction providers
//!
//! One [`CryptoProvider`] per network, built by [`ProviderFactory`]. Each
//! provider owns its fee/nonce strategy and feeds chain-specific lookups
//! into the shared [`ConfirmationTracker`].

pub mod types;
pub mod tracker;
pub mod provider;
mod evm;
mod ethereum;
mod token;
mod helium;
mod bitcoin;

pub use types::*;
pub use tracker::*;
pub use provider::*;
pub use ethereum::*;
pub use token::*;
pub use helium::*;
pub use bitcoin::*;
