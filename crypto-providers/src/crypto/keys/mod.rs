//! Key derivation and management
//!
//! Per-chain key generation and address codecs.

pub mod bitcoin;
pub mod ethereum;
pub mod helium;
mod derivation;

pub use derivation::*;
