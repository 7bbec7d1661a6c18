//! Cryptographic primitives
//!
//! Mnemonic handling, hierarchical key derivation and the per-chain key
//! and address codecs used by the providers.

pub mod mnemonic;
pub mod keys;

pub use mnemonic::*;
pub use keys::*;
