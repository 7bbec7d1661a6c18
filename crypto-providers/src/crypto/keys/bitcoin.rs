//! Bitcoin key generation and address handling

use std::str::FromStr;

use ::bitcoin::{Address, Network, PrivateKey};
use secp256k1::Secp256k1;

use crate::crypto::mnemonic::{generate_mnemonic, mnemonic_to_seed, MnemonicStrength};
use crate::error::{Error, Result};
use crate::transaction::KeyPair;
use super::derivation::derive_secret_key;

/// Default BIP-44 path for the first Bitcoin account
pub const DEFAULT_PATH: &str = "m/44'/0'/0'/0/0";

/// Generate a fresh mnemonic and derive the key at `path`.
///
/// The primary address is P2PKH; the P2WPKH encoding of the same key is
/// returned as the auxiliary address.
pub fn generate_key_pair(path: Option<&str>, network: Network) -> Result<KeyPair> {
    let mnemonic = generate_mnemonic(MnemonicStrength::Words12)?;
    let seed = mnemonic_to_seed(&mnemonic, None)?;
    let secret_key = derive_secret_key(&seed, path.unwrap_or(DEFAULT_PATH))?;

    let private_key = PrivateKey::new(secret_key, network);
    let public_key = private_key.public_key(&Secp256k1::new());
    let segwit = Address::p2wpkh(&public_key, network)
        .map_err(|e| Error::KeyGeneration(format!("Failed to encode segwit address: {}", e)))?;

    Ok(KeyPair {
        address: Address::p2pkh(&public_key, network).to_string(),
        private_key: private_key.to_wif(),
        public_key: Some(public_key.to_string()),
        mnemonic: Some(mnemonic),
        auxiliary_address: Some(segwit.to_string()),
    })
}

/// Parse an address and require it to belong to `network`
pub fn parse_address(address: &str, network: Network) -> Option<Address> {
    let unchecked = Address::from_str(address.trim()).ok()?;
    unchecked.require_network(network).ok()
}

/// Whether `address` is valid on `network`
pub fn is_valid_address(address: &str, network: Network) -> bool {
    parse_address(address, network).is_some()
}

/// Parse a WIF private key
pub fn parse_private_key(wif: &str) -> Result<PrivateKey> {
    PrivateKey::from_wif(wif.trim()).map_err(|e| Error::Validation(format!("Invalid WIF private key: {}", e)))
}

/// Every address encoding this crate issues for a private key
pub fn addresses_of(private_key: &PrivateKey, network: Network) -> Vec<String> {
    let public_key = private_key.public_key(&Secp256k1::new());
    let mut addresses = vec![Address::p2pkh(&public_key, network).to_string()];
    if let Ok(segwit) = Address::p2wpkh(&public_key, network) {
        addresses.push(segwit.to_string());
    }
    addresses
}
