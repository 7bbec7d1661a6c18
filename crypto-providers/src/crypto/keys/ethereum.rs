//! Ethereum key generation and address handling

use std::str::FromStr;

use ethers::types::Address;
use ethers::utils::to_checksum;
use ethers_signers::{LocalWallet, Signer};
use secp256k1::{PublicKey, Secp256k1};

use crate::crypto::mnemonic::{generate_mnemonic, mnemonic_to_seed, MnemonicStrength};
use crate::error::{Error, Result};
use crate::transaction::KeyPair;
use super::derivation::derive_secret_key;

/// Default BIP-44 path for the first Ethereum account
pub const DEFAULT_PATH: &str = "m/44'/60'/0'/0/0";

/// Generate a fresh mnemonic and derive the account at `path`
pub fn generate_key_pair(path: Option<&str>) -> Result<KeyPair> {
    let mnemonic = generate_mnemonic(MnemonicStrength::Words12)?;
    let seed = mnemonic_to_seed(&mnemonic, None)?;
    let secret_key = derive_secret_key(&seed, path.unwrap_or(DEFAULT_PATH))?;

    let wallet = LocalWallet::from_bytes(&secret_key.secret_bytes())
        .map_err(|e| Error::KeyGeneration(format!("Failed to build wallet: {}", e)))?;
    let public_key = PublicKey::from_secret_key(&Secp256k1::new(), &secret_key);

    Ok(KeyPair {
        address: to_checksum(&wallet.address(), None),
        private_key: format!("0x{}", hex::encode(secret_key.secret_bytes())),
        public_key: Some(format!("0x{}", hex::encode(public_key.serialize_uncompressed()))),
        mnemonic: Some(mnemonic),
        auxiliary_address: None,
    })
}

/// Parse a `0x`-prefixed address, enforcing the EIP-55 checksum on mixed-case input
pub fn parse_address(address: &str) -> Option<Address> {
    let hex_part = address.strip_prefix("0x").or_else(|| address.strip_prefix("0X"))?;
    if hex_part.len() != 40 {
        return None;
    }
    let parsed = Address::from_str(hex_part).ok()?;

    let has_lower = hex_part.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = hex_part.chars().any(|c| c.is_ascii_uppercase());
    if has_lower && has_upper && to_checksum(&parsed, None)[2..] != *hex_part {
        return None;
    }

    Some(parsed)
}

/// Whether `address` is a well-formed Ethereum address
pub fn is_valid_address(address: &str) -> bool {
    parse_address(address).is_some()
}

/// Load a signing wallet from a hex private key
pub fn wallet_from_private_key(private_key: &str) -> Result<LocalWallet> {
    private_key
        .trim()
        .parse::<LocalWallet>()
        .map_err(|e| Error::Validation(format!("Invalid private key: {}", e)))
}

/// Address controlled by a hex private key
pub fn address_of(private_key: &str) -> Result<Address> {
    Ok(wallet_from_private_key(private_key)?.address())
}
