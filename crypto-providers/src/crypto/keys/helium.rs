//! Helium (ed25519) key generation and address handling

use ed25519_dalek::{SigningKey, VerifyingKey};
use sha2::{Digest, Sha256};

use crate::crypto::mnemonic::{generate_mnemonic, mnemonic_to_entropy, MnemonicStrength};
use crate::error::{Error, Result};
use crate::transaction::KeyPair;

/// b58check version byte of account addresses
const ADDRESS_VERSION: u8 = 0x00;
/// Key-type prefix of a mainnet ed25519 key
const ED25519_KEY_TYPE: u8 = 0x01;
const CHECKSUM_LEN: usize = 4;
/// version, key type, 32-byte key, checksum
const ADDRESS_LEN: usize = 1 + 1 + 32 + CHECKSUM_LEN;

/// Generate a 12-word account; the private credential is the mnemonic itself
pub fn generate_key_pair() -> Result<KeyPair> {
    let words = generate_mnemonic(MnemonicStrength::Words12)?;
    let signing_key = signing_key_from_words(&words)?;
    let address = address_from_key(&signing_key.verifying_key());

    if !is_valid_address(&address) {
        return Err(Error::KeyGeneration(format!("Produced an invalid address: {}", address)));
    }

    Ok(KeyPair {
        address,
        private_key: words.clone(),
        public_key: Some(hex::encode(signing_key.verifying_key().to_bytes())),
        mnemonic: Some(words),
        auxiliary_address: None,
    })
}

/// Rebuild the signing key encoded by a mnemonic.
///
/// 12-word phrases carry 16 bytes of entropy, which are repeated to form
/// the 32-byte ed25519 seed.
pub fn signing_key_from_words(words: &str) -> Result<SigningKey> {
    let entropy = mnemonic_to_entropy(words)?;

    let mut seed = [0u8; 32];
    match entropy.len() {
        16 => {
            seed[..16].copy_from_slice(&entropy);
            seed[16..].copy_from_slice(&entropy);
        }
        32 => seed.copy_from_slice(&entropy),
        n => {
            return Err(Error::KeyDerivation(format!(
                "Unsupported mnemonic entropy length: {} bytes",
                n
            )))
        }
    }

    Ok(SigningKey::from_bytes(&seed))
}

/// b58check address of an ed25519 public key
pub fn address_from_key(public_key: &VerifyingKey) -> String {
    let mut payload = Vec::with_capacity(ADDRESS_LEN);
    payload.push(ADDRESS_VERSION);
    payload.push(ED25519_KEY_TYPE);
    payload.extend_from_slice(public_key.as_bytes());

    let checksum = checksum(&payload);
    payload.extend_from_slice(&checksum);

    bs58::encode(payload).into_string()
}

/// Whether `address` is a b58check account address wrapping an ed25519 public key
pub fn is_valid_address(address: &str) -> bool {
    let decoded = match bs58::decode(address.trim()).into_vec() {
        Ok(decoded) => decoded,
        Err(_) => return false,
    };
    if decoded.len() != ADDRESS_LEN || decoded[0] != ADDRESS_VERSION || decoded[1] != ED25519_KEY_TYPE {
        return false;
    }

    let (body, check) = decoded.split_at(ADDRESS_LEN - CHECKSUM_LEN);
    if checksum(body) != check {
        return false;
    }

    let mut key = [0u8; 32];
    key.copy_from_slice(&body[2..]);
    VerifyingKey::from_bytes(&key).is_ok()
}

/// Whether `words` derive the key behind `address`
pub fn words_control_address(words: &str, address: &str) -> bool {
    signing_key_from_words(words)
        .map(|key| address_from_key(&key.verifying_key()) == address.trim())
        .unwrap_or(false)
}

// sha256d, first four bytes
fn checksum(data: &[u8]) -> [u8; CHECKSUM_LEN] {
    let first = Sha256::digest(data);
    let second = Sha256::digest(first);
    let mut out = [0u8; CHECKSUM_LEN];
    out.copy_from_slice(&second[..CHECKSUM_LEN]);
    out
}
