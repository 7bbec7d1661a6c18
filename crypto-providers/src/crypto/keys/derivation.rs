//! BIP-32 derivation of secp256k1 keys

use hmac::{Hmac, Mac};
use hmac::digest::KeyInit;
use sha2::Sha512;
use secp256k1::{Secp256k1, SecretKey, PublicKey};

use crate::error::{Error, Result};

const HARDENED: u32 = 0x8000_0000;

/// Derive the secp256k1 secret key at `path` (e.g. `m/44'/60'/0'/0/0`) from a BIP-39 seed
pub fn derive_secret_key(seed: &[u8], path: &str) -> Result<SecretKey> {
    let path_components = parse_derivation_path(path)?;

    let (mut secret_key, mut chain_code) = derive_master_key(seed)?;
    for component in path_components {
        (secret_key, chain_code) = derive_child_key(secret_key, chain_code, component)?;
    }

    SecretKey::from_slice(&secret_key)
        .map_err(|e| Error::KeyDerivation(format!("Invalid secret key: {}", e)))
}

/// Parse a BIP-32 derivation path
pub fn parse_derivation_path(path: &str) -> Result<Vec<u32>> {
    if !path.starts_with("m/") {
        return Err(Error::KeyDerivation(format!("Invalid derivation path: {}", path)));
    }

    let mut result = Vec::new();
    for component in path.trim_start_matches("m/").split('/') {
        if component.is_empty() {
            continue;
        }

        let hardened = component.ends_with('\'') || component.ends_with('h');
        let index = component
            .trim_end_matches(['\'', 'h'])
            .parse::<u32>()
            .ok()
            .filter(|index| *index < HARDENED)
            .ok_or_else(|| Error::KeyDerivation(format!("Invalid derivation path component: {}", component)))?;

        result.push(if hardened { HARDENED + index } else { index });
    }

    Ok(result)
}

/// Derive the master key from a seed
fn derive_master_key(seed: &[u8]) -> Result<([u8; 32], [u8; 32])> {
    let mut hmac = <Hmac<Sha512> as KeyInit>::new_from_slice(b"Bitcoin seed")
        .map_err(|_| Error::KeyDerivation("HMAC error".to_string()))?;

    hmac.update(seed);
    Ok(split_digest(&hmac.finalize().into_bytes()))
}

/// Derive a child key from a parent key
fn derive_child_key(parent_key: [u8; 32], parent_chain_code: [u8; 32], index: u32) -> Result<([u8; 32], [u8; 32])> {
    let secp = Secp256k1::new();
    let parent_secret_key = SecretKey::from_slice(&parent_key)
        .map_err(|e| Error::KeyDerivation(format!("Invalid parent key: {}", e)))?;

    let mut data = Vec::with_capacity(37);
    if index >= HARDENED {
        data.push(0);
        data.extend_from_slice(&parent_key);
    } else {
        let parent_public_key = PublicKey::from_secret_key(&secp, &parent_secret_key);
        data.extend_from_slice(&parent_public_key.serialize());
    }
    data.extend_from_slice(&index.to_be_bytes());

    let mut hmac = <Hmac<Sha512> as KeyInit>::new_from_slice(&parent_chain_code)
        .map_err(|_| Error::KeyDerivation("HMAC error".to_string()))?;
    hmac.update(&data);
    let (child_key, child_chain_code) = split_digest(&hmac.finalize().into_bytes());

    // child = IL + parent (mod n)
    let child_secret_key = SecretKey::from_slice(&child_key)
        .map_err(|e| Error::KeyDerivation(format!("Invalid child key: {}", e)))?
        .add_tweak(&parent_secret_key.into())
        .map_err(|e| Error::KeyDerivation(format!("Key addition error: {}", e)))?;

    Ok((child_secret_key.secret_bytes(), child_chain_code))
}

fn split_digest(digest: &[u8]) -> ([u8; 32], [u8; 32]) {
    let mut left = [0u8; 32];
    let mut right = [0u8; 32];
    left.copy_from_slice(&digest[0..32]);
    right.copy_from_slice(&digest[32..64]);
    (left, right)
}
