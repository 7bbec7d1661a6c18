//! Conversion between human-readable decimal amounts and native integer units
//!
//! Amounts are handled as [`U256`] so that 18-decimal values never pass
//! through floating point. Fractional digits beyond `decimals` are
//! truncated (floor), which is the only rounding this module performs.

use ethers_core::types::U256;

use crate::error::{Error, Result};

/// Convert a human decimal string (e.g. `"1.25"`) into native units
pub fn to_native(value: &str, decimals: u32) -> Result<U256> {
    let value = value.trim();
    let (int_part, frac_part) = match value.split_once('.') {
        Some((int_part, frac_part)) => (int_part, frac_part),
        None => (value, ""),
    };

    if int_part.is_empty() && frac_part.is_empty() {
        return Err(Error::InvalidAmount(format!("Empty amount: '{}'", value)));
    }
    if !int_part.chars().chain(frac_part.chars()).all(|c| c.is_ascii_digit()) {
        return Err(Error::InvalidAmount(format!("Not a non-negative decimal: '{}'", value)));
    }

    let width = decimals as usize;
    let frac: String = frac_part.chars().take(width).collect();
    let digits = format!("{}{:0<width$}", int_part, frac, width = width);
    let digits = digits.trim_start_matches('0');
    if digits.is_empty() {
        return Ok(U256::zero());
    }

    U256::from_dec_str(digits)
        .map_err(|e| Error::InvalidAmount(format!("Amount '{}' out of range: {}", value, e)))
}

/// Convert native units back into a canonical human decimal string
pub fn from_native(amount: U256, decimals: u32) -> String {
    let digits = amount.to_string();
    let width = decimals as usize;
    if width == 0 {
        return digits;
    }

    let padded = format!("{:0>width$}", digits, width = width + 1);
    let (int_part, frac_part) = padded.split_at(padded.len() - width);
    let frac_part = frac_part.trim_end_matches('0');

    if frac_part.is_empty() {
        int_part.to_string()
    } else {
        format!("{}.{}", int_part, frac_part)
    }
}

/// Narrow a native amount into `u64` for chains with 64-bit amounts
pub fn native_to_u64(amount: U256) -> Result<u64> {
    if amount > U256::from(u64::MAX) {
        return Err(Error::InvalidAmount(format!("Amount {} exceeds 64-bit range", amount)));
    }
    Ok(amount.low_u64())
}
