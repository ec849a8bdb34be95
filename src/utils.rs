//! Utility functions for hex validation and field-element encoding.
//!
//! Every value that crosses the prover or ledger boundary is a field element
//! written as a canonical numeric string. Parsing here is strict: a value at or
//! above the field modulus is rejected, never silently reduced.

use anyhow::Result;
use ark_ff::PrimeField;
use num_bigint::BigUint;
use thiserror::Error;

/// Failure to read a field element from its textual encoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldError {
    #[error("empty field element")]
    Empty,
    #[error("invalid digits in field element '{0}'")]
    InvalidDigits(String),
    #[error("value {0} is not below the field modulus")]
    OutOfRange(String),
}

fn is_valid_hex_string(s: &str) -> bool {
    s.chars().all(|c| c.is_ascii_hexdigit())
}

fn strip_hex_prefix(input: &str) -> &str {
    input
        .trim()
        .strip_prefix("0x")
        .or_else(|| input.trim().strip_prefix("0X"))
        .unwrap_or_else(|| input.trim())
}

fn has_hex_prefix(input: &str) -> bool {
    let trimmed = input.trim();
    trimmed.starts_with("0x") || trimmed.starts_with("0X")
}

/// Validates and strips hex prefix from a string.
///
/// # Errors
/// Returns an error if:
/// - The hex string has incorrect length
/// - The hex string contains non-hex characters
///
/// # Examples
///
/// ```
/// use zkp_registration::utils::validate_and_strip_hex;
///
/// let result = validate_and_strip_hex("0x1234abcd", 8).unwrap();
/// assert_eq!(result, "1234abcd");
/// ```
pub fn validate_and_strip_hex(input: &str, expected_len: usize) -> Result<String> {
    let stripped = strip_hex_prefix(input);

    if stripped.len() != expected_len {
        return Err(anyhow::anyhow!(
            "Invalid hex string: must be {} characters (got {})",
            expected_len,
            stripped.len()
        ));
    }

    if !is_valid_hex_string(stripped) {
        return Err(anyhow::anyhow!(
            "Invalid hex string: contains non-hex characters"
        ));
    }

    Ok(stripped.to_string())
}

/// The modulus of `F` as an unbounded integer.
#[must_use]
pub fn field_modulus<F: PrimeField>() -> BigUint {
    let max: BigUint = (-F::one()).into();
    max + 1u32
}

/// Parses a non-negative integer written in decimal, or in hex with a `0x`
/// prefix.
///
/// # Errors
/// Returns [`FieldError::Empty`] or [`FieldError::InvalidDigits`].
pub fn parse_integer(input: &str) -> Result<BigUint, FieldError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(FieldError::Empty);
    }

    let parsed = if has_hex_prefix(trimmed) {
        let digits = strip_hex_prefix(trimmed);
        if digits.is_empty() || !is_valid_hex_string(digits) {
            None
        } else {
            BigUint::parse_bytes(digits.as_bytes(), 16)
        }
    } else if trimmed.chars().all(|c| c.is_ascii_digit()) {
        BigUint::parse_bytes(trimmed.as_bytes(), 10)
    } else {
        None
    };

    parsed.ok_or_else(|| FieldError::InvalidDigits(trimmed.to_string()))
}

/// Parses a canonical field element.
///
/// # Errors
/// Returns an error if the input is not a number or is `>=` the modulus of `F`.
///
/// # Examples
///
/// ```
/// use zkp_registration::utils::parse_field;
///
/// let x: ark_bn254::Fr = parse_field("12345").unwrap();
/// assert_eq!(x, ark_bn254::Fr::from(12345u64));
/// ```
pub fn parse_field<F: PrimeField>(input: &str) -> Result<F, FieldError> {
    let value = parse_integer(input)?;
    if value >= field_modulus::<F>() {
        return Err(FieldError::OutOfRange(value.to_string()));
    }
    Ok(F::from(value))
}

/// Canonical decimal encoding of a field element.
#[must_use]
pub fn field_to_decimal<F: PrimeField>(field: &F) -> String {
    let value: BigUint = (*field).into();
    value.to_string()
}

/// Serde adapter writing a field element as a decimal string.
pub mod decimal {
    use ark_ff::PrimeField;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<F: PrimeField, S: Serializer>(
        field: &F,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::field_to_decimal(field))
    }

    pub fn deserialize<'de, F: PrimeField, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<F, D::Error> {
        let text = String::deserialize(deserializer)?;
        super::parse_field(&text).map_err(de::Error::custom)
    }
}
