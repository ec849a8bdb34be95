//! EVM address handling.
//!
//! The registrar keys its records by account address. Inside the proof the
//! address appears as `addressInt`, the big-endian integer value of the 20
//! address bytes, embedded in the BN254 scalar field.

use std::fmt;
use std::str::FromStr;

use anyhow::{Context, Result};
use ark_ff::PrimeField;
use num_bigint::BigUint;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::babyjubjub::Base;
use crate::utils::validate_and_strip_hex;

/// Length of an EVM address in bytes.
pub const ADDRESS_BYTES: usize = 20;

/// Expected length of an address in hex characters (excluding 0x prefix).
pub const ADDRESS_HEX_LENGTH: usize = ADDRESS_BYTES * 2;

/// A 20-byte account address.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address([u8; ADDRESS_BYTES]);

impl Address {
    #[must_use]
    pub const fn from_bytes(bytes: [u8; ADDRESS_BYTES]) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; ADDRESS_BYTES] {
        &self.0
    }

    /// `addressInt` as a field element.
    #[must_use]
    pub fn to_field(&self) -> Base {
        Base::from_be_bytes_mod_order(&self.0)
    }

    /// Recovers an address from `addressInt`.
    ///
    /// Returns `None` if the value does not fit in 160 bits.
    #[must_use]
    pub fn from_field(value: &Base) -> Option<Self> {
        let int: BigUint = (*value).into();
        if int.bits() > (ADDRESS_BYTES as u64) * 8 {
            return None;
        }
        let be = int.to_bytes_be();
        let mut bytes = [0u8; ADDRESS_BYTES];
        bytes[ADDRESS_BYTES - be.len()..].copy_from_slice(&be);
        Some(Self(bytes))
    }
}

impl FromStr for Address {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = normalize_address(s)?;
        let decoded = hex::decode(&normalized).context("Failed to decode address from hex")?;
        let bytes: [u8; ADDRESS_BYTES] = decoded
            .try_into()
            .map_err(|_| anyhow::anyhow!("Address bytes length mismatch"))?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// Validates and normalizes a single address.
///
/// Returns a lowercase hex string without the 0x prefix.
///
/// # Errors
///
/// Returns an error if:
/// - The address is not exactly 40 hex characters (excluding 0x prefix)
/// - The address contains non-hex characters
///
/// # Examples
///
/// ```
/// use zkp_registration::ethereum::normalize_address;
///
/// let normalized = normalize_address("0x742d35Cc6634C0532925a3b844Bc454e4438f44e").unwrap();
/// assert_eq!(normalized, "742d35cc6634c0532925a3b844bc454e4438f44e");
/// ```
pub fn normalize_address(address: &str) -> Result<String> {
    validate_and_strip_hex(address, ADDRESS_HEX_LENGTH).map(|s| s.to_lowercase())
}
