//! Registration commitment.
//!
//! `commitment = Poseidon(chainId, scalar, addressInt)` with the circom
//! Poseidon parameters, so the value matches what the registration circuit
//! recomputes from its inputs. Binding the chain id makes a proof useless on
//! any other chain, and binding the address makes it useless for any other
//! account.

use std::fmt;

use ark_ff::PrimeField;
use light_poseidon::{Poseidon, PoseidonHasher};
use log::debug;
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

use crate::babyjubjub::Base;
use crate::error::RegistrationError;
use crate::ethereum::Address;
use crate::keys::Scalar;
use crate::utils::{field_modulus, field_to_decimal};

/// Number of Poseidon inputs.
pub const COMMITMENT_ARITY: usize = 3;

/// A commitment value, canonical in the base field.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Commitment(#[serde(with = "crate::utils::decimal")] Base);

impl Commitment {
    /// Accepts an integer only if it is a canonical base-field element.
    ///
    /// # Errors
    /// [`RegistrationError::CommitmentOutOfField`] if `value >= Q`.
    pub fn from_integer(value: BigUint) -> Result<Self, RegistrationError> {
        if value >= field_modulus::<Base>() {
            return Err(RegistrationError::CommitmentOutOfField);
        }
        Ok(Self(Base::from(value)))
    }

    #[must_use]
    pub fn as_field(&self) -> &Base {
        &self.0
    }
}

impl From<Base> for Commitment {
    fn from(value: Base) -> Self {
        Self(value)
    }
}

impl fmt::Display for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&field_to_decimal(&self.0))
    }
}

impl fmt::Debug for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Commitment({self})")
    }
}

/// Poseidon over three base-field elements.
///
/// # Errors
/// [`RegistrationError::Hash`] if the hasher cannot be built.
pub fn poseidon3(inputs: &[Base; COMMITMENT_ARITY]) -> Result<Base, RegistrationError> {
    let mut hasher = Poseidon::<Base>::new_circom(COMMITMENT_ARITY)
        .map_err(|e| RegistrationError::Hash(e.to_string()))?;
    hasher
        .hash(inputs)
        .map_err(|e| RegistrationError::Hash(e.to_string()))
}

/// Binds a chain id, a reduced scalar and an address into a commitment.
///
/// # Errors
/// - [`RegistrationError::Hash`] on a hash backend failure
/// - [`RegistrationError::CommitmentOutOfField`] if the digest is not a
///   canonical base-field element; the whole derivation must restart
pub fn bind(
    chain_id: u64,
    scalar: &Scalar,
    address: &Address,
) -> Result<Commitment, RegistrationError> {
    let digest = poseidon3(&[Base::from(chain_id), scalar.to_base(), address.to_field()])?;
    let commitment = Commitment::from_integer(digest.into_bigint().into())?;
    debug!("Bound commitment for {address} on chain {chain_id}");
    Ok(commitment)
}
