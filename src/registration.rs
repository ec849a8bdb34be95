//! Client-side registration pipeline.
//!
//! derive key → bind commitment → export witness → prove → format calldata.

use log::{debug, info, warn};
use rand::{CryptoRng, RngCore};

use crate::backend::ProvingBackend;
use crate::commitment::{bind, Commitment};
use crate::error::RegistrationError;
use crate::ethereum::Address;
use crate::keys::KeyPair;
use crate::proof::{ProofFormatter, RegistrationCall};
use crate::witness::{export, WitnessDocument};

/// Fresh derivations attempted before giving up on an out-of-field commitment.
pub const MAX_DERIVATION_ATTEMPTS: u32 = 8;

/// Everything produced before the prover runs.
#[derive(Debug, Clone)]
pub struct PreparedRegistration {
    pub key_pair: KeyPair,
    pub address: Address,
    pub chain_id: u64,
    pub commitment: Commitment,
    pub witness: WitnessDocument,
}

/// Binds an existing key pair to `(chain_id, address)`.
///
/// # Errors
/// [`RegistrationError::CommitmentOutOfField`] or [`RegistrationError::Hash`].
pub fn prepare_with_key(
    key_pair: KeyPair,
    chain_id: u64,
    address: Address,
) -> Result<PreparedRegistration, RegistrationError> {
    let commitment = bind(chain_id, key_pair.scalar(), &address)?;
    let witness = export(
        key_pair.scalar(),
        key_pair.public_key(),
        &address,
        chain_id,
        &commitment,
    );
    Ok(PreparedRegistration {
        key_pair,
        address,
        chain_id,
        commitment,
        witness,
    })
}

/// Derives a fresh key and prepares its witness.
///
/// An out-of-field commitment restarts from new entropy, up to
/// [`MAX_DERIVATION_ATTEMPTS`] times.
///
/// # Errors
/// [`RegistrationError::CommitmentOutOfField`] once the attempts are
/// exhausted, or [`RegistrationError::Hash`].
pub fn prepare_registration<R: RngCore + CryptoRng>(
    rng: &mut R,
    chain_id: u64,
    address: Address,
) -> Result<PreparedRegistration, RegistrationError> {
    let prepared = derive_until_in_field(rng, |key_pair| {
        prepare_with_key(key_pair, chain_id, address)
    })?;
    info!("Prepared registration for {address} on chain {chain_id}");
    Ok(prepared)
}

/// Draws key pairs until `prepare` yields a commitment inside the field.
fn derive_until_in_field<R, F>(
    rng: &mut R,
    mut prepare: F,
) -> Result<PreparedRegistration, RegistrationError>
where
    R: RngCore + CryptoRng,
    F: FnMut(KeyPair) -> Result<PreparedRegistration, RegistrationError>,
{
    for attempt in 1..=MAX_DERIVATION_ATTEMPTS {
        match prepare(KeyPair::random(rng)) {
            Ok(prepared) => return Ok(prepared),
            Err(RegistrationError::CommitmentOutOfField) => {
                warn!("Commitment out of field on attempt {attempt}, re-deriving");
            }
            Err(err) => return Err(err),
        }
    }
    Err(RegistrationError::CommitmentOutOfField)
}

/// Runs the prover and shapes its output into registration calldata.
///
/// # Errors
/// Prover failures as reported by the backend, and
/// [`RegistrationError::MalformedProof`] if the output cannot be normalized.
pub fn prove_and_format<P: ProvingBackend + ?Sized>(
    prover: &P,
    formatter: &ProofFormatter,
    prepared: &PreparedRegistration,
) -> Result<RegistrationCall, RegistrationError> {
    debug!("Requesting proof for {}", prepared.address);
    let raw = prover.prove(&prepared.witness)?;
    formatter.format(&raw, &prepared.witness.public_inputs)
}
