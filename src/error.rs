//! Error taxonomy for registration.
//!
//! Every failure keeps its own kind so that calling tooling can decide
//! whether to resample keys, regenerate the proof, retry the call, or stop.

use thiserror::Error;

use crate::commitment::Commitment;
use crate::ethereum::Address;

/// What a caller should do after a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// Draw fresh entropy and derive again. Handled internally by key generation.
    Resample,
    /// Restart the whole derivation: new key, new commitment, new proof.
    Rederive,
    /// Keep the key, build a new witness and proof.
    RegenerateProof,
    /// The same call may succeed later.
    Retry,
    /// The outcome is final for these inputs.
    Abort,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    #[error("derived scalar is zero")]
    ZeroScalar,

    #[error("commitment is not below the base-field modulus")]
    CommitmentOutOfField,

    #[error("malformed public signals: {0}")]
    MalformedPublicSignals(String),

    #[error("malformed proof: {0}")]
    MalformedProof(String),

    #[error("sender {sender} does not match the proven address {address}")]
    InvalidSender { sender: Address, address: Address },

    #[error("chain id mismatch: proof is bound to {proof}, current chain is {current}")]
    ChainMismatch { proof: u64, current: u64 },

    #[error("address {0} is already registered")]
    AlreadyRegistered(Address),

    #[error("commitment {0} has already been used")]
    ReplayedCommitment(Commitment),

    #[error("proof rejected by verifier")]
    InvalidProof,

    #[error("address {0} is not registered")]
    NotRegistered(Address),

    #[error("prover unavailable: {0}")]
    ProverUnavailable(String),

    #[error("verifier unavailable: {0}")]
    VerifierUnavailable(String),

    #[error("hash backend failure: {0}")]
    Hash(String),

    #[error("registry storage failure: {0}")]
    Storage(String),
}

impl RegistrationError {
    #[must_use]
    pub fn recovery(&self) -> Recovery {
        match self {
            Self::ZeroScalar => Recovery::Resample,
            Self::CommitmentOutOfField => Recovery::Rederive,
            Self::MalformedPublicSignals(_)
            | Self::MalformedProof(_)
            | Self::ChainMismatch { .. }
            | Self::InvalidProof => Recovery::RegenerateProof,
            Self::ProverUnavailable(_) | Self::VerifierUnavailable(_) | Self::Storage(_) => {
                Recovery::Retry
            }
            Self::InvalidSender { .. }
            | Self::AlreadyRegistered(_)
            | Self::ReplayedCommitment(_)
            | Self::NotRegistered(_)
            | Self::Hash(_) => Recovery::Abort,
        }
    }
}
