//! Deterministic test doubles for the prover and verifier.
//!
//! Neither provides any soundness. They exist so the registrar's state machine
//! can be exercised without a circuit, and so tests can observe whether a
//! verification call happened at all.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::babyjubjub::Base;
use crate::error::RegistrationError;
use crate::proof::{ProofPoints, RawProof};
use crate::witness::WitnessDocument;

use super::{ProofVerifier, ProvingBackend};

/// Verifier returning a fixed answer and counting calls.
///
/// Clones share the counter.
#[derive(Debug, Clone)]
pub struct StaticVerifier {
    outcome: Result<bool, RegistrationError>,
    delay: Option<Duration>,
    calls: Arc<AtomicUsize>,
}

impl StaticVerifier {
    fn with_outcome(outcome: Result<bool, RegistrationError>) -> Self {
        Self {
            outcome,
            delay: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn accepting() -> Self {
        Self::with_outcome(Ok(true))
    }

    pub fn rejecting() -> Self {
        Self::with_outcome(Ok(false))
    }

    pub fn unavailable(reason: &str) -> Self {
        Self::with_outcome(Err(RegistrationError::VerifierUnavailable(
            reason.to_string(),
        )))
    }

    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of `verify` calls made through this verifier or its clones.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ProofVerifier for StaticVerifier {
    fn verify(&self, _proof: &ProofPoints, _signals: &[Base]) -> Result<bool, RegistrationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            thread::sleep(delay);
        }
        self.outcome.clone()
    }
}

/// Prover returning a fixed raw proof and counting calls.
#[derive(Debug, Clone)]
pub struct StaticProver {
    proof: RawProof,
    delay: Option<Duration>,
    calls: Arc<AtomicUsize>,
}

impl StaticProver {
    pub fn new(proof: RawProof) -> Self {
        Self {
            proof,
            delay: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ProvingBackend for StaticProver {
    fn prove(&self, _witness: &WitnessDocument) -> Result<RawProof, RegistrationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            thread::sleep(delay);
        }
        Ok(self.proof.clone())
    }
}
