//! External proving and verification capabilities.
//!
//! The registration core never proves or pairs anything itself. It calls
//! through two narrow traits so that a subprocess prover, an in-process
//! Groth16 verifier or a test double can be plugged in interchangeably.
//!
//! A backend that cannot answer reports [`RegistrationError::ProverUnavailable`]
//! or [`RegistrationError::VerifierUnavailable`]. A verifier that answers
//! `false` reports a bad proof. The two are never conflated.

pub mod groth16;
#[cfg(any(test, feature = "mock"))]
pub mod mock;

use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::warn;

use crate::babyjubjub::Base;
use crate::error::RegistrationError;
use crate::proof::{ProofPoints, RawProof};
use crate::witness::WitnessDocument;

/// Produces a raw proof artifact from a witness document.
pub trait ProvingBackend: Send + Sync {
    fn prove(&self, witness: &WitnessDocument) -> Result<RawProof, RegistrationError>;
}

/// Checks a normalized proof against public signals in circuit order.
pub trait ProofVerifier: Send + Sync {
    /// `Ok(false)` means the proof is wrong. `Err` means no answer was obtained.
    fn verify(&self, proof: &ProofPoints, signals: &[Base]) -> Result<bool, RegistrationError>;
}

impl<T: ProvingBackend + ?Sized> ProvingBackend for Arc<T> {
    fn prove(&self, witness: &WitnessDocument) -> Result<RawProof, RegistrationError> {
        (**self).prove(witness)
    }
}

impl<T: ProofVerifier + ?Sized> ProofVerifier for Arc<T> {
    fn verify(&self, proof: &ProofPoints, signals: &[Base]) -> Result<bool, RegistrationError> {
        (**self).verify(proof, signals)
    }
}

/// Bounds the wall-clock time of a prover or verifier call.
///
/// The call runs on a worker thread. When the deadline passes the caller gets
/// an `*Unavailable` error and the worker's eventual result is discarded.
///
/// The worker is not cancelled: it keeps running until the wrapped backend
/// returns. A backend that can hang indefinitely (a stuck subprocess, a dead
/// socket) must bound its own work, otherwise every timed-out call leaves one
/// more thread behind.
#[derive(Debug)]
pub struct Deadline<B> {
    inner: Arc<B>,
    timeout: Duration,
}

impl<B> Deadline<B> {
    pub fn new(inner: B, timeout: Duration) -> Self {
        Self {
            inner: Arc::new(inner),
            timeout,
        }
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn inner(&self) -> &B {
        &self.inner
    }
}

impl<B> Clone for Deadline<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            timeout: self.timeout,
        }
    }
}

enum Outcome<T> {
    Done(T),
    TimedOut,
    Died,
}

fn run_with_deadline<T, F>(timeout: Duration, job: F) -> Outcome<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        // The receiver is gone after a timeout; nothing left to report to.
        let _ = tx.send(job());
    });
    match rx.recv_timeout(timeout) {
        Ok(value) => Outcome::Done(value),
        Err(RecvTimeoutError::Timeout) => Outcome::TimedOut,
        Err(RecvTimeoutError::Disconnected) => Outcome::Died,
    }
}

impl<B: ProvingBackend + 'static> ProvingBackend for Deadline<B> {
    fn prove(&self, witness: &WitnessDocument) -> Result<RawProof, RegistrationError> {
        let inner = Arc::clone(&self.inner);
        let witness = witness.clone();
        match run_with_deadline(self.timeout, move || inner.prove(&witness)) {
            Outcome::Done(result) => result,
            Outcome::TimedOut => {
                warn!("Prover did not answer within {:?}", self.timeout);
                Err(RegistrationError::ProverUnavailable(format!(
                    "timed out after {:?}",
                    self.timeout
                )))
            }
            Outcome::Died => Err(RegistrationError::ProverUnavailable(
                "prover worker exited without a result".to_string(),
            )),
        }
    }
}

impl<V: ProofVerifier + 'static> ProofVerifier for Deadline<V> {
    fn verify(&self, proof: &ProofPoints, signals: &[Base]) -> Result<bool, RegistrationError> {
        let inner = Arc::clone(&self.inner);
        let proof = proof.clone();
        let signals = signals.to_vec();
        match run_with_deadline(self.timeout, move || inner.verify(&proof, &signals)) {
            Outcome::Done(result) => result,
            Outcome::TimedOut => {
                warn!("Verifier did not answer within {:?}", self.timeout);
                Err(RegistrationError::VerifierUnavailable(format!(
                    "timed out after {:?}",
                    self.timeout
                )))
            }
            Outcome::Died => Err(RegistrationError::VerifierUnavailable(
                "verifier worker exited without a result".to_string(),
            )),
        }
    }
}
