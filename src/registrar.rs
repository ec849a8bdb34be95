//! Registration validator.
//!
//! Owns the registry and decides each submission. Checks run in a fixed order
//! and the first failure ends the submission with the registry untouched:
//!
//! 1. exactly five well-formed public signals (no verifier call otherwise)
//! 2. decode `(pubX, pubY, addressInt, chainId, commitment)`; the public
//!    key must be a non-identity point of the prime-order subgroup
//!
//!    With [`Registrar::submit_from`] the submitting account must also equal
//!    `addressInt`, so a proof observed in transit cannot be registered by
//!    anyone else.
//! 3. chain id equals the current chain id
//! 4. address not yet registered
//! 5. commitment not yet consumed
//! 6. the verifier accepts the proof
//! 7. record the public key and consume the commitment together
//!
//! The registrar takes `&mut self` for submissions and does no locking.
//! Callers that share it serialize access themselves.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use log::{debug, info, warn};

use crate::babyjubjub::Base;
use crate::backend::ProofVerifier;
use crate::commitment::Commitment;
use crate::error::RegistrationError;
use crate::ethereum::Address;
use crate::keys::PublicPoint;
use crate::proof::{ProofPoints, RegistrationCall};
use crate::signals::{parse_signal_strings, PublicSignals};
use crate::store::{RegistryState, RegistryStore};

/// Supplies the chain id at submission time.
pub trait ChainIdSource {
    fn current_chain_id(&self) -> u64;
}

impl ChainIdSource for u64 {
    fn current_chain_id(&self) -> u64 {
        *self
    }
}

/// Shared, updatable chain id, re-read on every submission.
impl ChainIdSource for Arc<AtomicU64> {
    fn current_chain_id(&self) -> u64 {
        self.load(Ordering::SeqCst)
    }
}

fn check_sender(sender: Option<&Address>, address: &Address) -> Result<(), RegistrationError> {
    match sender {
        Some(sender) if sender != address => Err(RegistrationError::InvalidSender {
            sender: *sender,
            address: *address,
        }),
        _ => Ok(()),
    }
}

pub struct Registrar<V, S, C = u64> {
    verifier: V,
    store: S,
    chain: C,
}

impl<V, S, C> Registrar<V, S, C>
where
    V: ProofVerifier,
    S: RegistryStore,
    C: ChainIdSource,
{
    pub fn new(verifier: V, store: S, chain: C) -> Self {
        Self {
            verifier,
            store,
            chain,
        }
    }

    /// Validates a proof and its public signals and records the registration.
    ///
    /// # Errors
    /// The first failing check, see the module documentation.
    pub fn submit(
        &mut self,
        proof: &ProofPoints,
        signals: &[Base],
    ) -> Result<PublicSignals, RegistrationError> {
        self.process(None, proof, signals)
    }

    /// As [`Registrar::submit`], for a submission sent by `sender`.
    ///
    /// # Errors
    /// [`RegistrationError::InvalidSender`] if `sender` is not the proven
    /// address, checked right after decoding; otherwise as
    /// [`Registrar::submit`].
    pub fn submit_from(
        &mut self,
        sender: &Address,
        proof: &ProofPoints,
        signals: &[Base],
    ) -> Result<PublicSignals, RegistrationError> {
        self.process(Some(sender), proof, signals)
    }

    /// Submits registration calldata.
    ///
    /// # Errors
    /// As [`Registrar::submit`]. Unparsable signals are
    /// [`RegistrationError::MalformedPublicSignals`].
    pub fn register(&mut self, call: &RegistrationCall) -> Result<PublicSignals, RegistrationError> {
        let signals = parse_signal_strings(&call.public_signals)?;
        self.submit(&call.proof_points, &signals)
    }

    /// Submits registration calldata sent by `sender`.
    ///
    /// # Errors
    /// As [`Registrar::submit_from`].
    pub fn register_from(
        &mut self,
        sender: &Address,
        call: &RegistrationCall,
    ) -> Result<PublicSignals, RegistrationError> {
        let signals = parse_signal_strings(&call.public_signals)?;
        self.submit_from(sender, &call.proof_points, &signals)
    }

    fn process(
        &mut self,
        sender: Option<&Address>,
        proof: &ProofPoints,
        signals: &[Base],
    ) -> Result<PublicSignals, RegistrationError> {
        let decoded = PublicSignals::try_from(signals).map_err(|err| {
            warn!("Rejected submission: {err}");
            err
        })?;
        let PublicSignals {
            public_key,
            address,
            chain_id,
            commitment,
        } = decoded;
        debug!("Submission for {address} with commitment {commitment}");

        let result = check_sender(sender, &address)
            .and_then(|()| self.check_preconditions(&address, chain_id, &commitment))
            .and_then(|()| self.check_proof(proof, signals))
            .and_then(|()| self.store.commit(address, public_key, commitment));

        match result {
            Ok(()) => {
                info!("Registered {address} on chain {chain_id}");
                Ok(decoded)
            }
            Err(err) => {
                warn!("Rejected submission for {address}: {err}");
                Err(err)
            }
        }
    }

    fn check_preconditions(
        &self,
        address: &Address,
        chain_id: u64,
        commitment: &Commitment,
    ) -> Result<(), RegistrationError> {
        let current = self.chain.current_chain_id();
        if chain_id != current {
            return Err(RegistrationError::ChainMismatch {
                proof: chain_id,
                current,
            });
        }
        let state = self.store.state();
        if state.is_registered(address) {
            return Err(RegistrationError::AlreadyRegistered(*address));
        }
        if state.is_commitment_used(commitment) {
            return Err(RegistrationError::ReplayedCommitment(*commitment));
        }
        Ok(())
    }

    fn check_proof(&self, proof: &ProofPoints, signals: &[Base]) -> Result<(), RegistrationError> {
        if self.verifier.verify(proof, signals)? {
            Ok(())
        } else {
            Err(RegistrationError::InvalidProof)
        }
    }

    #[must_use]
    pub fn is_registered(&self, address: &Address) -> bool {
        self.store.state().is_registered(address)
    }

    /// # Errors
    /// [`RegistrationError::NotRegistered`] if the address has no record.
    pub fn public_key(&self, address: &Address) -> Result<PublicPoint, RegistrationError> {
        self.store
            .state()
            .records
            .get(address)
            .copied()
            .ok_or(RegistrationError::NotRegistered(*address))
    }

    #[must_use]
    pub fn is_commitment_used(&self, commitment: &Commitment) -> bool {
        self.store.state().is_commitment_used(commitment)
    }

    #[must_use]
    pub fn current_chain_id(&self) -> u64 {
        self.chain.current_chain_id()
    }

    #[must_use]
    pub fn state(&self) -> &RegistryState {
        self.store.state()
    }

    pub fn verifier(&self) -> &V {
        &self.verifier
    }

    pub fn into_store(self) -> S {
        self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::StaticVerifier;
    use crate::commitment::bind;
    use crate::keys::{KeyPair, ENTROPY_BYTES};
    use crate::store::MemoryStore;

    const FUJI: u64 = 43113;

    fn proof() -> ProofPoints {
        let one = ark_bn254::Fq::from(1u64);
        ProofPoints {
            a: [one; 2],
            b: [[one; 2]; 2],
            c: [one; 2],
        }
    }

    fn signals_for(seed: u8, address: Address, chain_id: u64) -> Vec<Base> {
        let pair = KeyPair::generate(&[seed; ENTROPY_BYTES]).unwrap();
        let commitment = bind(chain_id, pair.scalar(), &address).unwrap();
        PublicSignals::new(*pair.public_key(), address, chain_id, commitment)
            .to_field_elements()
            .to_vec()
    }

    fn registrar(verifier: StaticVerifier) -> Registrar<StaticVerifier, MemoryStore> {
        Registrar::new(verifier, MemoryStore::new(), FUJI)
    }

    #[test]
    fn test_valid_submission_registers() {
        let mut registrar = registrar(StaticVerifier::accepting());
        let address = Address::from_bytes([1u8; 20]);
        let decoded = registrar
            .submit(&proof(), &signals_for(1, address, FUJI))
            .unwrap();

        assert!(registrar.is_registered(&address));
        assert_eq!(registrar.public_key(&address).unwrap(), decoded.public_key);
        assert!(registrar.is_commitment_used(&decoded.commitment));
    }

    #[test]
    fn test_second_registration_is_rejected() {
        let mut registrar = registrar(StaticVerifier::accepting());
        let address = Address::from_bytes([1u8; 20]);
        registrar
            .submit(&proof(), &signals_for(1, address, FUJI))
            .unwrap();
        let err = registrar
            .submit(&proof(), &signals_for(2, address, FUJI))
            .unwrap_err();
        assert_eq!(err, RegistrationError::AlreadyRegistered(address));
    }

    #[test]
    fn test_chain_mismatch_is_checked_before_verification() {
        let verifier = StaticVerifier::accepting();
        let mut registrar = Registrar::new(verifier.clone(), MemoryStore::new(), 2u64);
        let address = Address::from_bytes([1u8; 20]);
        let err = registrar
            .submit(&proof(), &signals_for(1, address, 1))
            .unwrap_err();
        assert_eq!(
            err,
            RegistrationError::ChainMismatch {
                proof: 1,
                current: 2
            }
        );
        assert_eq!(verifier.calls(), 0);
    }

    #[test]
    fn test_short_signals_never_reach_verifier() {
        let verifier = StaticVerifier::accepting();
        let mut registrar = registrar(verifier.clone());
        let signals = signals_for(1, Address::from_bytes([1u8; 20]), FUJI);
        let err = registrar.submit(&proof(), &signals[..4]).unwrap_err();
        assert!(matches!(err, RegistrationError::MalformedPublicSignals(_)));
        assert_eq!(verifier.calls(), 0);
    }

    #[test]
    fn test_rejected_proof_leaves_state_unchanged() {
        let mut registrar = registrar(StaticVerifier::rejecting());
        let address = Address::from_bytes([1u8; 20]);
        let before = serde_json::to_vec(registrar.state()).unwrap();
        let err = registrar
            .submit(&proof(), &signals_for(1, address, FUJI))
            .unwrap_err();
        assert_eq!(err, RegistrationError::InvalidProof);
        assert_eq!(serde_json::to_vec(registrar.state()).unwrap(), before);
        assert!(!registrar.is_registered(&address));
    }

    #[test]
    fn test_unavailable_verifier_is_not_invalid_proof() {
        let mut registrar = registrar(StaticVerifier::unavailable("timeout"));
        let address = Address::from_bytes([1u8; 20]);
        let err = registrar
            .submit(&proof(), &signals_for(1, address, FUJI))
            .unwrap_err();
        assert!(matches!(err, RegistrationError::VerifierUnavailable(_)));
        assert!(!registrar.is_registered(&address));
    }

    #[test]
    fn test_identity_and_low_order_keys_never_reach_verifier() {
        use crate::babyjubjub::Point;

        let verifier = StaticVerifier::accepting();
        let mut registrar = registrar(verifier.clone());
        let address = Address::from_bytes([1u8; 20]);
        let mut signals = signals_for(1, address, FUJI);

        let order_two = Point::new(Base::from(0u64), -Base::from(1u64)).unwrap();
        for key in [Point::IDENTITY, order_two] {
            signals[0] = key.x;
            signals[1] = key.y;
            let err = registrar.submit(&proof(), &signals).unwrap_err();
            assert!(matches!(err, RegistrationError::MalformedPublicSignals(_)));
            assert!(!registrar.is_registered(&address));
        }
        assert_eq!(verifier.calls(), 0);
    }

    #[test]
    fn test_sender_must_match_proven_address() {
        let verifier = StaticVerifier::accepting();
        let mut registrar = registrar(verifier.clone());
        let owner = Address::from_bytes([1u8; 20]);
        let front_runner = Address::from_bytes([2u8; 20]);
        let signals = signals_for(1, owner, FUJI);

        let err = registrar
            .submit_from(&front_runner, &proof(), &signals)
            .unwrap_err();
        assert_eq!(
            err,
            RegistrationError::InvalidSender {
                sender: front_runner,
                address: owner
            }
        );
        assert_eq!(verifier.calls(), 0);
        assert!(!registrar.is_registered(&owner));

        registrar.submit_from(&owner, &proof(), &signals).unwrap();
        assert!(registrar.is_registered(&owner));
    }

    #[test]
    fn test_sender_is_checked_before_chain_id() {
        let mut registrar = Registrar::new(StaticVerifier::accepting(), MemoryStore::new(), 2u64);
        let owner = Address::from_bytes([1u8; 20]);
        let err = registrar
            .submit_from(&Address::from_bytes([3u8; 20]), &proof(), &signals_for(1, owner, 1))
            .unwrap_err();
        assert!(matches!(err, RegistrationError::InvalidSender { .. }));
    }

    #[test]
    fn test_public_key_of_unknown_address() {
        let registrar = registrar(StaticVerifier::accepting());
        let address = Address::from_bytes([5u8; 20]);
        assert_eq!(
            registrar.public_key(&address),
            Err(RegistrationError::NotRegistered(address))
        );
    }

    #[test]
    fn test_shared_chain_id_is_reread() {
        let chain = Arc::new(AtomicU64::new(FUJI));
        let verifier = StaticVerifier::accepting();
        let mut registrar = Registrar::new(verifier, MemoryStore::new(), Arc::clone(&chain));
        let address = Address::from_bytes([1u8; 20]);
        let signals = signals_for(1, address, FUJI);

        chain.store(1, Ordering::SeqCst);
        assert!(matches!(
            registrar.submit(&proof(), &signals),
            Err(RegistrationError::ChainMismatch { .. })
        ));

        chain.store(FUJI, Ordering::SeqCst);
        registrar.submit(&proof(), &signals).unwrap();
        assert_eq!(registrar.current_chain_id(), FUJI);
    }
}
