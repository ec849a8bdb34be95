//! Zero-knowledge identity registration.
//!
//! A participant binds a Baby Jubjub public key to its EVM address once, by
//! proving in zero knowledge that it knows the matching private scalar and
//! that a Poseidon commitment over `(chainId, scalar, address)` was formed
//! from it. The registrar accepts each address and each commitment once.
//!
//! # Components
//!
//! - [`keys`]: key derivation from 64 bytes of entropy
//! - [`commitment`]: `Poseidon(chainId, scalar, addressInt)`
//! - [`witness`]: ordered prover input
//! - [`proof`]: normalization of raw Groth16 output into verifier order
//! - [`registrar`]: the validator owning the registry
//! - [`backend`]: prover/verifier capabilities, including a Groth16 verifier
//!
//! # Example
//!
//! ```no_run
//! use rand::rngs::OsRng;
//! use zkp_registration::{
//!     backend::mock::StaticVerifier, registration::prepare_registration, store::MemoryStore,
//!     Registrar,
//! };
//!
//! let address = "0x742d35Cc6634C0532925a3b844Bc454e4438f44e".parse().unwrap();
//! let prepared = prepare_registration(&mut OsRng, 43113, address).unwrap();
//! let registrar = Registrar::new(StaticVerifier::accepting(), MemoryStore::new(), 43113u64);
//! assert!(!registrar.is_registered(&prepared.address));
//! ```

pub mod babyjubjub;
pub mod backend;
pub mod commitment;
pub mod config;
pub mod error;
pub mod ethereum;
pub mod keys;
pub mod proof;
pub mod registrar;
pub mod registration;
pub mod signals;
pub mod store;
pub mod utils;
pub mod witness;

pub use commitment::{bind, Commitment};
pub use error::{Recovery, RegistrationError};
pub use ethereum::Address;
pub use keys::{KeyPair, PublicPoint, Scalar};
pub use proof::{ProofFormatter, ProofPoints, RawProof, RegistrationCall};
pub use registrar::{ChainIdSource, Registrar};
pub use signals::{PublicSignal, PublicSignals, PUBLIC_SIGNAL_COUNT};
pub use witness::WitnessDocument;
