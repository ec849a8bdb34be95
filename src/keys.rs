//! Key derivation on Baby Jubjub.
//!
//! A registrant's secret is a scalar in `[1, L)` and its public key is
//! `scalar · Base8`. Derivation is a pure function of 64 bytes of entropy:
//! the bytes are read as a big-endian integer and reduced modulo `L`.

use std::fmt;

use ark_ff::{PrimeField, Zero};
use log::{debug, warn};
use num_bigint::BigUint;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, Zeroizing};

use crate::babyjubjub::{Base, Point, ScalarField, BASE8};
use crate::error::RegistrationError;
use crate::utils::field_to_decimal;

/// Number of entropy bytes consumed per derivation.
///
/// 512 bits reduced modulo a 251-bit order leaves a negligible bias.
pub const ENTROPY_BYTES: usize = 64;

/// Public half of a key pair.
pub type PublicPoint = Point;

/// A reduced, non-zero private scalar.
///
/// The value is wiped from memory when dropped and never printed by `Debug`.
#[derive(Clone, PartialEq, Eq)]
pub struct Scalar(ScalarField);

impl Scalar {
    /// Wraps an already reduced value.
    ///
    /// # Errors
    /// [`RegistrationError::ZeroScalar`] if `value` is zero.
    pub fn new(value: ScalarField) -> Result<Self, RegistrationError> {
        if value.is_zero() {
            return Err(RegistrationError::ZeroScalar);
        }
        Ok(Self(value))
    }

    #[must_use]
    pub fn as_field(&self) -> &ScalarField {
        &self.0
    }

    /// The scalar embedded in the base field, as hashed into the commitment.
    ///
    /// `L < Q`, so this never wraps.
    #[must_use]
    pub fn to_base(&self) -> Base {
        let value: BigUint = self.0.into();
        Base::from(value)
    }

    /// Canonical decimal string, as handed to the prover.
    #[must_use]
    pub fn to_decimal(&self) -> Zeroizing<String> {
        Zeroizing::new(field_to_decimal(&self.0))
    }
}

impl Drop for Scalar {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl fmt::Debug for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Scalar(<redacted>)")
    }
}

/// A private scalar together with its public point.
#[derive(Clone, Debug)]
pub struct KeyPair {
    scalar: Scalar,
    public: PublicPoint,
}

impl KeyPair {
    /// Derives a key pair from raw entropy.
    ///
    /// # Errors
    /// [`RegistrationError::ZeroScalar`] if the entropy reduces to zero modulo
    /// `L`. Callers draw fresh entropy and try again.
    pub fn generate(entropy: &[u8; ENTROPY_BYTES]) -> Result<Self, RegistrationError> {
        let scalar = Scalar::new(ScalarField::from_be_bytes_mod_order(entropy))?;
        Ok(Self::from_scalar(scalar))
    }

    /// Derives a key pair from fresh randomness, resampling on a zero scalar.
    pub fn random<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let mut attempt: u32 = 1;
        loop {
            let mut entropy = Zeroizing::new([0u8; ENTROPY_BYTES]);
            rng.fill_bytes(&mut entropy[..]);

            match Self::generate(&entropy) {
                Ok(pair) => {
                    debug!("Derived key pair after {attempt} attempt(s)");
                    return pair;
                }
                Err(err) => {
                    warn!("Discarding entropy sample {attempt}: {err}");
                    attempt = attempt.saturating_add(1);
                }
            }
        }
    }

    /// Rebuilds the pair from a stored scalar.
    #[must_use]
    pub fn from_scalar(scalar: Scalar) -> Self {
        let public = BASE8.mul_scalar(scalar.as_field());
        Self { scalar, public }
    }

    #[must_use]
    pub fn scalar(&self) -> &Scalar {
        &self.scalar
    }

    #[must_use]
    pub fn public_key(&self) -> &PublicPoint {
        &self.public
    }

    /// Serializable form for the key file written by `keygen`.
    #[must_use]
    pub fn to_key_file(&self) -> KeyFile {
        KeyFile {
            private_key: self.scalar.to_decimal().to_string(),
            public_key: self.public,
        }
    }
}

/// On-disk key material. Holds the reduced scalar only.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyFile {
    pub private_key: String,
    pub public_key: PublicPoint,
}

impl Drop for KeyFile {
    fn drop(&mut self) {
        self.private_key.zeroize();
    }
}

impl fmt::Debug for KeyFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyFile")
            .field("private_key", &"<redacted>")
            .field("public_key", &self.public_key)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::field_modulus;
    use rand::rngs::OsRng;

    /// Hands out fixed entropy blocks in order, one per `fill_bytes` call.
    struct ScriptedRng {
        blocks: Vec<[u8; ENTROPY_BYTES]>,
        draws: usize,
    }

    impl ScriptedRng {
        fn new(blocks: Vec<[u8; ENTROPY_BYTES]>) -> Self {
            Self { blocks, draws: 0 }
        }
    }

    impl RngCore for ScriptedRng {
        fn next_u32(&mut self) -> u32 {
            let mut bytes = [0u8; 4];
            self.fill_bytes(&mut bytes);
            u32::from_le_bytes(bytes)
        }

        fn next_u64(&mut self) -> u64 {
            let mut bytes = [0u8; 8];
            self.fill_bytes(&mut bytes);
            u64::from_le_bytes(bytes)
        }

        fn fill_bytes(&mut self, dest: &mut [u8]) {
            let block = self.blocks[self.draws];
            dest.copy_from_slice(&block[..dest.len()]);
            self.draws += 1;
        }

        fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
            self.fill_bytes(dest);
            Ok(())
        }
    }

    impl CryptoRng for ScriptedRng {}

    #[test]
    fn test_generate_reference_vector() {
        let pair = KeyPair::generate(&[0x42; ENTROPY_BYTES]).unwrap();
        assert_eq!(
            pair.scalar().to_decimal().as_str(),
            "2045206663729168640636898983614676771260254921434891967905191314121014321910"
        );
        assert_eq!(
            field_to_decimal(&pair.public_key().x),
            "9787034538515094124282391628248974168311417293089733835854217521611942610304"
        );
        assert_eq!(
            field_to_decimal(&pair.public_key().y),
            "12384279204144605423856901837672017484999103421160863379359015991212415231014"
        );
    }

    #[test]
    fn test_generate_reads_entropy_big_endian() {
        let mut entropy = [0u8; ENTROPY_BYTES];
        for (i, byte) in entropy.iter_mut().enumerate() {
            *byte = i as u8;
        }
        let pair = KeyPair::generate(&entropy).unwrap();
        assert_eq!(
            pair.scalar().to_decimal().as_str(),
            "2055639516672947335555619796753579201088918367135731391401986453258840736723"
        );
        assert_eq!(
            field_to_decimal(&pair.public_key().x),
            "8116335766752323186116331963299175460434338037883985325188920779809029539528"
        );
    }

    #[test]
    fn test_generate_is_deterministic() {
        let a = KeyPair::generate(&[7u8; ENTROPY_BYTES]).unwrap();
        let b = KeyPair::generate(&[7u8; ENTROPY_BYTES]).unwrap();
        assert_eq!(a.scalar(), b.scalar());
        assert_eq!(a.public_key(), b.public_key());
    }

    #[test]
    fn test_zero_entropy_is_rejected() {
        let result = KeyPair::generate(&[0u8; ENTROPY_BYTES]);
        assert_eq!(result.unwrap_err(), RegistrationError::ZeroScalar);
    }

    #[test]
    fn test_entropy_equal_to_order_is_rejected() {
        let order = field_modulus::<ScalarField>().to_bytes_be();
        let mut entropy = [0u8; ENTROPY_BYTES];
        entropy[ENTROPY_BYTES - order.len()..].copy_from_slice(&order);
        assert_eq!(
            KeyPair::generate(&entropy).unwrap_err(),
            RegistrationError::ZeroScalar
        );
    }

    #[test]
    fn test_random_resamples_zero_scalar() {
        let order = field_modulus::<ScalarField>().to_bytes_be();
        let mut order_entropy = [0u8; ENTROPY_BYTES];
        order_entropy[ENTROPY_BYTES - order.len()..].copy_from_slice(&order);

        let mut rng = ScriptedRng::new(vec![
            [0u8; ENTROPY_BYTES],
            order_entropy,
            [0x42; ENTROPY_BYTES],
        ]);
        let pair = KeyPair::random(&mut rng);

        let expected = KeyPair::generate(&[0x42; ENTROPY_BYTES]).unwrap();
        assert_eq!(pair.scalar(), expected.scalar());
        assert_eq!(pair.public_key(), expected.public_key());
        assert_eq!(rng.draws, 3);
    }

    #[test]
    fn test_random_public_key_is_in_subgroup() {
        let pair = KeyPair::random(&mut OsRng);
        assert!(pair.public_key().is_in_prime_subgroup());
        assert!(!pair.public_key().is_identity());
    }

    #[test]
    fn test_scalar_debug_is_redacted() {
        let scalar = Scalar::new(ScalarField::from(12345u64)).unwrap();
        assert_eq!(format!("{scalar:?}"), "Scalar(<redacted>)");
        assert_eq!(scalar.to_base(), Base::from(12345u64));
    }

    #[test]
    fn test_from_scalar_matches_generate() {
        let pair = KeyPair::generate(&[0x42; ENTROPY_BYTES]).unwrap();
        let rebuilt = KeyPair::from_scalar(pair.scalar().clone());
        assert_eq!(rebuilt.public_key(), pair.public_key());
    }

    #[test]
    fn test_key_file_carries_reduced_scalar() {
        let pair = KeyPair::generate(&[0x42; ENTROPY_BYTES]).unwrap();
        let json = serde_json::to_value(pair.to_key_file()).unwrap();
        assert_eq!(
            json["privateKey"],
            "2045206663729168640636898983614676771260254921434891967905191314121014321910"
        );
        assert_eq!(
            json["publicKey"]["x"],
            "9787034538515094124282391628248974168311417293089733835854217521611942610304"
        );
    }
}
