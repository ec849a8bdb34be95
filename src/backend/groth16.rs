//! In-process Groth16 verification over BN254.
//!
//! Loads the `verification_key.json` that snarkjs exports and checks
//! [`ProofPoints`] with `ark-groth16`. Proof points arrive in verifier order
//! (`B` pairs as `[c1, c0]`) and are turned back into `Fq2` elements here.

use std::fs;
use std::path::Path;

use ark_bn254::{Bn254, Fq, Fq2, G1Affine, G2Affine};
use ark_ec::AffineRepr;
use ark_ff::Zero;
use ark_groth16::{Groth16, PreparedVerifyingKey, Proof, VerifyingKey};
use ark_snark::SNARK;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::babyjubjub::Base;
use crate::error::RegistrationError;
use crate::proof::{order_g2_pair, CoordinateOrder, ProofPoints, RawProof};
use crate::utils::{field_to_decimal, parse_field};

use super::ProofVerifier;

/// `verification_key.json` as written by `snarkjs zkey export verificationkey`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnarkjsVerificationKey {
    pub protocol: String,
    pub curve: String,
    #[serde(rename = "nPublic")]
    pub n_public: usize,
    pub vk_alpha_1: Vec<String>,
    pub vk_beta_2: Vec<Vec<String>>,
    pub vk_gamma_2: Vec<Vec<String>>,
    pub vk_delta_2: Vec<Vec<String>>,
    #[serde(rename = "IC")]
    pub ic: Vec<Vec<String>>,
}

fn key_error(reason: impl std::fmt::Display) -> RegistrationError {
    RegistrationError::VerifierUnavailable(format!("invalid verification key: {reason}"))
}

fn parse_fq(value: &str, name: &str) -> Result<Fq, String> {
    parse_field::<Fq>(value).map_err(|e| format!("{name}: {e}"))
}

/// Accepts the encoded identity `(0, 0)` or a point on the curve in the
/// prime-order subgroup.
fn checked_g1(x: Fq, y: Fq) -> Option<G1Affine> {
    if x.is_zero() && y.is_zero() {
        return Some(G1Affine::zero());
    }
    let point = G1Affine::new_unchecked(x, y);
    (point.is_on_curve() && point.is_in_correct_subgroup_assuming_on_curve()).then_some(point)
}

fn checked_g2(x: Fq2, y: Fq2) -> Option<G2Affine> {
    if x.is_zero() && y.is_zero() {
        return Some(G2Affine::zero());
    }
    let point = G2Affine::new_unchecked(x, y);
    (point.is_on_curve() && point.is_in_correct_subgroup_assuming_on_curve()).then_some(point)
}

fn snarkjs_g1(coords: &[String], name: &str) -> Result<G1Affine, String> {
    match coords {
        [_, _, z] if z.trim() == "0" => Ok(G1Affine::zero()),
        [x, y, z] if z.trim() == "1" => {
            checked_g1(parse_fq(x, name)?, parse_fq(y, name)?)
                .ok_or_else(|| format!("{name} is not a valid G1 point"))
        }
        _ => Err(format!("{name} is not an affine G1 point")),
    }
}

fn snarkjs_g2(coords: &[Vec<String>], name: &str) -> Result<G2Affine, String> {
    let fq2 = |row: &[String]| -> Result<Fq2, String> {
        match row {
            [c0, c1] => Ok(Fq2::new(parse_fq(c0, name)?, parse_fq(c1, name)?)),
            _ => Err(format!("{name} coordinates must be pairs")),
        }
    };
    match coords {
        [_, _, z] if z.len() == 2 && z[0].trim() == "0" && z[1].trim() == "0" => {
            Ok(G2Affine::zero())
        }
        [x, y, z] if z.len() == 2 && z[0].trim() == "1" && z[1].trim() == "0" => {
            checked_g2(fq2(x)?, fq2(y)?).ok_or_else(|| format!("{name} is not a valid G2 point"))
        }
        _ => Err(format!("{name} is not an affine G2 point")),
    }
}

fn g1_coords(point: &G1Affine) -> Vec<String> {
    if point.infinity {
        return vec!["0".into(), "1".into(), "0".into()];
    }
    vec![
        field_to_decimal(&point.x),
        field_to_decimal(&point.y),
        "1".into(),
    ]
}

fn g2_coords(point: &G2Affine) -> Vec<Vec<String>> {
    let fq2 = |v: &Fq2| vec![field_to_decimal(&v.c0), field_to_decimal(&v.c1)];
    if point.infinity {
        return vec![
            vec!["0".into(), "0".into()],
            vec!["1".into(), "0".into()],
            vec!["0".into(), "0".into()],
        ];
    }
    vec![fq2(&point.x), fq2(&point.y), vec!["1".into(), "0".into()]]
}

impl SnarkjsVerificationKey {
    #[must_use]
    pub fn from_verifying_key(vk: &VerifyingKey<Bn254>) -> Self {
        Self {
            protocol: "groth16".to_string(),
            curve: "bn128".to_string(),
            n_public: vk.gamma_abc_g1.len().saturating_sub(1),
            vk_alpha_1: g1_coords(&vk.alpha_g1),
            vk_beta_2: g2_coords(&vk.beta_g2),
            vk_gamma_2: g2_coords(&vk.gamma_g2),
            vk_delta_2: g2_coords(&vk.delta_g2),
            ic: vk.gamma_abc_g1.iter().map(g1_coords).collect(),
        }
    }

    /// # Errors
    /// [`RegistrationError::VerifierUnavailable`] if the key is not a BN254
    /// Groth16 key or any point fails to decode.
    pub fn to_verifying_key(&self) -> Result<VerifyingKey<Bn254>, RegistrationError> {
        if self.protocol != "groth16" {
            return Err(key_error(format!("protocol '{}'", self.protocol)));
        }
        if self.curve != "bn128" && self.curve != "bn254" {
            return Err(key_error(format!("curve '{}'", self.curve)));
        }
        if self.ic.len() != self.n_public + 1 {
            return Err(key_error(format!(
                "{} IC points for {} public inputs",
                self.ic.len(),
                self.n_public
            )));
        }
        let gamma_abc_g1 = self
            .ic
            .iter()
            .enumerate()
            .map(|(i, p)| snarkjs_g1(p, &format!("IC[{i}]")))
            .collect::<Result<Vec<_>, _>>()
            .map_err(key_error)?;
        Ok(VerifyingKey {
            alpha_g1: snarkjs_g1(&self.vk_alpha_1, "vk_alpha_1").map_err(key_error)?,
            beta_g2: snarkjs_g2(&self.vk_beta_2, "vk_beta_2").map_err(key_error)?,
            gamma_g2: snarkjs_g2(&self.vk_gamma_2, "vk_gamma_2").map_err(key_error)?,
            delta_g2: snarkjs_g2(&self.vk_delta_2, "vk_delta_2").map_err(key_error)?,
            gamma_abc_g1,
        })
    }
}

/// Writes an arkworks proof in the snarkjs `proof.json` layout.
#[must_use]
pub fn snarkjs_proof(proof: &Proof<Bn254>) -> RawProof {
    RawProof::Snarkjs {
        pi_a: g1_coords(&proof.a),
        pi_b: g2_coords(&proof.b),
        pi_c: g1_coords(&proof.c),
        protocol: Some("groth16".to_string()),
    }
}

/// Rebuilds an arkworks proof from verifier-order points.
///
/// # Errors
/// [`RegistrationError::MalformedProof`] if a point is off its curve or
/// outside the prime-order subgroup.
pub fn to_ark_proof(points: &ProofPoints) -> Result<Proof<Bn254>, RegistrationError> {
    let fq2 = |pair: [Fq; 2]| {
        let [c0, c1] = order_g2_pair(pair, CoordinateOrder::RealFirst);
        Fq2::new(c0, c1)
    };
    let a = checked_g1(points.a[0], points.a[1])
        .ok_or_else(|| RegistrationError::MalformedProof("a is not a valid G1 point".into()))?;
    let b = checked_g2(fq2(points.b[0]), fq2(points.b[1]))
        .ok_or_else(|| RegistrationError::MalformedProof("b is not a valid G2 point".into()))?;
    let c = checked_g1(points.c[0], points.c[1])
        .ok_or_else(|| RegistrationError::MalformedProof("c is not a valid G1 point".into()))?;
    Ok(Proof { a, b, c })
}

/// Groth16 verifier bound to one circuit's verifying key.
pub struct Groth16Verifier {
    pvk: PreparedVerifyingKey<Bn254>,
    public_inputs: usize,
}

impl Groth16Verifier {
    /// # Errors
    /// [`RegistrationError::VerifierUnavailable`] if the key cannot be prepared.
    pub fn new(vk: &VerifyingKey<Bn254>) -> Result<Self, RegistrationError> {
        let pvk = Groth16::<Bn254>::process_vk(vk).map_err(key_error)?;
        Ok(Self {
            pvk,
            public_inputs: vk.gamma_abc_g1.len().saturating_sub(1),
        })
    }

    /// # Errors
    /// [`RegistrationError::VerifierUnavailable`] on unparsable JSON or an
    /// invalid key.
    pub fn from_snarkjs_json(json: &str) -> Result<Self, RegistrationError> {
        let key: SnarkjsVerificationKey = serde_json::from_str(json).map_err(key_error)?;
        Self::new(&key.to_verifying_key()?)
    }

    /// # Errors
    /// [`RegistrationError::VerifierUnavailable`] if the file cannot be read
    /// or does not hold a valid key.
    pub fn load(path: &Path) -> Result<Self, RegistrationError> {
        let json = fs::read_to_string(path).map_err(|e| {
            RegistrationError::VerifierUnavailable(format!(
                "failed to read verification key {}: {e}",
                path.display()
            ))
        })?;
        let verifier = Self::from_snarkjs_json(&json)?;
        info!(
            "Loaded Groth16 verification key from {} ({} public inputs)",
            path.display(),
            verifier.public_inputs
        );
        Ok(verifier)
    }

    #[must_use]
    pub fn public_inputs(&self) -> usize {
        self.public_inputs
    }
}

impl ProofVerifier for Groth16Verifier {
    fn verify(&self, proof: &ProofPoints, signals: &[Base]) -> Result<bool, RegistrationError> {
        if signals.len() != self.public_inputs {
            return Err(RegistrationError::MalformedPublicSignals(format!(
                "verification key expects {} public inputs, got {}",
                self.public_inputs,
                signals.len()
            )));
        }
        let proof = to_ark_proof(proof)?;
        let valid = Groth16::<Bn254>::verify_with_processed_vk(&self.pvk, signals, &proof)
            .map_err(|e| RegistrationError::VerifierUnavailable(e.to_string()))?;
        debug!("Groth16 pairing check returned {valid}");
        Ok(valid)
    }
}
