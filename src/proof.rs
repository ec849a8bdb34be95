//! Normalization of raw Groth16 prover output.
//!
//! Provers disagree on how they write the `B` point. Its coordinates live in
//! `Fq2 = Fq[u]`, and the EVM pairing precompile (EIP-197) expects each pair
//! as `[c1, c0]` (imaginary part first). snarkjs writes `[c0, c1]`, gnark
//! already writes `[c1, c0]`. [`order_g2_pair`] is the only place that
//! ordering is handled.

use ark_bn254::Fq;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::RegistrationError;
use crate::signals::PublicSignals;
use crate::utils::{field_to_decimal, parse_field};

/// Number of field elements in a flat proof.
pub const PROOF_ELEMENTS: usize = 8;

/// Coordinate layout of each `B` pair in a backend's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinateOrder {
    /// `[c1, c0]`, the verifier's layout.
    ImaginaryFirst,
    /// `[c0, c1]`, the snarkjs layout.
    RealFirst,
}

/// Reorders one `B` pair from `order` into verifier order.
///
/// Applying it twice with the same order returns the input, so it also maps
/// verifier order back to the backend's layout.
#[must_use]
pub fn order_g2_pair<T>(pair: [T; 2], order: CoordinateOrder) -> [T; 2] {
    match order {
        CoordinateOrder::ImaginaryFirst => pair,
        CoordinateOrder::RealFirst => {
            let [first, second] = pair;
            [second, first]
        }
    }
}

/// Proving backend whose output format is expected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProofBackend {
    #[default]
    Snarkjs,
    Gnark,
}

/// Groth16 proof points in verifier order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ProofPointsRepr", into = "ProofPointsRepr")]
pub struct ProofPoints {
    pub a: [Fq; 2],
    /// Each pair is `[c1, c0]`.
    pub b: [[Fq; 2]; 2],
    pub c: [Fq; 2],
}

#[derive(Serialize, Deserialize)]
struct ProofPointsRepr {
    a: [String; 2],
    b: [[String; 2]; 2],
    c: [String; 2],
}

impl From<ProofPoints> for ProofPointsRepr {
    fn from(points: ProofPoints) -> Self {
        let pair = |p: [Fq; 2]| p.map(|v| field_to_decimal(&v));
        Self {
            a: pair(points.a),
            b: points.b.map(pair),
            c: pair(points.c),
        }
    }
}

impl TryFrom<ProofPointsRepr> for ProofPoints {
    type Error = RegistrationError;

    fn try_from(repr: ProofPointsRepr) -> Result<Self, Self::Error> {
        let pair = |p: &[String; 2], name: &str| -> Result<[Fq; 2], RegistrationError> {
            Ok([
                parse_coordinate(&p[0], name)?,
                parse_coordinate(&p[1], name)?,
            ])
        };
        Ok(Self {
            a: pair(&repr.a, "a")?,
            b: [pair(&repr.b[0], "b[0]")?, pair(&repr.b[1], "b[1]")?],
            c: pair(&repr.c, "c")?,
        })
    }
}

impl ProofPoints {
    /// `(a0, a1, b00, b01, b10, b11, c0, c1)` in verifier order.
    #[must_use]
    pub fn to_flat(&self) -> [Fq; PROOF_ELEMENTS] {
        [
            self.a[0], self.a[1], self.b[0][0], self.b[0][1], self.b[1][0], self.b[1][1],
            self.c[0], self.c[1],
        ]
    }
}

fn parse_coordinate(value: &str, name: &str) -> Result<Fq, RegistrationError> {
    parse_field::<Fq>(value).map_err(|e| RegistrationError::MalformedProof(format!("{name}: {e}")))
}

/// Prover output as written to disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawProof {
    /// snarkjs `proof.json`: projective coordinates with `z = 1`.
    Snarkjs {
        pi_a: Vec<String>,
        pi_b: Vec<Vec<String>>,
        pi_c: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        protocol: Option<String>,
    },
    /// `{ "proof": [a0, a1, b00, b01, b10, b11, c0, c1] }`
    Wrapped { proof: Vec<String> },
    /// `[a0, a1, b00, b01, b10, b11, c0, c1]`
    Flat(Vec<String>),
}

impl RawProof {
    /// The eight affine coordinates in the backend's own nesting.
    fn coordinates(&self) -> Result<[&str; PROOF_ELEMENTS], RegistrationError> {
        match self {
            RawProof::Snarkjs {
                pi_a,
                pi_b,
                pi_c,
                protocol,
            } => {
                if let Some(protocol) = protocol {
                    if protocol != "groth16" {
                        return Err(RegistrationError::MalformedProof(format!(
                            "unsupported protocol '{protocol}'"
                        )));
                    }
                }
                let a = affine_g1(pi_a, "pi_a")?;
                let b = affine_g2(pi_b)?;
                let c = affine_g1(pi_c, "pi_c")?;
                Ok([a[0], a[1], b[0], b[1], b[2], b[3], c[0], c[1]])
            }
            RawProof::Wrapped { proof } | RawProof::Flat(proof) => {
                let values: Vec<&str> = proof.iter().map(String::as_str).collect();
                values.try_into().map_err(|v: Vec<&str>| {
                    RegistrationError::MalformedProof(format!(
                        "expected {PROOF_ELEMENTS} proof elements, got {}",
                        v.len()
                    ))
                })
            }
        }
    }
}

fn affine_g1<'a>(point: &'a [String], name: &str) -> Result<[&'a str; 2], RegistrationError> {
    match point {
        [x, y] => Ok([x.as_str(), y.as_str()]),
        [x, y, z] if z.trim() == "1" => Ok([x.as_str(), y.as_str()]),
        [_, _, _] => Err(RegistrationError::MalformedProof(format!(
            "{name} is not in affine form"
        ))),
        _ => Err(RegistrationError::MalformedProof(format!(
            "{name} must have 2 or 3 coordinates, got {}",
            point.len()
        ))),
    }
}

fn fq2_pair<'a>(row: &'a [String], name: &str) -> Result<[&'a str; 2], RegistrationError> {
    match row {
        [c0, c1] => Ok([c0.as_str(), c1.as_str()]),
        _ => Err(RegistrationError::MalformedProof(format!(
            "{name} must have 2 coordinates, got {}",
            row.len()
        ))),
    }
}

fn affine_g2(point: &[Vec<String>]) -> Result<[&str; 4], RegistrationError> {
    let (x, y) = match point {
        [x, y] => (x, y),
        [x, y, z] => {
            if fq2_pair(z, "pi_b[2]")?.map(str::trim) != ["1", "0"] {
                return Err(RegistrationError::MalformedProof(
                    "pi_b is not in affine form".to_string(),
                ));
            }
            (x, y)
        }
        _ => {
            return Err(RegistrationError::MalformedProof(format!(
                "pi_b must have 2 or 3 rows, got {}",
                point.len()
            )))
        }
    };
    let [x0, x1] = fq2_pair(x, "pi_b[0]")?;
    let [y0, y1] = fq2_pair(y, "pi_b[1]")?;
    Ok([x0, x1, y0, y1])
}

/// Calldata for `register`: `{ proofPoints, publicSignals }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationCall {
    pub proof_points: ProofPoints,
    pub public_signals: Vec<String>,
}

/// Turns raw prover output into verifier-ready proof points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProofFormatter {
    order: CoordinateOrder,
}

impl ProofFormatter {
    #[must_use]
    pub const fn new(order: CoordinateOrder) -> Self {
        Self { order }
    }

    #[must_use]
    pub const fn snarkjs() -> Self {
        Self::new(CoordinateOrder::RealFirst)
    }

    #[must_use]
    pub const fn gnark() -> Self {
        Self::new(CoordinateOrder::ImaginaryFirst)
    }

    #[must_use]
    pub const fn for_backend(backend: ProofBackend) -> Self {
        match backend {
            ProofBackend::Snarkjs => Self::snarkjs(),
            ProofBackend::Gnark => Self::gnark(),
        }
    }

    #[must_use]
    pub const fn order(&self) -> CoordinateOrder {
        self.order
    }

    /// # Errors
    /// [`RegistrationError::MalformedProof`] if the raw proof has the wrong
    /// shape or a coordinate is not a canonical base-field element.
    pub fn normalize(&self, raw: &RawProof) -> Result<ProofPoints, RegistrationError> {
        let [a0, a1, b00, b01, b10, b11, c0, c1] = raw.coordinates()?;
        let b = [
            order_g2_pair([b00, b01], self.order),
            order_g2_pair([b10, b11], self.order),
        ];
        let points = ProofPoints {
            a: [parse_coordinate(a0, "a")?, parse_coordinate(a1, "a")?],
            b: [
                [parse_coordinate(b[0][0], "b[0]")?, parse_coordinate(b[0][1], "b[0]")?],
                [parse_coordinate(b[1][0], "b[1]")?, parse_coordinate(b[1][1], "b[1]")?],
            ],
            c: [parse_coordinate(c0, "c")?, parse_coordinate(c1, "c")?],
        };
        debug!("Normalized proof with {:?} B coordinates", self.order);
        Ok(points)
    }

    /// Normalizes the proof and checks the public signals.
    ///
    /// The signals keep their order and are re-emitted as canonical decimals.
    ///
    /// # Errors
    /// [`RegistrationError::MalformedProof`] or
    /// [`RegistrationError::MalformedPublicSignals`].
    pub fn format<S: AsRef<str>>(
        &self,
        raw: &RawProof,
        public_signals: &[S],
    ) -> Result<RegistrationCall, RegistrationError> {
        let signals = PublicSignals::from_strings(public_signals)?;
        Ok(RegistrationCall {
            proof_points: self.normalize(raw)?,
            public_signals: signals.to_decimal_strings().to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // BN254 G2 generator, snarkjs layout `[c0, c1]`.
    const G2_X_C0: &str =
        "10857046999023057135944570762232829481370756359578518086990519993285655852781";
    const G2_X_C1: &str =
        "11559732032986387107991004021392285783925812861821192530917403151452391805634";
    const G2_Y_C0: &str =
        "8495653923123431417604973247489272438418190587263600148770280649306958101930";
    const G2_Y_C1: &str =
        "4082367875863433681332203403145435568316851327593401208105741076214120093531";

    fn s(v: &str) -> String {
        v.to_string()
    }

    fn snarkjs_raw() -> RawProof {
        RawProof::Snarkjs {
            pi_a: vec![s("1"), s("2"), s("1")],
            pi_b: vec![
                vec![s(G2_X_C0), s(G2_X_C1)],
                vec![s(G2_Y_C0), s(G2_Y_C1)],
                vec![s("1"), s("0")],
            ],
            pi_c: vec![s("1"), s("2"), s("1")],
            protocol: Some(s("groth16")),
        }
    }

    fn gnark_raw() -> RawProof {
        RawProof::Wrapped {
            proof: vec![
                s("1"),
                s("2"),
                s(G2_X_C1),
                s(G2_X_C0),
                s(G2_Y_C1),
                s(G2_Y_C0),
                s("1"),
                s("2"),
            ],
        }
    }

    fn fq(v: &str) -> Fq {
        parse_field(v).unwrap()
    }

    #[test]
    fn test_order_g2_pair_both_conventions() {
        assert_eq!(order_g2_pair([1, 2], CoordinateOrder::ImaginaryFirst), [1, 2]);
        assert_eq!(order_g2_pair([1, 2], CoordinateOrder::RealFirst), [2, 1]);
        let twice = order_g2_pair(
            order_g2_pair([1, 2], CoordinateOrder::RealFirst),
            CoordinateOrder::RealFirst,
        );
        assert_eq!(twice, [1, 2]);
    }

    #[test]
    fn test_snarkjs_generator_is_swapped_into_verifier_order() {
        let points = ProofFormatter::snarkjs().normalize(&snarkjs_raw()).unwrap();
        assert_eq!(points.a, [fq("1"), fq("2")]);
        assert_eq!(
            points.b,
            [[fq(G2_X_C1), fq(G2_X_C0)], [fq(G2_Y_C1), fq(G2_Y_C0)]]
        );
        assert_eq!(points.c, [fq("1"), fq("2")]);
    }

    #[test]
    fn test_gnark_generator_is_kept() {
        let points = ProofFormatter::gnark().normalize(&gnark_raw()).unwrap();
        assert_eq!(
            points.b,
            [[fq(G2_X_C1), fq(G2_X_C0)], [fq(G2_Y_C1), fq(G2_Y_C0)]]
        );
        assert_eq!(
            points,
            ProofFormatter::snarkjs().normalize(&snarkjs_raw()).unwrap()
        );
    }

    #[test]
    fn test_wrong_convention_gives_different_points() {
        let wrong = ProofFormatter::gnark().normalize(&snarkjs_raw()).unwrap();
        let right = ProofFormatter::snarkjs().normalize(&snarkjs_raw()).unwrap();
        assert_ne!(wrong, right);
    }

    #[test]
    fn test_raw_proof_parses_from_backend_json() {
        let snarkjs: RawProof = serde_json::from_str(&format!(
            r#"{{
                "pi_a": ["1", "2", "1"],
                "pi_b": [["{G2_X_C0}", "{G2_X_C1}"], ["{G2_Y_C0}", "{G2_Y_C1}"], ["1", "0"]],
                "pi_c": ["1", "2", "1"],
                "protocol": "groth16",
                "curve": "bn128"
            }}"#
        ))
        .unwrap();
        assert_eq!(snarkjs, snarkjs_raw());

        let flat: RawProof = serde_json::from_str(r#"["1","2","3","4","5","6","7","8"]"#).unwrap();
        assert!(matches!(flat, RawProof::Flat(ref v) if v.len() == 8));
    }

    #[test]
    fn test_short_flat_proof_is_malformed() {
        let raw = RawProof::Flat(vec![s("1"); 7]);
        assert_eq!(
            ProofFormatter::gnark().normalize(&raw).unwrap_err(),
            RegistrationError::MalformedProof("expected 8 proof elements, got 7".to_string())
        );
    }

    #[test]
    fn test_projective_point_is_malformed() {
        let raw = RawProof::Snarkjs {
            pi_a: vec![s("1"), s("2"), s("5")],
            pi_b: vec![vec![s("1"), s("2")], vec![s("3"), s("4")]],
            pi_c: vec![s("1"), s("2")],
            protocol: None,
        };
        assert!(matches!(
            ProofFormatter::snarkjs().normalize(&raw),
            Err(RegistrationError::MalformedProof(_))
        ));
    }

    #[test]
    fn test_other_protocol_is_rejected() {
        let mut raw = snarkjs_raw();
        if let RawProof::Snarkjs { protocol, .. } = &mut raw {
            *protocol = Some(s("plonk"));
        }
        assert!(ProofFormatter::snarkjs().normalize(&raw).is_err());
    }

    #[test]
    fn test_out_of_range_coordinate_is_malformed() {
        let p = "21888242871839275222246405745257275088696311157297823662689037894645226208583";
        let mut values = vec![s("1"); 8];
        values[6] = s(p);
        let err = ProofFormatter::gnark()
            .normalize(&RawProof::Flat(values))
            .unwrap_err();
        assert!(matches!(err, RegistrationError::MalformedProof(msg) if msg.starts_with("c:")));
    }

    #[test]
    fn test_registration_call_json_shape() {
        let points = ProofFormatter::gnark().normalize(&gnark_raw()).unwrap();
        let call = RegistrationCall {
            proof_points: points,
            public_signals: vec![s("1"), s("2"), s("3"), s("4"), s("5")],
        };
        let json = serde_json::to_value(&call).unwrap();
        assert_eq!(json["proofPoints"]["a"][1], "2");
        assert_eq!(json["proofPoints"]["b"][0][0], G2_X_C1);
        assert_eq!(json["publicSignals"][4], "5");

        let back: RegistrationCall = serde_json::from_value(json).unwrap();
        assert_eq!(back, call);
    }

    #[test]
    fn test_format_rejects_short_signals() {
        let err = ProofFormatter::snarkjs()
            .format(&snarkjs_raw(), &["1", "2", "3", "4"])
            .unwrap_err();
        assert!(matches!(err, RegistrationError::MalformedPublicSignals(_)));
    }
}
