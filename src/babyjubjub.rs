//! Baby Jubjub, the twisted Edwards curve embedded in the BN254 scalar field.
//!
//! Points use the circomlib parameterisation `a = 168700`, `d = 168696` and
//! the circomlib `Base8` generator, so public keys match what registration
//! circuits compute with `BabyPbk`.

use ark_ff::{BigInteger, Field, MontFp, One, PrimeField};
use serde::{Deserialize, Serialize};

/// Field the curve coordinates live in (`Q`, the BN254 scalar field).
pub type Base = ark_bn254::Fr;

/// Field of the prime-order subgroup generated by [`BASE8`] (`L`).
pub type ScalarField = ark_ed_on_bn254::Fr;

const COEFF_A: Base = MontFp!("168700");
const COEFF_D: Base = MontFp!("168696");

/// A point on Baby Jubjub in affine Edwards coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    #[serde(with = "crate::utils::decimal")]
    pub x: Base,
    #[serde(with = "crate::utils::decimal")]
    pub y: Base,
}

/// Generator of the prime-order subgroup.
pub const BASE8: Point = Point {
    x: MontFp!("5299619240641551281634865583518297030282874472190772894086521144482721001553"),
    y: MontFp!("16950150798460657717958625567821834550301663161624707787222815936182638968203"),
};

impl Point {
    /// The neutral element `(0, 1)`.
    pub const IDENTITY: Point = Point {
        x: MontFp!("0"),
        y: MontFp!("1"),
    };

    /// Returns the point if `(x, y)` satisfies the curve equation.
    #[must_use]
    pub fn new(x: Base, y: Base) -> Option<Self> {
        let point = Point { x, y };
        point.is_on_curve().then_some(point)
    }

    /// `a·x² + y² == 1 + d·x²·y²`
    #[must_use]
    pub fn is_on_curve(&self) -> bool {
        let x2 = self.x.square();
        let y2 = self.y.square();
        COEFF_A * x2 + y2 == Base::one() + COEFF_D * x2 * y2
    }

    #[must_use]
    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }

    /// Twisted Edwards addition.
    ///
    /// The law is complete on Baby Jubjub (`d` is a non-square), so the
    /// denominators are non-zero whenever both operands are curve points.
    #[must_use]
    pub fn add(&self, other: &Point) -> Point {
        let x1y2 = self.x * other.y;
        let y1x2 = self.y * other.x;
        let tau = COEFF_D * x1y2 * y1x2;

        let x_den = (Base::one() + tau)
            .inverse()
            .expect("complete addition law: 1 + d·x1·x2·y1·y2 is non-zero on the curve");
        let y_den = (Base::one() - tau)
            .inverse()
            .expect("complete addition law: 1 - d·x1·x2·y1·y2 is non-zero on the curve");

        Point {
            x: (x1y2 + y1x2) * x_den,
            y: (self.y * other.y - COEFF_A * self.x * other.x) * y_den,
        }
    }

    /// Double-and-add over big-endian bits.
    fn mul_bits(&self, bits_be: impl IntoIterator<Item = bool>) -> Point {
        bits_be.into_iter().fold(Self::IDENTITY, |acc, bit| {
            let doubled = acc.add(&acc);
            if bit {
                doubled.add(self)
            } else {
                doubled
            }
        })
    }

    /// `k · self`
    #[must_use]
    pub fn mul_scalar(&self, k: &ScalarField) -> Point {
        self.mul_bits(k.into_bigint().to_bits_be())
    }

    /// True if the point lies in the subgroup of order `L`.
    #[must_use]
    pub fn is_in_prime_subgroup(&self) -> bool {
        self.is_on_curve() && self.mul_bits(ScalarField::MODULUS.to_bits_be()).is_identity()
    }
}
