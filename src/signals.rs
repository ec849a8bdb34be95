//! The public-signal tuple shared by prover, formatter and registrar.
//!
//! Order is a hard contract with the circuit:
//! `[pubX, pubY, addressInt, chainId, commitment]`. [`PublicSignal::ORDER`]
//! is the single definition; every producer and consumer indexes through it.

use log::debug;
use num_bigint::BigUint;

use crate::babyjubjub::{Base, Point};
use crate::commitment::Commitment;
use crate::error::RegistrationError;
use crate::ethereum::Address;
use crate::keys::PublicPoint;
use crate::utils::{field_to_decimal, parse_field};

/// Number of public signals exposed by the registration circuit.
pub const PUBLIC_SIGNAL_COUNT: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublicSignal {
    PubX,
    PubY,
    AddressInt,
    ChainId,
    Commitment,
}

impl PublicSignal {
    pub const ORDER: [PublicSignal; PUBLIC_SIGNAL_COUNT] = [
        PublicSignal::PubX,
        PublicSignal::PubY,
        PublicSignal::AddressInt,
        PublicSignal::ChainId,
        PublicSignal::Commitment,
    ];

    /// Position of this signal in the tuple.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            PublicSignal::PubX => 0,
            PublicSignal::PubY => 1,
            PublicSignal::AddressInt => 2,
            PublicSignal::ChainId => 3,
            PublicSignal::Commitment => 4,
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            PublicSignal::PubX => "pubX",
            PublicSignal::PubY => "pubY",
            PublicSignal::AddressInt => "addressInt",
            PublicSignal::ChainId => "chainId",
            PublicSignal::Commitment => "commitment",
        }
    }
}

/// Decoded public signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublicSignals {
    pub public_key: PublicPoint,
    pub address: Address,
    pub chain_id: u64,
    pub commitment: Commitment,
}

impl PublicSignals {
    #[must_use]
    pub fn new(
        public_key: PublicPoint,
        address: Address,
        chain_id: u64,
        commitment: Commitment,
    ) -> Self {
        Self {
            public_key,
            address,
            chain_id,
            commitment,
        }
    }

    /// The tuple in circuit order.
    #[must_use]
    pub fn to_field_elements(&self) -> [Base; PUBLIC_SIGNAL_COUNT] {
        let mut out = [Base::from(0u64); PUBLIC_SIGNAL_COUNT];
        for signal in PublicSignal::ORDER {
            out[signal.index()] = match signal {
                PublicSignal::PubX => self.public_key.x,
                PublicSignal::PubY => self.public_key.y,
                PublicSignal::AddressInt => self.address.to_field(),
                PublicSignal::ChainId => Base::from(self.chain_id),
                PublicSignal::Commitment => *self.commitment.as_field(),
            };
        }
        out
    }

    /// The tuple in circuit order as canonical decimal strings.
    #[must_use]
    pub fn to_decimal_strings(&self) -> [String; PUBLIC_SIGNAL_COUNT] {
        self.to_field_elements().map(|value| field_to_decimal(&value))
    }

    /// Parses decimal (or `0x` hex) strings and decodes them.
    ///
    /// # Errors
    /// [`RegistrationError::MalformedPublicSignals`] on a wrong count, an
    /// unparsable or non-canonical value, or a tuple that fails decoding.
    pub fn from_strings<S: AsRef<str>>(values: &[S]) -> Result<Self, RegistrationError> {
        let fields = parse_signal_strings(values)?;
        Self::try_from(fields.as_slice())
    }
}

/// Parses signal strings into field elements, checking the count first.
///
/// # Errors
/// [`RegistrationError::MalformedPublicSignals`] on a wrong count or a value
/// that is not a canonical base-field element.
pub fn parse_signal_strings<S: AsRef<str>>(values: &[S]) -> Result<Vec<Base>, RegistrationError> {
    check_count(values.len())?;
    PublicSignal::ORDER
        .iter()
        .zip(values)
        .map(|(signal, raw)| {
            parse_field::<Base>(raw.as_ref()).map_err(|e| {
                RegistrationError::MalformedPublicSignals(format!("{}: {e}", signal.name()))
            })
        })
        .collect()
}

fn check_count(count: usize) -> Result<(), RegistrationError> {
    if count != PUBLIC_SIGNAL_COUNT {
        return Err(RegistrationError::MalformedPublicSignals(format!(
            "expected {PUBLIC_SIGNAL_COUNT} public signals, got {count}"
        )));
    }
    Ok(())
}

fn malformed(signal: PublicSignal, reason: &str) -> RegistrationError {
    RegistrationError::MalformedPublicSignals(format!("{}: {reason}", signal.name()))
}

impl TryFrom<&[Base]> for PublicSignals {
    type Error = RegistrationError;

    /// Structural decoding only; no proof is checked here.
    ///
    /// Besides the count, values that cannot occupy their slot are rejected:
    /// a public key off the curve, an address wider than 160 bits, or a chain
    /// id wider than 64 bits. Any of these means the tuple is out of order.
    ///
    /// The public key must also be a non-identity point of the prime-order
    /// subgroup, which is all `scalar · Base8` can produce for a non-zero
    /// scalar.
    fn try_from(values: &[Base]) -> Result<Self, Self::Error> {
        check_count(values.len())?;
        let at = |signal: PublicSignal| values[signal.index()];

        let public_key = Point::new(at(PublicSignal::PubX), at(PublicSignal::PubY))
            .ok_or_else(|| malformed(PublicSignal::PubX, "public key is not on Baby Jubjub"))?;
        if public_key.is_identity() {
            return Err(malformed(PublicSignal::PubX, "public key is the identity"));
        }
        if !public_key.is_in_prime_subgroup() {
            return Err(malformed(
                PublicSignal::PubX,
                "public key is outside the prime-order subgroup",
            ));
        }

        let address = Address::from_field(&at(PublicSignal::AddressInt))
            .ok_or_else(|| malformed(PublicSignal::AddressInt, "wider than 160 bits"))?;

        let chain_int: BigUint = at(PublicSignal::ChainId).into();
        let chain_id = u64::try_from(chain_int)
            .map_err(|_| malformed(PublicSignal::ChainId, "wider than 64 bits"))?;

        let commitment = Commitment::from(at(PublicSignal::Commitment));

        debug!("Decoded public signals for {address} on chain {chain_id}");
        Ok(Self {
            public_key,
            address,
            chain_id,
            commitment,
        })
    }
}
