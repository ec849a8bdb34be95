//! Witness documents handed to the external prover.

use std::fmt;

use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::commitment::Commitment;
use crate::error::RegistrationError;
use crate::ethereum::Address;
use crate::keys::{PublicPoint, Scalar};
use crate::signals::{PublicSignal, PublicSignals, PUBLIC_SIGNAL_COUNT};

/// Ordered prover input.
///
/// `privateInputs` holds the reduced scalar. `publicInputs` follows
/// [`PublicSignal::ORDER`]. Every value is a canonical decimal string.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WitnessDocument {
    pub private_inputs: [String; 1],
    pub public_inputs: [String; PUBLIC_SIGNAL_COUNT],
}

/// Named input object for circom-compiled circuits (`snarkjs wtns calculate`).
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircomInput {
    #[serde(rename = "SenderPrivateKey")]
    pub sender_private_key: String,
    #[serde(rename = "SenderPublicKey")]
    pub sender_public_key: [String; 2],
    #[serde(rename = "SenderAddress")]
    pub sender_address: String,
    #[serde(rename = "ChainID")]
    pub chain_id: String,
    #[serde(rename = "RegistrationHash")]
    pub registration_hash: String,
}

/// Assembles the prover input for one registration attempt.
#[must_use]
pub fn export(
    scalar: &Scalar,
    public_key: &PublicPoint,
    address: &Address,
    chain_id: u64,
    commitment: &Commitment,
) -> WitnessDocument {
    let signals = PublicSignals::new(*public_key, *address, chain_id, *commitment);
    WitnessDocument::new(scalar, &signals)
}

impl WitnessDocument {
    #[must_use]
    pub fn new(scalar: &Scalar, signals: &PublicSignals) -> Self {
        Self {
            private_inputs: [scalar.to_decimal().to_string()],
            public_inputs: signals.to_decimal_strings(),
        }
    }

    /// Decodes the public half back into typed signals.
    ///
    /// # Errors
    /// [`RegistrationError::MalformedPublicSignals`] if the document was
    /// edited into an invalid tuple.
    pub fn public_signals(&self) -> Result<PublicSignals, RegistrationError> {
        PublicSignals::from_strings(&self.public_inputs)
    }

    /// Same data keyed by circuit input names.
    #[must_use]
    pub fn to_circom_input(&self) -> CircomInput {
        let public = |signal: PublicSignal| self.public_inputs[signal.index()].clone();
        CircomInput {
            sender_private_key: self.private_inputs[0].clone(),
            sender_public_key: [public(PublicSignal::PubX), public(PublicSignal::PubY)],
            sender_address: public(PublicSignal::AddressInt),
            chain_id: public(PublicSignal::ChainId),
            registration_hash: public(PublicSignal::Commitment),
        }
    }
}

impl Drop for WitnessDocument {
    fn drop(&mut self) {
        self.private_inputs.zeroize();
    }
}

impl fmt::Debug for WitnessDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WitnessDocument")
            .field("private_inputs", &["<redacted>"])
            .field("public_inputs", &self.public_inputs)
            .finish()
    }
}

impl Drop for CircomInput {
    fn drop(&mut self) {
        self.sender_private_key.zeroize();
    }
}

impl fmt::Debug for CircomInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircomInput")
            .field("sender_public_key", &self.sender_public_key)
            .field("sender_address", &self.sender_address)
            .field("chain_id", &self.chain_id)
            .field("registration_hash", &self.registration_hash)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::babyjubjub::ScalarField;
    use crate::commitment::bind;
    use crate::keys::KeyPair;

    const FUJI: u64 = 43113;

    fn document() -> WitnessDocument {
        let pair = KeyPair::from_scalar(Scalar::new(ScalarField::from(12345u64)).unwrap());
        let address: Address = "0xABCDEF0123456789ABCDEF0123456789ABCDEF01".parse().unwrap();
        let commitment = bind(FUJI, pair.scalar(), &address).unwrap();
        export(pair.scalar(), pair.public_key(), &address, FUJI, &commitment)
    }

    #[test]
    fn test_export_reference_document() {
        let json = serde_json::to_value(document()).unwrap();
        let expected = serde_json::json!({
            "privateInputs": ["12345"],
            "publicInputs": [
                "19099552327547260981542886231210125691902505931204088720746463491300185142606",
                "13276557205153692030187527501273228448057533426731746626187331221465573305487",
                "980829894800078742339098726298021775428853559041",
                "43113",
                "19385110462691999214127976252262874573562127774901667188956760877120345571585"
            ]
        });
        assert_eq!(json, expected);
    }

    #[test]
    fn test_circom_input_uses_circuit_names() {
        let json = serde_json::to_value(document().to_circom_input()).unwrap();
        assert_eq!(json["SenderPrivateKey"], "12345");
        assert_eq!(json["ChainID"], "43113");
        assert_eq!(
            json["SenderAddress"],
            "980829894800078742339098726298021775428853559041"
        );
        assert_eq!(
            json["RegistrationHash"],
            "19385110462691999214127976252262874573562127774901667188956760877120345571585"
        );
        assert_eq!(json["SenderPublicKey"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_public_signals_decode_back() {
        let doc = document();
        let signals = doc.public_signals().unwrap();
        assert_eq!(signals.chain_id, FUJI);
        assert_eq!(signals.to_decimal_strings(), doc.public_inputs);
    }

    #[test]
    fn test_debug_hides_private_input() {
        let rendered = format!("{:?}", document());
        assert!(!rendered.contains("\"12345\""));
        assert!(rendered.contains("<redacted>"));
    }
}
