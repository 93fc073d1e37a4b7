use ciborium::Value;
use serde::{Deserialize, Serialize};

use super::{AttestationObject, CoseAlgorithm, CollectedClientData};
use crate::verifier::VerifiedAttestation;

/// Relying-party values the ceremony is checked against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerProperty {
    pub origins: Vec<String>,
    pub rp_id: String,
    /// Raw challenge bytes issued for this ceremony.
    pub challenge: Vec<u8>,
}

impl ServerProperty {
    pub fn new(
        origin: impl Into<String>,
        rp_id: impl Into<String>,
        challenge: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            origins: vec![origin.into()],
            rp_id: rp_id.into(),
            challenge: challenge.into(),
        }
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origins.push(origin.into());
        self
    }
}

/// The registration response as received from the browser.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrationRequest {
    pub attestation_object: Vec<u8>,
    pub client_data_json: Vec<u8>,
    pub transports: Vec<String>,
    pub client_extensions_json: Option<String>,
}

impl RegistrationRequest {
    pub fn new(
        attestation_object: impl Into<Vec<u8>>,
        client_data_json: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            attestation_object: attestation_object.into(),
            client_data_json: client_data_json.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationParameters {
    pub server_property: ServerProperty,
    /// Empty accepts any algorithm.
    pub pub_key_cred_params: Vec<CoseAlgorithm>,
    pub user_verification_required: bool,
    pub user_presence_required: bool,
}

impl RegistrationParameters {
    pub fn new(server_property: ServerProperty) -> Self {
        Self {
            server_property,
            pub_key_cred_params: Vec::new(),
            user_verification_required: false,
            user_presence_required: true,
        }
    }

    pub fn with_pub_key_cred_params(
        mut self,
        params: impl IntoIterator<Item = CoseAlgorithm>,
    ) -> Self {
        self.pub_key_cred_params = params.into_iter().collect();
        self
    }

    pub fn user_verification_required(mut self, required: bool) -> Self {
        self.user_verification_required = required;
        self
    }

    pub fn user_presence_required(mut self, required: bool) -> Self {
        self.user_presence_required = required;
        self
    }
}

/// A parsed, not yet verified, registration.
#[derive(Debug, Clone, PartialEq)]
pub struct RegistrationData {
    pub attestation_object: AttestationObject,
    pub attestation_object_bytes: Vec<u8>,
    pub collected_client_data: CollectedClientData,
    pub collected_client_data_bytes: Vec<u8>,
    pub transports: Vec<String>,
    pub client_extension_outputs: Option<serde_json::Value>,
}

/// Output of a successful verification.
#[derive(Debug, Clone)]
pub struct VerifiedRegistration {
    pub data: RegistrationData,
    pub attestation: VerifiedAttestation,
}

impl VerifiedRegistration {
    pub fn credential_id(&self) -> Option<&[u8]> {
        self.data
            .attestation_object
            .authenticator_data
            .attested_credential_data
            .as_ref()
            .map(|acd| acd.credential_id.as_slice())
    }

    pub fn authenticator_extensions(&self) -> Option<&Value> {
        self.data.attestation_object.authenticator_data.extensions.as_ref()
    }
}
