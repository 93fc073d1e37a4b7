//! Verifier seams plugged into a [`RegistrationManager`](crate::RegistrationManager).

pub mod attestation;
pub mod trustworthiness;

use std::fmt;

use chrono::{DateTime, Utc};
use openssl::x509::X509;

use crate::converter::ObjectConverter;
use crate::data::{
    Aaguid, AttestationObject, AttestedCredentialData, AuthenticatorData, RegistrationData,
    RegistrationParameters,
};
use crate::error::{DataConversionError, VerificationError};

pub use attestation::{default_attestation_statement_verifiers, AttestationStatementVerifier};
pub use trustworthiness::{
    CertPathTrustworthinessVerifier, DefaultCertPathTrustworthinessVerifier,
    DefaultSelfAttestationTrustworthinessVerifier, NullCertPathTrustworthinessVerifier,
    SelfAttestationTrustworthinessVerifier,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttestationType {
    None,
    SelfAttestation,
    Basic,
    AttCa,
    AnonCa,
}

impl fmt::Display for AttestationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::None => "none",
            Self::SelfAttestation => "self",
            Self::Basic => "basic",
            Self::AttCa => "attca",
            Self::AnonCa => "anonca",
        };
        f.write_str(name)
    }
}

/// Result of a successful attestation statement check.
#[derive(Debug, Clone)]
pub struct VerifiedAttestation {
    pub format: String,
    pub attestation_type: AttestationType,
    /// Attestation certificate path, leaf first. Empty for none/self.
    pub trust_path: Vec<X509>,
}

impl VerifiedAttestation {
    pub fn new(
        format: impl Into<String>,
        attestation_type: AttestationType,
        trust_path: Vec<X509>,
    ) -> Self {
        Self {
            format: format.into(),
            attestation_type,
            trust_path,
        }
    }
}

/// Everything a verifier needs to look at one registration.
#[derive(Debug, Clone, Copy)]
pub struct RegistrationObject<'a> {
    pub data: &'a RegistrationData,
    pub parameters: &'a RegistrationParameters,
    /// The manager's converter, for verifiers that decode nested payloads.
    pub converter: &'a ObjectConverter,
    pub client_data_hash: [u8; 32],
    pub timestamp: DateTime<Utc>,
}

impl<'a> RegistrationObject<'a> {
    pub fn new(
        data: &'a RegistrationData,
        parameters: &'a RegistrationParameters,
        converter: &'a ObjectConverter,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            data,
            parameters,
            converter,
            client_data_hash: openssl::sha::sha256(&data.collected_client_data_bytes),
            timestamp,
        }
    }

    pub fn attestation_object(&self) -> &'a AttestationObject {
        &self.data.attestation_object
    }

    pub fn authenticator_data(&self) -> &'a AuthenticatorData {
        &self.data.attestation_object.authenticator_data
    }

    pub fn attested_credential_data(
        &self,
    ) -> Result<&'a AttestedCredentialData, VerificationError> {
        self.authenticator_data()
            .attested_credential_data
            .as_ref()
            .ok_or_else(|| {
                VerificationError::ConstraintViolation("attested credential data is missing".into())
            })
    }

    pub fn aaguid(&self) -> Aaguid {
        self.authenticator_data()
            .attested_credential_data
            .as_ref()
            .map(|acd| acd.aaguid)
            .unwrap_or(Aaguid::ZERO)
    }

    /// `authData || clientDataHash`, the input of most attestation signatures.
    pub fn signed_data(&self) -> Vec<u8> {
        let auth_data = &self.data.attestation_object.authenticator_data_bytes;
        let mut out = Vec::with_capacity(auth_data.len() + 32);
        out.extend_from_slice(auth_data);
        out.extend_from_slice(&self.client_data_hash);
        out
    }
}

/// Relying-party specific checks run after attestation and trust checks.
pub trait CustomRegistrationVerifier: Send + Sync {
    fn verify(&self, registration: &RegistrationObject<'_>) -> Result<(), VerificationError>;
}

impl<F> CustomRegistrationVerifier for F
where
    F: Fn(&RegistrationObject<'_>) -> Result<(), VerificationError> + Send + Sync,
{
    fn verify(&self, registration: &RegistrationObject<'_>) -> Result<(), VerificationError> {
        self(registration)
    }
}

pub(crate) fn missing(what: &str) -> VerificationError {
    VerificationError::BadAttestationStatement(format!("{what} is missing"))
}

pub(crate) fn conversion(err: DataConversionError) -> VerificationError {
    VerificationError::BadAttestationStatement(err.to_string())
}
