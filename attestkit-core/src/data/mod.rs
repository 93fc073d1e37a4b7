//! WebAuthn registration data model.
//!
//! - `authenticator`: authenticator data and attested credential data
//! - `cose`: COSE public keys and algorithm identifiers
//! - `attestation`: attestation object and statement
//! - `client_data`: collected client data (`clientDataJSON`)
//! - `registration`: request, parameters and parsed registration

mod attestation;
mod authenticator;
mod client_data;
mod cose;
mod registration;

use std::fmt;
use std::str::FromStr;

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, URL_SAFE_NO_PAD};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DataConversionError;

pub use attestation::{AttestationObject, AttestationStatement};
pub use authenticator::{AttestedCredentialData, AuthenticatorData, AuthenticatorFlags};
pub use client_data::CollectedClientData;
pub use cose::{verify_signature, CoseAlgorithm, CoseKey, CoseKeyParams, EcCurve};
pub use registration::{
    RegistrationData, RegistrationParameters, RegistrationRequest, ServerProperty,
    VerifiedRegistration,
};

/// Standard base64 that tolerates missing padding (MDS and JWS `x5c` values).
pub(crate) const BASE64_STANDARD: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

pub(crate) fn decode_base64url(value: &str) -> Result<Vec<u8>, DataConversionError> {
    URL_SAFE_NO_PAD
        .decode(value.trim_end_matches('='))
        .map_err(|e| DataConversionError::Base64(e.to_string()))
}

pub(crate) fn decode_base64(value: &str) -> Result<Vec<u8>, DataConversionError> {
    BASE64_STANDARD
        .decode(value.trim())
        .map_err(|e| DataConversionError::Base64(e.to_string()))
}

/// Authenticator Attestation GUID identifying an authenticator model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Aaguid(Uuid);

impl Aaguid {
    /// The all-zero AAGUID used by U2F and by authenticators that hide their model.
    pub const ZERO: Aaguid = Aaguid(Uuid::nil());

    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_nil()
    }
}

impl FromStr for Aaguid {
    type Err = DataConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|e| DataConversionError::Aaguid(format!("{s}: {e}")))
    }
}

impl fmt::Display for Aaguid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl From<Uuid> for Aaguid {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}
