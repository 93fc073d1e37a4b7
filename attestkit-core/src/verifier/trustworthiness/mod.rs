//! Trust decisions taken after an attestation statement has been verified.

mod certpath;
mod self_attestation;

pub use certpath::{DefaultCertPathTrustworthinessVerifier, NullCertPathTrustworthinessVerifier};
pub use self_attestation::DefaultSelfAttestationTrustworthinessVerifier;

use chrono::{DateTime, Utc};

use super::VerifiedAttestation;
use crate::data::Aaguid;
use crate::error::VerificationError;

/// Decides whether an attestation certificate path is trusted.
pub trait CertPathTrustworthinessVerifier: Send + Sync {
    fn verify(
        &self,
        aaguid: &Aaguid,
        attestation: &VerifiedAttestation,
        timestamp: DateTime<Utc>,
    ) -> Result<(), VerificationError>;
}

/// Decides whether self attestation is acceptable.
pub trait SelfAttestationTrustworthinessVerifier: Send + Sync {
    fn verify(&self, attestation: &VerifiedAttestation) -> Result<(), VerificationError>;
}
