//! Attestation statement verifiers, one per WebAuthn attestation format.

mod android_key;
mod android_safetynet;
mod apple;
pub(crate) mod certificate;
mod fido_u2f;
mod none;
mod packed;
mod tpm;

pub use android_key::AndroidKeyAttestationStatementVerifier;
pub use android_safetynet::AndroidSafetyNetAttestationStatementVerifier;
pub use apple::AppleAnonymousAttestationStatementVerifier;
pub use fido_u2f::FidoU2fAttestationStatementVerifier;
pub use none::NoneAttestationStatementVerifier;
pub use packed::PackedAttestationStatementVerifier;
pub use tpm::TpmAttestationStatementVerifier;

use super::{RegistrationObject, VerifiedAttestation};
use crate::error::VerificationError;

pub trait AttestationStatementVerifier: Send + Sync {
    /// The `fmt` value this verifier handles.
    fn format(&self) -> &'static str;

    fn supports(&self, format: &str) -> bool {
        self.format() == format
    }

    fn verify(
        &self,
        registration: &RegistrationObject<'_>,
    ) -> Result<VerifiedAttestation, VerificationError>;
}

/// packed, fido-u2f, android-key, android-safetynet, tpm, apple, none.
pub fn default_attestation_statement_verifiers() -> Vec<Box<dyn AttestationStatementVerifier>> {
    vec![
        Box::new(PackedAttestationStatementVerifier),
        Box::new(FidoU2fAttestationStatementVerifier),
        Box::new(AndroidKeyAttestationStatementVerifier::default()),
        Box::new(AndroidSafetyNetAttestationStatementVerifier::default()),
        Box::new(TpmAttestationStatementVerifier),
        Box::new(AppleAnonymousAttestationStatementVerifier),
        Box::new(NoneAttestationStatementVerifier),
    ]
}
