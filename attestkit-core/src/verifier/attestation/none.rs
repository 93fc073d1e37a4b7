use super::AttestationStatementVerifier;
use crate::error::VerificationError;
use crate::verifier::{AttestationType, RegistrationObject, VerifiedAttestation};

/// `fmt: "none"`: the authenticator chose not to attest.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoneAttestationStatementVerifier;

impl AttestationStatementVerifier for NoneAttestationStatementVerifier {
    fn format(&self) -> &'static str {
        "none"
    }

    fn verify(
        &self,
        registration: &RegistrationObject<'_>,
    ) -> Result<VerifiedAttestation, VerificationError> {
        if !registration.attestation_object().att_stmt.is_empty() {
            return Err(VerificationError::BadAttestationStatement(
                "attStmt must be empty for none attestation".into(),
            ));
        }
        Ok(VerifiedAttestation::new(self.format(), AttestationType::None, Vec::new()))
    }
}
