use super::SelfAttestationTrustworthinessVerifier;
use crate::error::VerificationError;
use crate::verifier::VerifiedAttestation;

#[derive(Debug, Clone, Copy)]
pub struct DefaultSelfAttestationTrustworthinessVerifier {
    pub self_attestation_allowed: bool,
}

impl Default for DefaultSelfAttestationTrustworthinessVerifier {
    fn default() -> Self {
        Self {
            self_attestation_allowed: true,
        }
    }
}

impl DefaultSelfAttestationTrustworthinessVerifier {
    pub fn prohibited() -> Self {
        Self {
            self_attestation_allowed: false,
        }
    }
}

impl SelfAttestationTrustworthinessVerifier for DefaultSelfAttestationTrustworthinessVerifier {
    fn verify(&self, _attestation: &VerifiedAttestation) -> Result<(), VerificationError> {
        if self.self_attestation_allowed {
            Ok(())
        } else {
            Err(VerificationError::SelfAttestationProhibited)
        }
    }
}
