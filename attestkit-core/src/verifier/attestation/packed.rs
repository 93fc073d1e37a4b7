use tracing::debug;

use super::certificate::{
    check_aaguid_extension, check_packed_requirements, verify_with_certificate,
};
use super::AttestationStatementVerifier;
use crate::error::VerificationError;
use crate::verifier::{
    conversion, missing, AttestationType, RegistrationObject, VerifiedAttestation,
};

#[derive(Debug, Clone, Copy, Default)]
pub struct PackedAttestationStatementVerifier;

impl AttestationStatementVerifier for PackedAttestationStatementVerifier {
    fn format(&self) -> &'static str {
        "packed"
    }

    fn verify(
        &self,
        registration: &RegistrationObject<'_>,
    ) -> Result<VerifiedAttestation, VerificationError> {
        let statement = &registration.attestation_object().att_stmt;
        let credential = registration.attested_credential_data()?;
        let alg = statement
            .alg()
            .map_err(conversion)?
            .ok_or_else(|| missing("alg"))?;
        let sig = statement.bytes("sig").ok_or_else(|| missing("sig"))?;
        if statement.get("ecdaaKeyId").is_some() {
            return Err(VerificationError::BadAttestationStatement(
                "ECDAA attestation is not supported".into(),
            ));
        }
        let signed_data = registration.signed_data();

        match statement.x5c().map_err(conversion)? {
            Some(chain) => {
                let leaf = chain.first().ok_or_else(|| missing("x5c leaf certificate"))?;
                verify_with_certificate(alg, leaf, sig, &signed_data)?;
                check_packed_requirements(leaf)?;
                check_aaguid_extension(leaf, &credential.aaguid)?;
                debug!(chain_len = chain.len(), "packed basic attestation verified");
                Ok(VerifiedAttestation::new(self.format(), AttestationType::Basic, chain))
            }
            None => {
                let key = &credential.credential_public_key;
                if key.algorithm != alg {
                    return Err(VerificationError::BadAttestationStatement(format!(
                        "alg {} does not match credential key algorithm {}",
                        alg.value(),
                        key.algorithm.value()
                    )));
                }
                if !matches!(key.verify(sig, &signed_data), Ok(true)) {
                    return Err(VerificationError::BadSignature);
                }
                debug!("packed self attestation verified");
                Ok(VerifiedAttestation::new(
                    self.format(),
                    AttestationType::SelfAttestation,
                    Vec::new(),
                ))
            }
        }
    }
}
