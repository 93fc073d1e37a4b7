use openssl::nid::Nid;
use openssl::x509::X509Ref;

use super::certificate::verify_with_certificate;
use super::AttestationStatementVerifier;
use crate::data::CoseAlgorithm;
use crate::error::VerificationError;
use crate::verifier::{
    conversion, missing, AttestationType, RegistrationObject, VerifiedAttestation,
};

#[derive(Debug, Clone, Copy, Default)]
pub struct FidoU2fAttestationStatementVerifier;

fn is_p256(cert: &X509Ref) -> Result<bool, VerificationError> {
    let key = cert.public_key()?;
    Ok(match key.ec_key() {
        Ok(ec) => ec.group().curve_name() == Some(Nid::X9_62_PRIME256V1),
        Err(_) => false,
    })
}

impl AttestationStatementVerifier for FidoU2fAttestationStatementVerifier {
    fn format(&self) -> &'static str {
        "fido-u2f"
    }

    fn verify(
        &self,
        registration: &RegistrationObject<'_>,
    ) -> Result<VerifiedAttestation, VerificationError> {
        let statement = &registration.attestation_object().att_stmt;
        let credential = registration.attested_credential_data()?;
        let sig = statement.bytes("sig").ok_or_else(|| missing("sig"))?;
        let chain = statement.x5c().map_err(conversion)?.ok_or_else(|| missing("x5c"))?;
        let [cert] = chain.as_slice() else {
            return Err(VerificationError::BadAttestationStatement(format!(
                "x5c must contain exactly one certificate, got {}",
                chain.len()
            )));
        };
        if !is_p256(cert)? {
            return Err(VerificationError::Certificate(
                "attestation certificate key must be EC P-256".into(),
            ));
        }
        let public_key_u2f = credential
            .credential_public_key
            .to_x962_raw()
            .ok_or_else(|| {
                VerificationError::PublicKeyMismatch("credential key must be EC2 P-256".into())
            })?;

        let auth_data = registration.authenticator_data();
        let mut verification_data =
            Vec::with_capacity(1 + 32 + 32 + credential.credential_id.len() + public_key_u2f.len());
        verification_data.push(0x00);
        verification_data.extend_from_slice(&auth_data.rp_id_hash);
        verification_data.extend_from_slice(&registration.client_data_hash);
        verification_data.extend_from_slice(&credential.credential_id);
        verification_data.extend_from_slice(&public_key_u2f);

        verify_with_certificate(CoseAlgorithm::ES256, cert, sig, &verification_data)?;
        Ok(VerifiedAttestation::new(self.format(), AttestationType::Basic, chain))
    }
}
