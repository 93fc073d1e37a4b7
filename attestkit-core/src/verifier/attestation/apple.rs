use super::certificate::{extension_value, public_key_matches};
use super::AttestationStatementVerifier;
use crate::der::{DerReader, CLASS_CONTEXT, CLASS_UNIVERSAL, TAG_OCTET_STRING, TAG_SEQUENCE};
use crate::error::{DataConversionError, VerificationError};
use crate::verifier::{
    conversion, missing, AttestationType, RegistrationObject, VerifiedAttestation,
};

/// Apple anonymous attestation nonce extension.
const OID_APPLE_NONCE: &str = "1.2.840.113635.100.8.2";

/// `SEQUENCE { [1] EXPLICIT OCTET STRING nonce }`
fn parse_nonce(value: &[u8]) -> Result<Vec<u8>, DataConversionError> {
    let seq = DerReader::new(value)
        .read()?
        .expect(CLASS_UNIVERSAL, TAG_SEQUENCE, "nonce SEQUENCE")?;
    let tagged = seq.children().read()?.expect(CLASS_CONTEXT, 1, "[1]")?;
    let nonce = tagged
        .children()
        .read()?
        .expect(CLASS_UNIVERSAL, TAG_OCTET_STRING, "nonce OCTET STRING")?;
    Ok(nonce.content.to_vec())
}

/// `fmt: "apple"`.
#[derive(Debug, Clone, Copy, Default)]
pub struct AppleAnonymousAttestationStatementVerifier;

impl AttestationStatementVerifier for AppleAnonymousAttestationStatementVerifier {
    fn format(&self) -> &'static str {
        "apple"
    }

    fn verify(
        &self,
        registration: &RegistrationObject<'_>,
    ) -> Result<VerifiedAttestation, VerificationError> {
        let statement = &registration.attestation_object().att_stmt;
        let credential = registration.attested_credential_data()?;
        let chain = statement.x5c().map_err(conversion)?.ok_or_else(|| missing("x5c"))?;
        let leaf = chain.first().ok_or_else(|| missing("x5c leaf certificate"))?;

        let (value, _) =
            extension_value(leaf, OID_APPLE_NONCE)?.ok_or_else(|| missing("nonce extension"))?;
        let nonce = parse_nonce(&value).map_err(conversion)?;
        if nonce != openssl::sha::sha256(&registration.signed_data()) {
            return Err(VerificationError::BadAttestationStatement("nonce mismatch".into()));
        }
        if !public_key_matches(leaf, &credential.credential_public_key)? {
            return Err(VerificationError::PublicKeyMismatch(
                "credential certificate key differs from the credential key".into(),
            ));
        }
        Ok(VerifiedAttestation::new(self.format(), AttestationType::AnonCa, chain))
    }
}
