use tracing::debug;

use super::certificate::{extension_value, public_key_matches, verify_with_certificate};
use super::AttestationStatementVerifier;
use crate::der::{
    DerReader, Tlv, CLASS_CONTEXT, CLASS_UNIVERSAL, TAG_OCTET_STRING, TAG_SEQUENCE, TAG_SET,
};
use crate::error::{DataConversionError, VerificationError};
use crate::verifier::{
    conversion, missing, AttestationType, RegistrationObject, VerifiedAttestation,
};

/// Android key attestation extension.
const OID_KEY_DESCRIPTION: &str = "1.3.6.1.4.1.11129.2.1.17";

const TAG_PURPOSE: u32 = 1;
const TAG_ALL_APPLICATIONS: u32 = 600;
const TAG_ORIGIN: u32 = 702;

const KM_ORIGIN_GENERATED: u64 = 0;
const KM_PURPOSE_SIGN: u64 = 2;

#[derive(Debug, Default, PartialEq, Eq)]
struct AuthorizationList {
    purpose: Option<Vec<u64>>,
    all_applications: bool,
    origin: Option<u64>,
}

#[derive(Debug, PartialEq, Eq)]
struct KeyDescription {
    attestation_challenge: Vec<u8>,
    software_enforced: AuthorizationList,
    tee_enforced: AuthorizationList,
}

fn next<'a>(reader: &mut DerReader<'a>) -> Result<Tlv<'a>, DataConversionError> {
    reader.read()
}

fn parse_authorization_list(tlv: Tlv<'_>) -> Result<AuthorizationList, DataConversionError> {
    let tlv = tlv.expect(CLASS_UNIVERSAL, TAG_SEQUENCE, "AuthorizationList")?;
    let mut list = AuthorizationList::default();
    for entry in tlv.children() {
        let entry = entry?;
        if entry.class != CLASS_CONTEXT {
            continue;
        }
        match entry.number {
            TAG_PURPOSE => {
                let set = next(&mut entry.children())?.expect(
                    CLASS_UNIVERSAL,
                    TAG_SET,
                    "purpose SET",
                )?;
                let values = set
                    .children()
                    .map(|item| item.and_then(|i| i.as_u64()))
                    .collect::<Result<Vec<_>, _>>()?;
                list.purpose = Some(values);
            }
            TAG_ALL_APPLICATIONS => list.all_applications = true,
            TAG_ORIGIN => list.origin = Some(next(&mut entry.children())?.as_u64()?),
            _ => {}
        }
    }
    Ok(list)
}

fn parse_key_description(value: &[u8]) -> Result<KeyDescription, DataConversionError> {
    let seq = DerReader::new(value)
        .read()?
        .expect(CLASS_UNIVERSAL, TAG_SEQUENCE, "KeyDescription")?;
    let mut fields = seq.children();
    // attestationVersion, attestationSecurityLevel, keymasterVersion, keymasterSecurityLevel
    for _ in 0..4 {
        next(&mut fields)?;
    }
    let challenge =
        next(&mut fields)?.expect(CLASS_UNIVERSAL, TAG_OCTET_STRING, "attestationChallenge")?;
    // uniqueId
    next(&mut fields)?;
    let software_enforced = parse_authorization_list(next(&mut fields)?)?;
    let tee_enforced = parse_authorization_list(next(&mut fields)?)?;
    Ok(KeyDescription {
        attestation_challenge: challenge.content.to_vec(),
        software_enforced,
        tee_enforced,
    })
}

fn violation(reason: &str) -> VerificationError {
    VerificationError::BadAttestationStatement(reason.to_string())
}

/// `fmt: "android-key"`.
#[derive(Debug, Clone, Copy, Default)]
pub struct AndroidKeyAttestationStatementVerifier {
    /// Only trust authorization entries enforced by the TEE.
    pub tee_enforced_only: bool,
}

impl AndroidKeyAttestationStatementVerifier {
    fn check_authorization(&self, description: &KeyDescription) -> Result<(), VerificationError> {
        if description.software_enforced.all_applications
            || description.tee_enforced.all_applications
        {
            return Err(violation(
                "key must be scoped to the relying party (allApplications present)",
            ));
        }

        let lists: Vec<&AuthorizationList> = if self.tee_enforced_only {
            vec![&description.tee_enforced]
        } else {
            vec![&description.tee_enforced, &description.software_enforced]
        };

        let origins: Vec<u64> = lists.iter().filter_map(|l| l.origin).collect();
        if self.tee_enforced_only && origins.is_empty() {
            return Err(violation("TEE-enforced origin is missing"));
        }
        if origins.iter().any(|o| *o != KM_ORIGIN_GENERATED) {
            return Err(violation("key origin must be KM_ORIGIN_GENERATED"));
        }

        let purposes: Vec<&Vec<u64>> = lists.iter().filter_map(|l| l.purpose.as_ref()).collect();
        if self.tee_enforced_only && purposes.is_empty() {
            return Err(violation("TEE-enforced purpose is missing"));
        }
        if purposes.iter().any(|p| !p.contains(&KM_PURPOSE_SIGN)) {
            return Err(violation("key purpose must include KM_PURPOSE_SIGN"));
        }
        Ok(())
    }
}

impl AttestationStatementVerifier for AndroidKeyAttestationStatementVerifier {
    fn format(&self) -> &'static str {
        "android-key"
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
        let chain = statement.x5c().map_err(conversion)?.ok_or_else(|| missing("x5c"))?;
        let leaf = chain.first().ok_or_else(|| missing("x5c leaf certificate"))?;

        verify_with_certificate(alg, leaf, sig, &registration.signed_data())?;
        if !public_key_matches(leaf, &credential.credential_public_key)? {
            return Err(VerificationError::PublicKeyMismatch(
                "attestation certificate key differs from the credential key".into(),
            ));
        }

        let (value, _) = extension_value(leaf, OID_KEY_DESCRIPTION)?
            .ok_or_else(|| missing("key description extension"))?;
        let description = parse_key_description(&value).map_err(conversion)?;
        if description.attestation_challenge != registration.client_data_hash {
            return Err(violation("attestationChallenge does not match clientDataHash"));
        }
        self.check_authorization(&description)?;

        debug!(chain_len = chain.len(), "android-key attestation verified");
        Ok(VerifiedAttestation::new(self.format(), AttestationType::Basic, chain))
    }
}
