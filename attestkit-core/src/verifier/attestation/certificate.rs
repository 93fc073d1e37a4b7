//! X.509 checks shared by the certificate-based attestation formats.

use openssl::x509::X509Ref;
use x509_parser::certificate::X509Certificate;
use x509_parser::parse_x509_certificate;
use x509_parser::x509::X509Version;

use crate::data::{verify_signature, Aaguid, CoseAlgorithm, CoseKey};
use crate::error::VerificationError;

/// id-fido-gen-ce-aaguid
pub(crate) const OID_FIDO_GEN_CE_AAGUID: &str = "1.3.6.1.4.1.45724.1.1.4";

fn cert_error(err: impl ToString) -> VerificationError {
    VerificationError::Certificate(err.to_string())
}

/// Run `f` against the x509-parser view of `cert`.
pub(crate) fn with_parsed<T>(
    cert: &X509Ref,
    f: impl FnOnce(&X509Certificate<'_>) -> Result<T, VerificationError>,
) -> Result<T, VerificationError> {
    let der = cert.to_der()?;
    let (_, parsed) = parse_x509_certificate(&der).map_err(cert_error)?;
    f(&parsed)
}

/// Raw value and criticality of the extension `oid`, if present.
pub(crate) fn extension_value(
    cert: &X509Ref,
    oid: &str,
) -> Result<Option<(Vec<u8>, bool)>, VerificationError> {
    with_parsed(cert, |parsed| {
        Ok(parsed
            .extensions()
            .iter()
            .find(|ext| ext.oid.to_id_string() == oid)
            .map(|ext| (ext.value.to_vec(), ext.critical)))
    })
}

/// When the certificate carries id-fido-gen-ce-aaguid it must match the
/// authenticator data and must not be critical.
pub(crate) fn check_aaguid_extension(
    cert: &X509Ref,
    aaguid: &Aaguid,
) -> Result<(), VerificationError> {
    let Some((value, critical)) = extension_value(cert, OID_FIDO_GEN_CE_AAGUID)? else {
        return Ok(());
    };
    if critical {
        return Err(cert_error("AAGUID extension must not be critical"));
    }
    // OCTET STRING (16)
    match value.as_slice() {
        [0x04, 0x10, rest @ ..] if rest == aaguid.as_bytes() => Ok(()),
        _ => Err(VerificationError::BadAaguid),
    }
}

pub(crate) fn is_ca(parsed: &X509Certificate<'_>) -> Result<bool, VerificationError> {
    Ok(parsed
        .basic_constraints()
        .map_err(cert_error)?
        .is_some_and(|bc| bc.value.ca))
}

pub(crate) fn check_v3(parsed: &X509Certificate<'_>) -> Result<(), VerificationError> {
    if parsed.version() == X509Version::V3 {
        Ok(())
    } else {
        Err(cert_error("attestation certificate must be X.509 v3"))
    }
}

/// Packed attestation certificate requirements (WebAuthn §8.2.1).
pub(crate) fn check_packed_requirements(cert: &X509Ref) -> Result<(), VerificationError> {
    with_parsed(cert, |parsed| {
        check_v3(parsed)?;
        let subject = parsed.subject();
        if subject.iter_country().next().is_none()
            || subject.iter_organization().next().is_none()
            || subject.iter_common_name().next().is_none()
        {
            return Err(cert_error("subject must carry C, O and CN"));
        }
        let ou_ok = subject
            .iter_organizational_unit()
            .any(|ou| matches!(ou.as_str(), Ok("Authenticator Attestation")));
        if !ou_ok {
            return Err(cert_error(
                "subject OU must be \"Authenticator Attestation\"",
            ));
        }
        if is_ca(parsed)? {
            return Err(cert_error("attestation certificate must not be a CA"));
        }
        Ok(())
    })
}

/// Verify `signature` over `data` with the public key of `cert`.
pub(crate) fn verify_with_certificate(
    algorithm: CoseAlgorithm,
    cert: &X509Ref,
    signature: &[u8],
    data: &[u8],
) -> Result<(), VerificationError> {
    let key = cert.public_key()?;
    if matches!(verify_signature(algorithm, &key, signature, data), Ok(true)) {
        Ok(())
    } else {
        Err(VerificationError::BadSignature)
    }
}

pub(crate) fn public_key_matches(
    cert: &X509Ref,
    credential_key: &CoseKey,
) -> Result<bool, VerificationError> {
    let attested = cert.public_key()?;
    let credential = credential_key.public_key()?;
    Ok(attested.public_eq(&credential))
}
