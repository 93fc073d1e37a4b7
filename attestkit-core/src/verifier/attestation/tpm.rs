//! `fmt: "tpm"`: TPM 2.0 attestation (TPMS_ATTEST over TPMT_PUBLIC).

use openssl::hash::{hash, MessageDigest};
use tracing::debug;

use super::certificate::{
    check_aaguid_extension, check_v3, is_ca, verify_with_certificate, with_parsed,
};
use super::AttestationStatementVerifier;
use crate::data::{CoseKey, CoseKeyParams, EcCurve};
use crate::error::{DataConversionError, VerificationError};
use crate::verifier::{
    conversion, missing, AttestationType, RegistrationObject, VerifiedAttestation,
};

const TPM_GENERATED_VALUE: u32 = 0xff54_4347;
const TPM_ST_ATTEST_CERTIFY: u16 = 0x8017;

const TPM_ALG_RSA: u16 = 0x0001;
const TPM_ALG_SHA1: u16 = 0x0004;
const TPM_ALG_SHA256: u16 = 0x000b;
const TPM_ALG_SHA384: u16 = 0x000c;
const TPM_ALG_SHA512: u16 = 0x000d;
const TPM_ALG_NULL: u16 = 0x0010;
const TPM_ALG_ECC: u16 = 0x0023;

const TPM_ECC_NIST_P256: u16 = 0x0003;
const TPM_ECC_NIST_P384: u16 = 0x0004;
const TPM_ECC_NIST_P521: u16 = 0x0005;

/// tcg-kp-AIKCertificate
const OID_TCG_KP_AIK_CERTIFICATE: &str = "2.23.133.8.3";

/// Big-endian cursor over TPM marshalled structures.
struct Reader<'a> {
    input: &'a [u8],
}

impl<'a> Reader<'a> {
    fn new(input: &'a [u8]) -> Self {
        Self { input }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], DataConversionError> {
        if self.input.len() < n {
            return Err(DataConversionError::AttestationObject("TPM structure is truncated".into()));
        }
        let (head, tail) = self.input.split_at(n);
        self.input = tail;
        Ok(head)
    }

    fn u16(&mut self) -> Result<u16, DataConversionError> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32, DataConversionError> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// TPM2B_*: u16 size followed by that many bytes.
    fn sized(&mut self) -> Result<&'a [u8], DataConversionError> {
        let len = usize::from(self.u16()?);
        self.take(len)
    }

    fn finish(&self) -> Result<(), DataConversionError> {
        if self.input.is_empty() {
            Ok(())
        } else {
            Err(DataConversionError::AttestationObject(
                "unexpected trailing bytes in TPM structure".into(),
            ))
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
struct TpmsAttest {
    magic: u32,
    type_: u16,
    extra_data: Vec<u8>,
    attested_name: Vec<u8>,
}

impl TpmsAttest {
    fn parse(bytes: &[u8]) -> Result<Self, DataConversionError> {
        let mut r = Reader::new(bytes);
        let magic = r.u32()?;
        let type_ = r.u16()?;
        let _qualified_signer = r.sized()?;
        let extra_data = r.sized()?.to_vec();
        // clockInfo (clock, resetCount, restartCount, safe) + firmwareVersion
        r.take(8 + 4 + 4 + 1 + 8)?;
        let attested_name = r.sized()?.to_vec();
        let _qualified_name = r.sized()?;
        r.finish()?;
        Ok(Self {
            magic,
            type_,
            extra_data,
            attested_name,
        })
    }
}

#[derive(Debug, PartialEq, Eq)]
enum TpmPublicKey {
    Rsa { modulus: Vec<u8>, exponent: u32 },
    Ecc { curve: u16, x: Vec<u8>, y: Vec<u8> },
}

#[derive(Debug, PartialEq, Eq)]
struct TpmtPublic {
    name_alg: u16,
    key: TpmPublicKey,
}

impl TpmtPublic {
    fn parse(bytes: &[u8]) -> Result<Self, DataConversionError> {
        let mut r = Reader::new(bytes);
        let type_ = r.u16()?;
        let name_alg = r.u16()?;
        let _object_attributes = r.u32()?;
        let _auth_policy = r.sized()?;

        let skip_symmetric = |r: &mut Reader<'_>| -> Result<(), DataConversionError> {
            if r.u16()? != TPM_ALG_NULL {
                // keyBits, mode
                r.take(4)?;
            }
            Ok(())
        };
        let skip_scheme = |r: &mut Reader<'_>| -> Result<(), DataConversionError> {
            if r.u16()? != TPM_ALG_NULL {
                // hashAlg
                r.take(2)?;
            }
            Ok(())
        };

        let key = match type_ {
            TPM_ALG_RSA => {
                skip_symmetric(&mut r)?;
                skip_scheme(&mut r)?;
                let _key_bits = r.u16()?;
                let exponent = match r.u32()? {
                    0 => 65537,
                    e => e,
                };
                let modulus = r.sized()?.to_vec();
                TpmPublicKey::Rsa { modulus, exponent }
            }
            TPM_ALG_ECC => {
                skip_symmetric(&mut r)?;
                skip_scheme(&mut r)?;
                let curve = r.u16()?;
                skip_scheme(&mut r)?;
                let x = r.sized()?.to_vec();
                let y = r.sized()?.to_vec();
                TpmPublicKey::Ecc { curve, x, y }
            }
            other => {
                return Err(DataConversionError::AttestationObject(format!(
                    "unsupported TPM key type {other:#06x}"
                )))
            }
        };
        r.finish()?;
        Ok(Self { name_alg, key })
    }

    fn matches(&self, credential_key: &CoseKey) -> bool {
        match (&self.key, &credential_key.params) {
            (TpmPublicKey::Rsa { modulus, exponent }, CoseKeyParams::Rsa { n, e }) => {
                let e = strip_zeros(e);
                if e.len() > 8 {
                    return false;
                }
                let cose_exponent = e.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b));
                strip_zeros(modulus) == strip_zeros(n) && u64::from(*exponent) == cose_exponent
            }
            (
                TpmPublicKey::Ecc { curve, x, y },
                CoseKeyParams::Ec2 {
                    curve: cose_curve,
                    x: cx,
                    y: cy,
                },
            ) => {
                let expected_curve = match cose_curve {
                    EcCurve::P256 => TPM_ECC_NIST_P256,
                    EcCurve::P384 => TPM_ECC_NIST_P384,
                    EcCurve::P521 => TPM_ECC_NIST_P521,
                };
                *curve == expected_curve && x == cx && y == cy
            }
            _ => false,
        }
    }
}

fn strip_zeros(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    &bytes[start..]
}

fn name_digest(alg: u16) -> Option<MessageDigest> {
    match alg {
        TPM_ALG_SHA1 => Some(MessageDigest::sha1()),
        TPM_ALG_SHA256 => Some(MessageDigest::sha256()),
        TPM_ALG_SHA384 => Some(MessageDigest::sha384()),
        TPM_ALG_SHA512 => Some(MessageDigest::sha512()),
        _ => None,
    }
}

fn violation(reason: impl Into<String>) -> VerificationError {
    VerificationError::BadAttestationStatement(reason.into())
}

/// AIK certificate requirements (WebAuthn §8.3.1).
fn check_aik_certificate(cert: &openssl::x509::X509Ref) -> Result<(), VerificationError> {
    with_parsed(cert, |parsed| {
        let cert_error =
            |e: x509_parser::error::X509Error| VerificationError::Certificate(e.to_string());
        check_v3(parsed)?;
        if parsed.subject().iter().next().is_some() {
            return Err(VerificationError::Certificate(
                "AIK certificate subject must be empty".into(),
            ));
        }
        if parsed.subject_alternative_name().map_err(cert_error)?.is_none() {
            return Err(VerificationError::Certificate(
                "AIK certificate must carry a subject alternative name".into(),
            ));
        }
        let has_aik_eku = parsed
            .extended_key_usage()
            .map_err(cert_error)?
            .is_some_and(|eku| {
                eku.value
                    .other
                    .iter()
                    .any(|oid| oid.to_id_string() == OID_TCG_KP_AIK_CERTIFICATE)
            });
        if !has_aik_eku {
            return Err(VerificationError::Certificate(
                "AIK certificate must carry the tcg-kp-AIKCertificate EKU".into(),
            ));
        }
        if is_ca(parsed)? {
            return Err(VerificationError::Certificate("AIK certificate must not be a CA".into()));
        }
        Ok(())
    })
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TpmAttestationStatementVerifier;

impl AttestationStatementVerifier for TpmAttestationStatementVerifier {
    fn format(&self) -> &'static str {
        "tpm"
    }

    fn verify(
        &self,
        registration: &RegistrationObject<'_>,
    ) -> Result<VerifiedAttestation, VerificationError> {
        let statement = &registration.attestation_object().att_stmt;
        let credential = registration.attested_credential_data()?;

        if statement.text("ver") != Some("2.0") {
            return Err(violation("ver must be \"2.0\""));
        }
        let alg = statement
            .alg()
            .map_err(conversion)?
            .ok_or_else(|| missing("alg"))?;
        let sig = statement.bytes("sig").ok_or_else(|| missing("sig"))?;
        let cert_info_bytes = statement.bytes("certInfo").ok_or_else(|| missing("certInfo"))?;
        let pub_area_bytes = statement.bytes("pubArea").ok_or_else(|| missing("pubArea"))?;
        let chain = statement.x5c().map_err(conversion)?.ok_or_else(|| missing("x5c"))?;
        let aik = chain.first().ok_or_else(|| missing("x5c AIK certificate"))?;

        let pub_area = TpmtPublic::parse(pub_area_bytes).map_err(conversion)?;
        if !pub_area.matches(&credential.credential_public_key) {
            return Err(VerificationError::PublicKeyMismatch(
                "pubArea does not describe the credential key".into(),
            ));
        }

        let cert_info = TpmsAttest::parse(cert_info_bytes).map_err(conversion)?;
        if cert_info.magic != TPM_GENERATED_VALUE {
            return Err(violation("certInfo magic is not TPM_GENERATED_VALUE"));
        }
        if cert_info.type_ != TPM_ST_ATTEST_CERTIFY {
            return Err(violation("certInfo type is not TPM_ST_ATTEST_CERTIFY"));
        }

        let digest = alg
            .message_digest()
            .ok_or_else(|| violation(format!("alg {} has no hash", alg.value())))?;
        let att_to_be_signed = hash(digest, &registration.signed_data())?;
        if cert_info.extra_data != att_to_be_signed.as_ref() {
            return Err(violation("certInfo extraData does not match attToBeSigned"));
        }

        let name_md = name_digest(pub_area.name_alg)
            .ok_or_else(|| violation(format!("unsupported nameAlg {:#06x}", pub_area.name_alg)))?;
        let mut expected_name = pub_area.name_alg.to_be_bytes().to_vec();
        let pub_area_digest = hash(name_md, pub_area_bytes)?;
        expected_name.extend_from_slice(&pub_area_digest);
        if cert_info.attested_name != expected_name {
            return Err(violation("certInfo name does not match pubArea"));
        }

        verify_with_certificate(alg, aik, sig, cert_info_bytes)?;
        check_aik_certificate(aik)?;
        check_aaguid_extension(aik, &credential.aaguid)?;

        debug!(chain_len = chain.len(), "tpm attestation verified");
        Ok(VerifiedAttestation::new(self.format(), AttestationType::AttCa, chain))
    }
}
