//! COSE_Key decoding (RFC 9052/9053) and signature verification.

use ciborium::Value;
use openssl::bn::BigNum;
use openssl::ec::{EcGroup, EcKey};
use openssl::error::ErrorStack;
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::{Id, PKey, PKeyRef, Public};
use openssl::rsa::{Padding, Rsa};
use openssl::sign::{RsaPssSaltlen, Verifier};

use crate::error::DataConversionError;

const LABEL_KTY: i128 = 1;
const LABEL_ALG: i128 = 3;
const LABEL_CRV_OR_N: i128 = -1;
const LABEL_X_OR_E: i128 = -2;
const LABEL_Y: i128 = -3;

const KTY_OKP: i128 = 1;
const KTY_EC2: i128 = 2;
const KTY_RSA: i128 = 3;

const CRV_ED25519: i128 = 6;

/// COSE algorithm identifiers accepted for credential and attestation keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoseAlgorithm {
    ES256,
    ES384,
    ES512,
    EdDSA,
    RS256,
    RS384,
    RS512,
    PS256,
    /// RSASSA-PKCS1-v1_5 with SHA-1, only seen in TPM attestation.
    RS1,
}

impl CoseAlgorithm {
    pub fn value(self) -> i64 {
        match self {
            Self::ES256 => -7,
            Self::ES384 => -35,
            Self::ES512 => -36,
            Self::EdDSA => -8,
            Self::RS256 => -257,
            Self::RS384 => -258,
            Self::RS512 => -259,
            Self::PS256 => -37,
            Self::RS1 => -65535,
        }
    }

    /// Digest used when signing with this algorithm; `None` for EdDSA.
    pub fn message_digest(self) -> Option<MessageDigest> {
        match self {
            Self::ES256 | Self::RS256 | Self::PS256 => Some(MessageDigest::sha256()),
            Self::ES384 | Self::RS384 => Some(MessageDigest::sha384()),
            Self::ES512 | Self::RS512 => Some(MessageDigest::sha512()),
            Self::RS1 => Some(MessageDigest::sha1()),
            Self::EdDSA => None,
        }
    }

    /// OpenSSL key type that signs with this algorithm.
    pub fn key_id(self) -> Id {
        match self {
            Self::ES256 | Self::ES384 | Self::ES512 => Id::EC,
            Self::EdDSA => Id::ED25519,
            Self::RS256 | Self::RS384 | Self::RS512 | Self::PS256 | Self::RS1 => Id::RSA,
        }
    }

    /// Whether a key with `params` may be used with this algorithm.
    pub fn accepts(self, params: &CoseKeyParams) -> bool {
        match (self, params) {
            (Self::ES256, CoseKeyParams::Ec2 { curve, .. }) => *curve == EcCurve::P256,
            (Self::ES384, CoseKeyParams::Ec2 { curve, .. }) => *curve == EcCurve::P384,
            (Self::ES512, CoseKeyParams::Ec2 { curve, .. }) => *curve == EcCurve::P521,
            (Self::EdDSA, CoseKeyParams::Okp { .. }) => true,
            (
                Self::RS256 | Self::RS384 | Self::RS512 | Self::PS256 | Self::RS1,
                CoseKeyParams::Rsa { .. },
            ) => true,
            _ => false,
        }
    }
}

impl TryFrom<i64> for CoseAlgorithm {
    type Error = DataConversionError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Ok(match value {
            -7 => Self::ES256,
            -35 => Self::ES384,
            -36 => Self::ES512,
            -8 => Self::EdDSA,
            -257 => Self::RS256,
            -258 => Self::RS384,
            -259 => Self::RS512,
            -37 => Self::PS256,
            -65535 => Self::RS1,
            other => {
                return Err(DataConversionError::CoseKey(format!(
                    "unsupported algorithm {other}"
                )))
            }
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EcCurve {
    P256,
    P384,
    P521,
}

impl EcCurve {
    fn from_cose(value: i128) -> Option<Self> {
        match value {
            1 => Some(Self::P256),
            2 => Some(Self::P384),
            3 => Some(Self::P521),
            _ => None,
        }
    }

    pub fn cose_value(self) -> i64 {
        match self {
            Self::P256 => 1,
            Self::P384 => 2,
            Self::P521 => 3,
        }
    }

    pub fn nid(self) -> Nid {
        match self {
            Self::P256 => Nid::X9_62_PRIME256V1,
            Self::P384 => Nid::SECP384R1,
            Self::P521 => Nid::SECP521R1,
        }
    }

    pub fn coordinate_len(self) -> usize {
        match self {
            Self::P256 => 32,
            Self::P384 => 48,
            Self::P521 => 66,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoseKeyParams {
    Ec2 { curve: EcCurve, x: Vec<u8>, y: Vec<u8> },
    Rsa { n: Vec<u8>, e: Vec<u8> },
    /// Ed25519 only.
    Okp { x: Vec<u8> },
}

impl CoseKeyParams {
    fn describe(&self) -> &'static str {
        match self {
            Self::Ec2 { curve: EcCurve::P256, .. } => "an EC2 P-256 key",
            Self::Ec2 { curve: EcCurve::P384, .. } => "an EC2 P-384 key",
            Self::Ec2 { curve: EcCurve::P521, .. } => "an EC2 P-521 key",
            Self::Rsa { .. } => "an RSA key",
            Self::Okp { .. } => "an Ed25519 key",
        }
    }
}

/// A credential public key as carried in attested credential data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoseKey {
    pub algorithm: CoseAlgorithm,
    pub params: CoseKeyParams,
}

fn integer(value: &Value) -> Option<i128> {
    value.as_integer().map(i128::from)
}

fn bytes<'a>(value: Option<&'a Value>, what: &str) -> Result<&'a [u8], DataConversionError> {
    value
        .and_then(Value::as_bytes)
        .map(Vec::as_slice)
        .ok_or_else(|| {
            DataConversionError::CoseKey(format!("{what} is missing or not a byte string"))
        })
}

impl CoseKey {
    pub fn from_value(value: &Value) -> Result<Self, DataConversionError> {
        let entries = value
            .as_map()
            .ok_or_else(|| DataConversionError::CoseKey("COSE key is not a map".into()))?;

        let mut kty = None;
        let mut alg = None;
        let (mut minus1, mut minus2, mut minus3) = (None, None, None);
        for (label, entry) in entries {
            match integer(label) {
                Some(LABEL_KTY) => kty = integer(entry),
                Some(LABEL_ALG) => alg = integer(entry),
                Some(LABEL_CRV_OR_N) => minus1 = Some(entry),
                Some(LABEL_X_OR_E) => minus2 = Some(entry),
                Some(LABEL_Y) => minus3 = Some(entry),
                _ => {}
            }
        }

        let alg = alg.ok_or_else(|| DataConversionError::CoseKey("alg is missing".into()))?;
        let algorithm = i64::try_from(alg)
            .map_err(|_| DataConversionError::CoseKey(format!("alg {alg} out of range")))
            .and_then(CoseAlgorithm::try_from)?;

        let params = match kty {
            Some(KTY_EC2) => {
                let curve = minus1
                    .and_then(integer)
                    .and_then(EcCurve::from_cose)
                    .ok_or_else(|| DataConversionError::CoseKey("unsupported EC2 curve".into()))?;
                let x = bytes(minus2, "x")?;
                let y = bytes(minus3, "y")?;
                if x.len() != curve.coordinate_len() || y.len() != curve.coordinate_len() {
                    return Err(DataConversionError::CoseKey(format!(
                        "EC2 coordinates must be {} bytes",
                        curve.coordinate_len()
                    )));
                }
                CoseKeyParams::Ec2 {
                    curve,
                    x: x.to_vec(),
                    y: y.to_vec(),
                }
            }
            Some(KTY_RSA) => CoseKeyParams::Rsa {
                n: bytes(minus1, "n")?.to_vec(),
                e: bytes(minus2, "e")?.to_vec(),
            },
            Some(KTY_OKP) => {
                if minus1.and_then(integer) != Some(CRV_ED25519) {
                    return Err(DataConversionError::CoseKey(
                        "only Ed25519 OKP keys are supported".into(),
                    ));
                }
                let x = bytes(minus2, "x")?;
                if x.len() != 32 {
                    return Err(DataConversionError::CoseKey("Ed25519 key must be 32 bytes".into()));
                }
                CoseKeyParams::Okp { x: x.to_vec() }
            }
            other => {
                return Err(DataConversionError::CoseKey(format!(
                    "unsupported key type {other:?}"
                )))
            }
        };

        if !algorithm.accepts(&params) {
            return Err(DataConversionError::CoseKey(format!(
                "alg {} cannot be used with {}",
                algorithm.value(),
                params.describe()
            )));
        }
        Ok(Self { algorithm, params })
    }

    /// Encode back into a COSE_Key map.
    pub fn to_value(&self) -> Value {
        let int = |v: i64| Value::Integer(v.into());
        let mut entries = Vec::with_capacity(5);
        match &self.params {
            CoseKeyParams::Ec2 { curve, x, y } => {
                entries.push((int(1), int(KTY_EC2 as i64)));
                entries.push((int(3), int(self.algorithm.value())));
                entries.push((int(-1), int(curve.cose_value())));
                entries.push((int(-2), Value::Bytes(x.clone())));
                entries.push((int(-3), Value::Bytes(y.clone())));
            }
            CoseKeyParams::Rsa { n, e } => {
                entries.push((int(1), int(KTY_RSA as i64)));
                entries.push((int(3), int(self.algorithm.value())));
                entries.push((int(-1), Value::Bytes(n.clone())));
                entries.push((int(-2), Value::Bytes(e.clone())));
            }
            CoseKeyParams::Okp { x } => {
                entries.push((int(1), int(KTY_OKP as i64)));
                entries.push((int(3), int(self.algorithm.value())));
                entries.push((int(-1), int(CRV_ED25519 as i64)));
                entries.push((int(-2), Value::Bytes(x.clone())));
            }
        }
        Value::Map(entries)
    }

    pub fn public_key(&self) -> Result<PKey<Public>, ErrorStack> {
        match &self.params {
            CoseKeyParams::Ec2 { curve, x, y } => {
                let group = EcGroup::from_curve_name(curve.nid())?;
                let x = BigNum::from_slice(x)?;
                let y = BigNum::from_slice(y)?;
                let key = EcKey::from_public_key_affine_coordinates(&group, &x, &y)?;
                PKey::from_ec_key(key)
            }
            CoseKeyParams::Rsa { n, e } => {
                let rsa =
                    Rsa::from_public_components(BigNum::from_slice(n)?, BigNum::from_slice(e)?)?;
                PKey::from_rsa(rsa)
            }
            CoseKeyParams::Okp { x } => PKey::public_key_from_raw_bytes(x, Id::ED25519),
        }
    }

    /// Raw ANSI X9.62 point (`0x04 || x || y`), only defined for P-256 keys.
    pub fn to_x962_raw(&self) -> Option<Vec<u8>> {
        match &self.params {
            CoseKeyParams::Ec2 {
                curve: EcCurve::P256,
                x,
                y,
            } => {
                let mut raw = Vec::with_capacity(65);
                raw.push(0x04);
                raw.extend_from_slice(x);
                raw.extend_from_slice(y);
                Some(raw)
            }
            _ => None,
        }
    }

    /// `Ok(false)` for a well-formed but wrong signature.
    pub fn verify(&self, signature: &[u8], data: &[u8]) -> Result<bool, ErrorStack> {
        let key = self.public_key()?;
        verify_signature(self.algorithm, &key, signature, data)
    }
}

/// Verify a WebAuthn-encoded signature (DER for ECDSA, raw for RSA/EdDSA).
///
/// A key of another type than `algorithm` names never verifies.
pub fn verify_signature(
    algorithm: CoseAlgorithm,
    key: &PKeyRef<Public>,
    signature: &[u8],
    data: &[u8],
) -> Result<bool, ErrorStack> {
    if key.id() != algorithm.key_id() {
        return Ok(false);
    }
    let mut verifier = match algorithm.message_digest() {
        Some(digest) => Verifier::new(digest, key)?,
        None => Verifier::new_without_digest(key)?,
    };
    if algorithm == CoseAlgorithm::PS256 {
        verifier.set_rsa_padding(Padding::PKCS1_PSS)?;
        verifier.set_rsa_pss_saltlen(RsaPssSaltlen::DIGEST_LENGTH)?;
    }
    verifier.verify_oneshot(signature, data)
}
