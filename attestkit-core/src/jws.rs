//! Compact JWS objects: the MDS3 BLOB and SafetyNet attestation responses.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use openssl::bn::BigNum;
use openssl::ecdsa::EcdsaSig;
use openssl::error::ErrorStack;
use openssl::pkey::{PKeyRef, Public};
use openssl::x509::X509;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::converter::JsonConverter;
use crate::data::{decode_base64, decode_base64url, verify_signature, CoseAlgorithm};
use crate::error::DataConversionError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwsHeader {
    pub alg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,
    /// Standard base64 DER certificates, leaf first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub x5c: Vec<String>,
}

impl JwsHeader {
    pub fn algorithm(&self) -> Result<CoseAlgorithm, DataConversionError> {
        match self.alg.as_str() {
            "ES256" => Ok(CoseAlgorithm::ES256),
            "ES384" => Ok(CoseAlgorithm::ES384),
            "ES512" => Ok(CoseAlgorithm::ES512),
            "RS256" => Ok(CoseAlgorithm::RS256),
            "RS384" => Ok(CoseAlgorithm::RS384),
            "RS512" => Ok(CoseAlgorithm::RS512),
            "PS256" => Ok(CoseAlgorithm::PS256),
            other => Err(DataConversionError::Jws(format!("unsupported alg {other}"))),
        }
    }
}

/// A parsed compact JWS with its payload decoded as `P`.
#[derive(Debug, Clone)]
pub struct JwsObject<P> {
    header: JwsHeader,
    payload: P,
    signing_input: String,
    signature: Vec<u8>,
}

impl<P: DeserializeOwned> JwsObject<P> {
    pub fn parse(converter: &JsonConverter, value: &str) -> Result<Self, DataConversionError> {
        let mut parts = value.trim().split('.');
        let (Some(header_b64), Some(payload_b64), Some(signature_b64), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(DataConversionError::Jws(
                "expected three dot-separated parts".into(),
            ));
        };

        let header_bytes = decode_base64url(header_b64)?;
        let header: JwsHeader = converter.read_value(&header_bytes)?;
        header.algorithm()?;
        let payload_bytes = decode_base64url(payload_b64)?;
        let payload: P = converter.read_value(&payload_bytes)?;
        let signature = decode_base64url(signature_b64)?;

        Ok(Self {
            header,
            payload,
            signing_input: format!("{header_b64}.{payload_b64}"),
            signature,
        })
    }
}

impl<P> JwsObject<P> {
    pub fn header(&self) -> &JwsHeader {
        &self.header
    }

    pub fn payload(&self) -> &P {
        &self.payload
    }

    /// Decoded `x5c` header, leaf first.
    pub fn certificates(&self) -> Result<Vec<X509>, DataConversionError> {
        self.header
            .x5c
            .iter()
            .map(|b64| {
                let der = decode_base64(b64)?;
                X509::from_der(&der).map_err(|e| DataConversionError::Certificate(e.to_string()))
            })
            .collect()
    }

    pub fn verify_signature(&self, key: &PKeyRef<Public>) -> Result<bool, ErrorStack> {
        let Ok(algorithm) = self.header.algorithm() else {
            return Ok(false);
        };
        let signature = match algorithm {
            CoseAlgorithm::ES256 | CoseAlgorithm::ES384 | CoseAlgorithm::ES512 => {
                match raw_to_der(&self.signature)? {
                    Some(der) => der,
                    None => return Ok(false),
                }
            }
            _ => self.signature.clone(),
        };
        verify_signature(algorithm, key, &signature, self.signing_input.as_bytes())
    }
}

/// JWS carries ECDSA signatures as fixed-width `r || s`.
fn raw_to_der(raw: &[u8]) -> Result<Option<Vec<u8>>, ErrorStack> {
    if raw.is_empty() || raw.len() % 2 != 0 {
        return Ok(None);
    }
    let (r, s) = raw.split_at(raw.len() / 2);
    let sig = EcdsaSig::from_private_components(BigNum::from_slice(r)?, BigNum::from_slice(s)?)?;
    sig.to_der().map(Some)
}

/// Produce a compact JWS; used by tooling and tests that fabricate BLOBs.
pub fn encode_compact(
    converter: &JsonConverter,
    header: &JwsHeader,
    payload: &impl Serialize,
    sign: impl FnOnce(&[u8]) -> Result<Vec<u8>, ErrorStack>,
) -> Result<String, DataConversionError> {
    let header_b64 = URL_SAFE_NO_PAD.encode(converter.write_value_as_bytes(header)?);
    let payload_b64 = URL_SAFE_NO_PAD.encode(converter.write_value_as_bytes(payload)?);
    let signing_input = format!("{header_b64}.{payload_b64}");
    let signature =
        sign(signing_input.as_bytes()).map_err(|e| DataConversionError::Jws(e.to_string()))?;
    Ok(format!("{signing_input}.{}", URL_SAFE_NO_PAD.encode(signature)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use openssl::ec::{EcGroup, EcKey};
    use openssl::hash::MessageDigest;
    use openssl::nid::Nid;
    use openssl::pkey::{PKey, Private};
    use openssl::sign::Signer;
    use serde_json::json;

    fn es256_key() -> PKey<Private> {
        let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap();
        PKey::from_ec_key(EcKey::generate(&group).unwrap()).unwrap()
    }

    fn sign_es256_raw(key: &PKey<Private>, data: &[u8]) -> Result<Vec<u8>, ErrorStack> {
        let mut signer = Signer::new(MessageDigest::sha256(), key)?;
        let der = signer.sign_oneshot_to_vec(data)?;
        let sig = EcdsaSig::from_der(&der)?;
        let mut raw = sig.r().to_vec_padded(32)?;
        raw.extend(sig.s().to_vec_padded(32)?);
        Ok(raw)
    }

    fn header() -> JwsHeader {
        JwsHeader {
            alg: "ES256".into(),
            typ: Some("JWT".into()),
            x5c: vec![],
        }
    }

    #[test]
    fn test_es256_roundtrip() {
        let converter = JsonConverter::default();
        let key = es256_key();
        let token = encode_compact(&converter, &header(), &json!({"no": 7}), |data| {
            sign_es256_raw(&key, data)
        })
        .unwrap();

        let jws: JwsObject<serde_json::Value> = JwsObject::parse(&converter, &token).unwrap();
        assert_eq!(jws.payload()["no"], 7);
        assert_eq!(jws.header().typ.as_deref(), Some("JWT"));

        let public = PKey::public_key_from_der(&key.public_key_to_der().unwrap()).unwrap();
        assert!(jws.verify_signature(&public).unwrap());

        let other = es256_key();
        let other = PKey::public_key_from_der(&other.public_key_to_der().unwrap()).unwrap();
        assert!(!jws.verify_signature(&other).unwrap());
    }

    #[test]
    fn test_rejects_wrong_part_count() {
        let converter = JsonConverter::default();
        assert!(JwsObject::<serde_json::Value>::parse(&converter, "a.b").is_err());
        assert!(JwsObject::<serde_json::Value>::parse(&converter, "a.b.c.d").is_err());
    }

    #[test]
    fn test_rejects_unsupported_alg() {
        let converter = JsonConverter::default();
        let header = JwsHeader {
            alg: "none".into(),
            typ: None,
            x5c: vec![],
        };
        let token = encode_compact(&converter, &header, &json!({}), |_| Ok(vec![])).unwrap();
        assert!(JwsObject::<serde_json::Value>::parse(&converter, &token).is_err());
    }
}
