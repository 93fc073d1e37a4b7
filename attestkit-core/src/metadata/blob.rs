//! MDS3 metadata BLOB data model.

use chrono::NaiveDate;
use openssl::x509::X509Ref;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::anchor::{validate_certificate_path, TrustAnchor};
use crate::converter::ObjectConverter;
use crate::data::{decode_base64, Aaguid};
use crate::error::{DataConversionError, MetadataError};
use crate::jws::{JwsHeader, JwsObject};

/// Status values from the MDS3 `StatusReport` dictionary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuthenticatorStatus {
    #[serde(rename = "NOT_FIDO_CERTIFIED")]
    NotFidoCertified,
    #[serde(rename = "FIDO_CERTIFIED")]
    FidoCertified,
    #[serde(rename = "USER_VERIFICATION_BYPASS")]
    UserVerificationBypass,
    #[serde(rename = "ATTESTATION_KEY_COMPROMISE")]
    AttestationKeyCompromise,
    #[serde(rename = "USER_KEY_REMOTE_COMPROMISE")]
    UserKeyRemoteCompromise,
    #[serde(rename = "USER_KEY_PHYSICAL_COMPROMISE")]
    UserKeyPhysicalCompromise,
    #[serde(rename = "UPDATE_AVAILABLE")]
    UpdateAvailable,
    #[serde(rename = "REVOKED")]
    Revoked,
    #[serde(rename = "SELF_ASSERTION_SUBMITTED")]
    SelfAssertionSubmitted,
    #[serde(rename = "FIDO_CERTIFIED_L1")]
    FidoCertifiedL1,
    #[serde(rename = "FIDO_CERTIFIED_L1plus")]
    FidoCertifiedL1Plus,
    #[serde(rename = "FIDO_CERTIFIED_L2")]
    FidoCertifiedL2,
    #[serde(rename = "FIDO_CERTIFIED_L2plus")]
    FidoCertifiedL2Plus,
    #[serde(rename = "FIDO_CERTIFIED_L3")]
    FidoCertifiedL3,
    #[serde(rename = "FIDO_CERTIFIED_L3plus")]
    FidoCertifiedL3Plus,
    #[serde(other)]
    Unknown,
}

impl AuthenticatorStatus {
    /// Statuses that make an authenticator's attestation untrustworthy.
    pub fn is_compromised(self) -> bool {
        matches!(
            self,
            Self::Revoked
                | Self::AttestationKeyCompromise
                | Self::UserVerificationBypass
                | Self::UserKeyRemoteCompromise
                | Self::UserKeyPhysicalCompromise
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub status: AuthenticatorStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effective_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authenticator_version: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certification_descriptor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate_number: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    pub major: u16,
    pub minor: u16,
}

/// The subset of an MDS3 metadata statement this crate reads. Unknown
/// members are ignored.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataStatement {
    #[serde(default)]
    pub legal_header: Option<String>,
    #[serde(default)]
    pub aaid: Option<String>,
    #[serde(default)]
    pub aaguid: Option<Aaguid>,
    #[serde(default)]
    pub attestation_certificate_key_identifiers: Vec<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub authenticator_version: u64,
    #[serde(default)]
    pub protocol_family: String,
    #[serde(default)]
    pub schema: u16,
    #[serde(default)]
    pub upv: Vec<Version>,
    #[serde(default)]
    pub authentication_algorithms: Vec<String>,
    #[serde(default)]
    pub public_key_alg_and_encodings: Vec<String>,
    #[serde(default)]
    pub attestation_types: Vec<String>,
    #[serde(default)]
    pub user_verification_details: serde_json::Value,
    #[serde(default)]
    pub key_protection: Vec<String>,
    #[serde(default)]
    pub matcher_protection: Vec<String>,
    #[serde(default)]
    pub attachment_hint: Vec<String>,
    #[serde(default)]
    pub tc_display: Vec<String>,
    /// Standard base64 DER certificates.
    #[serde(default)]
    pub attestation_root_certificates: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authenticator_get_info: Option<serde_json::Value>,
}

impl MetadataStatement {
    /// Decoded `attestationRootCertificates`; undecodable entries are skipped.
    pub fn trust_anchors(&self) -> Vec<TrustAnchor> {
        self.attestation_root_certificates
            .iter()
            .filter_map(|b64| {
                let anchor = decode_base64(b64).and_then(|der| TrustAnchor::from_der(&der));
                match anchor {
                    Ok(anchor) => Some(anchor),
                    Err(e) => {
                        warn!(
                            description = %self.description,
                            error = %e,
                            "skipping undecodable attestation root certificate"
                        );
                        None
                    }
                }
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataBlobPayloadEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aaid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aaguid: Option<Aaguid>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attestation_certificate_key_identifiers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata_statement: Option<MetadataStatement>,
    #[serde(default)]
    pub status_reports: Vec<StatusReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_of_last_status_change: Option<NaiveDate>,
}

impl MetadataBlobPayloadEntry {
    /// The report with the latest effective date; the last one on ties.
    pub fn latest_status(&self) -> Option<&StatusReport> {
        self.status_reports
            .iter()
            .enumerate()
            .max_by_key(|(index, report)| (report.effective_date, *index))
            .map(|(_, report)| report)
    }

    pub fn has_key_identifier(&self, key_identifier_hex: &str) -> bool {
        self.attestation_certificate_key_identifiers
            .iter()
            .any(|id| id.eq_ignore_ascii_case(key_identifier_hex))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataBlobPayload {
    #[serde(default)]
    pub legal_header: Option<String>,
    pub no: u64,
    pub next_update: NaiveDate,
    #[serde(default)]
    pub entries: Vec<MetadataBlobPayloadEntry>,
}

/// A parsed MDS3 BLOB.
#[derive(Debug, Clone)]
pub struct MetadataBlob {
    jws: JwsObject<MetadataBlobPayload>,
}

impl MetadataBlob {
    pub fn header(&self) -> &JwsHeader {
        self.jws.header()
    }

    pub fn payload(&self) -> &MetadataBlobPayload {
        self.jws.payload()
    }

    pub fn entries_for_aaguid<'a>(
        &'a self,
        aaguid: &'a Aaguid,
    ) -> impl Iterator<Item = &'a MetadataBlobPayloadEntry> + 'a {
        self.payload()
            .entries
            .iter()
            .filter(move |entry| entry.aaguid.as_ref() == Some(aaguid))
    }

    pub fn entries_for_key_identifier<'a>(
        &'a self,
        key_identifier_hex: &'a str,
    ) -> impl Iterator<Item = &'a MetadataBlobPayloadEntry> + 'a {
        self.payload()
            .entries
            .iter()
            .filter(move |entry| entry.has_key_identifier(key_identifier_hex))
    }

    /// `x5c` must chain to `root` and the JWS signature must verify with the leaf.
    pub fn verify(&self, root: &X509Ref) -> Result<(), MetadataError> {
        let chain = self.jws.certificates()?;
        let leaf = chain
            .first()
            .ok_or_else(|| MetadataError::Certificate("BLOB header carries no x5c".into()))?;
        validate_certificate_path(&chain, &[TrustAnchor::new(root.to_owned())])
            .map_err(MetadataError::Certificate)?;
        let key = leaf.public_key()?;
        if !matches!(self.jws.verify_signature(&key), Ok(true)) {
            return Err(MetadataError::SignatureInvalid);
        }
        Ok(())
    }

    /// True once `today` is past `nextUpdate`.
    pub fn is_expired(&self, today: NaiveDate) -> bool {
        today > self.payload().next_update
    }
}

/// Parses BLOB text with a shared [`ObjectConverter`].
#[derive(Debug, Clone, Default)]
pub struct MetadataBlobFactory {
    converter: ObjectConverter,
}

impl MetadataBlobFactory {
    pub fn new(converter: ObjectConverter) -> Self {
        Self { converter }
    }

    pub fn parse(&self, value: &str) -> Result<MetadataBlob, DataConversionError> {
        JwsObject::parse(self.converter.json(), value).map(|jws| MetadataBlob { jws })
    }
}
