//! Trust anchors and the repositories that hand them to the cert-path verifier.

use std::fmt;

use openssl::hash::MessageDigest;
use openssl::stack::Stack;
use openssl::x509::store::X509StoreBuilder;
use openssl::x509::verify::X509VerifyFlags;
use openssl::x509::{X509StoreContext, X509};
use x509_parser::parse_x509_certificate;

use crate::data::Aaguid;
use crate::error::DataConversionError;

/// A root certificate trusted for attestation (or metadata) chains.
#[derive(Clone)]
pub struct TrustAnchor {
    certificate: X509,
}

impl TrustAnchor {
    pub fn new(certificate: X509) -> Self {
        Self { certificate }
    }

    pub fn from_der(der: &[u8]) -> Result<Self, DataConversionError> {
        X509::from_der(der)
            .map(Self::new)
            .map_err(|e| DataConversionError::Certificate(e.to_string()))
    }

    pub fn from_pem(pem: &[u8]) -> Result<Self, DataConversionError> {
        X509::from_pem(pem)
            .map(Self::new)
            .map_err(|e| DataConversionError::Certificate(e.to_string()))
    }

    pub fn certificate(&self) -> &X509 {
        &self.certificate
    }

    /// RFC 4514 style subject, or an empty string if the DER cannot be re-read.
    pub fn subject(&self) -> String {
        let Ok(der) = self.certificate.to_der() else {
            return String::new();
        };
        match parse_x509_certificate(&der) {
            Ok((_, cert)) => cert.subject().to_string(),
            Err(_) => String::new(),
        }
    }

    pub fn fingerprint_sha256(&self) -> String {
        self.certificate
            .digest(MessageDigest::sha256())
            .map(|d| hex::encode(d))
            .unwrap_or_default()
    }
}

impl PartialEq for TrustAnchor {
    fn eq(&self, other: &Self) -> bool {
        matches!(
            (self.certificate.to_der(), other.certificate.to_der()),
            (Ok(a), Ok(b)) if a == b
        )
    }
}

impl fmt::Debug for TrustAnchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrustAnchor")
            .field("subject", &self.subject())
            .field("sha256", &self.fingerprint_sha256())
            .finish()
    }
}

impl fmt::Display for TrustAnchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (sha256 {})", self.subject(), self.fingerprint_sha256())
    }
}

/// Source of trust anchors for attestation certificate paths.
pub trait TrustAnchorRepository: Send + Sync {
    fn find(&self, aaguid: &Aaguid) -> Vec<TrustAnchor>;

    /// Lookup used for FIDO U2F, whose authenticators carry no AAGUID.
    fn find_by_attestation_certificate_key_identifier(
        &self,
        key_identifier: &[u8],
    ) -> Vec<TrustAnchor>;
}

/// Returns the same fixed certificate set for every query.
#[derive(Debug, Clone, Default)]
pub struct CertificateTrustAnchorRepository {
    anchors: Vec<TrustAnchor>,
}

impl CertificateTrustAnchorRepository {
    pub fn new(certificates: impl IntoIterator<Item = X509>) -> Self {
        Self {
            anchors: certificates.into_iter().map(TrustAnchor::new).collect(),
        }
    }

    pub fn from_pem_bundle(pem: &[u8]) -> Result<Self, DataConversionError> {
        let certificates =
            X509::stack_from_pem(pem).map_err(|e| DataConversionError::Certificate(e.to_string()))?;
        if certificates.is_empty() {
            return Err(DataConversionError::Certificate(
                "PEM bundle contains no certificates".into(),
            ));
        }
        Ok(Self::new(certificates))
    }

    pub fn from_der_list<'a>(
        ders: impl IntoIterator<Item = &'a [u8]>,
    ) -> Result<Self, DataConversionError> {
        let anchors = ders
            .into_iter()
            .map(TrustAnchor::from_der)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { anchors })
    }

    pub fn anchors(&self) -> &[TrustAnchor] {
        &self.anchors
    }
}

impl TrustAnchorRepository for CertificateTrustAnchorRepository {
    fn find(&self, _aaguid: &Aaguid) -> Vec<TrustAnchor> {
        self.anchors.clone()
    }

    fn find_by_attestation_certificate_key_identifier(
        &self,
        _key_identifier: &[u8],
    ) -> Vec<TrustAnchor> {
        self.anchors.clone()
    }
}

/// Check that `path` (leaf first) chains to one of `anchors`.
///
/// Validity periods are not checked here; callers compare them against
/// their own verification time.
pub fn validate_certificate_path(path: &[X509], anchors: &[TrustAnchor]) -> Result<(), String> {
    let (leaf, intermediates) = path
        .split_first()
        .ok_or_else(|| "certificate path is empty".to_string())?;

    let mut builder = X509StoreBuilder::new().map_err(|e| e.to_string())?;
    for anchor in anchors {
        builder
            .add_cert(anchor.certificate().clone())
            .map_err(|e| e.to_string())?;
    }
    builder
        .set_flags(X509VerifyFlags::NO_CHECK_TIME | X509VerifyFlags::PARTIAL_CHAIN)
        .map_err(|e| e.to_string())?;
    let store = builder.build();

    let mut chain = Stack::new().map_err(|e| e.to_string())?;
    for cert in intermediates {
        chain.push(cert.clone()).map_err(|e| e.to_string())?;
    }

    let mut context = X509StoreContext::new().map_err(|e| e.to_string())?;
    let outcome = context
        .init(&store, leaf, &chain, |c| {
            let ok = c.verify_cert()?;
            Ok(if ok { Ok(()) } else { Err(c.error().error_string().to_string()) })
        })
        .map_err(|e| e.to_string())?;
    outcome
}
