use std::sync::Arc;

use chrono::{DateTime, Utc};
use openssl::x509::X509Ref;
use tracing::debug;

use super::CertPathTrustworthinessVerifier;
use crate::anchor::{validate_certificate_path, TrustAnchor, TrustAnchorRepository};
use crate::data::Aaguid;
use crate::error::VerificationError;
use crate::verifier::attestation::certificate::with_parsed;
use crate::verifier::VerifiedAttestation;

/// SHA-1 of the subjectPublicKey bits, the MDS key identifier for U2F authenticators.
pub fn attestation_certificate_key_identifier(
    cert: &X509Ref,
) -> Result<[u8; 20], VerificationError> {
    with_parsed(cert, |parsed| {
        Ok(openssl::sha::sha1(&parsed.public_key().subject_public_key.data))
    })
}

fn check_validity(cert: &X509Ref, at: DateTime<Utc>) -> Result<(), VerificationError> {
    with_parsed(cert, |parsed| {
        let validity = parsed.validity();
        let now = at.timestamp();
        if now < validity.not_before.timestamp() || now > validity.not_after.timestamp() {
            return Err(VerificationError::Certificate(format!(
                "certificate {} is not valid at {at}",
                parsed.subject()
            )));
        }
        Ok(())
    })
}

fn same_certificate(a: &X509Ref, b: &X509Ref) -> bool {
    matches!((a.to_der(), b.to_der()), (Ok(x), Ok(y)) if x == y)
}

/// Chains attestation certificates to anchors from a [`TrustAnchorRepository`].
#[derive(Clone)]
pub struct DefaultCertPathTrustworthinessVerifier {
    repository: Arc<dyn TrustAnchorRepository>,
    /// Reject paths that already contain the trust anchor.
    pub full_chain_prohibited: bool,
}

impl DefaultCertPathTrustworthinessVerifier {
    pub fn new(repository: Arc<dyn TrustAnchorRepository>) -> Self {
        Self {
            repository,
            full_chain_prohibited: false,
        }
    }

    pub fn with_full_chain_prohibited(mut self, prohibited: bool) -> Self {
        self.full_chain_prohibited = prohibited;
        self
    }

    fn find_anchors(
        &self,
        aaguid: &Aaguid,
        attestation: &VerifiedAttestation,
        leaf: &X509Ref,
    ) -> Result<Vec<TrustAnchor>, VerificationError> {
        if attestation.format == "fido-u2f" {
            let key_id = attestation_certificate_key_identifier(leaf)?;
            let anchors = self
                .repository
                .find_by_attestation_certificate_key_identifier(&key_id);
            if anchors.is_empty() {
                return Err(VerificationError::TrustAnchorNotFound(format!(
                    "attestation certificate key identifier {}",
                    hex::encode(key_id)
                )));
            }
            Ok(anchors)
        } else {
            let anchors = self.repository.find(aaguid);
            if anchors.is_empty() {
                return Err(VerificationError::TrustAnchorNotFound(format!("AAGUID {aaguid}")));
            }
            Ok(anchors)
        }
    }
}

impl CertPathTrustworthinessVerifier for DefaultCertPathTrustworthinessVerifier {
    fn verify(
        &self,
        aaguid: &Aaguid,
        attestation: &VerifiedAttestation,
        timestamp: DateTime<Utc>,
    ) -> Result<(), VerificationError> {
        let leaf = attestation
            .trust_path
            .first()
            .ok_or_else(|| {
                VerificationError::Certificate("attestation trust path is empty".into())
            })?;
        let anchors = self.find_anchors(aaguid, attestation, leaf)?;

        if self.full_chain_prohibited
            && attestation
                .trust_path
                .iter()
                .any(|cert| anchors.iter().any(|a| same_certificate(cert, a.certificate())))
        {
            return Err(VerificationError::Certificate(
                "trust path must not include the trust anchor".into(),
            ));
        }

        for cert in &attestation.trust_path {
            check_validity(cert, timestamp)?;
        }

        validate_certificate_path(&attestation.trust_path, &anchors)
            .map_err(VerificationError::Certificate)?;
        debug!(
            format = %attestation.format,
            %aaguid,
            anchors = anchors.len(),
            "attestation certificate path trusted"
        );
        Ok(())
    }
}

/// Trusts every certificate path. For tests and non-strict managers only.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullCertPathTrustworthinessVerifier;

impl CertPathTrustworthinessVerifier for NullCertPathTrustworthinessVerifier {
    fn verify(
        &self,
        _: &Aaguid,
        _: &VerifiedAttestation,
        _: DateTime<Utc>,
    ) -> Result<(), VerificationError> {
        Ok(())
    }
}
