use std::sync::Arc;

use tracing::{debug, warn};

use super::{AuthenticatorStatus, MetadataBlob, MetadataBlobPayloadEntry, MetadataBlobProvider};
use crate::anchor::{TrustAnchor, TrustAnchorRepository};
use crate::data::Aaguid;

/// Trust anchors taken from the `attestationRootCertificates` of MDS3 entries.
pub struct MetadataBlobTrustAnchorRepository {
    providers: Vec<Box<dyn MetadataBlobProvider>>,
    /// Accept entries whose latest status is NOT_FIDO_CERTIFIED.
    pub not_fido_certified_allowed: bool,
    /// Accept entries whose latest status is SELF_ASSERTION_SUBMITTED.
    pub self_assertion_submitted_allowed: bool,
}

impl std::fmt::Debug for MetadataBlobTrustAnchorRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataBlobTrustAnchorRepository")
            .field("providers", &self.providers.len())
            .field("not_fido_certified_allowed", &self.not_fido_certified_allowed)
            .field("self_assertion_submitted_allowed", &self.self_assertion_submitted_allowed)
            .finish()
    }
}

impl MetadataBlobTrustAnchorRepository {
    pub fn new(provider: impl MetadataBlobProvider + 'static) -> Self {
        Self::with_providers(vec![Box::new(provider)])
    }

    pub fn with_providers(providers: Vec<Box<dyn MetadataBlobProvider>>) -> Self {
        Self {
            providers,
            not_fido_certified_allowed: false,
            self_assertion_submitted_allowed: false,
        }
    }

    pub fn not_fido_certified_allowed(mut self, allowed: bool) -> Self {
        self.not_fido_certified_allowed = allowed;
        self
    }

    pub fn self_assertion_submitted_allowed(mut self, allowed: bool) -> Self {
        self.self_assertion_submitted_allowed = allowed;
        self
    }

    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    /// BLOBs from every provider that currently succeeds.
    fn blobs(&self) -> Vec<Arc<MetadataBlob>> {
        self.providers
            .iter()
            .enumerate()
            .filter_map(|(index, provider)| match provider.provide() {
                Ok(blob) => Some(blob),
                Err(e) => {
                    warn!(provider = index, error = %e, "metadata BLOB provider failed, skipping");
                    None
                }
            })
            .collect()
    }

    fn is_acceptable(&self, entry: &MetadataBlobPayloadEntry) -> bool {
        let Some(report) = entry.latest_status() else {
            return true;
        };
        match report.status {
            status if status.is_compromised() => false,
            AuthenticatorStatus::NotFidoCertified => self.not_fido_certified_allowed,
            AuthenticatorStatus::SelfAssertionSubmitted => self.self_assertion_submitted_allowed,
            _ => true,
        }
    }

    fn anchors_of<'a>(
        &self,
        entries: impl Iterator<Item = &'a MetadataBlobPayloadEntry>,
    ) -> Vec<TrustAnchor> {
        let mut anchors = Vec::new();
        for entry in entries {
            if !self.is_acceptable(entry) {
                debug!(
                    aaguid = ?entry.aaguid,
                    status = ?entry.latest_status().map(|r| r.status),
                    "metadata entry rejected by status"
                );
                continue;
            }
            if let Some(statement) = &entry.metadata_statement {
                anchors.extend(statement.trust_anchors());
            }
        }
        anchors
    }

    /// Every entry for `aaguid`, regardless of status.
    pub fn find_entries(&self, aaguid: &Aaguid) -> Vec<MetadataBlobPayloadEntry> {
        self.blobs()
            .iter()
            .flat_map(|blob| blob.entries_for_aaguid(aaguid).cloned().collect::<Vec<_>>())
            .collect()
    }
}

impl TrustAnchorRepository for MetadataBlobTrustAnchorRepository {
    fn find(&self, aaguid: &Aaguid) -> Vec<TrustAnchor> {
        self.blobs()
            .iter()
            .flat_map(|blob| self.anchors_of(blob.entries_for_aaguid(aaguid)))
            .collect()
    }

    fn find_by_attestation_certificate_key_identifier(
        &self,
        key_identifier: &[u8],
    ) -> Vec<TrustAnchor> {
        let key_identifier = hex::encode(key_identifier);
        self.blobs()
            .iter()
            .flat_map(|blob| self.anchors_of(blob.entries_for_key_identifier(&key_identifier)))
            .collect()
    }
}
