//! Common utility functions shared across CLI commands.

use std::path::Path;

use anyhow::{Context, Result};
use attestkit_core::{Aaguid, CertificateTrustAnchorRepository, TrustAnchor};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use colored::Colorize;
use tracing::debug;

use crate::exit_codes::UsageError;

pub fn read_file(path: &Path) -> Result<Vec<u8>> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read file: {}", path.display()))?;
    debug!(path = %path.display(), bytes = bytes.len(), "Read file");
    Ok(bytes)
}

pub fn parse_aaguid(value: &str) -> Result<Aaguid> {
    value
        .trim()
        .parse()
        .map_err(|e| UsageError(format!("Invalid AAGUID {value:?}: {e}")).into())
}

/// Challenges are passed the way the browser reports them: base64url, padding optional.
pub fn decode_challenge(value: &str) -> Result<Vec<u8>> {
    URL_SAFE_NO_PAD
        .decode(value.trim().trim_end_matches('='))
        .map_err(|e| UsageError(format!("Invalid challenge (expected base64url): {e}")).into())
}

/// Every certificate in every PEM bundle.
pub fn load_anchor_files(paths: &[impl AsRef<Path>]) -> Result<CertificateTrustAnchorRepository> {
    let mut certificates = Vec::new();
    for path in paths {
        let path = path.as_ref();
        let pem = read_file(path)?;
        let bundle = CertificateTrustAnchorRepository::from_pem_bundle(&pem)
            .with_context(|| format!("Failed to parse certificates in {}", path.display()))?;
        certificates.extend(bundle.anchors().iter().map(|a| a.certificate().clone()));
    }
    Ok(CertificateTrustAnchorRepository::new(certificates))
}

pub fn print_anchor(index: usize, anchor: &TrustAnchor) {
    println!("   {} {}", format!("[{index}]").dimmed(), anchor.subject());
    println!("       {} {}", "SHA-256:".dimmed(), anchor.fingerprint_sha256());
}
