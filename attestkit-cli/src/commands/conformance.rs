//! Conformance command implementation.

use anyhow::{Context, Result};
use attestkit_core::TrustAnchorRepository;
use colored::Colorize;
use tracing::info;

use super::MetadataArgs;
use crate::utils::{parse_aaguid, print_anchor};

/// Execute the conformance command.
pub async fn execute(
    endpoint: String,
    aaguid: String,
    metadata: MetadataArgs,
    quiet: bool,
) -> Result<()> {
    let aaguid = parse_aaguid(&aaguid)?;
    let repository = metadata
        .loader()?
        .load_conformance_trust_anchor_repository(&endpoint)
        .await
        .with_context(|| format!("Failed to load conformance metadata for {endpoint}"))?;

    let anchors = repository.find(&aaguid);
    info!(
        %aaguid,
        blobs = repository.provider_count(),
        anchors = anchors.len(),
        "Conformance lookup complete"
    );

    if quiet {
        return Ok(());
    }
    println!();
    println!("   {} {}", "Endpoint:".dimmed(), endpoint);
    println!("   {} {}", "BLOBs:".dimmed(), repository.provider_count());
    println!("   {} {}", "AAGUID:".dimmed(), aaguid);
    if anchors.is_empty() {
        println!("   {} {}", "Anchors:".dimmed(), "none".yellow());
    } else {
        println!("   {} {}", "Anchors:".dimmed(), anchors.len());
        for (index, anchor) in anchors.iter().enumerate() {
            print_anchor(index, anchor);
        }
    }
    Ok(())
}
