//! Lookup command implementation.

use anyhow::{Context, Result};
use attestkit_core::metadata::MetadataBlobPayloadEntry;
use attestkit_core::TrustAnchorRepository;
use colored::Colorize;
use tracing::info;

use super::MetadataArgs;
use crate::utils::{parse_aaguid, print_anchor};

/// Execute the lookup command.
pub async fn execute(
    aaguid: String,
    metadata: MetadataArgs,
    json: bool,
    quiet: bool,
) -> Result<()> {
    let aaguid = parse_aaguid(&aaguid)?;
    let repository = metadata
        .repository()
        .await
        .context("Failed to load metadata BLOB")?;

    let entries = repository.find_entries(&aaguid);
    let anchors = repository.find(&aaguid);
    info!(%aaguid, entries = entries.len(), anchors = anchors.len(), "Lookup complete");

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }
    if quiet {
        return Ok(());
    }

    if entries.is_empty() {
        println!("{} no metadata entry for {}", "!".yellow().bold(), aaguid);
        return Ok(());
    }
    for entry in &entries {
        print_entry(entry);
    }
    println!();
    if anchors.is_empty() {
        println!("{} no usable trust anchors", "Anchors:".dimmed());
    } else {
        println!("{} {}", "Anchors:".dimmed(), anchors.len());
        for (index, anchor) in anchors.iter().enumerate() {
            print_anchor(index, anchor);
        }
    }
    Ok(())
}

fn print_entry(entry: &MetadataBlobPayloadEntry) {
    let description = entry
        .metadata_statement
        .as_ref()
        .map(|s| s.description.as_str())
        .unwrap_or("(no metadata statement)");
    println!();
    println!("   {}", description.bold());
    if let Some(status) = entry.latest_status() {
        let label = format!("{:?}", status.status);
        let label = if status.status.is_compromised() {
            label.red()
        } else {
            label.green()
        };
        match status.effective_date {
            Some(date) => println!("   {} {} (since {date})", "Status:".dimmed(), label),
            None => println!("   {} {}", "Status:".dimmed(), label),
        }
    }
}
