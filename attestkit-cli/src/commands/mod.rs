//! Subcommand implementations.

pub mod conformance;
pub mod lookup;
pub mod verify;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use attestkit_core::metadata::{
    MetadataBlobTrustAnchorRepository, MetadataLoader, MetadataLoaderConfig,
};
use attestkit_core::ObjectConverter;
use clap::Args;

/// Where metadata comes from. Unset flags fall back to `ATTESTKIT_*` variables, then defaults.
#[derive(Args, Debug, Clone, Default)]
pub struct MetadataArgs {
    /// URL of the production MDS3 BLOB
    #[arg(long, value_name = "URL")]
    pub blob_url: Option<String>,

    /// Root certificate (PEM or DER) the BLOB must chain to
    #[arg(long, value_name = "PATH")]
    pub blob_root_cert: Option<PathBuf>,

    /// Conformance endpoint discovery URL
    #[arg(long, value_name = "URL")]
    pub endpoints_url: Option<String>,

    /// Conformance root certificate URL
    #[arg(long, value_name = "URL")]
    pub conformance_root_url: Option<String>,

    /// HTTP timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,
}

impl MetadataArgs {
    pub fn loader_config(&self) -> MetadataLoaderConfig {
        let mut config = MetadataLoaderConfig::from_env();
        if let Some(url) = &self.blob_url {
            config.blob_url = url.clone();
        }
        if let Some(path) = &self.blob_root_cert {
            config.blob_root_certificate = Some(path.clone());
        }
        if let Some(url) = &self.endpoints_url {
            config.endpoints_url = url.clone();
        }
        if let Some(url) = &self.conformance_root_url {
            config.conformance_root_certificate_url = url.clone();
        }
        if let Some(secs) = self.timeout {
            config.timeout = Duration::from_secs(secs);
        }
        config
    }

    pub fn loader(&self) -> Result<MetadataLoader> {
        Ok(MetadataLoader::new(self.loader_config(), ObjectConverter::new())?)
    }

    /// Production BLOB repository.
    pub async fn repository(&self) -> Result<MetadataBlobTrustAnchorRepository> {
        Ok(self.loader()?.load_trust_anchor_repository().await?)
    }
}
