//! Downloads MDS3 BLOBs and turns them into trust anchor repositories.
//!
//! Requests run one after another; automatic redirects are disabled so the
//! loader can detect redirect loops itself.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use openssl::x509::X509;
use reqwest::header::LOCATION;
use reqwest::{redirect, Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::{
    MetadataBlob, MetadataBlobFactory, MetadataBlobProvider, MetadataBlobTrustAnchorRepository,
    StaticMetadataBlobProvider,
};
use crate::converter::ObjectConverter;
use crate::error::MetadataError;

/// Production FIDO MDS3 BLOB.
pub const DEFAULT_BLOB_URL: &str = "https://mds3.fidoalliance.org/";
/// Conformance endpoint discovery.
pub const DEFAULT_ENDPOINTS_URL: &str = "https://mds3.fido.tools/getEndpoints";
/// Root of the conformance BLOB signing chain.
pub const DEFAULT_CONFORMANCE_ROOT_CERTIFICATE_URL: &str =
    "https://mds3.fido.tools/pki/MDS3ROOT.crt";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_MAX_REDIRECTS: usize = 10;

#[derive(Debug, Clone)]
pub struct MetadataLoaderConfig {
    pub blob_url: String,
    pub endpoints_url: String,
    pub conformance_root_certificate_url: String,
    /// PEM or DER root the production BLOB must chain to. Unverified when `None`.
    pub blob_root_certificate: Option<PathBuf>,
    pub timeout: Duration,
    pub https_only: bool,
    pub max_redirects: usize,
}

impl Default for MetadataLoaderConfig {
    fn default() -> Self {
        Self {
            blob_url: DEFAULT_BLOB_URL.to_string(),
            endpoints_url: DEFAULT_ENDPOINTS_URL.to_string(),
            conformance_root_certificate_url: DEFAULT_CONFORMANCE_ROOT_CERTIFICATE_URL.to_string(),
            blob_root_certificate: None,
            timeout: DEFAULT_TIMEOUT,
            https_only: true,
            max_redirects: DEFAULT_MAX_REDIRECTS,
        }
    }
}

impl MetadataLoaderConfig {
    /// Defaults overridden by `ATTESTKIT_*` environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = std::env::var("ATTESTKIT_MDS_BLOB_URL") {
            config.blob_url = url;
        }
        if let Ok(url) = std::env::var("ATTESTKIT_MDS_ENDPOINTS_URL") {
            config.endpoints_url = url;
        }
        if let Ok(url) = std::env::var("ATTESTKIT_MDS_ROOT_CERT_URL") {
            config.conformance_root_certificate_url = url;
        }
        if let Ok(path) = std::env::var("ATTESTKIT_MDS_BLOB_ROOT_CERT") {
            config.blob_root_certificate = Some(PathBuf::from(path));
        }
        if let Some(secs) = env_parse::<u64>("ATTESTKIT_HTTP_TIMEOUT_SECS") {
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(limit) = env_parse::<usize>("ATTESTKIT_MAX_REDIRECTS") {
            config.max_redirects = limit;
        }
        config
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    let value = std::env::var(name).ok()?;
    match value.trim().parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            warn!(variable = name, value = %value, "ignoring unparsable environment variable");
            None
        }
    }
}

/// Response of the conformance endpoint discovery service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoints {
    pub status: String,
    #[serde(default)]
    pub result: Vec<String>,
}

pub struct MetadataLoader {
    client: Client,
    config: MetadataLoaderConfig,
    converter: ObjectConverter,
    factory: MetadataBlobFactory,
}

impl MetadataLoader {
    #[instrument(level = "debug", skip_all, fields(blob_url = %config.blob_url))]
    pub fn new(
        config: MetadataLoaderConfig,
        converter: ObjectConverter,
    ) -> Result<Self, MetadataError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .https_only(config.https_only)
            .min_tls_version(reqwest::tls::Version::TLS_1_2)
            .redirect(redirect::Policy::none())
            .build()
            .map_err(|e| {
                warn!(error = %e, "Failed to create HTTP client");
                MetadataError::Client(e.to_string())
            })?;
        Ok(Self {
            client,
            config,
            factory: MetadataBlobFactory::new(converter.clone()),
            converter,
        })
    }

    pub fn config(&self) -> &MetadataLoaderConfig {
        &self.config
    }

    /// GET `url` as text, following redirects by hand.
    #[instrument(level = "debug", skip(self))]
    pub async fn read_string_from_url(&self, url: &str) -> Result<String, MetadataError> {
        let mut visited: Vec<String> = Vec::new();
        let mut current = url.to_string();
        loop {
            if visited.contains(&current) {
                visited.push(current);
                return Err(MetadataError::RedirectLoop { visited });
            }
            if visited.len() > self.config.max_redirects {
                return Err(MetadataError::TooManyRedirects {
                    url: url.to_string(),
                    limit: self.config.max_redirects,
                });
            }
            visited.push(current.clone());

            let response = self
                .client
                .get(&current)
                .send()
                .await
                .map_err(|source| MetadataError::Transport {
                    url: current.clone(),
                    source,
                })?;
            let status = response.status();
            info!(url = %current, status = status.as_u16(), "metadata response");

            if status.is_redirection() {
                let location = response
                    .headers()
                    .get(LOCATION)
                    .and_then(|value| value.to_str().ok())
                    .ok_or_else(|| MetadataError::MissingLocation { url: current.clone() })?;
                let next = resolve(&current, location)?;
                info!(from = %current, to = %next, "following redirect");
                current = next;
                continue;
            }

            let body = response.text().await.map_err(|source| MetadataError::Transport {
                url: current.clone(),
                source,
            })?;
            if status != StatusCode::OK {
                return Err(MetadataError::UnexpectedStatus {
                    url: current,
                    status: status.as_u16(),
                    body,
                });
            }
            return Ok(body);
        }
    }

    /// Ask the discovery service for the BLOB URLs of a conformance `endpoint`.
    #[instrument(level = "debug", skip(self))]
    pub async fn load_endpoints(&self, endpoint: &str) -> Result<Endpoints, MetadataError> {
        let url = &self.config.endpoints_url;
        let body = serde_json::json!({ "endpoint": endpoint });
        let response = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|source| MetadataError::Transport {
                url: url.clone(),
                source,
            })?;
        let status = response.status();
        let text = response.text().await.map_err(|source| MetadataError::Transport {
            url: url.clone(),
            source,
        })?;
        if status != StatusCode::OK {
            return Err(MetadataError::Endpoints {
                endpoint: endpoint.to_string(),
                reason: format!("Status Code: {} . Response: {text}", status.as_u16()),
            });
        }

        let endpoints: Endpoints = self.converter.json().read_str(&text)?;
        if endpoints.status != "ok" {
            return Err(MetadataError::Endpoints {
                endpoint: endpoint.to_string(),
                reason: format!("discovery status is {:?}", endpoints.status),
            });
        }
        debug!(count = endpoints.result.len(), "conformance endpoints discovered");
        Ok(endpoints)
    }

    /// GET a certificate in DER or PEM form.
    #[instrument(level = "debug", skip(self))]
    pub async fn load_certificate_from_url(&self, url: &str) -> Result<X509, MetadataError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| MetadataError::Transport {
                url: url.to_string(),
                source,
            })?;
        let status = response.status();
        let bytes = response.bytes().await.map_err(|source| MetadataError::Transport {
            url: url.to_string(),
            source,
        })?;
        if status != StatusCode::OK {
            return Err(MetadataError::UnexpectedStatus {
                url: url.to_string(),
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }
        parse_certificate(&bytes)
    }

    /// Fetch and parse the BLOB at `blob_url`, verifying it when a root is configured.
    pub async fn load_metadata_blob(&self) -> Result<MetadataBlob, MetadataError> {
        let text = self.read_string_from_url(&self.config.blob_url).await?;
        let blob = self.factory.parse(&text)?;

        match &self.config.blob_root_certificate {
            Some(path) => {
                let bytes = std::fs::read(path).map_err(|e| {
                    MetadataError::Certificate(format!("cannot read {}: {e}", path.display()))
                })?;
                let root = parse_certificate(&bytes)?;
                blob.verify(&root)?;
                debug!(root = %path.display(), "metadata BLOB signature verified");
            }
            None => {
                warn!("no BLOB root certificate configured, metadata BLOB signature not verified")
            }
        }

        let payload = blob.payload();
        if blob.is_expired(Utc::now().date_naive()) {
            warn!(
                next_update = %payload.next_update,
                no = payload.no,
                "metadata BLOB is past its nextUpdate"
            );
        }
        info!(no = payload.no, entries = payload.entries.len(), "metadata BLOB loaded");
        Ok(blob)
    }

    pub async fn load_trust_anchor_repository(
        &self,
    ) -> Result<MetadataBlobTrustAnchorRepository, MetadataError> {
        let blob = self.load_metadata_blob().await?;
        Ok(MetadataBlobTrustAnchorRepository::new(StaticMetadataBlobProvider::new(blob)))
    }

    /// Repository over every conformance BLOB of `endpoint` that loads and verifies.
    #[instrument(level = "debug", skip(self))]
    pub async fn load_conformance_trust_anchor_repository(
        &self,
        endpoint: &str,
    ) -> Result<MetadataBlobTrustAnchorRepository, MetadataError> {
        let root = self
            .load_certificate_from_url(&self.config.conformance_root_certificate_url)
            .await?;
        let endpoints = self.load_endpoints(endpoint).await?;

        let mut providers: Vec<Box<dyn MetadataBlobProvider>> = Vec::new();
        for url in &endpoints.result {
            match self.load_verified_blob(url, &root).await {
                Ok(blob) => {
                    providers.push(Box::new(StaticMetadataBlobProvider::new(Arc::new(blob))))
                }
                Err(e) => {
                    warn!(url = %url, error = %e, "Failed to provide metadata BLOB, skipping")
                }
            }
        }
        info!(
            loaded = providers.len(),
            discovered = endpoints.result.len(),
            "conformance metadata BLOBs loaded"
        );
        Ok(MetadataBlobTrustAnchorRepository::with_providers(providers))
    }

    async fn load_verified_blob(
        &self,
        url: &str,
        root: &X509,
    ) -> Result<MetadataBlob, MetadataError> {
        let text = self.read_string_from_url(url).await?;
        let blob = self.factory.parse(&text)?;
        blob.verify(root)?;
        Ok(blob)
    }
}

fn resolve(base: &str, location: &str) -> Result<String, MetadataError> {
    let base = Url::parse(base).map_err(|e| MetadataError::InvalidUrl {
        url: base.to_string(),
        reason: e.to_string(),
    })?;
    base.join(location)
        .map(String::from)
        .map_err(|e| MetadataError::InvalidUrl {
            url: location.to_string(),
            reason: e.to_string(),
        })
}

fn parse_certificate(bytes: &[u8]) -> Result<X509, MetadataError> {
    X509::from_der(bytes)
        .or_else(|_| X509::from_pem(bytes))
        .map_err(|e| MetadataError::Certificate(e.to_string()))
}
