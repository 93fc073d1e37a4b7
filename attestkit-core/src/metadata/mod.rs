//! FIDO Metadata Service (MDS3) support.
//!
//! - `blob`: the BLOB JWS and its payload
//! - `provider`: sources of the current BLOB
//! - `repository`: trust anchors keyed by AAGUID / key identifier
//! - `loader`: HTTP download of BLOBs (requires the `network` feature)

mod blob;
#[cfg(feature = "network")]
mod loader;
mod provider;
mod repository;

pub use blob::{
    AuthenticatorStatus, MetadataBlob, MetadataBlobFactory, MetadataBlobPayload,
    MetadataBlobPayloadEntry, MetadataStatement, StatusReport, Version,
};
#[cfg(feature = "network")]
pub use loader::{
    Endpoints, MetadataLoader, MetadataLoaderConfig, DEFAULT_BLOB_URL,
    DEFAULT_CONFORMANCE_ROOT_CERTIFICATE_URL, DEFAULT_ENDPOINTS_URL,
};
pub use provider::{MetadataBlobProvider, StaticMetadataBlobProvider};
pub use repository::MetadataBlobTrustAnchorRepository;
