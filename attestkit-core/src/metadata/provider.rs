use std::sync::Arc;

use super::MetadataBlob;
use crate::error::MetadataError;

/// Supplies the current metadata BLOB to a trust anchor repository.
pub trait MetadataBlobProvider: Send + Sync {
    fn provide(&self) -> Result<Arc<MetadataBlob>, MetadataError>;
}

impl<F> MetadataBlobProvider for F
where
    F: Fn() -> Result<Arc<MetadataBlob>, MetadataError> + Send + Sync,
{
    fn provide(&self) -> Result<Arc<MetadataBlob>, MetadataError> {
        self()
    }
}

/// Always hands out the same, already loaded BLOB.
#[derive(Debug, Clone)]
pub struct StaticMetadataBlobProvider {
    blob: Arc<MetadataBlob>,
}

impl StaticMetadataBlobProvider {
    pub fn new(blob: impl Into<Arc<MetadataBlob>>) -> Self {
        Self { blob: blob.into() }
    }
}

impl MetadataBlobProvider for StaticMetadataBlobProvider {
    fn provide(&self) -> Result<Arc<MetadataBlob>, MetadataError> {
        Ok(Arc::clone(&self.blob))
    }
}
