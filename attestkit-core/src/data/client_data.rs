use serde::{Deserialize, Serialize};

use super::decode_base64url;
use crate::converter::JsonConverter;
use crate::error::DataConversionError;

/// Decoded `clientDataJSON`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectedClientData {
    #[serde(rename = "type")]
    pub type_: String,
    /// base64url, as sent by the browser
    pub challenge: String,
    pub origin: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cross_origin: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_origin: Option<String>,
}

impl CollectedClientData {
    pub const TYPE_CREATE: &'static str = "webauthn.create";
    pub const TYPE_GET: &'static str = "webauthn.get";

    pub fn parse(converter: &JsonConverter, bytes: &[u8]) -> Result<Self, DataConversionError> {
        converter.read_value(bytes)
    }

    pub fn challenge_bytes(&self) -> Result<Vec<u8>, DataConversionError> {
        decode_base64url(&self.challenge)
    }
}
