//! JSON and CBOR conversion shared by every parser in the crate.
//!
//! The [`ObjectConverter`] chosen for a [`RegistrationManager`](crate::RegistrationManager)
//! is also handed to the verifier factories of the configurers, so custom
//! verifiers decode data the same way the manager does.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::DataConversionError;

/// Nesting depth accepted when decoding CBOR.
pub const DEFAULT_CBOR_RECURSION_LIMIT: usize = 256;

/// JSON reader/writer backed by `serde_json`.
#[derive(Debug, Clone, Default)]
pub struct JsonConverter {
    pretty: bool,
}

impl JsonConverter {
    /// Emit indented JSON from the `write_*` methods.
    pub fn pretty(mut self) -> Self {
        self.pretty = true;
        self
    }

    pub fn read_value<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, DataConversionError> {
        serde_json::from_slice(bytes).map_err(|e| DataConversionError::Json(e.to_string()))
    }

    pub fn read_str<T: DeserializeOwned>(&self, value: &str) -> Result<T, DataConversionError> {
        serde_json::from_str(value).map_err(|e| DataConversionError::Json(e.to_string()))
    }

    pub fn write_value_as_string<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<String, DataConversionError> {
        let result = if self.pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        };
        result.map_err(|e| DataConversionError::Json(e.to_string()))
    }

    pub fn write_value_as_bytes<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, DataConversionError> {
        self.write_value_as_string(value).map(String::into_bytes)
    }
}

/// CBOR reader/writer backed by `ciborium`.
#[derive(Debug, Clone)]
pub struct CborConverter {
    recursion_limit: usize,
}

impl Default for CborConverter {
    fn default() -> Self {
        Self {
            recursion_limit: DEFAULT_CBOR_RECURSION_LIMIT,
        }
    }
}

impl CborConverter {
    pub fn with_recursion_limit(recursion_limit: usize) -> Self {
        Self { recursion_limit }
    }

    /// Decode exactly one CBOR item; trailing bytes are an error.
    pub fn read_value<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, DataConversionError> {
        let (value, rest) = self.read_prefix(bytes)?;
        if !rest.is_empty() {
            return Err(DataConversionError::Cbor(format!(
                "{} trailing bytes after CBOR item",
                rest.len()
            )));
        }
        Ok(value)
    }

    /// Decode one CBOR item from the front of `bytes`, returning the unread tail.
    pub fn read_prefix<'a, T: DeserializeOwned>(
        &self,
        bytes: &'a [u8],
    ) -> Result<(T, &'a [u8]), DataConversionError> {
        let mut cursor = bytes;
        let value =
            ciborium::de::from_reader_with_recursion_limit(&mut cursor, self.recursion_limit)
            .map_err(|e| DataConversionError::Cbor(e.to_string()))?;
        Ok((value, cursor))
    }

    pub fn write_value_as_bytes<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, DataConversionError> {
        let mut out = Vec::new();
        ciborium::ser::into_writer(value, &mut out)
            .map_err(|e| DataConversionError::Cbor(e.to_string()))?;
        Ok(out)
    }
}

/// Bundle of the JSON and CBOR converters.
#[derive(Debug, Clone, Default)]
pub struct ObjectConverter {
    json: JsonConverter,
    cbor: CborConverter,
}

impl ObjectConverter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_converters(json: JsonConverter, cbor: CborConverter) -> Self {
        Self { json, cbor }
    }

    pub fn json(&self) -> &JsonConverter {
        &self.json
    }

    pub fn cbor(&self) -> &CborConverter {
        &self.cbor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ciborium::Value;

    #[test]
    fn test_cbor_prefix_leaves_tail() {
        let converter = CborConverter::default();
        let mut bytes = converter
            .write_value_as_bytes(&Value::Integer(7.into()))
            .unwrap();
        bytes.extend_from_slice(&[0xde, 0xad]);

        let (value, rest): (Value, _) = converter.read_prefix(&bytes).unwrap();
        assert_eq!(value, Value::Integer(7.into()));
        assert_eq!(rest, &[0xde, 0xad]);
    }

    #[test]
    fn test_cbor_rejects_trailing_bytes() {
        let converter = CborConverter::default();
        let mut bytes = converter.write_value_as_bytes(&Value::Bool(true)).unwrap();
        bytes.push(0x00);
        assert!(converter.read_value::<Value>(&bytes).is_err());
    }

    #[test]
    fn test_cbor_recursion_limit() {
        let converter = CborConverter::with_recursion_limit(1);
        let nested = Value::Array(vec![Value::Array(vec![Value::Array(vec![Value::Array(
            vec![Value::Null],
        )])])]);
        let bytes = CborConverter::default().write_value_as_bytes(&nested).unwrap();
        assert!(converter.read_value::<Value>(&bytes).is_err());
    }

    #[test]
    fn test_json_pretty_output() {
        let converter = JsonConverter::default().pretty();
        let out = converter
            .write_value_as_string(&serde_json::json!({"a": 1}))
            .unwrap();
        assert!(out.contains('\n'));
    }
}
