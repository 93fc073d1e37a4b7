use ciborium::Value;
use openssl::x509::X509;

use super::{AuthenticatorData, CoseAlgorithm};
use crate::converter::ObjectConverter;
use crate::error::DataConversionError;

/// The format-specific `attStmt` map of an attestation object.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AttestationStatement {
    entries: Vec<(Value, Value)>,
}

impl AttestationStatement {
    pub fn from_value(value: Value) -> Result<Self, DataConversionError> {
        match value {
            Value::Map(entries) => Ok(Self { entries }),
            _ => Err(DataConversionError::AttestationObject(
                "attStmt is not a map".into(),
            )),
        }
    }

    pub fn from_entries<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(k, v)| (Value::Text(k.into()), v))
                .collect(),
        }
    }

    pub fn to_value(&self) -> Value {
        Value::Map(self.entries.clone())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(k, _)| k.as_text() == Some(key))
            .map(|(_, v)| v)
    }

    pub fn bytes(&self, key: &str) -> Option<&[u8]> {
        self.get(key).and_then(Value::as_bytes).map(Vec::as_slice)
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_text)
    }

    pub fn integer(&self, key: &str) -> Option<i128> {
        self.get(key).and_then(Value::as_integer).map(i128::from)
    }

    /// The `alg` entry, if present.
    pub fn alg(&self) -> Result<Option<CoseAlgorithm>, DataConversionError> {
        match self.get("alg") {
            None => Ok(None),
            Some(value) => value
                .as_integer()
                .map(i128::from)
                .and_then(|v| i64::try_from(v).ok())
                .ok_or_else(|| {
                    DataConversionError::AttestationObject("alg is not an integer".into())
                })
                .and_then(CoseAlgorithm::try_from)
                .map(Some),
        }
    }

    /// The `x5c` certificate array, leaf first; `None` when absent.
    pub fn x5c(&self) -> Result<Option<Vec<X509>>, DataConversionError> {
        let Some(value) = self.get("x5c") else {
            return Ok(None);
        };
        let items = value
            .as_array()
            .ok_or_else(|| DataConversionError::AttestationObject("x5c is not an array".into()))?;
        items
            .iter()
            .map(|item| {
                let der = item.as_bytes().ok_or_else(|| {
                    DataConversionError::AttestationObject("x5c entry is not a byte string".into())
                })?;
                X509::from_der(der).map_err(|e| DataConversionError::Certificate(e.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Some)
    }
}

/// Decoded `attestationObject`.
#[derive(Debug, Clone, PartialEq)]
pub struct AttestationObject {
    pub fmt: String,
    pub att_stmt: AttestationStatement,
    pub authenticator_data: AuthenticatorData,
    /// Raw bytes; signatures are computed over these, not a re-encoding.
    pub authenticator_data_bytes: Vec<u8>,
}

impl AttestationObject {
    pub fn parse(converter: &ObjectConverter, bytes: &[u8]) -> Result<Self, DataConversionError> {
        let value: Value = converter.cbor().read_value(bytes)?;
        let Value::Map(entries) = value else {
            return Err(DataConversionError::AttestationObject(
                "attestation object is not a map".into(),
            ));
        };

        let mut fmt = None;
        let mut att_stmt = None;
        let mut auth_data = None;
        for (key, value) in entries {
            match key.as_text() {
                Some("fmt") => fmt = value.as_text().map(str::to_owned),
                Some("attStmt") => att_stmt = Some(AttestationStatement::from_value(value)?),
                Some("authData") => auth_data = value.into_bytes().ok(),
                _ => {}
            }
        }

        let fmt =
            fmt.ok_or_else(|| DataConversionError::AttestationObject("fmt is missing".into()))?;
        let att_stmt = att_stmt
            .ok_or_else(|| DataConversionError::AttestationObject("attStmt is missing".into()))?;
        let authenticator_data_bytes = auth_data
            .ok_or_else(|| DataConversionError::AttestationObject("authData is missing".into()))?;
        let authenticator_data =
            AuthenticatorData::parse(converter.cbor(), &authenticator_data_bytes)?;

        Ok(Self {
            fmt,
            att_stmt,
            authenticator_data,
            authenticator_data_bytes,
        })
    }

    pub fn to_bytes(&self, converter: &ObjectConverter) -> Result<Vec<u8>, DataConversionError> {
        let value = Value::Map(vec![
            (Value::Text("fmt".into()), Value::Text(self.fmt.clone())),
            (Value::Text("attStmt".into()), self.att_stmt.to_value()),
            (
                Value::Text("authData".into()),
                Value::Bytes(self.authenticator_data_bytes.clone()),
            ),
        ]);
        converter.cbor().write_value_as_bytes(&value)
    }
}
