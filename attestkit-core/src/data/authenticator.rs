use ciborium::Value;

use super::{Aaguid, CoseKey};
use crate::converter::CborConverter;
use crate::error::DataConversionError;

/// rpIdHash (32) + flags (1) + signCount (4)
const FIXED_LEN: usize = 37;
/// aaguid (16) + credentialIdLength (2)
const ATTESTED_HEADER_LEN: usize = 18;

/// Authenticator data flag byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatorFlags(u8);

impl AuthenticatorFlags {
    pub const USER_PRESENT: u8 = 0x01;
    pub const USER_VERIFIED: u8 = 0x04;
    pub const BACKUP_ELIGIBLE: u8 = 0x08;
    pub const BACKUP_STATE: u8 = 0x10;
    pub const ATTESTED_CREDENTIAL_DATA: u8 = 0x40;
    pub const EXTENSION_DATA: u8 = 0x80;

    pub const fn new(bits: u8) -> Self {
        Self(bits)
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    fn has(self, flag: u8) -> bool {
        self.0 & flag != 0
    }

    pub fn user_present(self) -> bool {
        self.has(Self::USER_PRESENT)
    }

    pub fn user_verified(self) -> bool {
        self.has(Self::USER_VERIFIED)
    }

    pub fn backup_eligible(self) -> bool {
        self.has(Self::BACKUP_ELIGIBLE)
    }

    pub fn backup_state(self) -> bool {
        self.has(Self::BACKUP_STATE)
    }

    pub fn attested_credential_data(self) -> bool {
        self.has(Self::ATTESTED_CREDENTIAL_DATA)
    }

    pub fn extension_data(self) -> bool {
        self.has(Self::EXTENSION_DATA)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttestedCredentialData {
    pub aaguid: Aaguid,
    pub credential_id: Vec<u8>,
    pub credential_public_key: CoseKey,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AuthenticatorData {
    pub rp_id_hash: [u8; 32],
    pub flags: AuthenticatorFlags,
    pub sign_count: u32,
    pub attested_credential_data: Option<AttestedCredentialData>,
    pub extensions: Option<Value>,
}

fn malformed(reason: impl Into<String>) -> DataConversionError {
    DataConversionError::AuthenticatorData(reason.into())
}

impl AuthenticatorData {
    /// Parse the binary authenticator data layout (WebAuthn §6.1).
    pub fn parse(converter: &CborConverter, bytes: &[u8]) -> Result<Self, DataConversionError> {
        if bytes.len() < FIXED_LEN {
            return Err(malformed(format!(
                "expected at least {FIXED_LEN} bytes, got {}",
                bytes.len()
            )));
        }

        let mut rp_id_hash = [0u8; 32];
        rp_id_hash.copy_from_slice(&bytes[..32]);
        let flags = AuthenticatorFlags(bytes[32]);
        let sign_count = u32::from_be_bytes([bytes[33], bytes[34], bytes[35], bytes[36]]);
        let mut rest = &bytes[FIXED_LEN..];

        let attested_credential_data = if flags.attested_credential_data() {
            if rest.len() < ATTESTED_HEADER_LEN {
                return Err(malformed("attested credential data is truncated"));
            }
            let mut aaguid = [0u8; 16];
            aaguid.copy_from_slice(&rest[..16]);
            let id_len = usize::from(u16::from_be_bytes([rest[16], rest[17]]));
            rest = &rest[ATTESTED_HEADER_LEN..];
            if rest.len() < id_len {
                return Err(malformed("credential id is truncated"));
            }
            let (credential_id, tail) = rest.split_at(id_len);
            let (key, tail): (Value, &[u8]) = converter.read_prefix(tail)?;
            rest = tail;
            Some(AttestedCredentialData {
                aaguid: Aaguid::from_bytes(aaguid),
                credential_id: credential_id.to_vec(),
                credential_public_key: CoseKey::from_value(&key)?,
            })
        } else {
            None
        };

        let extensions = if flags.extension_data() {
            let (value, tail): (Value, &[u8]) = converter.read_prefix(rest)?;
            if value.as_map().is_none() {
                return Err(malformed("extensions must be a CBOR map"));
            }
            rest = tail;
            Some(value)
        } else {
            None
        };

        if !rest.is_empty() {
            return Err(malformed(format!("{} unexpected trailing bytes", rest.len())));
        }

        Ok(Self {
            rp_id_hash,
            flags,
            sign_count,
            attested_credential_data,
            extensions,
        })
    }

    /// Serialize back into the binary layout.
    pub fn to_bytes(&self, converter: &CborConverter) -> Result<Vec<u8>, DataConversionError> {
        let mut out = Vec::with_capacity(FIXED_LEN + 128);
        out.extend_from_slice(&self.rp_id_hash);
        out.push(self.flags.bits());
        out.extend_from_slice(&self.sign_count.to_be_bytes());
        if let Some(acd) = &self.attested_credential_data {
            let id_len = u16::try_from(acd.credential_id.len())
                .map_err(|_| malformed("credential id is longer than 65535 bytes"))?;
            out.extend_from_slice(acd.aaguid.as_bytes());
            out.extend_from_slice(&id_len.to_be_bytes());
            out.extend_from_slice(&acd.credential_id);
            out.extend(converter.write_value_as_bytes(&acd.credential_public_key.to_value())?);
        }
        if let Some(extensions) = &self.extensions {
            out.extend(converter.write_value_as_bytes(extensions)?);
        }
        Ok(out)
    }
}
