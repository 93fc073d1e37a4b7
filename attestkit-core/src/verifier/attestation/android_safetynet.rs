use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, TimeDelta, Utc};
use serde::Deserialize;
use tracing::debug;

use super::certificate::with_parsed;
use super::AttestationStatementVerifier;
use crate::error::VerificationError;
use crate::jws::JwsObject;
use crate::verifier::{
    conversion, missing, AttestationType, RegistrationObject, VerifiedAttestation,
};

const ATTEST_HOSTNAME: &str = "attest.android.com";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SafetyNetResponse {
    nonce: String,
    timestamp_ms: i64,
    #[serde(default)]
    cts_profile_match: bool,
    #[serde(default)]
    basic_integrity: bool,
}

/// `fmt: "android-safetynet"`.
#[derive(Debug, Clone)]
pub struct AndroidSafetyNetAttestationStatementVerifier {
    /// How far `timestampMs` may lie ahead of the verification time.
    pub forward_threshold: TimeDelta,
    /// How far `timestampMs` may lie behind the verification time.
    pub backward_threshold: TimeDelta,
}

impl Default for AndroidSafetyNetAttestationStatementVerifier {
    fn default() -> Self {
        Self {
            forward_threshold: TimeDelta::seconds(60),
            backward_threshold: TimeDelta::seconds(60),
        }
    }
}

impl AndroidSafetyNetAttestationStatementVerifier {
    pub fn with_thresholds(forward: TimeDelta, backward: TimeDelta) -> Self {
        Self {
            forward_threshold: forward,
            backward_threshold: backward,
        }
    }

    fn check_timestamp(
        &self,
        timestamp_ms: i64,
        now: DateTime<Utc>,
    ) -> Result<(), VerificationError> {
        let issued = DateTime::<Utc>::from_timestamp_millis(timestamp_ms).ok_or_else(|| {
            VerificationError::BadAttestationStatement(format!(
                "timestampMs {timestamp_ms} is out of range"
            ))
        })?;
        if issued > now + self.forward_threshold || issued < now - self.backward_threshold {
            return Err(VerificationError::BadAttestationStatement(format!(
                "response timestamp {issued} is outside the accepted window around {now}"
            )));
        }
        Ok(())
    }
}

impl AttestationStatementVerifier for AndroidSafetyNetAttestationStatementVerifier {
    fn format(&self) -> &'static str {
        "android-safetynet"
    }

    fn verify(
        &self,
        registration: &RegistrationObject<'_>,
    ) -> Result<VerifiedAttestation, VerificationError> {
        let statement = &registration.attestation_object().att_stmt;
        match statement.text("ver") {
            Some(ver) if !ver.is_empty() => {}
            _ => return Err(missing("ver")),
        }
        let response = statement.bytes("response").ok_or_else(|| missing("response"))?;
        let response = std::str::from_utf8(response)
            .map_err(|e| {
                VerificationError::BadAttestationStatement(format!("response is not UTF-8: {e}"))
            })?;
        let jws: JwsObject<SafetyNetResponse> =
            JwsObject::parse(registration.converter.json(), response).map_err(conversion)?;

        let chain = jws.certificates().map_err(conversion)?;
        let leaf = chain.first().ok_or_else(|| missing("x5c in response header"))?;
        with_parsed(leaf, |parsed| {
            let issued_to_attest = parsed
                .subject()
                .iter_common_name()
                .any(|cn| matches!(cn.as_str(), Ok(ATTEST_HOSTNAME)));
            if issued_to_attest {
                Ok(())
            } else {
                Err(VerificationError::Certificate(format!(
                    "response certificate is not issued to {ATTEST_HOSTNAME}"
                )))
            }
        })?;
        let key = leaf.public_key()?;
        if !matches!(jws.verify_signature(&key), Ok(true)) {
            return Err(VerificationError::BadSignature);
        }

        let payload = jws.payload();
        let expected_nonce = STANDARD.encode(openssl::sha::sha256(&registration.signed_data()));
        if payload.nonce != expected_nonce {
            return Err(VerificationError::BadAttestationStatement("nonce mismatch".into()));
        }
        if !payload.cts_profile_match {
            return Err(VerificationError::BadAttestationStatement(
                "ctsProfileMatch is false".into(),
            ));
        }
        self.check_timestamp(payload.timestamp_ms, registration.timestamp)?;

        debug!(basic_integrity = payload.basic_integrity, "android-safetynet attestation verified");
        Ok(VerifiedAttestation::new(self.format(), AttestationType::Basic, chain))
    }
}
