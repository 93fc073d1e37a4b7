//! Exit codes following sysexits.h conventions.
//!
//! Scripts can tell a rejected registration apart from an unreachable
//! metadata service or a missing input file.

use attestkit_core::{ConfigurerError, DataConversionError, MetadataError, VerificationError};

/// General error (catch-all).
pub const GENERAL_ERROR: i32 = 1;

/// Command line usage error (invalid arguments).
/// Maps to EX_USAGE from sysexits.h.
pub const USAGE_ERROR: i32 = 64;

/// Registration rejected or input data malformed.
/// Maps to EX_DATAERR from sysexits.h.
pub const VERIFICATION_FAILED: i32 = 65;

/// Cannot open input file.
/// Maps to EX_NOINPUT from sysexits.h.
pub const INPUT_ERROR: i32 = 66;

/// Metadata service unreachable or returned garbage.
/// Maps to EX_UNAVAILABLE from sysexits.h.
pub const NETWORK_ERROR: i32 = 69;

/// Marks an argument that parsed but makes no sense.
#[derive(Debug)]
pub struct UsageError(pub String);

impl std::fmt::Display for UsageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for UsageError {}

/// Represents an exit code with optional error context.
pub struct ExitCode {
    pub code: i32,
    pub message: Option<String>,
}

impl ExitCode {
    pub fn error(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: Some(message.into()),
        }
    }

    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        Self::error(classify(err), format!("{err:#}"))
    }
}

/// Classify by the first error in the chain we recognise.
fn classify(err: &anyhow::Error) -> i32 {
    for cause in err.chain() {
        if cause.is::<UsageError>() || cause.is::<ConfigurerError>() {
            return USAGE_ERROR;
        }
        if cause.is::<VerificationError>()
            || cause.is::<DataConversionError>()
            || cause.is::<serde_json::Error>()
        {
            return VERIFICATION_FAILED;
        }
        if cause.is::<MetadataError>() {
            return NETWORK_ERROR;
        }
        if cause.is::<std::io::Error>() {
            return INPUT_ERROR;
        }
    }
    GENERAL_ERROR
}
