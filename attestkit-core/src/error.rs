use thiserror::Error;

/// Failure to decode a wire value (CBOR, JSON, base64, DER, binary layouts).
#[derive(Error, Debug)]
pub enum DataConversionError {
    #[error("Invalid CBOR: {0}")]
    Cbor(String),

    #[error("Invalid JSON: {0}")]
    Json(String),

    #[error("Invalid base64: {0}")]
    Base64(String),

    #[error("Invalid AAGUID: {0}")]
    Aaguid(String),

    #[error("Invalid authenticator data: {0}")]
    AuthenticatorData(String),

    #[error("Invalid COSE key: {0}")]
    CoseKey(String),

    #[error("Invalid attestation object: {0}")]
    AttestationObject(String),

    #[error("Invalid JWS: {0}")]
    Jws(String),

    #[error("Invalid DER: {0}")]
    Der(String),

    #[error("Invalid certificate: {0}")]
    Certificate(String),
}

/// A registration ceremony that was parsed successfully but must be rejected.
#[derive(Error, Debug)]
pub enum VerificationError {
    #[error("Client data type mismatch: expected {expected}, got {actual}")]
    InconsistentClientDataType {
        expected: &'static str,
        actual: String,
    },

    #[error("Challenge mismatch")]
    BadChallenge,

    #[error("Origin not allowed: {0}")]
    BadOrigin(String),

    #[error("RP ID hash mismatch")]
    BadRpId,

    #[error("User presence flag is not set")]
    UserNotPresent,

    #[error("User verification flag is not set")]
    UserNotVerified,

    #[error("Credential algorithm {0} is not allowed")]
    NotAllowedAlgorithm(i64),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Unsupported attestation format: {0}")]
    UnsupportedAttestationFormat(String),

    #[error("Bad attestation statement: {0}")]
    BadAttestationStatement(String),

    #[error("Bad signature")]
    BadSignature,

    #[error("AAGUID does not match the attestation certificate")]
    BadAaguid,

    #[error("Public key mismatch: {0}")]
    PublicKeyMismatch(String),

    #[error("Certificate error: {0}")]
    Certificate(String),

    #[error("No trust anchor found for {0}")]
    TrustAnchorNotFound(String),

    #[error("Self attestation is prohibited")]
    SelfAttestationProhibited,

    #[error("Custom verification failed: {0}")]
    Custom(String),

    #[error("Data conversion error: {0}")]
    DataConversion(#[from] DataConversionError),

    #[error("Cryptographic error: {0}")]
    Crypto(#[from] openssl::error::ErrorStack),
}

/// A configurer was asked to build without one of its five values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurerError {
    #[error("{0} was not supplied")]
    MissingArgument(&'static str),
}

/// Errors from metadata BLOB handling and the MDS loader.
#[derive(Error, Debug)]
pub enum MetadataError {
    #[cfg(feature = "network")]
    #[error("Failed to read from URL: {url}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to load data from {url} : Status Code: {status} . Response: {body}")]
    UnexpectedStatus {
        url: String,
        status: u16,
        body: String,
    },

    #[error("Cannot find the location HTTP header to redirect from URL: {url}")]
    MissingLocation { url: String },

    #[error("Redirect loop detected: {visited:?}")]
    RedirectLoop { visited: Vec<String> },

    #[error("Too many redirects (limit {limit}) while loading {url}")]
    TooManyRedirects { url: String, limit: usize },

    #[error("Invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Failed to load endpoints for {endpoint}: {reason}")]
    Endpoints { endpoint: String, reason: String },

    #[error("HTTP client error: {0}")]
    Client(String),

    #[error("Metadata certificate error: {0}")]
    Certificate(String),

    #[error("Metadata BLOB signature is invalid")]
    SignatureInvalid,

    #[error("Data conversion error: {0}")]
    DataConversion(#[from] DataConversionError),

    #[error("Cryptographic error: {0}")]
    Crypto(#[from] openssl::error::ErrorStack),
}

/// Umbrella error for callers that drive several stages at once.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    DataConversion(#[from] DataConversionError),

    #[error(transparent)]
    Verification(#[from] VerificationError),

    #[error(transparent)]
    Configurer(#[from] ConfigurerError),

    #[error(transparent)]
    Metadata(#[from] MetadataError),
}

pub type Result<T> = std::result::Result<T, Error>;
