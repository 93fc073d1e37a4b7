//! attestkit core - WebAuthn registration verification and FIDO MDS3 trust anchors
//!
//! This crate verifies WebAuthn registration ceremonies and supplies the
//! trust anchors the attestation certificate paths are checked against.
//!
//! # Features
//!
//! - Attestation statement verifiers for packed, fido-u2f, android-key,
//!   android-safetynet, tpm, apple and none
//! - Step-builder configurers that assemble a [`RegistrationManager`]
//! - MDS3 BLOB parsing, verification and trust anchor lookup
//! - MDS3 download with manual redirect handling (`network` feature)
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use attestkit_core::configurer::prelude::*;
//! use attestkit_core::configurer::StagedRegistrationManagerConfigurer;
//! use attestkit_core::metadata::{MetadataLoader, MetadataLoaderConfig};
//! use attestkit_core::verifier::DefaultCertPathTrustworthinessVerifier;
//! use attestkit_core::ObjectConverter;
//!
//! # async fn example() -> attestkit_core::Result<()> {
//! let loader = MetadataLoader::new(MetadataLoaderConfig::from_env(), ObjectConverter::new())?;
//! let repository = Arc::new(loader.load_trust_anchor_repository().await?);
//!
//! let manager = StagedRegistrationManagerConfigurer::configure()
//!     .with_cert_path_trustworthiness_verifier(|_| {
//!         DefaultCertPathTrustworthinessVerifier::new(repository)
//!     })
//!     .build()?;
//! # let _ = manager;
//! # Ok(())
//! # }
//! ```

pub mod anchor;
pub mod configurer;
pub mod converter;
pub mod data;
mod der;
pub mod error;
pub mod jws;
pub mod manager;
pub mod metadata;
pub mod verifier;

// Re-export main types for convenience
pub use anchor::{CertificateTrustAnchorRepository, TrustAnchor, TrustAnchorRepository};
pub use converter::{CborConverter, JsonConverter, ObjectConverter};
pub use data::{
    Aaguid, RegistrationData, RegistrationParameters, RegistrationRequest, ServerProperty,
    VerifiedRegistration,
};
pub use error::{
    ConfigurerError, DataConversionError, Error, MetadataError, Result, VerificationError,
};
pub use manager::RegistrationManager;
pub use verifier::{AttestationType, VerifiedAttestation};
