//! Step builders ("configurers") that assemble a [`RegistrationManager`].
//!
//! A configurer walks five stages in a fixed order and then builds:
//!
//! 1. object converter
//! 2. attestation statement verifiers
//! 3. cert-path trustworthiness verifier
//! 4. self-attestation trustworthiness verifier
//! 5. custom registration verifiers
//!
//! Each stage is a trait whose `Next` type is the following stage. Stages
//! carry shortcut methods that supply defaults for the stages they skip, so
//! the shortest useful chain is:
//!
//! ```no_run
//! use attestkit_core::configurer::prelude::*;
//! use attestkit_core::configurer::StagedRegistrationManagerConfigurer;
//! use attestkit_core::verifier::NullCertPathTrustworthinessVerifier;
//!
//! let manager = StagedRegistrationManagerConfigurer::configure()
//!     .with_cert_path_trustworthiness_verifier(|_| NullCertPathTrustworthinessVerifier)
//!     .build()
//!     .unwrap();
//! ```
//!
//! Factories receive the [`ObjectConverter`] chosen in stage 1.
//!
//! Two implementations exist. [`StagedRegistrationManagerConfigurer`] uses one
//! type per stage, so shortcuts always backfill their defaults.
//! [`SimpleRegistrationManagerConfigurer`] is a single flat type implementing
//! every stage; its own methods shadow the shortcut defaults, so skipped stages
//! stay empty and `build` reports the first missing value.

mod simple;
mod staged;

pub use simple::SimpleRegistrationManagerConfigurer;
pub use staged::{
    AttestationStatementVerifiersConfigurer, CertPathTrustworthinessVerifierConfigurer,
    CustomRegistrationVerifiersConfigurer, ObjectConverterConfigurer, RegistrationManagerBuilder,
    SelfAttestationTrustworthinessVerifierConfigurer, StagedRegistrationManagerConfigurer,
};

use crate::converter::ObjectConverter;
use crate::error::ConfigurerError;
use crate::manager::RegistrationManager;
use crate::verifier::{
    default_attestation_statement_verifiers, AttestationStatementVerifier,
    CertPathTrustworthinessVerifier, CustomRegistrationVerifier,
    DefaultSelfAttestationTrustworthinessVerifier, SelfAttestationTrustworthinessVerifier,
};

/// Brings every stage trait into scope.
pub mod prelude {
    pub use super::{
        AttestationStatementVerifiersStage, CertPathTrustworthinessStage,
        CustomRegistrationVerifiersStage, ObjectConverterStage, RegistrationManagerBuild,
        SelfAttestationTrustworthinessStage,
    };
}

/// Stage after the cert-path stage, reached through the shortcuts.
pub type AfterCertPath<S> = <S as CertPathTrustworthinessStage>::Next;

pub trait ObjectConverterStage: Sized {
    type Next: AttestationStatementVerifiersStage;

    fn with_object_converter<S>(self, supplier: S) -> Self::Next
    where
        S: FnOnce() -> ObjectConverter;

    fn with_default_object_converter(self) -> Self::Next {
        self.with_object_converter(ObjectConverter::new)
    }

    /// Default converter, default attestation verifiers, then `factory`.
    fn with_cert_path_trustworthiness_verifier<F, V>(
        self,
        factory: F,
    ) -> AfterCertPath<<Self::Next as AttestationStatementVerifiersStage>::Next>
    where
        F: FnOnce(&ObjectConverter) -> V,
        V: CertPathTrustworthinessVerifier + 'static,
    {
        self.with_default_object_converter()
            .with_cert_path_trustworthiness_verifier(factory)
    }
}

pub trait AttestationStatementVerifiersStage: Sized {
    type Next: CertPathTrustworthinessStage;

    fn with_attestation_statement_verifiers(
        self,
        verifiers: Vec<Box<dyn AttestationStatementVerifier>>,
    ) -> Self::Next;

    /// packed, fido-u2f, android-key, android-safetynet, tpm, apple, none.
    fn with_default_attestation_statement_verifiers(self) -> Self::Next {
        self.with_attestation_statement_verifiers(default_attestation_statement_verifiers())
    }

    /// Default attestation verifiers, then `factory`.
    fn with_cert_path_trustworthiness_verifier<F, V>(self, factory: F) -> AfterCertPath<Self::Next>
    where
        F: FnOnce(&ObjectConverter) -> V,
        V: CertPathTrustworthinessVerifier + 'static,
    {
        self.with_default_attestation_statement_verifiers()
            .with_cert_path_trustworthiness_verifier(factory)
    }
}

pub trait CertPathTrustworthinessStage: Sized {
    type Next: SelfAttestationTrustworthinessStage;

    fn with_cert_path_trustworthiness_verifier<F, V>(self, factory: F) -> Self::Next
    where
        F: FnOnce(&ObjectConverter) -> V,
        V: CertPathTrustworthinessVerifier + 'static;
}

pub trait SelfAttestationTrustworthinessStage: Sized {
    type Next: CustomRegistrationVerifiersStage;

    fn with_self_attestation_trustworthiness_verifier<F, V>(self, factory: F) -> Self::Next
    where
        F: FnOnce(&ObjectConverter) -> V,
        V: SelfAttestationTrustworthinessVerifier + 'static;

    fn with_default_self_attestation_trustworthiness_verifier(self) -> Self::Next {
        self.with_self_attestation_trustworthiness_verifier(|_| {
            DefaultSelfAttestationTrustworthinessVerifier::default()
        })
    }

    /// Default self-attestation verifier, no custom verifiers, then build.
    fn build(self) -> Result<RegistrationManager, ConfigurerError> {
        self.with_default_self_attestation_trustworthiness_verifier()
            .with_no_custom_registration_verifiers()
            .build()
    }
}

pub trait CustomRegistrationVerifiersStage: Sized {
    type Next: RegistrationManagerBuild;

    fn with_custom_registration_verifiers<F>(self, factory: F) -> Self::Next
    where
        F: FnOnce(&ObjectConverter) -> Vec<Box<dyn CustomRegistrationVerifier>>;

    fn with_no_custom_registration_verifiers(self) -> Self::Next {
        self.with_custom_registration_verifiers(|_| Vec::new())
    }
}

pub trait RegistrationManagerBuild {
    fn build(self) -> Result<RegistrationManager, ConfigurerError>;
}
