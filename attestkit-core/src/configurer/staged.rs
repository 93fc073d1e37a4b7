use super::{
    AttestationStatementVerifiersStage, CertPathTrustworthinessStage,
    CustomRegistrationVerifiersStage, ObjectConverterStage, RegistrationManagerBuild,
    SelfAttestationTrustworthinessStage,
};
use crate::converter::ObjectConverter;
use crate::error::ConfigurerError;
use crate::manager::RegistrationManager;
use crate::verifier::{
    AttestationStatementVerifier, CertPathTrustworthinessVerifier, CustomRegistrationVerifier,
    SelfAttestationTrustworthinessVerifier,
};

/// Configurer with one type per stage. Every stage owns the values supplied
/// so far and hands them to the next one, so `build` cannot fail.
#[derive(Debug, Clone, Copy, Default)]
pub struct StagedRegistrationManagerConfigurer;

impl StagedRegistrationManagerConfigurer {
    pub fn configure() -> ObjectConverterConfigurer {
        ObjectConverterConfigurer { _private: () }
    }
}

#[derive(Debug)]
pub struct ObjectConverterConfigurer {
    _private: (),
}

impl ObjectConverterStage for ObjectConverterConfigurer {
    type Next = AttestationStatementVerifiersConfigurer;

    fn with_object_converter<S>(self, supplier: S) -> Self::Next
    where
        S: FnOnce() -> ObjectConverter,
    {
        AttestationStatementVerifiersConfigurer {
            object_converter: supplier(),
        }
    }
}

#[derive(Debug)]
pub struct AttestationStatementVerifiersConfigurer {
    object_converter: ObjectConverter,
}

impl AttestationStatementVerifiersStage for AttestationStatementVerifiersConfigurer {
    type Next = CertPathTrustworthinessVerifierConfigurer;

    fn with_attestation_statement_verifiers(
        self,
        verifiers: Vec<Box<dyn AttestationStatementVerifier>>,
    ) -> Self::Next {
        CertPathTrustworthinessVerifierConfigurer {
            object_converter: self.object_converter,
            attestation_statement_verifiers: verifiers,
        }
    }
}

pub struct CertPathTrustworthinessVerifierConfigurer {
    object_converter: ObjectConverter,
    attestation_statement_verifiers: Vec<Box<dyn AttestationStatementVerifier>>,
}

impl CertPathTrustworthinessStage for CertPathTrustworthinessVerifierConfigurer {
    type Next = SelfAttestationTrustworthinessVerifierConfigurer;

    fn with_cert_path_trustworthiness_verifier<F, V>(self, factory: F) -> Self::Next
    where
        F: FnOnce(&ObjectConverter) -> V,
        V: CertPathTrustworthinessVerifier + 'static,
    {
        let cert_path = factory(&self.object_converter);
        SelfAttestationTrustworthinessVerifierConfigurer {
            object_converter: self.object_converter,
            attestation_statement_verifiers: self.attestation_statement_verifiers,
            cert_path_trustworthiness_verifier: Box::new(cert_path),
        }
    }
}

pub struct SelfAttestationTrustworthinessVerifierConfigurer {
    object_converter: ObjectConverter,
    attestation_statement_verifiers: Vec<Box<dyn AttestationStatementVerifier>>,
    cert_path_trustworthiness_verifier: Box<dyn CertPathTrustworthinessVerifier>,
}

impl SelfAttestationTrustworthinessStage for SelfAttestationTrustworthinessVerifierConfigurer {
    type Next = CustomRegistrationVerifiersConfigurer;

    fn with_self_attestation_trustworthiness_verifier<F, V>(self, factory: F) -> Self::Next
    where
        F: FnOnce(&ObjectConverter) -> V,
        V: SelfAttestationTrustworthinessVerifier + 'static,
    {
        let self_attestation = factory(&self.object_converter);
        CustomRegistrationVerifiersConfigurer {
            object_converter: self.object_converter,
            attestation_statement_verifiers: self.attestation_statement_verifiers,
            cert_path_trustworthiness_verifier: self.cert_path_trustworthiness_verifier,
            self_attestation_trustworthiness_verifier: Box::new(self_attestation),
        }
    }
}

pub struct CustomRegistrationVerifiersConfigurer {
    object_converter: ObjectConverter,
    attestation_statement_verifiers: Vec<Box<dyn AttestationStatementVerifier>>,
    cert_path_trustworthiness_verifier: Box<dyn CertPathTrustworthinessVerifier>,
    self_attestation_trustworthiness_verifier: Box<dyn SelfAttestationTrustworthinessVerifier>,
}

impl CustomRegistrationVerifiersStage for CustomRegistrationVerifiersConfigurer {
    type Next = RegistrationManagerBuilder;

    fn with_custom_registration_verifiers<F>(self, factory: F) -> Self::Next
    where
        F: FnOnce(&ObjectConverter) -> Vec<Box<dyn CustomRegistrationVerifier>>,
    {
        let custom = factory(&self.object_converter);
        RegistrationManagerBuilder {
            object_converter: self.object_converter,
            attestation_statement_verifiers: self.attestation_statement_verifiers,
            cert_path_trustworthiness_verifier: self.cert_path_trustworthiness_verifier,
            self_attestation_trustworthiness_verifier: self
                .self_attestation_trustworthiness_verifier,
            custom_registration_verifiers: custom,
        }
    }
}

pub struct RegistrationManagerBuilder {
    object_converter: ObjectConverter,
    attestation_statement_verifiers: Vec<Box<dyn AttestationStatementVerifier>>,
    cert_path_trustworthiness_verifier: Box<dyn CertPathTrustworthinessVerifier>,
    self_attestation_trustworthiness_verifier: Box<dyn SelfAttestationTrustworthinessVerifier>,
    custom_registration_verifiers: Vec<Box<dyn CustomRegistrationVerifier>>,
}

impl RegistrationManagerBuild for RegistrationManagerBuilder {
    fn build(self) -> Result<RegistrationManager, ConfigurerError> {
        Ok(RegistrationManager::new(
            self.attestation_statement_verifiers,
            self.cert_path_trustworthiness_verifier,
            self.self_attestation_trustworthiness_verifier,
            self.custom_registration_verifiers,
            self.object_converter,
        ))
    }
}
