use tracing::debug;

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

/// One flat configurer implementing every stage.
///
/// Its shortcut methods record only the value they are given: stages skipped
/// through a shortcut stay empty, and `build` fails with
/// [`ConfigurerError::MissingArgument`] naming the first missing value.
#[derive(Default)]
pub struct SimpleRegistrationManagerConfigurer {
    object_converter: Option<ObjectConverter>,
    attestation_statement_verifiers: Option<Vec<Box<dyn AttestationStatementVerifier>>>,
    cert_path_trustworthiness_verifier: Option<Box<dyn CertPathTrustworthinessVerifier>>,
    self_attestation_trustworthiness_verifier:
        Option<Box<dyn SelfAttestationTrustworthinessVerifier>>,
    custom_registration_verifiers: Option<Vec<Box<dyn CustomRegistrationVerifier>>>,
    error: Option<ConfigurerError>,
}

impl SimpleRegistrationManagerConfigurer {
    pub fn configure() -> impl ObjectConverterStage {
        Self::default()
    }

    /// Run `factory` with the configured converter, or remember that there was none.
    fn apply<T>(&mut self, factory: impl FnOnce(&ObjectConverter) -> T) -> Option<T> {
        match &self.object_converter {
            Some(converter) => Some(factory(converter)),
            None => {
                debug!("factory invoked before an object converter was configured");
                self.error
                    .get_or_insert(ConfigurerError::MissingArgument("object_converter"));
                None
            }
        }
    }

    fn set_cert_path_trustworthiness_verifier<F, V>(mut self, factory: F) -> Self
    where
        F: FnOnce(&ObjectConverter) -> V,
        V: CertPathTrustworthinessVerifier + 'static,
    {
        self.cert_path_trustworthiness_verifier = self
            .apply(factory)
            .map(|v| Box::new(v) as Box<dyn CertPathTrustworthinessVerifier>);
        self
    }
}

impl ObjectConverterStage for SimpleRegistrationManagerConfigurer {
    type Next = Self;

    fn with_object_converter<S>(mut self, supplier: S) -> Self
    where
        S: FnOnce() -> ObjectConverter,
    {
        self.object_converter = Some(supplier());
        self
    }

    fn with_cert_path_trustworthiness_verifier<F, V>(self, factory: F) -> Self
    where
        F: FnOnce(&ObjectConverter) -> V,
        V: CertPathTrustworthinessVerifier + 'static,
    {
        self.set_cert_path_trustworthiness_verifier(factory)
    }
}

impl AttestationStatementVerifiersStage for SimpleRegistrationManagerConfigurer {
    type Next = Self;

    fn with_attestation_statement_verifiers(
        mut self,
        verifiers: Vec<Box<dyn AttestationStatementVerifier>>,
    ) -> Self {
        self.attestation_statement_verifiers = Some(verifiers);
        self
    }

    fn with_cert_path_trustworthiness_verifier<F, V>(self, factory: F) -> Self
    where
        F: FnOnce(&ObjectConverter) -> V,
        V: CertPathTrustworthinessVerifier + 'static,
    {
        self.set_cert_path_trustworthiness_verifier(factory)
    }
}

impl CertPathTrustworthinessStage for SimpleRegistrationManagerConfigurer {
    type Next = Self;

    fn with_cert_path_trustworthiness_verifier<F, V>(self, factory: F) -> Self
    where
        F: FnOnce(&ObjectConverter) -> V,
        V: CertPathTrustworthinessVerifier + 'static,
    {
        self.set_cert_path_trustworthiness_verifier(factory)
    }
}

impl SelfAttestationTrustworthinessStage for SimpleRegistrationManagerConfigurer {
    type Next = Self;

    fn with_self_attestation_trustworthiness_verifier<F, V>(mut self, factory: F) -> Self
    where
        F: FnOnce(&ObjectConverter) -> V,
        V: SelfAttestationTrustworthinessVerifier + 'static,
    {
        self.self_attestation_trustworthiness_verifier = self
            .apply(factory)
            .map(|v| Box::new(v) as Box<dyn SelfAttestationTrustworthinessVerifier>);
        self
    }

    fn build(self) -> Result<RegistrationManager, ConfigurerError> {
        RegistrationManagerBuild::build(self)
    }
}

impl CustomRegistrationVerifiersStage for SimpleRegistrationManagerConfigurer {
    type Next = Self;

    fn with_custom_registration_verifiers<F>(mut self, factory: F) -> Self
    where
        F: FnOnce(&ObjectConverter) -> Vec<Box<dyn CustomRegistrationVerifier>>,
    {
        self.custom_registration_verifiers = self.apply(factory);
        self
    }
}

impl RegistrationManagerBuild for SimpleRegistrationManagerConfigurer {
    fn build(self) -> Result<RegistrationManager, ConfigurerError> {
        if let Some(error) = self.error {
            return Err(error);
        }
        let missing = ConfigurerError::MissingArgument;
        Ok(RegistrationManager::new(
            self.attestation_statement_verifiers
                .ok_or(missing("attestation_statement_verifiers"))?,
            self.cert_path_trustworthiness_verifier
                .ok_or(missing("cert_path_trustworthiness_verifier"))?,
            self.self_attestation_trustworthiness_verifier
                .ok_or(missing("self_attestation_trustworthiness_verifier"))?,
            self.custom_registration_verifiers
                .ok_or(missing("custom_registration_verifiers"))?,
            self.object_converter.ok_or(missing("object_converter"))?,
        ))
    }
}
