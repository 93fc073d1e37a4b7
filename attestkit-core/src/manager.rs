use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::converter::ObjectConverter;
use crate::data::{
    AttestationObject, CollectedClientData, RegistrationData, RegistrationParameters,
    RegistrationRequest, VerifiedRegistration,
};
use crate::error::{DataConversionError, VerificationError};
use crate::verifier::{
    default_attestation_statement_verifiers, AttestationStatementVerifier, AttestationType,
    CertPathTrustworthinessVerifier, CustomRegistrationVerifier,
    DefaultSelfAttestationTrustworthinessVerifier, NullCertPathTrustworthinessVerifier,
    RegistrationObject, SelfAttestationTrustworthinessVerifier,
};

/// Parses and verifies WebAuthn registration ceremonies.
///
/// Usually assembled by one of the [configurers](crate::configurer); the
/// constructor takes its parts in the order the configurer stages supply them.
pub struct RegistrationManager {
    attestation_statement_verifiers: Vec<Box<dyn AttestationStatementVerifier>>,
    cert_path_trustworthiness_verifier: Box<dyn CertPathTrustworthinessVerifier>,
    self_attestation_trustworthiness_verifier: Box<dyn SelfAttestationTrustworthinessVerifier>,
    custom_registration_verifiers: Vec<Box<dyn CustomRegistrationVerifier>>,
    object_converter: ObjectConverter,
}

impl std::fmt::Debug for RegistrationManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let formats: Vec<_> = self
            .attestation_statement_verifiers
            .iter()
            .map(|v| v.format())
            .collect();
        f.debug_struct("RegistrationManager")
            .field("attestation_formats", &formats)
            .field("custom_registration_verifiers", &self.custom_registration_verifiers.len())
            .field("object_converter", &self.object_converter)
            .finish_non_exhaustive()
    }
}

impl RegistrationManager {
    pub fn new(
        attestation_statement_verifiers: Vec<Box<dyn AttestationStatementVerifier>>,
        cert_path_trustworthiness_verifier: Box<dyn CertPathTrustworthinessVerifier>,
        self_attestation_trustworthiness_verifier: Box<dyn SelfAttestationTrustworthinessVerifier>,
        custom_registration_verifiers: Vec<Box<dyn CustomRegistrationVerifier>>,
        object_converter: ObjectConverter,
    ) -> Self {
        Self {
            attestation_statement_verifiers,
            cert_path_trustworthiness_verifier,
            self_attestation_trustworthiness_verifier,
            custom_registration_verifiers,
            object_converter,
        }
    }

    /// Default attestation verifiers, but every certificate path is trusted.
    pub fn non_strict() -> Self {
        Self::new(
            default_attestation_statement_verifiers(),
            Box::new(NullCertPathTrustworthinessVerifier),
            Box::new(DefaultSelfAttestationTrustworthinessVerifier::default()),
            Vec::new(),
            ObjectConverter::new(),
        )
    }

    pub fn object_converter(&self) -> &ObjectConverter {
        &self.object_converter
    }

    pub fn parse(
        &self,
        request: &RegistrationRequest,
    ) -> Result<RegistrationData, DataConversionError> {
        let attestation_object =
            AttestationObject::parse(&self.object_converter, &request.attestation_object)?;
        let collected_client_data =
            CollectedClientData::parse(self.object_converter.json(), &request.client_data_json)?;
        let client_extension_outputs = request
            .client_extensions_json
            .as_deref()
            .map(|json| self.object_converter.json().read_str(json))
            .transpose()?;

        Ok(RegistrationData {
            attestation_object,
            attestation_object_bytes: request.attestation_object.clone(),
            collected_client_data,
            collected_client_data_bytes: request.client_data_json.clone(),
            transports: request.transports.clone(),
            client_extension_outputs,
        })
    }

    pub fn verify(
        &self,
        data: RegistrationData,
        parameters: &RegistrationParameters,
    ) -> Result<VerifiedRegistration, VerificationError> {
        self.verify_at(data, parameters, Utc::now())
    }

    /// [`verify`](Self::verify) with an explicit verification time.
    pub fn verify_at(
        &self,
        data: RegistrationData,
        parameters: &RegistrationParameters,
        timestamp: DateTime<Utc>,
    ) -> Result<VerifiedRegistration, VerificationError> {
        Self::verify_client_data(&data.collected_client_data, parameters)?;
        Self::verify_authenticator_data(&data, parameters)?;

        let registration =
            RegistrationObject::new(&data, parameters, &self.object_converter, timestamp);
        let fmt = data.attestation_object.fmt.as_str();
        let verifier = self
            .attestation_statement_verifiers
            .iter()
            .find(|v| v.supports(fmt))
            .ok_or_else(|| VerificationError::UnsupportedAttestationFormat(fmt.to_string()))?;
        let attestation = verifier.verify(&registration)?;
        debug!(
            format = fmt,
            attestation_type = %attestation.attestation_type,
            "attestation statement verified"
        );

        match attestation.attestation_type {
            AttestationType::None => {}
            AttestationType::SelfAttestation => {
                self.self_attestation_trustworthiness_verifier.verify(&attestation)?
            }
            AttestationType::Basic | AttestationType::AttCa | AttestationType::AnonCa => self
                .cert_path_trustworthiness_verifier
                .verify(&registration.aaguid(), &attestation, timestamp)?,
        }

        for custom in &self.custom_registration_verifiers {
            custom.verify(&registration)?;
        }

        info!(
            format = fmt,
            aaguid = %registration.aaguid(),
            "registration verified"
        );
        Ok(VerifiedRegistration { data, attestation })
    }

    /// Parse then verify.
    pub fn verify_request(
        &self,
        request: &RegistrationRequest,
        parameters: &RegistrationParameters,
    ) -> Result<VerifiedRegistration, VerificationError> {
        let data = self.parse(request)?;
        self.verify(data, parameters)
    }

    fn verify_client_data(
        client_data: &CollectedClientData,
        parameters: &RegistrationParameters,
    ) -> Result<(), VerificationError> {
        if client_data.type_ != CollectedClientData::TYPE_CREATE {
            return Err(VerificationError::InconsistentClientDataType {
                expected: CollectedClientData::TYPE_CREATE,
                actual: client_data.type_.clone(),
            });
        }
        let server = &parameters.server_property;
        let challenge = client_data.challenge_bytes().map_err(|_| VerificationError::BadChallenge)?;
        if challenge != server.challenge {
            return Err(VerificationError::BadChallenge);
        }
        if !server.origins.iter().any(|o| o == &client_data.origin) {
            return Err(VerificationError::BadOrigin(client_data.origin.clone()));
        }
        Ok(())
    }

    fn verify_authenticator_data(
        data: &RegistrationData,
        parameters: &RegistrationParameters,
    ) -> Result<(), VerificationError> {
        let auth_data = &data.attestation_object.authenticator_data;
        let rp_id_hash = openssl::sha::sha256(parameters.server_property.rp_id.as_bytes());
        if auth_data.rp_id_hash != rp_id_hash {
            return Err(VerificationError::BadRpId);
        }
        if parameters.user_presence_required && !auth_data.flags.user_present() {
            return Err(VerificationError::UserNotPresent);
        }
        if parameters.user_verification_required && !auth_data.flags.user_verified() {
            return Err(VerificationError::UserNotVerified);
        }
        if auth_data.flags.backup_state() && !auth_data.flags.backup_eligible() {
            return Err(VerificationError::ConstraintViolation(
                "backup state is set but the credential is not backup eligible".into(),
            ));
        }
        let credential = auth_data.attested_credential_data.as_ref().ok_or_else(|| {
            VerificationError::ConstraintViolation("attested credential data is missing".into())
        })?;
        let algorithm = credential.credential_public_key.algorithm;
        let allowed = &parameters.pub_key_cred_params;
        if !allowed.is_empty() && !allowed.contains(&algorithm) {
            return Err(VerificationError::NotAllowedAlgorithm(algorithm.value()));
        }
        Ok(())
    }
}
