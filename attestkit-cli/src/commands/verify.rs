//! Verify command implementation.

use std::sync::Arc;

use anyhow::{Context, Result};
use attestkit_core::configurer::prelude::*;
use attestkit_core::configurer::StagedRegistrationManagerConfigurer;
use attestkit_core::verifier::{
    CertPathTrustworthinessVerifier, DefaultCertPathTrustworthinessVerifier,
    DefaultSelfAttestationTrustworthinessVerifier, NullCertPathTrustworthinessVerifier,
};
use attestkit_core::{
    Aaguid, RegistrationManager, RegistrationParameters, RegistrationRequest, ServerProperty,
    TrustAnchor, TrustAnchorRepository, VerifiedRegistration,
};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use colored::Colorize;
use serde_json::json;
use tracing::{debug, info, warn};
use webauthn_rs_proto::RegisterPublicKeyCredential;

use crate::utils::{decode_challenge, load_anchor_files, read_file};
use crate::VerifyArgs;

/// Consults every repository and returns all anchors found.
struct CombinedTrustAnchors(Vec<Arc<dyn TrustAnchorRepository>>);

impl TrustAnchorRepository for CombinedTrustAnchors {
    fn find(&self, aaguid: &Aaguid) -> Vec<TrustAnchor> {
        self.0.iter().flat_map(|r| r.find(aaguid)).collect()
    }

    fn find_by_attestation_certificate_key_identifier(
        &self,
        key_identifier: &[u8],
    ) -> Vec<TrustAnchor> {
        self.0
            .iter()
            .flat_map(|r| r.find_by_attestation_certificate_key_identifier(key_identifier))
            .collect()
    }
}

/// Execute the verify command.
pub async fn execute(args: VerifyArgs, quiet: bool) -> Result<()> {
    let challenge = decode_challenge(&args.challenge)?;
    let bytes = read_file(&args.credential)?;
    let credential: RegisterPublicKeyCredential =
        serde_json::from_slice(&bytes).context("Failed to parse PublicKeyCredential JSON")?;
    let request = registration_request(&credential)?;

    let mut origins = args.origin.iter();
    let first = origins.next().map(String::as_str).unwrap_or_default();
    let server_property = origins.fold(
        ServerProperty::new(first, args.rp_id.as_str(), challenge),
        |property, origin| property.with_origin(origin.as_str()),
    );
    let parameters = RegistrationParameters::new(server_property)
        .user_verification_required(args.require_user_verification);

    let self_attestation = if args.no_self_attestation {
        DefaultSelfAttestationTrustworthinessVerifier::prohibited()
    } else {
        DefaultSelfAttestationTrustworthinessVerifier::default()
    };

    let mut repositories: Vec<Arc<dyn TrustAnchorRepository>> = Vec::new();
    if !args.anchor.is_empty() {
        let anchors = load_anchor_files(&args.anchor)?;
        debug!(anchors = anchors.anchors().len(), "Loaded trust anchors from files");
        repositories.push(Arc::new(anchors));
    }
    if args.mds {
        let repository = args
            .metadata
            .repository()
            .await
            .context("Failed to load metadata BLOB")?;
        repositories.push(Arc::new(repository));
    }

    let manager = if repositories.is_empty() {
        warn!("No trust anchors given, attestation certificate paths will not be checked");
        build_manager(NullCertPathTrustworthinessVerifier, self_attestation)?
    } else {
        let repository: Arc<dyn TrustAnchorRepository> =
            Arc::new(CombinedTrustAnchors(repositories));
        build_manager(DefaultCertPathTrustworthinessVerifier::new(repository), self_attestation)?
    };

    let verified = manager
        .verify_request(&request, &parameters)
        .context("Registration rejected")?;
    info!(
        format = %verified.attestation.format,
        attestation_type = %verified.attestation.attestation_type,
        "Registration accepted"
    );

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary(&verified))?);
    } else if !quiet {
        print_summary(&verified);
    }
    Ok(())
}

fn registration_request(credential: &RegisterPublicKeyCredential) -> Result<RegistrationRequest> {
    let mut request = RegistrationRequest::new(
        credential.response.attestation_object.to_vec(),
        credential.response.client_data_json.to_vec(),
    );
    request.transports = credential
        .response
        .transports
        .iter()
        .flatten()
        .filter_map(|t| serde_json::to_value(t).ok())
        .filter_map(|v| v.as_str().map(str::to_string))
        .collect();
    request.client_extensions_json = Some(serde_json::to_string(&credential.extensions)?);
    Ok(request)
}

fn build_manager<V>(
    cert_path: V,
    self_attestation: DefaultSelfAttestationTrustworthinessVerifier,
) -> Result<RegistrationManager>
where
    V: CertPathTrustworthinessVerifier + 'static,
{
    let manager = StagedRegistrationManagerConfigurer::configure()
        .with_cert_path_trustworthiness_verifier(move |_| cert_path)
        .with_self_attestation_trustworthiness_verifier(move |_| self_attestation)
        .with_no_custom_registration_verifiers()
        .build()?;
    Ok(manager)
}

fn trust_path_subjects(verified: &VerifiedRegistration) -> Vec<String> {
    verified
        .attestation
        .trust_path
        .iter()
        .map(|cert| TrustAnchor::new(cert.clone()).subject())
        .collect()
}

fn summary(verified: &VerifiedRegistration) -> serde_json::Value {
    let auth_data = &verified.data.attestation_object.authenticator_data;
    let aaguid = auth_data.attested_credential_data.as_ref().map(|acd| acd.aaguid);
    json!({
        "format": verified.attestation.format,
        "attestationType": verified.attestation.attestation_type.to_string(),
        "aaguid": aaguid,
        "credentialId": verified.credential_id().map(|id| URL_SAFE_NO_PAD.encode(id)),
        "signCount": auth_data.sign_count,
        "userVerified": auth_data.flags.user_verified(),
        "backupEligible": auth_data.flags.backup_eligible(),
        "backupState": auth_data.flags.backup_state(),
        "transports": verified.data.transports,
        "trustPath": trust_path_subjects(verified),
    })
}

fn print_summary(verified: &VerifiedRegistration) {
    let auth_data = &verified.data.attestation_object.authenticator_data;
    println!();
    println!("{}", "╔════════════════════════════════════════╗".green());
    println!("{}", "║         REGISTRATION VERIFIED          ║".green().bold());
    println!("{}", "╚════════════════════════════════════════╝".green());
    println!();
    println!("   {} {}", "Format:".dimmed(), verified.attestation.format);
    println!("   {} {}", "Attestation:".dimmed(), verified.attestation.attestation_type);
    if let Some(acd) = &auth_data.attested_credential_data {
        println!("   {} {}", "AAGUID:".dimmed(), acd.aaguid);
        println!("   {} {}", "Credential:".dimmed(), URL_SAFE_NO_PAD.encode(&acd.credential_id));
    }
    println!(
        "   {} UP={} UV={} BE={} BS={}",
        "Flags:".dimmed(),
        auth_data.flags.user_present(),
        auth_data.flags.user_verified(),
        auth_data.flags.backup_eligible(),
        auth_data.flags.backup_state()
    );
    for (index, subject) in trust_path_subjects(verified).iter().enumerate() {
        println!("   {} {}", format!("[{index}]").dimmed(), subject);
    }
}
