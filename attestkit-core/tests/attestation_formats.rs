//! End-to-end ceremonies for the certificate based formats that need
//! structured fixtures: tpm, apple, android-key and android-safetynet.

mod common;

use attestkit_core::verifier::AttestationType;
use attestkit_core::{RegistrationManager, RegistrationRequest, VerificationError};
use common::{ec_key, tpm_aik, tpm_cert_info, tpm_name, tpm_pub_area, Ceremony, KeyDescription};
use serde_json::json;

fn verify(request: &RegistrationRequest) -> Result<AttestationType, VerificationError> {
    RegistrationManager::non_strict()
        .verify_request(request, &Ceremony::parameters())
        .map(|verified| verified.attestation.attestation_type)
}

fn statement_error(result: Result<AttestationType, VerificationError>, needle: &str) {
    match result {
        Err(VerificationError::BadAttestationStatement(msg)) => {
            assert!(msg.contains(needle), "{msg:?} does not mention {needle:?}")
        }
        other => panic!("expected a statement error about {needle:?}, got {other:?}"),
    }
}

// ============================================================================
// tpm
// ============================================================================

#[test]
fn test_tpm_attestation() {
    let ceremony = Ceremony::default();
    let (aik, aik_key) = tpm_aik(&[]);
    let verified = RegistrationManager::non_strict()
        .verify_request(&ceremony.tpm_valid_request(&aik, &aik_key), &Ceremony::parameters())
        .expect("tpm attestation verifies");

    assert_eq!(verified.attestation.format, "tpm");
    assert_eq!(verified.attestation.attestation_type, AttestationType::AttCa);
    assert_eq!(verified.attestation.trust_path.len(), 1);
}

#[test]
fn test_tpm_extra_data_must_hash_signed_data() {
    let ceremony = Ceremony::default();
    let (aik, aik_key) = tpm_aik(&[]);
    let pub_area = tpm_pub_area(&ceremony.credential_cose_key());
    let cert_info = tpm_cert_info(&openssl::sha::sha256(b"other data"), &tpm_name(&pub_area));

    statement_error(
        verify(&ceremony.tpm_request(&pub_area, &cert_info, &aik, &aik_key)),
        "extraData",
    );
}

#[test]
fn test_tpm_cert_info_name_must_match_pub_area() {
    let ceremony = Ceremony::default();
    let (aik, aik_key) = tpm_aik(&[]);
    let pub_area = tpm_pub_area(&ceremony.credential_cose_key());
    let other_area = tpm_pub_area(&Ceremony::default().credential_cose_key());
    let cert_info = tpm_cert_info(&ceremony.signed_data_hash(), &tpm_name(&other_area));

    statement_error(
        verify(&ceremony.tpm_request(&pub_area, &cert_info, &aik, &aik_key)),
        "name",
    );
}

#[test]
fn test_tpm_pub_area_must_describe_credential_key() {
    let ceremony = Ceremony::default();
    let (aik, aik_key) = tpm_aik(&[]);
    let other_area = tpm_pub_area(&Ceremony::default().credential_cose_key());
    let cert_info = tpm_cert_info(&ceremony.signed_data_hash(), &tpm_name(&other_area));

    assert!(matches!(
        verify(&ceremony.tpm_request(&other_area, &cert_info, &aik, &aik_key)),
        Err(VerificationError::PublicKeyMismatch(_))
    ));
}

#[test]
fn test_tpm_cert_info_signed_by_other_key() {
    let ceremony = Ceremony::default();
    let (aik, _) = tpm_aik(&[]);
    let pub_area = tpm_pub_area(&ceremony.credential_cose_key());
    let cert_info = tpm_cert_info(&ceremony.signed_data_hash(), &tpm_name(&pub_area));

    assert!(matches!(
        verify(&ceremony.tpm_request(&pub_area, &cert_info, &aik, &ec_key())),
        Err(VerificationError::BadSignature)
    ));
}

#[test]
fn test_tpm_aik_subject_must_be_empty() {
    let ceremony = Ceremony::default();
    let (aik, aik_key) = tpm_aik(&[("CN", "Named AIK")]);

    assert!(matches!(
        verify(&ceremony.tpm_valid_request(&aik, &aik_key)),
        Err(VerificationError::Certificate(msg)) if msg.contains("subject")
    ));
}

// ============================================================================
// apple
// ============================================================================

#[test]
fn test_apple_attestation() {
    let ceremony = Ceremony::default();
    let nonce = ceremony.signed_data_hash();
    let request = ceremony.apple_request(Some(&nonce), &ceremony.credential_key);

    let attestation_type = verify(&request).expect("apple attestation verifies");
    assert_eq!(attestation_type, AttestationType::AnonCa);
}

#[test]
fn test_apple_nonce_mismatch() {
    let ceremony = Ceremony::default();
    let nonce = openssl::sha::sha256(b"another ceremony");
    let request = ceremony.apple_request(Some(&nonce), &ceremony.credential_key);

    statement_error(verify(&request), "nonce mismatch");
}

#[test]
fn test_apple_nonce_extension_missing() {
    let ceremony = Ceremony::default();
    let request = ceremony.apple_request(None, &ceremony.credential_key);

    statement_error(verify(&request), "nonce extension");
}

#[test]
fn test_apple_certificate_key_must_be_credential_key() {
    let ceremony = Ceremony::default();
    let nonce = ceremony.signed_data_hash();
    let request = ceremony.apple_request(Some(&nonce), &ec_key());

    assert!(matches!(verify(&request), Err(VerificationError::PublicKeyMismatch(_))));
}

// ============================================================================
// android-key
// ============================================================================

#[test]
fn test_android_key_attestation() {
    let ceremony = Ceremony::default();
    let description = KeyDescription::new(&ceremony.client_data_hash());
    let request = ceremony.android_key_request(&description);

    let attestation_type = verify(&request).expect("android-key attestation verifies");
    assert_eq!(attestation_type, AttestationType::Basic);
}

#[test]
fn test_android_key_challenge_mismatch() {
    let ceremony = Ceremony::default();
    let request = ceremony.android_key_request(&KeyDescription::new(&[0x42; 32]));

    statement_error(verify(&request), "attestationChallenge");
}

#[test]
fn test_android_key_imported_key_is_rejected() {
    let ceremony = Ceremony::default();
    let description = KeyDescription {
        origin: Some(2),
        ..KeyDescription::new(&ceremony.client_data_hash())
    };

    statement_error(verify(&ceremony.android_key_request(&description)), "origin");
}

#[test]
fn test_android_key_purpose_must_include_sign() {
    let ceremony = Ceremony::default();
    let description = KeyDescription {
        purpose: vec![0, 1],
        ..KeyDescription::new(&ceremony.client_data_hash())
    };

    statement_error(verify(&ceremony.android_key_request(&description)), "purpose");
}

#[test]
fn test_android_key_all_applications_is_rejected() {
    let ceremony = Ceremony::default();
    let description = KeyDescription {
        all_applications: true,
        ..KeyDescription::new(&ceremony.client_data_hash())
    };

    statement_error(
        verify(&ceremony.android_key_request(&description)),
        "allApplications",
    );
}

// ============================================================================
// android-safetynet
// ============================================================================

#[test]
fn test_safetynet_attestation() {
    let ceremony = Ceremony::default();
    let request = ceremony.safetynet_request(&ceremony.safetynet_payload(), "attest.android.com");

    let attestation_type = verify(&request).expect("safetynet attestation verifies");
    assert_eq!(attestation_type, AttestationType::Basic);
}

#[test]
fn test_safetynet_cts_profile_must_match() {
    let ceremony = Ceremony::default();
    let mut payload = ceremony.safetynet_payload();
    payload["ctsProfileMatch"] = json!(false);

    statement_error(
        verify(&ceremony.safetynet_request(&payload, "attest.android.com")),
        "ctsProfileMatch",
    );
}

#[test]
fn test_safetynet_nonce_mismatch() {
    let ceremony = Ceremony::default();
    let mut payload = ceremony.safetynet_payload();
    payload["nonce"] = json!("bm90IHRoaXMgY2VyZW1vbnk=");

    statement_error(
        verify(&ceremony.safetynet_request(&payload, "attest.android.com")),
        "nonce mismatch",
    );
}

#[test]
fn test_safetynet_stale_response() {
    let ceremony = Ceremony::default();
    let mut payload = ceremony.safetynet_payload();
    let ten_minutes_ago = chrono::Utc::now().timestamp_millis() - 600_000;
    payload["timestampMs"] = json!(ten_minutes_ago);

    statement_error(
        verify(&ceremony.safetynet_request(&payload, "attest.android.com")),
        "timestamp",
    );
}

#[test]
fn test_safetynet_certificate_hostname() {
    let ceremony = Ceremony::default();
    let request = ceremony.safetynet_request(&ceremony.safetynet_payload(), "attest.example.com");

    assert!(matches!(
        verify(&request),
        Err(VerificationError::Certificate(msg)) if msg.contains("attest.android.com")
    ));
}
