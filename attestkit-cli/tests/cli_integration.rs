//! CLI integration tests for attestkit-cli.
//!
//! These tests run the actual binary and check outputs and exit codes.
//! Nothing here talks to a metadata service.

use std::path::Path;

use assert_cmd::Command;
use attestkit_core::data::{
    AttestationObject, AttestationStatement, AttestedCredentialData, AuthenticatorData,
    AuthenticatorFlags, CoseAlgorithm, CoseKey, CoseKeyParams, EcCurve,
};
use attestkit_core::{Aaguid, CborConverter, ObjectConverter};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use openssl::bn::{BigNum, BigNumContext};
use openssl::ec::{EcGroup, EcKey};
use openssl::nid::Nid;
use predicates::prelude::*;
use tempfile::TempDir;

const RP_ID: &str = "example.com";
const ORIGIN: &str = "https://example.com";
const CHALLENGE: &[u8] = b"cli-integration-challenge";

/// Get a Command for the attestkit binary.
fn attestkit() -> Command {
    Command::cargo_bin("attestkit").unwrap()
}

fn challenge() -> String {
    URL_SAFE_NO_PAD.encode(CHALLENGE)
}

/// PublicKeyCredential JSON for a `none` attestation.
fn none_credential(flags: u8) -> serde_json::Value {
    let key = EcKey::generate(&EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap()).unwrap();
    let mut ctx = BigNumContext::new().unwrap();
    let mut x = BigNum::new().unwrap();
    let mut y = BigNum::new().unwrap();
    key.public_key()
        .affine_coordinates(key.group(), &mut x, &mut y, &mut ctx)
        .unwrap();

    let credential_id = b"cli-credential".to_vec();
    let authenticator_data = AuthenticatorData {
        rp_id_hash: openssl::sha::sha256(RP_ID.as_bytes()),
        flags: AuthenticatorFlags::new(flags),
        sign_count: 1,
        attested_credential_data: Some(AttestedCredentialData {
            aaguid: Aaguid::ZERO,
            credential_id: credential_id.clone(),
            credential_public_key: CoseKey {
                algorithm: CoseAlgorithm::ES256,
                params: CoseKeyParams::Ec2 {
                    curve: EcCurve::P256,
                    x: x.to_vec_padded(32).unwrap(),
                    y: y.to_vec_padded(32).unwrap(),
                },
            },
        }),
        extensions: None,
    };
    let attestation_object = AttestationObject {
        fmt: "none".to_string(),
        att_stmt: AttestationStatement::default(),
        authenticator_data_bytes: authenticator_data.to_bytes(&CborConverter::default()).unwrap(),
        authenticator_data,
    }
    .to_bytes(&ObjectConverter::new())
    .unwrap();
    let client_data_json = serde_json::to_vec(&serde_json::json!({
        "type": "webauthn.create",
        "challenge": challenge(),
        "origin": ORIGIN,
    }))
    .unwrap();

    serde_json::json!({
        "id": URL_SAFE_NO_PAD.encode(&credential_id),
        "rawId": URL_SAFE_NO_PAD.encode(&credential_id),
        "response": {
            "attestationObject": URL_SAFE_NO_PAD.encode(attestation_object),
            "clientDataJSON": URL_SAFE_NO_PAD.encode(client_data_json),
            "transports": ["usb"],
        },
        "type": "public-key",
        "extensions": {},
    })
}

fn write_credential(dir: &TempDir, credential: &serde_json::Value) -> std::path::PathBuf {
    let path = dir.path().join("credential.json");
    std::fs::write(&path, serde_json::to_vec_pretty(credential).unwrap()).unwrap();
    path
}

fn verify_cmd(credential: &Path) -> Command {
    let mut cmd = attestkit();
    cmd.arg("verify")
        .arg(credential)
        .args(["--origin", ORIGIN, "--rp-id", RP_ID, "--challenge"])
        .arg(challenge());
    cmd
}

const UP_AT: u8 = AuthenticatorFlags::USER_PRESENT | AuthenticatorFlags::ATTESTED_CREDENTIAL_DATA;

// ============================================================================
// Help and Version Tests
// ============================================================================

#[test]
fn test_help_displays_usage() {
    attestkit()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("WebAuthn attestation verification"))
        .stdout(predicate::str::contains("verify"))
        .stdout(predicate::str::contains("lookup"))
        .stdout(predicate::str::contains("conformance"));
}

#[test]
fn test_version_displays_version() {
    attestkit()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("attestkit"));
}

#[test]
fn test_help_shows_exit_codes() {
    attestkit()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Exit codes:"))
        .stdout(predicate::str::contains("65"))
        .stdout(predicate::str::contains("69"));
}

#[test]
fn test_verify_help_shows_options() {
    attestkit()
        .args(["verify", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("CREDENTIAL_JSON"))
        .stdout(predicate::str::contains("--origin"))
        .stdout(predicate::str::contains("--anchor"))
        .stdout(predicate::str::contains("--mds"))
        .stdout(predicate::str::contains("--blob-root-cert"));
}

// ============================================================================
// Verify Tests
// ============================================================================

#[test]
fn test_verify_none_attestation() {
    let dir = TempDir::new().unwrap();
    let path = write_credential(&dir, &none_credential(UP_AT));

    verify_cmd(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("REGISTRATION VERIFIED"))
        .stdout(predicate::str::contains("none"));
}

#[test]
fn test_verify_json_output() {
    let dir = TempDir::new().unwrap();
    let path = write_credential(&dir, &none_credential(UP_AT));

    let output = verify_cmd(&path).arg("--json").output().unwrap();
    assert!(output.status.success());
    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["format"], "none");
    assert_eq!(summary["attestationType"], "none");
    assert_eq!(summary["credentialId"], URL_SAFE_NO_PAD.encode(b"cli-credential"));
    assert_eq!(summary["signCount"], 1);
    assert_eq!(summary["transports"], serde_json::json!(["usb"]));
}

#[test]
fn test_verify_wrong_origin_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write_credential(&dir, &none_credential(UP_AT));

    attestkit()
        .arg("verify")
        .arg(&path)
        .args(["--origin", "https://evil.example", "--rp-id", RP_ID, "--challenge"])
        .arg(challenge())
        .assert()
        .code(65)
        .stderr(predicate::str::contains("Registration rejected"));
}

#[test]
fn test_verify_requires_user_verification() {
    let dir = TempDir::new().unwrap();
    let path = write_credential(&dir, &none_credential(UP_AT));

    verify_cmd(&path)
        .arg("--require-user-verification")
        .assert()
        .code(65);

    let path = write_credential(
        &dir,
        &none_credential(UP_AT | AuthenticatorFlags::USER_VERIFIED),
    );
    verify_cmd(&path).arg("--require-user-verification").assert().success();
}

// ============================================================================
// Exit Code Tests
// ============================================================================

#[test]
fn test_missing_credential_file() {
    verify_cmd(Path::new("/nonexistent/credential.json"))
        .assert()
        .code(66)
        .stderr(predicate::str::contains("Failed to read file"));
}

#[test]
fn test_invalid_credential_json() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("credential.json");
    std::fs::write(&path, "{ not json").unwrap();

    verify_cmd(&path)
        .assert()
        .code(65)
        .stderr(predicate::str::contains("Failed to parse PublicKeyCredential JSON"));
}

#[test]
fn test_invalid_challenge() {
    let dir = TempDir::new().unwrap();
    let path = write_credential(&dir, &none_credential(UP_AT));

    attestkit()
        .arg("verify")
        .arg(&path)
        .args(["--origin", ORIGIN, "--rp-id", RP_ID, "--challenge", "not base64!"])
        .assert()
        .code(64);
}

#[test]
fn test_missing_anchor_file() {
    let dir = TempDir::new().unwrap();
    let path = write_credential(&dir, &none_credential(UP_AT));

    verify_cmd(&path)
        .args(["--anchor", "/nonexistent/roots.pem"])
        .assert()
        .code(66);
}

#[test]
fn test_lookup_invalid_aaguid() {
    attestkit()
        .args(["lookup", "not-an-aaguid"])
        .assert()
        .code(64)
        .stderr(predicate::str::contains("Invalid AAGUID"));
}
