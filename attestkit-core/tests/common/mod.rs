//! Fixtures shared by the integration tests: OpenSSL keys and certificates
//! and hand-assembled registration responses.

#![allow(dead_code)]

use attestkit_core::data::{
    AttestationObject, AttestationStatement, AttestedCredentialData, AuthenticatorData,
    AuthenticatorFlags, CoseAlgorithm, CoseKey, CoseKeyParams, EcCurve,
};
use attestkit_core::jws::{encode_compact, JwsHeader};
use attestkit_core::{
    Aaguid, CborConverter, ObjectConverter, RegistrationParameters, RegistrationRequest,
    ServerProperty,
};
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use ciborium::Value;
use openssl::asn1::{Asn1Object, Asn1OctetString, Asn1Time};
use openssl::bn::{BigNum, BigNumContext, MsbOption};
use openssl::ec::{EcGroup, EcKey};
use openssl::ecdsa::EcdsaSig;
use openssl::error::ErrorStack;
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::{PKey, Private};
use openssl::sign::Signer;
use openssl::x509::extension::BasicConstraints;
use openssl::x509::{X509Builder, X509Extension, X509NameBuilder, X509};

pub const RP_ID: &str = "example.com";
pub const ORIGIN: &str = "https://example.com";
pub const CHALLENGE: &[u8] = b"registration-challenge-0001";

/// Subject of a valid packed attestation certificate.
pub const PACKED_SUBJECT: &[(&str, &str)] = &[
    ("C", "US"),
    ("O", "Example Authenticators"),
    ("OU", "Authenticator Attestation"),
    ("CN", "Example Attestation"),
];

pub fn aaguid() -> Aaguid {
    "b93fd961-f2e6-462f-b122-82002247de78"
        .parse()
        .expect("valid AAGUID literal")
}

pub fn ec_key() -> PKey<Private> {
    let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).expect("P-256 group");
    PKey::from_ec_key(EcKey::generate(&group).expect("EC key generation")).expect("EC pkey")
}

/// An extension given as OID, criticality and DER `extnValue` content.
pub type RawExtension<'a> = (&'a str, bool, Vec<u8>);

/// Issue a v3 certificate for `key`; self-signed when `issuer` is `None`.
pub fn issue(
    subject: &[(&str, &str)],
    key: &PKey<Private>,
    issuer: Option<(&X509, &PKey<Private>)>,
    ca: bool,
) -> X509 {
    issue_with(subject, key, issuer, ca, &[])
}

/// [`issue`] plus raw extensions.
pub fn issue_with(
    subject: &[(&str, &str)],
    key: &PKey<Private>,
    issuer: Option<(&X509, &PKey<Private>)>,
    ca: bool,
    extensions: &[RawExtension<'_>],
) -> X509 {
    let mut name = X509NameBuilder::new().expect("name builder");
    for (field, value) in subject {
        name.append_entry_by_text(field, value).expect("name entry");
    }
    let name = name.build();

    let mut builder = X509Builder::new().expect("x509 builder");
    builder.set_version(2).expect("version");
    let mut serial = BigNum::new().expect("bignum");
    serial.rand(64, MsbOption::MAYBE_ZERO, false).expect("serial");
    builder
        .set_serial_number(&serial.to_asn1_integer().expect("asn1 serial"))
        .expect("serial number");
    builder.set_subject_name(&name).expect("subject");
    builder.set_pubkey(key).expect("public key");
    builder
        .set_not_before(&Asn1Time::days_from_now(0).expect("not before"))
        .expect("not before");
    builder
        .set_not_after(&Asn1Time::days_from_now(365).expect("not after"))
        .expect("not after");
    if ca {
        builder
            .append_extension(BasicConstraints::new().critical().ca().build().expect("bc"))
            .expect("basic constraints");
    }
    for (oid, critical, value) in extensions {
        let oid = Asn1Object::from_str(oid).expect("extension OID");
        let value = Asn1OctetString::new_from_bytes(value).expect("extension value");
        builder
            .append_extension(
                X509Extension::new_from_der(&oid, *critical, &value).expect("extension"),
            )
            .expect("append extension");
    }
    match issuer {
        Some((issuer_cert, issuer_key)) => {
            builder.set_issuer_name(issuer_cert.subject_name()).expect("issuer");
            builder.sign(issuer_key, MessageDigest::sha256()).expect("sign");
        }
        None => {
            builder.set_issuer_name(&name).expect("issuer");
            builder.sign(key, MessageDigest::sha256()).expect("sign");
        }
    }
    builder.build()
}

/// Root CA plus a packed attestation leaf issued by it.
pub fn attestation_chain() -> (X509, X509, PKey<Private>) {
    let root_key = ec_key();
    let root = issue(&[("CN", "Example Attestation Root")], &root_key, None, true);
    let leaf_key = ec_key();
    let leaf = issue(PACKED_SUBJECT, &leaf_key, Some((&root, &root_key)), false);
    (root, leaf, leaf_key)
}

/// DER ECDSA / SHA-256 signature, the encoding WebAuthn uses.
pub fn sign(key: &PKey<Private>, data: &[u8]) -> Vec<u8> {
    let mut signer = Signer::new(MessageDigest::sha256(), key).expect("signer");
    signer.sign_oneshot_to_vec(data).expect("signature")
}

pub fn cose_key(key: &PKey<Private>) -> CoseKey {
    let ec = key.ec_key().expect("EC key");
    let mut ctx = BigNumContext::new().expect("bignum context");
    let mut x = BigNum::new().expect("bignum");
    let mut y = BigNum::new().expect("bignum");
    ec.public_key()
        .affine_coordinates(ec.group(), &mut x, &mut y, &mut ctx)
        .expect("affine coordinates");
    CoseKey {
        algorithm: CoseAlgorithm::ES256,
        params: CoseKeyParams::Ec2 {
            curve: EcCurve::P256,
            x: x.to_vec_padded(32).expect("x"),
            y: y.to_vec_padded(32).expect("y"),
        },
    }
}

/// One registration ceremony as an authenticator would perform it.
pub struct Ceremony {
    pub rp_id: String,
    pub origin: String,
    pub challenge: Vec<u8>,
    pub client_data_type: String,
    pub flags: u8,
    pub aaguid: Aaguid,
    pub credential_id: Vec<u8>,
    pub credential_key: PKey<Private>,
    /// `alg` written into the credential COSE key.
    pub credential_algorithm: CoseAlgorithm,
}

impl Default for Ceremony {
    fn default() -> Self {
        Self {
            rp_id: RP_ID.to_string(),
            origin: ORIGIN.to_string(),
            challenge: CHALLENGE.to_vec(),
            client_data_type: "webauthn.create".to_string(),
            flags: AuthenticatorFlags::USER_PRESENT | AuthenticatorFlags::ATTESTED_CREDENTIAL_DATA,
            aaguid: aaguid(),
            credential_id: b"credential-0001".to_vec(),
            credential_key: ec_key(),
            credential_algorithm: CoseAlgorithm::ES256,
        }
    }
}

impl Ceremony {
    pub fn parameters() -> RegistrationParameters {
        RegistrationParameters::new(ServerProperty::new(ORIGIN, RP_ID, CHALLENGE))
    }

    pub fn client_data_json(&self) -> Vec<u8> {
        serde_json::to_vec(&serde_json::json!({
            "type": self.client_data_type,
            "challenge": URL_SAFE_NO_PAD.encode(&self.challenge),
            "origin": self.origin,
            "crossOrigin": false,
        }))
        .expect("client data JSON")
    }

    pub fn client_data_hash(&self) -> [u8; 32] {
        openssl::sha::sha256(&self.client_data_json())
    }

    pub fn authenticator_data(&self) -> AuthenticatorData {
        AuthenticatorData {
            rp_id_hash: openssl::sha::sha256(self.rp_id.as_bytes()),
            flags: AuthenticatorFlags::new(self.flags),
            sign_count: 0,
            attested_credential_data: Some(AttestedCredentialData {
                aaguid: self.aaguid,
                credential_id: self.credential_id.clone(),
                credential_public_key: CoseKey {
                    algorithm: self.credential_algorithm,
                    ..cose_key(&self.credential_key)
                },
            }),
            extensions: None,
        }
    }

    pub fn authenticator_data_bytes(&self) -> Vec<u8> {
        self.authenticator_data()
            .to_bytes(&CborConverter::default())
            .expect("authenticator data")
    }

    /// `authData || clientDataHash`
    pub fn signed_data(&self) -> Vec<u8> {
        let mut data = self.authenticator_data_bytes();
        data.extend_from_slice(&self.client_data_hash());
        data
    }

    pub fn request(&self, fmt: &str, att_stmt: AttestationStatement) -> RegistrationRequest {
        let object = AttestationObject {
            fmt: fmt.to_string(),
            att_stmt,
            authenticator_data: self.authenticator_data(),
            authenticator_data_bytes: self.authenticator_data_bytes(),
        };
        let attestation_object = object
            .to_bytes(&ObjectConverter::new())
            .expect("attestation object");
        RegistrationRequest::new(attestation_object, self.client_data_json())
    }

    pub fn none_request(&self) -> RegistrationRequest {
        self.request("none", AttestationStatement::default())
    }

    /// Packed self attestation signed with the credential key.
    pub fn packed_self_request(&self) -> RegistrationRequest {
        let sig = sign(&self.credential_key, &self.signed_data());
        self.request(
            "packed",
            AttestationStatement::from_entries([
                ("alg", Value::Integer(self.credential_algorithm.value().into())),
                ("sig", Value::Bytes(sig)),
            ]),
        )
    }

    /// Packed basic attestation signed by `attestation_key`, `x5c = chain`.
    pub fn packed_basic_request(
        &self,
        chain: &[&X509],
        attestation_key: &PKey<Private>,
    ) -> RegistrationRequest {
        let sig = sign(attestation_key, &self.signed_data());
        self.request(
            "packed",
            AttestationStatement::from_entries([
                ("alg", Value::Integer(CoseAlgorithm::ES256.value().into())),
                ("sig", Value::Bytes(sig)),
                ("x5c", x5c(chain)),
            ]),
        )
    }

    pub fn fido_u2f_request(
        &self,
        cert: &X509,
        attestation_key: &PKey<Private>,
    ) -> RegistrationRequest {
        let key = cose_key(&self.credential_key);
        let public_key_u2f = key.to_x962_raw().expect("P-256 credential key");
        let mut data = vec![0x00];
        data.extend_from_slice(&openssl::sha::sha256(self.rp_id.as_bytes()));
        data.extend_from_slice(&self.client_data_hash());
        data.extend_from_slice(&self.credential_id);
        data.extend_from_slice(&public_key_u2f);

        self.request(
            "fido-u2f",
            AttestationStatement::from_entries([
                ("sig", Value::Bytes(sign(attestation_key, &data))),
                ("x5c", x5c(&[cert])),
            ]),
        )
    }
}

fn x5c(chain: &[&X509]) -> Value {
    Value::Array(
        chain
            .iter()
            .map(|cert| Value::Bytes(cert.to_der().expect("DER certificate")))
            .collect(),
    )
}

/// MDS signing chain: root CA and the BLOB signer it issued.
pub struct MdsSigning {
    pub root: X509,
    pub signer: X509,
    pub signer_key: PKey<Private>,
}

impl MdsSigning {
    pub fn new() -> Self {
        let root_key = ec_key();
        let root = issue(&[("CN", "Metadata Root")], &root_key, None, true);
        let signer_key = ec_key();
        let signer = issue(
            &[("CN", "Metadata BLOB Signer")],
            &signer_key,
            Some((&root, &root_key)),
            false,
        );
        Self { root, signer, signer_key }
    }

    /// Compact ES256 JWS over `payload` with the signer in `x5c`.
    pub fn encode(&self, payload: &serde_json::Value) -> String {
        let header = JwsHeader {
            alg: "ES256".into(),
            typ: Some("JWT".into()),
            x5c: vec![STANDARD.encode(self.signer.to_der().expect("signer DER"))],
        };
        encode_compact(ObjectConverter::new().json(), &header, payload, |data| {
            sign_es256_raw(&self.signer_key, data)
        })
        .expect("BLOB encodes")
    }
}

/// JWS carries ES256 signatures as `r || s`.
fn sign_es256_raw(key: &PKey<Private>, data: &[u8]) -> Result<Vec<u8>, ErrorStack> {
    let mut signer = Signer::new(MessageDigest::sha256(), key)?;
    let der = signer.sign_oneshot_to_vec(data)?;
    let sig = EcdsaSig::from_der(&der)?;
    let mut raw = sig.r().to_vec_padded(32)?;
    raw.extend(sig.s().to_vec_padded(32)?);
    Ok(raw)
}

/// A one-entry BLOB payload for `aaguid` whose root is `anchor`.
pub fn single_entry_payload(no: u64, aaguid: &Aaguid, anchor: &X509) -> serde_json::Value {
    let anchor_b64 = STANDARD.encode(anchor.to_der().expect("anchor DER"));
    serde_json::json!({
        "no": no,
        "nextUpdate": "2030-01-01",
        "entries": [{
            "aaguid": aaguid.to_string(),
            "metadataStatement": {
                "aaguid": aaguid.to_string(),
                "description": "Loader Test Key",
                "protocolFamily": "fido2",
                "attestationRootCertificates": [anchor_b64]
            },
            "statusReports": [{"status": "FIDO_CERTIFIED", "effectiveDate": "2022-01-01"}]
        }]
    })
}

/// DER TLV with a definite length.
pub fn der(tag: &[u8], content: &[u8]) -> Vec<u8> {
    let mut out = tag.to_vec();
    match content.len() {
        len @ 0..=0x7f => out.push(len as u8),
        len @ 0x80..=0xff => out.extend([0x81, len as u8]),
        len => out.extend([0x82, (len >> 8) as u8, len as u8]),
    }
    out.extend_from_slice(content);
    out
}

fn der_small_int(value: u8) -> Vec<u8> {
    der(&[0x02], &[value])
}

pub const OID_ANDROID_KEY_DESCRIPTION: &str = "1.3.6.1.4.1.11129.2.1.17";
pub const OID_APPLE_NONCE: &str = "1.2.840.113635.100.8.2";
pub const OID_SUBJECT_ALT_NAME: &str = "2.5.29.17";
pub const OID_EXTENDED_KEY_USAGE: &str = "2.5.29.37";

/// Android KeyDescription with a TEE-enforced authorization list.
#[derive(Debug, Clone)]
pub struct KeyDescription {
    pub challenge: Vec<u8>,
    pub purpose: Vec<u8>,
    pub origin: Option<u8>,
    pub all_applications: bool,
}

impl KeyDescription {
    /// Generated signing key bound to `challenge`.
    pub fn new(challenge: &[u8]) -> Self {
        Self {
            challenge: challenge.to_vec(),
            purpose: vec![2],
            origin: Some(0),
            all_applications: false,
        }
    }

    pub fn to_der(&self) -> Vec<u8> {
        let mut tee = Vec::new();
        if !self.purpose.is_empty() {
            let set: Vec<u8> = self.purpose.iter().flat_map(|p| der_small_int(*p)).collect();
            tee.extend(der(&[0xa1], &der(&[0x31], &set)));
        }
        if self.all_applications {
            tee.extend(der(&[0xbf, 0x84, 0x58], &der(&[0x05], &[])));
        }
        if let Some(origin) = self.origin {
            tee.extend(der(&[0xbf, 0x85, 0x3e], &der_small_int(origin)));
        }

        let mut body = Vec::new();
        body.extend(der_small_int(3));
        body.extend(der(&[0x0a], &[1]));
        body.extend(der_small_int(4));
        body.extend(der(&[0x0a], &[1]));
        body.extend(der(&[0x04], &self.challenge));
        body.extend(der(&[0x04], &[]));
        body.extend(der(&[0x30], &[]));
        body.extend(der(&[0x30], &tee));
        der(&[0x30], &body)
    }
}

/// TPM AIK certificate issued by a fresh root: empty subject, SAN and the
/// tcg-kp-AIKCertificate EKU.
pub fn tpm_aik(subject: &[(&str, &str)]) -> (X509, PKey<Private>) {
    let root_key = ec_key();
    let root = issue(&[("CN", "TPM Attestation Root")], &root_key, None, true);
    let aik_key = ec_key();
    let san = der(&[0x30], &der(&[0x82], b"tpm.example.com"));
    // SEQUENCE { OID 2.23.133.8.3 }
    let eku = der(&[0x30], &der(&[0x06], &[0x67, 0x81, 0x05, 0x08, 0x03]));
    let aik = issue_with(
        subject,
        &aik_key,
        Some((&root, &root_key)),
        false,
        &[(OID_SUBJECT_ALT_NAME, true, san), (OID_EXTENDED_KEY_USAGE, false, eku)],
    );
    (aik, aik_key)
}

/// TPMT_PUBLIC for an ECC P-256 key, nameAlg SHA-256.
pub fn tpm_pub_area(key: &CoseKey) -> Vec<u8> {
    let CoseKeyParams::Ec2 { x, y, .. } = &key.params else {
        panic!("TPM fixtures use EC2 keys");
    };
    let mut out = Vec::new();
    out.extend_from_slice(&0x0023u16.to_be_bytes());
    out.extend_from_slice(&0x000bu16.to_be_bytes());
    out.extend_from_slice(&0x0006_0472u32.to_be_bytes());
    out.extend_from_slice(&0u16.to_be_bytes());
    out.extend_from_slice(&0x0010u16.to_be_bytes());
    out.extend_from_slice(&0x0010u16.to_be_bytes());
    out.extend_from_slice(&0x0003u16.to_be_bytes());
    out.extend_from_slice(&0x0010u16.to_be_bytes());
    out.extend_from_slice(&(x.len() as u16).to_be_bytes());
    out.extend_from_slice(x);
    out.extend_from_slice(&(y.len() as u16).to_be_bytes());
    out.extend_from_slice(y);
    out
}

/// TPM name of `pub_area`: nameAlg || SHA-256(pubArea).
pub fn tpm_name(pub_area: &[u8]) -> Vec<u8> {
    let mut name = 0x000bu16.to_be_bytes().to_vec();
    name.extend_from_slice(&openssl::sha::sha256(pub_area));
    name
}

/// TPMS_ATTEST of type TPM_ST_ATTEST_CERTIFY.
pub fn tpm_cert_info(extra_data: &[u8], name: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&0xff54_4347u32.to_be_bytes());
    out.extend_from_slice(&0x8017u16.to_be_bytes());
    out.extend_from_slice(&0u16.to_be_bytes());
    out.extend_from_slice(&(extra_data.len() as u16).to_be_bytes());
    out.extend_from_slice(extra_data);
    out.extend_from_slice(&[0u8; 17]);
    out.extend_from_slice(&[0u8; 8]);
    out.extend_from_slice(&(name.len() as u16).to_be_bytes());
    out.extend_from_slice(name);
    out.extend_from_slice(&0u16.to_be_bytes());
    out
}

impl Ceremony {
    /// SHA-256 of `authData || clientDataHash`.
    pub fn signed_data_hash(&self) -> [u8; 32] {
        openssl::sha::sha256(&self.signed_data())
    }

    pub fn credential_cose_key(&self) -> CoseKey {
        cose_key(&self.credential_key)
    }

    /// android-key statement signed by the credential key, whose certificate
    /// carries `description`.
    pub fn android_key_request(&self, description: &KeyDescription) -> RegistrationRequest {
        let root_key = ec_key();
        let root = issue(&[("CN", "Android Keystore Root")], &root_key, None, true);
        let leaf = issue_with(
            &[("CN", "Android Keystore Key")],
            &self.credential_key,
            Some((&root, &root_key)),
            false,
            &[(OID_ANDROID_KEY_DESCRIPTION, false, description.to_der())],
        );
        self.request(
            "android-key",
            AttestationStatement::from_entries([
                ("alg", Value::Integer(CoseAlgorithm::ES256.value().into())),
                ("sig", Value::Bytes(sign(&self.credential_key, &self.signed_data()))),
                ("x5c", x5c(&[&leaf, &root])),
            ]),
        )
    }

    /// apple statement whose leaf certifies `leaf_key` and carries `nonce`.
    pub fn apple_request(
        &self,
        nonce: Option<&[u8]>,
        leaf_key: &PKey<Private>,
    ) -> RegistrationRequest {
        let root_key = ec_key();
        let root = issue(&[("CN", "Apple WebAuthn Root")], &root_key, None, true);
        let extensions: Vec<RawExtension<'_>> = nonce
            .map(|nonce| {
                let value = der(&[0x30], &der(&[0xa1], &der(&[0x04], nonce)));
                (OID_APPLE_NONCE, false, value)
            })
            .into_iter()
            .collect();
        let leaf = issue_with(
            &[("CN", "Apple Credential")],
            leaf_key,
            Some((&root, &root_key)),
            false,
            &extensions,
        );
        self.request(
            "apple",
            AttestationStatement::from_entries([("x5c", x5c(&[&leaf, &root]))]),
        )
    }

    /// SafetyNet JWS payload that passes every check.
    pub fn safetynet_payload(&self) -> serde_json::Value {
        serde_json::json!({
            "nonce": STANDARD.encode(self.signed_data_hash()),
            "timestampMs": chrono::Utc::now().timestamp_millis(),
            "apkPackageName": "com.google.android.gms",
            "ctsProfileMatch": true,
            "basicIntegrity": true,
        })
    }

    /// android-safetynet statement carrying `payload` signed by a certificate
    /// issued to `hostname`.
    pub fn safetynet_request(
        &self,
        payload: &serde_json::Value,
        hostname: &str,
    ) -> RegistrationRequest {
        let root_key = ec_key();
        let root = issue(&[("CN", "SafetyNet Root")], &root_key, None, true);
        let key = ec_key();
        let leaf = issue(&[("CN", hostname)], &key, Some((&root, &root_key)), false);
        let header = JwsHeader {
            alg: "ES256".into(),
            typ: None,
            x5c: [&leaf, &root]
                .iter()
                .map(|cert| STANDARD.encode(cert.to_der().expect("DER")))
                .collect(),
        };
        let response = encode_compact(ObjectConverter::new().json(), &header, payload, |data| {
            sign_es256_raw(&key, data)
        })
        .expect("SafetyNet response encodes");
        self.request(
            "android-safetynet",
            AttestationStatement::from_entries([
                ("ver", Value::Text("14799021".into())),
                ("response", Value::Bytes(response.into_bytes())),
            ]),
        )
    }

    /// tpm statement over the given structures, `certInfo` signed by `aik_key`.
    pub fn tpm_request(
        &self,
        pub_area: &[u8],
        cert_info: &[u8],
        aik: &X509,
        aik_key: &PKey<Private>,
    ) -> RegistrationRequest {
        self.request(
            "tpm",
            AttestationStatement::from_entries([
                ("ver", Value::Text("2.0".into())),
                ("alg", Value::Integer(CoseAlgorithm::ES256.value().into())),
                ("sig", Value::Bytes(sign(aik_key, cert_info))),
                ("certInfo", Value::Bytes(cert_info.to_vec())),
                ("pubArea", Value::Bytes(pub_area.to_vec())),
                ("x5c", x5c(&[aik])),
            ]),
        )
    }

    /// tpm statement that passes every check.
    pub fn tpm_valid_request(&self, aik: &X509, aik_key: &PKey<Private>) -> RegistrationRequest {
        let pub_area = tpm_pub_area(&self.credential_cose_key());
        let cert_info = tpm_cert_info(&self.signed_data_hash(), &tpm_name(&pub_area));
        self.tpm_request(&pub_area, &cert_info, aik, aik_key)
    }
}
