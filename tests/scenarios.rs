//! End-to-end scenarios exercised through the public API only: build a `Document` as raw
//! CBOR, parse it with [`Document::parse`], then run the issuer and device verifiers.

use assert_matches::assert_matches;
use chrono::{DateTime, Duration, Utc};
use ciborium::Value;
use coset::{iana, AsCborValue, CoseKeyBuilder, CoseMac0, CoseSign1, HeaderBuilder};
use rstest::rstest;

use mdoc_verify_core::cose::SigningKey;
use mdoc_verify_core::x509::TrustAnchor;
use mdoc_verify_core::{device, issuer, x509, Document, Error, ErrorCode};

fn init_tracing() {
    let _ = tracing::subscriber::set_global_default(
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .finish(),
    );
}

fn now() -> DateTime<Utc> {
    init_tracing();
    DateTime::parse_from_rfc3339("2024-06-01T00:00:00Z").unwrap().with_timezone(&Utc)
}

fn datetime_value(dt: DateTime<Utc>) -> Value {
    Value::Tag(0, Box::new(Value::Text(dt.to_rfc3339_opts(chrono::SecondsFormat::Secs, true))))
}

fn tagged_item_value(digest_id: u64, element_identifier: &str, element_value: Value) -> (Vec<u8>, Value) {
    let inner = Value::Map(vec![
        (Value::Text("digestID".into()), Value::Integer(digest_id.into())),
        (Value::Text("random".into()), Value::Bytes(vec![7u8; 16])),
        (Value::Text("elementIdentifier".into()), Value::Text(element_identifier.to_string())),
        (Value::Text("elementValue".into()), element_value),
    ]);
    let mut inner_bytes = Vec::new();
    ciborium::ser::into_writer(&inner, &mut inner_bytes).unwrap();
    let tag24 = Value::Tag(24, Box::new(Value::Bytes(inner_bytes)));
    let mut tag24_bytes = Vec::new();
    ciborium::ser::into_writer(&tag24, &mut tag24_bytes).unwrap();
    (tag24_bytes, tag24)
}

fn sha256(bytes: &[u8]) -> Vec<u8> {
    use sha2::{Digest, Sha256};
    Sha256::digest(bytes).to_vec()
}

struct Keys {
    issuer_key: p256::ecdsa::SigningKey,
    device_key: p256::ecdsa::SigningKey,
}

fn keys() -> Keys {
    Keys {
        issuer_key: p256::ecdsa::SigningKey::from_bytes(&[11u8; 32].into()).unwrap(),
        device_key: p256::ecdsa::SigningKey::from_bytes(&[12u8; 32].into()).unwrap(),
    }
}

fn self_signed_cert_for(signing_key: &p256::ecdsa::SigningKey) -> Vec<u8> {
    use p256::pkcs8::EncodePrivateKey;
    let pkcs8 = signing_key.to_pkcs8_der().unwrap();
    let rcgen_key = rcgen::KeyPair::from_pkcs8_der_and_sign_algo(
        &rustls_pki_types::PrivatePkcs8KeyDer::from(pkcs8.as_bytes()),
        &rcgen::PKCS_ECDSA_P256_SHA256,
    )
    .unwrap();
    let mut params = rcgen::CertificateParams::new(Vec::<String>::new()).unwrap();
    params.distinguished_name = rcgen::DistinguishedName::new();
    params.self_signed(&rcgen_key).unwrap().der().to_vec()
}

/// Builds the `mso` CBOR map: `docType`, one `given_name` element digest, a P-256 device
/// key derived from `keys.device_key`, and a 24-hour validity window starting at `signed`.
fn mso_value(doc_type: &str, digest: &[u8], device_key: &p256::ecdsa::SigningKey, signed: DateTime<Utc>) -> Value {
    let device_public = device_key.verifying_key().to_encoded_point(false);
    let device_key_cbor = CoseKeyBuilder::new_ec2_pub_key(iana::EllipticCurve::P_256, device_public.x().unwrap().to_vec(), device_public.y().unwrap().to_vec())
        .build()
        .to_cbor_value()
        .unwrap();
    Value::Map(vec![
        (Value::Text("version".into()), Value::Text("1.0".into())),
        (Value::Text("digestAlgorithm".into()), Value::Text("SHA-256".into())),
        (
            Value::Text("valueDigests".into()),
            Value::Map(vec![(
                Value::Text("org.iso.18013.5.1".into()),
                Value::Map(vec![(Value::Integer(0.into()), Value::Bytes(digest.to_vec()))]),
            )]),
        ),
        (
            Value::Text("deviceKeyInfo".into()),
            Value::Map(vec![(Value::Text("deviceKey".into()), device_key_cbor)]),
        ),
        (Value::Text("docType".into()), Value::Text(doc_type.to_string())),
        (
            Value::Text("validityInfo".into()),
            Value::Map(vec![
                (Value::Text("signed".into()), datetime_value(signed)),
                (Value::Text("validFrom".into()), datetime_value(signed)),
                (Value::Text("validUntil".into()), datetime_value(signed + Duration::hours(24))),
            ]),
        ),
    ])
}

fn encode(value: &Value) -> Vec<u8> {
    let mut bytes = Vec::new();
    ciborium::ser::into_writer(value, &mut bytes).unwrap();
    bytes
}

/// Full scenario knobs: every end-to-end test starts from this and perturbs one thing.
struct Scenario {
    doc_type: String,
    element_value: Value,
    leaf_der: Vec<u8>,
    issuer_signing_key: SigningKey,
    device_signing_key: SigningKey,
    signed: DateTime<Utc>,
    bad_digest: bool,
    drop_x5chain: bool,
    device_mac_instead_of_signature: bool,
}

impl Scenario {
    fn happy_path(now: DateTime<Utc>) -> Self {
        let keys = keys();
        Scenario {
            doc_type: "org.iso.18013.5.1.mDL".to_string(),
            element_value: Value::Text("Alice".into()),
            leaf_der: self_signed_cert_for(&keys.issuer_key),
            issuer_signing_key: SigningKey::P256(keys.issuer_key),
            device_signing_key: SigningKey::P256(keys.device_key),
            signed: now,
            bad_digest: false,
            drop_x5chain: false,
            device_mac_instead_of_signature: false,
        }
    }

    /// Builds `(document_value, session_transcript_value)`.
    fn build(&self) -> (Value, Value) {
        let SigningKey::P256(device_key) = &self.device_signing_key else {
            unreachable!("test fixtures only use P-256 keys")
        };
        let (item_tag24_bytes, item_tag24_value) = tagged_item_value(0, "given_name", self.element_value.clone());
        let digest = if self.bad_digest { vec![0xde, 0xad] } else { sha256(&item_tag24_bytes) };

        let mso = mso_value(&self.doc_type, &digest, device_key, self.signed);
        let mso_bytes = encode(&mso);
        let mso_tag24 = Value::Tag(24, Box::new(Value::Bytes(mso_bytes)));
        let payload = encode(&mso_tag24);

        let protected = HeaderBuilder::new().algorithm(iana::Algorithm::ES256).build();
        let unprotected = if self.drop_x5chain {
            coset::Header::default()
        } else {
            HeaderBuilder::new().value(33, Value::Bytes(self.leaf_der.clone())).build()
        };
        let issuer_auth = mdoc_verify_core::cose::sign(protected, unprotected, Some(payload), None, &self.issuer_signing_key).unwrap();
        let issuer_auth_value = Value::Tag(18, Box::new(issuer_auth.to_cbor_value().unwrap()));

        let name_spaces = Value::Map(vec![(Value::Text("org.iso.18013.5.1".into()), Value::Array(vec![item_tag24_value]))]);
        let issuer_signed = Value::Map(vec![
            (Value::Text("nameSpaces".into()), name_spaces),
            (Value::Text("issuerAuth".into()), issuer_auth_value),
        ]);

        let device_name_spaces_inner = Value::Map(vec![]);
        let device_name_spaces_tag24 = Value::Tag(24, Box::new(Value::Bytes(encode(&device_name_spaces_inner))));

        let session_transcript = Value::Array(vec![Value::Null, Value::Null, Value::Null]);

        let device_auth_value = if self.device_mac_instead_of_signature {
            let mac = CoseMac0 {
                protected: coset::ProtectedHeader::default(),
                unprotected: coset::Header::default(),
                payload: Some(vec![1, 2, 3]),
                tag: vec![4, 5, 6],
            };
            Value::Map(vec![(
                Value::Text("deviceMac".into()),
                Value::Tag(17, Box::new(mac.to_cbor_value().unwrap())),
            )])
        } else {
            let device_authentication = Value::Array(vec![
                Value::Text("DeviceAuthentication".to_string()),
                session_transcript.clone(),
                Value::Text(self.doc_type.clone()),
                device_name_spaces_tag24.clone(),
            ]);
            let detached_payload = encode(&device_authentication);
            let device_protected = HeaderBuilder::new().algorithm(iana::Algorithm::ES256).build();
            let device_sign1 = mdoc_verify_core::cose::sign(device_protected, coset::Header::default(), None, Some(&detached_payload), &self.device_signing_key).unwrap();
            Value::Map(vec![(
                Value::Text("deviceSignature".into()),
                Value::Tag(18, Box::new(device_sign1.to_cbor_value().unwrap())),
            )])
        };
        let device_signed = Value::Map(vec![
            (Value::Text("nameSpaces".into()), device_name_spaces_tag24),
            (Value::Text("deviceAuth".into()), device_auth_value),
        ]);

        let document = Value::Map(vec![
            (Value::Text("docType".into()), Value::Text(self.doc_type.clone())),
            (Value::Text("issuerSigned".into()), issuer_signed),
            (Value::Text("deviceSigned".into()), device_signed),
        ]);
        (document, session_transcript)
    }
}

fn parse_document(value: &Value) -> Document {
    Document::parse(value).unwrap()
}

#[test]
fn s1_happy_path_mdl_p256() {
    let scenario = Scenario::happy_path(now());
    let (document_value, _) = scenario.build();
    let document = parse_document(&document_value);
    let result = issuer::verify_issuer_signed(document.issuer_signed.as_ref().unwrap(), &[], now(), issuer::default_clock_skew()).unwrap();
    assert_eq!(result.mso.version, "1.0");
    assert_eq!(result.name_spaces["org.iso.18013.5.1"].len(), 1);
}

#[test]
fn s2_doc_type_missing() {
    let scenario = Scenario::happy_path(now());
    let (document_value, transcript_value) = scenario.build();
    let mut document = parse_document(&document_value);
    document.doc_type = None;
    let err = device::verify_device_signed_document(&document, &device::SessionTranscript(transcript_value), &[], now(), issuer::default_clock_skew()).unwrap_err();
    assert_matches!(err, Error::Single(e) if e.code == ErrorCode::DocTypeMissing);
}

#[test]
fn s2_issuer_signed_missing() {
    let scenario = Scenario::happy_path(now());
    let (document_value, transcript_value) = scenario.build();
    let mut document = parse_document(&document_value);
    document.issuer_signed = None;
    let err = device::verify_device_signed_document(&document, &device::SessionTranscript(transcript_value), &[], now(), issuer::default_clock_skew()).unwrap_err();
    assert_matches!(err, Error::Single(e) if e.code == ErrorCode::IssuerSignedMissing);
}

#[test]
fn s2_device_signed_missing() {
    let scenario = Scenario::happy_path(now());
    let (document_value, transcript_value) = scenario.build();
    let mut document = parse_document(&document_value);
    document.device_signed = None;
    let err = device::verify_device_signed_document(&document, &device::SessionTranscript(transcript_value), &[], now(), issuer::default_clock_skew()).unwrap_err();
    assert_matches!(err, Error::Single(e) if e.code == ErrorCode::DeviceSignedMissing);
}

#[test]
fn s3_not_yet_valid() {
    let scenario = Scenario::happy_path(now());
    let (document_value, _) = scenario.build();
    let document = parse_document(&document_value);
    let too_early = scenario.signed - Duration::minutes(5);
    let err = issuer::verify_issuer_signed(document.issuer_signed.as_ref().unwrap(), &[], too_early, issuer::default_clock_skew()).unwrap_err();
    assert_matches!(err, Error::Single(e) if e.code == ErrorCode::DocumentNotValidYet
        && e.message == "Document is not valid yet - 2002 - DocumentNotValidYet");
}

#[test]
fn s4_expired() {
    let scenario = Scenario::happy_path(now());
    let (document_value, _) = scenario.build();
    let document = parse_document(&document_value);
    let too_late = scenario.signed + Duration::hours(24) + Duration::minutes(5);
    let err = issuer::verify_issuer_signed(document.issuer_signed.as_ref().unwrap(), &[], too_late, issuer::default_clock_skew()).unwrap_err();
    assert_matches!(err, Error::Single(e) if e.code == ErrorCode::DocumentExpired);
}

#[test]
fn s5_digest_mismatch() {
    let mut scenario = Scenario::happy_path(now());
    scenario.bad_digest = true;
    let (document_value, _) = scenario.build();
    let document = parse_document(&document_value);
    let err = issuer::verify_issuer_signed(document.issuer_signed.as_ref().unwrap(), &[], now(), issuer::default_clock_skew()).unwrap_err();
    assert_matches!(err, Error::Aggregated(e) if e.errors["org.iso.18013.5.1"]["given_name"] == ErrorCode::MsoDigestMismatch);
}

#[test]
fn s6_chain_signature_divergence() {
    let mut scenario = Scenario::happy_path(now());
    // Sign with a key unrelated to the certificate embedded in x5chain.
    let other_key = p256::ecdsa::SigningKey::from_bytes(&[99u8; 32].into()).unwrap();
    scenario.issuer_signing_key = SigningKey::P256(other_key);
    let (document_value, _) = scenario.build();
    let document = parse_document(&document_value);
    let err = issuer::verify_issuer_signed(document.issuer_signed.as_ref().unwrap(), &[], now(), issuer::default_clock_skew()).unwrap_err();
    assert_matches!(err, Error::Single(e) if e.code == ErrorCode::IssuerAuthSignatureVerificationFailed);
}

#[test]
fn s7_missing_x5chain() {
    let mut scenario = Scenario::happy_path(now());
    scenario.drop_x5chain = true;
    let (document_value, _) = scenario.build();
    let document = parse_document(&document_value);
    let err = issuer::verify_issuer_signed(document.issuer_signed.as_ref().unwrap(), &[], now(), issuer::default_clock_skew()).unwrap_err();
    assert_matches!(err, Error::Single(e) if e.code == ErrorCode::X5ChainVerificationFailed);
}

#[test]
fn s8_detached_required() {
    let signing_key = SigningKey::P256(p256::ecdsa::SigningKey::from_bytes(&[1u8; 32].into()).unwrap());
    let protected = HeaderBuilder::new().algorithm(iana::Algorithm::ES256).build();
    let sign1: CoseSign1 = mdoc_verify_core::cose::sign(protected, coset::Header::default(), None, Some(b"detached"), &signing_key).unwrap();
    let err = mdoc_verify_core::cose::verify(
        &sign1,
        &signing_key.public_key(),
        None,
        ErrorCode::DeviceSignatureVerificationFailed,
        ErrorCode::DeviceSignatureVerificationFailed,
    )
    .unwrap_err();
    assert_matches!(err, Error::Single(e) if e.code == ErrorCode::DetachedPayloadRequired);
}

#[test]
fn s9_device_mac_rejected() {
    let mut scenario = Scenario::happy_path(now());
    scenario.device_mac_instead_of_signature = true;
    let (document_value, transcript_value) = scenario.build();
    let document = parse_document(&document_value);
    let err = device::verify_device_signed_document(&document, &device::SessionTranscript(transcript_value), &[], now(), issuer::default_clock_skew()).unwrap_err();
    assert_matches!(err, Error::Single(e) if e.code == ErrorCode::DeviceMacNotSupported);
}

#[test]
fn s10_session_transcript_tamper() {
    let scenario = Scenario::happy_path(now());
    let (document_value, _) = scenario.build();
    let document = parse_document(&document_value);
    let tampered = Value::Array(vec![Value::Null, Value::Null, Value::Text("tampered".into())]);
    let err = device::verify_device_signed_document(&document, &device::SessionTranscript(tampered), &[], now(), issuer::default_clock_skew()).unwrap_err();
    assert_matches!(err, Error::Single(e) if e.code == ErrorCode::DeviceSignatureVerificationFailed);
}

#[test]
fn wrong_doc_type_is_rejected() {
    let scenario = Scenario::happy_path(now());
    let (document_value, transcript_value) = scenario.build();
    let mut document = parse_document(&document_value);
    document.doc_type = Some("org.iso.18013.5.1.other".to_string());
    let err = device::verify_device_signed_document(&document, &device::SessionTranscript(transcript_value), &[], now(), issuer::default_clock_skew()).unwrap_err();
    assert_matches!(err, Error::Single(e) if e.code == ErrorCode::WrongDocType);
}

#[test]
fn full_round_trip_decode_encode_is_stable() {
    let scenario = Scenario::happy_path(now());
    let (document_value, _) = scenario.build();
    let bytes = encode(&document_value);
    let decoded = mdoc_verify_core::cbor::decode(&bytes).unwrap();
    assert_eq!(decoded, document_value);
    let document = Document::parse(&decoded).unwrap();
    assert_eq!(document.doc_type.as_deref(), Some("org.iso.18013.5.1.mDL"));
}

#[test]
fn untrusted_root_is_rejected_when_anchors_given() {
    let scenario = Scenario::happy_path(now());
    let (document_value, _) = scenario.build();
    let document = parse_document(&document_value);

    let other_root_key = p256::ecdsa::SigningKey::from_bytes(&[77u8; 32].into()).unwrap();
    let other_root_der = self_signed_cert_for(&other_root_key);
    let anchor_cert = x509::Certificate::parse(&other_root_der).unwrap();
    let anchors = vec![TrustAnchor { certificate: anchor_cert }];

    let err = issuer::verify_issuer_signed(document.issuer_signed.as_ref().unwrap(), &anchors, now(), issuer::default_clock_skew()).unwrap_err();
    assert_matches!(err, Error::Single(e) if e.code == ErrorCode::X5ChainVerificationFailed);
}

/// Boundary behaviour of the validity window at `validFrom - skew` / `validUntil + skew`:
/// the 60-second clock skew budget extends the window symmetrically but never unconditionally.
#[rstest]
#[case::one_second_before_valid_from_with_skew_passes(Duration::seconds(-59), true)]
#[case::exactly_at_valid_from_passes(Duration::zero(), true)]
#[case::one_second_past_skew_before_valid_from_fails(Duration::seconds(-61), false)]
#[case::one_second_before_valid_until_with_skew_passes(Duration::hours(24) + Duration::seconds(59), true)]
#[case::one_second_past_skew_after_valid_until_fails(Duration::hours(24) + Duration::seconds(61), false)]
fn validity_window_boundary(#[case] offset_from_signed: Duration, #[case] should_pass: bool) {
    let scenario = Scenario::happy_path(now());
    let (document_value, _) = scenario.build();
    let document = parse_document(&document_value);
    let at = scenario.signed + offset_from_signed;
    let result = issuer::verify_issuer_signed(document.issuer_signed.as_ref().unwrap(), &[], at, issuer::default_clock_skew());
    assert_eq!(result.is_ok(), should_pass, "verifying at signed{offset_from_signed:+} should_pass={should_pass}");
}
