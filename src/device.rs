//! Device verifier (§4.7): checks the issuer-signed portion of a `Document`, converts the
//! MSO's device key, reconstructs `DeviceAuthentication`, and verifies the device's
//! detached COSE_Sign1 signature over it. `DeviceMac` is read-only: it must decode as a
//! valid COSE_Mac0 before being rejected as an unsupported authentication mode.

use chrono::{DateTime, Duration, Utc};
use coset::{AsCborValue, CoseMac0, CoseSign1};
use tracing::{debug, warn};

use crate::cbor;
use crate::cose;
use crate::error::{Error, ErrorCode, Result};
use crate::issuer::{self, IssuerVerified};
use crate::model::Document;
use crate::x509::TrustAnchor;

/// The opaque 3-tuple `[ DeviceEngagementBytes | null, EReaderKeyBytes | null, Handover ]`,
/// passed through verbatim; this crate never interprets its components.
#[derive(Debug, Clone)]
pub struct SessionTranscript(pub ciborium::Value);

/// Runs the §4.7 algorithm end to end: issuer verification of `document.issuer_signed`,
/// then device-signature verification over a freshly built `DeviceAuthentication`.
pub fn verify_device_signed_document(document: &Document, session_transcript: &SessionTranscript, trust_anchors: &[TrustAnchor], now: DateTime<Utc>, clock_skew: Duration) -> Result<IssuerVerified> {
    debug!(doc_type = ?document.doc_type, "verifying device_signed document");
    match verify_device_signed_document_inner(document, session_transcript, trust_anchors, now, clock_skew) {
        Ok(verified) => {
            debug!("device signature valid");
            Ok(verified)
        }
        Err(e) => {
            warn!("device_signed verification failed: {e}");
            Err(e)
        }
    }
}

fn verify_device_signed_document_inner(document: &Document, session_transcript: &SessionTranscript, trust_anchors: &[TrustAnchor], now: DateTime<Utc>, clock_skew: Duration) -> Result<IssuerVerified> {
    // Step 1.
    let doc_type = document.doc_type.clone().ok_or_else(|| Error::code(ErrorCode::DocTypeMissing))?;
    let issuer_signed = document.issuer_signed.as_ref().ok_or_else(|| Error::code(ErrorCode::IssuerSignedMissing))?;
    let device_signed = document.device_signed.as_ref().ok_or_else(|| Error::code(ErrorCode::DeviceSignedMissing))?;

    // Step 2.
    debug!("verifying issuer_signed");
    let issuer_verified = issuer::verify_issuer_signed(issuer_signed, trust_anchors, now, clock_skew)?;
    if issuer_verified.mso.doc_type != doc_type {
        return Err(Error::code(ErrorCode::WrongDocType));
    }

    // Step 3.
    debug!("extracting device_key from MSO");
    let device_public_key = cose::key::public_key_from_cose_key(&issuer_verified.mso.device_key_info.device_key)?;

    // Step 4.
    let name_spaces_tag24 = device_signed.name_spaces_tag24.as_ref().ok_or_else(|| Error::code(ErrorCode::DeviceNameSpacesMissing))?;
    let device_auth = device_signed.device_auth.as_ref().ok_or_else(|| Error::code(ErrorCode::DeviceAuthMissing))?;

    // Step 5.
    let device_signature = extract_device_signature(device_auth)?;

    // Step 6.
    debug!("reconstructing DeviceAuthentication");
    let device_authentication = ciborium::Value::Array(vec![
        ciborium::Value::Text("DeviceAuthentication".to_string()),
        session_transcript.0.clone(),
        ciborium::Value::Text(doc_type.clone()),
        name_spaces_tag24.clone(),
    ]);
    let detached_payload = cbor::encode(&device_authentication);

    // Step 7.
    debug!("verifying DeviceSignature");
    let sign1 = {
        let inner = crate::schema::tagged(&device_signature, 18).map_err(|issues| Error::from_issues(ErrorCode::Sign1ConversionFailed, issues))?;
        CoseSign1::from_cbor_value(inner.clone()).map_err(|e| Error::with_cause(ErrorCode::Sign1ConversionFailed, e))?
    };
    cose::verify(
        &sign1,
        &device_public_key,
        Some(&detached_payload),
        ErrorCode::DeviceSignatureVerificationFailed,
        ErrorCode::DeviceSignatureVerificationFailed,
    )?;

    Ok(issuer_verified)
}

/// Takes `deviceSignature` from `deviceAuth`, rejecting `deviceMac` (only after confirming
/// it decodes as a real COSE_Mac0) and requiring that exactly one of the two is present.
fn extract_device_signature(device_auth: &crate::model::DeviceAuth) -> Result<ciborium::Value> {
    match (&device_auth.device_signature, &device_auth.device_mac) {
        (Some(device_signature), _) => Ok(device_signature.clone()),
        (None, Some(device_mac)) => {
            let inner = crate::schema::tagged(device_mac, 17).map_err(|issues| Error::from_issues(ErrorCode::Sign1ConversionFailed, issues))?;
            CoseMac0::from_cbor_value(inner.clone()).map_err(|e| Error::with_cause(ErrorCode::Sign1ConversionFailed, e))?;
            Err(Error::code(ErrorCode::DeviceMacNotSupported))
        }
        (None, None) => Err(Error::code(ErrorCode::DeviceSignatureMissing)),
    }
}
