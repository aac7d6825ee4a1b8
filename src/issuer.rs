//! Issuer verifier (§4.6): validates an `IssuerSigned` structure's certificate chain and
//! COSE_Sign1 signature, decodes and schema-validates the MSO it carries, recomputes
//! every disclosed element's digest, and checks the MSO's validity window.

use chrono::{DateTime, Duration, Utc};
use coset::{CoseSign1, Label};
use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::cbor;
use crate::cose;
use crate::error::{Error, ErrorCode, Result};
use crate::model::{DataElementIdentifier, Document, IssuerNameSpaces, IssuerSigned, MobileSecurityObject, NameSpace};
use crate::x509::{Certificate, TrustAnchor};

pub const DEFAULT_CLOCK_SKEW_SECONDS: i64 = 60;

pub fn default_clock_skew() -> Duration {
    Duration::seconds(DEFAULT_CLOCK_SKEW_SECONDS)
}

/// The outcome of a successful issuer verification: the MSO and the name spaces it was
/// checked against.
#[derive(Debug, Clone)]
pub struct IssuerVerified {
    pub mso: MobileSecurityObject,
    pub name_spaces: IssuerNameSpaces,
}

/// Runs the §4.6 algorithm end to end. `trust_anchors` is forwarded to the X.509 adapter
/// unmodified; an empty slice accepts a self-signed leaf certificate.
pub fn verify_issuer_signed(issuer_signed: &IssuerSigned, trust_anchors: &[TrustAnchor], now: DateTime<Utc>, clock_skew: Duration) -> Result<IssuerVerified> {
    match verify_issuer_signed_inner(issuer_signed, trust_anchors, now, clock_skew) {
        Ok(verified) => {
            debug!(doc_type = %verified.mso.doc_type, "issuer_signed verified");
            Ok(verified)
        }
        Err(e) => {
            warn!("issuer_signed verification failed: {e}");
            Err(e)
        }
    }
}

fn verify_issuer_signed_inner(issuer_signed: &IssuerSigned, trust_anchors: &[TrustAnchor], now: DateTime<Utc>, clock_skew: Duration) -> Result<IssuerVerified> {
    // Step 1.
    debug!("extracting nameSpaces and issuerAuth");
    let name_spaces = issuer_signed.name_spaces.clone().ok_or_else(|| Error::code(ErrorCode::IssuerNameSpacesMissing))?;
    let issuer_auth = issuer_signed.issuer_auth.as_ref().ok_or_else(|| Error::code(ErrorCode::IssuerAuthMissing))?;

    // Step 3: obtain x5chain, protected header taking precedence over unprotected.
    debug!("reading x5chain");
    let chain_der = x5chain_der(issuer_auth)?;
    let certificates = chain_der.iter().map(|der| Certificate::parse(der)).collect::<Result<Vec<_>>>()?;

    // Step 4: validate the chain and obtain the leaf's public key.
    debug!("validating certificate chain");
    let leaf_public_key = crate::x509::verify_chain(&certificates, trust_anchors, now, clock_skew)?;

    // Steps 5-6: algorithm cross-check and signature verification. The payload is attached
    // (the embedded MSO bytes), not detached.
    debug!("verifying issuerAuth COSE_Sign1");
    cose::verify(
        issuer_auth,
        &leaf_public_key,
        None,
        ErrorCode::IssuerAuthAlgorithmMismatch,
        ErrorCode::IssuerAuthSignatureVerificationFailed,
    )?;

    // Step 7: the payload is Tag(24, bytes) whose bytes are CBOR for an MSO.
    debug!("decoding MSO payload");
    let payload = issuer_auth.payload.as_ref().ok_or_else(|| Error::code(ErrorCode::DetachedPayloadRequired))?;
    let payload_value = cbor::decode(payload).map_err(|e| Error::with_cause(ErrorCode::IssuerAuthPayloadDecodingFailed, e))?;
    let mso_bytes = crate::schema::tagged(&payload_value, 24)
        .and_then(crate::schema::bytes)
        .map_err(|issues| Error::from_issues(ErrorCode::IssuerAuthPayloadDecodingFailed, issues))?;
    let mso_value = cbor::decode(&mso_bytes).map_err(|e| Error::with_cause(ErrorCode::IssuerAuthPayloadDecodingFailed, e))?;
    let mso = MobileSecurityObject::parse(&mso_value).map_err(|issues| Error::from_issues(ErrorCode::MobileSecurityObjectInvalid, issues))?;

    // Step 8.
    debug!("recomputing value digests");
    verify_value_digests(&mso, &name_spaces)?;

    // Step 9.
    debug!("checking validity window");
    verify_validity_info(&mso, now, clock_skew)?;

    // Step 10.
    Ok(IssuerVerified { mso, name_spaces })
}

fn find_x5chain(header: &coset::Header) -> Option<&ciborium::Value> {
    header
        .rest
        .iter()
        .find(|(label, _)| matches!(label, Label::Int(i) if *i == coset::iana::HeaderParameter::X5Chain as i64))
        .map(|(_, value)| value)
}

/// Reads the `x5chain` header (protected over unprotected); a lone byte string is treated
/// as a singleton chain, an array as a leaf-first chain.
fn x5chain_der(sign1: &CoseSign1) -> Result<Vec<Vec<u8>>> {
    let value = find_x5chain(&sign1.protected.header)
        .or_else(|| find_x5chain(&sign1.unprotected))
        .ok_or_else(|| Error::with_cause(ErrorCode::X5ChainVerificationFailed, "x5chain header is missing"))?;
    match value {
        ciborium::Value::Bytes(der) => Ok(vec![der.clone()]),
        ciborium::Value::Array(items) => items
            .iter()
            .map(|item| match item {
                ciborium::Value::Bytes(der) => Ok(der.clone()),
                other => Err(Error::with_cause(
                    ErrorCode::X5ChainVerificationFailed,
                    format!("x5chain entry is not a byte string, received {}", crate::schema::type_name(other)),
                )),
            })
            .collect(),
        other => Err(Error::with_cause(
            ErrorCode::X5ChainVerificationFailed,
            format!("x5chain header has an unexpected shape, received {}", crate::schema::type_name(other)),
        )),
    }
}

/// §4.6.1: recomputes and compares the digest of every disclosed element's Tag-24 bytes
/// (tag header included) against the MSO's declared `valueDigests`.
fn verify_value_digests(mso: &MobileSecurityObject, name_spaces: &IssuerNameSpaces) -> Result<()> {
    let mut errors: IndexMap<NameSpace, IndexMap<DataElementIdentifier, ErrorCode>> = IndexMap::new();
    for (name_space, items) in name_spaces {
        let Some(digests) = mso.value_digests.get(name_space) else {
            return Err(Error::code(ErrorCode::ValueDigestsMissingForNamespace));
        };
        for item in items {
            let code = match digests.get(&item.item.digest_id) {
                None => Some(ErrorCode::ValueDigestsMissingForDigestId),
                Some(expected) if *expected != mso.digest_algorithm.digest(&item.tag24_bytes) => Some(ErrorCode::MsoDigestMismatch),
                Some(_) => None,
            };
            if let Some(code) = code {
                errors
                    .entry(name_space.clone())
                    .or_default()
                    .insert(item.item.element_identifier.clone(), code);
            }
        }
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(crate::error::ErrorsError::new(errors).into())
    }
}

/// §4.6.2: `validFrom`/`validUntil` missing, or `now` outside `[validFrom - skew, validUntil + skew]`.
fn verify_validity_info(mso: &MobileSecurityObject, now: DateTime<Utc>, clock_skew: Duration) -> Result<()> {
    let valid_from = mso.validity_info.valid_from.as_ref().ok_or_else(|| Error::code(ErrorCode::ValidFromMissing))?;
    let valid_until = mso.validity_info.valid_until.as_ref().ok_or_else(|| Error::code(ErrorCode::ValidUntilMissing))?;
    if now + clock_skew < valid_from.0 {
        return Err(Error::code(ErrorCode::DocumentNotValidYet));
    }
    if now - clock_skew > valid_until.0 {
        return Err(Error::code(ErrorCode::DocumentExpired));
    }
    Ok(())
}

/// §4.8: batch issuer verification. Never aborts on a single document's failure; both
/// output lists preserve input order.
pub struct BatchIssuerVerified {
    pub documents: Vec<IssuerVerified>,
    pub document_errors: Vec<(String, ErrorCode)>,
}

pub fn verify_issuer_signed_documents(documents: &[Document], trust_anchors: &[TrustAnchor], now: DateTime<Utc>, clock_skew: Duration) -> BatchIssuerVerified {
    let mut verified = Vec::new();
    let mut errors = Vec::new();
    for document in documents {
        let doc_type = document.doc_type.clone().unwrap_or_default();
        match &document.issuer_signed {
            None => errors.push((doc_type, ErrorCode::IssuerSignedMissing)),
            Some(issuer_signed) => match verify_issuer_signed(issuer_signed, trust_anchors, now, clock_skew) {
                Ok(result) => verified.push(result),
                Err(e) => errors.push((doc_type, e.primary_code())),
            },
        }
    }
    BatchIssuerVerified {
        documents: verified,
        document_errors: errors,
    }
}
