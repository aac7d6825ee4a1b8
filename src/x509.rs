//! X.509 DER certificate parsing and chain validation.
//!
//! Chain validation policy: the leaf (and any intermediates) must chain, link by link, to
//! a root that either matches a caller-supplied [`TrustAnchor`] or is self-signed when no
//! anchors are given. This is deliberately not a general path-building engine: it walks
//! the caller-provided chain in order and never searches for alternative paths.

use chrono::{DateTime, Utc};
use x509_parser::certificate::X509Certificate;
use x509_parser::nom::AsBytes;
use x509_parser::prelude::FromDer;
use x509_parser::public_key::PublicKey as X509PublicKey;
use x509_parser::x509::SubjectPublicKeyInfo;

use crate::cose::key::PublicKey;
use crate::error::{Error, ErrorCode, Result};

/// A parsed DER certificate, borrowing from the bytes it was parsed from.
pub struct Certificate<'a> {
    pub inner: X509Certificate<'a>,
}

impl<'a> Certificate<'a> {
    pub fn parse(der: &'a [u8]) -> Result<Self> {
        let (_, inner) = X509Certificate::from_der(der).map_err(|e| {
            Error::with_cause(ErrorCode::X5ChainVerificationFailed, format!("certificate DER parsing failed: {e}"))
        })?;
        Ok(Certificate { inner })
    }

    /// The certificate's subject public key, converted into the crate's curve-tagged form.
    pub fn subject_public_key(&self) -> Result<PublicKey> {
        subject_public_key(self.inner.public_key())
    }

    /// Whether `now`, widened by `clock_skew` on both ends, falls inside the certificate's
    /// validity window.
    pub fn is_valid_at(&self, now: DateTime<Utc>, clock_skew: chrono::Duration) -> bool {
        let validity = self.inner.validity();
        let not_before = validity.not_before.timestamp() - clock_skew.num_seconds();
        let not_after = validity.not_after.timestamp() + clock_skew.num_seconds();
        let now_ts = now.timestamp();
        now_ts >= not_before && now_ts <= not_after
    }
}

/// A root certificate the caller trusts. An empty trust-anchor slice means "accept a
/// self-signed leaf", matching this crate's default test posture.
pub struct TrustAnchor<'a> {
    pub certificate: Certificate<'a>,
}

fn subject_public_key(spki: &SubjectPublicKeyInfo) -> Result<PublicKey> {
    if spki.algorithm.algorithm == oid_registry::OID_SIG_ED25519 {
        return PublicKey::from_ed25519_bytes(spki.subject_public_key.data.as_bytes());
    }
    let parsed = spki.parsed().map_err(|e| {
        Error::with_cause(ErrorCode::X5ChainVerificationFailed, format!("unsupported subject public key: {e}"))
    })?;
    match parsed {
        X509PublicKey::EC(point) => {
            let curve_oid = spki
                .algorithm
                .parameters
                .as_ref()
                .and_then(|p| p.as_oid().ok())
                .ok_or_else(|| {
                    Error::with_cause(ErrorCode::X5ChainVerificationFailed, "EC public key is missing a named curve")
                })?;
            if curve_oid == oid_registry::OID_EC_P256 {
                PublicKey::from_sec1_p256(point.data())
            } else if curve_oid == oid_registry::OID_NIST_EC_P384 {
                PublicKey::from_sec1_p384(point.data())
            } else if curve_oid == oid_registry::OID_NIST_EC_P521 {
                PublicKey::from_sec1_p521(point.data())
            } else {
                Err(Error::with_cause(ErrorCode::X5ChainVerificationFailed, format!("unsupported EC curve {curve_oid}")))
            }
        }
        other => Err(Error::with_cause(ErrorCode::X5ChainVerificationFailed, format!("unsupported key type {other:?}"))),
    }
}

/// Validates `chain` (leaf first) against `trust_anchors`, and returns the leaf's public
/// key on success. Every certificate's validity window is checked against `now ±
/// clock_skew`; each link's signature is verified against the next certificate up the
/// chain; the final certificate must either verify against one of `trust_anchors` or,
/// when `trust_anchors` is empty, be self-signed.
pub fn verify_chain(chain: &[Certificate], trust_anchors: &[TrustAnchor], now: DateTime<Utc>, clock_skew: chrono::Duration) -> Result<PublicKey> {
    let Some(leaf) = chain.first() else {
        return Err(Error::with_cause(ErrorCode::X5ChainVerificationFailed, "certificate chain is empty"));
    };
    for cert in chain {
        if !cert.is_valid_at(now, clock_skew) {
            return Err(Error::with_cause(ErrorCode::X5ChainVerificationFailed, "a certificate in the chain is outside its validity window"));
        }
    }
    for pair in chain.windows(2) {
        let (child, issuer) = (&pair[0], &pair[1]);
        child
            .inner
            .verify_signature(Some(issuer.inner.public_key()))
            .map_err(|e| Error::with_cause(ErrorCode::X5ChainVerificationFailed, format!("chain signature verification failed: {e}")))?;
    }
    let root = chain.last().expect("chain is non-empty");
    if trust_anchors.is_empty() {
        root.inner
            .verify_signature(None)
            .map_err(|e| Error::with_cause(ErrorCode::X5ChainVerificationFailed, format!("self-signed root signature verification failed: {e}")))?;
    } else {
        let trusted = trust_anchors
            .iter()
            .any(|anchor| root.inner.verify_signature(Some(anchor.certificate.inner.public_key())).is_ok());
        if !trusted {
            return Err(Error::with_cause(ErrorCode::X5ChainVerificationFailed, "chain does not terminate at a trusted root"));
        }
    }
    leaf.subject_public_key()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn self_signed_p256_cert() -> Vec<u8> {
        let signing_key = rcgen::KeyPair::generate_for(&rcgen::PKCS_ECDSA_P256_SHA256).unwrap();
        let mut params = rcgen::CertificateParams::new(vec!["mdoc-verify-core-test".into()]).unwrap();
        params.distinguished_name = rcgen::DistinguishedName::new();
        let now = time::OffsetDateTime::now_utc();
        params.not_before = now - time::Duration::days(1);
        params.not_after = now + time::Duration::days(365);
        let cert = params.self_signed(&signing_key).unwrap();
        cert.der().to_vec()
    }

    #[test]
    fn accepts_self_signed_leaf_with_no_trust_anchors() {
        let der = self_signed_p256_cert();
        let leaf = Certificate::parse(&der).unwrap();
        let public_key = verify_chain(&[leaf], &[], Utc::now(), Duration::seconds(60)).unwrap();
        assert_eq!(public_key.algorithm(), crate::cose::SignatureAlgorithm::Es256);
    }

    #[test]
    fn rejects_chain_outside_validity_window() {
        let der = self_signed_p256_cert();
        let leaf = Certificate::parse(&der).unwrap();
        let far_future = Utc::now() + Duration::days(365 * 50);
        assert!(verify_chain(&[leaf], &[], far_future, Duration::seconds(60)).is_err());
    }

    #[test]
    fn rejects_untrusted_root_when_anchors_given() {
        let der = self_signed_p256_cert();
        let other_der = self_signed_p256_cert();
        let leaf = Certificate::parse(&der).unwrap();
        let anchor_cert = Certificate::parse(&other_der).unwrap();
        let anchors = [TrustAnchor { certificate: anchor_cert }];
        assert!(verify_chain(&[leaf], &anchors, Utc::now(), Duration::seconds(60)).is_err());
    }
}
