//! COSE_Sign1 sign/verify operations built on top of [`coset`], plus the curve-tagged
//! [`PublicKey`] conversions in [`key`].
//!
//! `coset::CoseSign1` already realises the wire shape spec'd for `Sign1Tuple` (and its
//! `Tag(18, ...)` boxing), so this module only adds the two operations the domain layer
//! needs on top of it: `sign` (for test fixtures) and `verify` (used by both the issuer
//! and device verifiers, parameterised by which error code a failure should carry).

pub mod key;

pub use key::{PublicKey, SignatureAlgorithm};

use coset::{CoseSign1, CoseSign1Builder};
use signature::Signer as _;

use crate::error::{Error, ErrorCode, Result};

/// A private signing key, used only to build test fixtures (the verification core never
/// signs on behalf of an issuer or device in production use).
///
/// `Debug` is hand-written because `p521::ecdsa::SigningKey` does not implement it.
#[derive(Clone)]
pub enum SigningKey {
    P256(p256::ecdsa::SigningKey),
    P384(p384::ecdsa::SigningKey),
    P521(p521::ecdsa::SigningKey),
    Ed25519(ed25519_dalek::SigningKey),
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            SigningKey::P256(_) => "SigningKey::P256(..)",
            SigningKey::P384(_) => "SigningKey::P384(..)",
            SigningKey::P521(_) => "SigningKey::P521(..)",
            SigningKey::Ed25519(_) => "SigningKey::Ed25519(..)",
        })
    }
}

impl SigningKey {
    pub fn algorithm(&self) -> SignatureAlgorithm {
        match self {
            SigningKey::P256(_) => SignatureAlgorithm::Es256,
            SigningKey::P384(_) => SignatureAlgorithm::Es384,
            SigningKey::P521(_) => SignatureAlgorithm::Es512,
            SigningKey::Ed25519(_) => SignatureAlgorithm::EdDsa,
        }
    }

    pub fn public_key(&self) -> PublicKey {
        match self {
            SigningKey::P256(k) => PublicKey::P256(*k.verifying_key()),
            SigningKey::P384(k) => PublicKey::P384(*k.verifying_key()),
            SigningKey::P521(k) => PublicKey::P521(p521::ecdsa::VerifyingKey::from(k)),
            SigningKey::Ed25519(k) => PublicKey::Ed25519(k.verifying_key()),
        }
    }

    fn sign(&self, message: &[u8]) -> Vec<u8> {
        match self {
            SigningKey::P256(k) => {
                let sig: p256::ecdsa::Signature = k.sign(message);
                sig.to_vec()
            }
            SigningKey::P384(k) => {
                let sig: p384::ecdsa::Signature = k.sign(message);
                sig.to_vec()
            }
            SigningKey::P521(k) => {
                let sig: p521::ecdsa::Signature = k.sign(message);
                sig.to_vec()
            }
            SigningKey::Ed25519(k) => {
                let sig: ed25519_dalek::Signature = k.sign(message);
                sig.to_bytes().to_vec()
            }
        }
    }
}

/// Builds a `COSE_Sign1` over `payload`, or over a detached payload if `payload` is `None`
/// and `detached_payload` is given. `protected` must already carry the `alg` header
/// matching `signing_key`; fails `DetachedPayloadRequired` if neither payload is given.
pub fn sign(
    protected: coset::Header,
    unprotected: coset::Header,
    payload: Option<Vec<u8>>,
    detached_payload: Option<&[u8]>,
    signing_key: &SigningKey,
) -> Result<CoseSign1> {
    if payload.is_none() && detached_payload.is_none() {
        return Err(Error::code(ErrorCode::DetachedPayloadRequired));
    }
    let builder = CoseSign1Builder::new()
        .protected(protected)
        .unprotected(unprotected);
    let builder = match (&payload, detached_payload) {
        (Some(payload), _) => builder.payload(payload.clone()).create_signature(&[], |tbs| signing_key.sign(tbs)),
        (None, Some(detached)) => builder.create_detached_signature(detached, &[], |tbs| signing_key.sign(tbs)),
        (None, None) => unreachable!("checked above"),
    };
    Ok(builder.build())
}

/// Verifies `sign1` against `public_key`, reconstructing the Sig_structure from the
/// attached payload or, if the payload is detached, from `detached_payload`.
///
/// `algorithm_mismatch_code` and `signature_failure_code` are both caller-scoped: the
/// issuer path distinguishes an algorithm mismatch (`IssuerAuthAlgorithmMismatch`) from a
/// cryptographic failure (`IssuerAuthSignatureVerificationFailed`), while the device path
/// has no separate algorithm-mismatch code and passes `DeviceSignatureVerificationFailed`
/// for both.
pub fn verify(
    sign1: &CoseSign1,
    public_key: &PublicKey,
    detached_payload: Option<&[u8]>,
    algorithm_mismatch_code: ErrorCode,
    signature_failure_code: ErrorCode,
) -> Result<()> {
    let alg = sign1
        .protected
        .header
        .alg
        .as_ref()
        .and_then(SignatureAlgorithm::from_coset)
        .ok_or_else(|| Error::code(algorithm_mismatch_code))?;
    if alg != public_key.algorithm() {
        return Err(Error::code(algorithm_mismatch_code));
    }
    match (&sign1.payload, detached_payload) {
        (Some(_), _) => {
            let tbs = sign1.tbs_data(&[]);
            public_key.verify(alg, &tbs, &sign1.signature, signature_failure_code)
        }
        (None, Some(detached)) => {
            let tbs = sign1.tbs_detached_data(detached, &[]);
            public_key.verify(alg, &tbs, &sign1.signature, signature_failure_code)
        }
        (None, None) => Err(Error::code(ErrorCode::DetachedPayloadRequired)),
    }
}
