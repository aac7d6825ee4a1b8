//! COSE_Key / X.509 SubjectPublicKeyInfo -> curve-tagged public key conversion, and the
//! `SignatureScheme` dispatch (ES256/ES384/ES512/EdDSA) used by both issuer and device
//! signature verification.

use coset::iana;
use signature::Verifier as _;

use crate::error::{Error, ErrorCode};

/// The closed algorithm table from the COSE layer (§4.4): any other `alg` value fails
/// schema validation before a [`PublicKey`] is even constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureAlgorithm {
    Es256,
    Es384,
    Es512,
    EdDsa,
}

impl SignatureAlgorithm {
    pub fn from_coset(alg: &coset::Algorithm) -> Option<Self> {
        match alg {
            coset::RegisteredLabelWithPrivate::Assigned(iana::Algorithm::ES256) => Some(SignatureAlgorithm::Es256),
            coset::RegisteredLabelWithPrivate::Assigned(iana::Algorithm::ES384) => Some(SignatureAlgorithm::Es384),
            coset::RegisteredLabelWithPrivate::Assigned(iana::Algorithm::ES512) => Some(SignatureAlgorithm::Es512),
            coset::RegisteredLabelWithPrivate::Assigned(iana::Algorithm::EdDSA) => Some(SignatureAlgorithm::EdDsa),
            _ => None,
        }
    }

    pub fn to_coset(self) -> iana::Algorithm {
        match self {
            SignatureAlgorithm::Es256 => iana::Algorithm::ES256,
            SignatureAlgorithm::Es384 => iana::Algorithm::ES384,
            SignatureAlgorithm::Es512 => iana::Algorithm::ES512,
            SignatureAlgorithm::EdDsa => iana::Algorithm::EdDSA,
        }
    }
}

/// A curve-tagged public key, normalised from either a COSE_Key or an X.509
/// SubjectPublicKeyInfo.
///
/// `Debug` is hand-written because `p521::ecdsa::VerifyingKey` does not implement it.
#[derive(Clone)]
pub enum PublicKey {
    P256(p256::ecdsa::VerifyingKey),
    P384(p384::ecdsa::VerifyingKey),
    P521(p521::ecdsa::VerifyingKey),
    Ed25519(ed25519_dalek::VerifyingKey),
}

impl std::fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            PublicKey::P256(_) => "PublicKey::P256(..)",
            PublicKey::P384(_) => "PublicKey::P384(..)",
            PublicKey::P521(_) => "PublicKey::P521(..)",
            PublicKey::Ed25519(_) => "PublicKey::Ed25519(..)",
        })
    }
}

impl PublicKey {
    /// The one [`SignatureAlgorithm`] this key is valid under.
    pub fn algorithm(&self) -> SignatureAlgorithm {
        match self {
            PublicKey::P256(_) => SignatureAlgorithm::Es256,
            PublicKey::P384(_) => SignatureAlgorithm::Es384,
            PublicKey::P521(_) => SignatureAlgorithm::Es512,
            PublicKey::Ed25519(_) => SignatureAlgorithm::EdDsa,
        }
    }

    /// Builds a P-256/P-384/P-521 key from a SEC1 (uncompressed point) encoding.
    pub fn from_sec1_p256(bytes: &[u8]) -> Result<Self, Error> {
        p256::ecdsa::VerifyingKey::from_sec1_bytes(bytes)
            .map(PublicKey::P256)
            .map_err(|e| Error::with_cause(ErrorCode::DeviceKeyUnsupported, e))
    }

    pub fn from_sec1_p384(bytes: &[u8]) -> Result<Self, Error> {
        p384::ecdsa::VerifyingKey::from_sec1_bytes(bytes)
            .map(PublicKey::P384)
            .map_err(|e| Error::with_cause(ErrorCode::DeviceKeyUnsupported, e))
    }

    pub fn from_sec1_p521(bytes: &[u8]) -> Result<Self, Error> {
        p521::ecdsa::VerifyingKey::from_sec1_bytes(bytes)
            .map(PublicKey::P521)
            .map_err(|e| Error::with_cause(ErrorCode::DeviceKeyUnsupported, e))
    }

    pub fn from_ed25519_bytes(bytes: &[u8]) -> Result<Self, Error> {
        let array: [u8; 32] = bytes
            .try_into()
            .map_err(|_| Error::with_cause(ErrorCode::DeviceKeyUnsupported, "Ed25519 key must be 32 bytes"))?;
        ed25519_dalek::VerifyingKey::from_bytes(&array)
            .map(PublicKey::Ed25519)
            .map_err(|e| Error::with_cause(ErrorCode::DeviceKeyUnsupported, e))
    }

    /// Verifies `signature` over `message` against this key, given the algorithm the
    /// protected header announced. The caller is responsible for the `alg`/key-type
    /// cross-check (`IssuerAuthAlgorithmMismatch`); this only reports cryptographic failure.
    pub fn verify(&self, alg: SignatureAlgorithm, message: &[u8], signature: &[u8], code: ErrorCode) -> Result<(), Error> {
        match self {
            PublicKey::P256(key) if alg == SignatureAlgorithm::Es256 => {
                let sig = p256::ecdsa::Signature::from_slice(signature).map_err(|e| Error::with_cause(code, e))?;
                key.verify(message, &sig).map_err(|e| Error::with_cause(code, e))
            }
            PublicKey::P384(key) if alg == SignatureAlgorithm::Es384 => {
                let sig = p384::ecdsa::Signature::from_slice(signature).map_err(|e| Error::with_cause(code, e))?;
                key.verify(message, &sig).map_err(|e| Error::with_cause(code, e))
            }
            PublicKey::P521(key) if alg == SignatureAlgorithm::Es512 => {
                let sig = p521::ecdsa::Signature::from_slice(signature).map_err(|e| Error::with_cause(code, e))?;
                key.verify(message, &sig).map_err(|e| Error::with_cause(code, e))
            }
            PublicKey::Ed25519(key) if alg == SignatureAlgorithm::EdDsa => {
                let array: [u8; 64] = signature
                    .try_into()
                    .map_err(|_| Error::with_cause(code, "Ed25519 signature must be 64 bytes"))?;
                let sig = ed25519_dalek::Signature::from_bytes(&array);
                key.verify(message, &sig).map_err(|e| Error::with_cause(code, e))
            }
            _ => Err(Error::code(ErrorCode::IssuerAuthAlgorithmMismatch)),
        }
    }
}

/// Converts an MSO `deviceKey` (a [`coset::CoseKey`]) into a [`PublicKey`]. Only `EC2`
/// (P-256/P-384/P-521) and `OKP` (Ed25519) key types are supported; everything else is
/// `DeviceKeyUnsupported`.
pub fn public_key_from_cose_key(key: &coset::CoseKey) -> Result<PublicKey, Error> {
    use coset::{Label, RegisteredLabel};

    let crv = key
        .params
        .iter()
        .find(|(label, _)| *label == Label::Int(iana::Ec2KeyParameter::Crv as i64))
        .map(|(_, v)| v);

    match &key.kty {
        RegisteredLabel::Assigned(iana::KeyType::EC2) => {
            let crv = crv.ok_or_else(|| Error::code(ErrorCode::DeviceKeyUnsupported))?;
            let x = find_bytes_param(key, iana::Ec2KeyParameter::X)?;
            let y = find_bytes_param(key, iana::Ec2KeyParameter::Y)?;
            let mut point = vec![0x04u8];
            point.extend_from_slice(&x);
            point.extend_from_slice(&y);
            match crv.as_integer().and_then(|i| i64::try_from(i).ok()) {
                Some(v) if v == iana::EllipticCurve::P_256 as i64 => PublicKey::from_sec1_p256(&point),
                Some(v) if v == iana::EllipticCurve::P_384 as i64 => PublicKey::from_sec1_p384(&point),
                Some(v) if v == iana::EllipticCurve::P_521 as i64 => PublicKey::from_sec1_p521(&point),
                _ => Err(Error::code(ErrorCode::DeviceKeyUnsupported)),
            }
        }
        RegisteredLabel::Assigned(iana::KeyType::OKP) => {
            let crv = crv.ok_or_else(|| Error::code(ErrorCode::DeviceKeyUnsupported))?;
            let x = find_bytes_param(key, iana::OkpKeyParameter::X)?;
            match crv.as_integer().and_then(|i| i64::try_from(i).ok()) {
                Some(v) if v == iana::EllipticCurve::Ed25519 as i64 => PublicKey::from_ed25519_bytes(&x),
                _ => Err(Error::code(ErrorCode::DeviceKeyUnsupported)),
            }
        }
        _ => Err(Error::code(ErrorCode::DeviceKeyUnsupported)),
    }
}

fn find_bytes_param(key: &coset::CoseKey, label: impl iana::EnumI64) -> Result<Vec<u8>, Error> {
    let label = coset::Label::Int(label.to_i64());
    key.params
        .iter()
        .find(|(l, _)| *l == label)
        .and_then(|(_, v)| v.as_bytes())
        .cloned()
        .ok_or_else(|| Error::code(ErrorCode::DeviceKeyUnsupported))
}
