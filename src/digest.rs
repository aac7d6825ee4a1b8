//! SHA-256 / SHA-384 / SHA-512 digests over CBOR-encoded tagged items.

use sha2::{Digest, Sha256, Sha384, Sha512};

use crate::schema::{Issue, SchemaResult};

/// The closed set of digest algorithms an MSO may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestAlgorithm {
    Sha256,
    Sha384,
    Sha512,
}

impl DigestAlgorithm {
    pub fn parse(label: &str) -> SchemaResult<Self> {
        match label {
            "SHA-256" => Ok(DigestAlgorithm::Sha256),
            "SHA-384" => Ok(DigestAlgorithm::Sha384),
            "SHA-512" => Ok(DigestAlgorithm::Sha512),
            other => Err(vec![Issue::root(format!(
                "unsupported digestAlgorithm '{other}', expected one of SHA-256, SHA-384, SHA-512"
            ))]),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DigestAlgorithm::Sha256 => "SHA-256",
            DigestAlgorithm::Sha384 => "SHA-384",
            DigestAlgorithm::Sha512 => "SHA-512",
        }
    }

    pub fn digest(self, bytes: &[u8]) -> Vec<u8> {
        match self {
            DigestAlgorithm::Sha256 => Sha256::digest(bytes).to_vec(),
            DigestAlgorithm::Sha384 => Sha384::digest(bytes).to_vec(),
            DigestAlgorithm::Sha512 => Sha512::digest(bytes).to_vec(),
        }
    }
}
