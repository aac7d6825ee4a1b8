//! Verification core for ISO/IEC 18013-5 mobile documents (mdoc/mDL).
//!
//! This crate covers the verification half of the mdoc lifecycle: schema-validated CBOR
//! decoding, issuer verification (X.509 chain, COSE_Sign1 over the MSO, value-digest
//! recomputation, validity-window enforcement), and device verification (device-key
//! extraction, `DeviceAuthentication` reconstruction, detached COSE_Sign1 verification).
//! It never issues or holds mdocs, and never builds X.509 path-validation policy beyond a
//! caller-provided chain and trust anchors.

pub mod cbor;
pub mod cose;
pub mod datetime;
pub mod device;
pub mod digest;
pub mod error;
pub mod issuer;
pub mod model;
pub mod schema;
pub mod x509;

pub use device::{verify_device_signed_document, SessionTranscript};
pub use error::{Error, ErrorCode, ErrorCodeError, ErrorsError, Result};
pub use issuer::{default_clock_skew, verify_issuer_signed, verify_issuer_signed_documents, BatchIssuerVerified, IssuerVerified, DEFAULT_CLOCK_SKEW_SECONDS};
pub use model::Document;
pub use x509::TrustAnchor;
