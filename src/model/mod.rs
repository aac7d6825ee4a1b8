//! Typed domain views over `IssuerSigned`, `MobileSecurityObject`, `DeviceSigned`, and `Document`.
//!
//! Each type's `parse` constructor is the only place type coercion happens; once parsed, the
//! invariants from the data model (non-empty identifiers, minimum random length, and so on)
//! hold for the lifetime of the value.

mod document;
mod mso;

pub use document::{DeviceAuth, DeviceSigned, Document, IssuerNameSpaces, IssuerSigned, IssuerSignedItem, TaggedItem};
pub use mso::{DeviceKeyInfo, MobileSecurityObject, ValidityInfo, ValueDigests};

/// A disclosed-claim namespace, e.g. `"org.iso.18013.5.1"`.
pub type NameSpace = String;
/// The identifier of a single data element within a namespace, e.g. `"given_name"`.
pub type DataElementIdentifier = String;
/// A data element's decoded value: any CBOR value, kept untyped past the schema layer.
pub type DataElementValue = ciborium::Value;
