//! CBOR codec adapter: decode bytes to [`ciborium::Value`] preserving tag fidelity, and
//! encode back using `ciborium`'s deterministic write path.

use ciborium::Value;

use crate::error::{Error, ErrorCode};

/// Decodes a single CBOR item from `bytes`. Trailing bytes are an error: the schema
/// kernel always operates on exactly one encoded item at a time.
pub fn decode(bytes: &[u8]) -> Result<Value, Error> {
    let mut cursor = bytes;
    let value: Value =
        ciborium::de::from_reader(&mut cursor).map_err(|e| Error::with_cause(ErrorCode::CborDecodingError, e))?;
    if !cursor.is_empty() {
        return Err(Error::with_cause(
            ErrorCode::CborDecodingError,
            "trailing bytes after decoded CBOR item",
        ));
    }
    Ok(value)
}

/// Encodes `value` deterministically (`ciborium`'s canonical write path).
pub fn encode(value: &Value) -> Vec<u8> {
    let mut out = Vec::new();
    ciborium::ser::into_writer(value, &mut out).expect("Value always serializes");
    out
}

/// Wraps `inner` bytes in a CBOR Tag 24 (embedded CBOR) value.
pub fn tag24_bytes(inner: Vec<u8>) -> Value {
    Value::Tag(24, Box::new(Value::Bytes(inner)))
}

/// Encodes `inner` and wraps the result in Tag 24, returning the full encoded Tag-24 value
/// (tag header included) — the exact bytes that digest/signature computations operate on.
pub fn tag24_encode(inner: &Value) -> Vec<u8> {
    encode(&tag24_bytes(encode(inner)))
}
