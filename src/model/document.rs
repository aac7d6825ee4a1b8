use ciborium::Value;
use coset::{AsCborValue, CoseSign1};
use indexmap::IndexMap;

use crate::cbor;
use crate::model::NameSpace;
use crate::schema::{
    array, bytes_min_len, non_empty_text, tagged, uint, Issue, MapCursor, SchemaResult,
};

/// A single issuer-signed data element: digest id, random salt, identifier, and value,
/// together with the raw Tag-24 bytes it was decoded from (needed for digest recomputation).
#[derive(Debug, Clone)]
pub struct IssuerSignedItem {
    pub digest_id: u64,
    pub random: Vec<u8>,
    pub element_identifier: String,
    pub element_value: Value,
}

impl IssuerSignedItem {
    pub fn parse(value: &Value) -> SchemaResult<Self> {
        let mut cursor = MapCursor::new("IssuerSignedItem", value)?;
        let digest_id = cursor.required("digestID", uint);
        let random = cursor.required("random", |v| bytes_min_len(v, 16));
        let element_identifier = cursor.required("elementIdentifier", non_empty_text);
        let element_value = cursor.required("elementValue", |v| Ok(v.clone()));
        cursor.finish_strict()?;
        Ok(IssuerSignedItem {
            digest_id: digest_id.expect("present: finish_strict would have failed otherwise"),
            random: random.expect("present: finish_strict would have failed otherwise"),
            element_identifier: element_identifier.expect("present: finish_strict would have failed otherwise"),
            element_value: element_value.expect("present: finish_strict would have failed otherwise"),
        })
    }
}

/// An issuer-signed element as it appears on the wire: a Tag(24, bytes) value whose inner
/// bytes CBOR-decode to an [`IssuerSignedItem`]. `tag24_bytes` is the exact encoding
/// (tag header included) that digest verification hashes.
#[derive(Debug, Clone)]
pub struct TaggedItem {
    pub tag24_bytes: Vec<u8>,
    pub item: IssuerSignedItem,
}

impl TaggedItem {
    pub fn parse(value: &Value) -> SchemaResult<Self> {
        let inner_bytes_value = tagged(value, 24)?;
        let inner_bytes = crate::schema::bytes(inner_bytes_value)?;
        let inner_value = cbor::decode(&inner_bytes)
            .map_err(|e| vec![Issue::root(format!("CBOR decoding of Tag-24 item failed: {e}"))])?;
        let item = IssuerSignedItem::parse(&inner_value)?;
        Ok(TaggedItem {
            tag24_bytes: cbor::encode(value),
            item,
        })
    }
}

/// `NameSpace -> ordered sequence of Tag(24, IssuerSignedItem)`.
pub type IssuerNameSpaces = IndexMap<NameSpace, Vec<TaggedItem>>;

fn parse_issuer_name_spaces(value: &Value) -> SchemaResult<IssuerNameSpaces> {
    let Value::Map(namespaces) = value else {
        return Err(vec![Issue::root(crate::schema::not_map_message("IssuerNameSpaces", value))]);
    };
    let mut result = IndexMap::with_capacity(namespaces.len());
    for (ns_key, items_value) in namespaces {
        let ns = crate::schema::text(ns_key).map_err(|issues| vec![Issue::root(issues[0].message.clone())])?;
        let items = array(items_value).map_err(|issues| prefix_at(&ns, issues))?;
        let mut parsed_items = Vec::with_capacity(items.len());
        for (index, item_value) in items.iter().enumerate() {
            let parsed = TaggedItem::parse(item_value).map_err(|issues| prefix_at(&format!("{ns}[{index}]"), issues))?;
            parsed_items.push(parsed);
        }
        result.insert(ns, parsed_items);
    }
    Ok(result)
}

fn prefix_at(segment: &str, issues: crate::schema::IssueList) -> crate::schema::IssueList {
    issues
        .into_iter()
        .map(|issue| {
            let mut path = vec![segment.to_string()];
            path.extend(issue.path);
            Issue::new(path, issue.message)
        })
        .collect()
}

/// `{ nameSpaces: IssuerNameSpaces, issuerAuth: Tag(18, Sign1Tuple) }`.
///
/// Both fields are modeled as optional, matching [`Document`]: the issuer verifier's
/// first step owns the `IssuerNameSpacesMissing` / `IssuerAuthMissing` distinction.
#[derive(Debug, Clone, Default)]
pub struct IssuerSigned {
    pub name_spaces: Option<IssuerNameSpaces>,
    pub issuer_auth: Option<CoseSign1>,
}

impl IssuerSigned {
    pub fn parse(value: &Value) -> SchemaResult<Self> {
        let mut cursor = MapCursor::new("IssuerSigned", value)?;
        let name_spaces = cursor.optional("nameSpaces", parse_issuer_name_spaces);
        let issuer_auth = cursor.optional("issuerAuth", |v| {
            let inner = tagged(v, 18)?;
            CoseSign1::from_cbor_value(inner.clone()).map_err(|e| vec![Issue::root(format!("invalid COSE_Sign1: {e}"))])
        });
        cursor.finish_semi_strict()?;
        Ok(IssuerSigned { name_spaces, issuer_auth })
    }
}

/// `DeviceAuth`: the raw `deviceSignature`/`deviceMac` entries, still undecoded. The device
/// verifier rejects `deviceMac` after confirming it actually decodes as a COSE_Mac0 (so the
/// failure is "unsupported mode", not "malformed input").
#[derive(Debug, Clone, Default)]
pub struct DeviceAuth {
    pub device_signature: Option<Value>,
    pub device_mac: Option<Value>,
}

impl DeviceAuth {
    pub fn parse(value: &Value) -> SchemaResult<Self> {
        let mut cursor = MapCursor::new("DeviceAuth", value)?;
        let device_signature = cursor.optional("deviceSignature", |v| Ok(v.clone()));
        let device_mac = cursor.optional("deviceMac", |v| Ok(v.clone()));
        cursor.finish_strict()?;
        Ok(DeviceAuth {
            device_signature,
            device_mac,
        })
    }
}

/// `{ nameSpaces: Tag(24, CBOR(map<NameSpace, map<Elem, any>>)), deviceAuth: DeviceAuth }`.
///
/// `name_spaces_tag24` is kept as the original [`ciborium::Value`] (still `Tag(24, ...)`) so
/// that the device verifier can reuse its exact original bytes in `DeviceAuthentication`.
/// Both fields are optional: the device verifier's extraction step owns the
/// `DeviceNameSpacesMissing` / `DeviceAuthMissing` distinction.
#[derive(Debug, Clone, Default)]
pub struct DeviceSigned {
    pub name_spaces_tag24: Option<Value>,
    pub device_auth: Option<DeviceAuth>,
}

impl DeviceSigned {
    pub fn parse(value: &Value) -> SchemaResult<Self> {
        let mut cursor = MapCursor::new("DeviceSigned", value)?;
        let name_spaces_tag24 = cursor.optional("nameSpaces", |v| {
            tagged(v, 24)?;
            Ok(v.clone())
        });
        let device_auth = cursor.optional("deviceAuth", DeviceAuth::parse);
        cursor.finish_semi_strict()?;
        Ok(DeviceSigned { name_spaces_tag24, device_auth })
    }
}

/// `{ docType: Text, issuerSigned: IssuerSigned, deviceSigned?: DeviceSigned }`.
///
/// Fields are modeled as optional here even though the data model calls them required: the
/// verifiers are the layer that turns "missing docType" etc. into the specific
/// `*Missing` error codes (see the device verifier's ordered extraction steps), so the
/// schema layer stays lenient and defers that judgment.
#[derive(Debug, Clone, Default)]
pub struct Document {
    pub doc_type: Option<String>,
    pub issuer_signed: Option<IssuerSigned>,
    pub device_signed: Option<DeviceSigned>,
}

impl Document {
    pub fn parse(value: &Value) -> SchemaResult<Self> {
        let mut cursor = MapCursor::new("Document", value)?;
        let doc_type = cursor.optional("docType", non_empty_text);
        let issuer_signed = cursor.optional("issuerSigned", IssuerSigned::parse);
        let device_signed = cursor.optional("deviceSigned", DeviceSigned::parse);
        cursor.finish_semi_strict()?;
        Ok(Document {
            doc_type,
            issuer_signed,
            device_signed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_issuer_signed_item() {
        let value = Value::Map(vec![
            (Value::Text("digestID".into()), Value::Integer(0.into())),
            (Value::Text("random".into()), Value::Bytes(vec![0u8; 16])),
            (Value::Text("elementIdentifier".into()), Value::Text("given_name".into())),
            (Value::Text("elementValue".into()), Value::Text("Alice".into())),
        ]);
        let item = IssuerSignedItem::parse(&value).unwrap();
        assert_eq!(item.element_identifier, "given_name");
        assert_eq!(item.digest_id, 0);
    }

    #[test]
    fn rejects_short_random() {
        let value = Value::Map(vec![
            (Value::Text("digestID".into()), Value::Integer(0.into())),
            (Value::Text("random".into()), Value::Bytes(vec![0u8; 4])),
            (Value::Text("elementIdentifier".into()), Value::Text("given_name".into())),
            (Value::Text("elementValue".into()), Value::Text("Alice".into())),
        ]);
        assert!(IssuerSignedItem::parse(&value).is_err());
    }

    #[test]
    fn document_with_missing_device_signed_still_parses() {
        let value = Value::Map(vec![(Value::Text("docType".into()), Value::Text("org.iso.18013.5.1.mDL".into()))]);
        let document = Document::parse(&value).unwrap();
        assert!(document.device_signed.is_none());
        assert_eq!(document.doc_type.as_deref(), Some("org.iso.18013.5.1.mDL"));
    }
}
