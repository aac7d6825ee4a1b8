use ciborium::Value;
use coset::{AsCborValue, CoseKey};
use indexmap::IndexMap;

use crate::datetime::DateTime;
use crate::digest::DigestAlgorithm;
use crate::model::NameSpace;
use crate::schema::{bytes, non_empty_text, text, uint, Issue, MapCursor, SchemaResult};

/// `ValidityInfo`: the MSO's signed/validFrom/validUntil/expectedUpdate window.
///
/// `validFrom`/`validUntil` are modeled as optional even though the data model calls them
/// required: the issuer verifier's validity check (§4.6.2) owns the `ValidFromMissing` /
/// `ValidUntilMissing` distinction, so the schema layer stays lenient on exactly those two
/// fields. `expectedUpdate` is parsed (must be a valid Tag-0 date-time) but never compared
/// against `validFrom`/`validUntil` — see the crate's design notes on this open question.
#[derive(Debug, Clone)]
pub struct ValidityInfo {
    pub signed: DateTime,
    pub valid_from: Option<DateTime>,
    pub valid_until: Option<DateTime>,
    pub expected_update: Option<DateTime>,
}

impl ValidityInfo {
    pub fn parse(value: &Value) -> SchemaResult<Self> {
        let mut cursor = MapCursor::new("ValidityInfo", value)?;
        let signed = cursor.required("signed", DateTime::parse);
        let valid_from = cursor.optional("validFrom", DateTime::parse);
        let valid_until = cursor.optional("validUntil", DateTime::parse);
        let expected_update = cursor.optional("expectedUpdate", DateTime::parse);
        cursor.finish_strict()?;
        Ok(ValidityInfo {
            signed: signed.expect("present: finish_strict would have failed otherwise"),
            valid_from,
            valid_until,
            expected_update,
        })
    }
}

/// `NameSpace -> (digestID -> digest bytes)`, as declared in the MSO.
pub type ValueDigests = IndexMap<NameSpace, IndexMap<u64, Vec<u8>>>;

fn parse_value_digests(value: &Value) -> SchemaResult<ValueDigests> {
    let Value::Map(namespaces) = value else {
        return Err(vec![Issue::root(crate::schema::not_map_message("ValueDigests", value))]);
    };
    let mut result = IndexMap::with_capacity(namespaces.len());
    for (ns_key, ns_value) in namespaces {
        let ns = text(ns_key).map_err(|issues| vec![Issue::root(issues[0].message.clone())])?;
        let Value::Map(digests) = ns_value else {
            return Err(vec![Issue::new(vec![ns.clone()], crate::schema::not_map_message("ValueDigests", ns_value))]);
        };
        let mut by_id = IndexMap::with_capacity(digests.len());
        for (id_value, digest_value) in digests {
            let id = uint(id_value).map_err(|issues| prefix_at(&ns, issues))?;
            let digest = bytes(digest_value).map_err(|issues| prefix_at(&ns, issues))?;
            by_id.insert(id, digest);
        }
        result.insert(ns, by_id);
    }
    Ok(result)
}

fn prefix_at(ns: &str, issues: crate::schema::IssueList) -> crate::schema::IssueList {
    issues
        .into_iter()
        .map(|issue| {
            let mut path = vec![ns.to_string()];
            path.extend(issue.path);
            Issue::new(path, issue.message)
        })
        .collect()
}

/// `deviceKeyInfo`: the device's COSE_Key, plus whatever forward-compatible fields (e.g.
/// `keyAuthorizations`) the issuer attached — retained verbatim, never interpreted.
#[derive(Debug, Clone)]
pub struct DeviceKeyInfo {
    pub device_key: CoseKey,
    pub rest: Vec<(Value, Value)>,
}

impl DeviceKeyInfo {
    pub fn parse(value: &Value) -> SchemaResult<Self> {
        let mut cursor = MapCursor::new("DeviceKeyInfo", value)?;
        let device_key = cursor.required("deviceKey", |v| {
            CoseKey::from_cbor_value(v.clone()).map_err(|e| vec![Issue::root(format!("invalid COSE_Key: {e}"))])
        });
        let rest = cursor.finish_semi_strict()?;
        Ok(DeviceKeyInfo {
            device_key: device_key.expect("present: finish_semi_strict would have failed otherwise"),
            rest,
        })
    }
}

/// The issuer's signed manifest: digest algorithm, per-namespace value digests, device key,
/// docType, and validity window.
#[derive(Debug, Clone)]
pub struct MobileSecurityObject {
    pub version: String,
    pub digest_algorithm: DigestAlgorithm,
    pub value_digests: ValueDigests,
    pub device_key_info: DeviceKeyInfo,
    pub doc_type: String,
    pub validity_info: ValidityInfo,
}

impl MobileSecurityObject {
    pub fn parse(value: &Value) -> SchemaResult<Self> {
        let mut cursor = MapCursor::new("MobileSecurityObject", value)?;
        let version = cursor.required("version", |v| {
            let s = text(v)?;
            if s != "1.0" {
                return Err(vec![Issue::root(format!("expected version \"1.0\", received \"{s}\""))]);
            }
            Ok(s)
        });
        let digest_algorithm = cursor.required("digestAlgorithm", |v| DigestAlgorithm::parse(&text(v)?));
        let value_digests = cursor.required("valueDigests", parse_value_digests);
        let device_key_info = cursor.required("deviceKeyInfo", DeviceKeyInfo::parse);
        let doc_type = cursor.required("docType", non_empty_text);
        let validity_info = cursor.required("validityInfo", ValidityInfo::parse);
        cursor.finish_strict()?;
        Ok(MobileSecurityObject {
            version: version.expect("present: finish_strict would have failed otherwise"),
            digest_algorithm: digest_algorithm.expect("present: finish_strict would have failed otherwise"),
            value_digests: value_digests.expect("present: finish_strict would have failed otherwise"),
            device_key_info: device_key_info.expect("present: finish_strict would have failed otherwise"),
            doc_type: doc_type.expect("present: finish_strict would have failed otherwise"),
            validity_info: validity_info.expect("present: finish_strict would have failed otherwise"),
        })
    }
}
