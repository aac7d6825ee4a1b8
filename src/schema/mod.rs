//! Schema kernel: strict-map / semi-strict-map / tuple / tagged-value validators that
//! parse decoded CBOR into typed domain objects, emitting path-aware diagnostics.
//!
//! Every validator here returns `Result<T, IssueList>`. A [`Path`] is threaded through
//! by construction (each [`MapCursor`]/tuple call prepends exactly one segment), so
//! a nested failure's dotted path never duplicates a prefix: see [`Issue::render`].

use ciborium::value::Value;

/// One segment of a path from the root target to an offending leaf.
pub type PathSegment = String;
pub type Path = Vec<PathSegment>;

/// A single diagnostic: the concrete dotted path to the offending value, and what's wrong.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    pub path: Path,
    pub message: String,
}

impl Issue {
    pub fn new(path: Path, message: impl Into<String>) -> Self {
        Issue {
            path,
            message: message.into(),
        }
    }

    pub fn root(message: impl Into<String>) -> Self {
        Issue::new(Vec::new(), message)
    }

    pub fn dotted_path(&self) -> String {
        self.path.join(".")
    }

    /// The only place that stringifies a path: `"{dotted.path}: {message}"`, or just the
    /// message at the root. Because `path` is built up exactly once per nesting level,
    /// this never duplicates a segment.
    pub fn render(&self) -> String {
        if self.path.is_empty() {
            self.message.clone()
        } else {
            format!("{}: {}", self.dotted_path(), self.message)
        }
    }

    fn prefixed(mut self, segment: &str) -> Self {
        self.path.insert(0, segment.to_string());
        self
    }
}

pub type IssueList = Vec<Issue>;
pub type SchemaResult<T> = Result<T, IssueList>;

fn prefix_issues(issues: IssueList, segment: &str) -> IssueList {
    issues.into_iter().map(|issue| issue.prefixed(segment)).collect()
}

/// Runs a child parser and prefixes every issue it returns with `segment`. Every
/// composite validator below (map, tuple, tagged value) uses this so that a path is
/// accumulated exactly once per level of nesting.
pub fn nested<T>(segment: &str, result: SchemaResult<T>) -> SchemaResult<T> {
    result.map_err(|issues| prefix_issues(issues, segment))
}

/// Human-readable name of a decoded CBOR value's shape, for error messages.
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Integer(_) => "integer",
        Value::Bytes(_) => "bytes",
        Value::Float(_) => "float",
        Value::Text(_) => "text",
        Value::Bool(_) => "bool",
        Value::Null => "null",
        Value::Tag(_, _) => "tag",
        Value::Array(_) => "array",
        Value::Map(_) => "map",
        _ => "unknown",
    }
}

pub fn invalid_type_message(expected: &str, value: &Value) -> String {
    format!("Expected {expected}, received {}", type_name(value))
}

/// `notMapMessage(target, actualType)`: the target is the entity name being parsed
/// (e.g. `"MobileSecurityObject"`), not a field name — field names are carried by `Path`.
pub fn not_map_message(target: &str, value: &Value) -> String {
    format!("{target}: Expected a map, received {}", type_name(value))
}

pub fn empty_message() -> String {
    "must not be empty".to_string()
}

pub fn too_few_message(min: usize, actual: usize) -> String {
    format!("expected at least {min} item(s), received {actual}")
}

pub fn too_many_message(max: usize, actual: usize) -> String {
    format!("expected at most {max} item(s), received {actual}")
}

/// `missingKeys(target, keys)`.
pub fn missing_keys_message(target: &str, keys: &[&str]) -> String {
    format!("{target}: missing required key(s): {}", keys.join(", "))
}

/// Not a message function named directly in spec.md's vocabulary, but follows the same
/// `{target}: ...` shape as `missingKeys`/`notMapMessage` for consistency.
pub fn unexpected_keys_message(target: &str, keys: &[String]) -> String {
    format!("{target}: unexpected key(s): {}", keys.join(", "))
}

/// A map key as it appears on the wire: either a text key (domain schemas) or an
/// integer key (COSE header maps).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MapKey {
    Text(String),
    Int(i128),
}

impl MapKey {
    fn from_value(value: &Value) -> Option<MapKey> {
        match value {
            Value::Text(s) => Some(MapKey::Text(s.clone())),
            Value::Integer(i) => Some(MapKey::Int((*i).into())),
            _ => None,
        }
    }

    pub fn display(&self) -> String {
        match self {
            MapKey::Text(s) => s.clone(),
            MapKey::Int(i) => i.to_string(),
        }
    }
}

/// Cursor over a decoded CBOR map, used to implement `StrictMap`/`SemiStrictMap`.
///
/// Call [`MapCursor::new`], then [`required`](MapCursor::required)/[`optional`](MapCursor::optional)
/// once per declared key (consuming it from the cursor), then finish with
/// [`finish_strict`](MapCursor::finish_strict) (no extra keys allowed) or
/// [`finish_semi_strict`](MapCursor::finish_semi_strict) (extra keys returned verbatim).
pub struct MapCursor<'a> {
    target: &'static str,
    entries: Vec<(MapKey, &'a Value)>,
    opaque: Vec<(&'a Value, &'a Value)>,
    issues: IssueList,
}

impl<'a> MapCursor<'a> {
    /// Builds a cursor from `value`, which must be a CBOR map; otherwise returns a
    /// single `notMapMessage(target, ...)` issue at the root. `target` is the entity
    /// name (e.g. `"MobileSecurityObject"`) that every message this cursor produces is
    /// scoped to, per spec.md §4.2's `containerInvalidTypeMessage`/`missingKeys` vocabulary.
    pub fn new(target: &'static str, value: &'a Value) -> SchemaResult<Self> {
        let Value::Map(entries) = value else {
            return Err(vec![Issue::root(not_map_message(target, value))]);
        };
        let mut keyed = Vec::with_capacity(entries.len());
        let mut opaque = Vec::new();
        for (k, v) in entries {
            match MapKey::from_value(k) {
                Some(key) => keyed.push((key, v)),
                None => opaque.push((k, v)),
            }
        }
        Ok(MapCursor {
            target,
            entries: keyed,
            opaque,
            issues: Vec::new(),
        })
    }

    fn take(&mut self, key: &str) -> Option<&'a Value> {
        let position = self
            .entries
            .iter()
            .position(|(k, _)| matches!(k, MapKey::Text(s) if s == key));
        position.map(|i| self.entries.remove(i).1)
    }

    fn take_int(&mut self, key: i128) -> Option<&'a Value> {
        let position = self.entries.iter().position(|(k, _)| matches!(k, MapKey::Int(i) if *i == key));
        position.map(|i| self.entries.remove(i).1)
    }

    /// Parses a required text-keyed field with `parse`, prefixing any issues with `key`.
    /// Records a `missing_keys_message` issue (and returns `None`) if the field is absent.
    pub fn required<T>(&mut self, key: &str, parse: impl FnOnce(&'a Value) -> SchemaResult<T>) -> Option<T> {
        match self.take(key) {
            Some(value) => match nested(key, parse(value)) {
                Ok(parsed) => Some(parsed),
                Err(mut issues) => {
                    self.issues.append(&mut issues);
                    None
                }
            },
            None => {
                self.issues.push(Issue::root(missing_keys_message(self.target, &[key])));
                None
            }
        }
    }

    /// Parses an optional text-keyed field with `parse`. Absence is not an error.
    pub fn optional<T>(&mut self, key: &str, parse: impl FnOnce(&'a Value) -> SchemaResult<T>) -> Option<T> {
        match self.take(key) {
            Some(value) => match nested(key, parse(value)) {
                Ok(parsed) => Some(parsed),
                Err(mut issues) => {
                    self.issues.append(&mut issues);
                    None
                }
            },
            None => None,
        }
    }

    /// Parses a required integer-keyed field (COSE header maps use small integer keys).
    pub fn required_int<T>(&mut self, key: i128, parse: impl FnOnce(&'a Value) -> SchemaResult<T>) -> Option<T> {
        match self.take_int(key) {
            Some(value) => match nested(&key.to_string(), parse(value)) {
                Ok(parsed) => Some(parsed),
                Err(mut issues) => {
                    self.issues.append(&mut issues);
                    None
                }
            },
            None => {
                self.issues.push(Issue::root(missing_keys_message(self.target, &[&key.to_string()])));
                None
            }
        }
    }

    pub fn optional_int<T>(&mut self, key: i128, parse: impl FnOnce(&'a Value) -> SchemaResult<T>) -> Option<T> {
        match self.take_int(key) {
            Some(value) => match nested(&key.to_string(), parse(value)) {
                Ok(parsed) => Some(parsed),
                Err(mut issues) => {
                    self.issues.append(&mut issues);
                    None
                }
            },
            None => None,
        }
    }

    /// `StrictMap`: fails if any keys remain unconsumed (declared-but-absent keys were
    /// already reported by `required`; this only reports *additional*, undeclared keys).
    pub fn finish_strict(mut self) -> SchemaResult<()> {
        let leftover: Vec<String> = self
            .entries
            .iter()
            .map(|(k, _)| k.display())
            .chain(self.opaque.iter().map(|_| "<non-string/int key>".to_string()))
            .collect();
        if !leftover.is_empty() {
            self.issues.push(Issue::root(unexpected_keys_message(self.target, &leftover)));
        }
        if self.issues.is_empty() {
            Ok(())
        } else {
            Err(self.issues)
        }
    }

    /// `SemiStrictMap`: extra keys are retained verbatim instead of rejected.
    pub fn finish_semi_strict(self) -> SchemaResult<Vec<(Value, Value)>> {
        if !self.issues.is_empty() {
            return Err(self.issues);
        }
        let mut rest: Vec<(Value, Value)> = self
            .entries
            .into_iter()
            .map(|(k, v)| {
                let key_value = match k {
                    MapKey::Text(s) => Value::Text(s),
                    MapKey::Int(i) => Value::Integer(i.try_into().expect("round-trips through the same range as the original CBOR integer")),
                };
                (key_value, v.clone())
            })
            .collect();
        rest.extend(self.opaque.into_iter().map(|(k, v)| (k.clone(), v.clone())));
        Ok(rest)
    }
}

/// `Tuple(target, itemSchemas)`: input must be an array of exactly `N` elements.
pub fn tuple(value: &Value, len: usize) -> SchemaResult<&[Value]> {
    let Value::Array(items) = value else {
        return Err(vec![Issue::root(invalid_type_message("array", value))]);
    };
    if items.len() != len {
        let message = if items.len() < len {
            too_few_message(len, items.len())
        } else {
            too_many_message(len, items.len())
        };
        return Err(vec![Issue::root(message)]);
    }
    Ok(items)
}

/// Non-empty array, any length.
pub fn array(value: &Value) -> SchemaResult<&[Value]> {
    match value {
        Value::Array(items) => Ok(items),
        other => Err(vec![Issue::root(invalid_type_message("array", other))]),
    }
}

/// `TaggedValue(target, tagNumber, innerSchema)`: input must carry exactly `tag`.
pub fn tagged(value: &Value, tag: u64) -> SchemaResult<&Value> {
    match value {
        Value::Tag(t, inner) if *t == tag => Ok(inner),
        Value::Tag(t, _) => Err(vec![Issue::root(format!("Expected tag {tag}, received tag {t}"))]),
        other => Err(vec![Issue::root(format!(
            "Expected tag {tag}, received {}",
            type_name(other)
        ))]),
    }
}

pub fn bytes(value: &Value) -> SchemaResult<Vec<u8>> {
    match value {
        Value::Bytes(b) => Ok(b.clone()),
        other => Err(vec![Issue::root(invalid_type_message("bytes", other))]),
    }
}

pub fn bytes_min_len(value: &Value, min_len: usize) -> SchemaResult<Vec<u8>> {
    let b = bytes(value)?;
    if b.len() < min_len {
        return Err(vec![Issue::root(format!(
            "expected at least {min_len} byte(s), received {}",
            b.len()
        ))]);
    }
    Ok(b)
}

pub fn text(value: &Value) -> SchemaResult<String> {
    match value {
        Value::Text(s) => Ok(s.clone()),
        other => Err(vec![Issue::root(invalid_type_message("text", other))]),
    }
}

pub fn non_empty_text(value: &Value) -> SchemaResult<String> {
    let s = text(value)?;
    if s.is_empty() {
        return Err(vec![Issue::root(empty_message())]);
    }
    Ok(s)
}

pub fn uint(value: &Value) -> SchemaResult<u64> {
    match value {
        Value::Integer(i) => u64::try_from(*i).map_err(|_| vec![Issue::root("expected a non-negative integer")]),
        other => Err(vec![Issue::root(invalid_type_message("uint", other))]),
    }
}
