//! Strict value extraction.
//!
//! Every read of an untrusted trace field goes through these helpers. A
//! field that is absent, `null`, or of the wrong type comes back as `None`
//! and is rendered as explicit `null`. Nothing here substitutes `0`, `""`,
//! `false` or `[]` for missing data.

use serde_json::Map;
use serde_json::Value;

/// Walk a dotted path (`["scientific", "claims"]`) through nested objects.
///
/// Returns `None` as soon as a segment is missing or a parent is not an
/// object. A terminal `null` is returned as `None`.
pub fn lookup<'a>(root: &'a Value, path: &[&str]) -> Option<&'a Value> {
    let mut current = root;
    for segment in path {
        current = current.as_object()?.get(*segment)?;
    }
    strict_value(Some(current))
}

/// Collapse `null` into `None`; pass anything else through untouched.
pub fn strict_value(value: Option<&Value>) -> Option<&Value> {
    match value {
        None | Some(Value::Null) => None,
        Some(v) => Some(v),
    }
}

/// Read a non-null field from an object.
pub fn field<'a>(object: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    strict_value(object.get(key))
}

/// String field. Empty strings are kept; they are known values.
pub fn strict_str(object: &Map<String, Value>, key: &str) -> Option<String> {
    field(object, key)?.as_str().map(str::to_owned)
}

/// Numeric field as `f64`.
pub fn strict_f64(object: &Map<String, Value>, key: &str) -> Option<f64> {
    field(object, key)?.as_f64()
}

/// 2^64, the first float above every `u64`.
const U64_BOUND: f64 = 18_446_744_073_709_551_616.0;

/// Non-negative integer field. Integral floats (`3.0`) are accepted;
/// floats outside the `u64` range are unknown, not clamped.
pub fn strict_u64(object: &Map<String, Value>, key: &str) -> Option<u64> {
    let value = field(object, key)?;
    if let Some(n) = value.as_u64() {
        return Some(n);
    }
    value
        .as_f64()
        .filter(|f| f.is_finite() && *f >= 0.0 && *f < U64_BOUND && f.fract() == 0.0)
        .map(|f| f as u64)
}

/// Boolean field.
pub fn strict_bool(object: &Map<String, Value>, key: &str) -> Option<bool> {
    field(object, key)?.as_bool()
}

/// Array of strings. A non-array yields `None`; non-string entries are
/// skipped rather than stringified.
pub fn strict_string_list(object: &Map<String, Value>, key: &str) -> Option<Vec<String>> {
    let items = field(object, key)?.as_array()?;
    Some(
        items
            .iter()
            .filter_map(|item| item.as_str().map(str::to_owned))
            .collect(),
    )
}

/// Resolve a section by path and return it only if it is an object.
pub fn section<'a>(root: &'a Value, path: &[&str]) -> Option<&'a Map<String, Value>> {
    lookup(root, path)?.as_object()
}
