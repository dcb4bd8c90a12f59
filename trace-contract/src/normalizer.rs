//! Claim normalizer.
//!
//! Copies a raw claim field-for-field and overlays the small alias set the
//! renderer relies on. It fills gaps between equivalent keys; it never
//! overwrites a non-null value and never invents one.

use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

use crate::schema::{ChangeType, Decision};
use crate::strict;

/// Key pairs that name the same datum across producer generations.
/// The first key is canonical.
const ALIASES: &[(&str, &str)] = &[
    ("id", "claim_id"),
    ("statement", "text"),
    ("mechanism_topology", "graph"),
];

/// Legacy flags either of which marks a claim as verified.
const VERIFIED_FLAGS: &[&str] = &["is_verified", "human_verified"];

/// One normalized claim.
///
/// Serializes as the underlying field map, so every raw key survives into
/// the renderer payload. Typed accessors read through the strict helpers.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Claim {
    fields: Map<String, Value>,
}

impl Claim {
    /// All fields, raw keys plus aliases.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn id(&self) -> Option<String> {
        match strict::field(&self.fields, "id")? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    pub fn statement(&self) -> Option<String> {
        strict::strict_str(&self.fields, "statement")
    }

    pub fn domain(&self) -> Option<String> {
        strict::strict_str(&self.fields, "domain")
    }

    /// Mechanism steps, either a bare array or `mechanism.steps`.
    pub fn mechanism_steps(&self) -> Option<&[Value]> {
        match strict::field(&self.fields, "mechanism")? {
            Value::Array(steps) => Some(steps.as_slice()),
            Value::Object(mechanism) => strict::field(mechanism, "steps")?
                .as_array()
                .map(Vec::as_slice),
            _ => None,
        }
    }

    /// Nodes of the mechanism topology graph.
    pub fn topology_nodes(&self) -> Option<&[Value]> {
        let topology = strict::field(&self.fields, "mechanism_topology")?.as_object()?;
        strict::field(topology, "nodes")?
            .as_array()
            .map(Vec::as_slice)
    }

    /// Whether the claim carries at least one mechanism step or node.
    pub fn has_mechanism(&self) -> bool {
        self.mechanism_steps().is_some_and(|s| !s.is_empty())
            || self.topology_nodes().is_some_and(|n| !n.is_empty())
    }

    pub fn evidence(&self) -> Option<&[Value]> {
        strict::field(&self.fields, "evidence")?
            .as_array()
            .map(Vec::as_slice)
    }

    pub fn verification_level(&self) -> Option<String> {
        strict::strict_str(&self.fields, "verification_level")
    }

    /// Importance score, expected in `0..=1`.
    pub fn importance(&self) -> Option<f64> {
        strict::strict_f64(&self.fields, "importance")
    }

    /// Confidence, expected in `0..=1`; `None` when the producer sent null.
    pub fn confidence(&self) -> Option<f64> {
        strict::strict_f64(&self.fields, "confidence")
    }

    pub fn decision(&self) -> Option<Decision> {
        Decision::parse(strict::field(&self.fields, "decision")?.as_str()?)
    }

    pub fn change_type(&self) -> Option<ChangeType> {
        ChangeType::parse(strict::field(&self.fields, "change_type")?.as_str()?)
    }

    pub fn verified(&self) -> Option<bool> {
        strict::strict_bool(&self.fields, "verified")
    }

    /// Stable external identifiers cited by the claim's evidence
    /// (`doi:...`, `pmid:...`), in order of appearance, deduplicated.
    pub fn stable_refs(&self) -> Vec<String> {
        let mut refs: Vec<String> = Vec::new();
        for item in self.evidence().unwrap_or_default() {
            let Some(entry) = item.as_object() else {
                continue;
            };
            for scheme in ["doi", "pmid"] {
                if let Some(value) = strict::strict_str(entry, scheme) {
                    let key = format!("{scheme}:{}", value.trim());
                    if !value.trim().is_empty() && !refs.contains(&key) {
                        refs.push(key);
                    }
                }
            }
        }
        refs
    }
}

/// Normalize one raw claim. `None` and `null` in, `None` out.
pub fn normalize(raw: Option<&Value>) -> Option<Claim> {
    let source = match strict::strict_value(raw)? {
        Value::Object(map) => map,
        other => {
            tracing::debug!(kind = json_kind(other), "Skipping non-object claim");
            return None;
        }
    };

    let mut fields = source.clone();
    for (canonical, alternate) in ALIASES {
        unify_alias(&mut fields, canonical, alternate);
    }
    derive_verified(&mut fields);

    for key in preservation_violations(source, &fields) {
        tracing::error!(
            key = key.as_str(),
            "Claim normalizer dropped a non-null field; restoring it"
        );
        if let Some(value) = source.get(&key) {
            fields.insert(key, value.clone());
        }
    }

    Some(Claim { fields })
}

/// Keys that are non-null in `raw` but missing or null in `normalized`.
/// Empty on every correct normalization.
pub fn preservation_violations(
    raw: &Map<String, Value>,
    normalized: &Map<String, Value>,
) -> Vec<String> {
    raw.iter()
        .filter(|(_, value)| !value.is_null())
        .filter(|(key, _)| strict::field(normalized, key).is_none())
        .map(|(key, _)| key.clone())
        .collect()
}

fn unify_alias(fields: &mut Map<String, Value>, canonical: &str, alternate: &str) {
    let resolved = strict::field(fields, canonical)
        .or_else(|| strict::field(fields, alternate))
        .cloned();
    let Some(value) = resolved else {
        return;
    };
    for key in [canonical, alternate] {
        if strict::field(fields, key).is_none() {
            fields.insert(key.to_string(), value.clone());
        }
    }
}

fn derive_verified(fields: &mut Map<String, Value>) {
    if strict::field(fields, "verified").is_some() {
        return;
    }
    let flags: Vec<bool> = VERIFIED_FLAGS
        .iter()
        .filter_map(|flag| strict::strict_bool(fields, flag))
        .collect();
    if flags.is_empty() {
        return;
    }
    fields.insert(
        "verified".to_string(),
        Value::Bool(flags.iter().any(|f| *f)),
    );
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
