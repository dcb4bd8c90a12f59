//! Structural rules as embedded JSON Schema (Draft 7).
//!
//! Schema generations differ only in where fields live, so the payload is
//! first projected onto its logical fields through the version's
//! [`FieldMap`](crate::schema::FieldMap); one schema per rule set then
//! covers every generation. `null` object members are dropped from the
//! projection so a `null` mandatory field reads as missing.
//!
//! Version drift, the substance contract and field gating stay in code.

use std::sync::OnceLock;

use jsonschema::error::ValidationErrorKind;
use jsonschema::{Draft, JSONSchema};
use serde_json::{Map, Value};

use crate::schema::{ExecutionMode, FieldKey};
use crate::validator::{IssueKind, TraceShape, ValidationIssue};

const SCIENTIFIC_SCHEMA: &str = include_str!("schemas/trace_scientific.schema.json");
const DISCOURSE_SCHEMA: &str = include_str!("schemas/trace_discourse.schema.json");

/// Key of the claims array in the projected document.
const CLAIMS: &str = "claims";

const ROOT_FIELDS: [FieldKey; 5] = [
    FieldKey::TraceId,
    FieldKey::RunId,
    FieldKey::Status,
    FieldKey::Mode,
    FieldKey::EpistemicStatus,
];

static SCHEMAS: OnceLock<Result<TraceSchemas, String>> = OnceLock::new();

struct TraceSchemas {
    scientific: JSONSchema,
    discourse: JSONSchema,
}

impl TraceSchemas {
    fn compile() -> Result<Self, String> {
        Ok(Self {
            scientific: compile_schema("scientific trace", SCIENTIFIC_SCHEMA)?,
            discourse: compile_schema("discourse trace", DISCOURSE_SCHEMA)?,
        })
    }

    fn for_mode(&self, mode: ExecutionMode) -> &JSONSchema {
        if mode.is_scientific() {
            &self.scientific
        } else {
            &self.discourse
        }
    }
}

fn compile_schema(name: &str, source: &str) -> Result<JSONSchema, String> {
    let value: Value = serde_json::from_str(source)
        .map_err(|e| format!("Failed to parse {name} schema: {e}"))?;
    JSONSchema::options()
        .with_draft(Draft::Draft7)
        .compile(&value)
        .map_err(|e| format!("Failed to compile {name} schema: {e}"))
}

/// Structural findings, split by severity.
#[derive(Debug, Default)]
pub(crate) struct Findings {
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

/// Check the projected payload against the schema for its rules mode.
pub(crate) fn check<'a>(raw: &'a Value, shape: &TraceShape<'a>) -> Findings {
    let mut findings = Findings::default();
    let schemas = match SCHEMAS.get_or_init(TraceSchemas::compile) {
        Ok(schemas) => schemas,
        Err(message) => {
            tracing::error!(error = %message, "Trace schemas unavailable");
            findings.errors.push(ValidationIssue::new(
                IssueKind::AdapterInternal,
                None,
                message.clone(),
            ));
            return findings;
        }
    };

    let projected = project(raw, shape);
    if let Err(errors) = schemas.for_mode(shape.rules_mode()).validate(&projected) {
        for error in errors {
            let path = pointer_segments(&error.instance_path.to_string());
            findings.record(&error.kind, &path, error.instance.as_ref(), shape);
        }
    }
    findings
}

/// Logical view of a payload: root fields and (for scientific rules) the
/// claims array, each read through the version's field map.
pub(crate) fn project<'a>(raw: &'a Value, shape: &TraceShape<'a>) -> Value {
    let mut doc = Map::new();
    for key in ROOT_FIELDS {
        if let Some(value) = key.resolve(raw, shape.fields) {
            doc.insert(key.as_str().to_string(), without_nulls(value));
        }
    }
    if shape.rules_mode().is_scientific()
        && let Some(claims) = shape.claims(raw)
    {
        doc.insert(CLAIMS.to_string(), without_nulls(claims));
    }
    Value::Object(doc)
}

/// Drop `null` object members at every depth. Array slots are kept so
/// claim indices stay aligned with the payload.
fn without_nulls(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k.clone(), without_nulls(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(without_nulls).collect()),
        other => other.clone(),
    }
}

/// Split a JSON pointer (`/claims/0/decision`) into unescaped segments.
fn pointer_segments(pointer: &str) -> Vec<String> {
    pointer
        .split('/')
        .skip(1)
        .map(|segment| segment.replace("~1", "/").replace("~0", "~"))
        .collect()
}

impl Findings {
    fn record(
        &mut self,
        kind: &ValidationErrorKind,
        path: &[String],
        instance: &Value,
        shape: &TraceShape<'_>,
    ) {
        let claims_path = shape.claims_path();
        let segments: Vec<&str> = path.iter().map(String::as_str).collect();
        match (kind, segments.as_slice()) {
            (ValidationErrorKind::Required { property }, []) => {
                let name = property.as_str().unwrap_or_default();
                if name == CLAIMS {
                    self.errors.push(ValidationIssue::new(
                        IssueKind::MissingField,
                        Some(claims_path.as_str()),
                        format!("scientific trace has no `{claims_path}` array"),
                    ));
                } else {
                    let gating = shape
                        .rules_mode()
                        .mandatory_fields()
                        .iter()
                        .any(|m| m.gating && m.key.as_str() == name);
                    self.errors.push(ValidationIssue::missing_field(name, gating));
                }
            }
            (ValidationErrorKind::Type { .. }, [CLAIMS]) => {
                self.errors.push(ValidationIssue::new(
                    IssueKind::InvalidClaimsType,
                    Some(claims_path.as_str()),
                    format!("`{claims_path}` must be an array"),
                ));
            }
            (ValidationErrorKind::Type { .. }, [CLAIMS, index]) => {
                let field = format!("claims[{index}]");
                self.warnings.push(ValidationIssue::new(
                    IssueKind::MalformedClaim,
                    Some(field.as_str()),
                    format!("{field} is not an object"),
                ));
            }
            (ValidationErrorKind::MinItems { .. }, [CLAIMS]) => {
                tracing::info!("Scientific trace carries no claims");
                self.warnings.push(ValidationIssue::new(
                    IssueKind::NoClaims,
                    Some(claims_path.as_str()),
                    "no claims found",
                ));
            }
            (ValidationErrorKind::Enum { .. }, ["mode"]) => {
                self.errors.push(ValidationIssue::new(
                    IssueKind::UnknownMode,
                    Some(FieldKey::Mode.as_str()),
                    format!("unknown execution mode {instance}"),
                ));
            }
            (ValidationErrorKind::Enum { .. }, ["status"]) => {
                self.warnings.push(ValidationIssue::new(
                    IssueKind::UnknownEnumValue,
                    Some(FieldKey::Status.as_str()),
                    format!("unknown trace status {instance}"),
                ));
            }
            (ValidationErrorKind::Enum { .. }, [CLAIMS, index, key @ ("decision" | "change_type")]) => {
                let label = key.replace('_', " ");
                self.warnings.push(ValidationIssue::new(
                    IssueKind::UnknownEnumValue,
                    Some(format!("claims[{index}].{key}").as_str()),
                    format!("unknown {label} {instance}"),
                ));
            }
            (other, _) => {
                let pointer = format!("/{}", path.join("/"));
                tracing::error!(kind = ?other, path = %pointer, "Unmapped schema violation");
                self.errors.push(ValidationIssue::new(
                    IssueKind::AdapterInternal,
                    Some(pointer.as_str()),
                    format!("unexpected schema violation at {pointer}"),
                ));
            }
        }
    }
}
