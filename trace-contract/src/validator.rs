//! Trace validator.
//!
//! Pure check of a raw payload against the rules of its declared schema
//! generation. Findings come back as data; nothing here fails except the
//! strict entry point, which escalates substance-contract violations.
//!
//! Rule order:
//! 1. missing payload (short-circuits)
//! 2. version drift (soft unless configured otherwise)
//! 3. mandatory fields for the execution mode
//! 4. scientific section exposes a `claims` array (skipped for discourse)
//! 5. substance contract (explanation mode only)
//! 6. warning pass, only when no errors were found
//!
//! Rules 3, 4 and the enum checks of rule 6 are embedded JSON Schema
//! documents checked by the `structure` module.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{ErrorCategory, Result, TraceContractError};
use crate::schema::{DeclaredVersion, ExecutionMode, FieldMap, SUBSTANTIVE_STATE};
use crate::strict;
use crate::structure;

/// Overall outcome of validation.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    Valid,
    Partial,
    Invalid,
}

impl ValidationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Valid => "valid",
            Self::Partial => "partial",
            Self::Invalid => "invalid",
        }
    }
}

impl std::fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of a validation finding.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// No payload at all.
    MissingPayload,
    /// Payload present but not a JSON object (or not JSON).
    MalformedPayload,
    /// A mandatory field is absent or null.
    MissingField,
    /// `claims` exists but is not an array.
    InvalidClaimsType,
    /// Mode token does not name a known execution mode.
    UnknownMode,
    /// Explanation claimed without substance.
    SubstanceContract,
    /// Declared schema version differs from the current one.
    VersionDrift,
    /// Enum-typed field carries a value outside the registry.
    UnknownEnumValue,
    /// Scientific trace with an empty claims array.
    NoClaims,
    /// A claims entry that is not an object.
    MalformedClaim,
    /// Adaptation failed internally; the trace cannot be trusted.
    AdapterInternal,
}

impl IssueKind {
    /// Whether a finding of this kind rules out presenting any claim.
    /// `MissingField` is fatal only for gating fields, decided per issue.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::MissingPayload
                | Self::MalformedPayload
                | Self::InvalidClaimsType
                | Self::SubstanceContract
                | Self::AdapterInternal
        )
    }
}

/// One validator finding.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub kind: IssueKind,
    /// Field the finding is about, when there is one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub message: String,
    /// Whether the finding rules out presenting any claim.
    #[serde(default)]
    pub fatal: bool,
    /// Set on the finding a strict pass escalated into an error.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub escalated: bool,
}

impl ValidationIssue {
    pub(crate) fn new(kind: IssueKind, field: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            kind,
            field: field.map(str::to_owned),
            message: message.into(),
            fatal: kind.is_fatal(),
            escalated: false,
        }
    }

    /// A malformed-payload error, used by the adapter for unparseable text.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(IssueKind::MalformedPayload, None, message)
    }

    /// Record an exceptional error caught at the adapter boundary.
    pub fn from_error(err: &TraceContractError) -> Self {
        let kind = match err.category() {
            ErrorCategory::SemanticContractError => IssueKind::SubstanceContract,
            ErrorCategory::MalformedPayload => IssueKind::MalformedPayload,
            _ => IssueKind::AdapterInternal,
        };
        let mut issue = Self::new(kind, None, err.to_string());
        issue.fatal = true;
        issue
    }

    pub(crate) fn missing_field(key: &str, gating: bool) -> Self {
        let mut issue = Self::new(
            IssueKind::MissingField,
            Some(key),
            format!("missing mandatory field `{key}`"),
        );
        issue.fatal = gating;
        issue
    }
}

/// Result of one validation pass.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub status: ValidationStatus,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationResult {
    fn from_issues(errors: Vec<ValidationIssue>, warnings: Vec<ValidationIssue>) -> Self {
        let status = if !errors.is_empty() {
            ValidationStatus::Invalid
        } else if !warnings.is_empty() {
            ValidationStatus::Partial
        } else {
            ValidationStatus::Valid
        };
        Self {
            valid: errors.is_empty(),
            status,
            errors,
            warnings,
        }
    }

    /// Whether any error rules out presenting claims.
    pub fn has_fatal(&self) -> bool {
        self.errors.iter().any(|e| e.fatal)
    }

    /// Whether any finding (error or warning) has the given kind.
    pub fn has_issue(&self, kind: IssueKind) -> bool {
        self.errors
            .iter()
            .chain(self.warnings.iter())
            .any(|i| i.kind == kind)
    }
}

/// Knobs for a validation pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ValidateOptions {
    /// Log every finding at debug level.
    pub dev_mode: bool,
    /// Treat version drift as an error instead of a warning.
    pub version_mismatch_is_error: bool,
}

/// The parts of a payload every stage needs, resolved once.
#[derive(Debug)]
pub struct TraceShape<'a> {
    pub declared: DeclaredVersion,
    pub fields: &'static FieldMap,
    pub mode_token: Option<&'a Value>,
    pub mode: Option<ExecutionMode>,
}

impl<'a> TraceShape<'a> {
    pub fn of(raw: &'a Value) -> Self {
        let declared = DeclaredVersion::from_payload(raw);
        let fields = declared.effective().field_map();
        let mode_token = fields.mode_token(raw);
        let mode = mode_token
            .and_then(Value::as_str)
            .and_then(ExecutionMode::parse);
        Self {
            declared,
            fields,
            mode_token,
            mode,
        }
    }

    /// Mode whose rules apply. Unknown or absent modes get the strictest list.
    pub fn rules_mode(&self) -> ExecutionMode {
        self.mode.unwrap_or(ExecutionMode::ScientificExplanation)
    }

    /// Raw `claims` value at the version's location.
    pub fn claims(&self, raw: &'a Value) -> Option<&'a Value> {
        strict::lookup(raw, self.fields.claims)
    }

    pub fn claims_path(&self) -> String {
        self.fields.claims.join(".")
    }
}

/// Validate a raw trace.
pub fn validate(raw: Option<&Value>, opts: &ValidateOptions) -> ValidationResult {
    let result = run_rules(raw, opts);
    if opts.dev_mode {
        for issue in result.errors.iter().chain(result.warnings.iter()) {
            tracing::debug!(
                kind = ?issue.kind,
                field = issue.field.as_deref().unwrap_or(""),
                fatal = issue.fatal,
                "{}",
                issue.message
            );
        }
    }
    result
}

/// Validate, escalating a substance-contract violation to an error.
///
/// The error carries the complete result, so no other finding is lost.
pub fn validate_strict(raw: Option<&Value>, opts: &ValidateOptions) -> Result<ValidationResult> {
    let mut result = validate(raw, opts);
    let Some(issue) = result
        .errors
        .iter_mut()
        .find(|e| e.kind == IssueKind::SubstanceContract)
    else {
        return Ok(result);
    };
    issue.escalated = true;
    let detail = issue.message.clone();
    let mode = raw
        .map(TraceShape::of)
        .map(|shape| shape.rules_mode().to_string())
        .unwrap_or_default();
    Err(TraceContractError::SubstanceContract {
        mode,
        detail,
        findings: Box::new(result),
    })
}

fn run_rules(raw: Option<&Value>, opts: &ValidateOptions) -> ValidationResult {
    // Rule 1
    let raw = match strict::strict_value(raw) {
        None => {
            return ValidationResult::from_issues(
                vec![ValidationIssue::new(
                    IssueKind::MissingPayload,
                    None,
                    "trace payload is missing",
                )],
                Vec::new(),
            );
        }
        Some(v) if !v.is_object() => {
            return ValidationResult::from_issues(
                vec![ValidationIssue::malformed("trace payload is not a JSON object")],
                Vec::new(),
            );
        }
        Some(v) => v,
    };

    let shape = TraceShape::of(raw);
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    // Rule 2
    if shape.declared.is_drift() {
        let token = shape.declared.token().unwrap_or_default();
        tracing::warn!(
            declared = token,
            current = crate::schema::CURRENT_SCHEMA_VERSION,
            "Trace schema version drift"
        );
        let issue = ValidationIssue::new(
            IssueKind::VersionDrift,
            Some(crate::schema::SCHEMA_VERSION_KEY),
            format!(
                "declared schema version {token} differs from supported {}",
                crate::schema::CURRENT_SCHEMA_VERSION
            ),
        );
        if opts.version_mismatch_is_error {
            errors.push(issue);
        } else {
            warnings.push(issue);
        }
    }

    // Rules 3 and 4
    let structural = structure::check(raw, &shape);
    errors.extend(structural.errors);

    // Rule 5
    if shape.mode.is_some_and(|m| m.asserts_explanation()) {
        let failures = substance_failures(raw, shape.fields);
        if !failures.is_empty() {
            errors.push(ValidationIssue::new(
                IssueKind::SubstanceContract,
                Some(shape.fields.metrics.join(".").as_str()),
                format!(
                    "explanation mode requires substantive metrics: {}",
                    failures.join("; ")
                ),
            ));
        }
    }

    // Rule 6
    if errors.is_empty() {
        warnings.extend(structural.warnings);
    }

    ValidationResult::from_issues(errors, warnings)
}

/// Why the metrics fail the substance contract; empty when they pass.
fn substance_failures(raw: &Value, fields: &FieldMap) -> Vec<String> {
    let Some(metrics) = strict::section(raw, fields.metrics) else {
        return vec![format!("`{}` section is missing", fields.metrics.join("."))];
    };

    let mut failures = Vec::new();
    match strict::strict_str(metrics, "substance_state") {
        Some(state) if state == SUBSTANTIVE_STATE => {}
        Some(state) => failures.push(format!("substance_state is {state:?}")),
        None => failures.push("substance_state is missing".to_string()),
    }
    for key in [fields.anchor_count_key, "biological_claim_count"] {
        match strict::strict_u64(metrics, key) {
            Some(0) => failures.push(format!("{key} is 0")),
            Some(_) => {}
            None => failures.push(format!("{key} is missing")),
        }
    }
    failures
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn opts() -> ValidateOptions {
        ValidateOptions::default()
    }

    fn explanation_trace() -> Value {
        json!({
            "schema_version": "3.0",
            "trace_id": "tr-1",
            "run_id": "run-1",
            "status": "completed",
            "epistemic_status": "supported",
            "execution_profile": {"mode": "scientific_explanation"},
            "scientific": {
                "claims": [{"id": "c-1", "statement": "TNF drives inflammation"}],
                "internal_metrics": {
                    "substance_state": "substantive",
                    "anchor_count": 4,
                    "biological_claim_count": 1
                }
            }
        })
    }

    #[test]
    fn test_null_payload_single_error() {
        let result = validate(None, &opts());
        assert!(!result.valid);
        assert_eq!(result.status, ValidationStatus::Invalid);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].kind, IssueKind::MissingPayload);

        let result = validate(Some(&Value::Null), &opts());
        assert_eq!(result.errors.len(), 1);
    }

    #[test]
    fn test_non_object_payload() {
        let result = validate(Some(&json!([1, 2, 3])), &opts());
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].kind, IssueKind::MalformedPayload);
        assert!(result.has_fatal());
    }

    #[test]
    fn test_complete_explanation_is_valid() {
        let result = validate(Some(&explanation_trace()), &opts());
        assert_eq!(result.status, ValidationStatus::Valid, "{result:?}");
        assert!(result.errors.is_empty());
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_missing_run_id_named() {
        let mut trace = explanation_trace();
        if let Some(obj) = trace.as_object_mut() {
            obj.remove("run_id");
        }
        let result = validate(Some(&trace), &opts());
        assert_eq!(result.status, ValidationStatus::Invalid);
        assert!(
            result
                .errors
                .iter()
                .any(|e| e.field.as_deref() == Some("run_id"))
        );
        assert!(!result.has_fatal());
    }

    #[test]
    fn test_missing_epistemic_status_is_fatal() {
        let mut trace = explanation_trace();
        if let Some(obj) = trace.as_object_mut() {
            obj.insert("epistemic_status".into(), Value::Null);
        }
        let result = validate(Some(&trace), &opts());
        assert!(result.has_fatal());
    }

    #[test]
    fn test_zero_anchor_count_is_substance_error() {
        let mut trace = explanation_trace();
        trace["scientific"]["internal_metrics"]["anchor_count"] = json!(0);
        let result = validate(Some(&trace), &opts());
        let issue = result
            .errors
            .iter()
            .find(|e| e.kind == IssueKind::SubstanceContract)
            .cloned();
        assert!(issue.is_some(), "{result:?}");
        assert!(issue.is_some_and(|i| i.fatal && i.message.contains("anchor_count is 0")));
    }

    #[test]
    fn test_missing_metrics_is_substance_error() {
        let mut trace = explanation_trace();
        if let Some(sci) = trace["scientific"].as_object_mut() {
            sci.remove("internal_metrics");
        }
        let result = validate(Some(&trace), &opts());
        assert!(result.has_issue(IssueKind::SubstanceContract));
    }

    #[test]
    fn test_evidence_review_skips_substance() {
        let mut trace = explanation_trace();
        trace["execution_profile"]["mode"] = json!("evidence_review");
        trace["scientific"]["internal_metrics"]["anchor_count"] = json!(0);
        let result = validate(Some(&trace), &opts());
        assert_eq!(result.status, ValidationStatus::Valid, "{result:?}");
    }

    #[test]
    fn test_strict_escalates_substance() {
        let mut trace = explanation_trace();
        trace["scientific"]["internal_metrics"]["substance_state"] = json!("descriptive");
        let err = validate_strict(Some(&trace), &opts()).unwrap_err();
        assert!(matches!(
            err,
            TraceContractError::SubstanceContract { ref mode, .. } if mode == "scientific_explanation"
        ));

        assert!(validate_strict(Some(&explanation_trace()), &opts()).is_ok());
    }

    #[test]
    fn test_strict_keeps_every_finding() {
        let mut trace = explanation_trace();
        trace["schema_version"] = json!("2.0");
        trace["scientific"]["metrics"] = json!({
            "substance_state": "substantive",
            "anchor_count": 0,
            "biological_claim_count": 1
        });
        if let Some(obj) = trace.as_object_mut() {
            obj.remove("run_id");
        }

        let lenient = validate(Some(&trace), &opts());
        let err = validate_strict(Some(&trace), &opts()).unwrap_err();
        let findings = err.findings().cloned().unwrap_or_else(|| validate(None, &opts()));

        let kinds: Vec<(IssueKind, bool)> = findings
            .errors
            .iter()
            .map(|e| (e.kind, e.escalated))
            .collect();
        assert_eq!(
            kinds,
            vec![
                (IssueKind::MissingField, false),
                (IssueKind::SubstanceContract, true),
            ]
        );
        assert_eq!(findings.warnings, lenient.warnings);
        assert!(findings.has_issue(IssueKind::VersionDrift));
        assert_eq!(findings.errors[0].field.as_deref(), Some("run_id"));
    }

    #[test]
    fn test_escalated_flag_omitted_when_unset() {
        let result = validate(None, &opts());
        let value = serde_json::to_value(&result).unwrap_or_default();
        assert!(value["errors"][0].get("escalated").is_none());
    }

    #[test]
    fn test_claims_wrong_type() {
        let mut trace = explanation_trace();
        trace["scientific"]["claims"] = json!({"id": "c-1"});
        let result = validate(Some(&trace), &opts());
        assert!(result.has_issue(IssueKind::InvalidClaimsType));
        assert!(result.has_fatal());
    }

    #[test]
    fn test_empty_claims_is_warning() {
        let mut trace = explanation_trace();
        trace["execution_profile"]["mode"] = json!("evidence_review");
        trace["scientific"]["claims"] = json!([]);
        let result = validate(Some(&trace), &opts());
        assert!(result.valid);
        assert_eq!(result.status, ValidationStatus::Partial);
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.warnings[0].kind, IssueKind::NoClaims);
        assert_eq!(result.warnings[0].message, "no claims found");
    }

    #[test]
    fn test_discourse_without_claims_is_valid() {
        let trace = json!({
            "schema_version": "3.0",
            "execution_profile": {"mode": "non_scientific_discourse"}
        });
        let result = validate(Some(&trace), &opts());
        assert_eq!(result.status, ValidationStatus::Valid, "{result:?}");
        assert!(!result.has_issue(IssueKind::NoClaims));
    }

    #[test]
    fn test_version_drift_soft_and_hard() {
        let mut trace = explanation_trace();
        trace["schema_version"] = json!("2.0");
        trace["scientific"]["metrics"] = trace["scientific"]["internal_metrics"].clone();

        let soft = validate(Some(&trace), &opts());
        assert!(soft.valid, "{soft:?}");
        assert_eq!(soft.status, ValidationStatus::Partial);
        assert!(soft.has_issue(IssueKind::VersionDrift));

        let hard = validate(
            Some(&trace),
            &ValidateOptions {
                version_mismatch_is_error: true,
                ..ValidateOptions::default()
            },
        );
        assert!(!hard.valid);
        assert!(
            hard.errors
                .iter()
                .any(|e| e.kind == IssueKind::VersionDrift)
        );
    }

    #[test]
    fn test_unknown_mode_uses_strictest_rules() {
        let trace = json!({"schema_version": "3.0", "mode": "freeform"});
        let result = validate(Some(&trace), &opts());
        assert!(result.has_issue(IssueKind::UnknownMode));
        assert!(
            result
                .errors
                .iter()
                .any(|e| e.field.as_deref() == Some("trace_id"))
        );
    }

    #[test]
    fn test_unknown_enum_values_warn() {
        let mut trace = explanation_trace();
        trace["status"] = json!("exploded");
        trace["scientific"]["claims"] = json!([
            {"id": "c-1", "decision": "maybe", "change_type": "added"},
            "not a claim"
        ]);
        let result = validate(Some(&trace), &opts());
        assert!(result.valid);
        let fields: Vec<_> = result
            .warnings
            .iter()
            .filter_map(|w| w.field.clone())
            .collect();
        assert!(fields.contains(&"status".to_string()));
        assert!(fields.contains(&"claims[0].decision".to_string()));
        assert!(fields.contains(&"claims[1]".to_string()));
        assert!(!fields.contains(&"claims[0].change_type".to_string()));
    }

    #[test]
    fn test_fatal_kinds() {
        assert!(IssueKind::SubstanceContract.is_fatal());
        assert!(IssueKind::InvalidClaimsType.is_fatal());
        assert!(!IssueKind::MissingField.is_fatal());
        assert!(!IssueKind::VersionDrift.is_fatal());
        assert!(!IssueKind::NoClaims.is_fatal());
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let result = validate(None, &opts());
        let value = serde_json::to_value(&result).unwrap_or_default();
        assert_eq!(value["status"], json!("invalid"));
        assert_eq!(value["errors"][0]["kind"], json!("missing_payload"));
    }
}
