//! Trace adapter: the anti-corruption layer between the producer's
//! evolving payload and the renderer's view model.
//!
//! `adapt` never panics and never returns an error. A missing payload
//! yields `None` ("no trace available"); anything else yields a view
//! model whose `adapter_status` says whether it can be trusted.

use serde_json::{Map, Value};

use crate::config::TraceContractConfig;
use crate::errors::{Result, TraceContractError};
use crate::normalizer::{self, Claim};
use crate::schema::{ExecutionMode, FieldKey, FieldMap, SCHEMA_VERSION_KEY, TraceStatus};
use crate::strict;
use crate::validator::{self, TraceShape, ValidationIssue, ValidationResult};
use crate::view_model::{
    AdapterStatus, Causality, Flags, Identity, Metrics, Policy, Profile, Temporal, ViewModel,
};

/// Stateless adapter; holds only its configuration.
#[derive(Debug, Clone, Default)]
pub struct TraceAdapter {
    config: TraceContractConfig,
}

impl TraceAdapter {
    pub fn new(config: TraceContractConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TraceContractConfig {
        &self.config
    }

    /// Adapt one trace snapshot.
    pub fn adapt(&self, raw: Option<&Value>) -> Option<ViewModel> {
        let raw = strict::strict_value(raw)?;
        match self.try_adapt(raw) {
            Ok(vm) => Some(vm),
            Err(err) => recover(raw.clone(), &err),
        }
    }

    /// Adapt a snapshot still in its wire form.
    ///
    /// Blank input is "no trace". Text that is not JSON is kept verbatim
    /// as a JSON string in `raw_trace` so it can still be inspected. The
    /// received text backs [`ViewModel::raw_json`] either way.
    pub fn adapt_str(&self, text: &str) -> Option<ViewModel> {
        if text.trim().is_empty() {
            return None;
        }
        let mut vm = match serde_json::from_str::<Value>(text) {
            Ok(value) => self.adapt(Some(&value)),
            Err(source) => recover(
                Value::String(text.to_string()),
                &TraceContractError::MalformedPayload { source },
            ),
        }?;
        vm.raw_text = Some(text.to_string());
        Some(vm)
    }

    fn try_adapt(&self, raw: &Value) -> Result<ViewModel> {
        let opts = self.config.validate_options();
        let validation = if self.config.strict_substance {
            validator::validate_strict(Some(raw), &opts)?
        } else {
            validator::validate(Some(raw), &opts)
        };

        let shape = TraceShape::of(raw);
        let identity = identity(raw, &shape);
        let claim_items = shape.claims(raw).and_then(Value::as_array);

        let recoverable = !validation.has_fatal() && (validation.valid || claim_items.is_some());
        if !recoverable {
            tracing::warn!(
                errors = validation.errors.len(),
                trace_id = identity.trace_id.as_deref().unwrap_or(""),
                "Trace contract violation"
            );
            let ValidationResult {
                errors, warnings, ..
            } = validation;
            return Ok(ViewModel::violation(identity, raw.clone(), errors, warnings));
        }

        let claims: Vec<Claim> = claim_items
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| normalizer::normalize(Some(item)))
                    .collect()
            })
            .unwrap_or_default();

        let vm = assemble(raw, &shape, identity, claims, validation);
        vm.check_invariants()?;
        if vm.is_integrity_violation() {
            tracing::warn!(
                errors = vm.errors.len(),
                claims = vm.claims.len(),
                "Trace adapted best-effort under contract violation"
            );
        }
        Ok(vm)
    }
}

/// Adapt with default configuration.
pub fn adapt(raw: Option<&Value>) -> Option<ViewModel> {
    TraceAdapter::default().adapt(raw)
}

/// Convert an error caught at the adapter boundary into either a
/// violation view model or "no trace", by severity.
fn recover(raw: Value, err: &TraceContractError) -> Option<ViewModel> {
    tracing::error!(
        category = err.category().as_str(),
        error = %err,
        "Trace adaptation failed"
    );
    if !err.category().renders_as_violation() {
        return None;
    }
    let identity = if raw.is_object() {
        identity(&raw, &TraceShape::of(&raw))
    } else {
        Identity::default()
    };
    let (errors, warnings) = match err.findings() {
        Some(findings) => (findings.errors.clone(), findings.warnings.clone()),
        None => (vec![ValidationIssue::from_error(err)], Vec::new()),
    };
    Some(ViewModel::violation(identity, raw, errors, warnings))
}

fn assemble(
    raw: &Value,
    shape: &TraceShape<'_>,
    identity: Identity,
    claims: Vec<Claim>,
    validation: ValidationResult,
) -> ViewModel {
    let fields = shape.fields;
    let metrics = metrics(raw, fields);
    let causality = causality(raw, fields);
    let temporal = temporal(raw, fields);
    let policy = policy(raw, fields);
    let profile = profile(raw, fields);

    let flags = Flags {
        has_evidence: !claims.is_empty(),
        has_mechanism: claims.iter().any(Claim::has_mechanism),
        has_causality: causality.any_present(),
        has_temporal: temporal.session_age_ms.is_some() && temporal.revision.is_some(),
        standby: claims.is_empty() && shape.mode == Some(ExecutionMode::NonScientificDiscourse),
        streaming: identity
            .status
            .as_deref()
            .and_then(TraceStatus::parse)
            .is_some_and(|s| s == TraceStatus::Streaming),
    };

    let adapter_status = if validation.valid {
        AdapterStatus::Success
    } else {
        AdapterStatus::ContractViolation
    };

    ViewModel {
        trace_id: identity.trace_id,
        run_id: identity.run_id,
        schema_version: identity.schema_version,
        status: identity.status,
        validation_status: validation.status,
        mode: identity.mode,
        epistemic_status: identity.epistemic_status,
        claims,
        metrics,
        causality,
        temporal,
        policy,
        profile,
        flags,
        adapter_status,
        errors: validation.errors,
        warnings: validation.warnings,
        raw_trace: raw.clone(),
        raw_text: None,
    }
}

fn identity(raw: &Value, shape: &TraceShape<'_>) -> Identity {
    let text = |value: Option<&Value>| match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    };
    Identity {
        trace_id: text(FieldKey::TraceId.resolve(raw, shape.fields)),
        run_id: text(FieldKey::RunId.resolve(raw, shape.fields)),
        schema_version: text(strict::lookup(raw, &[SCHEMA_VERSION_KEY])),
        status: text(FieldKey::Status.resolve(raw, shape.fields)),
        mode: text(shape.mode_token),
        epistemic_status: text(FieldKey::EpistemicStatus.resolve(raw, shape.fields)),
    }
}

fn group<'a>(raw: &'a Value, path: &[&str]) -> Option<&'a Map<String, Value>> {
    strict::section(raw, path)
}

fn metrics(raw: &Value, fields: &FieldMap) -> Metrics {
    let Some(m) = group(raw, fields.metrics) else {
        return Metrics::default();
    };
    Metrics {
        substance_state: strict::strict_str(m, "substance_state"),
        anchor_count: strict::strict_u64(m, fields.anchor_count_key),
        biological_claim_count: strict::strict_u64(m, "biological_claim_count"),
        evidence_count: strict::strict_u64(m, "evidence_count"),
        mean_confidence: strict::strict_f64(m, "mean_confidence"),
        coverage: strict::strict_f64(m, "coverage"),
    }
}

fn causality(raw: &Value, fields: &FieldMap) -> Causality {
    let Some(c) = group(raw, fields.causality) else {
        return Causality::default();
    };
    Causality {
        causal_density: strict::strict_f64(c, "causal_density"),
        intervention_count: strict::strict_u64(c, "intervention_count"),
        confounder_count: strict::strict_u64(c, "confounder_count"),
        edge_count: strict::strict_u64(c, "edge_count"),
    }
}

fn temporal(raw: &Value, fields: &FieldMap) -> Temporal {
    let Some(t) = group(raw, fields.temporal) else {
        return Temporal::default();
    };
    Temporal {
        session_age_ms: strict::strict_u64(t, "session_age_ms"),
        revision: strict::strict_u64(t, "revision"),
        created_at: strict::strict_str(t, "created_at"),
        updated_at: strict::strict_str(t, "updated_at"),
    }
}

fn policy(raw: &Value, fields: &FieldMap) -> Policy {
    let Some(p) = group(raw, fields.policy) else {
        return Policy::default();
    };
    Policy {
        decision: strict::strict_str(p, "decision"),
        policy_id: strict::strict_str(p, "policy_id"),
        violations: strict::strict_string_list(p, "violations"),
        redacted: strict::strict_bool(p, "redacted"),
    }
}

fn profile(raw: &Value, fields: &FieldMap) -> Profile {
    let Some(p) = group(raw, fields.execution_profile) else {
        return Profile::default();
    };
    Profile {
        latency_ms: strict::strict_u64(p, "latency_ms"),
        model: strict::strict_str(p, "model"),
        token_count: strict::strict_u64(p, "token_count"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validator::IssueKind;
    use serde_json::json;

    #[test]
    fn test_adapt_none_is_none() {
        assert!(adapt(None).is_none());
        assert!(adapt(Some(&Value::Null)).is_none());
    }

    #[test]
    fn test_blank_text_is_none() {
        assert!(TraceAdapter::default().adapt_str("   \n").is_none());
    }

    #[test]
    fn test_malformed_text_is_violation() {
        let vm = TraceAdapter::default()
            .adapt_str("{\"trace_id\": ")
            .expect("malformed text still renders");
        assert_eq!(vm.adapter_status, AdapterStatus::ContractViolation);
        assert_eq!(vm.errors[0].kind, IssueKind::MalformedPayload);
        assert_eq!(vm.raw_trace, json!("{\"trace_id\": "));
    }

    #[test]
    fn test_recover_by_severity() {
        let raw = json!({"trace_id": "tr-1"});
        let vm = recover(raw.clone(), &TraceContractError::assembly("invariant broken"))
            .expect("assembly errors render as violations");
        assert_eq!(vm.errors[0].kind, IssueKind::AdapterInternal);
        assert_eq!(vm.trace_id.as_deref(), Some("tr-1"));

        assert!(recover(raw, &TraceContractError::enrichment("lookup down")).is_none());
    }

    #[test]
    fn test_strict_substance_caught_at_boundary() {
        let adapter = TraceAdapter::new(TraceContractConfig {
            strict_substance: true,
            ..TraceContractConfig::default()
        });
        let raw = json!({
            "schema_version": "3.0",
            "trace_id": "tr-2",
            "run_id": "run-2",
            "status": "completed",
            "epistemic_status": "supported",
            "execution_profile": {"mode": "scientific_explanation"},
            "scientific": {
                "claims": [{"id": "c-1", "mechanism": ["step"]}],
                "internal_metrics": {
                    "substance_state": "substantive",
                    "anchor_count": 0,
                    "biological_claim_count": 1
                }
            }
        });
        let vm = adapter.adapt(Some(&raw)).expect("violation view model");
        assert!(vm.is_integrity_violation());
        assert!(vm.claims.is_empty());
        assert_eq!(vm.errors.len(), 1);
        assert_eq!(vm.errors[0].kind, IssueKind::SubstanceContract);
        assert!(vm.errors[0].escalated);
        assert_eq!(vm.raw_trace, raw);
    }

    #[test]
    fn test_strict_violation_keeps_other_findings() {
        let adapter = TraceAdapter::new(TraceContractConfig {
            strict_substance: true,
            ..TraceContractConfig::default()
        });
        let raw = json!({
            "schema_version": "2.0",
            "trace_id": "tr-3",
            "status": "completed",
            "epistemic_status": "supported",
            "execution_profile": {"mode": "scientific_explanation"},
            "scientific": {
                "claims": [{"id": "c-1"}],
                "metrics": {
                    "substance_state": "substantive",
                    "anchor_count": 0,
                    "biological_claim_count": 1
                }
            }
        });
        let vm = adapter.adapt(Some(&raw)).expect("violation view model");
        assert!(vm.is_integrity_violation());
        assert!(vm.claims.is_empty());

        let errors: Vec<(IssueKind, Option<&str>, bool)> = vm
            .errors
            .iter()
            .map(|e| (e.kind, e.field.as_deref(), e.escalated))
            .collect();
        assert_eq!(
            errors,
            vec![
                (IssueKind::MissingField, Some("run_id"), false),
                (IssueKind::SubstanceContract, Some("scientific.metrics"), true),
            ]
        );
        let warnings: Vec<IssueKind> = vm.warnings.iter().map(|w| w.kind).collect();
        assert_eq!(warnings, vec![IssueKind::VersionDrift]);

        let lenient = adapt(Some(&raw)).expect("view model");
        assert_eq!(
            lenient.errors.iter().map(|e| e.kind).collect::<Vec<_>>(),
            vm.errors.iter().map(|e| e.kind).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_raw_text_kept_verbatim() {
        let text = r#"{"trace_id":"t","mode":"non_scientific_discourse","claims":[],"zeta":1.50,"alpha":2}"#;
        let vm = TraceAdapter::default().adapt_str(text).expect("view model");
        assert_eq!(vm.raw_json(), text);

        let keys: Vec<&str> = vm
            .raw_trace
            .as_object()
            .map(|o| o.keys().map(String::as_str).collect())
            .unwrap_or_default();
        assert_eq!(keys, vec!["trace_id", "mode", "claims", "zeta", "alpha"]);

        let serialized = serde_json::to_value(&vm).expect("serialize");
        assert!(serialized.get("rawText").is_none());
    }

    #[test]
    fn test_malformed_text_raw_json_is_input() {
        let vm = TraceAdapter::default()
            .adapt_str("not json")
            .expect("violation view model");
        assert_eq!(vm.raw_json(), "not json");
    }

    #[test]
    fn test_numeric_identity_is_stringified() {
        let raw = json!({"mode": "non_scientific_discourse", "trace_id": 42});
        let vm = adapt(Some(&raw)).expect("view model");
        assert_eq!(vm.trace_id.as_deref(), Some("42"));
    }
}
