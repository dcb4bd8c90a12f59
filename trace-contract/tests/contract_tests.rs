//! Validation, normalization and render-permission behavior through the
//! public API.

use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use trace_contract::normalizer::preservation_violations;
use trace_contract::{
    IssueKind, RenderPermissionGate, Section, ValidateOptions, ValidationStatus, adapt,
    can_render_mechanism, normalize, validate,
};

fn explanation(claims: Value) -> Value {
    json!({
        "schema_version": "3.0",
        "trace_id": "tr-7",
        "run_id": "run-7",
        "status": "completed",
        "epistemic_status": "supported",
        "execution_profile": {"mode": "scientific_explanation"},
        "scientific": {
            "claims": claims,
            "internal_metrics": {
                "substance_state": "substantive",
                "anchor_count": 2,
                "biological_claim_count": 1
            }
        }
    })
}

#[test]
fn normalize_preserves_every_raw_field() {
    let raw = json!({
        "claim_id": "c-9",
        "text": "Hypoxia stabilizes HIF-1a",
        "confidence": 0.0,
        "importance": null,
        "vendor_extension": {"score": [1, 2, 3]},
        "human_verified": false
    });
    let claim = normalize(Some(&raw)).expect("claim");

    let object = raw.as_object().expect("object");
    for (key, value) in object {
        assert_eq!(claim.fields().get(key), Some(value), "field {key}");
    }
    assert!(preservation_violations(object, claim.fields()).is_empty());

    assert_eq!(claim.id().as_deref(), Some("c-9"));
    assert_eq!(claim.statement().as_deref(), Some("Hypoxia stabilizes HIF-1a"));
    assert_eq!(claim.confidence(), Some(0.0));
    assert_eq!(claim.importance(), None);
    assert_eq!(claim.verified(), Some(false));
}

#[test]
fn normalize_null_is_none() {
    assert!(normalize(None).is_none());
    assert!(normalize(Some(&Value::Null)).is_none());
}

#[test]
fn validate_null_has_exactly_one_error() {
    let result = validate(None, &ValidateOptions::default());
    assert!(!result.valid);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].kind, IssueKind::MissingPayload);
}

#[test]
fn discourse_mode_has_no_claims_warning() {
    let raw = json!({"mode": "non_scientific_discourse", "claims": []});
    let result = validate(Some(&raw), &ValidateOptions::default());
    assert_eq!(result.status, ValidationStatus::Valid);
    assert!(result.warnings.is_empty());
}

#[test]
fn missing_run_id_is_reported_by_name() {
    let mut raw = explanation(json!([{"id": "c-1"}]));
    raw.as_object_mut().expect("object").remove("run_id");
    let result = validate(Some(&raw), &ValidateOptions::default());
    assert!(!result.valid);
    let fields: Vec<&str> = result
        .errors
        .iter()
        .filter_map(|e| e.field.as_deref())
        .collect();
    assert_eq!(fields, vec!["run_id"]);
}

#[test]
fn validation_is_repeatable() {
    let raw = explanation(json!([{"id": "c-1", "decision": "perhaps"}]));
    let first = validate(Some(&raw), &ValidateOptions::default());
    let second = validate(Some(&raw), &ValidateOptions::default());
    assert_eq!(first, second);
}

#[test]
fn mechanism_denied_when_every_claim_is_empty() {
    let raw = explanation(json!([
        {"id": "c-1", "mechanism": []},
        {"id": "c-2", "mechanism": {"steps": []}, "mechanism_topology": {"nodes": []}}
    ]));
    let vm = adapt(Some(&raw)).expect("view model");
    assert!(!vm.is_integrity_violation());
    let decision = can_render_mechanism(&vm);
    assert!(!decision.allowed);
    assert!(!decision.reasons.is_empty());
}

#[test]
fn mechanism_allowed_with_one_step() {
    let raw = explanation(json!([
        {"id": "c-1", "mechanism": []},
        {"id": "c-2", "mechanism": ["hypoxia sensed by PHD"]}
    ]));
    let vm = adapt(Some(&raw)).expect("view model");
    assert!(can_render_mechanism(&vm).allowed);
}

#[test]
fn gate_decides_every_section() {
    let mut raw = explanation(json!([{"id": "c-1", "graph": {"nodes": ["HIF-1a"]}}]));
    raw["causality"] = json!({"confounder_count": 0});
    raw["temporal"] = json!({"session_age_ms": 1200});

    let vm = adapt(Some(&raw)).expect("view model");
    let decisions = RenderPermissionGate::default().decide_all(&vm);
    let allowed: Vec<(Section, bool)> = decisions
        .iter()
        .map(|(section, decision)| (*section, decision.allowed))
        .collect();
    assert_eq!(
        allowed,
        vec![
            (Section::Evidence, true),
            (Section::Mechanism, true),
            (Section::Causality, true),
            (Section::Temporal, false),
        ]
    );
    assert_eq!(
        decisions[&Section::Temporal].reasons,
        vec!["revision is unknown".to_string()]
    );
}

#[test]
fn violation_denies_all_sections() {
    let mut raw = explanation(json!([{"id": "c-1", "mechanism": ["step"]}]));
    raw["epistemic_status"] = Value::Null;
    raw["causality"] = json!({"edge_count": 4});

    let vm = adapt(Some(&raw)).expect("view model");
    assert!(vm.is_integrity_violation());
    for (section, decision) in RenderPermissionGate::default().decide_all(&vm) {
        assert!(!decision.allowed, "{section} rendered for a violation");
    }
}
