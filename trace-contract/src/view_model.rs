//! The canonical view model handed to the renderer.
//!
//! Built fresh by every adaptation call and never patched afterwards.
//! Every group field is `Option`; `None` serializes as `null` and means
//! "the producer did not say", which the renderer must keep distinct from
//! a known zero.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{Result, TraceContractError};
use crate::normalizer::Claim;
use crate::validator::{ValidationIssue, ValidationStatus};

/// Authoritative adapter outcome. Consumers must read this instead of
/// inferring trust from the shape of the view model.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterStatus {
    Success,
    ContractViolation,
}

impl AdapterStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::ContractViolation => "contract_violation",
        }
    }
}

impl std::fmt::Display for AdapterStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Internal generation metrics reported by the producer.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
    pub substance_state: Option<String>,
    pub anchor_count: Option<u64>,
    pub biological_claim_count: Option<u64>,
    pub evidence_count: Option<u64>,
    pub mean_confidence: Option<f64>,
    pub coverage: Option<f64>,
}

/// Causal-structure metrics.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Causality {
    pub causal_density: Option<f64>,
    pub intervention_count: Option<u64>,
    pub confounder_count: Option<u64>,
    pub edge_count: Option<u64>,
}

impl Causality {
    /// Whether the producer reported at least one causality metric.
    pub fn any_present(&self) -> bool {
        self.causal_density.is_some()
            || self.intervention_count.is_some()
            || self.confounder_count.is_some()
            || self.edge_count.is_some()
    }
}

/// Session timing and revision bookkeeping.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Temporal {
    pub session_age_ms: Option<u64>,
    pub revision: Option<u64>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

/// Policy / audit outcome.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Policy {
    pub decision: Option<String>,
    pub policy_id: Option<String>,
    pub violations: Option<Vec<String>>,
    pub redacted: Option<bool>,
}

/// How the producer executed the run.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub latency_ms: Option<u64>,
    pub model: Option<String>,
    pub token_count: Option<u64>,
}

/// Availability flags derived from the assembled view model.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Flags {
    pub has_evidence: bool,
    pub has_mechanism: bool,
    pub has_causality: bool,
    pub has_temporal: bool,
    /// Claim-free by design (conversational mode with no claims).
    pub standby: bool,
    /// Producer is still streaming this trace.
    pub streaming: bool,
}

/// Root identity and status fields, copied strictly.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct Identity {
    pub trace_id: Option<String>,
    pub run_id: Option<String>,
    pub schema_version: Option<String>,
    pub status: Option<String>,
    pub mode: Option<String>,
    pub epistemic_status: Option<String>,
}

/// The single structure the renderer may consume.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewModel {
    pub trace_id: Option<String>,
    pub run_id: Option<String>,
    pub schema_version: Option<String>,
    pub status: Option<String>,
    pub validation_status: ValidationStatus,
    pub mode: Option<String>,
    pub epistemic_status: Option<String>,
    pub claims: Vec<Claim>,
    pub metrics: Metrics,
    pub causality: Causality,
    pub temporal: Temporal,
    pub policy: Policy,
    pub profile: Profile,
    pub flags: Flags,
    pub adapter_status: AdapterStatus,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
    /// The payload exactly as received; the only place raw data survives.
    pub raw_trace: Value,
    /// Wire text the payload was decoded from, when adapted from text.
    #[serde(skip)]
    pub raw_text: Option<String>,
}

impl ViewModel {
    /// Minimal view of an untrustworthy trace: no claims, every group
    /// unknown, findings and raw payload kept for forensic display.
    pub(crate) fn violation(
        identity: Identity,
        raw_trace: Value,
        errors: Vec<ValidationIssue>,
        warnings: Vec<ValidationIssue>,
    ) -> Self {
        Self {
            trace_id: identity.trace_id,
            run_id: identity.run_id,
            schema_version: identity.schema_version,
            status: identity.status,
            validation_status: ValidationStatus::Invalid,
            mode: identity.mode,
            epistemic_status: identity.epistemic_status,
            claims: Vec::new(),
            metrics: Metrics::default(),
            causality: Causality::default(),
            temporal: Temporal::default(),
            policy: Policy::default(),
            profile: Profile::default(),
            flags: Flags::default(),
            adapter_status: AdapterStatus::ContractViolation,
            errors,
            warnings,
            raw_trace,
            raw_text: None,
        }
    }

    /// Whether the renderer must show the loud integrity-violation state.
    pub fn is_integrity_violation(&self) -> bool {
        self.adapter_status != AdapterStatus::Success
    }

    /// Verbatim serialization of the retained raw payload: the received
    /// text when there was one, otherwise the payload pretty-printed in
    /// its original key order.
    pub fn raw_json(&self) -> String {
        if let Some(text) = &self.raw_text {
            return text.clone();
        }
        serde_json::to_string_pretty(&self.raw_trace).unwrap_or_else(|_| self.raw_trace.to_string())
    }

    /// Cross-field invariants every assembled view model must satisfy.
    pub fn check_invariants(&self) -> Result<()> {
        if self.adapter_status == AdapterStatus::Success && !self.errors.is_empty() {
            return Err(TraceContractError::assembly(
                "success status carries validation errors",
            ));
        }
        if self.flags.has_evidence == self.claims.is_empty() {
            return Err(TraceContractError::assembly(
                "has_evidence disagrees with the claims list",
            ));
        }
        if self.flags.standby && !self.claims.is_empty() {
            return Err(TraceContractError::assembly("standby view carries claims"));
        }
        if self.flags.has_mechanism != self.claims.iter().any(Claim::has_mechanism) {
            return Err(TraceContractError::assembly(
                "has_mechanism disagrees with the claims list",
            ));
        }
        Ok(())
    }
}
