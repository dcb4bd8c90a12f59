//! Render permission gate.
//!
//! One pure predicate per UI section, evaluated on every render pass from
//! the current view model. Predicates look only at the fields their
//! section needs and deny, with a reason, whenever content is missing or
//! ambiguous. A key merely existing is not permission.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::view_model::ViewModel;

/// UI-facing groupings gated independently.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    Evidence,
    Mechanism,
    Causality,
    Temporal,
}

impl Section {
    /// All sections in render order
    pub fn all() -> [Self; 4] {
        [
            Self::Evidence,
            Self::Mechanism,
            Self::Causality,
            Self::Temporal,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Evidence => "evidence",
            Self::Mechanism => "mechanism",
            Self::Causality => "causality",
            Self::Temporal => "temporal",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::all().into_iter().find(|section| section.as_str() == s)
    }
}

impl std::fmt::Display for Section {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a section may render, and why.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionDecision {
    pub allowed: bool,
    pub reasons: Vec<String>,
}

impl PermissionDecision {
    pub fn allow(reason: impl Into<String>) -> Self {
        Self {
            allowed: true,
            reasons: vec![reason.into()],
        }
    }

    pub fn deny(reasons: Vec<String>) -> Self {
        Self {
            allowed: false,
            reasons,
        }
    }
}

/// A replaceable permission rule for one section.
pub trait SectionPolicy {
    fn section(&self) -> Section;

    /// Must be total: deny with a reason rather than panic.
    fn evaluate(&self, vm: &ViewModel) -> PermissionDecision;
}

/// Evidence renders when there is at least one claim.
#[derive(Debug, Clone, Copy, Default)]
pub struct EvidencePolicy;

impl SectionPolicy for EvidencePolicy {
    fn section(&self) -> Section {
        Section::Evidence
    }

    fn evaluate(&self, vm: &ViewModel) -> PermissionDecision {
        can_render_evidence(vm)
    }
}

/// Mechanism renders when some claim has steps or topology nodes.
#[derive(Debug, Clone, Copy, Default)]
pub struct MechanismPolicy;

impl SectionPolicy for MechanismPolicy {
    fn section(&self) -> Section {
        Section::Mechanism
    }

    fn evaluate(&self, vm: &ViewModel) -> PermissionDecision {
        can_render_mechanism(vm)
    }
}

/// Causality renders when at least one causality metric is known.
#[derive(Debug, Clone, Copy, Default)]
pub struct CausalityPolicy;

impl SectionPolicy for CausalityPolicy {
    fn section(&self) -> Section {
        Section::Causality
    }

    fn evaluate(&self, vm: &ViewModel) -> PermissionDecision {
        can_render_causality(vm)
    }
}

/// Temporal renders when both session age and revision are known.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemporalPolicy;

impl SectionPolicy for TemporalPolicy {
    fn section(&self) -> Section {
        Section::Temporal
    }

    fn evaluate(&self, vm: &ViewModel) -> PermissionDecision {
        can_render_temporal(vm)
    }
}

pub fn can_render_evidence(vm: &ViewModel) -> PermissionDecision {
    if vm.claims.is_empty() {
        return PermissionDecision::deny(vec!["claims list is empty".to_string()]);
    }
    PermissionDecision::allow(format!("{} claim(s) available", vm.claims.len()))
}

pub fn can_render_mechanism(vm: &ViewModel) -> PermissionDecision {
    if vm.claims.is_empty() {
        return PermissionDecision::deny(vec!["no claims to carry a mechanism".to_string()]);
    }
    let with_mechanism = vm.claims.iter().filter(|c| c.has_mechanism()).count();
    if with_mechanism == 0 {
        return PermissionDecision::deny(vec![
            "every claim has empty mechanism steps and topology".to_string(),
        ]);
    }
    PermissionDecision::allow(format!("{with_mechanism} claim(s) carry a mechanism"))
}

pub fn can_render_causality(vm: &ViewModel) -> PermissionDecision {
    let c = &vm.causality;
    let present: Vec<&str> = [
        ("causal_density", c.causal_density.is_some()),
        ("intervention_count", c.intervention_count.is_some()),
        ("confounder_count", c.confounder_count.is_some()),
        ("edge_count", c.edge_count.is_some()),
    ]
    .into_iter()
    .filter_map(|(key, known)| known.then_some(key))
    .collect();

    if present.is_empty() {
        return PermissionDecision::deny(vec!["no causality metric reported".to_string()]);
    }
    PermissionDecision::allow(format!("causality metrics: {}", present.join(", ")))
}

pub fn can_render_temporal(vm: &ViewModel) -> PermissionDecision {
    let mut missing = Vec::new();
    if vm.temporal.session_age_ms.is_none() {
        missing.push("session_age_ms is unknown".to_string());
    }
    if vm.temporal.revision.is_none() {
        missing.push("revision is unknown".to_string());
    }
    if !missing.is_empty() {
        return PermissionDecision::deny(missing);
    }
    PermissionDecision::allow("session age and revision reported")
}

/// Injectable set of section policies.
pub struct RenderPermissionGate {
    policies: Vec<Box<dyn SectionPolicy>>,
}

impl Default for RenderPermissionGate {
    fn default() -> Self {
        Self::empty()
            .with_policy(EvidencePolicy)
            .with_policy(MechanismPolicy)
            .with_policy(CausalityPolicy)
            .with_policy(TemporalPolicy)
    }
}

impl std::fmt::Debug for RenderPermissionGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderPermissionGate")
            .field(
                "sections",
                &self.policies.iter().map(|p| p.section()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl RenderPermissionGate {
    /// A gate with no policies; every section is denied.
    pub fn empty() -> Self {
        Self {
            policies: Vec::new(),
        }
    }

    /// Register a policy, replacing any existing one for its section.
    pub fn with_policy(mut self, policy: impl SectionPolicy + 'static) -> Self {
        let section = policy.section();
        self.policies.retain(|p| p.section() != section);
        self.policies.push(Box::new(policy));
        self
    }

    pub fn decide(&self, section: Section, vm: &ViewModel) -> PermissionDecision {
        match self.policies.iter().find(|p| p.section() == section) {
            Some(policy) => policy.evaluate(vm),
            None => PermissionDecision::deny(vec![format!("no policy registered for {section}")]),
        }
    }

    pub fn decide_all(&self, vm: &ViewModel) -> BTreeMap<Section, PermissionDecision> {
        Section::all()
            .into_iter()
            .map(|section| (section, self.decide(section, vm)))
            .collect()
    }
}
