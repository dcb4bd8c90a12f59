//! Schema registry: the versioned vocabulary of the trace contract.
//!
//! Read-only constants. Each schema generation is described by one
//! `FieldMap` entry; the validator and adapter look fields up through the
//! map for the declared version instead of branching per version.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::strict;

/// Schema version this crate is built against.
pub const CURRENT_SCHEMA_VERSION: &str = "3.0";

/// Marker the upstream pipeline writes when an explanation has substance.
pub const SUBSTANTIVE_STATE: &str = "substantive";

/// Root key carrying the declared schema version.
pub const SCHEMA_VERSION_KEY: &str = "schema_version";

/// Known schema generations, ordered oldest to newest.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub enum SchemaVersion {
    /// Flat legacy layout, everything at the root.
    V1,
    /// Scientific section introduced (`scientific.claims`).
    V2,
    /// Audit section introduced; internal metrics renamed.
    V3,
}

impl SchemaVersion {
    /// Version the crate treats as current.
    pub const CURRENT: Self = Self::V3;

    /// Parse a declared version token. The major component decides:
    /// `"3"`, `"3.0"` and `"3.1"` all resolve to `V3`.
    pub fn parse(token: &str) -> Option<Self> {
        let trimmed = token.trim().trim_start_matches(['v', 'V']);
        let major = trimmed.split('.').next()?;
        match major.parse::<u32>().ok()? {
            1 => Some(Self::V1),
            2 => Some(Self::V2),
            3 => Some(Self::V3),
            _ => None,
        }
    }

    /// Canonical token for display.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::V1 => "1.0",
            Self::V2 => "2.0",
            Self::V3 => "3.0",
        }
    }

    /// Field mapping for this generation.
    pub fn field_map(&self) -> &'static FieldMap {
        match self {
            Self::V1 => &V1_FIELDS,
            Self::V2 => &V2_FIELDS,
            Self::V3 => &V3_FIELDS,
        }
    }
}

impl std::fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a generation keeps each section of the trace.
#[derive(Debug)]
pub struct FieldMap {
    pub claims: &'static [&'static str],
    pub metrics: &'static [&'static str],
    pub causality: &'static [&'static str],
    pub temporal: &'static [&'static str],
    pub policy: &'static [&'static str],
    pub execution_profile: &'static [&'static str],
    /// Candidate locations of the execution mode, first hit wins.
    pub mode: &'static [&'static [&'static str]],
    pub epistemic_status: &'static [&'static str],
    /// Name of the evidence-anchor counter inside the metrics section.
    pub anchor_count_key: &'static str,
}

static V1_FIELDS: FieldMap = FieldMap {
    claims: &["claims"],
    metrics: &["metrics"],
    causality: &["causality"],
    temporal: &["temporal"],
    policy: &["policy"],
    execution_profile: &["execution_profile"],
    mode: &[&["mode"]],
    epistemic_status: &["epistemic_status"],
    anchor_count_key: "evidence_anchor_count",
};

static V2_FIELDS: FieldMap = FieldMap {
    claims: &["scientific", "claims"],
    metrics: &["scientific", "metrics"],
    causality: &["scientific", "causality"],
    temporal: &["temporal"],
    policy: &["policy"],
    execution_profile: &["execution_profile"],
    mode: &[&["execution_profile", "mode"], &["mode"]],
    epistemic_status: &["epistemic_status"],
    anchor_count_key: "anchor_count",
};

static V3_FIELDS: FieldMap = FieldMap {
    claims: &["scientific", "claims"],
    metrics: &["scientific", "internal_metrics"],
    causality: &["causality"],
    temporal: &["temporal"],
    policy: &["audit", "policy"],
    execution_profile: &["execution_profile"],
    mode: &[&["execution_profile", "mode"], &["mode"]],
    epistemic_status: &["epistemic_status"],
    anchor_count_key: "anchor_count",
};

impl FieldMap {
    /// Resolve the raw mode token, trying each candidate location.
    pub fn mode_token<'a>(&self, raw: &'a Value) -> Option<&'a Value> {
        self.mode.iter().find_map(|path| strict::lookup(raw, path))
    }
}

/// Outcome of reading the version discriminator off a payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeclaredVersion {
    /// No `schema_version` key; the payload predates versioning.
    Undeclared,
    /// A recognized generation, with the token as written.
    Known { version: SchemaVersion, token: String },
    /// A token that names no generation this crate knows.
    Unknown { token: String },
}

impl DeclaredVersion {
    /// Read the discriminator from a raw payload.
    pub fn from_payload(raw: &Value) -> Self {
        let Some(value) = strict::lookup(raw, &[SCHEMA_VERSION_KEY]) else {
            return Self::Undeclared;
        };
        let token = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        match SchemaVersion::parse(&token) {
            Some(version) => Self::Known { version, token },
            None => Self::Unknown { token },
        }
    }

    /// Generation whose field map applies. Undeclared payloads use the
    /// legacy flat layout; unknown tokens fall forward to the current one.
    pub fn effective(&self) -> SchemaVersion {
        match self {
            Self::Undeclared => SchemaVersion::V1,
            Self::Known { version, .. } => *version,
            Self::Unknown { .. } => SchemaVersion::CURRENT,
        }
    }

    /// Token as written by the producer, if any.
    pub fn token(&self) -> Option<&str> {
        match self {
            Self::Undeclared => None,
            Self::Known { token, .. } | Self::Unknown { token } => Some(token),
        }
    }

    /// Whether the declared version differs from the current one.
    /// Undeclared payloads are legacy by definition and not drift.
    pub fn is_drift(&self) -> bool {
        match self {
            Self::Undeclared => false,
            Self::Known { version, .. } => *version != SchemaVersion::CURRENT,
            Self::Unknown { .. } => true,
        }
    }
}

/// How the upstream pipeline ran.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Asserts a scientific explanation; substance contract applies.
    ScientificExplanation,
    /// Reviews evidence without asserting an explanation.
    EvidenceReview,
    /// Conversational answer; legitimately claim-free.
    NonScientificDiscourse,
}

impl ExecutionMode {
    /// All modes
    pub fn all() -> [Self; 3] {
        [
            Self::ScientificExplanation,
            Self::EvidenceReview,
            Self::NonScientificDiscourse,
        ]
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::all().into_iter().find(|m| m.as_str() == s)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ScientificExplanation => "scientific_explanation",
            Self::EvidenceReview => "evidence_review",
            Self::NonScientificDiscourse => "non_scientific_discourse",
        }
    }

    /// Whether the scientific section (and its `claims` array) is expected.
    pub fn is_scientific(&self) -> bool {
        !matches!(self, Self::NonScientificDiscourse)
    }

    /// Whether the substance contract applies.
    pub fn asserts_explanation(&self) -> bool {
        matches!(self, Self::ScientificExplanation)
    }

    /// Mandatory root fields for this mode.
    pub fn mandatory_fields(&self) -> &'static [MandatoryField] {
        match self {
            Self::ScientificExplanation | Self::EvidenceReview => SCIENTIFIC_MANDATORY,
            Self::NonScientificDiscourse => DISCOURSE_MANDATORY,
        }
    }
}

impl std::fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which logical field is mandatory, and how badly its absence hurts.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct MandatoryField {
    pub key: FieldKey,
    /// Without a gating field no claim may be presented at all.
    pub gating: bool,
}

/// Logical root fields, resolved through the version's `FieldMap`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum FieldKey {
    TraceId,
    RunId,
    Status,
    Mode,
    EpistemicStatus,
}

impl FieldKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TraceId => "trace_id",
            Self::RunId => "run_id",
            Self::Status => "status",
            Self::Mode => "mode",
            Self::EpistemicStatus => "epistemic_status",
        }
    }

    /// Resolve the field on a payload through the field map.
    pub fn resolve<'a>(&self, raw: &'a Value, fields: &FieldMap) -> Option<&'a Value> {
        match self {
            Self::Mode => fields.mode_token(raw),
            Self::EpistemicStatus => strict::lookup(raw, fields.epistemic_status),
            other => strict::lookup(raw, &[other.as_str()]),
        }
    }
}

const SCIENTIFIC_MANDATORY: &[MandatoryField] = &[
    MandatoryField {
        key: FieldKey::TraceId,
        gating: false,
    },
    MandatoryField {
        key: FieldKey::RunId,
        gating: false,
    },
    MandatoryField {
        key: FieldKey::Status,
        gating: false,
    },
    MandatoryField {
        key: FieldKey::Mode,
        gating: false,
    },
    MandatoryField {
        key: FieldKey::EpistemicStatus,
        gating: true,
    },
];

const DISCOURSE_MANDATORY: &[MandatoryField] = &[MandatoryField {
    key: FieldKey::Mode,
    gating: false,
}];

/// Lifecycle status the producer reports for the whole trace.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceStatus {
    Pending,
    Streaming,
    Completed,
    Failed,
    Cancelled,
}

impl TraceStatus {
    pub const VALUES: &'static [&'static str] =
        &["pending", "streaming", "completed", "failed", "cancelled"];

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "streaming" => Some(Self::Streaming),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

/// Per-claim decision.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Accept,
    Reject,
    Revise,
    Defer,
}

impl Decision {
    pub const VALUES: &'static [&'static str] = &["accept", "reject", "revise", "defer"];

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "accept" => Some(Self::Accept),
            "reject" => Some(Self::Reject),
            "revise" => Some(Self::Revise),
            "defer" => Some(Self::Defer),
            _ => None,
        }
    }
}

/// How a claim changed relative to the previous revision.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Added,
    Removed,
    Modified,
    Unchanged,
}

impl ChangeType {
    pub const VALUES: &'static [&'static str] = &["added", "removed", "modified", "unchanged"];

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "added" => Some(Self::Added),
            "removed" => Some(Self::Removed),
            "modified" => Some(Self::Modified),
            "unchanged" => Some(Self::Unchanged),
            _ => None,
        }
    }
}
