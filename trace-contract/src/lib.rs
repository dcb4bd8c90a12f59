//! Execution-trace contract layer
//!
//! Accepts the untrusted, evolving trace payload produced by the upstream
//! reasoning pipeline and turns it into one strictly-typed view model that
//! a renderer can consume without guessing.
//!
//! Pipeline: raw payload → [`validator`] → [`normalizer`] (per claim) →
//! [`adapter`] assembly → [`permission`] queries per UI section.
//!
//! The layer never fabricates values: anything the producer did not send
//! comes out as `null` (see [`strict`]), and a broken trace comes out as a
//! visible `contract_violation` rather than an error or a panic.

#![deny(clippy::print_stdout, clippy::print_stderr)]

pub mod adapter;
pub mod config;
pub mod enrichment;
pub mod errors;
pub mod normalizer;
pub mod permission;
pub mod schema;
pub mod strict;
mod structure;
pub mod validator;
pub mod view_model;

pub use adapter::{TraceAdapter, adapt};
pub use config::{EnrichmentConfig, TraceContractConfig};
pub use enrichment::{Annotation, AnnotationSource, Enricher, EnrichmentCache};
pub use errors::{ErrorCategory, Result, TraceContractError};
pub use normalizer::{Claim, normalize};
pub use permission::{
    PermissionDecision, RenderPermissionGate, Section, SectionPolicy, can_render_causality,
    can_render_evidence, can_render_mechanism, can_render_temporal,
};
pub use schema::{CURRENT_SCHEMA_VERSION, ExecutionMode, SchemaVersion};
pub use validator::{
    IssueKind, ValidateOptions, ValidationIssue, ValidationResult, ValidationStatus, validate,
    validate_strict,
};
pub use view_model::{AdapterStatus, ViewModel};

/// Trace contract version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
