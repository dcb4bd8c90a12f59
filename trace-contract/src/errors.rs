//! Trace contract error types
//!
//! Validation findings are data (`ValidationIssue`), not errors. The types
//! here cover the truly exceptional paths: config loading, strict-mode
//! substance escalation, assembly defects, and enrichment lookups.
//! Only the adapter converts these back into a `contract_violation` view.

use thiserror::Error;

use crate::validator::ValidationResult;

/// Error category for structured logging and behavior mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// `trace_contract.toml` or env misconfigured
    ConfigError,
    /// Substance state asserted without supporting counts
    SemanticContractError,
    /// Unexpected defect while assembling the view model
    AdapterInternalError,
    /// Annotation lookup failures (display-only)
    EnrichmentError,
    /// Input text was not JSON at all
    MalformedPayload,
}

impl ErrorCategory {
    /// Machine-readable code for logging
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConfigError => "CONFIG_ERROR",
            Self::SemanticContractError => "SEMANTIC_CONTRACT_ERROR",
            Self::AdapterInternalError => "ADAPTER_INTERNAL_ERROR",
            Self::EnrichmentError => "ENRICHMENT_ERROR",
            Self::MalformedPayload => "MALFORMED_PAYLOAD",
        }
    }

    /// Whether the adapter can still hand the renderer a view model
    pub fn renders_as_violation(&self) -> bool {
        matches!(
            self,
            Self::SemanticContractError | Self::AdapterInternalError | Self::MalformedPayload
        )
    }
}

/// Trace contract error with category and context
#[derive(Debug, Error)]
pub enum TraceContractError {
    #[error("config error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Strict-mode escalation. `findings` is the complete validation pass,
    /// with the escalated issue marked.
    #[error("substance contract violated for mode {mode}: {detail}")]
    SubstanceContract {
        mode: String,
        detail: String,
        findings: Box<ValidationResult>,
    },

    #[error("adapter internal error: {message}")]
    Assembly { message: String },

    #[error("enrichment error: {message}")]
    Enrichment {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("malformed trace payload: {source}")]
    MalformedPayload {
        #[source]
        source: serde_json::Error,
    },
}

impl TraceContractError {
    /// Get the error category
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Config { .. } => ErrorCategory::ConfigError,
            Self::SubstanceContract { .. } => ErrorCategory::SemanticContractError,
            Self::Assembly { .. } => ErrorCategory::AdapterInternalError,
            Self::Enrichment { .. } => ErrorCategory::EnrichmentError,
            Self::MalformedPayload { .. } => ErrorCategory::MalformedPayload,
        }
    }

    /// Validation findings carried by the error, if any
    pub fn findings(&self) -> Option<&ValidationResult> {
        match self {
            Self::SubstanceContract { findings, .. } => Some(findings.as_ref()),
            _ => None,
        }
    }

    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    /// Create a config error with source
    pub fn config_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Config {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an assembly error
    pub fn assembly(message: impl Into<String>) -> Self {
        Self::Assembly {
            message: message.into(),
        }
    }

    /// Create an enrichment error
    pub fn enrichment(message: impl Into<String>) -> Self {
        Self::Enrichment {
            message: message.into(),
            source: None,
        }
    }

    /// Create an enrichment error with source
    pub fn enrichment_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Enrichment {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// Result type alias for trace contract operations
pub type Result<T> = std::result::Result<T, TraceContractError>;
