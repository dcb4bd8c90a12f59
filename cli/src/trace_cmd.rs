//! Trace contract CLI commands
//!
//! ## Commands
//!
//! - `trace-contract validate [FILE]` - Check a trace against its declared schema
//! - `trace-contract adapt [FILE]` - Produce the renderer view model
//! - `trace-contract sections [FILE]` - Show which UI sections may render
//!
//! ## Exit Codes
//! - 0: Valid / success
//! - 1: Partial (warnings only)
//! - 2: Invalid or contract violation
//! - 3: No trace, or the input/config could not be read

use std::collections::BTreeMap;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use trace_contract::{
    PermissionDecision, RenderPermissionGate, Section, TraceAdapter, TraceContractConfig,
    ValidationIssue, ValidationResult, ValidationStatus, ViewModel, validate, validate_strict,
};

pub const EXIT_OK: i32 = 0;
pub const EXIT_PARTIAL: i32 = 1;
pub const EXIT_VIOLATION: i32 = 2;
pub const EXIT_NO_TRACE: i32 = 3;

/// Trace contract CLI: validate and adapt execution traces
#[derive(Debug, Parser)]
#[command(name = "trace-contract", version)]
pub struct TraceCli {
    #[command(subcommand)]
    pub command: TraceSubcommand,
}

impl TraceCli {
    pub fn run(self) -> Result<i32> {
        match self.command {
            TraceSubcommand::Validate(args) => run_validate(&args),
            TraceSubcommand::Adapt(args) => run_adapt(&args),
            TraceSubcommand::Sections(args) => run_sections(&args),
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum TraceSubcommand {
    /// Validate a trace payload against the rules of its schema version
    Validate(TraceArgs),

    /// Adapt a trace payload into the renderer view model
    ///
    /// A contract violation still prints a view model; check `adapterStatus`.
    Adapt(TraceArgs),

    /// Decide which UI sections may render for a trace
    Sections(TraceArgs),
}

#[derive(Debug, Args)]
pub struct TraceArgs {
    /// Trace JSON file (stdin when omitted or `-`)
    #[arg(value_name = "FILE")]
    pub file: Option<PathBuf>,

    /// Output as JSON for automation
    #[arg(long)]
    pub json: bool,

    /// Config file (default: $TRACE_CONTRACT_CONFIG or ~/.config/codex/trace_contract.toml)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Escalate substance-contract violations instead of collecting them
    #[arg(long)]
    pub strict: bool,
}

impl TraceArgs {
    fn load_config(&self) -> Result<TraceContractConfig> {
        let mut config = match &self.config {
            Some(path) => TraceContractConfig::load_from_path(path),
            None => TraceContractConfig::load(),
        }
        .context("failed to load trace contract config")?;
        if self.strict {
            config.strict_substance = true;
        }
        Ok(config)
    }

    fn read_input(&self) -> Result<String> {
        match self.file.as_deref() {
            Some(path) if path != Path::new("-") => std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display())),
            _ => {
                let mut buf = String::new();
                std::io::stdin()
                    .read_to_string(&mut buf)
                    .context("failed to read trace from stdin")?;
                Ok(buf)
            }
        }
    }
}

/// Decode input text. Blank input and a literal `null` are "no trace";
/// text that is not JSON is kept as a JSON string so validation reports it.
pub fn parse_payload(text: &str) -> Option<Value> {
    if text.trim().is_empty() {
        return None;
    }
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Null) => None,
        Ok(value) => Some(value),
        Err(e) => {
            tracing::debug!(error = %e, "Trace input is not JSON");
            Some(Value::String(text.to_string()))
        }
    }
}

pub fn validation_exit_code(status: ValidationStatus) -> i32 {
    match status {
        ValidationStatus::Valid => EXIT_OK,
        ValidationStatus::Partial => EXIT_PARTIAL,
        ValidationStatus::Invalid => EXIT_VIOLATION,
    }
}

pub fn view_exit_code(vm: &ViewModel) -> i32 {
    if vm.is_integrity_violation() {
        EXIT_VIOLATION
    } else {
        validation_exit_code(vm.validation_status)
    }
}

fn run_validate(args: &TraceArgs) -> Result<i32> {
    let config = args.load_config()?;
    let Some(payload) = parse_payload(&args.read_input()?) else {
        print_no_trace(args.json);
        return Ok(EXIT_NO_TRACE);
    };

    let opts = config.validate_options();
    let result = if config.strict_substance {
        match validate_strict(Some(&payload), &opts) {
            Ok(result) => result,
            Err(err) => {
                tracing::error!(
                    category = err.category().as_str(),
                    error = %err,
                    "Strict validation failed"
                );
                err.findings().cloned().ok_or(err)?
            }
        }
    } else {
        validate(Some(&payload), &opts)
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        for line in render_validation(&result) {
            println!("{line}");
        }
    }
    Ok(validation_exit_code(result.status))
}

fn run_adapt(args: &TraceArgs) -> Result<i32> {
    let Some(vm) = adapt_input(args)? else {
        print_no_trace(args.json);
        return Ok(EXIT_NO_TRACE);
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&vm)?);
    } else {
        for line in render_view_model(&vm) {
            println!("{line}");
        }
    }
    Ok(view_exit_code(&vm))
}

fn run_sections(args: &TraceArgs) -> Result<i32> {
    let Some(vm) = adapt_input(args)? else {
        print_no_trace(args.json);
        return Ok(EXIT_NO_TRACE);
    };

    let decisions = RenderPermissionGate::default().decide_all(&vm);
    if args.json {
        let output = serde_json::json!({
            "adapterStatus": vm.adapter_status,
            "sections": decisions,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        for line in render_sections(&vm, &decisions) {
            println!("{line}");
        }
    }
    Ok(view_exit_code(&vm))
}

fn adapt_input(args: &TraceArgs) -> Result<Option<ViewModel>> {
    let adapter = TraceAdapter::new(args.load_config()?);
    let text = args.read_input()?;
    Ok(adapter.adapt_str(&text))
}

fn print_no_trace(json: bool) {
    if json {
        println!("null");
    } else {
        println!("No trace available");
    }
}

fn issue_line(tag: &str, issue: &ValidationIssue) -> String {
    let tag = if issue.escalated { "ESCALATED" } else { tag };
    match &issue.field {
        Some(field) => format!("  [{tag}] {field}: {}", issue.message),
        None => format!("  [{tag}] {}", issue.message),
    }
}

pub fn render_validation(result: &ValidationResult) -> Vec<String> {
    let mut lines = vec![format!("Trace validation: {}", result.status)];
    lines.extend(result.errors.iter().map(|e| issue_line("ERROR", e)));
    lines.extend(result.warnings.iter().map(|w| issue_line("WARN", w)));
    lines
}

pub fn render_view_model(vm: &ViewModel) -> Vec<String> {
    let unknown = "unknown";
    let mut lines = vec![
        format!("Adapter status: {}", vm.adapter_status),
        format!("Validation: {}", vm.validation_status),
        format!("Trace: {}", vm.trace_id.as_deref().unwrap_or(unknown)),
        format!("Run: {}", vm.run_id.as_deref().unwrap_or(unknown)),
        format!("Mode: {}", vm.mode.as_deref().unwrap_or(unknown)),
        format!(
            "Epistemic status: {}",
            vm.epistemic_status.as_deref().unwrap_or(unknown)
        ),
        format!("Claims: {}", vm.claims.len()),
    ];
    if vm.flags.standby {
        lines.push("Standby: no claims by design".to_string());
    }
    if vm.flags.streaming {
        lines.push("Streaming: trace is still being produced".to_string());
    }
    lines.extend(vm.errors.iter().map(|e| issue_line("ERROR", e)));
    lines.extend(vm.warnings.iter().map(|w| issue_line("WARN", w)));
    lines
}

pub fn render_sections(
    vm: &ViewModel,
    decisions: &BTreeMap<Section, PermissionDecision>,
) -> Vec<String> {
    let mut lines = vec![format!("Adapter status: {}", vm.adapter_status)];
    for (section, decision) in decisions {
        let verdict = if decision.allowed { "render" } else { "hide" };
        lines.push(format!(
            "  {section}: {verdict} ({})",
            decision.reasons.join("; ")
        ));
    }
    lines
}
