//! Command-line front end for the trace contract layer.

pub mod trace_cmd;

pub use trace_cmd::{TraceArgs, TraceCli, TraceSubcommand};
