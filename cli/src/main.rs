use clap::Parser;
use trace_contract_cli::TraceCli;
use trace_contract_cli::trace_cmd::EXIT_NO_TRACE;
use tracing_subscriber::EnvFilter;

fn main() {
    init_logging();

    let code = match TraceCli::parse().run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:#}");
            EXIT_NO_TRACE
        }
    };
    std::process::exit(code);
}

/// Logs go to stderr so `--json` output on stdout stays parseable.
fn init_logging() {
    let default_level = "warn";
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(default_level))
                .unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .try_init();
}
