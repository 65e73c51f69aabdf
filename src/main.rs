use std::io;
use std::process::ExitCode;

use clap::Parser;
use scriptgc::config::MAX_MEMORY_LIMIT_MB;
use scriptgc::{ScriptHost, SourceCheckInterpreter};
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter.
const LOG_ENV: &str = "SCRIPTGC_LOG";

#[derive(Parser, Debug)]
#[command(name = "scriptgc")]
#[command(about = "Run a script under a budgeted garbage-collected heap", long_about = None)]
struct Cli {
    /// Heap budget in MiB (default 8)
    #[arg(
        short = 'm',
        value_name = "MEMORY_LIMIT_MB",
        value_parser = clap::value_parser!(u16).range(1..=MAX_MEMORY_LIMIT_MB as i64)
    )]
    memory_limit_mb: Option<u16>,

    /// Script to run
    #[arg(value_name = "FILE")]
    file: String,

    /// Arguments passed to the script
    #[arg(value_name = "ARGUMENT", trailing_var_arg = true, allow_hyphen_values = true)]
    arguments: Vec<String>,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return if err.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    init_tracing();
    tracing::debug!(?cli, "starting");

    let mut host = ScriptHost::new(SourceCheckInterpreter);
    let memory_limit_mb = cli.memory_limit_mb.map_or(0, usize::from);
    host.run(
        &cli.file,
        &cli.arguments,
        memory_limit_mb,
        &mut io::stderr().lock(),
    )
    .into()
}
