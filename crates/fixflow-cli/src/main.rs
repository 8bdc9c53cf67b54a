//! # fixflow CLI entry point
//!
//! Parses command-line arguments, loads the engine configuration from the
//! environment and dispatches to subcommand handlers.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use fixflow_cli::audit::{run_audit, AuditArgs};
use fixflow_cli::device::{run_device, DeviceArgs};
use fixflow_cli::report::{run_due_today, run_overdue, run_sla, ListArgs, SlaArgs};
use fixflow_engine::{Clock, EngineConfig, SystemClock};

/// FixFlow repair desk.
///
/// Takes devices in, moves them through the repair lifecycle, and reports
/// on service-level deadlines. Engine settings come from `FIXFLOW_*`
/// environment variables.
#[derive(Parser, Debug)]
#[command(name = "fixflow", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to the JSON state file.
    #[arg(long, global = true, default_value = "fixflow-state.json")]
    state: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Device intake, transitions, assignment and remarks.
    Device(DeviceArgs),

    /// SLA standing of one or all devices.
    Sla(SlaArgs),

    /// Devices past their deadline (exit code 2 when any).
    Overdue(ListArgs),

    /// Devices whose expected return date is today.
    DueToday(ListArgs),

    /// Audit log integrity.
    Audit(AuditArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!(state = %cli.state.display(), "fixflow starting");

    let config = match EngineConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("{e}");
            eprintln!("error: {e}");
            return ExitCode::from(1);
        }
    };
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let result = match &cli.command {
        Commands::Device(args) => run_device(args, &cli.state, &config, clock),
        Commands::Sla(args) => run_sla(args, &cli.state, &config, clock),
        Commands::Overdue(args) => run_overdue(args, &cli.state, &config, clock),
        Commands::DueToday(args) => run_due_today(args, &cli.state, &config, clock),
        Commands::Audit(args) => run_audit(args, &cli.state),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::from(1)
        }
    }
}
