use anyhow::Result;
use clap::{Parser, Subcommand};
use provisiond::config::ProvisionConfig;
use provisiond::doctor;
use tracing::info;

#[derive(Parser)]
#[command(
    name = "provisiond",
    about = "Provisioning orchestrator — installs and verifies developer-tool prerequisites",
    version
)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to a provisiond.toml config file
    #[arg(long, env = "PROVISIOND_CONFIG")]
    config: Option<std::path::PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "PROVISIOND_LOG")]
    log: Option<String>,

    /// Write logs to this file path (rotated daily). Optional.
    #[arg(long, env = "PROVISIOND_LOG_FILE")]
    log_file: Option<std::path::PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Check which prerequisites are installed (default when no subcommand
    /// given). Read-only — performs no installs.
    ///
    /// Examples:
    ///   provisiond check
    ///   provisiond check --json
    Check {
        /// Emit machine-readable JSON instead of the table.
        #[arg(long)]
        json: bool,
    },
    /// Print the effective configuration after file and env overrides.
    Config,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let _log_guard = init_logging(args.log.as_deref(), args.log_file.as_deref())?;

    let config = ProvisionConfig::load(args.config.as_deref());

    match args.command.unwrap_or(Command::Check { json: false }) {
        Command::Check { json } => run_check(&config, json),
        Command::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

fn run_check(config: &ProvisionConfig, json: bool) -> Result<()> {
    let results = doctor::run_preflight(config);

    if json {
        let value: Vec<serde_json::Value> = results
            .iter()
            .map(|r| {
                serde_json::json!({
                    "name": r.name,
                    "passed": r.passed,
                    "detail": r.detail,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        doctor::print_preflight_results(&results);
    }

    if results.iter().any(|r| !r.passed) {
        std::process::exit(1);
    }
    Ok(())
}

/// Initialise tracing: env-filter console output plus an optional
/// daily-rotated log file. Returns the file appender guard, which must stay
/// alive for the process lifetime.
fn init_logging(
    level: Option<&str>,
    log_file: Option<&std::path::Path>,
) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_new(level.unwrap_or("info"))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    match log_file {
        Some(path) => {
            let dir = path.parent().unwrap_or_else(|| std::path::Path::new("."));
            let file = path
                .file_name()
                .map(|f| f.to_string_lossy().to_string())
                .unwrap_or_else(|| "provisiond.log".to_string());
            let appender = tracing_appender::rolling::daily(dir, file);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            info!(path = %path.display(), "logging to file");
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
            Ok(None)
        }
    }
}
