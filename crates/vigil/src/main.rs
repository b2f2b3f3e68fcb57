//! Vigil - Build and host monitor
//!
//! # Usage
//!
//! ```bash
//! # Observe every enabled connector until Ctrl-C (default)
//! vigil
//! vigil --config configs/vigil.toml
//!
//! # Query one configured connector and print the result as JSON
//! vigil poll "core main"
//! ```

mod cmd;

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use vigil_config::{Config, LogConfig, LogFormat, LogLevel, LogOutput};

/// Vigil - Build and host monitor
#[derive(Parser, Debug)]
#[command(name = "vigil")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file (error if specified but not found)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error, off). Overrides the
    /// config file's base level; `[log.targets]` overrides still apply.
    #[arg(short, long, global = true)]
    log_level: Option<LogLevel>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Observe all enabled connectors until interrupted
    Serve(cmd::serve::ServeArgs),

    /// Query one configured connector and print its status
    Poll(cmd::poll::PollArgs),

    /// List compiled-in connector types
    Plugins,
}

/// Paths tried when `--config` is not given
const DEFAULT_CONFIG_PATHS: [&str; 2] = ["configs/vigil.toml", "vigil.toml"];

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(Command::Plugins) = cli.command {
        // Plugins doesn't need logging - just outputs to stdout
        return cmd::plugins::run();
    }

    let (config, config_path) = load_config(cli.config.as_deref())?;
    let directive = config.log.filter_directive(cli.log_level);
    init_logging(&directive, &config.log)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_path,
        log_filter = %directive,
        connectors = config.connectors.len(),
        "vigil starting"
    );

    match cli.command {
        Some(Command::Serve(args)) => cmd::serve::run(args, config).await,
        Some(Command::Poll(args)) => cmd::poll::run(args, config).await,
        Some(Command::Plugins) => cmd::plugins::run(),
        // No subcommand = observe (default behavior)
        None => cmd::serve::run(cmd::serve::ServeArgs::default(), config).await,
    }
}

/// Load the configuration and describe where it came from
///
/// An explicit path must exist; otherwise the default paths are tried and
/// an empty configuration is used when none exists.
fn load_config(path: Option<&Path>) -> Result<(Config, String)> {
    if let Some(path) = path {
        if !path.exists() {
            anyhow::bail!("config file not found: {}", path.display());
        }
        let config = Config::from_file(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?;
        return Ok((config, path.display().to_string()));
    }

    for candidate in DEFAULT_CONFIG_PATHS {
        let path = Path::new(candidate);
        if path.exists() {
            let config = Config::from_file(path)
                .with_context(|| format!("failed to load configuration from {}", candidate))?;
            return Ok((config, candidate.to_string()));
        }
    }

    Ok((Config::default(), "(defaults)".to_string()))
}

/// Initialize the tracing subscriber from a filter directive
fn init_logging(directive: &str, log: &LogConfig) -> Result<()> {
    let filter = EnvFilter::try_new(directive)
        .with_context(|| format!("invalid log filter '{}'", directive))?;

    let ansi = log.output.supports_ansi();
    let writer = match &log.output {
        LogOutput::Stdout => BoxMakeWriter::new(std::io::stdout),
        LogOutput::Stderr => BoxMakeWriter::new(std::io::stderr),
        LogOutput::File(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            BoxMakeWriter::new(std::sync::Mutex::new(file))
        }
    };

    let registry = tracing_subscriber::registry().with(filter);
    match log.format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(writer))
            .init(),
        LogFormat::Console => registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_ansi(ansi)
                    .with_writer(writer),
            )
            .init(),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_cli_flag_overrides_config_level() {
        let config = Config::from_str("[log]\nlevel = \"warn\"").unwrap();
        let cli = Cli::parse_from(["vigil", "--log-level", "trace", "plugins"]);
        assert_eq!(config.log.filter_directive(cli.log_level), "trace");
        assert_eq!(config.log.filter_directive(None), "warn");
        assert_eq!(LogConfig::default().filter_directive(None), "info");
    }

    #[test]
    fn test_unknown_cli_level_is_rejected() {
        let err = Cli::try_parse_from(["vigil", "--log-level", "loud"]).unwrap_err();
        assert!(err.to_string().contains("loud"));
    }

    #[test]
    fn test_target_overrides_build_a_valid_filter() {
        let config = Config::from_str(
            "[log.targets]\nreqwest = \"off\"\n\"vigil_connectors::jenkins\" = \"trace\"",
        )
        .unwrap();
        let directive = config.log.filter_directive(Some(LogLevel::Warn));
        assert_eq!(directive, "warn,reqwest=off,vigil_connectors::jenkins=trace");
        assert!(EnvFilter::try_new(&directive).is_ok());
    }

    #[test]
    fn test_missing_explicit_config_is_an_error() {
        let err = load_config(Some(Path::new("/nonexistent/vigil.toml"))).unwrap_err();
        assert!(err.to_string().contains("config file not found"));
    }

    #[test]
    fn test_poll_subcommand_parses() {
        let cli = Cli::parse_from(["vigil", "--log-level", "debug", "poll", "core main"]);
        assert_eq!(cli.log_level, Some(LogLevel::Debug));
        assert!(matches!(cli.command, Some(Command::Poll(_))));
    }
}
