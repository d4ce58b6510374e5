//! Herald: rate-limited Bluesky DM outreach
//!
//! Main binary with subcommands:
//! - `run`: scheduler loop plus the HTTP control surface
//! - `status`: print the persisted quota snapshot
//! - `reset`: clear today's counter

use clap::{Parser, Subcommand};
use miette::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod daemon;
mod offline;

use config::{QuotaArgs, RunArgs, StateArgs};

/// Parse boolean from environment variable, accepting common truthy values.
/// Accepts "1", "true", "yes", "on" (case-insensitive) as true.
/// Accepts "0", "false", "no", "off", "" (case-insensitive) as false.
fn parse_bool_env(s: &str) -> Result<bool, String> {
    match s.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(format!(
            "invalid boolean value '{}', expected 1/true/yes/on or 0/false/no/off",
            s
        )),
    }
}

#[derive(Parser)]
#[command(name = "herald")]
#[command(about = "Rate-limited Bluesky DM outreach", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scheduler and control surface until interrupted
    Run(Box<RunArgs>),

    /// Print the persisted quota snapshot and ledger size
    Status {
        #[command(flatten)]
        state: StateArgs,

        #[command(flatten)]
        quota: QuotaArgs,
    },

    /// Set today's counter to zero (provider cap and ledger are kept)
    Reset {
        #[command(flatten)]
        state: StateArgs,

        #[command(flatten)]
        quota: QuotaArgs,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| {
                "herald=info,herald_outreach=info,herald_quota=info,herald_web=info,herald_bluesky=info,herald_compose=info"
                    .to_string()
            }),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => daemon::run(*args).await,
        Commands::Status { state, quota } => offline::status(&state.resolve(), &quota).await,
        Commands::Reset { state, quota } => offline::reset(&state.resolve(), &quota).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bool_env() {
        for truthy in ["1", "true", "YES", "On"] {
            assert_eq!(parse_bool_env(truthy), Ok(true));
        }
        for falsy in ["0", "false", "No", "off", ""] {
            assert_eq!(parse_bool_env(falsy), Ok(false));
        }
        assert!(parse_bool_env("maybe").is_err());
    }

    #[test]
    fn test_cli_is_well_formed() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_status_parses_without_credentials() {
        let cli = Cli::try_parse_from(["herald", "status", "--state-dir", "/tmp/x"]).unwrap();
        assert!(matches!(cli.command, Commands::Status { .. }));
    }
}
