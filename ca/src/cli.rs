//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;

use crate::recommend::RecommendationKind;

/// Challenge Architect - turn a business goal into a challenge specification
#[derive(Parser)]
#[command(
    name = "ca",
    about = "Conversational pipeline that turns a business goal into a challenge specification",
    version,
    after_help = "Logs are written to: ~/.local/share/challenge-architect/logs/challenge-architect.log"
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(short, long, global = true, help = "Log level (overrides config)")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands
#[derive(Subcommand)]
pub enum Command {
    /// Run one interactive session in the terminal
    Chat {
        /// Business goal; asked for interactively when omitted
        goal: Option<String>,

        /// Hide debug output (suggestion log, reasoning trace)
        #[arg(short, long)]
        quiet: bool,
    },

    /// Serve sessions over WebSocket
    Serve {
        /// Address to bind to (overrides config)
        #[arg(short, long)]
        bind: Option<String>,

        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Ask a standalone recommender
    Recommend {
        /// challenge-types, audience, evaluation, prize, timeline or impact
        #[arg(value_name = "KIND")]
        kind: RecommendationKind,

        /// Problem statement to recommend for
        problem: String,

        /// Challenge type
        #[arg(short = 't', long, default_value = "development")]
        challenge_type: String,
    },

    /// List the challenge types of the schema catalog
    Schemas,

    /// Show logs
    Logs {
        /// Follow log output (like tail -f)
        #[arg(short, long)]
        follow: bool,

        /// Number of lines to show
        #[arg(short = 'n', long, default_value = "50")]
        lines: usize,
    },
}

/// Get the log file path
pub fn get_log_path() -> PathBuf {
    debug!("get_log_path: called");
    let path = get_log_dir().join("challenge-architect.log");
    debug!(?path, "get_log_path: returning path");
    path
}

/// Directory holding the log file
pub fn get_log_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("challenge-architect")
        .join("logs")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_no_command() {
        let cli = Cli::parse_from(["ca"]);
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_cli_parse_chat_with_goal() {
        let cli = Cli::parse_from(["ca", "chat", "Build a campus food app"]);
        match cli.command {
            Some(Command::Chat { goal, quiet }) => {
                assert_eq!(goal.as_deref(), Some("Build a campus food app"));
                assert!(!quiet);
            }
            _ => panic!("expected chat"),
        }
    }

    #[test]
    fn test_cli_parse_serve_overrides() {
        let cli = Cli::parse_from(["ca", "serve", "--port", "9000"]);
        assert!(matches!(cli.command, Some(Command::Serve { bind: None, port: Some(9000) })));
    }

    #[test]
    fn test_cli_parse_recommend() {
        let cli = Cli::parse_from(["ca", "recommend", "prize", "Campus food app", "-t", "design"]);
        match cli.command {
            Some(Command::Recommend {
                kind,
                problem,
                challenge_type,
            }) => {
                assert_eq!(kind, RecommendationKind::Prize);
                assert_eq!(problem, "Campus food app");
                assert_eq!(challenge_type, "design");
            }
            _ => panic!("expected recommend"),
        }
    }

    #[test]
    fn test_cli_rejects_unknown_recommendation() {
        assert!(Cli::try_parse_from(["ca", "recommend", "weather", "x"]).is_err());
    }

    #[test]
    fn test_cli_parse_logs() {
        let cli = Cli::parse_from(["ca", "logs", "-f", "-n", "100"]);
        assert!(matches!(cli.command, Some(Command::Logs { follow: true, lines: 100 })));
    }

    #[test]
    fn test_global_log_level() {
        let cli = Cli::parse_from(["ca", "--log-level", "debug", "schemas"]);
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_log_path() {
        assert!(get_log_path().ends_with("challenge-architect/logs/challenge-architect.log"));
    }
}
