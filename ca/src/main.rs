//! Challenge Architect - CLI entry point

use std::fs;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

use chrono::Local;
use clap::Parser;
use colored::Colorize;
use eyre::{Context, Result};
use tracing::{debug, info};

use challenge_architect::architect::ChallengeArchitect;
use challenge_architect::cli::{Cli, Command, get_log_dir, get_log_path};
use challenge_architect::config::Config;
use challenge_architect::recommend::{RecommendationKind, Recommender};
use challenge_architect::schema::{catalog_provider, entry_type};
use challenge_architect::server::{self, AppState};
use challenge_architect::session::{ChannelError, ConsoleChannel, SessionRegistry};
use challenge_architect::workflow::WorkflowError;

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Note: Can't log params here since logging isn't initialized yet
    let log_dir = get_log_dir();
    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    // Append so that `ca logs` still sees earlier runs
    let log_file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(get_log_path())
        .context("Failed to open log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_log_level = Config::load_log_level(cli.config.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    info!(
        "Challenge Architect loaded config: provider={}, model={}",
        config.llm.provider, config.llm.model
    );

    match cli.command {
        Some(Command::Chat { goal, quiet }) => cmd_chat(&config, goal, quiet).await,
        Some(Command::Serve { bind, port }) => cmd_serve(&config, bind, port).await,
        Some(Command::Recommend {
            kind,
            problem,
            challenge_type,
        }) => cmd_recommend(&config, kind, &problem, &challenge_type).await,
        Some(Command::Schemas) => cmd_schemas(&config),
        Some(Command::Logs { follow, lines }) => cmd_logs(follow, lines),
        // Default: one interactive session
        None => cmd_chat(&config, None, false).await,
    }
}

fn project_root() -> Result<PathBuf> {
    std::env::current_dir().context("Failed to determine current directory")
}

/// Run one session on the terminal
async fn cmd_chat(config: &Config, goal: Option<String>, quiet: bool) -> Result<()> {
    debug!(?goal, %quiet, "cmd_chat: called");
    config.validate()?;
    let architect = ChallengeArchitect::from_config(config, &project_root()?)?;
    let channel = ConsoleChannel::new(config.workflow.show_debug && !quiet).with_first_reply(goal);

    match architect.process_challenge(None, &channel).await {
        Ok(outcome) => {
            info!(fields = outcome.specification.len(), "cmd_chat: specification complete");
            Ok(())
        }
        Err(WorkflowError::Channel(ChannelError::Interrupted)) => {
            println!("\n{}", "Interrupted. Goodbye!".dimmed());
            Ok(())
        }
        Err(e) => Err(e).context("Challenge session failed"),
    }
}

/// Serve sessions until stopped
async fn cmd_serve(config: &Config, bind: Option<String>, port: Option<u16>) -> Result<()> {
    debug!(?bind, ?port, "cmd_serve: called");
    config.validate()?;
    let root = project_root()?;

    let architect = ChallengeArchitect::from_config(config, &root)?;
    let recommender = Recommender::from_config(config, &root).context("Failed to create recommender")?;
    let state = AppState::new(SessionRegistry::new(architect), recommender);

    let bind = bind.unwrap_or_else(|| config.server.bind.clone());
    let port = port.unwrap_or(config.server.port);
    println!("Challenge Architect listening on ws://{}:{}/ws", bind, port);

    server::serve(state, &bind, port).await
}

/// Ask one recommender and print the JSON result
async fn cmd_recommend(config: &Config, kind: RecommendationKind, problem: &str, challenge_type: &str) -> Result<()> {
    debug!(%kind, %challenge_type, "cmd_recommend: called");
    config.validate()?;
    let recommender = Recommender::from_config(config, &project_root()?).context("Failed to create recommender")?;

    let value = recommender
        .recommend(kind, problem, challenge_type, Local::now().date_naive())
        .await;
    match value.as_str() {
        Some(text) => println!("{}", text),
        None => println!("{}", serde_json::to_string_pretty(&value)?),
    }
    Ok(())
}

/// List catalog challenge types
fn cmd_schemas(config: &Config) -> Result<()> {
    debug!("cmd_schemas: called");
    let catalog = catalog_provider(config.workflow.schema_file.as_deref())
        .load()
        .context("Failed to load schema catalog")?;

    println!("{}", "Challenge types:".bold());
    for entry in &catalog {
        println!("  {}", entry_type(entry).unwrap_or("<untyped>"));
    }
    Ok(())
}

/// Show or follow the log file
fn cmd_logs(follow: bool, lines: usize) -> Result<()> {
    let log_path = get_log_path();

    if !log_path.exists() {
        println!("No log file found at: {}", log_path.display());
        return Ok(());
    }

    if follow {
        println!("Following log file: {} (Ctrl+C to stop)", log_path.display());
        println!();

        let mut child = std::process::Command::new("tail")
            .args(["-f", "-n", &lines.to_string()])
            .arg(&log_path)
            .spawn()
            .context("Failed to run tail -f")?;

        child.wait()?;
    } else {
        let file = fs::File::open(&log_path).context("Failed to open log file")?;
        let reader = BufReader::new(file);
        let all_lines: Vec<String> = reader.lines().map_while(Result::ok).collect();

        let start = all_lines.len().saturating_sub(lines);
        for line in &all_lines[start..] {
            println!("{}", line);
        }
    }

    Ok(())
}
