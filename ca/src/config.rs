//! Challenge Architect configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Project-local config file name
const LOCAL_CONFIG_FILE: &str = ".challenge-architect.yml";

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,

    /// Completion Service configuration used by the workflow stages
    pub llm: LlmConfig,

    /// Model settings for the standalone recommenders
    pub recommender: RecommenderConfig,

    /// Similarity Search Service configuration
    pub search: SearchConfig,

    /// Workflow behaviour
    pub workflow: WorkflowConfig,

    /// Multi-session server
    pub server: ServerConfig,
}

impl Config {
    /// Validate configuration before use
    ///
    /// Checks that required environment variables are set.
    /// Call this early in startup to fail fast with clear error messages.
    pub fn validate(&self) -> Result<()> {
        debug!("Config::validate: called");
        self.llm.get_api_key()?;
        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        debug!(?config_path, "Config::load: called");
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        for candidate in Self::search_paths() {
            if candidate.exists() {
                match Self::load_from_file(&candidate) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", candidate.display(), e);
                    }
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Read only the log level, before logging is initialised
    ///
    /// Errors are swallowed: a broken config file is reported later by `load`.
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        let candidates = match config_path {
            Some(path) => vec![path.clone()],
            None => Self::search_paths(),
        };

        candidates
            .into_iter()
            .filter(|p| p.exists())
            .find_map(|p| Self::load_from_file(&p).ok())
            .and_then(|c| c.log_level)
    }

    fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(LOCAL_CONFIG_FILE)];
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(
                config_dir
                    .join("challenge-architect")
                    .join("challenge-architect.yml"),
            );
        }
        paths
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Completion Service provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider name (currently only "openai")
    pub provider: String,

    /// Model identifier
    pub model: String,

    /// Environment variable containing the API key
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    /// API base URL
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Sampling temperature for stage conversations
    pub temperature: f32,

    /// Maximum tokens per response
    #[serde(rename = "max-tokens")]
    pub max_tokens: u32,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4.1".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            base_url: "https://api.openai.com".to_string(),
            temperature: 0.5,
            max_tokens: 4096,
            timeout_ms: 120_000,
        }
    }
}

impl LlmConfig {
    /// Read the API key from the configured environment variable
    pub fn get_api_key(&self) -> Result<String> {
        debug!(api_key_env = %self.api_key_env, "LlmConfig::get_api_key: called");
        std::env::var(&self.api_key_env).map_err(|_| {
            eyre::eyre!(
                "LLM API key not found. Set the {} environment variable.",
                self.api_key_env
            )
        })
    }

    /// Same provider and credentials, different model and temperature
    pub fn with_model(&self, model: &str, temperature: f32) -> Self {
        Self {
            model: model.to_string(),
            temperature,
            ..self.clone()
        }
    }
}

/// Recommender model settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommenderConfig {
    /// Model identifier (shares provider and key with `llm`)
    pub model: String,

    /// Sampling temperature
    pub temperature: f32,
}

impl Default for RecommenderConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            temperature: 0.7,
        }
    }
}

/// Similarity Search Service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Qdrant endpoint
    pub endpoint: String,

    /// Collection holding past challenge documents
    pub collection: String,

    /// Environment variable containing the Qdrant API key
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    /// Embedding model used to vectorise queries
    #[serde(rename = "embedding-model")]
    pub embedding_model: String,

    /// Number of documents to retrieve
    pub limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:6333".to_string(),
            collection: "challenge_templates".to_string(),
            api_key_env: "QDRANT_API_KEY".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            limit: 2,
        }
    }
}

/// Workflow behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Schema catalog file; the embedded catalog is used when unset
    #[serde(rename = "schema-file")]
    pub schema_file: Option<PathBuf>,

    /// Specification changes the human may request during discussion (unset = unlimited)
    #[serde(rename = "max-spec-changes")]
    pub max_spec_changes: Option<u32>,

    /// Upper bound on consecutive turns in one stage (unset = unbounded)
    #[serde(rename = "max-stage-turns")]
    pub max_stage_turns: Option<u32>,

    /// Show debug messages (suggestion log, reasoning trace, progress notes)
    #[serde(rename = "show-debug")]
    pub show_debug: bool,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            schema_file: None,
            max_spec_changes: None,
            max_stage_turns: None,
            show_debug: true,
        }
    }
}

/// Multi-session server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind: String,

    /// Port to listen on
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}
