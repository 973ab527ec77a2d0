//! Configuration management for textsim
//!
//! Loads the TOML config file, applies `TEXTSIM_SECTION__KEY` environment
//! overrides and validates the result before anything is built from it.

use crate::error::{Result, TextsimError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

mod validator;

pub use validator::ConfigValidator;

/// Category assigned to entries that arrive without one
pub const DEFAULT_CATEGORY: &str = "sin_categoria";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "_meta")]
    pub meta: MetaConfig,
    pub corpus: CorpusConfig,
    pub vectorizer: VectorizerConfig,
    pub search: SearchConfig,
    pub daemon: DaemonConfig,
}

/// Metadata about the configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaConfig {
    pub schema_version: String,
    #[serde(default = "current_timestamp")]
    pub created_at: String,
    #[serde(default = "current_timestamp")]
    pub last_modified: String,
}

fn current_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Corpus store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusConfig {
    pub default_category: String,
    /// Corpus file loaded when the daemon starts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed_file: Option<PathBuf>,
    /// Entries per extend request when bulk-loading a file
    pub load_batch_size: usize,
}

/// Feature extraction configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorizerConfig {
    /// Regex matching one word token
    pub token_pattern: String,
    pub min_token_chars: usize,
    /// Character n-gram range; set `char_ngram_max = 0` to disable n-grams
    pub char_ngram_min: usize,
    pub char_ngram_max: usize,
    pub fold_accents: bool,
    pub sublinear_tf: bool,
    #[serde(default)]
    pub stop_words: Vec<String>,
}

/// Query configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    pub default_top_n: usize,
    pub percent_decimals: u32,
    /// Appended entries after which the published index counts as stale
    pub stale_threshold: usize,
    pub collapse_duplicates: bool,
}

/// Daemon configuration for the IPC boundary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    pub socket_path: PathBuf,
    pub max_connections: usize,
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(TextsimError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| TextsimError::Io {
            source: e,
            context: format!("Failed to read config file: {:?}", path),
        })?;
        let mut config: Config = toml::from_str(&content)?;

        config.apply_env_overrides();

        ConfigValidator::validate(&config)?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| TextsimError::Io {
            source: e,
            context: format!("Failed to write config file: {:?}", path),
        })?;
        Ok(())
    }

    /// Apply environment variable overrides
    /// Environment variables in format: TEXTSIM_SECTION__KEY=value
    pub fn apply_env_overrides(&mut self) {
        for (key, value) in std::env::vars() {
            if let Some(config_key) = key.strip_prefix("TEXTSIM_") {
                if let Err(e) = self.set_value_from_env(config_key, &value) {
                    tracing::warn!("Failed to apply env override {}: {}", key, e);
                }
            }
        }
    }

    fn set_value_from_env(&mut self, path: &str, value: &str) -> Result<()> {
        match path {
            "CORPUS__DEFAULT_CATEGORY" => {
                self.corpus.default_category = value.to_string();
            }
            "CORPUS__SEED_FILE" => {
                self.corpus.seed_file = Some(PathBuf::from(value));
            }
            "CORPUS__LOAD_BATCH_SIZE" => {
                self.corpus.load_batch_size = parse_env(path, value)?;
            }
            "VECTORIZER__FOLD_ACCENTS" => {
                self.vectorizer.fold_accents = parse_env(path, value)?;
            }
            "SEARCH__DEFAULT_TOP_N" => {
                self.search.default_top_n = parse_env(path, value)?;
            }
            "SEARCH__STALE_THRESHOLD" => {
                self.search.stale_threshold = parse_env(path, value)?;
            }
            "SEARCH__COLLAPSE_DUPLICATES" => {
                self.search.collapse_duplicates = parse_env(path, value)?;
            }
            "DAEMON__SOCKET_PATH" => {
                self.daemon.socket_path = PathBuf::from(value);
            }
            _ => {
                tracing::debug!("Unknown env config key: {}", path);
            }
        }
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| TextsimError::Config("Cannot determine config directory".to_string()))?;

        Ok(config_dir.join("textsim").join("config.toml"))
    }
}

fn parse_env<T: std::str::FromStr>(path: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| TextsimError::InvalidConfigValue {
        path: path.to_string(),
        message: format!("Cannot parse '{}'", value),
    })
}

/// Spanish function words that carry no similarity signal
fn default_stop_words() -> Vec<String> {
    [
        "el", "la", "los", "las", "un", "una", "unos", "unas", "de", "del", "al", "en", "y", "o",
        "que", "se", "por", "con", "para", "es", "lo", "su", "sus", "mi", "mis", "tu", "tus",
    ]
    .iter()
    .map(|w| w.to_string())
    .collect()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            meta: MetaConfig {
                schema_version: "1.0.0".to_string(),
                created_at: current_timestamp(),
                last_modified: current_timestamp(),
            },
            corpus: CorpusConfig {
                default_category: DEFAULT_CATEGORY.to_string(),
                seed_file: None,
                load_batch_size: 5000,
            },
            vectorizer: VectorizerConfig::default(),
            search: SearchConfig::default(),
            daemon: DaemonConfig {
                socket_path: PathBuf::from("~/.textsim/textsim.sock"),
                max_connections: 64,
            },
        }
    }
}

impl Default for VectorizerConfig {
    fn default() -> Self {
        Self {
            token_pattern: r"\w+".to_string(),
            min_token_chars: 2,
            char_ngram_min: 3,
            char_ngram_max: 4,
            fold_accents: true,
            sublinear_tf: true,
            stop_words: default_stop_words(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_top_n: 5,
            percent_decimals: 2,
            stale_threshold: 1,
            collapse_duplicates: false,
        }
    }
}
