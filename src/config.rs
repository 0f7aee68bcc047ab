//! TOML configuration shared by the CLI and the HTTP server.
//!
//! Every section is optional; missing keys fall back to their defaults.

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::recommend::{ScoreWeights, DEFAULT_MAX_RESULTS};

/// Fully resolved configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Scoring and result-size knobs.
    pub recommender: RecommenderSection,
    /// HTTP listener settings.
    pub server: ServerSection,
    /// Dataset location.
    pub data: DataSection,
}

/// `[recommender]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommenderSection {
    /// Result count used when a request does not specify one.
    pub default_max_results: usize,
    /// Points per preferred genre.
    pub genre_weight: u64,
    /// Points per preferred platform.
    pub platform_weight: u64,
    /// Maximum search hits.
    pub search_limit: usize,
    /// Shortest accepted search string, in characters.
    pub min_search_length: usize,
    /// Index age, in seconds, after which health reports it as stale.
    pub index_stale_after_secs: u64,
}

impl Default for RecommenderSection {
    fn default() -> Self {
        let weights = ScoreWeights::default();
        Self {
            default_max_results: DEFAULT_MAX_RESULTS,
            genre_weight: weights.genre,
            platform_weight: weights.platform,
            search_limit: 10,
            min_search_length: 2,
            index_stale_after_secs: 24 * 60 * 60,
        }
    }
}

impl RecommenderSection {
    /// Preference weights.
    pub fn weights(&self) -> ScoreWeights {
        ScoreWeights {
            genre: self.genre_weight,
            platform: self.platform_weight,
        }
    }
}

/// `[server]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    /// Interface to bind.
    pub host: String,
    /// TCP port.
    pub port: u16,
    /// Allowed CORS origins; `*` allows any.
    pub allow_origins: Vec<String>,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
            allow_origins: vec!["*".to_string()],
        }
    }
}

impl ServerSection {
    /// Parses `host:port`.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let raw = format!("{}:{}", self.host, self.port);
        raw.parse().map_err(|_| ConfigError::InvalidAddress { value: raw })
    }
}

/// `[data]`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSection {
    /// Dataset JSON file.
    pub dataset: Option<PathBuf>,
}

impl AppConfig {
    /// Loads `explicit`, or the default location when `None`. A missing file
    /// yields the defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let path = explicit.map(Path::to_path_buf).or_else(default_config_path);
        match path {
            Some(path) if path.exists() => read_file(&path),
            Some(path) if explicit.is_some() => Err(ConfigError::Missing { path }),
            _ => Ok(Self::default()),
        }
    }

    /// Parses configuration text.
    pub fn from_toml(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }
}

fn read_file(path: &Path) -> Result<AppConfig, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    AppConfig::from_toml(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Configuration loading failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An explicitly requested file does not exist.
    #[error("config file {path} does not exist")]
    Missing {
        /// Requested path.
        path: PathBuf,
    },
    /// The file could not be read.
    #[error("failed to read config {path}: {source}")]
    Read {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
    /// The file is not valid TOML for [`AppConfig`].
    #[error("failed to parse config {path}: {source}")]
    Parse {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        source: toml::de::Error,
    },
    /// `host:port` is not a socket address.
    #[error("invalid listen address '{value}'")]
    InvalidAddress {
        /// Offending value.
        value: String,
    },
}

/// `<config dir>/gamegraph/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|base| base.join("gamegraph").join("config.toml"))
}
