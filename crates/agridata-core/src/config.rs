use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::outputs::{OutputTarget, DEFAULT_CLEANED_FILE, DEFAULT_REPORT_FILE};

pub const DEFAULT_CONFIG_FILE: &str = "agridata.toml";
pub const DEFAULT_INPUT_PATH: &str = "data/raw/icrisat_district_data.csv";
pub const DEFAULT_OUTPUT_DIR: &str = "data/processed";
pub const DEFAULT_ANALYSIS_DIR: &str = "analysis_exports";
pub const DEFAULT_BATCH_SIZE: usize = 10_000;
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("environment variable {name} has invalid value {value:?}")]
    InvalidEnv { name: &'static str, value: String },

    #[error(
        "no database configured; set DATABASE_URL (or AGRIDATA_DATABASE_URL) or the [database] table"
    )]
    MissingDatabase,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct AgriConfig {
    pub input_path: PathBuf,
    pub output_dir: PathBuf,
    pub cleaned_file_name: String,
    pub report_file_name: String,
    pub database: DatabaseConfig,
    pub load: LoadConfig,
    pub analysis: AnalysisConfig,
}

impl Default for AgriConfig {
    fn default() -> Self {
        Self {
            input_path: PathBuf::from(DEFAULT_INPUT_PATH),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            cleaned_file_name: DEFAULT_CLEANED_FILE.to_string(),
            report_file_name: DEFAULT_REPORT_FILE.to_string(),
            database: DatabaseConfig::default(),
            load: LoadConfig::default(),
            analysis: AnalysisConfig::default(),
        }
    }
}

/// Either a full `url`, or the parts the URL is composed from.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub name: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub pool: PoolConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            acquire_timeout_secs: DEFAULT_ACQUIRE_TIMEOUT_SECS,
        }
    }
}

impl DatabaseConfig {
    pub fn connection_url(&self) -> Result<String, ConfigError> {
        if let Some(url) = &self.url {
            return Ok(url.clone());
        }

        let name = self.name.as_deref().ok_or(ConfigError::MissingDatabase)?;
        let host = self.host.as_deref().unwrap_or("localhost");
        let port = self.port.unwrap_or(5432);
        let credentials = match (&self.user, &self.password) {
            (Some(user), Some(password)) => format!("{user}:{password}@"),
            (Some(user), None) => format!("{user}@"),
            _ => String::new(),
        };

        Ok(format!("postgres://{credentials}{host}:{port}/{name}"))
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct LoadConfig {
    /// Rows per multi-row INSERT, before the bind-parameter cap applies.
    pub batch_size: usize,
    /// Empty the warehouse tables before loading.
    pub truncate: bool,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            truncate: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisConfig {
    pub output_dir: PathBuf,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(DEFAULT_ANALYSIS_DIR),
        }
    }
}

impl AgriConfig {
    /// Reads `path` when given; otherwise `agridata.toml` in the working
    /// directory if present, falling back to defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::from_file(default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Applies `AGRIDATA_*` and `DATABASE_URL` overrides from the process
    /// environment (after `.env` has been loaded).
    pub fn with_env(self) -> Result<Self, ConfigError> {
        self.with_env_from(|name| std::env::var(name).ok())
    }

    pub fn with_env_from<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(input) = lookup("AGRIDATA_INPUT") {
            self.input_path = PathBuf::from(input);
        }
        if let Some(dir) = lookup("AGRIDATA_OUTPUT_DIR") {
            self.output_dir = PathBuf::from(dir);
        }
        if let Some(url) = lookup("AGRIDATA_DATABASE_URL").or_else(|| lookup("DATABASE_URL")) {
            self.database.url = Some(url);
        }
        if let Some(value) = lookup("AGRIDATA_BATCH_SIZE") {
            self.load.batch_size = value
                .parse::<usize>()
                .ok()
                .filter(|size| *size > 0)
                .ok_or(ConfigError::InvalidEnv {
                    name: "AGRIDATA_BATCH_SIZE",
                    value,
                })?;
        }
        if let Some(value) = lookup("AGRIDATA_DB_MAX_CONNECTIONS") {
            self.database.pool.max_connections = value
                .parse::<u32>()
                .ok()
                .filter(|size| *size > 0)
                .ok_or(ConfigError::InvalidEnv {
                    name: "AGRIDATA_DB_MAX_CONNECTIONS",
                    value,
                })?;
        }
        Ok(self)
    }

    pub fn output_target(&self) -> OutputTarget {
        OutputTarget {
            dir: self.output_dir.clone(),
            cleaned_file_name: self.cleaned_file_name.clone(),
            report_file_name: self.report_file_name.clone(),
        }
    }

    pub fn cleaned_path(&self) -> PathBuf {
        self.output_dir.join(&self.cleaned_file_name)
    }
}
