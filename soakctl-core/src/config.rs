use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::postgres::PgConnectOptions;
use tracing::debug;

use crate::error::{Result, SoakError};

/// Connection ceiling for the shared pool.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 50;

/// Effectively unbounded; a soak run is stopped by a failure, not by this.
pub const DEFAULT_ROUNDS: u64 = 1_000_000_000;

/// Load environment variables from .env files
///
/// Priority order (highest to lowest):
/// 1. Environment variables already set
/// 2. Current directory .env
/// 3. ~/.soakctl/.env
///
/// dotenvy never overwrites a variable that is already present, so the
/// first file to define a key wins. Runs before logging is set up, so the
/// files that were loaded are returned for the caller to report.
pub fn load_dotenv() -> Vec<PathBuf> {
    let mut loaded_from = Vec::new();

    if let Ok(path) = dotenvy::dotenv() {
        loaded_from.push(path);
    }

    if let Some(env_file) = config_dir().map(|dir| dir.join(".env")) {
        if env_file.exists() && dotenvy::from_path(&env_file).is_ok() {
            loaded_from.push(env_file);
        }
    }

    loaded_from
}

/// Get the soakctl config directory path (~/.soakctl)
pub fn config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".soakctl"))
}

// ============================================================================
// TOML Configuration
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub database: DatabaseSection,

    #[serde(default)]
    pub run: RunSection,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseSection {
    #[serde(default)]
    pub url: Option<String>,

    #[serde(default)]
    pub max_connections: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSection {
    #[serde(default)]
    pub rounds: Option<u64>,
}

impl FileConfig {
    /// Load config from TOML files
    ///
    /// Priority order (highest to lowest):
    /// 1. ./soakctl.toml
    /// 2. ~/.soakctl/config.toml
    ///
    /// Missing files are skipped. A file that exists but cannot be read or
    /// parsed is a configuration error.
    pub fn load() -> Result<Self> {
        let global = config_dir().map(|d| d.join("config.toml"));
        Self::load_from(global.as_deref(), Path::new("soakctl.toml"))
    }

    fn load_from(global: Option<&Path>, local: &Path) -> Result<Self> {
        let mut config = FileConfig::default();

        if let Some(global) = global {
            if let Some(parsed) = Self::read_if_present(global)? {
                config = config.merge(parsed);
            }
        }

        if let Some(parsed) = Self::read_if_present(local)? {
            config = config.merge(parsed);
        }

        Ok(config)
    }

    /// Load a single file; read and parse failures are configuration errors.
    pub fn from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            SoakError::config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&contents)
            .map_err(|e| SoakError::config(format!("Failed to parse {}: {}", path.display(), e)))
    }

    pub fn from_toml(contents: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    fn read_if_present(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let parsed = Self::from_path(path)?;
        debug!("Loaded config from {}", path.display());
        Ok(Some(parsed))
    }

    /// Merge two configs field by field (right overrides left)
    fn merge(self, overlay: Self) -> Self {
        Self {
            database: DatabaseSection {
                url: overlay.database.url.or(self.database.url),
                max_connections: overlay
                    .database
                    .max_connections
                    .or(self.database.max_connections),
            },
            run: RunSection {
                rounds: overlay.run.rounds.or(self.run.rounds),
            },
        }
    }
}

// ============================================================================
// Resolved settings
// ============================================================================

/// Values supplied on the command line or through the environment.
/// `None` means "not given", so the file config or default applies.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub database_url: Option<String>,
    pub max_connections: Option<u32>,
    pub rounds: Option<u64>,
}

/// Fully resolved and validated settings for one soak run.
#[derive(Debug, Clone)]
pub struct SoakConfig {
    pub connect_options: PgConnectOptions,
    pub max_connections: u32,
    pub rounds: u64,
}

impl SoakConfig {
    /// Resolve overrides over file config over defaults, then validate.
    ///
    /// Nothing here touches the network; a bad connection string is
    /// reported before any connection attempt.
    pub fn resolve(overrides: Overrides, file: FileConfig) -> Result<Self> {
        let database_url = overrides
            .database_url
            .or(file.database.url)
            .ok_or_else(|| SoakError::config("DATABASE_URL not set"))?;
        let max_connections = overrides
            .max_connections
            .or(file.database.max_connections)
            .unwrap_or(DEFAULT_MAX_CONNECTIONS);
        let rounds = overrides
            .rounds
            .or(file.run.rounds)
            .unwrap_or(DEFAULT_ROUNDS);

        if max_connections == 0 {
            return Err(SoakError::config("max_connections must be at least 1"));
        }
        if rounds == 0 {
            return Err(SoakError::config("rounds must be at least 1"));
        }

        Ok(Self {
            connect_options: parse_database_url(&database_url)?,
            max_connections,
            rounds,
        })
    }
}

/// Parse a PostgreSQL connection string into connect options.
pub fn parse_database_url(url: &str) -> Result<PgConnectOptions> {
    let url = url.trim();
    if url.is_empty() {
        return Err(SoakError::config("DATABASE_URL is empty"));
    }
    if !(url.starts_with("postgres://") || url.starts_with("postgresql://")) {
        return Err(SoakError::config(
            "DATABASE_URL must start with postgres:// or postgresql://",
        ));
    }
    PgConnectOptions::from_str(url)
        .map_err(|e| SoakError::config(format!("invalid DATABASE_URL: {}", e)))
}
