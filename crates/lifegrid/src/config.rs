//! Configuration loading from environment variables.

use anyhow::{Context, Result};
use std::path::PathBuf;

pub const DEFAULT_DB_PATH: &str = "lifegrid.db";
pub const DEFAULT_PORT: u16 = 8080;

/// Runtime configuration; CLI flags override these values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub db_path: PathBuf,
    pub port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            port: DEFAULT_PORT,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Reads `LIFEGRID_DB` and `LIFEGRID_PORT`, either from the environment
    /// or from a `.env` file. Both are optional.
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(path) = lookup("LIFEGRID_DB").filter(|p| !p.is_empty()) {
            config.db_path = PathBuf::from(path);
        }

        if let Some(port) = lookup("LIFEGRID_PORT") {
            config.port = port
                .parse()
                .with_context(|| format!("LIFEGRID_PORT is not a valid port: {}", port))?;
        }

        Ok(config)
    }
}
