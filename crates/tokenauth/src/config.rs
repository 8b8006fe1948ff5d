//! Token and password-hashing configuration.
//!
//! Values are layered: built-in defaults, then an optional TOML file, then
//! the `TOKEN_LENGTH` and `BCRYPT_COST` environment variables.

use std::collections::HashMap;
use std::path::Path;

use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default length of issued plaintext tokens.
pub const DEFAULT_TOKEN_LENGTH: usize = 26;

/// Longest plaintext token a configuration may ask for.
pub const MAX_TOKEN_LENGTH: usize = 512;

/// Default bcrypt work factor.
pub const DEFAULT_BCRYPT_COST: u32 = bcrypt::DEFAULT_COST;

/// Lowest cost bcrypt accepts.
pub const MIN_BCRYPT_COST: u32 = 4;

/// Highest cost bcrypt accepts.
pub const MAX_BCRYPT_COST: u32 = 31;

/// Environment variables read by [`AuthConfig::load`].
const ENV_KEYS: [&str; 2] = ["TOKEN_LENGTH", "BCRYPT_COST"];

/// Authentication configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Exact length of every issued plaintext token.
    pub token_length: usize,

    /// bcrypt cost used when hashing passwords.
    pub bcrypt_cost: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_length: DEFAULT_TOKEN_LENGTH,
            bcrypt_cost: DEFAULT_BCRYPT_COST,
        }
    }
}

impl AuthConfig {
    /// Load configuration from an optional TOML file and the process
    /// environment.
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let env: HashMap<String, String> = std::env::vars()
            .filter(|(key, _)| ENV_KEYS.contains(&key.as_str()))
            .collect();
        Self::load_with_env(file, env)
    }

    /// Load configuration using an explicit set of environment variables.
    pub fn load_with_env(
        file: Option<&Path>,
        env: HashMap<String, String>,
    ) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .set_default("token_length", DEFAULT_TOKEN_LENGTH as i64)?
            .set_default("bcrypt_cost", i64::from(DEFAULT_BCRYPT_COST))?;

        if let Some(path) = file {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(false));
        }

        let built = builder
            .add_source(Environment::default().source(Some(env)).try_parsing(true))
            .build()?;

        let config: AuthConfig = built.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_TOKEN_LENGTH).contains(&self.token_length) {
            return Err(ConfigError::InvalidTokenLength(self.token_length));
        }

        if !(MIN_BCRYPT_COST..=MAX_BCRYPT_COST).contains(&self.bcrypt_cost) {
            return Err(ConfigError::InvalidCost(self.bcrypt_cost));
        }

        Ok(())
    }
}

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A source could not be read or a value could not be parsed.
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    /// Token length must be within 1..=512.
    #[error("token length must be between 1 and {max}, got {0}", max = MAX_TOKEN_LENGTH)]
    InvalidTokenLength(usize),

    /// bcrypt only accepts costs in 4..=31.
    #[error("bcrypt cost must be between {min} and {max}, got {0}", min = MIN_BCRYPT_COST, max = MAX_BCRYPT_COST)]
    InvalidCost(u32),
}
