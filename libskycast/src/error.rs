//! Error types for Skycast

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SkycastError>;

#[derive(Error, Debug)]
pub enum SkycastError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl SkycastError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            SkycastError::InvalidInput(_) => 3,
            SkycastError::Api(ApiError::Authentication(_)) => 2,
            SkycastError::Api(_) => 1,
            SkycastError::Config(_) => 1,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },

    #[error("Could not determine the user config directory")]
    NoConfigDir,
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("{what} failed with HTTP {status}: {detail}")]
    Status {
        what: String,
        status: u16,
        detail: String,
    },

    #[error("Network error: {0}")]
    Network(String),

    #[error("{what} failed after {attempts} attempts: {reason}")]
    RetriesExhausted {
        what: String,
        attempts: u32,
        reason: String,
    },
}
