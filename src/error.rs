use std::path::PathBuf;

use reqwest::StatusCode;
use thiserror::Error;

/// Errors surfaced by the bootstrap library.
///
/// `ConfigNotFound`/`ConfigParse` are startup-fatal. `AlreadyInitialized` and
/// `UnsealFailed` abort a bootstrap run. `MountExists` is returned by the
/// client but treated as success-equivalent by the orchestrator.
#[derive(Debug, Error)]
pub enum Error {
    #[error("config file not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error("failed to parse config file: {0}")]
    ConfigParse(#[from] config::ConfigError),

    #[error("backend is already initialized; pass a root token to resume")]
    AlreadyInitialized,

    #[error("backend is still sealed after submitting {submitted} unseal shares")]
    UnsealFailed { submitted: usize },

    #[error("kv mount path {0:?} is already in use")]
    MountExists(String),

    #[error("no root token available; initialize the backend or pass a resume token")]
    TokenMissing,

    #[error("backend request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("backend API error ({status}): {message}")]
    Api { status: StatusCode, message: String },

    #[error("failed to decode backend response: {0}")]
    Decode(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
