use reqwest::StatusCode;
use thiserror::Error;

/// Why a stored credential cannot back a session.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CredentialError {
    #[error("no credential stored")]
    Missing,
    #[error("malformed credential: {0}")]
    Malformed(String),
    #[error("credential expired at {exp} (now {now})")]
    Expired { exp: i64, now: i64 },
}

/// A remote call that did not produce the expected success marker.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("server answered {0}")]
    Status(StatusCode),
    #[error("could not decode response: {0}")]
    Decode(String),
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config file is not valid TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("no API base URL configured (use --base-url or TASKDASH_BASE_URL)")]
    MissingBaseUrl,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("cannot open log file: {0}")]
    Logging(#[from] tracing_appender::rolling::InitError),
}
