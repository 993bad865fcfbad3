use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("failed to read config file {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("unknown tracker: {0}")]
    UnknownTracker(String),
}

/// Failures of the REST tracker registry. Shown to the operator, never fatal.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("not authorized to list trackers (status {0})")]
    Unauthorized(u16),

    #[error("API request failed with status {0}")]
    Status(u16),

    #[error("{0}")]
    Rejected(String),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("not connected")]
    NotConnected,

    #[error("failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),
}
