//! Error types for the padloop core

use thiserror::Error;

/// Errors while fetching or decoding a sound into a playable buffer
#[derive(Error, Debug)]
pub enum LoadError {
    /// Could not read a local file
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Remote fetch failed (network, non-2xx status)
    #[error("failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },

    /// The bytes were not a decodable WAV
    #[error("failed to decode {url}: {reason}")]
    Decode { url: String, reason: String },

    /// WAV decoded but the sample format is one we don't handle
    #[error("unsupported sample format in {url}: {format}")]
    UnsupportedFormat { url: String, format: String },
}

/// Errors from the fragment / catalog adapters
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("fragment not found: {0}")]
    NotFound(String),
}

/// Errors that can occur while opening the audio output
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("no default audio output device")]
    NoDevice,

    #[error("failed to get device config: {0}")]
    Config(String),

    #[error("failed to build audio stream: {0}")]
    StreamBuild(String),

    #[error("failed to start audio stream: {0}")]
    StreamPlay(String),

    #[error("unsupported sample format: {0}")]
    UnsupportedFormat(String),
}

pub type LoadResult<T> = Result<T, LoadError>;
pub type StoreResult<T> = Result<T, StoreError>;
