use thiserror::Error;

/// Errors surfaced by the backend client and the location parser.
#[derive(Debug, Error)]
pub enum Error {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} answered with status {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("could not decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid location {location:?}: {reason}")]
    InvalidLocation { location: String, reason: String },

    #[error("invalid time window [{start}, {stop}]")]
    InvalidWindow { start: f64, stop: f64 },

    #[error("invalid start time {0:?}, expected YYYY-MM-DDTHH:MM:SS")]
    InvalidStartTime(String),
}

pub type Result<T> = std::result::Result<T, Error>;
