use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("CRM request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("CRM returned {status} for {path}: {body}")]
    UpstreamStatus {
        path: String,
        status: u16,
        body: String,
    },

    /// Retryable failures (429/5xx) persisted past the retry budget.
    #[error("CRM unavailable for {path} after {attempts} attempts (last status {status})")]
    UpstreamUnavailable {
        path: String,
        attempts: u32,
        status: u16,
    },

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("range covers {days} days, more than the {max} allowed")]
    RangeTooLong { days: i64, max: i64 },

    #[error("invalid query string: {0}")]
    InvalidQuery(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Decode(e.to_string())
    }
}

impl From<url::ParseError> for Error {
    fn from(e: url::ParseError) -> Self {
        Error::Config(format!("invalid URL: {e}"))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
