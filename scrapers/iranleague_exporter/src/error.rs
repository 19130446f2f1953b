use thiserror::Error;

#[derive(Debug, Error)]
pub enum CrawlerError {
    #[error("Invalid date format: {0}")]
    InvalidDateFormat(String),

    #[error("Invalid time format: {0}")]
    InvalidTimeFormat(String),

    #[error("HTTP error: {status_code}")]
    Http { status_code: u16 },

    #[error("timeout")]
    Timeout,

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

impl From<reqwest::Error> for CrawlerError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            CrawlerError::Timeout
        } else if err.is_connect() {
            CrawlerError::Connection(err.to_string())
        } else if let Some(status) = err.status() {
            CrawlerError::Http {
                status_code: status.as_u16(),
            }
        } else {
            CrawlerError::Request(err.to_string())
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Environment variable '{key}' must be {expected}")]
    InvalidValue { key: String, expected: String },
}

pub type Result<T> = std::result::Result<T, CrawlerError>;
