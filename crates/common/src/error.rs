//! Error types shared across Nation DAO crates

use thiserror::Error;

/// Common error type for Nation DAO
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Logging could not be initialized
    #[error("Logging error: {0}")]
    Logging(String),
}

impl Error {
    /// Create a new parse error
    pub fn parse<S: Into<String>>(msg: S) -> Self {
        Error::Parse(msg.into())
    }

    /// Create a new logging error
    pub fn logging<S: Into<String>>(msg: S) -> Self {
        Error::Logging(msg.into())
    }
}
