//! Result type for Nation DAO

use crate::error::Error;

/// Result type for Nation DAO
pub type Result<T> = std::result::Result<T, Error>;
