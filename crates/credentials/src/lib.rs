//! Credential registry interface for Nation DAO
//!
//! Governance rights are conferred by holding a non-fungible credential. The
//! registry that issues and tracks those credentials lives outside the
//! governance core; this crate defines the read interface the core consumes
//! and an in-memory registry for tests and local hosts.

use std::sync::Arc;

use thiserror::Error;

use dao_common::{Address, TokenId};

pub mod registry;

pub use registry::{MemoryCredentialRegistry, RegistrySnapshot};

/// Error types for credential registry operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OracleError {
    /// The token has never been minted or was burned
    #[error("Token not found: {0}")]
    TokenNotFound(TokenId),

    /// The token already exists
    #[error("Token already minted: {0}")]
    TokenAlreadyMinted(TokenId),

    /// The acting address does not own the token
    #[error("Address {address} does not own token {token_id}")]
    NotOwner { token_id: TokenId, address: Address },

    /// The zero address cannot hold credentials
    #[error("Zero address cannot hold credentials")]
    ZeroAddress,

    /// The registry could not answer
    #[error("Registry unavailable: {0}")]
    Unavailable(String),
}

/// Result type for credential registry operations
pub type OracleResult<T> = Result<T, OracleError>;

/// Read interface of an ERC-721 style credential registry
pub trait CredentialOracle: Send + Sync {
    /// Number of credentials held by `owner`
    fn balance_of(&self, owner: &Address) -> OracleResult<u64>;

    /// Current holder of `token_id`
    fn owner_of(&self, token_id: TokenId) -> OracleResult<Address>;
}

impl<T: CredentialOracle + ?Sized> CredentialOracle for Arc<T> {
    fn balance_of(&self, owner: &Address) -> OracleResult<u64> {
        (**self).balance_of(owner)
    }

    fn owner_of(&self, token_id: TokenId) -> OracleResult<Address> {
        (**self).owner_of(token_id)
    }
}

impl<T: CredentialOracle + ?Sized> CredentialOracle for &T {
    fn balance_of(&self, owner: &Address) -> OracleResult<u64> {
        (**self).balance_of(owner)
    }

    fn owner_of(&self, token_id: TokenId) -> OracleResult<Address> {
        (**self).owner_of(token_id)
    }
}
