//! Nation DAO
//!
//! Credential-gated proposals and voting: holders of a governance NFT create
//! proposals and vote on them; once a proposal's voting window closes its
//! outcome is fixed by a simple majority.

/// Module version information
pub mod version {
    /// The current version of the Nation DAO library
    pub const VERSION: &str = env!("CARGO_PKG_VERSION");
}

pub use dao_common as common;
pub use dao_config as config;
pub use dao_credentials as credentials;
pub use dao_governance as governance;

pub use dao_governance::{
    CallContext, GovernanceConfig, GovernanceEngine, GovernanceError, GovernanceState, Outcome,
    Receipt,
};
