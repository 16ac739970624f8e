//! Error types for governance operations

use thiserror::Error;

use dao_common::{Address, ProposalId, Timestamp};

/// Error types for governance operations
///
/// Every variant rejects the whole operation; no state is changed when one is
/// returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GovernanceError {
    /// Malformed or out-of-range arguments
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Reference to a proposal that was never created
    #[error("Proposal not found: {0}")]
    NotFound(ProposalId),

    /// The caller does not hold the required credential
    #[error("Address {0} is not eligible")]
    NotEligible(Address),

    /// The proposal is no longer accepting votes
    #[error("Voting is closed for proposal {0}")]
    VotingClosed(ProposalId),

    /// The voter already has a vote recorded on this proposal
    #[error("Address {voter} already voted on proposal {proposal_id}")]
    AlreadyVoted { proposal_id: ProposalId, voter: Address },

    /// The voting window has not closed yet
    #[error("Proposal {proposal_id} cannot be finalized before {closes_at}")]
    TooEarly {
        proposal_id: ProposalId,
        closes_at: Timestamp,
    },

    /// The proposal outcome is already fixed
    #[error("Proposal {0} is already finalized")]
    AlreadyFinalized(ProposalId),

    /// The caller is not allowed to perform this action
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// State could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl GovernanceError {
    /// Create a new invalid input error
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        GovernanceError::InvalidInput(msg.into())
    }

    /// Create a new serialization error
    pub fn serialization<S: Into<String>>(msg: S) -> Self {
        GovernanceError::Serialization(msg.into())
    }
}

impl From<serde_json::Error> for GovernanceError {
    fn from(err: serde_json::Error) -> Self {
        GovernanceError::Serialization(err.to_string())
    }
}

/// Result type for governance operations
pub type GovernanceResult<T> = Result<T, GovernanceError>;
