//! Proposal lifecycle
//!
//! Open -> Closed -> Finalized, driven by host time and the finalize call.
//! Transitions only move forward.

use serde::{Deserialize, Serialize};

use dao_common::{Address, Timestamp};

use crate::config::FinalizePolicy;
use crate::error::{GovernanceError, GovernanceResult};
use crate::proposals::{Outcome, Proposal};
use crate::voting::Tally;

/// Where a proposal is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Accepting votes
    Open,
    /// Window elapsed, waiting for finalization
    Closed,
    /// Outcome fixed
    Finalized,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Open => write!(f, "open"),
            Phase::Closed => write!(f, "closed"),
            Phase::Finalized => write!(f, "finalized"),
        }
    }
}

/// Phase of `proposal` at `now`
pub fn phase(proposal: &Proposal, now: Timestamp) -> Phase {
    if proposal.finalized {
        Phase::Finalized
    } else if proposal.is_open(now) {
        Phase::Open
    } else {
        Phase::Closed
    }
}

/// Outcome for a final tally: approved only on a strict majority of yes votes
pub fn decide_outcome(tally: &Tally) -> Outcome {
    if tally.yes > tally.no {
        Outcome::Approved
    } else {
        Outcome::Rejected
    }
}

/// Enforces lifecycle transitions
#[derive(Debug, Clone)]
pub struct LifecycleController {
    policy: FinalizePolicy,
    administrator: Address,
}

impl LifecycleController {
    /// Create a new controller
    pub fn new(policy: FinalizePolicy, administrator: Address) -> Self {
        Self {
            policy,
            administrator,
        }
    }

    /// The finalize policy in force
    pub fn policy(&self) -> FinalizePolicy {
        self.policy
    }

    /// Reject votes outside the open window
    pub fn ensure_open(&self, proposal: &Proposal, now: Timestamp) -> GovernanceResult<()> {
        match phase(proposal, now) {
            Phase::Open => Ok(()),
            Phase::Closed | Phase::Finalized => Err(GovernanceError::VotingClosed(proposal.id)),
        }
    }

    /// Check that `caller` may finalize under the configured policy
    pub fn authorize_finalizer(&self, caller: &Address) -> GovernanceResult<()> {
        match self.policy {
            FinalizePolicy::Permissionless => Ok(()),
            FinalizePolicy::AdministratorOnly if *caller == self.administrator => Ok(()),
            FinalizePolicy::AdministratorOnly => Err(GovernanceError::PermissionDenied(format!(
                "Only the administrator may finalize, {} is not",
                caller
            ))),
        }
    }

    /// Check every finalize precondition and return the outcome to record
    pub fn check_finalize(
        &self,
        proposal: &Proposal,
        caller: &Address,
        now: Timestamp,
    ) -> GovernanceResult<Outcome> {
        self.authorize_finalizer(caller)?;

        if now < proposal.closes_at {
            return Err(GovernanceError::TooEarly {
                proposal_id: proposal.id,
                closes_at: proposal.closes_at,
            });
        }

        if proposal.finalized {
            return Err(GovernanceError::AlreadyFinalized(proposal.id));
        }

        Ok(decide_outcome(&proposal.tally))
    }
}
