//! Proposal registry
//!
//! Proposals live in an arena indexed by identifier. Identifiers start at 1,
//! increase by one per proposal and are never reused; proposals are never
//! removed.

use serde::{Deserialize, Serialize};

use dao_common::{Address, ProposalId, Timestamp};

use crate::config::GovernanceConfig;
use crate::error::{GovernanceError, GovernanceResult};
use crate::voting::Tally;

/// Result of a proposal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Not finalized yet
    #[default]
    Pending,
    /// More yes votes than no votes at finalization
    Approved,
    /// Anything else, including ties
    Rejected,
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Pending => write!(f, "pending"),
            Outcome::Approved => write!(f, "approved"),
            Outcome::Rejected => write!(f, "rejected"),
        }
    }
}

/// A governance proposal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    /// Unique identifier
    pub id: ProposalId,
    /// Address that created the proposal
    pub creator: Address,
    /// Human-readable description
    pub description: String,
    /// Host time at creation
    pub created_at: Timestamp,
    /// Length of the voting window in seconds
    pub voting_duration: u64,
    /// `created_at + voting_duration`; votes are accepted strictly before it
    pub closes_at: Timestamp,
    /// Current vote counts
    pub tally: Tally,
    /// Whether the outcome has been fixed
    pub finalized: bool,
    /// Outcome, `Pending` until finalized
    pub outcome: Outcome,
    /// Host time of finalization
    pub finalized_at: Option<Timestamp>,
    /// Address that finalized the proposal
    pub finalized_by: Option<Address>,
}

impl Proposal {
    /// Whether votes are accepted at `now`
    pub fn is_open(&self, now: Timestamp) -> bool {
        !self.finalized && now < self.closes_at
    }
}

/// Check a description against the configured bounds
pub fn validate_description(description: &str, max_len: usize) -> GovernanceResult<()> {
    if description.trim().is_empty() {
        return Err(GovernanceError::invalid_input("Description cannot be empty"));
    }

    let len = description.chars().count();
    if len > max_len {
        return Err(GovernanceError::invalid_input(format!(
            "Description is {} characters, maximum is {}",
            len, max_len
        )));
    }

    Ok(())
}

/// Pick the voting window for a new proposal.
///
/// A positive override wins; a missing or zero override falls back to the
/// configured default.
pub fn resolve_duration(
    duration_override: Option<u64>,
    config: &GovernanceConfig,
) -> GovernanceResult<u64> {
    let duration = match duration_override {
        Some(requested) if requested > 0 => requested,
        _ => config.default_voting_duration,
    };

    if let Some(max) = config.max_voting_duration {
        if duration > max {
            return Err(GovernanceError::invalid_input(format!(
                "Voting duration {}s exceeds the maximum of {}s",
                duration, max
            )));
        }
    }

    Ok(duration)
}

/// Arena of proposals indexed by identifier
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Proposal>", into = "Vec<Proposal>")]
pub struct ProposalRegistry {
    proposals: Vec<Proposal>,
}

impl ProposalRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Identifier the next proposal will receive
    pub fn next_id(&self) -> ProposalId {
        self.proposals.len() as ProposalId + 1
    }

    /// Number of proposals ever created
    pub fn count(&self) -> u64 {
        self.proposals.len() as u64
    }

    /// Look up a proposal
    pub fn get(&self, id: ProposalId) -> GovernanceResult<&Proposal> {
        Self::position(id)
            .and_then(|position| self.proposals.get(position))
            .ok_or(GovernanceError::NotFound(id))
    }

    /// All proposals in ascending identifier order
    pub fn iter(&self) -> impl Iterator<Item = &Proposal> + '_ {
        self.proposals.iter()
    }

    /// Build the proposal that the next insertion would store, without storing it
    pub(crate) fn draft(
        &self,
        creator: Address,
        description: &str,
        created_at: Timestamp,
        voting_duration: u64,
    ) -> GovernanceResult<Proposal> {
        let closes_at = created_at.checked_add(voting_duration).ok_or_else(|| {
            GovernanceError::invalid_input(format!(
                "Voting window of {}s starting at {} overflows",
                voting_duration, created_at
            ))
        })?;

        Ok(Proposal {
            id: self.next_id(),
            creator,
            description: description.to_string(),
            created_at,
            voting_duration,
            closes_at,
            tally: Tally::default(),
            finalized: false,
            outcome: Outcome::Pending,
            finalized_at: None,
            finalized_by: None,
        })
    }

    /// Store a drafted proposal
    pub(crate) fn insert(&mut self, proposal: Proposal) -> GovernanceResult<ProposalId> {
        if proposal.id != self.next_id() {
            return Err(GovernanceError::invalid_input(format!(
                "Proposal id {} is out of sequence, expected {}",
                proposal.id,
                self.next_id()
            )));
        }

        let id = proposal.id;
        self.proposals.push(proposal);
        Ok(id)
    }

    pub(crate) fn get_mut(&mut self, id: ProposalId) -> GovernanceResult<&mut Proposal> {
        Self::position(id)
            .and_then(|position| self.proposals.get_mut(position))
            .ok_or(GovernanceError::NotFound(id))
    }

    fn position(id: ProposalId) -> Option<usize> {
        id.checked_sub(1).and_then(|zero_based| usize::try_from(zero_based).ok())
    }
}

impl TryFrom<Vec<Proposal>> for ProposalRegistry {
    type Error = GovernanceError;

    fn try_from(proposals: Vec<Proposal>) -> Result<Self, Self::Error> {
        let mut registry = ProposalRegistry::new();
        for proposal in proposals {
            if proposal.closes_at != proposal.created_at.saturating_add(proposal.voting_duration) {
                return Err(GovernanceError::invalid_input(format!(
                    "Proposal {} has an inconsistent closing time",
                    proposal.id
                )));
            }
            if proposal.finalized == (proposal.outcome == Outcome::Pending) {
                return Err(GovernanceError::invalid_input(format!(
                    "Proposal {} has an inconsistent outcome",
                    proposal.id
                )));
            }
            registry.insert(proposal)?;
        }
        Ok(registry)
    }
}

impl From<ProposalRegistry> for Vec<Proposal> {
    fn from(registry: ProposalRegistry) -> Self {
        registry.proposals
    }
}
