//! Voting ledger
//!
//! Records at most one vote per (proposal, voter) pair. Records are kept in
//! the order they were cast and are never modified or removed.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use dao_common::{Address, ProposalId, Timestamp};

use crate::error::{GovernanceError, GovernanceResult};

/// Running yes/no counts for a proposal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Tally {
    /// Votes in support
    pub yes: u64,
    /// Votes in opposition
    pub no: u64,
}

impl Tally {
    /// Create a tally from explicit counts
    pub fn new(yes: u64, no: u64) -> Self {
        Self { yes, no }
    }

    /// Count one vote
    pub fn record(&mut self, support: bool) {
        if support {
            self.yes += 1;
        } else {
            self.no += 1;
        }
    }

    /// Total votes counted
    pub fn total(&self) -> u64 {
        self.yes + self.no
    }
}

/// A single cast vote
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRecord {
    /// Proposal voted on
    pub proposal_id: ProposalId,
    /// Voting address
    pub voter: Address,
    /// true = support, false = oppose
    pub support: bool,
    /// Host time at which the vote was cast
    pub cast_at: Timestamp,
}

/// Append-only vote store keyed by (proposal, voter)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<VoteRecord>", into = "Vec<VoteRecord>")]
pub struct VotingLedger {
    records: Vec<VoteRecord>,
    index: HashMap<(ProposalId, Address), usize>,
}

impl VotingLedger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `voter` has a vote on `proposal_id`
    pub fn has_voted(&self, proposal_id: ProposalId, voter: &Address) -> bool {
        self.index.contains_key(&(proposal_id, *voter))
    }

    /// The vote `voter` cast on `proposal_id`, if any
    pub fn get(&self, proposal_id: ProposalId, voter: &Address) -> Option<&VoteRecord> {
        self.index
            .get(&(proposal_id, *voter))
            .map(|&position| &self.records[position])
    }

    /// Votes on `proposal_id` in the order they were cast
    pub fn votes_for(&self, proposal_id: ProposalId) -> impl Iterator<Item = &VoteRecord> + '_ {
        self.records
            .iter()
            .filter(move |record| record.proposal_id == proposal_id)
    }

    /// All votes in the order they were cast
    pub fn records(&self) -> &[VoteRecord] {
        &self.records
    }

    /// Recount the tally of `proposal_id` from the stored records
    pub fn recount(&self, proposal_id: ProposalId) -> Tally {
        self.votes_for(proposal_id).fold(Tally::default(), |mut tally, record| {
            tally.record(record.support);
            tally
        })
    }

    /// Number of votes recorded
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no vote has been recorded
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Store a vote. A second vote for the same key is rejected and nothing is
    /// stored.
    pub(crate) fn insert(&mut self, record: VoteRecord) -> GovernanceResult<()> {
        let key = (record.proposal_id, record.voter);
        if self.index.contains_key(&key) {
            return Err(GovernanceError::AlreadyVoted {
                proposal_id: record.proposal_id,
                voter: record.voter,
            });
        }

        self.index.insert(key, self.records.len());
        self.records.push(record);
        Ok(())
    }
}

impl TryFrom<Vec<VoteRecord>> for VotingLedger {
    type Error = GovernanceError;

    fn try_from(records: Vec<VoteRecord>) -> Result<Self, Self::Error> {
        let mut ledger = VotingLedger::new();
        for record in records {
            ledger.insert(record)?;
        }
        Ok(ledger)
    }
}

impl From<VotingLedger> for Vec<VoteRecord> {
    fn from(ledger: VotingLedger) -> Self {
        ledger.records
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vote(proposal_id: ProposalId, voter: u64, support: bool) -> VoteRecord {
        VoteRecord {
            proposal_id,
            voter: Address::from_low_u64_be(voter),
            support,
            cast_at: 10,
        }
    }

    #[test]
    fn test_tally_counts() {
        let mut tally = Tally::default();
        tally.record(true);
        tally.record(true);
        tally.record(false);
        assert_eq!(tally, Tally::new(2, 1));
        assert_eq!(tally.total(), 3);
    }

    #[test]
    fn test_insert_rejects_second_vote() {
        let mut ledger = VotingLedger::new();
        ledger.insert(vote(1, 1, true)).unwrap();

        let err = ledger.insert(vote(1, 1, false)).unwrap_err();
        assert_eq!(
            err,
            GovernanceError::AlreadyVoted {
                proposal_id: 1,
                voter: Address::from_low_u64_be(1),
            }
        );

        // The original vote is untouched
        assert_eq!(ledger.len(), 1);
        assert!(ledger.get(1, &Address::from_low_u64_be(1)).unwrap().support);
    }

    #[test]
    fn test_same_voter_on_different_proposals() {
        let mut ledger = VotingLedger::new();
        ledger.insert(vote(1, 1, true)).unwrap();
        ledger.insert(vote(2, 1, false)).unwrap();
        ledger.insert(vote(1, 2, false)).unwrap();

        assert_eq!(ledger.recount(1), Tally::new(1, 1));
        assert_eq!(ledger.recount(2), Tally::new(0, 1));
        assert_eq!(ledger.votes_for(1).count(), 2);
        assert!(!ledger.has_voted(2, &Address::from_low_u64_be(2)));
    }

    #[test]
    fn test_deserialize_rejects_duplicate_records() {
        let records = vec![vote(1, 1, true), vote(1, 1, true)];
        let json = serde_json::to_string(&records).unwrap();
        assert!(serde_json::from_str::<VotingLedger>(&json).is_err());
    }
}
