//! Mutable governance state owned by the host
//!
//! The engine never keeps a copy of this; every mutating call borrows it
//! exclusively, which gives the single-writer discipline for free.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use dao_common::{Address, ProposalId, Timestamp};

use crate::audit::{AuditLog, AuditRecord, GovernanceEvent};
use crate::error::{GovernanceError, GovernanceResult};
use crate::lifecycle::decide_outcome;
use crate::proposals::{Outcome, Proposal, ProposalRegistry};
use crate::voting::{VoteRecord, VotingLedger};

/// Proposals, votes and the audit trail
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GovernanceState {
    proposals: ProposalRegistry,
    ledger: VotingLedger,
    audit: AuditLog,
    last_timestamp: Timestamp,
}

impl GovernanceState {
    /// Create an empty state
    pub fn new() -> Self {
        Self::default()
    }

    pub fn proposals(&self) -> &ProposalRegistry {
        &self.proposals
    }

    pub fn ledger(&self) -> &VotingLedger {
        &self.ledger
    }

    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    /// Latest host time accepted by a successful mutation
    pub fn last_timestamp(&self) -> Timestamp {
        self.last_timestamp
    }

    /// Reject host time that runs backwards
    pub(crate) fn check_clock(&self, now: Timestamp) -> GovernanceResult<()> {
        if now < self.last_timestamp {
            return Err(GovernanceError::invalid_input(format!(
                "Timestamp {} is earlier than the last observed {}",
                now, self.last_timestamp
            )));
        }
        Ok(())
    }

    pub(crate) fn commit_proposal(
        &mut self,
        proposal: Proposal,
        record: AuditRecord,
        now: Timestamp,
    ) -> GovernanceResult<ProposalId> {
        let id = self.proposals.insert(proposal)?;
        self.audit.commit(record);
        self.last_timestamp = now;
        Ok(id)
    }

    /// Store a vote and bump the tally as one unit
    pub(crate) fn commit_vote(
        &mut self,
        vote: VoteRecord,
        record: AuditRecord,
        now: Timestamp,
    ) -> GovernanceResult<()> {
        let proposal_id = vote.proposal_id;
        let support = vote.support;

        // Both lookups must succeed before anything is written
        self.proposals.get(proposal_id)?;
        self.ledger.insert(vote)?;

        let proposal = self.proposals.get_mut(proposal_id)?;
        proposal.tally.record(support);
        self.audit.commit(record);
        self.last_timestamp = now;
        Ok(())
    }

    pub(crate) fn commit_finalization(
        &mut self,
        proposal_id: ProposalId,
        outcome: Outcome,
        finalized_by: Address,
        record: AuditRecord,
        now: Timestamp,
    ) -> GovernanceResult<()> {
        let proposal = self.proposals.get_mut(proposal_id)?;
        if proposal.finalized {
            return Err(GovernanceError::AlreadyFinalized(proposal_id));
        }

        proposal.finalized = true;
        proposal.outcome = outcome;
        proposal.finalized_at = Some(now);
        proposal.finalized_by = Some(finalized_by);
        self.audit.commit(record);
        self.last_timestamp = now;
        Ok(())
    }

    /// Check cross-component invariants of a restored state
    ///
    /// Tallies must match the ledger, every vote must fall inside its
    /// proposal's window, finalized outcomes must follow from their tallies,
    /// and the audit chain must verify and describe exactly this state.
    pub fn check_consistency(&self) -> GovernanceResult<()> {
        for vote in self.ledger.records() {
            let proposal = self.proposals.get(vote.proposal_id).map_err(|_| {
                GovernanceError::invalid_input(format!(
                    "Vote by {} references unknown proposal {}",
                    vote.voter, vote.proposal_id
                ))
            })?;
            if vote.cast_at < proposal.created_at || vote.cast_at >= proposal.closes_at {
                return Err(GovernanceError::invalid_input(format!(
                    "Vote by {} on proposal {} at {} is outside its voting window",
                    vote.voter, vote.proposal_id, vote.cast_at
                )));
            }
            if vote.cast_at > self.last_timestamp {
                return Err(GovernanceError::invalid_input(format!(
                    "Vote by {} is later than the last observed timestamp",
                    vote.voter
                )));
            }
        }

        let mut finalized = 0usize;
        for proposal in self.proposals.iter() {
            self.check_proposal(proposal)?;
            if proposal.finalized {
                finalized += 1;
            }
        }

        self.audit
            .verify()
            .map_err(|e| GovernanceError::invalid_input(format!("Audit log: {}", e)))?;

        let expected = self.proposals.count() as usize + self.ledger.len() + finalized;
        if self.audit.len() != expected {
            return Err(GovernanceError::invalid_input(format!(
                "Audit log has {} records, expected {}",
                self.audit.len(),
                expected
            )));
        }

        self.check_audit_matches()
    }

    fn check_proposal(&self, proposal: &Proposal) -> GovernanceResult<()> {
        let id = proposal.id;
        if proposal.tally != self.ledger.recount(id) {
            return Err(GovernanceError::invalid_input(format!(
                "Tally of proposal {} does not match its votes",
                id
            )));
        }
        if proposal.created_at > self.last_timestamp {
            return Err(GovernanceError::invalid_input(format!(
                "Proposal {} is later than the last observed timestamp",
                id
            )));
        }

        if !proposal.finalized {
            if proposal.finalized_at.is_some() || proposal.finalized_by.is_some() {
                return Err(GovernanceError::invalid_input(format!(
                    "Proposal {} carries finalization details but is not finalized",
                    id
                )));
            }
            return Ok(());
        }

        if proposal.outcome != decide_outcome(&proposal.tally) {
            return Err(GovernanceError::invalid_input(format!(
                "Outcome of proposal {} does not follow from its tally",
                id
            )));
        }
        match (proposal.finalized_at, proposal.finalized_by) {
            (Some(at), Some(_)) if at >= proposal.closes_at && at <= self.last_timestamp => Ok(()),
            _ => Err(GovernanceError::invalid_input(format!(
                "Proposal {} has invalid finalization details",
                id
            ))),
        }
    }

    /// Match every audit event against the proposal or vote it records
    fn check_audit_matches(&self) -> GovernanceResult<()> {
        let mut created = BTreeSet::new();
        let mut voted = BTreeSet::new();
        let mut closed = BTreeSet::new();

        for record in self.audit.iter() {
            let id = record.event.proposal_id();
            let mismatch = || {
                GovernanceError::invalid_input(format!(
                    "Audit record {} does not match proposal {}",
                    record.sequence, id
                ))
            };
            let proposal = self.proposals.get(id).map_err(|_| mismatch())?;

            match &record.event {
                GovernanceEvent::ProposalCreated {
                    creator,
                    created_at,
                    closes_at,
                    ..
                } => {
                    let matches = *creator == proposal.creator
                        && *created_at == proposal.created_at
                        && *closes_at == proposal.closes_at;
                    if !matches || !created.insert(id) {
                        return Err(mismatch());
                    }
                }
                GovernanceEvent::VoteCast {
                    voter,
                    support,
                    cast_at,
                    ..
                } => {
                    let matches = created.contains(&id)
                        && !closed.contains(&id)
                        && self.ledger.get(id, voter).map_or(false, |vote| {
                            vote.support == *support && vote.cast_at == *cast_at
                        });
                    if !matches || !voted.insert((id, *voter)) {
                        return Err(mismatch());
                    }
                }
                GovernanceEvent::ProposalFinalized {
                    outcome,
                    yes,
                    no,
                    finalized_by,
                    finalized_at,
                    ..
                } => {
                    let matches = created.contains(&id)
                        && proposal.finalized
                        && *outcome == proposal.outcome
                        && *yes == proposal.tally.yes
                        && *no == proposal.tally.no
                        && Some(*finalized_by) == proposal.finalized_by
                        && Some(*finalized_at) == proposal.finalized_at;
                    if !matches || !closed.insert(id) {
                        return Err(mismatch());
                    }
                }
            }
        }

        Ok(())
    }

    /// Encode as pretty JSON
    pub fn to_json(&self) -> GovernanceResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Decode from JSON and check consistency
    pub fn from_json(json: &str) -> GovernanceResult<Self> {
        let state: GovernanceState = serde_json::from_str(json)?;
        state.check_consistency()?;
        Ok(state)
    }
}
