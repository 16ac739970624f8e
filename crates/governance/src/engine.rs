//! Governance engine
//!
//! Composes the eligibility gate, proposal registry, voting ledger and
//! lifecycle controller behind one set of operations. The engine holds only
//! immutable configuration; the host owns the [`GovernanceState`] and passes
//! it to each call.
//!
//! Every mutating operation follows the same shape: check the clock, run all
//! checks and seal the audit record, then commit. A returned error means
//! nothing was written.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use dao_common::{Address, ProposalId, Timestamp};
use dao_credentials::CredentialOracle;

use crate::audit::{AuditError, AuditRecord, GovernanceEvent};
use crate::config::GovernanceConfig;
use crate::eligibility::{CredentialCapability, EligibilityGate, NftCredentialAdapter};
use crate::error::{GovernanceError, GovernanceResult};
use crate::lifecycle::{self, LifecycleController, Phase};
use crate::proposals::{self, Outcome, Proposal};
use crate::state::GovernanceState;
use crate::voting::{Tally, VoteRecord};

/// Caller and host time for one operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallContext {
    /// Address invoking the operation
    pub caller: Address,
    /// Host time, in seconds
    pub timestamp: Timestamp,
}

impl CallContext {
    /// Context for a call made by `caller` at host time `timestamp`
    pub fn new(caller: Address, timestamp: Timestamp) -> Self {
        Self { caller, timestamp }
    }
}

/// Result of a successful mutation together with the audit record it appended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt<T> {
    /// Value the operation returned
    pub output: T,
    /// Audit record the operation appended
    pub record: AuditRecord,
}

impl<T> Receipt<T> {
    /// The event that was recorded
    pub fn event(&self) -> &GovernanceEvent {
        &self.record.event
    }
}

/// Credential-gated proposal and voting engine
pub struct GovernanceEngine<C: CredentialCapability> {
    config: GovernanceConfig,
    gate: EligibilityGate<C>,
    lifecycle: LifecycleController,
}

impl<O: CredentialOracle> GovernanceEngine<NftCredentialAdapter<O>> {
    /// Create an engine whose eligibility comes from an NFT registry
    pub fn with_oracle(config: GovernanceConfig, oracle: O) -> GovernanceResult<Self> {
        Self::new(config, NftCredentialAdapter::new(oracle))
    }
}

impl<C: CredentialCapability> GovernanceEngine<C> {
    /// Create an engine, validating the configuration
    pub fn new(config: GovernanceConfig, capability: C) -> GovernanceResult<Self> {
        config.validate()?;

        let gate = EligibilityGate::new(
            capability,
            config.administrator,
            config.administrator_may_propose,
        );
        let lifecycle = LifecycleController::new(config.finalize_policy, config.administrator);

        info!(
            "Governance engine ready: registry {}, administrator {}, default window {}s, {} finalization",
            config.credential_registry,
            config.administrator,
            config.default_voting_duration,
            config.finalize_policy
        );

        Ok(Self {
            config,
            gate,
            lifecycle,
        })
    }

    /// Configuration the engine was built with
    pub fn config(&self) -> &GovernanceConfig {
        &self.config
    }

    /// Eligibility gate backing `can_propose` and `can_vote`
    pub fn gate(&self) -> &EligibilityGate<C> {
        &self.gate
    }

    /// Whether `address` may create a proposal right now
    pub fn can_propose(&self, address: &Address) -> bool {
        self.gate.can_propose(address)
    }

    /// Whether `address` may vote right now
    pub fn can_vote(&self, address: &Address) -> bool {
        self.gate.can_vote(address)
    }

    /// Create a proposal and return its identifier
    pub fn create_proposal(
        &self,
        state: &mut GovernanceState,
        ctx: &CallContext,
        description: &str,
        duration_override: Option<u64>,
    ) -> GovernanceResult<Receipt<ProposalId>> {
        self.try_create_proposal(state, ctx, description, duration_override)
            .map_err(|e| {
                debug!("Proposal by {} rejected: {}", ctx.caller, e);
                e
            })
    }

    fn try_create_proposal(
        &self,
        state: &mut GovernanceState,
        ctx: &CallContext,
        description: &str,
        duration_override: Option<u64>,
    ) -> GovernanceResult<Receipt<ProposalId>> {
        state.check_clock(ctx.timestamp)?;

        if !self.gate.can_propose(&ctx.caller) {
            return Err(GovernanceError::NotEligible(ctx.caller));
        }

        proposals::validate_description(description, self.config.max_description_len)?;
        let duration = proposals::resolve_duration(duration_override, &self.config)?;

        let proposal = state
            .proposals()
            .draft(ctx.caller, description, ctx.timestamp, duration)?;
        let record = state.audit().seal(GovernanceEvent::ProposalCreated {
            proposal_id: proposal.id,
            creator: proposal.creator,
            created_at: proposal.created_at,
            closes_at: proposal.closes_at,
        })?;
        let closes_at = proposal.closes_at;

        let id = state.commit_proposal(proposal, record.clone(), ctx.timestamp)?;
        info!(
            "Proposal {} created by {}, voting closes at {}",
            id, ctx.caller, closes_at
        );

        Ok(Receipt { output: id, record })
    }

    /// Record a yes (`true`) or no (`false`) vote by the caller
    pub fn cast_vote(
        &self,
        state: &mut GovernanceState,
        ctx: &CallContext,
        proposal_id: ProposalId,
        support: bool,
    ) -> GovernanceResult<Receipt<()>> {
        self.try_cast_vote(state, ctx, proposal_id, support)
            .map_err(|e| {
                debug!(
                    "Vote by {} on proposal {} rejected: {}",
                    ctx.caller, proposal_id, e
                );
                e
            })
    }

    fn try_cast_vote(
        &self,
        state: &mut GovernanceState,
        ctx: &CallContext,
        proposal_id: ProposalId,
        support: bool,
    ) -> GovernanceResult<Receipt<()>> {
        state.check_clock(ctx.timestamp)?;

        let proposal = state.proposals().get(proposal_id)?;
        self.lifecycle.ensure_open(proposal, ctx.timestamp)?;

        if !self.gate.can_vote(&ctx.caller) {
            return Err(GovernanceError::NotEligible(ctx.caller));
        }

        if state.ledger().has_voted(proposal_id, &ctx.caller) {
            return Err(GovernanceError::AlreadyVoted {
                proposal_id,
                voter: ctx.caller,
            });
        }

        let record = state.audit().seal(GovernanceEvent::VoteCast {
            proposal_id,
            voter: ctx.caller,
            support,
            cast_at: ctx.timestamp,
        })?;
        let vote = VoteRecord {
            proposal_id,
            voter: ctx.caller,
            support,
            cast_at: ctx.timestamp,
        };

        state.commit_vote(vote, record.clone(), ctx.timestamp)?;
        info!(
            "Vote cast on proposal {} by {}: {}",
            proposal_id,
            ctx.caller,
            if support { "yes" } else { "no" }
        );

        Ok(Receipt { output: (), record })
    }

    /// Fix the outcome of a proposal whose voting window has closed
    pub fn finalize(
        &self,
        state: &mut GovernanceState,
        ctx: &CallContext,
        proposal_id: ProposalId,
    ) -> GovernanceResult<Receipt<Outcome>> {
        self.try_finalize(state, ctx, proposal_id).map_err(|e| {
            debug!(
                "Finalization of proposal {} by {} rejected: {}",
                proposal_id, ctx.caller, e
            );
            e
        })
    }

    fn try_finalize(
        &self,
        state: &mut GovernanceState,
        ctx: &CallContext,
        proposal_id: ProposalId,
    ) -> GovernanceResult<Receipt<Outcome>> {
        state.check_clock(ctx.timestamp)?;

        let proposal = state.proposals().get(proposal_id)?;
        let outcome = self
            .lifecycle
            .check_finalize(proposal, &ctx.caller, ctx.timestamp)?;
        let tally = proposal.tally;

        let record = state.audit().seal(GovernanceEvent::ProposalFinalized {
            proposal_id,
            outcome,
            yes: tally.yes,
            no: tally.no,
            finalized_by: ctx.caller,
            finalized_at: ctx.timestamp,
        })?;

        state.commit_finalization(
            proposal_id,
            outcome,
            ctx.caller,
            record.clone(),
            ctx.timestamp,
        )?;
        info!(
            "Proposal {} finalized by {}: {} ({} yes, {} no)",
            proposal_id, ctx.caller, outcome, tally.yes, tally.no
        );

        Ok(Receipt {
            output: outcome,
            record,
        })
    }

    /// Finalize every closed, unfinalized proposal in identifier order.
    ///
    /// The sweep runs against a staged copy of the state, which replaces
    /// `state` only once every finalization has succeeded. On error `state`
    /// is left as it was.
    pub fn finalize_due(
        &self,
        state: &mut GovernanceState,
        ctx: &CallContext,
    ) -> GovernanceResult<Vec<Receipt<(ProposalId, Outcome)>>> {
        state.check_clock(ctx.timestamp)?;
        self.lifecycle.authorize_finalizer(&ctx.caller)?;

        let due: Vec<ProposalId> = state
            .proposals()
            .iter()
            .filter(|proposal| lifecycle::phase(proposal, ctx.timestamp) == Phase::Closed)
            .map(|proposal| proposal.id)
            .collect();

        if due.is_empty() {
            return Ok(Vec::new());
        }

        let mut staged = state.clone();
        let mut receipts = Vec::with_capacity(due.len());
        for proposal_id in due {
            let receipt = self.finalize(&mut staged, ctx, proposal_id)?;
            receipts.push(Receipt {
                output: (proposal_id, receipt.output),
                record: receipt.record,
            });
        }
        *state = staged;

        info!("Finalized {} due proposals", receipts.len());
        Ok(receipts)
    }

    /// Look up a proposal
    pub fn get_proposal<'s>(
        &self,
        state: &'s GovernanceState,
        proposal_id: ProposalId,
    ) -> GovernanceResult<&'s Proposal> {
        state.proposals().get(proposal_id)
    }

    /// Current yes/no counts of a proposal
    pub fn get_tally(
        &self,
        state: &GovernanceState,
        proposal_id: ProposalId,
    ) -> GovernanceResult<Tally> {
        Ok(state.proposals().get(proposal_id)?.tally)
    }

    /// The vote `voter` cast on a proposal, if any
    pub fn get_vote<'s>(
        &self,
        state: &'s GovernanceState,
        proposal_id: ProposalId,
        voter: &Address,
    ) -> GovernanceResult<Option<&'s VoteRecord>> {
        state.proposals().get(proposal_id)?;
        Ok(state.ledger().get(proposal_id, voter))
    }

    /// Whether `voter` has already voted on a proposal
    pub fn has_voted(&self, state: &GovernanceState, proposal_id: ProposalId, voter: &Address) -> bool {
        state.ledger().has_voted(proposal_id, voter)
    }

    /// Votes on a proposal in the order they were cast
    pub fn votes_for<'s>(
        &self,
        state: &'s GovernanceState,
        proposal_id: ProposalId,
    ) -> GovernanceResult<Vec<&'s VoteRecord>> {
        state.proposals().get(proposal_id)?;
        Ok(state.ledger().votes_for(proposal_id).collect())
    }

    /// Lifecycle phase of a proposal at `now`
    pub fn phase(
        &self,
        state: &GovernanceState,
        proposal_id: ProposalId,
        now: Timestamp,
    ) -> GovernanceResult<Phase> {
        Ok(lifecycle::phase(state.proposals().get(proposal_id)?, now))
    }

    pub fn proposal_count(&self, state: &GovernanceState) -> u64 {
        state.proposals().count()
    }

    /// All proposals in ascending identifier order
    pub fn list_proposals<'s>(&self, state: &'s GovernanceState) -> Vec<&'s Proposal> {
        state.proposals().iter().collect()
    }

    /// Recompute the audit chain
    pub fn verify_audit_log(&self, state: &GovernanceState) -> Result<(), AuditError> {
        state.audit().verify()
    }
}

/// Engine backed by a shared registry handle
pub type SharedOracleEngine<O> = GovernanceEngine<NftCredentialAdapter<Arc<O>>>;
