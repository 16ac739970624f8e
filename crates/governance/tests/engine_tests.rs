//! Tests for the governance engine
//!
//! These tests drive the public operations end to end against an in-memory
//! credential registry.

use std::sync::Arc;

use dao_common::Address;
use dao_credentials::MemoryCredentialRegistry;
use dao_governance::{
    AuditError, CallContext, FinalizePolicy, GovernanceConfig, GovernanceEngine,
    GovernanceError, GovernanceEvent, GovernanceState, Outcome, Phase, SharedOracleEngine, Tally,
    DEFAULT_VOTING_DURATION_SECS,
};

const ADMIN: u64 = 100;
const REGISTRY: u64 = 0xc0ffee;

fn addr(n: u64) -> Address {
    Address::from_low_u64_be(n)
}

fn at(caller: u64, timestamp: u64) -> CallContext {
    CallContext::new(addr(caller), timestamp)
}

fn setup_with(
    config: GovernanceConfig,
    holders: &[u64],
) -> (
    SharedOracleEngine<MemoryCredentialRegistry>,
    Arc<MemoryCredentialRegistry>,
    GovernanceState,
) {
    let registry = Arc::new(MemoryCredentialRegistry::new());
    for (token_id, holder) in holders.iter().enumerate() {
        registry.mint(addr(*holder), token_id as u64 + 1).unwrap();
    }

    let engine = GovernanceEngine::with_oracle(config, registry.clone()).unwrap();
    (engine, registry, GovernanceState::new())
}

fn setup(holders: &[u64]) -> (
    SharedOracleEngine<MemoryCredentialRegistry>,
    Arc<MemoryCredentialRegistry>,
    GovernanceState,
) {
    setup_with(
        GovernanceConfig::new(addr(REGISTRY), addr(ADMIN), DEFAULT_VOTING_DURATION_SECS),
        holders,
    )
}

#[test]
fn test_full_voting_scenario() {
    // A = 1 holds a credential, B = 2 does not
    let (engine, _registry, mut state) = setup(&[1]);

    let id = engine
        .create_proposal(&mut state, &at(1, 0), "Adopt the new charter", Some(86_400))
        .unwrap()
        .output;

    engine.cast_vote(&mut state, &at(1, 100), id, true).unwrap();
    assert_eq!(engine.get_tally(&state, id).unwrap(), Tally::new(1, 0));

    assert_eq!(
        engine.cast_vote(&mut state, &at(1, 200), id, true),
        Err(GovernanceError::AlreadyVoted {
            proposal_id: id,
            voter: addr(1),
        })
    );
    assert_eq!(engine.get_tally(&state, id).unwrap(), Tally::new(1, 0));

    assert_eq!(
        engine.cast_vote(&mut state, &at(2, 300), id, true),
        Err(GovernanceError::NotEligible(addr(2)))
    );

    let outcome = engine.finalize(&mut state, &at(2, 86_400), id).unwrap().output;
    assert_eq!(outcome, Outcome::Approved);

    assert_eq!(
        engine.finalize(&mut state, &at(2, 86_401), id),
        Err(GovernanceError::AlreadyFinalized(id))
    );

    let proposal = engine.get_proposal(&state, id).unwrap();
    assert!(proposal.finalized);
    assert_eq!(proposal.outcome, Outcome::Approved);
    assert_eq!(proposal.finalized_at, Some(86_400));
    assert_eq!(proposal.finalized_by, Some(addr(2)));

    // created + vote + finalized
    assert_eq!(state.audit().len(), 3);
    assert!(engine.verify_audit_log(&state).is_ok());
}

#[test]
fn test_unknown_proposal_is_not_found() {
    let (engine, _registry, mut state) = setup(&[1]);

    assert_eq!(engine.get_proposal(&state, 1), Err(GovernanceError::NotFound(1)));
    assert_eq!(engine.get_tally(&state, 0), Err(GovernanceError::NotFound(0)));
    assert_eq!(
        engine.cast_vote(&mut state, &at(1, 0), 7, true),
        Err(GovernanceError::NotFound(7))
    );
    assert_eq!(
        engine.finalize(&mut state, &at(1, 0), 7),
        Err(GovernanceError::NotFound(7))
    );
    assert_eq!(engine.phase(&state, 7, 0), Err(GovernanceError::NotFound(7)));
}

#[test]
fn test_ids_increase_from_one() {
    let (engine, _registry, mut state) = setup(&[1, 2]);

    let first = engine.create_proposal(&mut state, &at(1, 0), "One", None).unwrap();
    let second = engine.create_proposal(&mut state, &at(2, 5), "Two", None).unwrap();
    let third = engine.create_proposal(&mut state, &at(1, 5), "Three", None).unwrap();

    assert_eq!((first.output, second.output, third.output), (1, 2, 3));
    assert_eq!(engine.proposal_count(&state), 3);

    let ids: Vec<_> = engine.list_proposals(&state).iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![1, 2, 3]);
}

#[test]
fn test_closing_time_uses_default_or_override() {
    let (engine, _registry, mut state) = setup(&[1]);

    let default = engine.create_proposal(&mut state, &at(1, 10), "Default", None).unwrap().output;
    let zero = engine.create_proposal(&mut state, &at(1, 10), "Zero", Some(0)).unwrap().output;
    let custom = engine.create_proposal(&mut state, &at(1, 10), "Custom", Some(60)).unwrap().output;

    assert_eq!(engine.get_proposal(&state, default).unwrap().closes_at, 10 + DEFAULT_VOTING_DURATION_SECS);
    assert_eq!(engine.get_proposal(&state, zero).unwrap().closes_at, 10 + DEFAULT_VOTING_DURATION_SECS);
    assert_eq!(engine.get_proposal(&state, custom).unwrap().closes_at, 70);
    assert_eq!(engine.get_proposal(&state, custom).unwrap().voting_duration, 60);
}

#[test]
fn test_maximum_voting_duration() {
    let config = GovernanceConfig::new(addr(REGISTRY), addr(ADMIN), 100).with_max_voting_duration(1000);
    let (engine, _registry, mut state) = setup_with(config, &[1]);

    assert!(engine.create_proposal(&mut state, &at(1, 0), "Ok", Some(1000)).is_ok());
    assert!(matches!(
        engine.create_proposal(&mut state, &at(1, 0), "Too long", Some(1001)),
        Err(GovernanceError::InvalidInput(_))
    ));
}

#[test]
fn test_description_length_limit() {
    let config = GovernanceConfig::new(addr(REGISTRY), addr(ADMIN), 100).with_max_description_len(8);
    let (engine, _registry, mut state) = setup_with(config, &[1]);

    assert!(engine.create_proposal(&mut state, &at(1, 0), "12345678", None).is_ok());
    assert!(matches!(
        engine.create_proposal(&mut state, &at(1, 0), "123456789", None),
        Err(GovernanceError::InvalidInput(_))
    ));
}

#[test]
fn test_vote_at_closing_time_is_rejected() {
    let (engine, _registry, mut state) = setup(&[1, 2]);
    let id = engine.create_proposal(&mut state, &at(1, 0), "Window", Some(100)).unwrap().output;

    engine.cast_vote(&mut state, &at(1, 99), id, false).unwrap();
    assert_eq!(
        engine.cast_vote(&mut state, &at(2, 100), id, true),
        Err(GovernanceError::VotingClosed(id))
    );
    assert_eq!(engine.get_tally(&state, id).unwrap(), Tally::new(0, 1));
    assert_eq!(engine.phase(&state, id, 100).unwrap(), Phase::Closed);
}

#[test]
fn test_finalize_too_early() {
    let (engine, _registry, mut state) = setup(&[1]);
    let id = engine.create_proposal(&mut state, &at(1, 0), "Patience", Some(100)).unwrap().output;

    assert_eq!(
        engine.finalize(&mut state, &at(1, 99), id),
        Err(GovernanceError::TooEarly {
            proposal_id: id,
            closes_at: 100,
        })
    );
    assert_eq!(engine.phase(&state, id, 99).unwrap(), Phase::Open);
    assert!(!engine.get_proposal(&state, id).unwrap().finalized);
}

#[test]
fn test_ties_are_rejected() {
    let (engine, _registry, mut state) = setup(&[1, 2]);
    let id = engine.create_proposal(&mut state, &at(1, 0), "Split", Some(10)).unwrap().output;

    engine.cast_vote(&mut state, &at(1, 1), id, true).unwrap();
    engine.cast_vote(&mut state, &at(2, 2), id, false).unwrap();

    let outcome = engine.finalize(&mut state, &at(1, 10), id).unwrap().output;
    assert_eq!(outcome, Outcome::Rejected);
}

#[test]
fn test_no_votes_is_rejected() {
    let (engine, _registry, mut state) = setup(&[1]);
    let id = engine.create_proposal(&mut state, &at(1, 0), "Quiet", Some(10)).unwrap().output;

    let receipt = engine.finalize(&mut state, &at(1, 10), id).unwrap();
    assert_eq!(receipt.output, Outcome::Rejected);
    assert_eq!(
        receipt.event(),
        &GovernanceEvent::ProposalFinalized {
            proposal_id: id,
            outcome: Outcome::Rejected,
            yes: 0,
            no: 0,
            finalized_by: addr(1),
            finalized_at: 10,
        }
    );
}

#[test]
fn test_administrator_only_finalization() {
    let config = GovernanceConfig::new(addr(REGISTRY), addr(ADMIN), 100)
        .with_finalize_policy(FinalizePolicy::AdministratorOnly);
    let (engine, _registry, mut state) = setup_with(config, &[1]);
    let id = engine.create_proposal(&mut state, &at(1, 0), "Guarded", None).unwrap().output;

    assert!(matches!(
        engine.finalize(&mut state, &at(1, 100), id),
        Err(GovernanceError::PermissionDenied(_))
    ));
    assert!(matches!(
        engine.finalize_due(&mut state, &at(1, 100)),
        Err(GovernanceError::PermissionDenied(_))
    ));

    // Permission is checked before timing
    assert!(matches!(
        engine.finalize(&mut state, &at(1, 50), id),
        Err(GovernanceError::PermissionDenied(_))
    ));

    assert_eq!(
        engine.finalize(&mut state, &at(ADMIN, 100), id).unwrap().output,
        Outcome::Rejected
    );
}

#[test]
fn test_administrator_may_propose_without_credential() {
    let config = GovernanceConfig::new(addr(REGISTRY), addr(ADMIN), 100).with_administrator_may_propose(true);
    let (engine, _registry, mut state) = setup_with(config, &[1]);

    assert!(engine.create_proposal(&mut state, &at(ADMIN, 0), "From the chair", None).is_ok());
    assert_eq!(
        engine.cast_vote(&mut state, &at(ADMIN, 1), 1, true),
        Err(GovernanceError::NotEligible(addr(ADMIN)))
    );
}

#[test]
fn test_credential_transfer_after_voting() {
    let (engine, registry, mut state) = setup(&[1]);
    let id = engine.create_proposal(&mut state, &at(1, 0), "Transfer", Some(100)).unwrap().output;

    engine.cast_vote(&mut state, &at(1, 10), id, true).unwrap();
    registry.transfer(&addr(1), addr(2), 1).unwrap();

    // The new holder may vote; the earlier vote stands
    engine.cast_vote(&mut state, &at(2, 20), id, true).unwrap();
    assert_eq!(engine.get_tally(&state, id).unwrap(), Tally::new(2, 0));
    assert!(engine.has_voted(&state, id, &addr(1)));

    // The previous holder can no longer propose
    assert_eq!(
        engine.create_proposal(&mut state, &at(1, 30), "Again", None),
        Err(GovernanceError::NotEligible(addr(1)))
    );
}

#[test]
fn test_registry_outage_makes_everyone_ineligible() {
    let (engine, registry, mut state) = setup(&[1]);
    let id = engine.create_proposal(&mut state, &at(1, 0), "Outage", Some(100)).unwrap().output;

    registry.set_available(false).unwrap();
    assert_eq!(
        engine.cast_vote(&mut state, &at(1, 10), id, true),
        Err(GovernanceError::NotEligible(addr(1)))
    );

    registry.set_available(true).unwrap();
    assert!(engine.cast_vote(&mut state, &at(1, 10), id, true).is_ok());
}

#[test]
fn test_failed_operations_leave_no_trace() {
    let (engine, _registry, mut state) = setup(&[1]);
    let id = engine.create_proposal(&mut state, &at(1, 0), "Trace", Some(100)).unwrap().output;
    engine.cast_vote(&mut state, &at(1, 10), id, true).unwrap();
    let before = state.clone();

    let _ = engine.cast_vote(&mut state, &at(1, 20), id, false);
    let _ = engine.cast_vote(&mut state, &at(3, 20), id, false);
    let _ = engine.create_proposal(&mut state, &at(3, 20), "Nope", None);
    let _ = engine.create_proposal(&mut state, &at(1, 20), "", None);
    let _ = engine.finalize(&mut state, &at(1, 20), id);
    let _ = engine.cast_vote(&mut state, &at(1, 5), id, false);

    assert_eq!(state, before);
}

#[test]
fn test_vote_queries() {
    let (engine, _registry, mut state) = setup(&[1, 2, 3]);
    let id = engine.create_proposal(&mut state, &at(1, 0), "Queries", Some(100)).unwrap().output;

    engine.cast_vote(&mut state, &at(3, 1), id, false).unwrap();
    engine.cast_vote(&mut state, &at(1, 2), id, true).unwrap();

    let vote = engine.get_vote(&state, id, &addr(3)).unwrap().unwrap();
    assert!(!vote.support);
    assert_eq!(vote.cast_at, 1);
    assert!(engine.get_vote(&state, id, &addr(2)).unwrap().is_none());

    let voters: Vec<_> = engine
        .votes_for(&state, id)
        .unwrap()
        .iter()
        .map(|v| v.voter)
        .collect();
    assert_eq!(voters, vec![addr(3), addr(1)]);
}

#[test]
fn test_tampered_audit_log_fails_verification() {
    let (engine, _registry, mut state) = setup(&[1, 2]);
    let id = engine.create_proposal(&mut state, &at(1, 0), "Audit", Some(100)).unwrap().output;
    engine.cast_vote(&mut state, &at(1, 1), id, true).unwrap();
    engine.cast_vote(&mut state, &at(2, 2), id, false).unwrap();

    let mut value: serde_json::Value = serde_json::from_str(&state.to_json().unwrap()).unwrap();
    value["audit"][1]["event"]["support"] = serde_json::json!(false);
    let tampered: GovernanceState = serde_json::from_value(value).unwrap();

    assert_eq!(
        engine.verify_audit_log(&tampered),
        Err(AuditError::HashMismatch { sequence: 1 })
    );
}

#[test]
fn test_restored_state_keeps_working() {
    let (engine, _registry, mut state) = setup(&[1, 2]);
    let id = engine.create_proposal(&mut state, &at(1, 0), "Persist", Some(100)).unwrap().output;
    engine.cast_vote(&mut state, &at(1, 1), id, true).unwrap();

    let mut restored = GovernanceState::from_json(&state.to_json().unwrap()).unwrap();
    assert_eq!(restored, state);

    assert_eq!(
        engine.cast_vote(&mut restored, &at(1, 2), id, false),
        Err(GovernanceError::AlreadyVoted {
            proposal_id: id,
            voter: addr(1),
        })
    );
    engine.cast_vote(&mut restored, &at(2, 3), id, false).unwrap();
    assert_eq!(
        engine.finalize(&mut restored, &at(2, 100), id).unwrap().output,
        Outcome::Rejected
    );
    assert!(engine.verify_audit_log(&restored).is_ok());
}
