//! Governance module for Nation DAO
//!
//! Credential-gated proposals and voting: holders of a governance credential
//! may create proposals and cast one yes/no vote each while a proposal's
//! voting window is open. Once the window closes anyone (or only the
//! administrator, depending on configuration) may finalize the proposal,
//! fixing its outcome.
//!
//! ```text
//! EligibilityGate -> ProposalRegistry -> VotingLedger -> Lifecycle
//!                          \_______ GovernanceEngine ______/
//! ```

pub mod audit;
pub mod config;
pub mod eligibility;
pub mod engine;
pub mod error;
pub mod lifecycle;
pub mod proposals;
pub mod state;
pub mod voting;

pub use audit::{AuditError, AuditLog, AuditRecord, GovernanceEvent};
pub use config::{FinalizePolicy, GovernanceConfig, DEFAULT_VOTING_DURATION_SECS};
pub use eligibility::{CredentialCapability, EligibilityGate, NftCredentialAdapter};
pub use engine::{CallContext, GovernanceEngine, Receipt, SharedOracleEngine};
pub use error::{GovernanceError, GovernanceResult};
pub use lifecycle::{decide_outcome, LifecycleController, Phase};
pub use proposals::{Outcome, Proposal, ProposalRegistry};
pub use state::GovernanceState;
pub use voting::{Tally, VoteRecord, VotingLedger};
