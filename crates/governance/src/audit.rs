//! Hash-chained audit log of governance events
//!
//! Every successful mutation appends exactly one record. Each record's hash
//! covers the previous record's hash, its own sequence number and the JSON
//! encoding of its event, so rewriting any past record breaks the chain from
//! that point on.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use dao_common::{Address, ProposalId, Timestamp};

use crate::error::{GovernanceError, GovernanceResult};
use crate::proposals::Outcome;

/// Hash that the first record links to
pub const GENESIS_HASH: [u8; 32] = [0u8; 32];

/// A state change worth recording
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GovernanceEvent {
    /// A proposal was created
    ProposalCreated {
        proposal_id: ProposalId,
        creator: Address,
        created_at: Timestamp,
        closes_at: Timestamp,
    },
    /// A vote was recorded
    VoteCast {
        proposal_id: ProposalId,
        voter: Address,
        support: bool,
        cast_at: Timestamp,
    },
    /// A proposal outcome was fixed
    ProposalFinalized {
        proposal_id: ProposalId,
        outcome: Outcome,
        yes: u64,
        no: u64,
        finalized_by: Address,
        finalized_at: Timestamp,
    },
}

impl GovernanceEvent {
    /// Proposal the event concerns
    pub fn proposal_id(&self) -> ProposalId {
        match self {
            GovernanceEvent::ProposalCreated { proposal_id, .. }
            | GovernanceEvent::VoteCast { proposal_id, .. }
            | GovernanceEvent::ProposalFinalized { proposal_id, .. } => *proposal_id,
        }
    }
}

/// One link in the audit chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Position in the log, starting at 0
    pub sequence: u64,
    /// What happened
    pub event: GovernanceEvent,
    /// Hex hash of the preceding record
    pub previous_hash: String,
    /// Hex hash of this record
    pub hash: String,
}

/// Reasons an audit chain fails verification
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuditError {
    #[error("Record at position {position} has sequence {found}")]
    SequenceGap { position: u64, found: u64 },

    #[error("Record {sequence} does not link to its predecessor")]
    BrokenLink { sequence: u64 },

    #[error("Record {sequence} hash does not match its contents")]
    HashMismatch { sequence: u64 },

    #[error("Record {sequence} could not be encoded: {message}")]
    Serialization { sequence: u64, message: String },
}

fn compute_hash(
    previous_hash: &[u8],
    sequence: u64,
    event: &GovernanceEvent,
) -> Result<[u8; 32], serde_json::Error> {
    let encoded = serde_json::to_vec(event)?;

    let mut hasher = Sha256::new();
    hasher.update(previous_hash);
    hasher.update(sequence.to_be_bytes());
    hasher.update(&encoded);
    Ok(hasher.finalize().into())
}

/// Append-only log of audit records
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuditLog {
    records: Vec<AuditRecord>,
}

impl AuditLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Hex hash of the last record, or of the genesis hash when empty
    pub fn head_hash(&self) -> String {
        match self.records.last() {
            Some(record) => record.hash.clone(),
            None => hex::encode(GENESIS_HASH),
        }
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the log is empty
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All records in order
    pub fn iter(&self) -> impl Iterator<Item = &AuditRecord> + '_ {
        self.records.iter()
    }

    /// Records concerning `proposal_id`
    pub fn records_for(&self, proposal_id: ProposalId) -> impl Iterator<Item = &AuditRecord> + '_ {
        self.records
            .iter()
            .filter(move |record| record.event.proposal_id() == proposal_id)
    }

    /// Build the record that would be appended next for `event`, without
    /// appending it
    pub fn seal(&self, event: GovernanceEvent) -> GovernanceResult<AuditRecord> {
        let sequence = self.records.len() as u64;
        let previous_hash = self.head_hash();
        let previous_bytes = hex::decode(&previous_hash)
            .map_err(|e| GovernanceError::serialization(e.to_string()))?;
        let hash = compute_hash(&previous_bytes, sequence, &event)?;

        Ok(AuditRecord {
            sequence,
            event,
            previous_hash,
            hash: hex::encode(hash),
        })
    }

    /// Append a record produced by [`AuditLog::seal`] on the current head
    pub(crate) fn commit(&mut self, record: AuditRecord) {
        debug_assert_eq!(record.sequence, self.records.len() as u64);
        self.records.push(record);
    }

    /// Walk the chain and check every link and hash
    pub fn verify(&self) -> Result<(), AuditError> {
        let mut previous = hex::encode(GENESIS_HASH);

        for (position, record) in self.records.iter().enumerate() {
            let position = position as u64;
            if record.sequence != position {
                return Err(AuditError::SequenceGap {
                    position,
                    found: record.sequence,
                });
            }

            if record.previous_hash != previous {
                return Err(AuditError::BrokenLink {
                    sequence: record.sequence,
                });
            }

            let previous_bytes = hex::decode(&record.previous_hash).map_err(|_| {
                AuditError::BrokenLink {
                    sequence: record.sequence,
                }
            })?;
            let expected = compute_hash(&previous_bytes, record.sequence, &record.event)
                .map_err(|e| AuditError::Serialization {
                    sequence: record.sequence,
                    message: e.to_string(),
                })?;

            if hex::encode(expected) != record.hash {
                return Err(AuditError::HashMismatch {
                    sequence: record.sequence,
                });
            }

            previous = record.hash.clone();
        }

        Ok(())
    }
}
