//! Eligibility gate
//!
//! Decides, at the moment of an action, whether an address may propose or
//! vote. Nothing is cached between calls: a credential transferred away stops
//! conferring rights on the next check.

use tracing::{debug, warn};

use dao_common::Address;
use dao_credentials::CredentialOracle;

/// Capability check consumed by the gate
pub trait CredentialCapability: Send + Sync {
    /// Whether `address` currently holds a governance credential
    fn has_credential(&self, address: &Address) -> bool;
}

/// Credential capability backed by an NFT registry balance
pub struct NftCredentialAdapter<O: CredentialOracle> {
    oracle: O,
}

impl<O: CredentialOracle> NftCredentialAdapter<O> {
    /// Wrap a registry
    pub fn new(oracle: O) -> Self {
        Self { oracle }
    }

    /// The wrapped registry
    pub fn oracle(&self) -> &O {
        &self.oracle
    }
}

impl<O: CredentialOracle> CredentialCapability for NftCredentialAdapter<O> {
    fn has_credential(&self, address: &Address) -> bool {
        // Fails closed: a registry error never grants rights
        match self.oracle.balance_of(address) {
            Ok(balance) => balance > 0,
            Err(e) => {
                warn!("Credential lookup for {} failed: {}", address, e);
                false
            }
        }
    }
}

/// Gate deciding who may propose and vote
pub struct EligibilityGate<C: CredentialCapability> {
    capability: C,
    administrator: Address,
    administrator_may_propose: bool,
}

impl<C: CredentialCapability> EligibilityGate<C> {
    /// Create a new gate
    pub fn new(capability: C, administrator: Address, administrator_may_propose: bool) -> Self {
        Self {
            capability,
            administrator,
            administrator_may_propose,
        }
    }

    /// The underlying capability
    pub fn capability(&self) -> &C {
        &self.capability
    }

    /// Whether `address` may create a proposal right now
    pub fn can_propose(&self, address: &Address) -> bool {
        if self.administrator_may_propose && *address == self.administrator {
            return true;
        }

        let allowed = self.capability.has_credential(address);
        debug!("Proposal eligibility for {}: {}", address, allowed);
        allowed
    }

    /// Whether `address` may vote right now
    pub fn can_vote(&self, address: &Address) -> bool {
        let allowed = self.capability.has_credential(address);
        debug!("Voting eligibility for {}: {}", address, allowed);
        allowed
    }
}
