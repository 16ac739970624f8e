//! In-memory credential registry
//!
//! Mirrors the ownership rules of an ERC-721 collection closely enough to
//! exercise the governance core: tokens are minted to an owner, transferred by
//! their current owner, and burned. Used by tests and by the local CLI host.

use std::collections::BTreeMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tracing::debug;

use dao_common::{Address, TokenId};

use crate::{CredentialOracle, OracleError, OracleResult};

/// Serializable view of a registry's ownership table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    /// Token id -> current owner
    #[serde(default)]
    pub owners: BTreeMap<TokenId, Address>,
}

#[derive(Debug, Default)]
struct RegistryState {
    owners: BTreeMap<TokenId, Address>,
    available: bool,
}

/// A credential registry held in memory
#[derive(Debug)]
pub struct MemoryCredentialRegistry {
    state: RwLock<RegistryState>,
}

impl MemoryCredentialRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::from_snapshot(RegistrySnapshot::default())
    }

    /// Restore a registry from a snapshot
    pub fn from_snapshot(snapshot: RegistrySnapshot) -> Self {
        Self {
            state: RwLock::new(RegistryState {
                owners: snapshot.owners,
                available: true,
            }),
        }
    }

    /// Take a snapshot of the ownership table
    pub fn snapshot(&self) -> OracleResult<RegistrySnapshot> {
        let state = self.read()?;
        Ok(RegistrySnapshot {
            owners: state.owners.clone(),
        })
    }

    /// Simulate an outage: while unavailable every query fails
    pub fn set_available(&self, available: bool) -> OracleResult<()> {
        let mut state = self
            .state
            .write()
            .map_err(|e| OracleError::Unavailable(format!("Registry lock poisoned: {}", e)))?;
        state.available = available;
        debug!("Registry availability set to {}", available);
        Ok(())
    }

    /// Mint `token_id` to `to`
    pub fn mint(&self, to: Address, token_id: TokenId) -> OracleResult<()> {
        if to.is_zero() {
            return Err(OracleError::ZeroAddress);
        }

        let mut state = self.write()?;
        if state.owners.contains_key(&token_id) {
            return Err(OracleError::TokenAlreadyMinted(token_id));
        }

        state.owners.insert(token_id, to);
        debug!("Minted credential {} to {}", token_id, to);
        Ok(())
    }

    /// Transfer `token_id` from its current owner `from` to `to`
    pub fn transfer(&self, from: &Address, to: Address, token_id: TokenId) -> OracleResult<()> {
        if to.is_zero() {
            return Err(OracleError::ZeroAddress);
        }

        let mut state = self.write()?;
        let owner = state
            .owners
            .get_mut(&token_id)
            .ok_or(OracleError::TokenNotFound(token_id))?;

        if owner != from {
            return Err(OracleError::NotOwner {
                token_id,
                address: *from,
            });
        }

        *owner = to;
        debug!("Transferred credential {} from {} to {}", token_id, from, to);
        Ok(())
    }

    /// Burn `token_id`, which must be owned by `owner`
    pub fn burn(&self, owner: &Address, token_id: TokenId) -> OracleResult<()> {
        let mut state = self.write()?;
        match state.owners.get(&token_id) {
            None => return Err(OracleError::TokenNotFound(token_id)),
            Some(current) if current != owner => {
                return Err(OracleError::NotOwner {
                    token_id,
                    address: *owner,
                })
            }
            Some(_) => {}
        }

        state.owners.remove(&token_id);
        debug!("Burned credential {} held by {}", token_id, owner);
        Ok(())
    }

    /// Number of credentials in existence
    pub fn total_supply(&self) -> OracleResult<u64> {
        Ok(self.read()?.owners.len() as u64)
    }

    fn read(&self) -> OracleResult<std::sync::RwLockReadGuard<'_, RegistryState>> {
        let state = self
            .state
            .read()
            .map_err(|e| OracleError::Unavailable(format!("Registry lock poisoned: {}", e)))?;
        if !state.available {
            return Err(OracleError::Unavailable("Registry offline".to_string()));
        }
        Ok(state)
    }

    fn write(&self) -> OracleResult<std::sync::RwLockWriteGuard<'_, RegistryState>> {
        let state = self
            .state
            .write()
            .map_err(|e| OracleError::Unavailable(format!("Registry lock poisoned: {}", e)))?;
        if !state.available {
            return Err(OracleError::Unavailable("Registry offline".to_string()));
        }
        Ok(state)
    }
}

impl Default for MemoryCredentialRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialOracle for MemoryCredentialRegistry {
    fn balance_of(&self, owner: &Address) -> OracleResult<u64> {
        let state = self.read()?;
        Ok(state.owners.values().filter(|holder| *holder == owner).count() as u64)
    }

    fn owner_of(&self, token_id: TokenId) -> OracleResult<Address> {
        let state = self.read()?;
        state
            .owners
            .get(&token_id)
            .copied()
            .ok_or(OracleError::TokenNotFound(token_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn addr(n: u64) -> Address {
        Address::from_low_u64_be(n)
    }

    #[test]
    fn test_mint_and_query() {
        let registry = MemoryCredentialRegistry::new();
        registry.mint(addr(1), 1).unwrap();
        registry.mint(addr(1), 2).unwrap();
        registry.mint(addr(2), 3).unwrap();

        assert_eq!(registry.balance_of(&addr(1)).unwrap(), 2);
        assert_eq!(registry.balance_of(&addr(2)).unwrap(), 1);
        assert_eq!(registry.balance_of(&addr(3)).unwrap(), 0);
        assert_eq!(registry.owner_of(3).unwrap(), addr(2));
        assert_eq!(registry.owner_of(9), Err(OracleError::TokenNotFound(9)));
        assert_eq!(registry.total_supply().unwrap(), 3);
    }

    #[test]
    fn test_mint_rejects_duplicates_and_zero_address() {
        let registry = MemoryCredentialRegistry::new();
        registry.mint(addr(1), 1).unwrap();

        assert_eq!(registry.mint(addr(2), 1), Err(OracleError::TokenAlreadyMinted(1)));
        assert_eq!(registry.mint(Address::zero(), 2), Err(OracleError::ZeroAddress));
    }

    #[test]
    fn test_transfer_requires_ownership() {
        let registry = MemoryCredentialRegistry::new();
        registry.mint(addr(1), 1).unwrap();

        let err = registry.transfer(&addr(2), addr(3), 1).unwrap_err();
        assert_eq!(err, OracleError::NotOwner { token_id: 1, address: addr(2) });

        registry.transfer(&addr(1), addr(2), 1).unwrap();
        assert_eq!(registry.owner_of(1).unwrap(), addr(2));
        assert_eq!(registry.balance_of(&addr(1)).unwrap(), 0);
    }

    #[test]
    fn test_burn() {
        let registry = MemoryCredentialRegistry::new();
        registry.mint(addr(1), 1).unwrap();

        assert!(registry.burn(&addr(2), 1).is_err());
        registry.burn(&addr(1), 1).unwrap();
        assert_eq!(registry.balance_of(&addr(1)).unwrap(), 0);
        assert_eq!(registry.burn(&addr(1), 1), Err(OracleError::TokenNotFound(1)));
    }

    #[test]
    fn test_unavailable_registry_fails_queries() {
        let registry = Arc::new(MemoryCredentialRegistry::new());
        registry.mint(addr(1), 1).unwrap();
        registry.set_available(false).unwrap();

        assert!(matches!(registry.balance_of(&addr(1)), Err(OracleError::Unavailable(_))));
        assert!(matches!(registry.owner_of(1), Err(OracleError::Unavailable(_))));

        registry.set_available(true).unwrap();
        assert_eq!(registry.balance_of(&addr(1)).unwrap(), 1);
    }

    #[test]
    fn test_set_available_reports_poisoned_lock() {
        let registry = Arc::new(MemoryCredentialRegistry::new());
        let holder = registry.clone();
        let _ = std::thread::spawn(move || {
            let _guard = holder.state.write().unwrap();
            panic!("writer died holding the lock");
        })
        .join();

        assert!(matches!(
            registry.set_available(true),
            Err(OracleError::Unavailable(_))
        ));
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let registry = MemoryCredentialRegistry::new();
        registry.mint(addr(1), 10).unwrap();
        registry.mint(addr(2), 20).unwrap();

        let json = serde_json::to_string(&registry.snapshot().unwrap()).unwrap();
        let restored = MemoryCredentialRegistry::from_snapshot(serde_json::from_str(&json).unwrap());
        assert_eq!(restored.owner_of(20).unwrap(), addr(2));
        assert_eq!(restored.total_supply().unwrap(), 2);
    }
}
