//! Governance configuration, fixed at construction

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use dao_common::Address;

use crate::error::{GovernanceError, GovernanceResult};

/// Default voting window: 24 hours
pub const DEFAULT_VOTING_DURATION_SECS: u64 = 86_400;

/// Default upper bound on description length, in characters
pub const DEFAULT_MAX_DESCRIPTION_LEN: usize = 1024;

/// Who may finalize a proposal once its window has closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalizePolicy {
    /// Any address
    #[default]
    Permissionless,
    /// Only the configured administrator
    AdministratorOnly,
}

impl fmt::Display for FinalizePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FinalizePolicy::Permissionless => write!(f, "permissionless"),
            FinalizePolicy::AdministratorOnly => write!(f, "administrator_only"),
        }
    }
}

impl FromStr for FinalizePolicy {
    type Err = GovernanceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "permissionless" => Ok(FinalizePolicy::Permissionless),
            "administrator_only" | "admin_only" => Ok(FinalizePolicy::AdministratorOnly),
            other => Err(GovernanceError::invalid_input(format!(
                "Unknown finalize policy: {}",
                other
            ))),
        }
    }
}

/// Deployment-time governance settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GovernanceConfig {
    /// Address of the credential registry that confers voting rights
    pub credential_registry: Address,
    /// Administrator of this deployment
    pub administrator: Address,
    /// Voting window used when a proposal does not override it
    pub default_voting_duration: u64,
    /// Longest voting window a proposal may request
    pub max_voting_duration: Option<u64>,
    /// Longest accepted description, in characters
    pub max_description_len: usize,
    /// Who may finalize proposals
    pub finalize_policy: FinalizePolicy,
    /// Whether the administrator may propose without holding a credential
    pub administrator_may_propose: bool,
}

impl GovernanceConfig {
    /// Create a configuration with the three deployment parameters and defaults
    /// for everything else
    pub fn new(
        credential_registry: Address,
        administrator: Address,
        default_voting_duration: u64,
    ) -> Self {
        Self {
            credential_registry,
            administrator,
            default_voting_duration,
            max_voting_duration: None,
            max_description_len: DEFAULT_MAX_DESCRIPTION_LEN,
            finalize_policy: FinalizePolicy::default(),
            administrator_may_propose: false,
        }
    }

    /// Set the finalize policy
    pub fn with_finalize_policy(mut self, policy: FinalizePolicy) -> Self {
        self.finalize_policy = policy;
        self
    }

    /// Set the maximum voting window
    pub fn with_max_voting_duration(mut self, max: u64) -> Self {
        self.max_voting_duration = Some(max);
        self
    }

    /// Set the maximum description length
    pub fn with_max_description_len(mut self, max: usize) -> Self {
        self.max_description_len = max;
        self
    }

    /// Allow the administrator to propose without a credential
    pub fn with_administrator_may_propose(mut self, allowed: bool) -> Self {
        self.administrator_may_propose = allowed;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> GovernanceResult<()> {
        if self.credential_registry.is_zero() {
            return Err(GovernanceError::invalid_input(
                "Credential registry address cannot be zero",
            ));
        }

        if self.administrator.is_zero() {
            return Err(GovernanceError::invalid_input(
                "Administrator address cannot be zero",
            ));
        }

        if self.default_voting_duration == 0 {
            return Err(GovernanceError::invalid_input(
                "Default voting duration must be positive",
            ));
        }

        if let Some(max) = self.max_voting_duration {
            if max < self.default_voting_duration {
                return Err(GovernanceError::invalid_input(format!(
                    "Maximum voting duration {} is shorter than the default {}",
                    max, self.default_voting_duration
                )));
            }
        }

        if self.max_description_len == 0 {
            return Err(GovernanceError::invalid_input(
                "Maximum description length must be positive",
            ));
        }

        Ok(())
    }
}
