//! State file for the command-line host
//!
//! Governance state and the local credential registry live together in one
//! JSON document. Writes go to a sibling temp file first and are renamed into
//! place, so a crash never leaves a half-written state file.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::debug;

use dao_credentials::RegistrySnapshot;
use dao_governance::GovernanceState;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateFile {
    pub governance: GovernanceState,
    pub registry: RegistrySnapshot,
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

impl StateFile {
    /// Read and check a state file
    pub async fn load(path: &Path) -> Result<Self> {
        if !fs::try_exists(path).await.unwrap_or(false) {
            return Err(anyhow!(
                "State file {} does not exist, run `nation-dao init` first",
                path.display()
            ));
        }

        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let state: StateFile = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        state
            .governance
            .check_consistency()
            .with_context(|| format!("State file {} is inconsistent", path.display()))?;

        debug!(
            "Loaded state from {}: {} proposals, {} votes",
            path.display(),
            state.governance.proposals().count(),
            state.governance.ledger().len()
        );
        Ok(state)
    }

    /// Write the state file atomically
    pub async fn save(&self, path: &Path) -> Result<()> {
        let contents = serde_json::to_string_pretty(self).context("Failed to encode state")?;
        let temp = temp_path(path);

        fs::write(&temp, contents)
            .await
            .with_context(|| format!("Failed to write {}", temp.display()))?;
        fs::rename(&temp, path)
            .await
            .with_context(|| format!("Failed to replace {}", path.display()))?;

        debug!("Saved state to {}", path.display());
        Ok(())
    }
}
