//! Persisted state of a managed layer.

use crate::config::LayerSpec;
use crate::error::Result as LayerResult;
use crate::identity::LayerVersionArn;
use crate::secrets::DriftFingerprint;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Last known state of a published layer
///
/// Only the reconciler creates or mutates this; callers store it between runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagedResourceState {
    /// Identity of the most recently published version
    pub layer_version_arn: String,
    /// Layer ARN without the version suffix
    pub layer_arn: String,
    pub version: u64,
    /// Fingerprint of the secrets baked into the published version
    pub stored_fingerprint: DriftFingerprint,
    /// Desired configuration the published version was built from
    pub spec: LayerSpec,
    /// Set by a refresh that observed secret drift
    #[serde(default)]
    pub needs_update: bool,
}

impl ManagedResourceState {
    /// Parse the stored identity
    ///
    /// # Errors
    ///
    /// Returns `LayerError::InvalidIdentity` if the stored ARN is malformed.
    pub fn identity(&self) -> LayerResult<LayerVersionArn> {
        self.layer_version_arn.parse()
    }

    /// Load state from a JSON file
    ///
    /// Returns `Ok(None)` when the file does not exist, which means the layer
    /// has not been created yet (or was destroyed).
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub async fn load(path: &Path) -> Result<Option<Self>> {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No state file at {}", path.display());
                return Ok(None);
            }
            Err(e) => {
                return Err(e).context(format!("Failed to read state: {}", path.display()));
            }
        };

        let state = serde_json::from_str(&content)
            .context(format!("Failed to parse state: {}", path.display()))?;
        Ok(Some(state))
    }

    /// Write state to a JSON file, replacing any previous content
    ///
    /// # Errors
    ///
    /// Returns an error if the state cannot be serialized or written.
    pub async fn save(&self, path: &Path) -> Result<()> {
        let content =
            serde_json::to_string_pretty(self).context("Failed to serialize layer state")?;
        tokio::fs::write(path, content)
            .await
            .context(format!("Failed to write state: {}", path.display()))?;
        debug!("Saved state for {} to {}", self.layer_version_arn, path.display());
        Ok(())
    }

    /// Remove a state file; a missing file is not an error
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be removed.
    pub async fn remove(path: &Path) -> Result<()> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).context(format!("Failed to remove state: {}", path.display())),
        }
    }
}
