//! # Configuration
//!
//! Resource definition (`LayerSpec`) and AWS client configuration.
//!
//! A resource definition is a YAML document:
//!
//! ```yaml
//! layer_name: app-env
//! file_name: .env
//! yaml_config: |
//!   database:
//!     host: db.internal
//! envs_map:
//!   LOG_LEVEL: debug
//! secrets_arns:
//!   - arn:aws:secretsmanager:us-east-1:123456789012:secret:app-db-AbCdEf
//! license_files:
//!   - ./LICENSE
//! compatible_runtimes:
//!   - nodejs20.x
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// AWS client configuration
///
/// Both fields fall back to the SDK default chain when unset.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct AwsConfig {
    /// AWS region (e.g., "us-east-1")
    #[serde(default)]
    pub region: Option<String>,
    /// Shared credentials/config profile name
    #[serde(default)]
    pub profile: Option<String>,
}

/// Desired state of one managed layer
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct LayerSpec {
    /// Stable layer name, shared by all published versions
    pub layer_name: String,
    /// Name of the env file entry inside the layer archive
    pub file_name: String,
    /// Nested YAML document flattened into `KEY=VALUE` entries
    #[serde(default)]
    pub yaml_config: String,
    /// Secrets Manager references (ARNs or names), fetched in order
    #[serde(default)]
    pub secrets_arns: Vec<String>,
    /// Explicit overrides, applied last
    #[serde(default)]
    pub envs_map: BTreeMap<String, String>,
    /// Files bundled verbatim next to the env file
    #[serde(default)]
    pub license_files: Vec<PathBuf>,
    #[serde(default)]
    pub compatible_runtimes: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub license_info: Option<String>,
    /// Keep previous versions when a new one is published
    #[serde(default)]
    pub skip_destroy: bool,
    /// Always fetch secrets, even when no references are configured
    #[serde(default)]
    pub track_actual_secrets: bool,
}

impl LayerSpec {
    /// Create a spec with only the required fields set
    #[must_use]
    pub fn new(layer_name: impl Into<String>, file_name: impl Into<String>) -> Self {
        Self {
            layer_name: layer_name.into(),
            file_name: file_name.into(),
            yaml_config: String::new(),
            secrets_arns: Vec::new(),
            envs_map: BTreeMap::new(),
            license_files: Vec::new(),
            compatible_runtimes: Vec::new(),
            description: None,
            license_info: None,
            skip_destroy: false,
            track_actual_secrets: false,
        }
    }

    /// Parse a resource definition from YAML
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not valid YAML, a required field is
    /// missing, or `layer_name`/`file_name` is empty.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let spec: LayerSpec =
            serde_yaml::from_str(yaml).context("Failed to parse layer resource definition")?;
        spec.validate()?;
        Ok(spec)
    }

    /// Load a resource definition from a YAML file
    ///
    /// Relative `license_files` are resolved against the file's directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or does not parse.
    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .context(format!("Failed to read: {}", path.display()))?;
        let mut spec = Self::from_yaml(&content)?;

        if let Some(base) = path.parent() {
            for file in &mut spec.license_files {
                if file.is_relative() {
                    *file = base.join(&*file);
                }
            }
        }

        Ok(spec)
    }

    fn validate(&self) -> Result<()> {
        if self.layer_name.trim().is_empty() {
            anyhow::bail!("layer_name must not be empty");
        }
        if self.file_name.trim().is_empty() {
            anyhow::bail!("file_name must not be empty");
        }
        Ok(())
    }

    /// Names of the content-affecting fields that differ from `other`
    #[must_use]
    pub fn changed_fields(&self, other: &LayerSpec) -> Vec<&'static str> {
        let mut changed = Vec::new();
        if self.layer_name != other.layer_name {
            changed.push("layer_name");
        }
        if self.file_name != other.file_name {
            changed.push("file_name");
        }
        if self.yaml_config != other.yaml_config {
            changed.push("yaml_config");
        }
        if self.secrets_arns != other.secrets_arns {
            changed.push("secrets_arns");
        }
        if self.envs_map != other.envs_map {
            changed.push("envs_map");
        }
        if self.license_files != other.license_files {
            changed.push("license_files");
        }
        if self.compatible_runtimes != other.compatible_runtimes {
            changed.push("compatible_runtimes");
        }
        if self.description != other.description {
            changed.push("description");
        }
        if self.license_info != other.license_info {
            changed.push("license_info");
        }
        changed
    }
}
