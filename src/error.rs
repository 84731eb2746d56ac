//! # Errors
//!
//! Error taxonomy for layer reconciliation.
//!
//! Every lifecycle call surfaces exactly one terminal [`LayerError`]. Nothing is
//! retried here; retry policy belongs to the provider clients.

use crate::provider::ProviderError;
use thiserror::Error;

/// Result type for layer operations
pub type Result<T> = std::result::Result<T, LayerError>;

/// Errors that can occur while building or reconciling a layer
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LayerError {
    /// `yaml_config` could not be parsed into a mapping
    #[error("failed to parse yaml_config: {0}")]
    ConfigParse(String),

    /// A secret reference could not be fetched; no partial results are kept
    #[error("failed to fetch secret '{reference}': {source}")]
    SecretFetch {
        reference: String,
        #[source]
        source: ProviderError,
    },

    /// An archive entry could not be read from disk
    #[error("failed to package '{entry}': {source}")]
    Packaging {
        entry: String,
        #[source]
        source: std::io::Error,
    },

    /// The zip archive could not be written
    #[error("failed to write layer archive: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// Publishing a new layer version failed
    #[error("failed to publish layer '{layer_name}': {source}")]
    Publish {
        layer_name: String,
        #[source]
        source: ProviderError,
    },

    /// Listing or deleting layer versions failed
    #[error("failed to delete layer '{layer_name}'{}: {source}", version_suffix(.version))]
    Delete {
        layer_name: String,
        version: Option<u64>,
        #[source]
        source: ProviderError,
    },

    /// The persisted layer identity is not a valid layer ARN
    #[error("invalid layer identity '{identity}': {reason}")]
    InvalidIdentity { identity: String, reason: String },
}

fn version_suffix(version: &Option<u64>) -> String {
    version.map(|v| format!(" version {v}")).unwrap_or_default()
}

impl From<serde_yaml::Error> for LayerError {
    fn from(e: serde_yaml::Error) -> Self {
        LayerError::ConfigParse(e.to_string())
    }
}

impl LayerError {
    /// Short operation label, used as a span/log field
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            LayerError::ConfigParse(_) => "config_parse",
            LayerError::SecretFetch { .. } => "secret_fetch",
            LayerError::Packaging { .. } | LayerError::Archive(_) => "packaging",
            LayerError::Publish { .. } => "publish",
            LayerError::Delete { .. } => "delete",
            LayerError::InvalidIdentity { .. } => "invalid_identity",
        }
    }
}
