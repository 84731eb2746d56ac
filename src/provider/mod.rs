//! # Provider Modules
//!
//! External collaborators the reconciler talks to.
//!
//! Each provider implements either:
//! - `SecretStore` for reading secret payloads by reference
//! - `LayerPublisher` for publishing, listing and deleting layer versions
//!
//! The reconciler only ever sees these traits; the AWS implementations live in
//! [`aws`].

use async_trait::async_trait;
use thiserror::Error;

/// Errors reported by provider implementations
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The referenced secret or layer version does not exist
    #[error("{resource} not found")]
    NotFound { resource: String },

    /// The caller is not allowed to access the resource
    #[error("access denied to {resource}: {message}")]
    AccessDenied { resource: String, message: String },

    /// Any other provider failure, surfaced verbatim
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ProviderError {
    /// Check if this error means the resource is already absent
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, ProviderError::NotFound { .. })
    }
}

/// A secret as returned by the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretValue {
    /// Canonical secret name as reported by the store (not the ARN)
    pub name: String,
    /// Raw secret payload
    pub payload: String,
}

/// Provider trait for secret stores
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Fetch the current value of a secret by reference (ARN or name)
    async fn get_secret_value(&self, reference: &str) -> Result<SecretValue, ProviderError>;
}

/// Input for publishing a new layer version
#[derive(Debug, Clone, Default)]
pub struct PublishLayerRequest {
    /// Stable layer name
    pub layer_name: String,
    /// Zip archive bytes
    pub content: Vec<u8>,
    /// Runtime identifiers the layer is compatible with
    pub compatible_runtimes: Vec<String>,
    /// Optional version description
    pub description: Option<String>,
    /// Optional SPDX identifier or license URL
    pub license_info: Option<String>,
}

/// Identity of a freshly published layer version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedLayerVersion {
    /// Layer ARN without the version suffix
    pub layer_arn: String,
    /// Fully qualified layer version ARN
    pub layer_version_arn: String,
    /// Version number assigned by the service
    pub version: u64,
}

/// Provider trait for versioned layer publishing
///
/// Version numbering is owned by the service. Callers must use the identity
/// returned by `publish` and never predict the next version.
#[async_trait]
pub trait LayerPublisher: Send + Sync {
    /// Publish a new immutable layer version
    async fn publish(
        &self,
        request: PublishLayerRequest,
    ) -> Result<PublishedLayerVersion, ProviderError>;

    /// List all existing version numbers under a layer name
    async fn list_versions(&self, layer_name: &str) -> Result<Vec<u64>, ProviderError>;

    /// Delete a single layer version
    async fn delete_version(&self, layer_name: &str, version: u64) -> Result<(), ProviderError>;
}

pub mod aws;
