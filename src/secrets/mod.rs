//! # Secrets
//!
//! Resolves `secrets_arns` into a flat secret mapping and its drift fingerprint.
//!
//! ## Payload normalization
//!
//! - A payload that parses as a JSON object contributes every key of that object
//! - Any other payload is stored under the secret's own name
//!
//! References are fetched one at a time in input order, so a later reference
//! overrides an earlier one on key collision. A single failed fetch aborts the
//! whole resolution.

pub mod fingerprint;

pub use fingerprint::{fingerprint, DriftFingerprint};

use crate::config::LayerSpec;
use crate::error::{LayerError, Result};
use crate::parser::EnvMap;
use crate::provider::{SecretStore, SecretValue};
use tracing::{debug, info_span, Instrument};

/// Mapping from logical secret name to secret value
pub type ResolvedSecretMap = EnvMap;

/// Controls whether secrets are fetched at all
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchPolicy {
    /// Fetch even when nothing else requires it
    pub track_actual_secrets: bool,
    /// The reference list changed since the last reconciliation
    pub references_changed: bool,
}

impl FetchPolicy {
    /// Policy for the first publish of a layer
    #[must_use]
    pub fn for_create(spec: &LayerSpec) -> Self {
        Self {
            track_actual_secrets: spec.track_actual_secrets,
            references_changed: true,
        }
    }

    /// Policy for refreshing a published layer with its stored references
    #[must_use]
    pub fn for_refresh(spec: &LayerSpec) -> Self {
        Self {
            track_actual_secrets: spec.track_actual_secrets,
            references_changed: false,
        }
    }

    /// Policy for moving from `previous` to `desired`
    #[must_use]
    pub fn for_transition(previous: &LayerSpec, desired: &LayerSpec) -> Self {
        Self {
            track_actual_secrets: desired.track_actual_secrets,
            references_changed: previous.secrets_arns != desired.secrets_arns,
        }
    }

    /// Fetching is skipped only when nothing is tracked, nothing changed and
    /// there is nothing to fetch
    #[must_use]
    pub fn should_skip(&self, references: &[String]) -> bool {
        !self.track_actual_secrets && !self.references_changed && references.is_empty()
    }
}

/// Normalized shape of a fetched secret
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretPayload {
    /// JSON object payload, one entry per key
    Structured(EnvMap),
    /// Any other payload, keyed by the secret name
    Raw { name: String, value: String },
}

impl SecretPayload {
    /// Classify a fetched secret by payload shape
    #[must_use]
    pub fn classify(secret: SecretValue) -> Self {
        match serde_json::from_str::<serde_json::Value>(&secret.payload) {
            Ok(serde_json::Value::Object(object)) => Self::Structured(
                object
                    .into_iter()
                    .map(|(key, value)| match value {
                        serde_json::Value::String(s) => (key, s),
                        other => (key, other.to_string()),
                    })
                    .collect(),
            ),
            _ => Self::Raw {
                name: secret.name,
                value: secret.payload,
            },
        }
    }

    fn merge_into(self, target: &mut ResolvedSecretMap) {
        match self {
            Self::Structured(entries) => target.extend(entries),
            Self::Raw { name, value } => {
                target.insert(name, value);
            }
        }
    }
}

/// Outcome of a secret resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSecrets {
    pub values: ResolvedSecretMap,
    pub fingerprint: DriftFingerprint,
    /// True when the fetch policy skipped the store entirely
    pub skipped: bool,
}

impl ResolvedSecrets {
    fn empty(skipped: bool) -> Self {
        let values = ResolvedSecretMap::new();
        Self {
            fingerprint: fingerprint(&values),
            values,
            skipped,
        }
    }
}

/// Fetch and normalize all referenced secrets
///
/// # Errors
///
/// Returns `LayerError::SecretFetch` naming the first reference that failed.
/// Entries fetched before the failure are discarded.
pub async fn resolve(
    store: &dyn SecretStore,
    references: &[String],
    policy: FetchPolicy,
) -> Result<ResolvedSecrets> {
    if policy.should_skip(references) {
        debug!("Secret tracking disabled and no references configured, skipping fetch");
        return Ok(ResolvedSecrets::empty(true));
    }

    let span = info_span!("secrets.resolve", secrets.references = references.len());

    async move {
        let mut values = ResolvedSecretMap::new();

        for reference in references {
            let secret = store.get_secret_value(reference).await.map_err(|source| {
                LayerError::SecretFetch {
                    reference: reference.clone(),
                    source,
                }
            })?;
            SecretPayload::classify(secret).merge_into(&mut values);
        }

        debug!(
            "Resolved {} secret entries from {} references",
            values.len(),
            references.len()
        );

        Ok(ResolvedSecrets {
            fingerprint: fingerprint(&values),
            values,
            skipped: false,
        })
    }
    .instrument(span)
    .await
}
