//! # Reconciler
//!
//! Lifecycle of a managed env secret layer.
//!
//! The reconciler:
//! - Builds the layer content from `yaml_config`, resolved secrets and `envs_map`
//! - Publishes it as a new immutable layer version
//! - Detects secret drift by comparing fingerprints
//! - Replaces or removes every published version under the layer name
//!
//! ## State Machine
//!
//! ```text
//! Absent --create--> Published --read (drift)--> Stale
//!                        |                         |
//!                        +-------update------------+--> Published
//!                        |
//!                        +-------delete-----------> Absent
//! ```
//!
//! Every external call is awaited before the next one starts. Nothing is
//! retried; the first failure ends the operation.

pub mod diff;
pub mod state;

pub use diff::{DiffPreview, FieldPlan};
pub use state::ManagedResourceState;

use crate::config::LayerSpec;
use crate::error::{LayerError, Result};
use crate::package::package;
use crate::parser::{flatten, render_env_file, EnvMap};
use crate::provider::{LayerPublisher, PublishLayerRequest, SecretStore};
use crate::secrets::{resolve, FetchPolicy, ResolvedSecrets};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, field, info, info_span, warn, Instrument, Span};

/// Span for a lifecycle operation; outcome fields are filled by `finish_span`
macro_rules! operation_span {
    ($name:literal, $layer_name:expr) => {
        info_span!(
            $name,
            layer.name = %$layer_name,
            layer.version = field::Empty,
            operation.success = field::Empty,
            operation.duration_ms = field::Empty,
            error.kind = field::Empty,
        )
    };
}

/// Result of an update
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Nothing changed; the existing state stays valid
    Unchanged,
    /// A new version was published
    Republished {
        state: Box<ManagedResourceState>,
        /// Versions deleted before publishing (0 with `skip_destroy`)
        deleted_versions: usize,
    },
}

/// Result of a delete
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteOutcome {
    pub layer_name: String,
    /// Versions removed by this call
    pub deleted: Vec<u64>,
    /// Versions that disappeared between listing and deletion
    pub already_absent: Vec<u64>,
}

/// Drives layer lifecycle operations against a secret store and a publisher
#[derive(Clone)]
pub struct Reconciler {
    secrets: Arc<dyn SecretStore>,
    publisher: Arc<dyn LayerPublisher>,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler").finish_non_exhaustive()
    }
}

impl Reconciler {
    #[must_use]
    pub fn new(secrets: Arc<dyn SecretStore>, publisher: Arc<dyn LayerPublisher>) -> Self {
        Self { secrets, publisher }
    }

    /// Publish the first version of a layer
    ///
    /// # Errors
    ///
    /// Returns the first failure from flattening, secret resolution, packaging
    /// or publishing. Nothing is published on failure.
    pub async fn create(&self, spec: &LayerSpec) -> Result<ManagedResourceState> {
        let span = operation_span!("layer.create", &spec.layer_name);
        let start = Instant::now();

        let result = async {
            let secrets = resolve(
                self.secrets.as_ref(),
                &spec.secrets_arns,
                FetchPolicy::for_create(spec),
            )
            .await?;
            let archive = build_archive(spec, &secrets)?;
            self.publish(spec, archive, secrets).await
        }
        .instrument(span.clone())
        .await;

        finish_span(&span, start, &result);
        result
    }

    /// Refresh drift status
    ///
    /// Re-resolves the stored references and sets `needs_update` when the
    /// observed fingerprint differs from the stored one. Returns whether drift
    /// was observed. Never publishes.
    ///
    /// # Errors
    ///
    /// Returns `LayerError::SecretFetch` if any reference cannot be fetched.
    pub async fn read(&self, state: &mut ManagedResourceState) -> Result<bool> {
        let span = operation_span!("layer.read", &state.spec.layer_name);
        let start = Instant::now();

        let result = async {
            let secrets = resolve(
                self.secrets.as_ref(),
                &state.spec.secrets_arns,
                FetchPolicy::for_refresh(&state.spec),
            )
            .await?;

            let drifted = secrets.fingerprint != state.stored_fingerprint;
            if drifted {
                info!(
                    "Secrets for layer {} changed since version {}",
                    state.spec.layer_name, state.version
                );
                state.needs_update = true;
            }
            Ok::<_, LayerError>(drifted)
        }
        .instrument(span.clone())
        .await;

        finish_span(&span, start, &result);
        result
    }

    /// Bring a published layer in line with `desired`
    ///
    /// A new version is published when a tracked field changed, the secrets
    /// drifted, or a previous refresh flagged the state. Unless `skip_destroy`
    /// is set, every existing version is deleted first. The archive is built
    /// before anything is deleted, so configuration and packaging errors leave
    /// the published layer untouched.
    ///
    /// # Errors
    ///
    /// Returns the first failure. A delete failure aborts before publishing; a
    /// publish failure after a successful delete leaves the layer absent.
    pub async fn update(
        &self,
        state: &ManagedResourceState,
        desired: &LayerSpec,
    ) -> Result<UpdateOutcome> {
        let span = operation_span!("layer.update", &desired.layer_name);
        let start = Instant::now();

        let result = async {
            let secrets = resolve(
                self.secrets.as_ref(),
                &desired.secrets_arns,
                FetchPolicy::for_transition(&state.spec, desired),
            )
            .await?;

            let changed = desired.changed_fields(&state.spec);
            let drifted = secrets.fingerprint != state.stored_fingerprint;

            if changed.is_empty() && !drifted && !state.needs_update {
                debug!("Layer {} is up to date", desired.layer_name);
                return Ok(UpdateOutcome::Unchanged);
            }

            info!(
                "Republishing layer {} (changed fields: {:?}, secrets drifted: {}, flagged: {})",
                desired.layer_name, changed, drifted, state.needs_update
            );

            let archive = build_archive(desired, &secrets)?;

            let deleted_versions = if desired.skip_destroy {
                debug!("skip_destroy set, keeping existing versions");
                0
            } else {
                self.delete_all(state).await?.deleted.len()
            };

            let new_state = self.publish(desired, archive, secrets).await?;
            Ok::<_, LayerError>(UpdateOutcome::Republished {
                state: Box::new(new_state),
                deleted_versions,
            })
        }
        .instrument(span.clone())
        .await;

        finish_span(&span, start, &result);
        result
    }

    /// Delete every version published under the layer name
    ///
    /// Deleting a layer with no versions left succeeds with an empty outcome.
    ///
    /// # Errors
    ///
    /// Returns `LayerError::InvalidIdentity` if the stored ARN is malformed and
    /// `LayerError::Delete` if listing or deleting fails.
    pub async fn delete(&self, state: &ManagedResourceState) -> Result<DeleteOutcome> {
        let span = operation_span!("layer.delete", &state.spec.layer_name);
        let start = Instant::now();

        let result = self.delete_all(state).instrument(span.clone()).await;

        finish_span(&span, start, &result);
        result
    }

    /// Preview what an update to `pending` would do, without side effects
    ///
    /// # Errors
    ///
    /// Returns `LayerError::SecretFetch` if any reference cannot be fetched.
    pub async fn diff_preview(
        &self,
        state: &ManagedResourceState,
        pending: &LayerSpec,
    ) -> Result<DiffPreview> {
        let span = operation_span!("layer.diff", &pending.layer_name);
        let start = Instant::now();

        let result = async {
            let secrets = resolve(
                self.secrets.as_ref(),
                &pending.secrets_arns,
                FetchPolicy::for_transition(&state.spec, pending),
            )
            .await?;

            Ok::<_, LayerError>(DiffPreview::new(
                pending.changed_fields(&state.spec),
                secrets.fingerprint,
                &state.stored_fingerprint,
                state.needs_update,
            ))
        }
        .instrument(span.clone())
        .await;

        finish_span(&span, start, &result);
        result
    }

    async fn publish(
        &self,
        spec: &LayerSpec,
        archive: Vec<u8>,
        secrets: ResolvedSecrets,
    ) -> Result<ManagedResourceState> {
        let request = PublishLayerRequest {
            layer_name: spec.layer_name.clone(),
            content: archive,
            compatible_runtimes: spec.compatible_runtimes.clone(),
            description: spec.description.clone(),
            license_info: spec.license_info.clone(),
        };

        let published =
            self.publisher
                .publish(request)
                .await
                .map_err(|source| LayerError::Publish {
                    layer_name: spec.layer_name.clone(),
                    source,
                })?;

        Span::current().record("layer.version", published.version);
        info!(
            "Published layer {} version {}",
            spec.layer_name, published.version
        );

        Ok(ManagedResourceState {
            layer_version_arn: published.layer_version_arn,
            layer_arn: published.layer_arn,
            version: published.version,
            stored_fingerprint: secrets.fingerprint,
            spec: spec.clone(),
            needs_update: false,
        })
    }

    async fn delete_all(&self, state: &ManagedResourceState) -> Result<DeleteOutcome> {
        let identity = state.identity()?;
        let layer_name = identity.layer_name();

        let versions = self
            .publisher
            .list_versions(layer_name)
            .await
            .map_err(|source| LayerError::Delete {
                layer_name: layer_name.to_string(),
                version: None,
                source,
            })?;

        let mut outcome = DeleteOutcome {
            layer_name: layer_name.to_string(),
            ..DeleteOutcome::default()
        };

        for version in versions {
            match self.publisher.delete_version(layer_name, version).await {
                Ok(()) => outcome.deleted.push(version),
                Err(e) if e.is_not_found() => {
                    warn!("Layer {} version {} already deleted", layer_name, version);
                    outcome.already_absent.push(version);
                }
                Err(source) => {
                    return Err(LayerError::Delete {
                        layer_name: layer_name.to_string(),
                        version: Some(version),
                        source,
                    });
                }
            }
        }

        info!(
            "Deleted {} versions of layer {}",
            outcome.deleted.len(),
            layer_name
        );
        Ok(outcome)
    }
}

/// Assemble the primary env file and package it with the auxiliary files
///
/// Precedence, lowest first: flattened `yaml_config`, resolved secrets,
/// `envs_map`.
fn build_archive(spec: &LayerSpec, secrets: &ResolvedSecrets) -> Result<Vec<u8>> {
    let mut entries: EnvMap = flatten(&spec.yaml_config)?;
    entries.extend(secrets.values.clone());
    entries.extend(spec.envs_map.clone());

    debug!(
        "Layer {} env file has {} entries",
        spec.layer_name,
        entries.len()
    );
    package(
        &spec.file_name,
        render_env_file(&entries).as_bytes(),
        &spec.license_files,
    )
}

fn finish_span<T>(span: &Span, start: Instant, result: &Result<T>) {
    span.record(
        "operation.duration_ms",
        u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
    );
    match result {
        Ok(_) => {
            span.record("operation.success", true);
        }
        Err(e) => {
            span.record("operation.success", false);
            span.record("error.kind", e.kind());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secrets::fingerprint;

    fn resolved(pairs: &[(&str, &str)]) -> ResolvedSecrets {
        let values: EnvMap = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        ResolvedSecrets {
            fingerprint: fingerprint(&values),
            values,
            skipped: false,
        }
    }

    fn env_file(archive: &[u8], name: &str) -> String {
        use std::io::Read;
        let mut zip = zip::ZipArchive::new(std::io::Cursor::new(archive)).unwrap();
        let mut file = zip.by_name(name).unwrap();
        let mut content = String::new();
        file.read_to_string(&mut content).unwrap();
        content
    }

    #[test]
    fn test_build_archive_precedence() {
        let mut spec = LayerSpec::new("app-env", ".env");
        spec.yaml_config = "A: yaml\nB: yaml\nC: yaml\n".to_string();
        spec.envs_map.insert("C".to_string(), "override".to_string());

        let archive = build_archive(&spec, &resolved(&[("B", "secret"), ("C", "secret")])).unwrap();
        assert_eq!(env_file(&archive, ".env"), "A=yaml\nB=secret\nC=override\n");
    }

    #[test]
    fn test_build_archive_rejects_bad_yaml() {
        let mut spec = LayerSpec::new("app-env", ".env");
        spec.yaml_config = "- not\n- a mapping\n".to_string();
        let err = build_archive(&spec, &resolved(&[])).unwrap_err();
        assert!(matches!(err, LayerError::ConfigParse(_)));
    }
}
