//! Common test utilities for reconciler integration tests
//!
//! In-memory stand-ins for the secret store and the layer publisher. Both
//! record how often they were called so tests can assert on side effects.

#![allow(dead_code, reason = "Each test binary uses a different subset of helpers")]

use async_trait::async_trait;
use env_secret_layer::provider::{
    LayerPublisher, ProviderError, PublishLayerRequest, PublishedLayerVersion, SecretStore,
    SecretValue,
};
use env_secret_layer::LayerSpec;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::{Cursor, Read};
use std::sync::Mutex;

pub const LAYER_ARN_PREFIX: &str = "arn:aws:lambda:us-east-1:123456789012:layer";

/// In-memory secret store keyed by reference
#[derive(Debug, Default)]
pub struct FakeSecretStore {
    secrets: Mutex<HashMap<String, SecretValue>>,
    failing: Mutex<HashSet<String>>,
    fetches: Mutex<Vec<String>>,
}

impl FakeSecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a secret under `reference` with the given store name
    pub fn with_secret(self, reference: &str, name: &str, payload: &str) -> Self {
        self.put(reference, name, payload);
        self
    }

    pub fn put(&self, reference: &str, name: &str, payload: &str) {
        self.secrets.lock().unwrap().insert(
            reference.to_string(),
            SecretValue {
                name: name.to_string(),
                payload: payload.to_string(),
            },
        );
    }

    /// Change the payload of an existing secret, keeping its name
    pub fn rotate(&self, reference: &str, payload: &str) {
        let mut secrets = self.secrets.lock().unwrap();
        let secret = secrets.get_mut(reference).expect("secret must exist to rotate");
        secret.payload = payload.to_string();
    }

    /// Make every fetch of `reference` fail
    pub fn fail(&self, reference: &str) {
        self.failing.lock().unwrap().insert(reference.to_string());
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.lock().unwrap().len()
    }

    /// References in the order they were fetched
    pub fn fetched(&self) -> Vec<String> {
        self.fetches.lock().unwrap().clone()
    }
}

#[async_trait]
impl SecretStore for FakeSecretStore {
    async fn get_secret_value(&self, reference: &str) -> Result<SecretValue, ProviderError> {
        self.fetches.lock().unwrap().push(reference.to_string());

        if self.failing.lock().unwrap().contains(reference) {
            return Err(ProviderError::AccessDenied {
                resource: reference.to_string(),
                message: "injected failure".to_string(),
            });
        }

        self.secrets
            .lock()
            .unwrap()
            .get(reference)
            .cloned()
            .ok_or_else(|| ProviderError::NotFound {
                resource: reference.to_string(),
            })
    }
}

/// Counts of publisher calls for assertions
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct OperationCounts {
    pub publishes: usize,
    pub lists: usize,
    pub deletes: usize,
}

#[derive(Debug, Default)]
struct LayerVersions {
    /// Last assigned version; numbers are never reused
    latest: u64,
    live: Vec<u64>,
}

/// In-memory layer service with service-assigned version numbers
#[derive(Debug, Default)]
pub struct FakeLayerPublisher {
    layers: Mutex<HashMap<String, LayerVersions>>,
    published: Mutex<Vec<PublishLayerRequest>>,
    operations: Mutex<OperationCounts>,
    /// Versions that are listed but already gone when deleted
    ghosts: Mutex<HashSet<(String, u64)>>,
    fail_publish: Mutex<bool>,
    fail_delete: Mutex<bool>,
}

impl FakeLayerPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn operations(&self) -> OperationCounts {
        self.operations.lock().unwrap().clone()
    }

    pub fn reset_operations(&self) {
        *self.operations.lock().unwrap() = OperationCounts::default();
    }

    pub fn live_versions(&self, layer_name: &str) -> Vec<u64> {
        self.layers
            .lock()
            .unwrap()
            .get(layer_name)
            .map(|layer| layer.live.clone())
            .unwrap_or_default()
    }

    /// Request of the most recent publish call
    pub fn last_published(&self) -> Option<PublishLayerRequest> {
        self.published.lock().unwrap().last().cloned()
    }

    /// Add a version that a concurrent actor deletes before we do
    pub fn add_ghost_version(&self, layer_name: &str, version: u64) {
        let mut layers = self.layers.lock().unwrap();
        let layer = layers.entry(layer_name.to_string()).or_default();
        layer.live.push(version);
        layer.latest = layer.latest.max(version);
        self.ghosts
            .lock()
            .unwrap()
            .insert((layer_name.to_string(), version));
    }

    pub fn fail_publish(&self, fail: bool) {
        *self.fail_publish.lock().unwrap() = fail;
    }

    pub fn fail_delete(&self, fail: bool) {
        *self.fail_delete.lock().unwrap() = fail;
    }
}

#[async_trait]
impl LayerPublisher for FakeLayerPublisher {
    async fn publish(
        &self,
        request: PublishLayerRequest,
    ) -> Result<PublishedLayerVersion, ProviderError> {
        self.operations.lock().unwrap().publishes += 1;

        if *self.fail_publish.lock().unwrap() {
            return Err(ProviderError::Other(anyhow::anyhow!(
                "CodeStorageExceededException: injected failure"
            )));
        }

        let mut layers = self.layers.lock().unwrap();
        let layer = layers.entry(request.layer_name.clone()).or_default();
        layer.latest += 1;
        layer.live.push(layer.latest);

        let layer_arn = format!("{LAYER_ARN_PREFIX}:{}", request.layer_name);
        let version = layer.latest;
        self.published.lock().unwrap().push(request);

        Ok(PublishedLayerVersion {
            layer_version_arn: format!("{layer_arn}:{version}"),
            layer_arn,
            version,
        })
    }

    async fn list_versions(&self, layer_name: &str) -> Result<Vec<u64>, ProviderError> {
        self.operations.lock().unwrap().lists += 1;
        Ok(self.live_versions(layer_name))
    }

    async fn delete_version(&self, layer_name: &str, version: u64) -> Result<(), ProviderError> {
        self.operations.lock().unwrap().deletes += 1;

        if *self.fail_delete.lock().unwrap() {
            return Err(ProviderError::Other(anyhow::anyhow!(
                "ServiceException: injected failure"
            )));
        }

        let mut layers = self.layers.lock().unwrap();
        if let Some(layer) = layers.get_mut(layer_name) {
            layer.live.retain(|v| *v != version);
        }

        if self
            .ghosts
            .lock()
            .unwrap()
            .remove(&(layer_name.to_string(), version))
        {
            return Err(ProviderError::NotFound {
                resource: format!("{layer_name}:{version}"),
            });
        }
        Ok(())
    }
}

/// Spec with the given name and a `.env` file entry
pub fn spec(layer_name: &str) -> LayerSpec {
    LayerSpec::new(layer_name, ".env")
}

/// Read every entry of a layer archive
pub fn read_archive(archive: &[u8]) -> BTreeMap<String, String> {
    let mut zip = zip::ZipArchive::new(Cursor::new(archive)).unwrap();
    let mut entries = BTreeMap::new();
    for i in 0..zip.len() {
        let mut file = zip.by_index(i).unwrap();
        let mut content = String::new();
        file.read_to_string(&mut content).unwrap();
        entries.insert(file.name().to_string(), content);
    }
    entries
}
