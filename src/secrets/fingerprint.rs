//! # Drift Fingerprint
//!
//! Deterministic SHA-256 digest of a resolved secret mapping.
//!
//! Keys are visited in byte-wise sorted order and each key is fed immediately
//! followed by its value, with no separators. The digest is used for change
//! detection only.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

/// Hex-encoded SHA-256 fingerprint of a secret mapping
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DriftFingerprint(String);

impl DriftFingerprint {
    /// Wrap an already computed digest
    #[must_use]
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DriftFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fingerprint a secret mapping
#[must_use]
pub fn fingerprint(secrets: &BTreeMap<String, String>) -> DriftFingerprint {
    let mut hasher = Sha256::new();
    for (key, value) in secrets {
        hasher.update(key.as_bytes());
        hasher.update(value.as_bytes());
    }
    DriftFingerprint(format!("{:x}", hasher.finalize()))
}
