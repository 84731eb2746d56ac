//! Plan-time preview of an update.

use crate::secrets::DriftFingerprint;
use serde::Serialize;
use std::fmt;

/// What an apply will do to a computed state field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldPlan {
    Unchanged,
    /// Known only after apply
    Recompute,
}

impl fmt::Display for FieldPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldPlan::Unchanged => f.write_str("unchanged"),
            FieldPlan::Recompute => f.write_str("(known after apply)"),
        }
    }
}

/// Result of comparing persisted state with a pending configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffPreview {
    /// Tracked configuration fields that differ
    pub changed_fields: Vec<&'static str>,
    /// Fingerprint of the secrets as they are right now
    pub observed_fingerprint: DriftFingerprint,
    /// True when the observed fingerprint differs from the stored one
    pub secrets_drifted: bool,
    pub stored_fingerprint: FieldPlan,
    pub layer_version_arn: FieldPlan,
}

impl DiffPreview {
    pub(crate) fn new(
        changed_fields: Vec<&'static str>,
        observed_fingerprint: DriftFingerprint,
        stored: &DriftFingerprint,
        needs_update: bool,
    ) -> Self {
        let secrets_drifted = observed_fingerprint != *stored;
        let stored_fingerprint = if secrets_drifted {
            FieldPlan::Recompute
        } else {
            FieldPlan::Unchanged
        };
        let layer_version_arn = if secrets_drifted || needs_update || !changed_fields.is_empty() {
            FieldPlan::Recompute
        } else {
            FieldPlan::Unchanged
        };

        Self {
            changed_fields,
            observed_fingerprint,
            secrets_drifted,
            stored_fingerprint,
            layer_version_arn,
        }
    }

    /// An apply would publish a new version
    #[must_use]
    pub fn has_changes(&self) -> bool {
        self.layer_version_arn == FieldPlan::Recompute
    }
}
