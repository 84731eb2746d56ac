//! # Layer Identity
//!
//! Typed form of a Lambda layer version ARN.
//!
//! ```text
//! arn:aws:lambda:us-east-1:123456789012:layer:app-env:3
//! 0   1   2      3         4            5     6       7
//! ```
//!
//! Component 6 is the stable layer name shared by every version; component 7
//! is the version number assigned by the service.

use crate::constants::{LAYER_NAME_COMPONENT, LAYER_VERSION_ARN_COMPONENTS};
use crate::error::LayerError;
use std::fmt;
use std::str::FromStr;

/// Parsed layer version ARN
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerVersionArn {
    pub partition: String,
    pub region: String,
    pub account_id: String,
    pub layer_name: String,
    pub version: u64,
}

impl LayerVersionArn {
    /// Stable layer name
    #[must_use]
    pub fn layer_name(&self) -> &str {
        &self.layer_name
    }

    /// Layer ARN without the version suffix
    #[must_use]
    pub fn layer_arn(&self) -> String {
        format!(
            "arn:{}:lambda:{}:{}:layer:{}",
            self.partition, self.region, self.account_id, self.layer_name
        )
    }
}

impl FromStr for LayerVersionArn {
    type Err = LayerError;

    fn from_str(identity: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: String| LayerError::InvalidIdentity {
            identity: identity.to_string(),
            reason,
        };

        let parts: Vec<&str> = identity.split(':').collect();
        if parts.len() != LAYER_VERSION_ARN_COMPONENTS {
            return Err(invalid(format!(
                "expected {LAYER_VERSION_ARN_COMPONENTS} colon-separated components, found {}",
                parts.len()
            )));
        }

        if parts[0] != "arn" || parts[2] != "lambda" || parts[5] != "layer" {
            return Err(invalid(
                "expected the form arn:<partition>:lambda:<region>:<account>:layer:<name>:<version>"
                    .to_string(),
            ));
        }

        let layer_name = parts[LAYER_NAME_COMPONENT];
        if layer_name.is_empty() {
            return Err(invalid("layer name is empty".to_string()));
        }

        let version = parts[LAYER_NAME_COMPONENT + 1]
            .parse::<u64>()
            .map_err(|e| invalid(format!("invalid version number: {e}")))?;

        Ok(Self {
            partition: parts[1].to_string(),
            region: parts[3].to_string(),
            account_id: parts[4].to_string(),
            layer_name: layer_name.to_string(),
            version,
        })
    }
}

impl fmt::Display for LayerVersionArn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.layer_arn(), self.version)
    }
}
