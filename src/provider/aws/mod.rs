//! # AWS Providers
//!
//! Clients for AWS Secrets Manager and AWS Lambda layers.
//!
//! This module provides:
//! - SDK configuration loading (region and shared-config profile)
//! - [`AwsSecretsManager`], the [`SecretStore`] used to resolve `secrets_arns`
//! - [`AwsLambdaLayers`], the [`LayerPublisher`](crate::provider::LayerPublisher)
//!   used to publish and delete layer versions

use crate::config::AwsConfig;
use crate::provider::{ProviderError, SecretStore, SecretValue};
use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_secretsmanager::error::{DisplayErrorContext, ProvideErrorMetadata};
use aws_sdk_secretsmanager::Client as SecretsManagerClient;
use std::time::Instant;
use tracing::{debug, field, info, Instrument};

pub mod lambda;
pub use lambda::AwsLambdaLayers;

const RESOURCE_NOT_FOUND: &str = "ResourceNotFoundException";
const ACCESS_DENIED: &str = "AccessDeniedException";

/// Load the shared AWS SDK configuration
///
/// Region and profile fall back to the SDK default provider chain
/// (environment, shared config files, instance metadata) when unset.
pub async fn load_sdk_config(config: &AwsConfig) -> SdkConfig {
    let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());

    if let Some(region) = &config.region {
        loader = loader.region(aws_config::Region::new(region.clone()));
    }

    if let Some(profile) = &config.profile {
        info!("Using AWS shared config profile: {}", profile);
        loader = loader.profile_name(profile);
    }

    loader.load().await
}

/// Classify an AWS error by its service error code
pub(crate) fn classify_error(
    resource: &str,
    code: Option<&str>,
    message: Option<&str>,
    context: String,
) -> ProviderError {
    match code {
        Some(RESOURCE_NOT_FOUND) => ProviderError::NotFound {
            resource: resource.to_string(),
        },
        Some(ACCESS_DENIED) => ProviderError::AccessDenied {
            resource: resource.to_string(),
            message: message.unwrap_or_default().to_string(),
        },
        _ => ProviderError::Other(anyhow::anyhow!(context)),
    }
}

/// Decode a binary secret payload, which must be valid UTF-8
fn decode_secret_binary(reference: &str, bytes: &[u8]) -> Result<String, ProviderError> {
    String::from_utf8(bytes.to_vec()).map_err(|e| {
        ProviderError::Other(anyhow::anyhow!(
            "Secret {reference} binary value is not valid UTF-8: {e}"
        ))
    })
}

/// AWS Secrets Manager provider implementation
pub struct AwsSecretsManager {
    client: SecretsManagerClient,
}

impl std::fmt::Debug for AwsSecretsManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsSecretsManager").finish_non_exhaustive()
    }
}

impl AwsSecretsManager {
    /// Create a new AWS Secrets Manager client from a loaded SDK config
    #[must_use]
    pub fn new(sdk_config: &SdkConfig) -> Self {
        Self {
            client: SecretsManagerClient::new(sdk_config),
        }
    }
}

#[async_trait]
impl SecretStore for AwsSecretsManager {
    async fn get_secret_value(&self, reference: &str) -> Result<SecretValue, ProviderError> {
        let span = tracing::debug_span!(
            "aws.secret.get",
            secret.reference = reference,
            operation.success = field::Empty,
            operation.duration_ms = field::Empty,
        );
        let span_clone = span.clone();
        let start = Instant::now();

        async move {
            let result = self
                .client
                .get_secret_value()
                .secret_id(reference)
                .send()
                .await;

            span_clone.record("operation.duration_ms", start.elapsed().as_millis() as u64);

            match result {
                Ok(response) => {
                    let payload = match (response.secret_string(), response.secret_binary()) {
                        (Some(value), _) => Ok(value.to_string()),
                        (None, Some(blob)) => decode_secret_binary(reference, blob.as_ref()),
                        (None, None) => Err(ProviderError::Other(anyhow::anyhow!(
                            "Secret {reference} has no string or binary value"
                        ))),
                    };

                    let payload = match payload {
                        Ok(payload) => payload,
                        Err(e) => {
                            span_clone.record("operation.success", false);
                            return Err(e);
                        }
                    };

                    span_clone.record("operation.success", true);
                    let name = response.name().unwrap_or(reference).to_string();
                    debug!("Fetched AWS secret {}", name);
                    Ok(SecretValue { name, payload })
                }
                Err(e) => {
                    span_clone.record("operation.success", false);
                    let (code, message) = e
                        .as_service_error()
                        .map_or((None, None), |se| (se.code(), se.message()));
                    Err(classify_error(
                        reference,
                        code,
                        message,
                        format!("Failed to get AWS secret: {}", DisplayErrorContext(&e)),
                    ))
                }
            }
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_not_found() {
        let err = classify_error(
            "arn:aws:secretsmanager:us-east-1:123456789012:secret:db-AbCdEf",
            Some("ResourceNotFoundException"),
            Some("Secrets Manager can't find the specified secret."),
            "ignored".to_string(),
        );
        assert!(err.is_not_found());
    }

    #[test]
    fn test_classify_access_denied() {
        let err = classify_error("db", Some("AccessDeniedException"), Some("nope"), String::new());
        match err {
            ProviderError::AccessDenied { resource, message } => {
                assert_eq!(resource, "db");
                assert_eq!(message, "nope");
            }
            other => panic!("Expected AccessDenied, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_secret_binary() {
        assert_eq!(decode_secret_binary("db", b"s3cret").unwrap(), "s3cret");

        let err = decode_secret_binary("db", &[0x66, 0x6f, 0xff, 0xfe]).unwrap_err();
        assert!(!err.is_not_found());
        assert!(err.to_string().contains("not valid UTF-8"));
    }

    #[test]
    fn test_classify_other_keeps_context() {
        let err = classify_error(
            "db",
            Some("ThrottlingException"),
            None,
            "Failed to get AWS secret: rate exceeded".to_string(),
        );
        assert!(!err.is_not_found());
        assert_eq!(err.to_string(), "Failed to get AWS secret: rate exceeded");
    }
}
