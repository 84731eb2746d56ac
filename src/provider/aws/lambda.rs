//! # AWS Lambda Layers
//!
//! [`LayerPublisher`] backed by the Lambda layer version APIs.

use super::classify_error;
use crate::provider::{LayerPublisher, ProviderError, PublishLayerRequest, PublishedLayerVersion};
use anyhow::Context;
use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_lambda::error::{DisplayErrorContext, ProvideErrorMetadata};
use aws_sdk_lambda::operation::publish_layer_version::PublishLayerVersionOutput;
use aws_sdk_lambda::primitives::Blob;
use aws_sdk_lambda::types::{LayerVersionContentInput, Runtime};
use aws_sdk_lambda::Client as LambdaClient;
use std::time::Instant;
use tracing::{debug, field, info, info_span, Instrument};

/// AWS Lambda layer provider implementation
pub struct AwsLambdaLayers {
    client: LambdaClient,
}

impl std::fmt::Debug for AwsLambdaLayers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsLambdaLayers").finish_non_exhaustive()
    }
}

impl AwsLambdaLayers {
    /// Create a new Lambda client from a loaded SDK config
    #[must_use]
    pub fn new(sdk_config: &SdkConfig) -> Self {
        Self {
            client: LambdaClient::new(sdk_config),
        }
    }
}

fn published_version(
    output: &PublishLayerVersionOutput,
) -> Result<PublishedLayerVersion, ProviderError> {
    let layer_arn = output
        .layer_arn()
        .context("PublishLayerVersion response has no LayerArn")?
        .to_string();
    let layer_version_arn = output
        .layer_version_arn()
        .context("PublishLayerVersion response has no LayerVersionArn")?
        .to_string();
    let version = u64::try_from(output.version())
        .context("PublishLayerVersion returned a negative version")?;

    Ok(PublishedLayerVersion {
        layer_arn,
        layer_version_arn,
        version,
    })
}

#[async_trait]
impl LayerPublisher for AwsLambdaLayers {
    async fn publish(
        &self,
        request: PublishLayerRequest,
    ) -> Result<PublishedLayerVersion, ProviderError> {
        let span = info_span!(
            "aws.layer.publish",
            layer.name = %request.layer_name,
            layer.size_bytes = request.content.len(),
            layer.version = field::Empty,
            operation.success = field::Empty,
            operation.duration_ms = field::Empty,
        );
        let span_clone = span.clone();
        let start = Instant::now();

        async move {
            let layer_name = request.layer_name.clone();
            let content = LayerVersionContentInput::builder()
                .zip_file(Blob::new(request.content))
                .build();

            let runtimes = (!request.compatible_runtimes.is_empty()).then(|| {
                request
                    .compatible_runtimes
                    .iter()
                    .map(|r| Runtime::from(r.as_str()))
                    .collect::<Vec<_>>()
            });

            let output = self
                .client
                .publish_layer_version()
                .layer_name(&layer_name)
                .content(content)
                .set_compatible_runtimes(runtimes)
                .set_description(request.description)
                .set_license_info(request.license_info)
                .send()
                .await;

            span_clone.record("operation.duration_ms", start.elapsed().as_millis() as u64);

            let output = output.map_err(|e| {
                span_clone.record("operation.success", false);
                let (code, message) = e
                    .as_service_error()
                    .map_or((None, None), |se| (se.code(), se.message()));
                classify_error(
                    &layer_name,
                    code,
                    message,
                    format!("Failed to publish layer version: {}", DisplayErrorContext(&e)),
                )
            })?;

            let published = published_version(&output);
            span_clone.record("operation.success", published.is_ok());
            if let Ok(published) = &published {
                span_clone.record("layer.version", published.version);
                info!("Published layer version {}", published.layer_version_arn);
            }
            published
        }
        .instrument(span)
        .await
    }

    async fn list_versions(&self, layer_name: &str) -> Result<Vec<u64>, ProviderError> {
        let span = tracing::debug_span!("aws.layer.list_versions", layer.name = layer_name);

        async move {
            let mut versions = Vec::new();
            let mut marker: Option<String> = None;

            loop {
                let output = match self
                    .client
                    .list_layer_versions()
                    .layer_name(layer_name)
                    .set_marker(marker.take())
                    .send()
                    .await
                {
                    Ok(output) => output,
                    Err(e) => {
                        let (code, message) = e
                            .as_service_error()
                            .map_or((None, None), |se| (se.code(), se.message()));
                        let err = classify_error(
                            layer_name,
                            code,
                            message,
                            format!("Failed to list layer versions: {}", DisplayErrorContext(&e)),
                        );
                        // A layer with no versions left is reported as missing
                        if err.is_not_found() {
                            debug!("Layer {} not found, no versions to list", layer_name);
                            return Ok(versions);
                        }
                        return Err(err);
                    }
                };

                versions.extend(
                    output
                        .layer_versions()
                        .iter()
                        .filter_map(|item| u64::try_from(item.version()).ok()),
                );

                match output.next_marker() {
                    Some(next) if !next.is_empty() => marker = Some(next.to_string()),
                    _ => break,
                }
            }

            debug!("Found {} versions of layer {}", versions.len(), layer_name);
            Ok(versions)
        }
        .instrument(span)
        .await
    }

    async fn delete_version(&self, layer_name: &str, version: u64) -> Result<(), ProviderError> {
        let version_number =
            i64::try_from(version).context("Layer version number out of range")?;

        self.client
            .delete_layer_version()
            .layer_name(layer_name)
            .version_number(version_number)
            .send()
            .await
            .map_err(|e| {
                let (code, message) = e
                    .as_service_error()
                    .map_or((None, None), |se| (se.code(), se.message()));
                classify_error(
                    &format!("{layer_name}:{version}"),
                    code,
                    message,
                    format!("Failed to delete layer version: {}", DisplayErrorContext(&e)),
                )
            })?;

        info!("Deleted layer version {}:{}", layer_name, version);
        Ok(())
    }
}
