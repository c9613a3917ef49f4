//! Endpoint invocation through the SageMaker runtime.

use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_sagemakerruntime::Client;
use aws_sdk_sagemakerruntime::primitives::Blob;
use tracing::debug;

use crate::control_plane::InferenceRuntime;

/// Client for synchronous endpoint invocation.
pub struct SageMakerRuntimeClient {
    client: Client,
}

impl SageMakerRuntimeClient {
    /// Creates a client from a loaded SDK configuration.
    #[must_use]
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            client: Client::new(config),
        }
    }
}

#[async_trait]
impl InferenceRuntime for SageMakerRuntimeClient {
    async fn invoke_endpoint(
        &self,
        endpoint_name: &str,
        content_type: &str,
        payload: String,
    ) -> Result<String> {
        debug!(
            endpoint = endpoint_name,
            bytes = payload.len(),
            "Invoking endpoint"
        );

        let output = self
            .client
            .invoke_endpoint()
            .endpoint_name(endpoint_name)
            .content_type(content_type)
            .body(Blob::new(payload))
            .send()
            .await
            .with_context(|| format!("Failed to invoke endpoint {endpoint_name}"))?;

        let body = Option::<&Blob>::from(output.body())
            .map(|blob| blob.as_ref().to_vec())
            .unwrap_or_default();

        String::from_utf8(body).context("Endpoint response is not valid UTF-8")
    }
}
