//! Configuration for the model monitor workflow, loaded from the environment.

use std::sync::Arc;

use anyhow::{Context, Result};
use object_store::ObjectStore;
use object_store::aws::AmazonS3Builder;

/// Region used when `AWS_REGION` is not set.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Key prefix used when `MONITOR_PREFIX` is not set.
pub const DEFAULT_PREFIX: &str = "DEMO-ModelMonitor";

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// AWS region for the control plane, runtime and bucket
    pub region: String,

    /// IAM role assumed by the model, the baseline job and the monitoring schedule
    pub role_arn: String,

    /// Marketplace model package the endpoint serves
    pub model_package_arn: Option<String>,

    /// Bucket holding datasets, captured traffic and reports
    pub bucket: String,

    /// Key prefix inside the bucket
    pub prefix: String,

    /// Explicit analyzer image, bypassing the per-region lookup
    pub monitor_image_uri: Option<String>,

    /// Instance type hosting the endpoint
    pub endpoint_instance_type: String,

    /// Number of endpoint instances
    pub endpoint_instance_count: i32,

    /// Percentage of requests recorded by data capture
    pub capture_sampling_percent: i32,

    /// Base name for the model, endpoint config and endpoint
    pub model_base_name: String,
}

impl Config {
    /// Loads configuration from environment variables, reading `.env` first.
    ///
    /// Required environment variables:
    /// - `SAGEMAKER_ROLE_ARN`: execution role for every created resource
    /// - `MONITOR_BUCKET`: bucket for datasets, captures and reports
    ///
    /// Optional environment variables:
    /// - `MODEL_PACKAGE_ARN`: required by the deploy step only
    /// - `AWS_REGION` (default `us-east-1`)
    /// - `MONITOR_PREFIX` (default `DEMO-ModelMonitor`)
    /// - `MONITOR_IMAGE_URI`
    /// - `ENDPOINT_INSTANCE_TYPE` (default `ml.m5.xlarge`)
    /// - `ENDPOINT_INSTANCE_COUNT` (default `1`)
    /// - `CAPTURE_SAMPLING_PERCENT` (default `100`)
    /// - `MODEL_BASE_NAME` (default `model-monitor-demo`)
    ///
    /// # Errors
    ///
    /// Returns an error if required environment variables are missing or malformed.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if required variables are missing or malformed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |key: &str| {
            lookup(key)
                .filter(|value| !value.is_empty())
                .with_context(|| format!("{key} environment variable not set"))
        };

        let optional = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let role_arn = required("SAGEMAKER_ROLE_ARN")?;
        let bucket = required("MONITOR_BUCKET")?;

        let endpoint_instance_count = lookup("ENDPOINT_INSTANCE_COUNT")
            .map(|value| value.parse::<i32>())
            .transpose()
            .context("ENDPOINT_INSTANCE_COUNT must be an integer")?
            .unwrap_or(1);

        let capture_sampling_percent = lookup("CAPTURE_SAMPLING_PERCENT")
            .map(|value| value.parse::<i32>())
            .transpose()
            .context("CAPTURE_SAMPLING_PERCENT must be an integer")?
            .unwrap_or(100);

        if !(0..=100).contains(&capture_sampling_percent) {
            anyhow::bail!(
                "CAPTURE_SAMPLING_PERCENT must be between 0 and 100, got {capture_sampling_percent}"
            );
        }

        Ok(Self {
            region: optional("AWS_REGION").unwrap_or_else(|| DEFAULT_REGION.to_owned()),
            role_arn,
            model_package_arn: optional("MODEL_PACKAGE_ARN"),
            bucket,
            prefix: lookup("MONITOR_PREFIX")
                .map(|value| value.trim_matches('/').to_owned())
                .unwrap_or_else(|| DEFAULT_PREFIX.to_owned()),
            monitor_image_uri: optional("MONITOR_IMAGE_URI"),
            endpoint_instance_type: optional("ENDPOINT_INSTANCE_TYPE")
                .unwrap_or_else(|| String::from("ml.m5.xlarge")),
            endpoint_instance_count,
            capture_sampling_percent,
            model_base_name: optional("MODEL_BASE_NAME")
                .unwrap_or_else(|| String::from("model-monitor-demo")),
        })
    }

    /// Returns the model package ARN, which only the deploy step needs.
    ///
    /// # Errors
    ///
    /// Returns an error if `MODEL_PACKAGE_ARN` is not set.
    pub fn require_model_package_arn(&self) -> Result<&str> {
        self.model_package_arn
            .as_deref()
            .context("MODEL_PACKAGE_ARN environment variable not set")
    }

    /// Returns the object key for a path below the configured prefix.
    #[must_use]
    pub fn key(&self, suffix: &str) -> String {
        let suffix = suffix.trim_matches('/');
        if self.prefix.is_empty() {
            suffix.to_owned()
        } else {
            format!("{}/{suffix}", self.prefix)
        }
    }

    /// Returns the `s3://` URI for an object key in the configured bucket.
    #[must_use]
    pub fn s3_uri(&self, key: &str) -> String {
        format!("s3://{}/{}", self.bucket, key.trim_start_matches('/'))
    }

    /// Location the baseline job writes `statistics.json` and `constraints.json` to.
    #[must_use]
    pub fn baseline_results_uri(&self) -> String {
        self.s3_uri(&self.key("baselining/results"))
    }

    /// Location endpoint data capture writes to.
    #[must_use]
    pub fn capture_uri(&self) -> String {
        self.s3_uri(&self.key("datacapture"))
    }

    /// Location monitoring executions write their reports to.
    #[must_use]
    pub fn reports_uri(&self) -> String {
        self.s3_uri(&self.key("reports"))
    }

    /// Converts an `s3://` URI in the configured bucket back to an object key.
    ///
    /// # Errors
    ///
    /// Returns an error if the URI is not an `s3://` URI or points at a different bucket.
    pub fn key_from_uri(&self, uri: &str) -> Result<String> {
        let rest = uri
            .strip_prefix("s3://")
            .with_context(|| format!("Not an s3:// URI: {uri}"))?;

        let (bucket, key) = rest.split_once('/').unwrap_or((rest, ""));

        if bucket != self.bucket {
            anyhow::bail!("URI {uri} is outside the configured bucket {}", self.bucket);
        }

        Ok(key.trim_matches('/').to_owned())
    }

    /// Builds the S3 object store for the configured bucket and region.
    ///
    /// Credentials are taken from the standard `AWS_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be configured.
    pub fn object_store(&self) -> Result<Arc<dyn ObjectStore>> {
        let store = AmazonS3Builder::from_env()
            .with_bucket_name(&self.bucket)
            .with_region(&self.region)
            .build()
            .with_context(|| format!("Failed to create object store for bucket {}", self.bucket))?;

        Ok(Arc::new(store))
    }
}
