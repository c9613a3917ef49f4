//! Invoke command - replays a dataset against the live endpoint.
//!
//! Rows are sent one at a time, in order, with a fixed delay between
//! requests. Values are sent exactly as they appear in the dataset; the drift
//! samples are deliberately out of range and must reach the endpoint that way.

use core::num::NonZeroU32;
use core::time::Duration;
use std::path::Path;

use anyhow::{Context, Result};
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use monitor_structs::{CSV_CONTENT_TYPE, CsvLayout, Dataset};
use sagemaker_client::InferenceRuntime;
use tracing::{debug, info};

use super::Workflow;
use crate::state::WorkflowState;

/// Delay between consecutive inference requests, in milliseconds.
pub const DEFAULT_THROTTLE_MS: u64 = 500;

/// Delay between consecutive inference requests.
pub const DEFAULT_THROTTLE: Duration = Duration::from_millis(DEFAULT_THROTTLE_MS);

type RateLimiterType = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// One endpoint response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prediction {
    /// Position of the row in the dataset
    pub index: usize,
    /// Payload sent to the endpoint
    pub input: String,
    /// Decoded response body
    pub prediction: String,
}

fn throttle_limiter(throttle: Duration) -> Option<RateLimiterType> {
    Quota::with_period(throttle)
        .map(|quota| quota.allow_burst(NonZeroU32::MIN))
        .map(RateLimiter::direct)
}

/// Sends every non-empty row of `dataset` to `endpoint`.
///
/// Returns one prediction per non-empty row, in dataset order. Empty rows are
/// skipped without a request.
///
/// # Errors
///
/// Returns the first invocation error; the remaining rows are not sent.
pub async fn replay(
    runtime: &dyn InferenceRuntime,
    endpoint: &str,
    dataset: &Dataset,
    throttle: Duration,
) -> Result<Vec<Prediction>> {
    let limiter = throttle_limiter(throttle);
    let mut predictions = Vec::with_capacity(dataset.len());

    for (index, row) in dataset.rows().iter().enumerate() {
        if row.is_empty() {
            debug!(index, "Skipping empty row");
            continue;
        }

        if let Some(limiter) = &limiter {
            limiter.until_ready().await;
        }

        let input = row.to_payload();
        let response = runtime
            .invoke_endpoint(endpoint, CSV_CONTENT_TYPE, input.clone())
            .await
            .with_context(|| format!("Inference failed at row {index}"))?;

        let prediction = response.trim().to_owned();
        info!(index, input = %input, prediction = %prediction, "Prediction");

        predictions.push(Prediction {
            index,
            input,
            prediction,
        });
    }

    Ok(predictions)
}

/// Runs the invoke command against the endpoint in the workflow state.
///
/// # Errors
///
/// Returns an error if the endpoint is not live, the dataset cannot be read,
/// or an invocation fails.
pub async fn run(
    workflow: &Workflow,
    state: &WorkflowState,
    dataset_path: &Path,
    layout: CsvLayout,
    throttle: Duration,
) -> Result<Vec<Prediction>> {
    let endpoint = state.require_live_endpoint()?;

    let text = tokio::fs::read_to_string(dataset_path)
        .await
        .with_context(|| format!("Failed to read dataset {}", dataset_path.display()))?;
    let dataset = Dataset::from_csv(&text, layout);

    info!(
        endpoint,
        dataset = %dataset_path.display(),
        rows = dataset.len(),
        "Sending rows to endpoint"
    );

    let predictions = replay(workflow.runtime.as_ref(), endpoint, &dataset, throttle).await?;
    info!(
        endpoint,
        predictions = predictions.len(),
        "Finished sending rows"
    );

    Ok(predictions)
}
