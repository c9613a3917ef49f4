//! Stage command - uploads the sample datasets to object storage.

use std::path::Path;

use anyhow::{Context, Result};
use bytes::Bytes;
use config::Config;
use monitor_structs::CSV_CONTENT_TYPE;
use object_store::path::Path as ObjectStorePath;
use object_store::{Attribute, Attributes, ObjectStore, PutOptions, PutPayload};
use tracing::info;

use super::Workflow;
use crate::state::WorkflowState;

/// Which role a dataset plays in the workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum DatasetKind {
    /// Reference data the baseline job analyzes
    #[strum(to_string = "baseline")]
    Baseline,
    /// Anomalous data replayed to trigger violations
    #[strum(to_string = "drift")]
    Drift,
}

impl DatasetKind {
    /// Directory below the configured prefix the dataset is staged in.
    #[must_use]
    pub const fn folder(self) -> &'static str {
        match self {
            Self::Baseline => "baselining/data",
            Self::Drift => "drift",
        }
    }
}

/// Locations of the staged datasets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedDatasets {
    pub baseline_uri: String,
    pub drift_uri: String,
}

/// Uploads one CSV file and returns the `s3://` URI of its folder.
///
/// # Errors
///
/// Returns an error if the upload fails.
pub async fn upload_dataset(
    store: &dyn ObjectStore,
    config: &Config,
    kind: DatasetKind,
    file_name: &str,
    data: Bytes,
) -> Result<String> {
    let folder = config.key(kind.folder());
    let key = format!("{folder}/{file_name}");
    let object_path = ObjectStorePath::from(key.as_str());

    let mut attributes = Attributes::new();
    attributes.insert(Attribute::ContentType, CSV_CONTENT_TYPE.into());

    info!(
        dataset = %kind,
        key = %key,
        bytes = data.len(),
        "Uploading dataset"
    );

    store
        .put_opts(
            &object_path,
            PutPayload::from(data),
            PutOptions {
                attributes,
                ..PutOptions::default()
            },
        )
        .await
        .with_context(|| format!("Failed to upload {kind} dataset to {key}"))?;

    Ok(config.s3_uri(&folder))
}

/// Runs the stage command.
///
/// # Errors
///
/// Returns an error if a file cannot be read or uploaded.
pub async fn run(
    workflow: &Workflow,
    state: &mut WorkflowState,
    baseline: &Path,
    drift: &Path,
) -> Result<StagedDatasets> {
    let mut uris = Vec::with_capacity(2);

    for (kind, path) in [(DatasetKind::Baseline, baseline), (DatasetKind::Drift, drift)] {
        let data = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {kind} dataset {}", path.display()))?;

        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .with_context(|| format!("Invalid dataset file name: {}", path.display()))?;

        uris.push(
            upload_dataset(
                workflow.store.as_ref(),
                &workflow.config,
                kind,
                file_name,
                Bytes::from(data),
            )
            .await?,
        );
    }

    let staged = StagedDatasets {
        drift_uri: uris.pop().unwrap_or_default(),
        baseline_uri: uris.pop().unwrap_or_default(),
    };

    state.baseline_dataset_uri = Some(staged.baseline_uri.clone());

    info!(
        baseline = %staged.baseline_uri,
        drift = %staged.drift_uri,
        "Datasets staged"
    );

    Ok(staged)
}
