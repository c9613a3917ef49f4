//! Names and locations created by earlier steps, persisted between commands.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Default location of the state file.
pub const DEFAULT_STATE_FILE: &str = "model-monitor-state.json";

/// Everything later steps need to reference resources created earlier.
///
/// Each `require_*` accessor fails when the step that produces the value has
/// not run, so nothing downstream can reference a name that does not exist.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowState {
    pub baseline_dataset_uri: Option<String>,

    pub model_name: Option<String>,
    pub model_arn: Option<String>,
    pub endpoint_config_name: Option<String>,
    pub endpoint_name: Option<String>,
    pub endpoint_in_service: bool,

    pub baseline_job_name: Option<String>,
    pub statistics_uri: Option<String>,
    pub constraints_uri: Option<String>,
    pub baseline_completed: bool,

    pub schedule_name: Option<String>,
}

/// Completed baseline artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BaselineArtifacts<'a> {
    pub job_name: &'a str,
    pub statistics_uri: &'a str,
    pub constraints_uri: &'a str,
}

impl WorkflowState {
    /// Loads the state file, or returns an empty state if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "No state file, starting fresh");
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read state file {}", path.display()))?;

        serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse state file {}", path.display()))
    }

    /// Writes the state file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(self)?;

        std::fs::write(path, text)
            .with_context(|| format!("Failed to write state file {}", path.display()))
    }

    /// Removes the state file if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be removed.
    pub fn remove(path: &Path) -> Result<()> {
        if path.exists() {
            std::fs::remove_file(path)
                .with_context(|| format!("Failed to remove state file {}", path.display()))?;
        }
        Ok(())
    }

    /// Returns the staged baseline dataset location.
    ///
    /// # Errors
    ///
    /// Returns an error if no baseline dataset has been staged.
    pub fn require_baseline_dataset(&self) -> Result<&str> {
        self.baseline_dataset_uri
            .as_deref()
            .context("No baseline dataset staged; run `stage` first")
    }

    /// Returns the endpoint name.
    ///
    /// # Errors
    ///
    /// Returns an error if no endpoint has been created.
    pub fn require_endpoint(&self) -> Result<&str> {
        self.endpoint_name
            .as_deref()
            .context("No endpoint created; run `deploy` first")
    }

    /// Returns the endpoint name once it has reached `InService`.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint does not exist or is not in service.
    pub fn require_live_endpoint(&self) -> Result<&str> {
        let endpoint = self.require_endpoint()?;
        if !self.endpoint_in_service {
            anyhow::bail!("Endpoint {endpoint} has not reached InService");
        }
        Ok(endpoint)
    }

    /// Returns the baseline job name.
    ///
    /// # Errors
    ///
    /// Returns an error if no baseline job has been submitted.
    pub fn require_baseline_job(&self) -> Result<&str> {
        self.baseline_job_name
            .as_deref()
            .context("No baseline job submitted; run `baseline` first")
    }

    /// Returns the artifacts of a completed baseline job.
    ///
    /// # Errors
    ///
    /// Returns an error if the baseline job has not been submitted or has not completed.
    pub fn require_baseline(&self) -> Result<BaselineArtifacts<'_>> {
        let job_name = self.require_baseline_job()?;
        if !self.baseline_completed {
            anyhow::bail!("Baseline job {job_name} has not completed");
        }

        Ok(BaselineArtifacts {
            job_name,
            statistics_uri: self
                .statistics_uri
                .as_deref()
                .context("Baseline statistics location missing")?,
            constraints_uri: self
                .constraints_uri
                .as_deref()
                .context("Baseline constraints location missing")?,
        })
    }

    /// Returns the monitoring schedule name.
    ///
    /// # Errors
    ///
    /// Returns an error if no schedule has been created.
    pub fn require_schedule(&self) -> Result<&str> {
        self.schedule_name
            .as_deref()
            .context("No monitoring schedule created; run `schedule` first")
    }
}

/// Resolves the state file path, defaulting to [`DEFAULT_STATE_FILE`].
#[must_use]
pub fn state_path(path: Option<PathBuf>) -> PathBuf {
    path.unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_FILE))
}
