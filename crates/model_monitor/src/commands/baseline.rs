//! Baseline command - suggests statistics and constraints from the baseline dataset.

use anyhow::Result;
use chrono::Utc;
use config::Config;
use monitor_structs::{
    BaselineJobSpec, ComputeShape, DatasetFormat, ProcessingJobStatus, name_from_base,
};
use sagemaker_client::analyzer_image_uri;
use tracing::info;

use super::Workflow;
use crate::poller::wait_until_settled;
use crate::state::WorkflowState;

/// Disk attached to each analyzer instance.
pub const ANALYZER_VOLUME_GB: i32 = 20;

/// Longest an analyzer run may take.
pub const ANALYZER_MAX_RUNTIME_SECONDS: i32 = 3600;

/// Builds the baseline job request for a dataset location.
///
/// # Errors
///
/// Returns an error if no analyzer image is known for the configured region.
pub fn baseline_spec(
    config: &Config,
    job_name: String,
    dataset_uri: &str,
) -> Result<BaselineJobSpec> {
    Ok(BaselineJobSpec {
        job_name,
        dataset_uri: dataset_uri.to_owned(),
        output_uri: config.baseline_results_uri(),
        dataset_format: DatasetFormat { header: true },
        image_uri: analyzer_image_uri(&config.region, config.monitor_image_uri.as_deref())?,
        role_arn: config.role_arn.clone(),
        compute: ComputeShape::default(),
        volume_size_gb: ANALYZER_VOLUME_GB,
        max_runtime_seconds: ANALYZER_MAX_RUNTIME_SECONDS,
    })
}

/// Checks a submitted baseline job once and marks it complete if it is.
///
/// # Errors
///
/// Returns an error if the job has not completed successfully.
pub async fn confirm_completed(workflow: &Workflow, state: &mut WorkflowState) -> Result<()> {
    if state.baseline_completed {
        return Ok(());
    }

    let job_name = state.require_baseline_job()?.to_owned();
    let description = workflow.control_plane.describe_processing_job(&job_name).await?;

    match description.status {
        ProcessingJobStatus::Completed => {
            state.baseline_completed = true;
            Ok(())
        }
        status => anyhow::bail!(
            "Baseline job {job_name} is {}{}",
            status.as_api_string(),
            description
                .failure_reason
                .map(|reason| format!(": {reason}"))
                .unwrap_or_default()
        ),
    }
}

/// Runs the baseline command.
///
/// Submits the job and, when `wait` is set, blocks until it finishes.
///
/// # Errors
///
/// Returns an error if no baseline dataset is staged, the submission fails,
/// or the job ends in any status other than `Completed`.
pub async fn run(workflow: &Workflow, state: &mut WorkflowState, wait: bool) -> Result<()> {
    let dataset_uri = state.require_baseline_dataset()?.to_owned();
    let job_name = name_from_base(
        &format!("{}-baseline", workflow.config.model_base_name),
        Utc::now(),
    );

    let spec = baseline_spec(&workflow.config, job_name, &dataset_uri)?;
    workflow.control_plane.create_baseline_job(&spec).await?;

    state.baseline_job_name = Some(spec.job_name.clone());
    state.statistics_uri = Some(spec.statistics_uri());
    state.constraints_uri = Some(spec.constraints_uri());
    state.baseline_completed = false;

    if !wait {
        info!(job = %spec.job_name, "Baseline job submitted");
        return Ok(());
    }

    let control_plane = workflow.control_plane.as_ref();
    let job_name = spec.job_name.as_str();
    let description = wait_until_settled(
        &format!("baseline job {job_name}"),
        &workflow.job_poll,
        &workflow.cancel,
        || control_plane.describe_processing_job(job_name),
    )
    .await?;

    if description.status != ProcessingJobStatus::Completed {
        anyhow::bail!(
            "Baseline job {job_name} ended as {}: {}",
            description.status.as_api_string(),
            description.failure_reason.as_deref().unwrap_or("no reason given")
        );
    }

    state.baseline_completed = true;
    info!(
        job = job_name,
        statistics = %spec.statistics_uri(),
        constraints = %spec.constraints_uri(),
        "Baseline complete"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::testing::{FakeControlPlane, FakeRuntime, test_workflow};

    fn staged_state() -> WorkflowState {
        WorkflowState {
            baseline_dataset_uri: Some(String::from(
                "s3://demo-bucket/DEMO-ModelMonitor/baselining/data",
            )),
            ..WorkflowState::default()
        }
    }

    #[tokio::test]
    async fn test_requires_staged_dataset() {
        let control_plane = Arc::new(FakeControlPlane::default());
        let workflow = test_workflow(Arc::clone(&control_plane), Arc::new(FakeRuntime::default()));
        let mut state = WorkflowState::default();

        assert!(run(&workflow, &mut state, true).await.is_err());
        assert!(control_plane.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_for_completion() {
        let control_plane = Arc::new(FakeControlPlane::default().with_job_statuses(&[
            ProcessingJobStatus::InProgress,
            ProcessingJobStatus::Completed,
        ]));
        let workflow = test_workflow(Arc::clone(&control_plane), Arc::new(FakeRuntime::default()));
        let mut state = staged_state();

        run(&workflow, &mut state, true).await.unwrap();

        let artifacts = state.require_baseline().unwrap();
        assert_eq!(
            artifacts.statistics_uri,
            "s3://demo-bucket/DEMO-ModelMonitor/baselining/results/statistics.json"
        );
        assert_eq!(
            artifacts.constraints_uri,
            "s3://demo-bucket/DEMO-ModelMonitor/baselining/results/constraints.json"
        );

        let specs = control_plane.baseline_specs.lock().unwrap();
        assert_eq!(
            specs[0].image_uri,
            "156813124566.dkr.ecr.us-east-1.amazonaws.com/sagemaker-model-monitor-analyzer:latest"
        );
        assert_eq!(specs[0].volume_size_gb, ANALYZER_VOLUME_GB);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_job_is_an_error() {
        let control_plane = Arc::new(
            FakeControlPlane::default().with_job_statuses(&[ProcessingJobStatus::Failed]),
        );
        let workflow = test_workflow(Arc::clone(&control_plane), Arc::new(FakeRuntime::default()));
        let mut state = staged_state();

        let error = run(&workflow, &mut state, true).await.unwrap_err();

        assert!(error.to_string().contains("analyzer crashed"));
        assert!(state.require_baseline().is_err());
        assert!(state.require_baseline_job().is_ok());
    }

    #[tokio::test]
    async fn test_confirm_completed_after_submitting_without_wait() {
        let control_plane = Arc::new(FakeControlPlane::default());
        let workflow = test_workflow(Arc::clone(&control_plane), Arc::new(FakeRuntime::default()));
        let mut state = staged_state();

        run(&workflow, &mut state, false).await.unwrap();
        assert!(!state.baseline_completed);

        confirm_completed(&workflow, &mut state).await.unwrap();
        assert!(state.require_baseline().is_ok());
    }
}
