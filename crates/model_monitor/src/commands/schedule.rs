//! Schedule command - registers the hourly monitoring schedule.

use anyhow::Result;
use chrono::Utc;
use config::Config;
use monitor_structs::{
    ComputeShape, CronExpression, MonitoringScheduleSpec, ScheduleStatus, name_from_base,
};
use sagemaker_client::analyzer_image_uri;
use tracing::info;

use super::Workflow;
use super::baseline::{ANALYZER_MAX_RUNTIME_SECONDS, ANALYZER_VOLUME_GB, confirm_completed};
use crate::poller::wait_until_settled;
use crate::state::{BaselineArtifacts, WorkflowState};

/// Builds the schedule request binding `endpoint` to the baseline artifacts.
///
/// # Errors
///
/// Returns an error if no analyzer image is known for the configured region.
pub fn schedule_spec(
    config: &Config,
    schedule_name: String,
    endpoint: &str,
    baseline: &BaselineArtifacts<'_>,
    cron: CronExpression,
) -> Result<MonitoringScheduleSpec> {
    Ok(MonitoringScheduleSpec {
        schedule_name,
        endpoint_name: endpoint.to_owned(),
        cron,
        statistics_uri: baseline.statistics_uri.to_owned(),
        constraints_uri: baseline.constraints_uri.to_owned(),
        output_uri: config.reports_uri(),
        image_uri: analyzer_image_uri(&config.region, config.monitor_image_uri.as_deref())?,
        role_arn: config.role_arn.clone(),
        compute: ComputeShape::default(),
        volume_size_gb: ANALYZER_VOLUME_GB,
        max_runtime_seconds: ANALYZER_MAX_RUNTIME_SECONDS,
        publish_cloudwatch_metrics: true,
    })
}

/// Runs the schedule command.
///
/// # Errors
///
/// Returns an error if the endpoint or a completed baseline is missing, a
/// schedule already exists, registration fails, or (with `wait`) the
/// schedule settles in any status other than `Scheduled`.
pub async fn run(workflow: &Workflow, state: &mut WorkflowState, wait: bool) -> Result<String> {
    if let Some(existing) = &state.schedule_name {
        anyhow::bail!("Monitoring schedule {existing} already exists");
    }

    confirm_completed(workflow, state).await?;

    let endpoint = state.require_endpoint()?;
    let baseline = state.require_baseline()?;
    let schedule_name = name_from_base(
        &format!("{}-schedule", workflow.config.model_base_name),
        Utc::now(),
    );

    let spec = schedule_spec(
        &workflow.config,
        schedule_name,
        endpoint,
        &baseline,
        CronExpression::hourly(),
    )?;
    workflow.control_plane.create_monitoring_schedule(&spec).await?;
    state.schedule_name = Some(spec.schedule_name.clone());

    if wait {
        let control_plane = workflow.control_plane.as_ref();
        let schedule = spec.schedule_name.as_str();
        let description = wait_until_settled(
            &format!("monitoring schedule {schedule}"),
            &workflow.job_poll,
            &workflow.cancel,
            || control_plane.describe_monitoring_schedule(schedule),
        )
        .await?;

        if description.status != ScheduleStatus::Scheduled {
            anyhow::bail!(
                "Monitoring schedule {schedule} settled as {}: {}",
                description.status.as_api_string(),
                description.failure_reason.as_deref().unwrap_or("no reason given")
            );
        }
    }

    info!(
        schedule = %spec.schedule_name,
        endpoint = %spec.endpoint_name,
        cron = %spec.cron,
        "Monitoring schedule registered"
    );

    Ok(spec.schedule_name)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use monitor_structs::ProcessingJobStatus;

    use super::*;
    use crate::testing::{FakeControlPlane, FakeRuntime, test_workflow};

    fn ready_state() -> WorkflowState {
        WorkflowState {
            endpoint_name: Some(String::from("demo-endpoint")),
            endpoint_in_service: true,
            baseline_job_name: Some(String::from("demo-baseline")),
            statistics_uri: Some(String::from("s3://demo-bucket/results/statistics.json")),
            constraints_uri: Some(String::from("s3://demo-bucket/results/constraints.json")),
            baseline_completed: true,
            ..WorkflowState::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_registers_hourly_schedule() {
        let control_plane = Arc::new(FakeControlPlane::default().with_schedule_statuses(&[
            ScheduleStatus::Pending,
            ScheduleStatus::Scheduled,
        ]));
        let workflow = test_workflow(Arc::clone(&control_plane), Arc::new(FakeRuntime::default()));
        let mut state = ready_state();

        let name = run(&workflow, &mut state, true).await.unwrap();

        assert_eq!(state.require_schedule().unwrap(), name);
        let specs = control_plane.schedule_specs.lock().unwrap();
        assert_eq!(specs[0].cron, CronExpression::hourly());
        assert_eq!(specs[0].endpoint_name, "demo-endpoint");
        assert_eq!(specs[0].statistics_uri, "s3://demo-bucket/results/statistics.json");
        assert_eq!(specs[0].output_uri, "s3://demo-bucket/DEMO-ModelMonitor/reports");
    }

    #[tokio::test]
    async fn test_requires_endpoint_before_schedule() {
        let control_plane = Arc::new(FakeControlPlane::default());
        let workflow = test_workflow(Arc::clone(&control_plane), Arc::new(FakeRuntime::default()));
        let mut state = WorkflowState {
            endpoint_name: None,
            ..ready_state()
        };

        assert!(run(&workflow, &mut state, false).await.is_err());
        assert!(control_plane.mutations().is_empty());
    }

    #[tokio::test]
    async fn test_requires_completed_baseline() {
        let control_plane = Arc::new(
            FakeControlPlane::default().with_job_statuses(&[ProcessingJobStatus::InProgress]),
        );
        let workflow = test_workflow(Arc::clone(&control_plane), Arc::new(FakeRuntime::default()));
        let mut state = WorkflowState {
            baseline_completed: false,
            ..ready_state()
        };

        let error = run(&workflow, &mut state, false).await.unwrap_err();

        assert!(error.to_string().contains("InProgress"));
        assert!(control_plane.mutations().is_empty());
    }
}
