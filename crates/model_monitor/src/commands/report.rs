//! Report command - reads what the analyzer wrote to object storage.

use anyhow::{Context, Result};
use futures::TryStreamExt;
use monitor_structs::{
    BaselineConstraints, BaselineStatistics, ConstraintViolation, ConstraintViolations,
    Lifecycle as _, MonitoringExecution, VIOLATIONS_FILE, name_from_arn,
};
use object_store::path::Path as ObjectStorePath;
use object_store::{ObjectStore, ObjectStoreExt};
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use super::Workflow;
use crate::state::WorkflowState;

/// How many recent executions to look through for one with a report.
const EXECUTION_LOOKBACK: i32 = 10;

/// Which report to print.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum ReportKind {
    /// Statistics and constraints suggested by the baseline job
    Baseline,
    /// Violations found by the latest monitoring execution
    Violations,
    /// Object keys of the captured endpoint traffic
    Captures,
}

/// Baseline job output.
#[derive(Debug, Clone)]
pub struct BaselineReport {
    pub statistics: BaselineStatistics,
    pub constraints: BaselineConstraints,
}

/// Violations from one monitoring execution.
#[derive(Debug, Clone)]
pub struct ViolationsReport {
    pub execution: MonitoringExecution,
    pub job_name: String,
    pub violations: Vec<ConstraintViolation>,
}

/// Reads and parses a JSON document, returning `None` if it does not exist.
async fn read_json<T: DeserializeOwned>(store: &dyn ObjectStore, key: &str) -> Result<Option<T>> {
    let path = ObjectStorePath::from(key);

    let bytes = match store.get(&path).await {
        Ok(result) => result
            .bytes()
            .await
            .with_context(|| format!("Failed to read {key}"))?,
        Err(object_store::Error::NotFound { .. }) => return Ok(None),
        Err(error) => return Err(error).with_context(|| format!("Failed to get {key}")),
    };

    let document =
        serde_json::from_slice(&bytes).with_context(|| format!("Failed to parse {key}"))?;
    Ok(Some(document))
}

/// Reads the statistics and constraints of the completed baseline job.
///
/// # Errors
///
/// Returns an error if the baseline has not completed or either document is
/// missing or malformed.
pub async fn baseline_report(workflow: &Workflow, state: &WorkflowState) -> Result<BaselineReport> {
    let baseline = state.require_baseline()?;
    let store = workflow.store.as_ref();

    let statistics_key = workflow.config.key_from_uri(baseline.statistics_uri)?;
    let statistics = read_json(store, &statistics_key)
        .await?
        .with_context(|| format!("Baseline statistics not found at {}", baseline.statistics_uri))?;

    let constraints_key = workflow.config.key_from_uri(baseline.constraints_uri)?;
    let constraints = read_json(store, &constraints_key)
        .await?
        .with_context(|| {
            format!("Baseline constraints not found at {}", baseline.constraints_uri)
        })?;

    Ok(BaselineReport {
        statistics,
        constraints,
    })
}

/// Finds the most recent monitoring execution with a processing job and reads its violations.
///
/// Returns `None` if the schedule has not run yet.
///
/// # Errors
///
/// Returns an error if no schedule exists, a control-plane call fails, or the
/// violations document is malformed.
pub async fn latest_violations(
    workflow: &Workflow,
    state: &WorkflowState,
) -> Result<Option<ViolationsReport>> {
    let schedule = state.require_schedule()?;
    let control_plane = workflow.control_plane.as_ref();

    let executions = control_plane
        .list_monitoring_executions(schedule, EXECUTION_LOOKBACK)
        .await?;
    debug!(schedule, executions = executions.len(), "Listed monitoring executions");

    let Some((execution, job_arn)) = executions.into_iter().find_map(|execution| {
        let arn = execution.processing_job_arn.clone()?;
        Some((execution, arn))
    }) else {
        return Ok(None);
    };

    let job_name = name_from_arn(&job_arn).to_owned();
    let job = control_plane.describe_processing_job(&job_name).await?;
    let output_uri = job
        .output_uri
        .with_context(|| format!("Monitoring job {job_name} has no output location"))?;

    let key = format!(
        "{}/{VIOLATIONS_FILE}",
        workflow.config.key_from_uri(&output_uri)?
    );
    let violations = read_json::<ConstraintViolations>(workflow.store.as_ref(), &key)
        .await?
        .unwrap_or_default()
        .violations;

    Ok(Some(ViolationsReport {
        execution,
        job_name,
        violations,
    }))
}

/// Lists the object keys written by endpoint data capture.
///
/// # Errors
///
/// Returns an error if listing fails.
pub async fn captured_objects(workflow: &Workflow) -> Result<Vec<String>> {
    let prefix = ObjectStorePath::from(workflow.config.key("datacapture"));

    let objects: Vec<_> = workflow
        .store
        .list(Some(&prefix))
        .try_collect()
        .await
        .with_context(|| format!("Failed to list {prefix}"))?;

    let mut keys: Vec<String> = objects
        .into_iter()
        .map(|meta| meta.location.to_string())
        .collect();
    keys.sort();

    Ok(keys)
}

/// Runs the report command.
///
/// # Errors
///
/// Returns an error if the report's prerequisites are missing or it cannot be read.
pub async fn run(workflow: &Workflow, state: &WorkflowState, kind: ReportKind) -> Result<()> {
    match kind {
        ReportKind::Baseline => {
            let report = baseline_report(workflow, state).await?;
            info!(
                rows = report.statistics.dataset.item_count,
                features = report.statistics.features.len(),
                "Baseline statistics"
            );

            for feature in &report.statistics.features {
                let numeric = feature.numerical_statistics.clone().unwrap_or_default();
                info!(
                    feature = %feature.name,
                    inferred_type = %feature.inferred_type,
                    present = numeric.common.num_present,
                    missing = numeric.common.num_missing,
                    mean = ?numeric.mean,
                    std_dev = ?numeric.std_dev,
                    min = ?numeric.min,
                    max = ?numeric.max,
                    "Feature statistics"
                );
            }

            for constraint in &report.constraints.features {
                info!(
                    feature = %constraint.name,
                    inferred_type = %constraint.inferred_type,
                    completeness = ?constraint.completeness,
                    non_negative = constraint
                        .num_constraints
                        .as_ref()
                        .is_some_and(|numeric| numeric.is_non_negative),
                    "Feature constraint"
                );
            }
        }
        ReportKind::Violations => match latest_violations(workflow, state).await? {
            None => info!(
                "No monitoring execution has run yet; the schedule fires at the top of each hour"
            ),
            Some(report) => {
                info!(
                    job = %report.job_name,
                    status = report.execution.status.as_api_string(),
                    scheduled = ?report.execution.scheduled_time,
                    violations = report.violations.len(),
                    "Latest monitoring execution"
                );
                if report.execution.status.is_in_progress() {
                    info!(
                        job = %report.job_name,
                        "Execution still running, violations may be incomplete"
                    );
                }
                if let Some(reason) = &report.execution.failure_reason {
                    warn!(job = %report.job_name, "Execution failed: {reason}");
                }
                for violation in &report.violations {
                    info!(
                        feature = %violation.feature_name,
                        check = %violation.constraint_check_type,
                        "{}",
                        violation.description
                    );
                }
            }
        },
        ReportKind::Captures => {
            let keys = captured_objects(workflow).await?;
            info!(files = keys.len(), "Captured traffic");
            for key in &keys {
                info!(key = %key, "Capture file");
            }
        }
    }

    Ok(())
}
