//! Teardown command - removes every resource the workflow created.

use core::time::Duration;
use std::path::Path;

use anyhow::{Context, Result};
use sagemaker_client::ControlPlane;
use strum::IntoEnumIterator;
use tracing::{debug, info};

use super::Workflow;
use crate::state::WorkflowState;

/// Pause between consecutive teardown calls.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(60);

/// One teardown call, in the order they are issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumIter)]
pub enum TeardownStep {
    #[strum(to_string = "stop monitoring schedule")]
    StopSchedule,
    #[strum(to_string = "delete monitoring schedule")]
    DeleteSchedule,
    #[strum(to_string = "delete endpoint")]
    DeleteEndpoint,
    #[strum(to_string = "delete endpoint config")]
    DeleteEndpointConfig,
    #[strum(to_string = "delete model")]
    DeleteModel,
}

impl TeardownStep {
    fn target(self, state: &WorkflowState) -> Option<String> {
        match self {
            Self::StopSchedule | Self::DeleteSchedule => state.schedule_name.clone(),
            Self::DeleteEndpoint => state.endpoint_name.clone(),
            Self::DeleteEndpointConfig => state.endpoint_config_name.clone(),
            Self::DeleteModel => state.model_name.clone(),
        }
    }

    async fn issue(self, control_plane: &dyn ControlPlane, name: &str) -> Result<()> {
        match self {
            Self::StopSchedule => control_plane.stop_monitoring_schedule(name).await,
            Self::DeleteSchedule => control_plane.delete_monitoring_schedule(name).await,
            Self::DeleteEndpoint => control_plane.delete_endpoint(name).await,
            Self::DeleteEndpointConfig => control_plane.delete_endpoint_config(name).await,
            Self::DeleteModel => control_plane.delete_model(name).await,
        }
    }

    fn forget(self, state: &mut WorkflowState) {
        match self {
            Self::StopSchedule => {}
            Self::DeleteSchedule => state.schedule_name = None,
            Self::DeleteEndpoint => {
                state.endpoint_name = None;
                state.endpoint_in_service = false;
            }
            Self::DeleteEndpointConfig => state.endpoint_config_name = None,
            Self::DeleteModel => {
                state.model_name = None;
                state.model_arn = None;
            }
        }
    }
}

/// Issues the teardown calls in fixed order, pausing `settle` between them.
///
/// Steps whose resource was never created are skipped. Returns the steps
/// actually issued.
///
/// # Errors
///
/// Returns the first failing call's error; later steps are not attempted and
/// their names stay in `state`.
pub async fn teardown(
    control_plane: &dyn ControlPlane,
    state: &mut WorkflowState,
    settle: Duration,
) -> Result<Vec<TeardownStep>> {
    let mut issued = Vec::new();

    for step in TeardownStep::iter() {
        let Some(name) = step.target(state) else {
            debug!(%step, "Nothing to tear down");
            continue;
        };

        if !issued.is_empty() && !settle.is_zero() {
            debug!(%step, delay = ?settle, "Waiting before next teardown step");
            tokio::time::sleep(settle).await;
        }

        info!(%step, name = %name, "Tearing down");
        step.issue(control_plane, &name)
            .await
            .with_context(|| format!("Failed to {step} {name}"))?;

        step.forget(state);
        issued.push(step);
    }

    Ok(issued)
}

/// Runs the teardown command and removes the state file once everything is gone.
///
/// # Errors
///
/// Returns an error if any teardown call fails.
pub async fn run(
    workflow: &Workflow,
    state: &mut WorkflowState,
    state_file: &Path,
    settle: Duration,
) -> Result<Vec<TeardownStep>> {
    let issued = teardown(workflow.control_plane.as_ref(), state, settle).await?;

    *state = WorkflowState::default();
    WorkflowState::remove(state_file)?;

    info!(steps = issued.len(), "Teardown complete");
    Ok(issued)
}
