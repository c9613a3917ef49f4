//! Deploy command - creates the model, endpoint config and endpoint.
//!
//! Creation is strictly sequential: model, then endpoint config, then
//! endpoint. Each name is recorded in the workflow state as soon as its
//! resource exists, so a failure part-way leaves a state file that
//! `teardown` can clean up from. With `rollback_on_failure` the resources
//! already created are deleted immediately instead.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use monitor_structs::{
    ComputeShape, DataCapturePolicy, EndpointConfigSpec, EndpointStatus, ModelSpec,
    name_from_base,
};
use sagemaker_client::ControlPlane;
use tracing::{error, info, warn};

use super::Workflow;
use crate::poller::wait_until_settled;
use crate::state::WorkflowState;

/// Name of the single production variant.
pub const VARIANT_NAME: &str = "AllTraffic";

/// Everything needed to provision the hosted model.
#[derive(Debug, Clone)]
pub struct ProvisionRequest {
    pub base_name: String,
    pub model_package_arn: String,
    pub role_arn: String,
    pub compute: ComputeShape,
    pub data_capture: Option<DataCapturePolicy>,
    pub now: DateTime<Utc>,
}

/// Identifiers of the provisioned resources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionedResources {
    pub model_name: String,
    pub model_arn: String,
    pub endpoint_config_name: String,
    pub endpoint_config_arn: String,
    pub endpoint_name: String,
    pub endpoint_arn: String,
}

/// Issues the create calls in order and records each name in `state`.
///
/// # Errors
///
/// Returns the first failing create call's error. Resources created before
/// the failure are left in place unless `rollback_on_failure` is set.
pub async fn provision(
    control_plane: &dyn ControlPlane,
    request: &ProvisionRequest,
    state: &mut WorkflowState,
    rollback_on_failure: bool,
) -> Result<ProvisionedResources> {
    let name = name_from_base(&request.base_name, request.now);

    match create_all(control_plane, request, &name, state).await {
        Ok(resources) => Ok(resources),
        Err(error) => {
            error!(
                model = ?state.model_name,
                endpoint_config = ?state.endpoint_config_name,
                "Provisioning failed: {error:#}"
            );
            if rollback_on_failure {
                rollback(control_plane, state).await;
            }
            Err(error)
        }
    }
}

async fn create_all(
    control_plane: &dyn ControlPlane,
    request: &ProvisionRequest,
    name: &str,
    state: &mut WorkflowState,
) -> Result<ProvisionedResources> {
    let model_arn = control_plane
        .create_model(&ModelSpec {
            name: name.to_owned(),
            model_package_arn: request.model_package_arn.clone(),
            execution_role_arn: request.role_arn.clone(),
            network_isolation: true,
        })
        .await?;
    state.model_name = Some(name.to_owned());
    state.model_arn = Some(model_arn.clone());

    let endpoint_config_arn = control_plane
        .create_endpoint_config(&EndpointConfigSpec {
            name: name.to_owned(),
            model_name: name.to_owned(),
            variant_name: VARIANT_NAME.to_owned(),
            compute: request.compute.clone(),
            data_capture: request.data_capture.clone(),
        })
        .await?;
    state.endpoint_config_name = Some(name.to_owned());

    let endpoint_arn = control_plane.create_endpoint(name, name).await?;
    state.endpoint_name = Some(name.to_owned());
    state.endpoint_in_service = false;

    Ok(ProvisionedResources {
        model_name: name.to_owned(),
        model_arn,
        endpoint_config_name: name.to_owned(),
        endpoint_config_arn,
        endpoint_name: name.to_owned(),
        endpoint_arn,
    })
}

/// Deletes whatever the provisioning sequence created, newest first.
///
/// Failures are logged and do not stop the remaining deletions.
pub async fn rollback(control_plane: &dyn ControlPlane, state: &mut WorkflowState) {
    if let Some(endpoint) = state.endpoint_name.clone() {
        match control_plane.delete_endpoint(&endpoint).await {
            Ok(()) => {
                state.endpoint_name = None;
                state.endpoint_in_service = false;
            }
            Err(error) => warn!(endpoint = %endpoint, "Rollback failed: {error:#}"),
        }
    }

    if let Some(config) = state.endpoint_config_name.clone() {
        match control_plane.delete_endpoint_config(&config).await {
            Ok(()) => state.endpoint_config_name = None,
            Err(error) => warn!(endpoint_config = %config, "Rollback failed: {error:#}"),
        }
    }

    if let Some(model) = state.model_name.clone() {
        match control_plane.delete_model(&model).await {
            Ok(()) => {
                state.model_name = None;
                state.model_arn = None;
            }
            Err(error) => warn!(model = %model, "Rollback failed: {error:#}"),
        }
    }
}

/// Builds the provisioning request from configuration.
///
/// # Errors
///
/// Returns an error if no model package is configured.
pub fn provision_request(workflow: &Workflow, now: DateTime<Utc>) -> Result<ProvisionRequest> {
    let config = &workflow.config;

    Ok(ProvisionRequest {
        base_name: config.model_base_name.clone(),
        model_package_arn: config.require_model_package_arn()?.to_owned(),
        role_arn: config.role_arn.clone(),
        compute: ComputeShape {
            instance_type: config.endpoint_instance_type.clone(),
            instance_count: config.endpoint_instance_count,
        },
        data_capture: Some(DataCapturePolicy::csv(
            config.capture_uri(),
            config.capture_sampling_percent,
        )),
        now,
    })
}

/// Runs the deploy command: provisions, then waits for `InService`.
///
/// # Errors
///
/// Returns an error if provisioning fails, the wait ends early, or the
/// endpoint settles in any status other than `InService`.
pub async fn run(
    workflow: &Workflow,
    state: &mut WorkflowState,
    rollback_on_failure: bool,
) -> Result<ProvisionedResources> {
    if let Some(existing) = &state.endpoint_name {
        anyhow::bail!("Endpoint {existing} already exists; run `teardown` first");
    }

    let request = provision_request(workflow, Utc::now())?;
    let control_plane = workflow.control_plane.as_ref();

    let resources = provision(control_plane, &request, state, rollback_on_failure).await?;
    info!(
        endpoint = %resources.endpoint_name,
        arn = %resources.endpoint_arn,
        "Waiting for endpoint to come into service"
    );

    let endpoint = resources.endpoint_name.as_str();
    let settled = wait_until_settled(
        &format!("endpoint {endpoint}"),
        &workflow.endpoint_poll,
        &workflow.cancel,
        || control_plane.describe_endpoint(endpoint),
    )
    .await;

    let failure = match settled {
        Ok(description) if description.status == EndpointStatus::InService => {
            state.endpoint_in_service = true;
            info!(endpoint, "Endpoint in service");
            return Ok(resources);
        }
        Ok(description) => anyhow::anyhow!(
            "Endpoint {endpoint} settled as {}: {}",
            description.status.as_api_string(),
            description.failure_reason.as_deref().unwrap_or("no reason given")
        ),
        Err(error) => anyhow::Error::new(error),
    };

    if rollback_on_failure {
        rollback(control_plane, state).await;
    }

    Err(failure).context("Endpoint did not come into service")
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::testing::{FakeControlPlane, FakeRuntime, test_config, test_workflow};

    fn request() -> ProvisionRequest {
        let config = test_config();
        ProvisionRequest {
            base_name: String::from("demo"),
            model_package_arn: config.model_package_arn.unwrap(),
            role_arn: config.role_arn,
            compute: ComputeShape::default(),
            data_capture: None,
            now: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_provision_creates_in_order() {
        let control_plane = FakeControlPlane::default();
        let mut state = WorkflowState::default();

        let resources = provision(&control_plane, &request(), &mut state, false)
            .await
            .unwrap();

        assert_eq!(
            control_plane.mutations(),
            ["create_model", "create_endpoint_config", "create_endpoint"]
        );
        assert_eq!(resources.model_arn, format!("arn:model/{}", resources.model_name));
        assert_eq!(state.endpoint_name.as_deref(), Some(resources.endpoint_name.as_str()));
        assert!(!state.endpoint_in_service);
    }

    #[tokio::test]
    async fn test_partial_failure_leaves_resources_without_rollback() {
        let control_plane = FakeControlPlane::default().failing_on("create_endpoint");
        let mut state = WorkflowState::default();

        let result = provision(&control_plane, &request(), &mut state, false).await;

        assert!(result.is_err());
        assert_eq!(
            control_plane.mutations(),
            ["create_model", "create_endpoint_config", "create_endpoint"]
        );
        assert!(state.model_name.is_some());
        assert!(state.endpoint_config_name.is_some());
        assert!(state.endpoint_name.is_none());
    }

    #[tokio::test]
    async fn test_partial_failure_rolls_back_when_requested() {
        let control_plane = FakeControlPlane::default().failing_on("create_endpoint_config");
        let mut state = WorkflowState::default();

        let result = provision(&control_plane, &request(), &mut state, true).await;

        assert!(result.is_err());
        assert_eq!(
            control_plane.mutations(),
            ["create_model", "create_endpoint_config", "delete_model"]
        );
        assert!(state.model_name.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_waits_for_in_service() {
        let control_plane = Arc::new(FakeControlPlane::default().with_endpoint_statuses(&[
            EndpointStatus::Creating,
            EndpointStatus::Creating,
            EndpointStatus::InService,
        ]));
        let workflow = test_workflow(Arc::clone(&control_plane), Arc::new(FakeRuntime::default()));
        let mut state = WorkflowState::default();

        let resources = run(&workflow, &mut state, false).await.unwrap();

        assert!(state.endpoint_in_service);
        assert_eq!(state.require_live_endpoint().unwrap(), resources.endpoint_name);

        let describes = control_plane
            .calls()
            .iter()
            .filter(|call| call.starts_with("describe_endpoint"))
            .count();
        assert_eq!(describes, 3);

        let specs = control_plane.endpoint_config_specs.lock().unwrap();
        let capture = specs[0].data_capture.as_ref().unwrap();
        assert_eq!(capture.sampling_percentage, 100);
        assert_eq!(
            capture.destination_uri,
            "s3://demo-bucket/DEMO-ModelMonitor/datacapture"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_reports_failed_endpoint() {
        let control_plane = Arc::new(
            FakeControlPlane::default()
                .with_endpoint_statuses(&[EndpointStatus::Creating, EndpointStatus::Failed]),
        );
        let workflow = test_workflow(Arc::clone(&control_plane), Arc::new(FakeRuntime::default()));
        let mut state = WorkflowState::default();

        let error = run(&workflow, &mut state, true).await.unwrap_err();

        assert!(format!("{error:#}").contains("capacity unavailable"));
        assert_eq!(
            control_plane.mutations(),
            [
                "create_model",
                "create_endpoint_config",
                "create_endpoint",
                "delete_endpoint",
                "delete_endpoint_config",
                "delete_model",
            ]
        );
        assert_eq!(state, WorkflowState::default());
    }

    #[tokio::test]
    async fn test_run_refuses_second_endpoint() {
        let workflow = test_workflow(
            Arc::new(FakeControlPlane::default()),
            Arc::new(FakeRuntime::default()),
        );
        let mut state = WorkflowState {
            endpoint_name: Some(String::from("existing")),
            ..WorkflowState::default()
        };

        assert!(run(&workflow, &mut state, false).await.is_err());
    }
}
