//! CLI command implementations.

use std::sync::Arc;

use config::Config;
use object_store::ObjectStore;
use sagemaker_client::{ControlPlane, InferenceRuntime};
use tokio_util::sync::CancellationToken;

use crate::poller::PollPolicy;

pub mod baseline;
pub mod demo;
pub mod deploy;
pub mod invoke;
pub mod report;
pub mod schedule;
pub mod stage;
pub mod teardown;

/// Collaborators shared by every step of the workflow.
pub struct Workflow {
    pub config: Config,
    pub control_plane: Arc<dyn ControlPlane>,
    pub runtime: Arc<dyn InferenceRuntime>,
    pub store: Arc<dyn ObjectStore>,

    /// Polling for endpoint status
    pub endpoint_poll: PollPolicy,

    /// Polling for baseline jobs and schedules
    pub job_poll: PollPolicy,

    /// Fired on Ctrl-C to abandon any wait in progress
    pub cancel: CancellationToken,
}
