//! Recording fakes of the service traits.

use core::time::Duration;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use anyhow::Result;
use async_trait::async_trait;
use config::Config;
use monitor_structs::{
    BaselineJobSpec, EndpointConfigSpec, EndpointDescription, EndpointStatus, ModelSpec,
    MonitoringExecution, MonitoringScheduleSpec, ProcessingJobDescription, ProcessingJobStatus,
    ScheduleDescription, ScheduleStatus,
};
use object_store::memory::InMemory;
use sagemaker_client::{ControlPlane, InferenceRuntime};
use tokio_util::sync::CancellationToken;

use crate::commands::Workflow;
use crate::poller::PollPolicy;

/// Pops scripted values in order, repeating the last one forever.
struct Script<T>(Mutex<VecDeque<T>>);

impl<T: Clone> Script<T> {
    fn new(values: impl IntoIterator<Item = T>) -> Self {
        Self(Mutex::new(values.into_iter().collect()))
    }

    fn next(&self) -> T {
        let mut values = self.0.lock().unwrap();
        if values.len() > 1 {
            values.pop_front().unwrap()
        } else {
            values.front().cloned().unwrap()
        }
    }
}

/// Control plane that records every call and answers from scripts.
pub struct FakeControlPlane {
    calls: Mutex<Vec<String>>,
    fail_on: Option<&'static str>,
    endpoint_statuses: Script<EndpointStatus>,
    job_statuses: Script<ProcessingJobStatus>,
    schedule_statuses: Script<ScheduleStatus>,
    job_output_uri: Option<String>,
    executions: Vec<MonitoringExecution>,
    pub baseline_specs: Mutex<Vec<BaselineJobSpec>>,
    pub schedule_specs: Mutex<Vec<MonitoringScheduleSpec>>,
    pub endpoint_config_specs: Mutex<Vec<EndpointConfigSpec>>,
}

impl Default for FakeControlPlane {
    fn default() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail_on: None,
            endpoint_statuses: Script::new([EndpointStatus::InService]),
            job_statuses: Script::new([ProcessingJobStatus::Completed]),
            schedule_statuses: Script::new([ScheduleStatus::Scheduled]),
            job_output_uri: None,
            executions: Vec::new(),
            baseline_specs: Mutex::new(Vec::new()),
            schedule_specs: Mutex::new(Vec::new()),
            endpoint_config_specs: Mutex::new(Vec::new()),
        }
    }
}

impl FakeControlPlane {
    /// Fails the named operation (e.g. `"create_endpoint"`).
    pub fn failing_on(mut self, operation: &'static str) -> Self {
        self.fail_on = Some(operation);
        self
    }

    pub fn with_endpoint_statuses(mut self, statuses: &[EndpointStatus]) -> Self {
        self.endpoint_statuses = Script::new(statuses.iter().copied());
        self
    }

    pub fn with_job_statuses(mut self, statuses: &[ProcessingJobStatus]) -> Self {
        self.job_statuses = Script::new(statuses.iter().copied());
        self
    }

    pub fn with_schedule_statuses(mut self, statuses: &[ScheduleStatus]) -> Self {
        self.schedule_statuses = Script::new(statuses.iter().copied());
        self
    }

    pub fn with_job_output_uri(mut self, uri: &str) -> Self {
        self.job_output_uri = Some(uri.to_owned());
        self
    }

    pub fn with_executions(mut self, executions: Vec<MonitoringExecution>) -> Self {
        self.executions = executions;
        self
    }

    /// Recorded calls as `operation:name`.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Recorded operation names, excluding describe/list calls.
    pub fn mutations(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| call.split(':').next().map(str::to_owned))
            .filter(|operation| {
                !operation.starts_with("describe_") && !operation.starts_with("list_")
            })
            .collect()
    }

    fn record(&self, operation: &'static str, name: &str) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("{operation}:{name}"));

        if self.fail_on == Some(operation) {
            anyhow::bail!("{operation} failed for {name}");
        }
        Ok(())
    }
}

#[async_trait]
impl ControlPlane for FakeControlPlane {
    async fn create_model(&self, spec: &ModelSpec) -> Result<String> {
        self.record("create_model", &spec.name)?;
        Ok(format!("arn:model/{}", spec.name))
    }

    async fn create_endpoint_config(&self, spec: &EndpointConfigSpec) -> Result<String> {
        self.record("create_endpoint_config", &spec.name)?;
        self.endpoint_config_specs.lock().unwrap().push(spec.clone());
        Ok(format!("arn:endpoint-config/{}", spec.name))
    }

    async fn create_endpoint(&self, endpoint_name: &str, _config_name: &str) -> Result<String> {
        self.record("create_endpoint", endpoint_name)?;
        Ok(format!("arn:endpoint/{endpoint_name}"))
    }

    async fn describe_endpoint(&self, endpoint_name: &str) -> Result<EndpointDescription> {
        self.record("describe_endpoint", endpoint_name)?;
        let status = self.endpoint_statuses.next();
        Ok(EndpointDescription {
            status,
            failure_reason: (status == EndpointStatus::Failed)
                .then(|| String::from("capacity unavailable")),
        })
    }

    async fn create_baseline_job(&self, spec: &BaselineJobSpec) -> Result<String> {
        self.record("create_baseline_job", &spec.job_name)?;
        self.baseline_specs.lock().unwrap().push(spec.clone());
        Ok(format!("arn:processing-job/{}", spec.job_name))
    }

    async fn describe_processing_job(&self, job_name: &str) -> Result<ProcessingJobDescription> {
        self.record("describe_processing_job", job_name)?;
        let status = self.job_statuses.next();
        Ok(ProcessingJobDescription {
            status,
            failure_reason: (status == ProcessingJobStatus::Failed)
                .then(|| String::from("analyzer crashed")),
            output_uri: self.job_output_uri.clone(),
        })
    }

    async fn create_monitoring_schedule(&self, spec: &MonitoringScheduleSpec) -> Result<String> {
        self.record("create_monitoring_schedule", &spec.schedule_name)?;
        self.schedule_specs.lock().unwrap().push(spec.clone());
        Ok(format!("arn:monitoring-schedule/{}", spec.schedule_name))
    }

    async fn describe_monitoring_schedule(
        &self,
        schedule_name: &str,
    ) -> Result<ScheduleDescription> {
        self.record("describe_monitoring_schedule", schedule_name)?;
        Ok(ScheduleDescription {
            status: self.schedule_statuses.next(),
            failure_reason: None,
        })
    }

    async fn list_monitoring_executions(
        &self,
        schedule_name: &str,
        max_results: i32,
    ) -> Result<Vec<MonitoringExecution>> {
        self.record("list_monitoring_executions", schedule_name)?;
        let limit = usize::try_from(max_results).unwrap_or(0);
        Ok(self.executions.iter().take(limit).cloned().collect())
    }

    async fn stop_monitoring_schedule(&self, schedule_name: &str) -> Result<()> {
        self.record("stop_monitoring_schedule", schedule_name)
    }

    async fn delete_monitoring_schedule(&self, schedule_name: &str) -> Result<()> {
        self.record("delete_monitoring_schedule", schedule_name)
    }

    async fn delete_endpoint(&self, endpoint_name: &str) -> Result<()> {
        self.record("delete_endpoint", endpoint_name)
    }

    async fn delete_endpoint_config(&self, config_name: &str) -> Result<()> {
        self.record("delete_endpoint_config", config_name)
    }

    async fn delete_model(&self, model_name: &str) -> Result<()> {
        self.record("delete_model", model_name)
    }
}

/// Runtime that records payloads and answers `prediction-<n>`.
#[derive(Default)]
pub struct FakeRuntime {
    payloads: Mutex<Vec<String>>,
    sent_at: Mutex<Vec<Instant>>,
    fail_at: Option<usize>,
}

impl FakeRuntime {
    /// Fails the call with this zero-based position.
    pub fn failing_at(call: usize) -> Self {
        Self {
            fail_at: Some(call),
            ..Self::default()
        }
    }

    pub fn payloads(&self) -> Vec<String> {
        self.payloads.lock().unwrap().clone()
    }

    /// Wall-clock time each request arrived.
    pub fn sent_at(&self) -> Vec<Instant> {
        self.sent_at.lock().unwrap().clone()
    }
}

#[async_trait]
impl InferenceRuntime for FakeRuntime {
    async fn invoke_endpoint(
        &self,
        endpoint_name: &str,
        content_type: &str,
        payload: String,
    ) -> Result<String> {
        assert_eq!(content_type, "text/csv");

        self.sent_at.lock().unwrap().push(Instant::now());
        let mut payloads = self.payloads.lock().unwrap();
        let call = payloads.len();
        payloads.push(payload);

        if self.fail_at == Some(call) {
            anyhow::bail!("connection reset by {endpoint_name}");
        }
        Ok(format!("prediction-{call}\n"))
    }
}

pub fn test_config() -> Config {
    Config::from_lookup(|key| match key {
        "SAGEMAKER_ROLE_ARN" => Some(String::from("arn:aws:iam::123456789012:role/monitor")),
        "MONITOR_BUCKET" => Some(String::from("demo-bucket")),
        "MODEL_PACKAGE_ARN" => Some(String::from(
            "arn:aws:sagemaker:us-east-1:865070037744:model-package/demo",
        )),
        _ => None,
    })
    .unwrap()
}

/// Workflow over the given fakes with an in-memory store and 1s polling.
pub fn test_workflow(
    control_plane: Arc<FakeControlPlane>,
    runtime: Arc<FakeRuntime>,
) -> Workflow {
    Workflow {
        config: test_config(),
        control_plane,
        runtime,
        store: Arc::new(InMemory::new()),
        endpoint_poll: PollPolicy::fixed(Duration::from_secs(1)),
        job_poll: PollPolicy::fixed(Duration::from_secs(1)),
        cancel: CancellationToken::new(),
    }
}
