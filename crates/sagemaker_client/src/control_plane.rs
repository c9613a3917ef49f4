//! The two service surfaces the workflow talks to.

use anyhow::Result;
use async_trait::async_trait;
use monitor_structs::{
    BaselineJobSpec, EndpointConfigSpec, EndpointDescription, ModelSpec, MonitoringExecution,
    MonitoringScheduleSpec, ProcessingJobDescription, ScheduleDescription,
};

/// Create/describe/delete operations of the control plane.
///
/// Every resource is keyed by a name unique within the account and region.
/// Create calls return the new resource's ARN.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    async fn create_model(&self, spec: &ModelSpec) -> Result<String>;

    async fn create_endpoint_config(&self, spec: &EndpointConfigSpec) -> Result<String>;

    async fn create_endpoint(&self, endpoint_name: &str, config_name: &str) -> Result<String>;

    async fn describe_endpoint(&self, endpoint_name: &str) -> Result<EndpointDescription>;

    async fn create_baseline_job(&self, spec: &BaselineJobSpec) -> Result<String>;

    async fn describe_processing_job(&self, job_name: &str) -> Result<ProcessingJobDescription>;

    async fn create_monitoring_schedule(&self, spec: &MonitoringScheduleSpec) -> Result<String>;

    async fn describe_monitoring_schedule(&self, schedule_name: &str)
    -> Result<ScheduleDescription>;

    /// Lists executions of a schedule, newest first.
    async fn list_monitoring_executions(
        &self,
        schedule_name: &str,
        max_results: i32,
    ) -> Result<Vec<MonitoringExecution>>;

    async fn stop_monitoring_schedule(&self, schedule_name: &str) -> Result<()>;

    async fn delete_monitoring_schedule(&self, schedule_name: &str) -> Result<()>;

    async fn delete_endpoint(&self, endpoint_name: &str) -> Result<()>;

    async fn delete_endpoint_config(&self, config_name: &str) -> Result<()>;

    async fn delete_model(&self, model_name: &str) -> Result<()>;
}

/// Synchronous invocation of a live endpoint.
#[async_trait]
pub trait InferenceRuntime: Send + Sync {
    /// Sends `payload` and returns the response body decoded as UTF-8.
    async fn invoke_endpoint(
        &self,
        endpoint_name: &str,
        content_type: &str,
        payload: String,
    ) -> Result<String>;
}
