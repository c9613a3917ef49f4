//! Request and description types for control-plane resources.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    CronExpression, EndpointStatus, ExecutionStatus, Lifecycle, ProcessingJobStatus, ScheduleStatus,
};

/// Content type of every payload this workflow sends.
pub const CSV_CONTENT_TYPE: &str = "text/csv";

/// Instance type and count for a hosted or processing resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputeShape {
    pub instance_type: String,
    pub instance_count: i32,
}

impl Default for ComputeShape {
    fn default() -> Self {
        Self {
            instance_type: String::from("ml.m5.xlarge"),
            instance_count: 1,
        }
    }
}

/// Which side of each request data capture records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaptureMode {
    Input,
    Output,
}

impl CaptureMode {
    /// Returns the API string representation for this mode.
    #[must_use]
    pub const fn as_api_string(self) -> &'static str {
        match self {
            Self::Input => "Input",
            Self::Output => "Output",
        }
    }
}

/// Data capture settings attached to an endpoint config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataCapturePolicy {
    /// Percentage of requests recorded (0-100)
    pub sampling_percentage: i32,

    /// `s3://` location captured payloads are written to
    pub destination_uri: String,

    /// Request and/or response capture
    pub capture_modes: Vec<CaptureMode>,

    /// Content types recorded as CSV
    pub csv_content_types: Vec<String>,

    /// Content types recorded as JSON
    pub json_content_types: Vec<String>,
}

impl DataCapturePolicy {
    /// Captures input and output of every sampled CSV request.
    #[must_use]
    pub fn csv(destination_uri: String, sampling_percentage: i32) -> Self {
        Self {
            sampling_percentage,
            destination_uri,
            capture_modes: vec![CaptureMode::Input, CaptureMode::Output],
            csv_content_types: vec![CSV_CONTENT_TYPE.to_owned()],
            json_content_types: Vec::new(),
        }
    }
}

/// Model backed by a marketplace model package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub name: String,
    pub model_package_arn: String,
    pub execution_role_arn: String,
    pub network_isolation: bool,
}

/// Single-variant endpoint config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointConfigSpec {
    pub name: String,
    pub model_name: String,
    pub variant_name: String,
    pub compute: ComputeShape,
    pub data_capture: Option<DataCapturePolicy>,
}

/// CSV dataset layout understood by the analyzer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetFormat {
    pub header: bool,
}

impl DatasetFormat {
    /// Returns the `dataset_format` environment value passed to the analyzer.
    #[must_use]
    pub fn to_analyzer_env(self) -> String {
        serde_json::json!({
            "csv": {
                "header": self.header,
                "output_columns_position": "START",
            }
        })
        .to_string()
    }
}

/// One-shot statistical baselining job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaselineJobSpec {
    pub job_name: String,
    pub dataset_uri: String,
    pub output_uri: String,
    pub dataset_format: DatasetFormat,
    pub image_uri: String,
    pub role_arn: String,
    pub compute: ComputeShape,
    pub volume_size_gb: i32,
    pub max_runtime_seconds: i32,
}

impl BaselineJobSpec {
    /// Location of the suggested statistics.
    #[must_use]
    pub fn statistics_uri(&self) -> String {
        format!("{}/statistics.json", self.output_uri.trim_end_matches('/'))
    }

    /// Location of the suggested constraints.
    #[must_use]
    pub fn constraints_uri(&self) -> String {
        format!("{}/constraints.json", self.output_uri.trim_end_matches('/'))
    }
}

/// Periodic comparison of captured traffic against a baseline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitoringScheduleSpec {
    pub schedule_name: String,
    pub endpoint_name: String,
    pub cron: CronExpression,
    pub statistics_uri: String,
    pub constraints_uri: String,
    pub output_uri: String,
    pub image_uri: String,
    pub role_arn: String,
    pub compute: ComputeShape,
    pub volume_size_gb: i32,
    pub max_runtime_seconds: i32,
    pub publish_cloudwatch_metrics: bool,
}

/// Result of `DescribeEndpoint`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointDescription {
    pub status: EndpointStatus,
    pub failure_reason: Option<String>,
}

/// Result of `DescribeProcessingJob`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessingJobDescription {
    pub status: ProcessingJobStatus,
    pub failure_reason: Option<String>,

    /// `s3://` location of the job's first output, if any
    pub output_uri: Option<String>,
}

/// One run of a monitoring schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitoringExecution {
    pub status: ExecutionStatus,
    pub scheduled_time: Option<DateTime<Utc>>,
    pub processing_job_arn: Option<String>,
    pub failure_reason: Option<String>,
}

/// Result of `DescribeMonitoringSchedule`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleDescription {
    pub status: ScheduleStatus,
    pub failure_reason: Option<String>,
}

impl Lifecycle for EndpointDescription {
    fn is_in_progress(&self) -> bool {
        self.status.is_in_progress()
    }

    fn state(&self) -> &'static str {
        self.status.state()
    }
}

impl Lifecycle for ProcessingJobDescription {
    fn is_in_progress(&self) -> bool {
        self.status.is_in_progress()
    }

    fn state(&self) -> &'static str {
        self.status.state()
    }
}

impl Lifecycle for ScheduleDescription {
    fn is_in_progress(&self) -> bool {
        self.status.is_in_progress()
    }

    fn state(&self) -> &'static str {
        self.status.state()
    }
}
