//! Control-plane client for SageMaker.

use core::str::FromStr;

use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_sagemaker::Client;
use aws_sdk_sagemaker::primitives::DateTime as SdkDateTime;
use aws_sdk_sagemaker::types::{
    AppSpecification, CaptureContentTypeHeader, CaptureMode as SdkCaptureMode, CaptureOption,
    ContainerDefinition, DataCaptureConfig, EndpointInput,
    EndpointStatus as SdkEndpointStatus, ExecutionStatus as SdkExecutionStatus,
    MonitoringAppSpecification, MonitoringBaselineConfig, MonitoringClusterConfig,
    MonitoringConstraintsResource, MonitoringExecutionSortKey, MonitoringExecutionSummary,
    MonitoringInput, MonitoringJobDefinition, MonitoringOutput, MonitoringOutputConfig,
    MonitoringResources, MonitoringS3Output, MonitoringScheduleConfig,
    MonitoringStatisticsResource, MonitoringStoppingCondition, ProcessingClusterConfig,
    ProcessingInput, ProcessingInstanceType, ProcessingJobStatus as SdkProcessingJobStatus,
    ProcessingOutput, ProcessingOutputConfig, ProcessingResources,
    ProcessingS3DataDistributionType, ProcessingS3DataType, ProcessingS3Input,
    ProcessingS3InputMode, ProcessingS3Output, ProcessingS3UploadMode,
    ProcessingStoppingCondition, ProductionVariant, ProductionVariantInstanceType,
    ScheduleConfig, ScheduleStatus as SdkScheduleStatus, SortOrder,
};
use chrono::{DateTime, Utc};
use monitor_structs::{
    BaselineJobSpec, EndpointConfigSpec, EndpointDescription, EndpointStatus,
    ExecutionStatus, ModelSpec, MonitoringExecution, MonitoringScheduleSpec,
    ProcessingJobDescription, ProcessingJobStatus, ScheduleDescription, ScheduleStatus,
};
use tracing::{debug, info};

use crate::control_plane::ControlPlane;

/// Container path the analyzer reads the baseline dataset from.
const BASELINE_INPUT_PATH: &str = "/opt/ml/processing/input/baseline_dataset_input";

/// Container path the analyzer reads captured endpoint traffic from.
const ENDPOINT_INPUT_PATH: &str = "/opt/ml/processing/input/endpoint";

/// Container path the analyzer writes its results to.
const OUTPUT_PATH: &str = "/opt/ml/processing/output";

/// Dataset format of captured endpoint traffic.
const CAPTURE_DATASET_FORMAT: &str =
    r#"{"sagemakerCaptureJson":{"captureIndexNames":["endpointInput","endpointOutput"]}}"#;

/// Client for the SageMaker control plane.
pub struct SageMakerClient {
    client: Client,
}

impl SageMakerClient {
    /// Creates a client from a loaded SDK configuration.
    #[must_use]
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            client: Client::new(config),
        }
    }
}

/// Returns a response member the service always sends.
fn required<'a, T: ?Sized, V: Into<Option<&'a T>>>(value: V, member: &str) -> Result<&'a T> {
    value
        .into()
        .with_context(|| format!("Response is missing {member}"))
}

fn to_utc(time: &SdkDateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(time.secs(), time.subsec_nanos())
}

fn execution_from_summary(summary: &MonitoringExecutionSummary) -> Result<MonitoringExecution> {
    let status = required::<SdkExecutionStatus, _>(
        summary.monitoring_execution_status(),
        "MonitoringExecutionStatus",
    )?;

    Ok(MonitoringExecution {
        status: ExecutionStatus::from_str(status.as_str())?,
        scheduled_time: Option::<&SdkDateTime>::from(summary.scheduled_time()).and_then(to_utc),
        processing_job_arn: summary.processing_job_arn().map(str::to_owned),
        failure_reason: summary.failure_reason().map(str::to_owned),
    })
}

fn capture_config(spec: &EndpointConfigSpec) -> Option<DataCaptureConfig> {
    let policy = spec.data_capture.as_ref()?;

    let mut builder = DataCaptureConfig::builder()
        .enable_capture(true)
        .initial_sampling_percentage(policy.sampling_percentage)
        .destination_s3_uri(&policy.destination_uri);

    for mode in &policy.capture_modes {
        let mode = SdkCaptureMode::from(mode.as_api_string());
        builder = builder.capture_options(CaptureOption::builder().capture_mode(mode).build());
    }

    let mut header = CaptureContentTypeHeader::builder();
    for content_type in &policy.csv_content_types {
        header = header.csv_content_types(content_type);
    }
    for content_type in &policy.json_content_types {
        header = header.json_content_types(content_type);
    }

    Some(
        builder
            .capture_content_type_header(header.build())
            .build(),
    )
}

fn schedule_definition(spec: &MonitoringScheduleSpec) -> MonitoringJobDefinition {
    let baseline = MonitoringBaselineConfig::builder()
        .statistics_resource(
            MonitoringStatisticsResource::builder()
                .s3_uri(&spec.statistics_uri)
                .build(),
        )
        .constraints_resource(
            MonitoringConstraintsResource::builder()
                .s3_uri(&spec.constraints_uri)
                .build(),
        )
        .build();

    let input = MonitoringInput::builder()
        .endpoint_input(
            EndpointInput::builder()
                .endpoint_name(&spec.endpoint_name)
                .local_path(ENDPOINT_INPUT_PATH)
                .s3_input_mode(ProcessingS3InputMode::File)
                .s3_data_distribution_type(ProcessingS3DataDistributionType::Fullyreplicated)
                .build(),
        )
        .build();

    let output = MonitoringOutputConfig::builder()
        .monitoring_outputs(
            MonitoringOutput::builder()
                .s3_output(
                    MonitoringS3Output::builder()
                        .s3_uri(&spec.output_uri)
                        .local_path(OUTPUT_PATH)
                        .s3_upload_mode(ProcessingS3UploadMode::Continuous)
                        .build(),
                )
                .build(),
        )
        .build();

    let resources = MonitoringResources::builder()
        .cluster_config(
            MonitoringClusterConfig::builder()
                .instance_count(spec.compute.instance_count)
                .instance_type(ProcessingInstanceType::from(spec.compute.instance_type.as_str()))
                .volume_size_in_gb(spec.volume_size_gb)
                .build(),
        )
        .build();

    let publish_metrics = if spec.publish_cloudwatch_metrics {
        "Enabled"
    } else {
        "Disabled"
    };

    MonitoringJobDefinition::builder()
        .baseline_config(baseline)
        .monitoring_inputs(input)
        .monitoring_output_config(output)
        .monitoring_resources(resources)
        .monitoring_app_specification(
            MonitoringAppSpecification::builder()
                .image_uri(&spec.image_uri)
                .build(),
        )
        .stopping_condition(
            MonitoringStoppingCondition::builder()
                .max_runtime_in_seconds(spec.max_runtime_seconds)
                .build(),
        )
        .environment("dataset_format", CAPTURE_DATASET_FORMAT)
        .environment("dataset_source", ENDPOINT_INPUT_PATH)
        .environment("output_path", OUTPUT_PATH)
        .environment("publish_cloudwatch_metrics", publish_metrics)
        .role_arn(&spec.role_arn)
        .build()
}

#[async_trait]
impl ControlPlane for SageMakerClient {
    async fn create_model(&self, spec: &ModelSpec) -> Result<String> {
        info!(
            model = %spec.name,
            model_package = %spec.model_package_arn,
            "Creating model"
        );

        let container = ContainerDefinition::builder()
            .model_package_name(&spec.model_package_arn)
            .build();

        let output = self
            .client
            .create_model()
            .model_name(&spec.name)
            .execution_role_arn(&spec.execution_role_arn)
            .primary_container(container)
            .enable_network_isolation(spec.network_isolation)
            .send()
            .await
            .with_context(|| format!("Failed to create model {}", spec.name))?;

        Ok(required::<str, _>(output.model_arn(), "ModelArn")?.to_owned())
    }

    async fn create_endpoint_config(&self, spec: &EndpointConfigSpec) -> Result<String> {
        info!(
            endpoint_config = %spec.name,
            model = %spec.model_name,
            instance_type = %spec.compute.instance_type,
            instance_count = spec.compute.instance_count,
            capture = spec.data_capture.is_some(),
            "Creating endpoint config"
        );

        let variant = ProductionVariant::builder()
            .variant_name(&spec.variant_name)
            .model_name(&spec.model_name)
            .initial_instance_count(spec.compute.instance_count)
            .instance_type(ProductionVariantInstanceType::from(
                spec.compute.instance_type.as_str(),
            ))
            .initial_variant_weight(1.0)
            .build();

        let output = self
            .client
            .create_endpoint_config()
            .endpoint_config_name(&spec.name)
            .production_variants(variant)
            .set_data_capture_config(capture_config(spec))
            .send()
            .await
            .with_context(|| format!("Failed to create endpoint config {}", spec.name))?;

        Ok(required::<str, _>(output.endpoint_config_arn(), "EndpointConfigArn")?.to_owned())
    }

    async fn create_endpoint(&self, endpoint_name: &str, config_name: &str) -> Result<String> {
        info!(
            endpoint = endpoint_name,
            endpoint_config = config_name,
            "Creating endpoint"
        );

        let output = self
            .client
            .create_endpoint()
            .endpoint_name(endpoint_name)
            .endpoint_config_name(config_name)
            .send()
            .await
            .with_context(|| format!("Failed to create endpoint {endpoint_name}"))?;

        Ok(required::<str, _>(output.endpoint_arn(), "EndpointArn")?.to_owned())
    }

    async fn describe_endpoint(&self, endpoint_name: &str) -> Result<EndpointDescription> {
        let output = self
            .client
            .describe_endpoint()
            .endpoint_name(endpoint_name)
            .send()
            .await
            .with_context(|| format!("Failed to describe endpoint {endpoint_name}"))?;

        let status = required::<SdkEndpointStatus, _>(output.endpoint_status(), "EndpointStatus")?;
        debug!(endpoint = endpoint_name, status = status.as_str(), "Described endpoint");

        Ok(EndpointDescription {
            status: EndpointStatus::from_str(status.as_str())?,
            failure_reason: output.failure_reason().map(str::to_owned),
        })
    }

    async fn create_baseline_job(&self, spec: &BaselineJobSpec) -> Result<String> {
        info!(
            job = %spec.job_name,
            dataset = %spec.dataset_uri,
            output = %spec.output_uri,
            "Creating baseline job"
        );

        let input = ProcessingInput::builder()
            .input_name("baseline_dataset_input")
            .s3_input(
                ProcessingS3Input::builder()
                    .s3_uri(&spec.dataset_uri)
                    .local_path(BASELINE_INPUT_PATH)
                    .s3_data_type(ProcessingS3DataType::S3Prefix)
                    .s3_input_mode(ProcessingS3InputMode::File)
                    .s3_data_distribution_type(ProcessingS3DataDistributionType::Fullyreplicated)
                    .build(),
            )
            .build();

        let output = ProcessingOutputConfig::builder()
            .outputs(
                ProcessingOutput::builder()
                    .output_name("monitoring_output")
                    .s3_output(
                        ProcessingS3Output::builder()
                            .s3_uri(&spec.output_uri)
                            .local_path(OUTPUT_PATH)
                            .s3_upload_mode(ProcessingS3UploadMode::EndOfJob)
                            .build(),
                    )
                    .build(),
            )
            .build();

        let resources = ProcessingResources::builder()
            .cluster_config(
                ProcessingClusterConfig::builder()
                    .instance_count(spec.compute.instance_count)
                    .instance_type(ProcessingInstanceType::from(
                        spec.compute.instance_type.as_str(),
                    ))
                    .volume_size_in_gb(spec.volume_size_gb)
                    .build(),
            )
            .build();

        let response = self
            .client
            .create_processing_job()
            .processing_job_name(&spec.job_name)
            .processing_inputs(input)
            .processing_output_config(output)
            .processing_resources(resources)
            .stopping_condition(
                ProcessingStoppingCondition::builder()
                    .max_runtime_in_seconds(spec.max_runtime_seconds)
                    .build(),
            )
            .app_specification(AppSpecification::builder().image_uri(&spec.image_uri).build())
            .environment("dataset_format", spec.dataset_format.to_analyzer_env())
            .environment("dataset_source", BASELINE_INPUT_PATH)
            .environment("output_path", OUTPUT_PATH)
            .environment("publish_cloudwatch_metrics", "Disabled")
            .role_arn(&spec.role_arn)
            .send()
            .await
            .with_context(|| format!("Failed to create baseline job {}", spec.job_name))?;

        Ok(required::<str, _>(response.processing_job_arn(), "ProcessingJobArn")?.to_owned())
    }

    async fn describe_processing_job(&self, job_name: &str) -> Result<ProcessingJobDescription> {
        let output = self
            .client
            .describe_processing_job()
            .processing_job_name(job_name)
            .send()
            .await
            .with_context(|| format!("Failed to describe processing job {job_name}"))?;

        let status = required::<SdkProcessingJobStatus, _>(
            output.processing_job_status(),
            "ProcessingJobStatus",
        )?;
        debug!(job = job_name, status = status.as_str(), "Described processing job");

        let output_uri = output
            .processing_output_config()
            .and_then(|config| config.outputs().first())
            .and_then(ProcessingOutput::s3_output)
            .and_then(|s3| Option::<&str>::from(s3.s3_uri()))
            .map(str::to_owned);

        Ok(ProcessingJobDescription {
            status: ProcessingJobStatus::from_str(status.as_str())?,
            failure_reason: output.failure_reason().map(str::to_owned),
            output_uri,
        })
    }

    async fn create_monitoring_schedule(&self, spec: &MonitoringScheduleSpec) -> Result<String> {
        info!(
            schedule = %spec.schedule_name,
            endpoint = %spec.endpoint_name,
            cron = %spec.cron,
            "Creating monitoring schedule"
        );

        let config = MonitoringScheduleConfig::builder()
            .schedule_config(
                ScheduleConfig::builder()
                    .schedule_expression(spec.cron.as_str())
                    .build(),
            )
            .monitoring_job_definition(schedule_definition(spec))
            .build();

        let output = self
            .client
            .create_monitoring_schedule()
            .monitoring_schedule_name(&spec.schedule_name)
            .monitoring_schedule_config(config)
            .send()
            .await
            .with_context(|| {
                format!("Failed to create monitoring schedule {}", spec.schedule_name)
            })?;

        Ok(
            required::<str, _>(output.monitoring_schedule_arn(), "MonitoringScheduleArn")?
                .to_owned(),
        )
    }

    async fn describe_monitoring_schedule(
        &self,
        schedule_name: &str,
    ) -> Result<ScheduleDescription> {
        let output = self
            .client
            .describe_monitoring_schedule()
            .monitoring_schedule_name(schedule_name)
            .send()
            .await
            .with_context(|| format!("Failed to describe monitoring schedule {schedule_name}"))?;

        let status = required::<SdkScheduleStatus, _>(
            output.monitoring_schedule_status(),
            "MonitoringScheduleStatus",
        )?;
        debug!(
            schedule = schedule_name,
            status = status.as_str(),
            "Described monitoring schedule"
        );

        Ok(ScheduleDescription {
            status: ScheduleStatus::from_str(status.as_str())?,
            failure_reason: output.failure_reason().map(str::to_owned),
        })
    }

    async fn list_monitoring_executions(
        &self,
        schedule_name: &str,
        max_results: i32,
    ) -> Result<Vec<MonitoringExecution>> {
        let output = self
            .client
            .list_monitoring_executions()
            .monitoring_schedule_name(schedule_name)
            .sort_by(MonitoringExecutionSortKey::ScheduledTime)
            .sort_order(SortOrder::Descending)
            .max_results(max_results)
            .send()
            .await
            .with_context(|| format!("Failed to list executions of {schedule_name}"))?;

        output
            .monitoring_execution_summaries()
            .iter()
            .map(execution_from_summary)
            .collect()
    }

    async fn stop_monitoring_schedule(&self, schedule_name: &str) -> Result<()> {
        info!(schedule = schedule_name, "Stopping monitoring schedule");

        self.client
            .stop_monitoring_schedule()
            .monitoring_schedule_name(schedule_name)
            .send()
            .await
            .with_context(|| format!("Failed to stop monitoring schedule {schedule_name}"))?;

        Ok(())
    }

    async fn delete_monitoring_schedule(&self, schedule_name: &str) -> Result<()> {
        info!(schedule = schedule_name, "Deleting monitoring schedule");

        self.client
            .delete_monitoring_schedule()
            .monitoring_schedule_name(schedule_name)
            .send()
            .await
            .with_context(|| format!("Failed to delete monitoring schedule {schedule_name}"))?;

        Ok(())
    }

    async fn delete_endpoint(&self, endpoint_name: &str) -> Result<()> {
        info!(endpoint = endpoint_name, "Deleting endpoint");

        self.client
            .delete_endpoint()
            .endpoint_name(endpoint_name)
            .send()
            .await
            .with_context(|| format!("Failed to delete endpoint {endpoint_name}"))?;

        Ok(())
    }

    async fn delete_endpoint_config(&self, config_name: &str) -> Result<()> {
        info!(endpoint_config = config_name, "Deleting endpoint config");

        self.client
            .delete_endpoint_config()
            .endpoint_config_name(config_name)
            .send()
            .await
            .with_context(|| format!("Failed to delete endpoint config {config_name}"))?;

        Ok(())
    }

    async fn delete_model(&self, model_name: &str) -> Result<()> {
        info!(model = model_name, "Deleting model");

        self.client
            .delete_model()
            .model_name(model_name)
            .send()
            .await
            .with_context(|| format!("Failed to delete model {model_name}"))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use monitor_structs::{ComputeShape, CronExpression, DataCapturePolicy};

    use super::*;

    fn endpoint_config(data_capture: Option<DataCapturePolicy>) -> EndpointConfigSpec {
        EndpointConfigSpec {
            name: String::from("demo-config"),
            model_name: String::from("demo-model"),
            variant_name: String::from("AllTraffic"),
            compute: ComputeShape::default(),
            data_capture,
        }
    }

    fn schedule_spec() -> MonitoringScheduleSpec {
        MonitoringScheduleSpec {
            schedule_name: String::from("demo-schedule"),
            endpoint_name: String::from("demo-endpoint"),
            cron: CronExpression::hourly(),
            statistics_uri: String::from("s3://demo-bucket/baselining/results/statistics.json"),
            constraints_uri: String::from("s3://demo-bucket/baselining/results/constraints.json"),
            output_uri: String::from("s3://demo-bucket/reports"),
            image_uri: String::from("monitor-image"),
            role_arn: String::from("arn:aws:iam::123456789012:role/monitor"),
            compute: ComputeShape::default(),
            volume_size_gb: 20,
            max_runtime_seconds: 3600,
            publish_cloudwatch_metrics: false,
        }
    }

    #[test]
    fn test_capture_config_records_input_and_output() {
        let policy = DataCapturePolicy::csv(String::from("s3://demo-bucket/datacapture"), 100);
        let config = capture_config(&endpoint_config(Some(policy))).unwrap();

        assert_eq!(
            Option::<&str>::from(config.destination_s3_uri()),
            Some("s3://demo-bucket/datacapture")
        );
        let modes: Vec<SdkCaptureMode> = config
            .capture_options()
            .iter()
            .filter_map(|option| Option::<&SdkCaptureMode>::from(option.capture_mode()).cloned())
            .collect();
        assert_eq!(modes, [SdkCaptureMode::Input, SdkCaptureMode::Output]);
    }

    #[test]
    fn test_no_capture_config_without_policy() {
        assert!(capture_config(&endpoint_config(None)).is_none());
    }

    #[test]
    fn test_schedule_definition_reads_endpoint_traffic() {
        let definition = schedule_definition(&schedule_spec());

        let input = definition
            .monitoring_inputs()
            .first()
            .and_then(MonitoringInput::endpoint_input)
            .unwrap();
        assert_eq!(
            input.s3_data_distribution_type(),
            Some(&ProcessingS3DataDistributionType::Fullyreplicated)
        );

        let environment = definition.environment().unwrap();
        assert_eq!(
            environment.get("dataset_source").map(String::as_str),
            Some(ENDPOINT_INPUT_PATH)
        );
        assert_eq!(
            environment.get("publish_cloudwatch_metrics").map(String::as_str),
            Some("Disabled")
        );
    }
}
