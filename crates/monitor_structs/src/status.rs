//! Resource statuses reported by the control plane.

use core::str::FromStr;

use serde::{Deserialize, Serialize};

/// A resource state reported by the control plane.
///
/// Implementors classify every state as either still moving
/// (`is_in_progress`) or settled.
pub trait Lifecycle {
    /// Returns true while the control plane is still working on the resource.
    fn is_in_progress(&self) -> bool;

    /// Returns the status exactly as the API reports it.
    fn state(&self) -> &'static str;
}

/// Endpoint status as reported by `DescribeEndpoint`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::EnumIter)]
pub enum EndpointStatus {
    OutOfService,
    Creating,
    Updating,
    SystemUpdating,
    RollingBack,
    InService,
    Deleting,
    Failed,
    UpdateRollbackFailed,
}

impl EndpointStatus {
    /// Returns the API string representation for this status.
    #[must_use]
    pub const fn as_api_string(self) -> &'static str {
        match self {
            Self::OutOfService => "OutOfService",
            Self::Creating => "Creating",
            Self::Updating => "Updating",
            Self::SystemUpdating => "SystemUpdating",
            Self::RollingBack => "RollingBack",
            Self::InService => "InService",
            Self::Deleting => "Deleting",
            Self::Failed => "Failed",
            Self::UpdateRollbackFailed => "UpdateRollbackFailed",
        }
    }
}

impl FromStr for EndpointStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "OutOfService" => Ok(Self::OutOfService),
            "Creating" => Ok(Self::Creating),
            "Updating" => Ok(Self::Updating),
            "SystemUpdating" => Ok(Self::SystemUpdating),
            "RollingBack" => Ok(Self::RollingBack),
            "InService" => Ok(Self::InService),
            "Deleting" => Ok(Self::Deleting),
            "Failed" => Ok(Self::Failed),
            "UpdateRollbackFailed" => Ok(Self::UpdateRollbackFailed),
            _ => Err(anyhow::anyhow!("Invalid endpoint status: {s}")),
        }
    }
}

impl Lifecycle for EndpointStatus {
    fn is_in_progress(&self) -> bool {
        matches!(
            self,
            Self::Creating
                | Self::Updating
                | Self::SystemUpdating
                | Self::RollingBack
                | Self::Deleting
        )
    }

    fn state(&self) -> &'static str {
        self.as_api_string()
    }
}

/// Processing job status, used for baseline jobs and monitoring executions' jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::EnumIter)]
pub enum ProcessingJobStatus {
    InProgress,
    Completed,
    Failed,
    Stopping,
    Stopped,
}

impl ProcessingJobStatus {
    /// Returns the API string representation for this status.
    #[must_use]
    pub const fn as_api_string(self) -> &'static str {
        match self {
            Self::InProgress => "InProgress",
            Self::Completed => "Completed",
            Self::Failed => "Failed",
            Self::Stopping => "Stopping",
            Self::Stopped => "Stopped",
        }
    }
}

impl FromStr for ProcessingJobStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "InProgress" => Ok(Self::InProgress),
            "Completed" => Ok(Self::Completed),
            "Failed" => Ok(Self::Failed),
            "Stopping" => Ok(Self::Stopping),
            "Stopped" => Ok(Self::Stopped),
            _ => Err(anyhow::anyhow!("Invalid processing job status: {s}")),
        }
    }
}

impl Lifecycle for ProcessingJobStatus {
    fn is_in_progress(&self) -> bool {
        matches!(self, Self::InProgress | Self::Stopping)
    }

    fn state(&self) -> &'static str {
        self.as_api_string()
    }
}

/// Monitoring schedule status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::EnumIter)]
pub enum ScheduleStatus {
    Pending,
    Failed,
    Scheduled,
    Stopped,
}

impl ScheduleStatus {
    /// Returns the API string representation for this status.
    #[must_use]
    pub const fn as_api_string(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Failed => "Failed",
            Self::Scheduled => "Scheduled",
            Self::Stopped => "Stopped",
        }
    }
}

impl FromStr for ScheduleStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Failed" => Ok(Self::Failed),
            "Scheduled" => Ok(Self::Scheduled),
            "Stopped" => Ok(Self::Stopped),
            _ => Err(anyhow::anyhow!("Invalid monitoring schedule status: {s}")),
        }
    }
}

impl Lifecycle for ScheduleStatus {
    fn is_in_progress(&self) -> bool {
        matches!(self, Self::Pending)
    }

    fn state(&self) -> &'static str {
        self.as_api_string()
    }
}

/// Status of a single monitoring execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::EnumIter)]
pub enum ExecutionStatus {
    Pending,
    Completed,
    CompletedWithViolations,
    InProgress,
    Failed,
    Stopping,
    Stopped,
}

impl ExecutionStatus {
    /// Returns the API string representation for this status.
    #[must_use]
    pub const fn as_api_string(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Completed => "Completed",
            Self::CompletedWithViolations => "CompletedWithViolations",
            Self::InProgress => "InProgress",
            Self::Failed => "Failed",
            Self::Stopping => "Stopping",
            Self::Stopped => "Stopped",
        }
    }
}

impl FromStr for ExecutionStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Completed" => Ok(Self::Completed),
            "CompletedWithViolations" => Ok(Self::CompletedWithViolations),
            "InProgress" => Ok(Self::InProgress),
            "Failed" => Ok(Self::Failed),
            "Stopping" => Ok(Self::Stopping),
            "Stopped" => Ok(Self::Stopped),
            _ => Err(anyhow::anyhow!("Invalid monitoring execution status: {s}")),
        }
    }
}

impl Lifecycle for ExecutionStatus {
    fn is_in_progress(&self) -> bool {
        matches!(self, Self::Pending | Self::InProgress | Self::Stopping)
    }

    fn state(&self) -> &'static str {
        self.as_api_string()
    }
}
