//! Unique resource names and schedule expressions.

use core::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum length of a SageMaker resource name.
pub const MAX_NAME_LENGTH: usize = 63;

/// Builds a unique resource name by appending a UTC timestamp to `base`.
///
/// The base is truncated so that the result never exceeds [`MAX_NAME_LENGTH`].
/// Hyphens at either end of the base are dropped, so an empty base yields
/// just the timestamp.
#[must_use]
pub fn name_from_base(base: &str, now: DateTime<Utc>) -> String {
    let timestamp = now.format("%Y-%m-%d-%H-%M-%S-%3f").to_string();
    let room = MAX_NAME_LENGTH - timestamp.len() - 1;

    let trimmed: String = base.trim_start_matches('-').chars().take(room).collect();
    let trimmed = trimmed.trim_end_matches('-');

    if trimmed.is_empty() {
        timestamp
    } else {
        format!("{trimmed}-{timestamp}")
    }
}

/// Extracts the resource name from an ARN such as
/// `arn:aws:sagemaker:us-east-1:123456789012:processing-job/baseline-1`.
#[must_use]
pub fn name_from_arn(arn: &str) -> &str {
    arn.rsplit('/').next().unwrap_or(arn)
}

/// Schedule expression for a monitoring schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CronExpression(String);

impl CronExpression {
    /// Runs at the top of every hour.
    #[must_use]
    pub fn hourly() -> Self {
        Self(String::from("cron(0 * ? * * *)"))
    }

    /// Returns the expression as sent to the API.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CronExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
