//! Documents written by the analyzer: baseline statistics and constraints,
//! and the violations found by a monitoring execution.

use serde::{Deserialize, Serialize};

/// File name of a monitoring execution's violations report.
pub const VIOLATIONS_FILE: &str = "constraint_violations.json";

/// Contents of `constraint_violations.json`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ConstraintViolations {
    /// Violations found in the captured traffic
    #[serde(default)]
    pub violations: Vec<ConstraintViolation>,
}

/// A single feature that deviated from the baseline.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ConstraintViolation {
    /// Feature (column) name, e.g. `_c0`
    pub feature_name: String,

    /// Check that failed, e.g. `data_type_check` or `baseline_drift_check`
    pub constraint_check_type: String,

    /// Human readable explanation
    #[serde(default)]
    pub description: String,
}

/// Contents of `constraints.json`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct BaselineConstraints {
    /// Per-feature constraints
    #[serde(default)]
    pub features: Vec<FeatureConstraint>,
}

/// Constraints suggested for one feature.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FeatureConstraint {
    /// Feature name
    pub name: String,

    /// Inferred type (Integral, Fractional, String, Unknown)
    pub inferred_type: String,

    /// Required fraction of non-missing values
    #[serde(default)]
    pub completeness: Option<f64>,

    /// Numerical constraints, present for numeric features
    #[serde(default)]
    pub num_constraints: Option<NumericConstraints>,
}

/// Numerical constraints for a feature.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct NumericConstraints {
    /// Whether every value must be non-negative
    #[serde(default)]
    pub is_non_negative: bool,
}

/// Contents of `statistics.json`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct BaselineStatistics {
    /// Dataset-wide statistics
    #[serde(default)]
    pub dataset: DatasetStatistics,

    /// Per-feature statistics
    #[serde(default)]
    pub features: Vec<FeatureStatistics>,
}

/// Dataset-wide statistics.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DatasetStatistics {
    /// Number of rows analyzed
    #[serde(default)]
    pub item_count: u64,
}

/// Statistics for one feature.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FeatureStatistics {
    /// Feature name
    pub name: String,

    /// Inferred type
    pub inferred_type: String,

    /// Statistics for numeric features
    #[serde(default)]
    pub numerical_statistics: Option<NumericalStatistics>,
}

/// Summary statistics of a numeric feature.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct NumericalStatistics {
    /// Present/missing counts
    #[serde(default)]
    pub common: CommonStatistics,

    pub mean: Option<f64>,
    pub std_dev: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

/// Present/missing counts for a feature.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CommonStatistics {
    #[serde(default)]
    pub num_present: u64,

    #[serde(default)]
    pub num_missing: u64,
}
