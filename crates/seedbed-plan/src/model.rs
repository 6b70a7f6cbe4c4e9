use std::path::PathBuf;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Contract version for seed plan documents.
pub const PLAN_VERSION: &str = "0.1";

/// Canonical plan describing one seeding run.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SeedPlan {
    /// Contract version for the plan format.
    #[serde(default = "default_plan_version")]
    pub plan_version: String,
    /// Seed for reproducibility. A random seed is drawn when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Placeholder email domains appended to the built-in pool.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub email_domains: Vec<String>,
    /// Random row extraction jobs, run first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sample: Vec<SampleJob>,
    /// CSV sanitizing jobs, run in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sanitize: Vec<SanitizeJob>,
    /// SQL emission jobs, run last.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub emit: Vec<EmitJob>,
}

fn default_plan_version() -> String {
    PLAN_VERSION.to_string()
}

/// Copy a random subset of rows from a large CSV.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SampleJob {
    pub input: PathBuf,
    pub output: PathBuf,
    /// Number of data rows eligible for sampling (offsets `0..pool_size`).
    pub pool_size: u64,
    /// Number of rows to extract.
    pub rows: u64,
    /// Optional email derivation for the extracted rows.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<EmailSpec>,
}

/// Derive a placeholder email address from a name column.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct EmailSpec {
    pub name_column: String,
    pub target_column: String,
}

/// Load a CSV, apply steps in order, save once.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SanitizeJob {
    pub input: PathBuf,
    pub steps: Vec<StepSpec>,
}

/// Declarative pipeline step.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepSpec {
    /// Repair or remove rows sharing the same key tuple.
    Dedupe(DedupeStep),
    /// Remove rows where two columns hold equal values.
    DropEqual(DropEqualStep),
    /// Clip the textual form of a column.
    Trim(TrimStep),
    /// Add a column of random numbers.
    RandomColumn(RandomColumnStep),
    /// Remove a column.
    DropColumn(DropColumnStep),
    /// Write each row's position within its group.
    Ordinal(OrdinalStep),
    /// Add an empty column and optionally append blank rows.
    PadEmpty(PadEmptyStep),
}

impl StepSpec {
    /// Stable identifier used in reports and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            StepSpec::Dedupe(_) => "dedupe",
            StepSpec::DropEqual(_) => "drop_equal",
            StepSpec::Trim(_) => "trim",
            StepSpec::RandomColumn(_) => "random_column",
            StepSpec::DropColumn(_) => "drop_column",
            StepSpec::Ordinal(_) => "ordinal",
            StepSpec::PadEmpty(_) => "pad_empty",
        }
    }
}

/// What to do with rows whose key tuple was already seen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateAction {
    /// Suffix `_<n>` onto the modify column.
    #[default]
    Modify,
    /// Drop every row after the first.
    Remove,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DedupeStep {
    pub columns: Vec<String>,
    #[serde(default)]
    pub action: DuplicateAction,
    /// Column receiving the suffix; defaults to the first key column.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modify_column: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DropEqualStep {
    pub column_a: String,
    pub column_b: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TrimStep {
    pub column: String,
    pub max_length: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RandomColumnStep {
    pub column: String,
    pub min: f64,
    pub max: f64,
    /// Integers are drawn from `[min, max]`, reals from `[min, max)`.
    #[serde(default = "default_true")]
    pub integer: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DropColumnStep {
    pub column: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct OrdinalStep {
    /// Column whose value identifies the parent group.
    pub group_column: String,
    /// Column receiving `base + earlier rows in the same group`.
    pub target_column: String,
    #[serde(default)]
    pub base: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PadEmptyStep {
    pub column: String,
    #[serde(default)]
    pub extra_rows: i64,
}

/// Render one CSV as a transactional SQL insert script.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct EmitJob {
    pub input: PathBuf,
    pub output: PathBuf,
    /// Target table name used in `INSERT INTO`.
    pub table: String,
    /// DDL written verbatim after `START TRANSACTION;`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ddl: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub drop_columns: Vec<String>,
    /// Clip an overlong text column before emission.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clip: Option<ClipSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ClipSpec {
    pub column: String,
    pub max_length: usize,
}
