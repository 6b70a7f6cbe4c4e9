use std::collections::HashSet;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::errors::{IssueSeverity, PlanError, ValidationIssue, ValidationReport};
use crate::model::{
    DuplicateAction, EmitJob, PLAN_VERSION, SampleJob, SanitizeJob, SeedPlan, StepSpec,
};

static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier regex is valid")
});

/// Validated plan with accumulated warnings.
#[derive(Debug, Clone)]
pub struct ValidatedPlan {
    pub plan: SeedPlan,
    pub warnings: Vec<ValidationIssue>,
}

/// Read a plan file from disk and validate it.
pub fn load_plan(path: &Path) -> Result<ValidatedPlan, PlanError> {
    let contents = std::fs::read_to_string(path)?;
    let json: Value = serde_json::from_str(&contents)?;
    validate_plan_json(&json).map_err(PlanError::Invalid)
}

/// Parse a plan JSON document and validate it end-to-end.
pub fn validate_plan_json(plan_json: &Value) -> Result<ValidatedPlan, ValidationReport> {
    let plan: SeedPlan = match serde_json::from_value(plan_json.clone()) {
        Ok(plan) => plan,
        Err(err) => {
            let mut report = ValidationReport::default();
            report.push_error(ValidationIssue::new(
                IssueSeverity::Error,
                "invalid_plan_json",
                "/",
                err.to_string(),
                None,
            ));
            return Err(report);
        }
    };

    let report = validate_plan(&plan);
    if !report.is_ok() {
        return Err(report);
    }

    Ok(ValidatedPlan {
        plan,
        warnings: report.warnings,
    })
}

/// Semantic validation of a parsed plan.
pub fn validate_plan(plan: &SeedPlan) -> ValidationReport {
    let mut report = ValidationReport::default();

    if plan.plan_version != PLAN_VERSION {
        report.push_error(ValidationIssue::new(
            IssueSeverity::Error,
            "plan_version_mismatch",
            "/plan_version",
            format!(
                "plan_version '{}' is not supported (expected '{PLAN_VERSION}')",
                plan.plan_version
            ),
            None,
        ));
    }

    if plan.sample.is_empty() && plan.sanitize.is_empty() && plan.emit.is_empty() {
        report.push_warning(ValidationIssue::new(
            IssueSeverity::Warning,
            "plan_empty",
            "/",
            "plan has no jobs".to_string(),
            Some("add sample, sanitize or emit jobs".to_string()),
        ));
    }

    validate_email_domains(&plan.email_domains, &mut report);

    for (idx, job) in plan.sample.iter().enumerate() {
        validate_sample_job(job, &format!("/sample/{idx}"), &mut report);
    }
    for (idx, job) in plan.sanitize.iter().enumerate() {
        validate_sanitize_job(job, &format!("/sanitize/{idx}"), &mut report);
    }

    let mut outputs = HashSet::new();
    for (idx, job) in plan.emit.iter().enumerate() {
        let base_path = format!("/emit/{idx}");
        validate_emit_job(job, &base_path, &mut report);
        if !outputs.insert(job.output.clone()) {
            report.push_error(ValidationIssue::new(
                IssueSeverity::Error,
                "duplicate_output",
                format!("{base_path}/output"),
                format!("output '{}' is written by more than one job", job.output.display()),
                Some("give each emit job its own output file".to_string()),
            ));
        }
    }

    report
}

fn validate_email_domains(domains: &[String], report: &mut ValidationReport) {
    for (idx, domain) in domains.iter().enumerate() {
        if domain.contains('@') || !domain.contains('.') {
            report.push_warning(ValidationIssue::new(
                IssueSeverity::Warning,
                "invalid_domain",
                format!("/email_domains/{idx}"),
                format!("'{domain}' does not look like a mail domain"),
                Some("use a bare domain such as example.com".to_string()),
            ));
        }
    }
}

fn validate_sample_job(job: &SampleJob, base_path: &str, report: &mut ValidationReport) {
    if job.pool_size == 0 {
        report.push_error(ValidationIssue::new(
            IssueSeverity::Error,
            "invalid_range",
            format!("{base_path}/pool_size"),
            "pool_size must be greater than zero".to_string(),
            None,
        ));
    }
    if job.rows > job.pool_size {
        report.push_error(ValidationIssue::new(
            IssueSeverity::Error,
            "invalid_range",
            format!("{base_path}/rows"),
            format!(
                "cannot draw {} distinct rows from a pool of {}",
                job.rows, job.pool_size
            ),
            Some("lower rows or raise pool_size".to_string()),
        ));
    }
}

fn validate_sanitize_job(job: &SanitizeJob, base_path: &str, report: &mut ValidationReport) {
    if job.steps.is_empty() {
        report.push_warning(ValidationIssue::new(
            IssueSeverity::Warning,
            "empty_steps",
            format!("{base_path}/steps"),
            "sanitize job has no steps; the file is rewritten unchanged".to_string(),
            None,
        ));
    }

    for (idx, step) in job.steps.iter().enumerate() {
        let path = format!("{base_path}/steps/{idx}");
        validate_step(step, &path, report);
    }
}

fn validate_step(step: &StepSpec, path: &str, report: &mut ValidationReport) {
    match step {
        StepSpec::Dedupe(step) => {
            if step.columns.is_empty() {
                report.push_error(invalid_argument(
                    format!("{path}/columns"),
                    "dedupe requires at least one key column",
                ));
            }
            if step.action == DuplicateAction::Remove && step.modify_column.is_some() {
                report.push_warning(ValidationIssue::new(
                    IssueSeverity::Warning,
                    "unused_modify_column",
                    format!("{path}/modify_column"),
                    "modify_column is ignored when action is remove".to_string(),
                    None,
                ));
            }
        }
        StepSpec::DropEqual(step) => {
            if step.column_a == step.column_b {
                report.push_error(invalid_argument(
                    path.to_string(),
                    "drop_equal would remove every row when both columns are the same",
                ));
            }
        }
        StepSpec::Trim(step) => {
            if step.max_length <= 0 {
                report.push_error(invalid_argument(
                    format!("{path}/max_length"),
                    "max_length must be a positive integer",
                ));
            }
        }
        StepSpec::RandomColumn(step) => {
            if step.min >= step.max {
                report.push_error(ValidationIssue::new(
                    IssueSeverity::Error,
                    "invalid_range",
                    path.to_string(),
                    format!("min ({}) must be less than max ({})", step.min, step.max),
                    None,
                ));
            }
            if step.integer && (step.min.fract() != 0.0 || step.max.fract() != 0.0) {
                report.push_error(invalid_argument(
                    path.to_string(),
                    "integer random columns need whole-number bounds",
                ));
            }
        }
        StepSpec::DropColumn(_) => {}
        StepSpec::Ordinal(step) => {
            if step.group_column == step.target_column {
                report.push_warning(ValidationIssue::new(
                    IssueSeverity::Warning,
                    "ordinal_overwrites_group",
                    path.to_string(),
                    "target_column overwrites the group column".to_string(),
                    None,
                ));
            }
        }
        StepSpec::PadEmpty(step) => {
            if step.extra_rows < 0 {
                report.push_error(invalid_argument(
                    format!("{path}/extra_rows"),
                    "extra_rows must be a non-negative integer",
                ));
            }
        }
    }
}

fn validate_emit_job(job: &EmitJob, base_path: &str, report: &mut ValidationReport) {
    if !IDENTIFIER.is_match(&job.table) {
        report.push_error(ValidationIssue::new(
            IssueSeverity::Error,
            "invalid_identifier",
            format!("{base_path}/table"),
            format!("'{}' is not a valid SQL table name", job.table),
            Some("use letters, digits and underscores".to_string()),
        ));
    }
    for (idx, column) in job.drop_columns.iter().enumerate() {
        if column.is_empty() {
            report.push_error(invalid_argument(
                format!("{base_path}/drop_columns/{idx}"),
                "drop column name is empty",
            ));
        }
    }
    if let Some(clip) = &job.clip {
        if clip.max_length == 0 {
            report.push_error(invalid_argument(
                format!("{base_path}/clip/max_length"),
                "clip max_length must be a positive integer",
            ));
        }
    }
}

fn invalid_argument(path: String, message: &str) -> ValidationIssue {
    ValidationIssue::new(
        IssueSeverity::Error,
        "invalid_argument",
        path,
        message.to_string(),
        None,
    )
}
