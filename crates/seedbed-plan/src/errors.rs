use std::fmt;

use thiserror::Error;

/// Severity level for validation issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueSeverity {
    Error,
    Warning,
}

impl IssueSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueSeverity::Error => "error",
            IssueSeverity::Warning => "warning",
        }
    }
}

/// Structured validation issue with location and hint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub severity: IssueSeverity,
    pub code: String,
    pub path: String,
    pub message: String,
    pub hint: Option<String>,
}

impl ValidationIssue {
    /// Create a new validation issue.
    pub fn new(
        severity: IssueSeverity,
        code: impl Into<String>,
        path: impl Into<String>,
        message: impl Into<String>,
        hint: Option<String>,
    ) -> Self {
        Self {
            severity,
            code: code.into(),
            path: path.into(),
            message: message.into(),
            hint,
        }
    }
}

/// `error [code] /path: message (hint: ...)`
impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] {}: {}",
            self.severity.as_str(),
            self.code,
            self.path,
            self.message
        )?;
        if let Some(hint) = &self.hint {
            write!(f, " (hint: {hint})")?;
        }
        Ok(())
    }
}

/// Aggregated validation report with errors and warnings.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationReport {
    /// Returns true when there are no errors.
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// Add an error issue.
    pub fn push_error(&mut self, issue: ValidationIssue) {
        self.errors.push(issue);
    }

    /// Add a warning issue.
    pub fn push_warning(&mut self, issue: ValidationIssue) {
        self.warnings.push(issue);
    }

    /// Errors first, then warnings.
    pub fn issues(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.errors.iter().chain(&self.warnings)
    }
}

/// Plan loading errors that are not structural issues.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("plan validation failed with {} error(s)", .0.errors.len())]
    Invalid(ValidationReport),
}

/// Result type for plan operations.
pub type Result<T> = std::result::Result<T, PlanError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issues_render_with_severity_code_and_hint() {
        let mut report = ValidationReport::default();
        report.push_warning(ValidationIssue::new(
            IssueSeverity::Warning,
            "empty_steps",
            "/sanitize/0/steps",
            "sanitize job has no steps",
            None,
        ));
        report.push_error(ValidationIssue::new(
            IssueSeverity::Error,
            "invalid_range",
            "/sample/0/rows",
            "rows exceed pool_size",
            Some("lower rows".to_string()),
        ));

        let lines: Vec<String> = report.issues().map(ToString::to_string).collect();
        assert_eq!(
            lines,
            vec![
                "error [invalid_range] /sample/0/rows: rows exceed pool_size (hint: lower rows)",
                "warning [empty_steps] /sanitize/0/steps: sanitize job has no steps",
            ]
        );
        assert!(!report.is_ok());
    }
}
