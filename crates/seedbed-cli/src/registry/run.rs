use std::path::Path;
use std::process::Command;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{RegistryResult, write_json_atomic};

/// Record written next to a command's outputs when `--report` is given.
#[derive(Debug, Serialize)]
pub struct RunRecord<'a, T: Serialize> {
    pub run_id: String,
    pub command: &'a str,
    pub started_at: String,
    pub finished_at: String,
    pub git: GitInfo,
    pub report: &'a T,
}

impl<'a, T: Serialize> RunRecord<'a, T> {
    pub fn new(
        run_id: impl Into<String>,
        command: &'a str,
        started_at: DateTime<Utc>,
        report: &'a T,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            command,
            started_at: started_at.to_rfc3339(),
            finished_at: Utc::now().to_rfc3339(),
            git: collect_git_info(),
            report,
        }
    }
}

/// Git metadata for reproducibility.
#[derive(Debug, Serialize)]
pub struct GitInfo {
    pub commit: Option<String>,
    pub dirty: Option<bool>,
}

pub fn write_run_record<T: Serialize>(path: &Path, record: &RunRecord<'_, T>) -> RegistryResult<()> {
    write_json_atomic(path, record)
}

pub fn collect_git_info() -> GitInfo {
    let commit = Command::new("git")
        .args(["rev-parse", "HEAD"])
        .output()
        .ok()
        .and_then(|output| {
            if output.status.success() {
                Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
            } else {
                None
            }
        })
        .filter(|value| !value.is_empty());

    let dirty = Command::new("git")
        .args(["status", "--porcelain"])
        .output()
        .ok()
        .filter(|output| output.status.success())
        .map(|output| !output.stdout.is_empty());

    GitInfo { commit, dirty }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_record_wraps_the_report() {
        let report = serde_json::json!({"rows_written": 3});
        let record = RunRecord::new("run-1", "scrape", Utc::now(), &report);
        let value = serde_json::to_value(&record).expect("serialize");
        assert_eq!(value["command"], "scrape");
        assert_eq!(value["report"]["rows_written"], 3);
        assert!(value["git"].get("commit").is_some());
    }
}
