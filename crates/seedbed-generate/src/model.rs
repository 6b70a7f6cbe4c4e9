use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::pipeline::StepOutcome;

/// Result of one pipeline step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepReport {
    pub index: usize,
    pub kind: String,
    #[serde(flatten)]
    pub outcome: StepOutcome,
}

/// Summary of one pipeline application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineReport {
    pub run_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<PathBuf>,
    pub rows_before: u64,
    pub rows_after: u64,
    pub columns: Vec<String>,
    pub steps: Vec<StepReport>,
    pub duration_ms: u64,
}

impl PipelineReport {
    pub fn new(run_id: String) -> Self {
        Self {
            run_id,
            input: None,
            rows_before: 0,
            rows_after: 0,
            columns: Vec::new(),
            steps: Vec::new(),
            duration_ms: 0,
        }
    }

    /// Number of steps that changed the table.
    pub fn applied_steps(&self) -> usize {
        self.steps
            .iter()
            .filter(|step| matches!(step.outcome, StepOutcome::Applied { .. }))
            .count()
    }
}

/// Summary of one SQL script written by the emitter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmitReport {
    pub table: String,
    pub output: PathBuf,
    pub rows_written: u64,
    pub rows_skipped: u64,
    pub bytes_written: u64,
}

/// Summary of one random row extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleReport {
    pub input: PathBuf,
    pub output: PathBuf,
    pub rows_requested: u64,
    pub rows_written: u64,
    pub bytes_written: u64,
}

/// Summary of one paged collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapeReport {
    pub item_type: String,
    pub output: PathBuf,
    pub pages: u64,
    pub rows_written: u64,
    pub bytes_written: u64,
}

/// Report for a full plan run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub seed: u64,
    pub samples: Vec<SampleReport>,
    pub pipelines: Vec<PipelineReport>,
    pub emits: Vec<EmitReport>,
    pub duration_ms: u64,
}

impl RunReport {
    pub fn new(run_id: String, seed: u64) -> Self {
        Self {
            run_id,
            seed,
            samples: Vec::new(),
            pipelines: Vec::new(),
            emits: Vec::new(),
            duration_ms: 0,
        }
    }
}
