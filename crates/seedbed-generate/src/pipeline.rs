use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use seedbed_core::{CountReport, Error, Result, Table, Value};
use seedbed_plan::DuplicateAction;

use crate::errors::GenerationError;
use crate::input::read_table_csv;
use crate::model::{PipelineReport, StepReport};
use crate::output::csv::write_table_csv;
use crate::sampler::RandomSampler;
use crate::transforms::RowTransform;

/// One table rewrite, applied in caller order.
pub enum PipelineStep {
    /// Repair or remove rows that share a key tuple.
    Dedupe {
        columns: Vec<String>,
        action: DuplicateAction,
        modify_column: Option<String>,
    },
    /// Remove rows whose two columns hold equal values.
    DropEqual { column_a: String, column_b: String },
    /// Clip the textual form of every value in a column.
    Trim { column: String, max_length: usize },
    /// Add a column of independent random draws.
    RandomColumn {
        column: String,
        min: f64,
        max: f64,
        integer: bool,
    },
    DropColumn { column: String },
    /// Run a row transform with a fresh count report.
    Transform {
        transform: Box<dyn RowTransform>,
        tracked_columns: Vec<String>,
    },
    /// Add an empty column, then append blank rows.
    PadEmpty { column: String, extra_rows: usize },
}

impl PipelineStep {
    pub fn dedupe<I, S>(columns: I, action: DuplicateAction) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        PipelineStep::Dedupe {
            columns: columns.into_iter().map(Into::into).collect(),
            action,
            modify_column: None,
        }
    }

    pub fn transform<T, I, S>(transform: T, tracked_columns: I) -> Self
    where
        T: RowTransform + 'static,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        PipelineStep::Transform {
            transform: Box::new(transform),
            tracked_columns: tracked_columns.into_iter().map(Into::into).collect(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            PipelineStep::Dedupe { .. } => "dedupe",
            PipelineStep::DropEqual { .. } => "drop_equal",
            PipelineStep::Trim { .. } => "trim",
            PipelineStep::RandomColumn { .. } => "random_column",
            PipelineStep::DropColumn { .. } => "drop_column",
            PipelineStep::Transform { .. } => "transform",
            PipelineStep::PadEmpty { .. } => "pad_empty",
        }
    }
}

impl fmt::Debug for PipelineStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineStep::Dedupe {
                columns,
                action,
                modify_column,
            } => f
                .debug_struct("Dedupe")
                .field("columns", columns)
                .field("action", action)
                .field("modify_column", modify_column)
                .finish(),
            PipelineStep::DropEqual { column_a, column_b } => f
                .debug_struct("DropEqual")
                .field("column_a", column_a)
                .field("column_b", column_b)
                .finish(),
            PipelineStep::Trim { column, max_length } => f
                .debug_struct("Trim")
                .field("column", column)
                .field("max_length", max_length)
                .finish(),
            PipelineStep::RandomColumn {
                column,
                min,
                max,
                integer,
            } => f
                .debug_struct("RandomColumn")
                .field("column", column)
                .field("min", min)
                .field("max", max)
                .field("integer", integer)
                .finish(),
            PipelineStep::DropColumn { column } => {
                f.debug_struct("DropColumn").field("column", column).finish()
            }
            PipelineStep::Transform {
                transform,
                tracked_columns,
            } => f
                .debug_struct("Transform")
                .field("transform", &transform.name())
                .field("tracked_columns", tracked_columns)
                .finish(),
            PipelineStep::PadEmpty { column, extra_rows } => f
                .debug_struct("PadEmpty")
                .field("column", column)
                .field("extra_rows", extra_rows)
                .finish(),
        }
    }
}

/// Result of a step that did not fail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepOutcome {
    Applied { rows_affected: u64, rows_skipped: u64 },
    NoOp { reason: String },
}

impl StepOutcome {
    pub fn applied(rows_affected: usize) -> Self {
        StepOutcome::Applied {
            rows_affected: rows_affected as u64,
            rows_skipped: 0,
        }
    }

    pub fn no_op(reason: impl Into<String>) -> Self {
        StepOutcome::NoOp {
            reason: reason.into(),
        }
    }

    pub fn is_no_op(&self) -> bool {
        matches!(self, StepOutcome::NoOp { .. })
    }
}

/// Applies ordered steps to a table and persists the result once.
#[derive(Debug, Clone)]
pub struct TablePipeline {
    sampler: RandomSampler,
}

impl TablePipeline {
    pub fn new(sampler: RandomSampler) -> Self {
        Self { sampler }
    }

    pub fn seeded(seed: u64) -> Self {
        Self::new(RandomSampler::seeded(seed))
    }

    pub fn sampler_mut(&mut self) -> &mut RandomSampler {
        &mut self.sampler
    }

    pub fn into_sampler(self) -> RandomSampler {
        self.sampler
    }

    /// Load `path`, apply `steps`, overwrite `path`.
    ///
    /// The file is only rewritten when every step succeeded.
    pub fn run(
        &mut self,
        path: &Path,
        steps: &[PipelineStep],
    ) -> std::result::Result<PipelineReport, GenerationError> {
        let start = Instant::now();
        let mut table = read_table_csv(path)?;
        info!(
            path = %path.display(),
            rows = table.len(),
            columns = table.columns().len(),
            "table loaded"
        );

        let mut report = self.apply(&mut table, steps)?;
        let bytes = write_table_csv(path, &table)?;
        report.input = Some(path.to_path_buf());
        report.duration_ms = start.elapsed().as_millis() as u64;

        info!(
            path = %path.display(),
            rows = report.rows_after,
            bytes,
            duration_ms = report.duration_ms,
            "table saved"
        );
        Ok(report)
    }

    /// Apply `steps` in order. On failure `table` is left as it was.
    pub fn apply(&mut self, table: &mut Table, steps: &[PipelineStep]) -> Result<PipelineReport> {
        let start = Instant::now();
        let mut report = PipelineReport::new(uuid::Uuid::new_v4().to_string());
        report.rows_before = table.len() as u64;

        let mut working = table.clone();
        for (index, step) in steps.iter().enumerate() {
            let outcome = self.apply_step(&mut working, step).inspect_err(|err| {
                warn!(step = index, kind = step.kind(), error = %err, "step failed");
            })?;
            match &outcome {
                StepOutcome::Applied {
                    rows_affected,
                    rows_skipped,
                } => info!(
                    step = index,
                    kind = step.kind(),
                    rows_affected,
                    rows_skipped,
                    rows = working.len(),
                    "step applied"
                ),
                StepOutcome::NoOp { reason } => {
                    warn!(step = index, kind = step.kind(), reason = %reason, "step skipped")
                }
            }
            report.steps.push(StepReport {
                index,
                kind: step.kind().to_string(),
                outcome,
            });
        }

        *table = working;
        report.rows_after = table.len() as u64;
        report.columns = table.columns().to_vec();
        report.duration_ms = start.elapsed().as_millis() as u64;
        Ok(report)
    }

    pub fn apply_step(&mut self, table: &mut Table, step: &PipelineStep) -> Result<StepOutcome> {
        match step {
            PipelineStep::Dedupe {
                columns,
                action,
                modify_column,
            } => dedupe(table, columns, *action, modify_column.as_deref()),
            PipelineStep::DropEqual { column_a, column_b } => {
                drop_equal(table, column_a, column_b)
            }
            PipelineStep::Trim { column, max_length } => trim(table, column, *max_length),
            PipelineStep::RandomColumn {
                column,
                min,
                max,
                integer,
            } => random_column(table, &mut self.sampler, column, *min, *max, *integer),
            PipelineStep::DropColumn { column } => {
                if table.drop_column(column) {
                    Ok(StepOutcome::applied(table.len()))
                } else {
                    Ok(StepOutcome::no_op(format!("column '{column}' not found")))
                }
            }
            PipelineStep::Transform {
                transform,
                tracked_columns,
            } => transform_rows(table, transform.as_ref(), tracked_columns),
            PipelineStep::PadEmpty { column, extra_rows } => {
                if !table.add_column_with(column, |_| Value::Empty) {
                    return Ok(StepOutcome::no_op(format!(
                        "column '{column}' already exists"
                    )));
                }
                table.pad_rows(*extra_rows);
                Ok(StepOutcome::applied(*extra_rows))
            }
        }
    }
}

/// Smallest magnitude outside the `i64` range, as an `f64`.
const I64_LIMIT: f64 = 9_223_372_036_854_775_808.0;

fn dedupe(
    table: &mut Table,
    columns: &[String],
    action: DuplicateAction,
    modify_column: Option<&str>,
) -> Result<StepOutcome> {
    let Some(first) = columns.first() else {
        return Err(Error::InvalidArgument(
            "dedupe requires at least one key column".to_string(),
        ));
    };
    if let Some(missing) = table.first_missing(columns) {
        return Err(Error::MissingColumn(missing.clone()));
    }
    let target = modify_column.unwrap_or(first.as_str());
    if action == DuplicateAction::Modify && !table.has_column(target) {
        return Err(Error::MissingColumn(target.to_string()));
    }

    let mut groups: HashMap<Vec<String>, u64> = HashMap::new();
    let positions: Vec<u64> = table
        .rows()
        .iter()
        .map(|row| {
            let slot = groups.entry(row.key_for(columns)).or_insert(0);
            let position = *slot;
            *slot += 1;
            position
        })
        .collect();

    let duplicates = positions.iter().filter(|position| **position > 0).count();
    if duplicates == 0 {
        return Ok(StepOutcome::no_op("no duplicates"));
    }

    match action {
        DuplicateAction::Remove => {
            table.retain(|idx, _| positions[idx] == 0);
        }
        DuplicateAction::Modify => {
            let keys: Vec<Vec<String>> =
                table.rows().iter().map(|row| row.key_for(columns)).collect();
            let slot = columns.iter().position(|column| column == target);
            let mut taken: HashSet<Vec<String>> = keys.iter().cloned().collect();
            table.update_column(target, |idx, value| {
                if positions[idx] == 0 {
                    return value.clone();
                }
                // Bump the suffix past keys that already exist.
                let mut suffix = positions[idx];
                loop {
                    let candidate = value.with_suffix(&format!("_{suffix}"));
                    let Some(slot) = slot else {
                        return candidate;
                    };
                    let mut key = keys[idx].clone();
                    key[slot] = candidate.key();
                    if taken.insert(key) {
                        return candidate;
                    }
                    suffix += 1;
                }
            });
        }
    }
    Ok(StepOutcome::applied(duplicates))
}

fn drop_equal(table: &mut Table, column_a: &str, column_b: &str) -> Result<StepOutcome> {
    for column in [column_a, column_b] {
        if !table.has_column(column) {
            return Ok(StepOutcome::no_op(format!("column '{column}' not found")));
        }
    }

    // Empty cells never compare equal.
    let removed = table.retain(|_, row| {
        let a = row.value(column_a);
        let b = row.value(column_b);
        a.is_empty() || b.is_empty() || a.key() != b.key()
    });
    if removed == 0 {
        return Ok(StepOutcome::no_op(format!(
            "no rows where '{column_a}' equals '{column_b}'"
        )));
    }
    Ok(StepOutcome::applied(removed))
}

fn trim(table: &mut Table, column: &str, max_length: usize) -> Result<StepOutcome> {
    if max_length == 0 {
        return Err(Error::InvalidArgument(
            "max_length must be a positive integer".to_string(),
        ));
    }
    let mut changed = 0;
    let found = table.update_column(column, |_, value| {
        let clipped = value.truncated(max_length);
        if clipped != *value {
            changed += 1;
        }
        clipped
    });
    if !found {
        return Err(Error::MissingColumn(column.to_string()));
    }
    Ok(StepOutcome::applied(changed))
}

fn random_column(
    table: &mut Table,
    sampler: &mut RandomSampler,
    column: &str,
    min: f64,
    max: f64,
    integer: bool,
) -> Result<StepOutcome> {
    if table.has_column(column) {
        return Ok(StepOutcome::no_op(format!("column '{column}' already exists")));
    }
    if !min.is_finite() || !max.is_finite() {
        return Err(Error::InvalidArgument(format!(
            "random bounds must be finite, got [{min}, {max}]"
        )));
    }
    if min >= max {
        return Err(Error::InvalidRange(format!(
            "min ({min}) must be less than max ({max})"
        )));
    }
    if !(max - min).is_finite() {
        return Err(Error::InvalidRange(format!(
            "span of [{min}, {max}] is not representable"
        )));
    }
    if integer {
        if min.fract() != 0.0 || max.fract() != 0.0 {
            return Err(Error::InvalidArgument(format!(
                "integer random columns need whole-number bounds, got [{min}, {max}]"
            )));
        }
        if min < -I64_LIMIT || max >= I64_LIMIT {
            return Err(Error::InvalidArgument(format!(
                "integer bounds [{min}, {max}] exceed the 64-bit range"
            )));
        }
    }

    let values = (0..table.len())
        .map(|_| {
            if integer {
                sampler.int_in(min as i64, max as i64).map(Value::Int)
            } else {
                sampler.float_in(min, max).map(Value::Float)
            }
        })
        .collect::<Result<Vec<Value>>>()?;
    table.add_column_with(column, |idx| values[idx].clone());
    Ok(StepOutcome::applied(table.len()))
}

fn transform_rows(
    table: &mut Table,
    transform: &dyn RowTransform,
    tracked_columns: &[String],
) -> Result<StepOutcome> {
    let mut counts = CountReport::tracking(tracked_columns.iter().cloned());
    let mut output = Table::new(table.columns().to_vec());
    let mut affected = 0_u64;
    let mut skipped = 0_u64;

    for (idx, row) in table.rows().iter().enumerate() {
        match transform.apply(row.clone(), &counts) {
            Ok(transformed) => {
                counts.apply(&transformed.deltas);
                output.push_row(transformed.row);
                affected += 1;
            }
            Err(Error::RowProcessing { message, .. }) => {
                warn!(
                    row = idx,
                    transform = transform.name(),
                    error = %message,
                    "row kept unchanged"
                );
                output.push_row(row.clone());
                skipped += 1;
            }
            Err(err) => return Err(err),
        }
    }

    *table = output;
    Ok(StepOutcome::Applied {
        rows_affected: affected,
        rows_skipped: skipped,
    })
}

#[cfg(test)]
mod tests {
    use seedbed_core::Row;

    use super::*;
    use crate::transforms::{OrdinalTransform, TransformedRow};

    fn songs() -> Table {
        Table::from_rows(vec![
            Row::new().with("name", "Intro").with("album_id", 1),
            Row::new().with("name", "Intro").with("album_id", 1),
            Row::new().with("name", "Outro").with("album_id", 2),
            Row::new().with("name", "Intro").with("album_id", 1),
        ])
    }

    #[test]
    fn dedupe_modify_suffixes_later_rows() {
        let mut table = songs();
        let mut pipeline = TablePipeline::seeded(1);
        let outcome = pipeline
            .apply_step(
                &mut table,
                &PipelineStep::dedupe(["name", "album_id"], DuplicateAction::Modify),
            )
            .expect("dedupe");

        assert_eq!(outcome, StepOutcome::applied(2));
        let names: Vec<String> = table.rows().iter().map(|row| row.value("name").key()).collect();
        assert_eq!(names, vec!["Intro", "Intro_1", "Outro", "Intro_2"]);
    }

    #[test]
    fn dedupe_modify_skips_suffixes_that_already_exist() {
        let mut table = Table::from_rows(vec![
            Row::new().with("name", "a"),
            Row::new().with("name", "a"),
            Row::new().with("name", "a_1"),
            Row::new().with("name", "a"),
        ]);
        let mut pipeline = TablePipeline::seeded(1);
        pipeline
            .apply_step(
                &mut table,
                &PipelineStep::dedupe(["name"], DuplicateAction::Modify),
            )
            .expect("dedupe");

        let names: Vec<String> = table.rows().iter().map(|row| row.value("name").key()).collect();
        assert_eq!(names, vec!["a", "a_2", "a_1", "a_3"]);
    }

    #[test]
    fn random_bounds_outside_the_numeric_range_are_rejected() {
        let mut table = songs();
        let mut pipeline = TablePipeline::seeded(1);
        let wide = PipelineStep::RandomColumn {
            column: "score".to_string(),
            min: -1e308,
            max: 1e308,
            integer: false,
        };
        assert!(matches!(
            pipeline.apply_step(&mut table, &wide),
            Err(Error::InvalidRange(_))
        ));

        let huge = PipelineStep::RandomColumn {
            column: "plays".to_string(),
            min: 0.0,
            max: 1e19,
            integer: true,
        };
        assert!(matches!(
            pipeline.apply_step(&mut table, &huge),
            Err(Error::InvalidArgument(_))
        ));
        assert!(!table.has_column("score"));
        assert!(!table.has_column("plays"));
    }

    #[test]
    fn random_column_on_existing_column_is_noop_before_validation() {
        let mut table = songs();
        let mut pipeline = TablePipeline::seeded(1);
        let step = PipelineStep::RandomColumn {
            column: "album_id".to_string(),
            min: 5.0,
            max: 1.0,
            integer: true,
        };
        assert!(pipeline.apply_step(&mut table, &step).expect("noop").is_no_op());
    }

    #[test]
    fn dedupe_reports_missing_columns_and_noop() {
        let mut table = songs();
        let mut pipeline = TablePipeline::seeded(1);
        let err = pipeline
            .apply_step(
                &mut table,
                &PipelineStep::dedupe(["genre"], DuplicateAction::Remove),
            )
            .unwrap_err();
        assert_eq!(err, Error::MissingColumn("genre".to_string()));

        let outcome = pipeline
            .apply_step(
                &mut table,
                &PipelineStep::dedupe(["album_id", "name"], DuplicateAction::Remove),
            )
            .expect("dedupe");
        assert_eq!(outcome, StepOutcome::applied(2));
        let again = pipeline
            .apply_step(
                &mut table,
                &PipelineStep::dedupe(["album_id", "name"], DuplicateAction::Remove),
            )
            .expect("dedupe");
        assert_eq!(again, StepOutcome::no_op("no duplicates"));
    }

    #[test]
    fn drop_equal_ignores_empty_cells() {
        let mut table = Table::from_rows(vec![
            Row::new().with("follower", 1).with("followed", 1),
            Row::new().with("follower", 1).with("followed", 2),
            Row::new().with("follower", Value::Empty).with("followed", Value::Empty),
        ]);
        let mut pipeline = TablePipeline::seeded(1);
        let step = PipelineStep::DropEqual {
            column_a: "follower".to_string(),
            column_b: "followed".to_string(),
        };
        assert_eq!(
            pipeline.apply_step(&mut table, &step).expect("drop"),
            StepOutcome::applied(1)
        );
        assert_eq!(table.len(), 2);
        assert!(
            pipeline
                .apply_step(&mut table, &step)
                .expect("drop")
                .is_no_op()
        );
    }

    #[test]
    fn trim_validates_arguments() {
        let mut table = songs();
        let mut pipeline = TablePipeline::seeded(1);
        let zero = PipelineStep::Trim {
            column: "name".to_string(),
            max_length: 0,
        };
        assert!(matches!(
            pipeline.apply_step(&mut table, &zero),
            Err(Error::InvalidArgument(_))
        ));

        let step = PipelineStep::Trim {
            column: "name".to_string(),
            max_length: 3,
        };
        pipeline.apply_step(&mut table, &step).expect("trim");
        assert_eq!(table.rows()[2].value("name"), &Value::from("Out"));
    }

    #[test]
    fn failed_step_leaves_table_untouched() {
        let mut table = songs();
        let before = table.clone();
        let mut pipeline = TablePipeline::seeded(1);
        let steps = vec![
            PipelineStep::DropColumn {
                column: "name".to_string(),
            },
            PipelineStep::RandomColumn {
                column: "plays".to_string(),
                min: 5.0,
                max: 5.0,
                integer: true,
            },
        ];
        let err = pipeline.apply(&mut table, &steps).unwrap_err();
        assert!(matches!(err, Error::InvalidRange(_)));
        assert_eq!(table, before);
    }

    #[test]
    fn transform_skips_row_level_failures() {
        let mut table = Table::from_rows(vec![
            Row::new().with("playlist_id", 1),
            Row::new().with("playlist_id", Value::Empty),
            Row::new().with("playlist_id", 1),
        ]);
        let mut pipeline = TablePipeline::seeded(1);
        let step = PipelineStep::transform(
            OrdinalTransform::new("playlist_id", "position"),
            ["playlist_id"],
        );
        let outcome = pipeline.apply_step(&mut table, &step).expect("transform");

        assert_eq!(
            outcome,
            StepOutcome::Applied {
                rows_affected: 2,
                rows_skipped: 1
            }
        );
        assert_eq!(table.columns(), &["playlist_id".to_string(), "position".to_string()]);
        assert_eq!(table.rows()[0].value("position"), &Value::Int(0));
        assert!(table.rows()[1].value("position").is_empty());
        assert_eq!(table.rows()[2].value("position"), &Value::Int(1));
    }

    #[test]
    fn transform_aborts_on_table_level_errors() {
        let mut table = songs();
        let mut pipeline = TablePipeline::seeded(1);
        let failing = |_: Row, _: &CountReport| -> Result<TransformedRow> {
            Err(Error::MissingColumn("user_id".to_string()))
        };
        let err = pipeline
            .apply(&mut table, &[PipelineStep::transform(failing, ["album_id"])])
            .unwrap_err();
        assert_eq!(err, Error::MissingColumn("user_id".to_string()));
    }

    #[test]
    fn pad_empty_is_noop_when_column_exists() {
        let mut table = songs();
        let mut pipeline = TablePipeline::seeded(1);
        let step = PipelineStep::PadEmpty {
            column: "cover".to_string(),
            extra_rows: 2,
        };
        assert_eq!(
            pipeline.apply_step(&mut table, &step).expect("pad"),
            StepOutcome::applied(2)
        );
        assert_eq!(table.len(), 6);
        assert!(table.rows()[5].is_blank());
        assert!(pipeline.apply_step(&mut table, &step).expect("pad").is_no_op());
        assert_eq!(table.len(), 6);
    }

    #[test]
    fn outcome_serializes_with_status_tag() {
        let json = serde_json::to_value(StepOutcome::no_op("no duplicates")).expect("json");
        assert_eq!(
            json,
            serde_json::json!({"status": "no_op", "reason": "no duplicates"})
        );
    }
}
