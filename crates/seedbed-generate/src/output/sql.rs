use std::fmt;
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::{info, warn};

use seedbed_core::{Error, Result, Row, Table, Value};

use crate::errors::GenerationError;
use crate::input::read_table_csv;
use crate::model::EmitReport;
use crate::output::csv::{CountingWriter, ensure_parent_dir};
use crate::transforms::TableTransform;

/// Everything the emitter needs to render one table.
pub struct EmissionUnit {
    pub table_name: String,
    pub ddl: Option<String>,
    pub drop_columns: Vec<String>,
    pub pre_transform: Option<Box<dyn TableTransform>>,
}

impl EmissionUnit {
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            ddl: None,
            drop_columns: Vec::new(),
            pre_transform: None,
        }
    }

    pub fn with_ddl(mut self, ddl: impl Into<String>) -> Self {
        self.ddl = Some(ddl.into());
        self
    }

    pub fn dropping<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.drop_columns.extend(columns.into_iter().map(Into::into));
        self
    }

    pub fn with_pre_transform<T: TableTransform + 'static>(mut self, transform: T) -> Self {
        self.pre_transform = Some(Box::new(transform));
        self
    }
}

impl fmt::Debug for EmissionUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmissionUnit")
            .field("table_name", &self.table_name)
            .field("ddl", &self.ddl)
            .field("drop_columns", &self.drop_columns)
            .field(
                "pre_transform",
                &self.pre_transform.as_ref().map(|transform| transform.name()),
            )
            .finish()
    }
}

/// Rendered SQL script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmitOutput {
    pub sql: String,
    pub rows_written: u64,
    pub rows_skipped: u64,
}

/// Turns a finished table into a transactional batch of inserts.
#[derive(Debug, Clone, Copy, Default)]
pub struct TableEmitter;

impl TableEmitter {
    pub fn new() -> Self {
        Self
    }

    /// Render `table` as `START TRANSACTION; [ddl] INSERT... COMMIT;`.
    pub fn render(&self, table: Table, unit: &EmissionUnit) -> Result<EmitOutput> {
        if table.is_empty() {
            return Err(Error::EmptyResult(format!(
                "no rows to emit for '{}'",
                unit.table_name
            )));
        }

        let mut table = match &unit.pre_transform {
            Some(transform) => {
                let transformed = transform.apply(table)?;
                if transformed.is_empty() {
                    return Err(Error::EmptyResult(format!(
                        "transform '{}' left no rows for '{}'",
                        transform.name(),
                        unit.table_name
                    )));
                }
                transformed
            }
            None => table,
        };

        for column in &unit.drop_columns {
            if !table.drop_column(column) {
                return Err(Error::MissingColumn(column.clone()));
            }
        }

        let mut sql = String::from("START TRANSACTION;\n");
        if let Some(ddl) = &unit.ddl {
            sql.push_str(ddl);
            sql.push('\n');
        }

        let mut rows_written = 0_u64;
        let mut rows_skipped = 0_u64;
        for (idx, row) in table.rows().iter().enumerate() {
            match insert_statement(&unit.table_name, table.columns(), row, idx) {
                Ok(Some(statement)) => {
                    sql.push_str(&statement);
                    sql.push('\n');
                    rows_written += 1;
                }
                Ok(None) => {
                    warn!(table = %unit.table_name, row = idx, "skipping row: all values are empty");
                    rows_skipped += 1;
                }
                Err(err) if err.is_row_level() => {
                    warn!(table = %unit.table_name, error = %err, "skipping row");
                    rows_skipped += 1;
                }
                Err(err) => return Err(err),
            }
        }
        sql.push_str("COMMIT;\n");

        Ok(EmitOutput {
            sql,
            rows_written,
            rows_skipped,
        })
    }

    /// Read `csv_path`, render it and write the script to `sql_path`.
    pub fn write(
        &self,
        csv_path: &Path,
        sql_path: &Path,
        unit: &EmissionUnit,
    ) -> std::result::Result<EmitReport, GenerationError> {
        let table = read_table_csv(csv_path)?;
        let output = self.render(table, unit)?;

        ensure_parent_dir(sql_path)?;
        let file = OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .open(sql_path)?;
        let mut writer = CountingWriter::new(BufWriter::new(file));
        writer.write_all(output.sql.as_bytes())?;
        writer.flush()?;

        let report = EmitReport {
            table: unit.table_name.clone(),
            output: sql_path.to_path_buf(),
            rows_written: output.rows_written,
            rows_skipped: output.rows_skipped,
            bytes_written: writer.bytes_written(),
        };
        info!(
            table = %report.table,
            path = %sql_path.display(),
            rows_written = report.rows_written,
            rows_skipped = report.rows_skipped,
            bytes = report.bytes_written,
            "sql script written"
        );
        Ok(report)
    }
}

/// `None` when every cell of the row is empty.
fn insert_statement(
    table_name: &str,
    columns: &[String],
    row: &Row,
    idx: usize,
) -> Result<Option<String>> {
    let mut names = Vec::new();
    let mut values = Vec::new();
    for column in columns {
        let value = row.value(column);
        if value.is_empty() {
            continue;
        }
        names.push(column.as_str());
        values.push(sql_literal(value, idx)?);
    }
    if names.is_empty() {
        return Ok(None);
    }
    Ok(Some(format!(
        "INSERT INTO {table_name} ({}) VALUES ({});",
        names.join(", "),
        values.join(", ")
    )))
}

fn sql_literal(value: &Value, idx: usize) -> Result<String> {
    match value {
        Value::Empty => Ok("NULL".to_string()),
        Value::Int(value) => Ok(value.to_string()),
        Value::Float(value) if value.is_finite() => Ok(value.to_string()),
        Value::Float(value) => Err(Error::row(idx, format!("non-finite number {value}"))),
        Value::Text(text) => Ok(format!("'{}'", escape_mysql(text))),
    }
}

/// Backslash escaping as done by MySQL client libraries.
pub fn escape_mysql(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\0' => escaped.push_str("\\0"),
            '\\' => escaped.push_str("\\\\"),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\x1a' => escaped.push_str("\\Z"),
            '\'' => escaped.push_str("\\'"),
            '"' => escaped.push_str("\\\""),
            other => escaped.push(other),
        }
    }
    escaped
}
