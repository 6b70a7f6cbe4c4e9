use std::fs::{File, OpenOptions, create_dir_all};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::{info, warn};

use seedbed_core::{Error, Table};

use crate::errors::GenerationError;

/// Overwrite `path` with the table as CSV, header first.
///
/// Rows are written to a sibling `.tmp` file that replaces the target only
/// once fully flushed, so a failed save leaves the previous file intact.
pub fn write_table_csv(path: &Path, table: &Table) -> Result<u64, GenerationError> {
    ensure_parent_dir(path)?;
    let tmp_path = temp_path(path)?;

    let file = OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .open(&tmp_path)?;
    let bytes = write_records(file, table, true)?;

    std::fs::rename(&tmp_path, path)?;
    Ok(bytes)
}

/// How a [`CsvWriter`] opens its destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Truncate and write a header (`w`).
    Write,
    /// Append rows; header only when the file is absent or empty (`a`).
    Append,
}

impl WriteMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            WriteMode::Write => "w",
            WriteMode::Append => "a",
        }
    }
}

impl FromStr for WriteMode {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "w" | "write" => Ok(WriteMode::Write),
            "a" | "append" => Ok(WriteMode::Append),
            other => Err(Error::InvalidArgument(format!(
                "write mode must be 'w' or 'a', got '{other}'"
            ))),
        }
    }
}

/// Page-oriented CSV writer used while collecting batches.
#[derive(Debug, Clone)]
pub struct CsvWriter {
    path: PathBuf,
}

impl CsvWriter {
    /// Create a writer, making sure the destination directory exists.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, GenerationError> {
        let path = path.into();
        ensure_parent_dir(&path)?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write or append one batch. Empty batches are skipped with a warning.
    pub fn write(
        &self,
        table: &Table,
        mode: WriteMode,
        remarks: Option<&str>,
    ) -> Result<u64, GenerationError> {
        if table.is_empty() || table.columns().is_empty() {
            warn!(path = %self.path.display(), "data set is empty; nothing written");
            return Ok(0);
        }

        let needs_header = match mode {
            WriteMode::Write => true,
            WriteMode::Append => std::fs::metadata(&self.path)
                .map(|meta| meta.len() == 0)
                .unwrap_or(true),
        };

        let file = match mode {
            WriteMode::Write => File::create(&self.path)?,
            WriteMode::Append => OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)?,
        };
        let bytes = write_records(file, table, needs_header)?;

        let action = match mode {
            WriteMode::Write => "written",
            WriteMode::Append => "appended",
        };
        let at = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        info!(
            path = %self.path.display(),
            rows = table.len(),
            bytes,
            at = %at,
            remarks = remarks.unwrap_or(""),
            "csv {action}"
        );
        Ok(bytes)
    }
}

fn write_records(file: File, table: &Table, header: bool) -> Result<u64, GenerationError> {
    let writer = BufWriter::new(file);
    let counting = CountingWriter::new(writer);
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(counting);

    if header {
        writer.write_record(table.columns())?;
    }

    for row in table.rows() {
        let record: Vec<String> = table
            .columns()
            .iter()
            .map(|column| row.value(column).to_csv())
            .collect();
        writer.write_record(&record)?;
    }

    writer.flush()?;
    let mut counting = writer
        .into_inner()
        .map_err(|err| GenerationError::Io(err.into_error()))?;
    counting.flush()?;
    Ok(counting.bytes_written())
}

pub(crate) fn ensure_parent_dir(path: &Path) -> Result<(), GenerationError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            create_dir_all(parent)?;
        }
    }
    Ok(())
}

fn temp_path(path: &Path) -> Result<PathBuf, GenerationError> {
    let file_name = path.file_name().ok_or_else(|| {
        Error::InvalidArgument(format!("invalid CSV path '{}'", path.display()))
    })?;
    let tmp_name = format!("{}.tmp", file_name.to_string_lossy());
    Ok(path.with_file_name(tmp_name))
}

pub(crate) struct CountingWriter<W: Write> {
    inner: W,
    bytes: u64,
}

impl<W: Write> CountingWriter<W> {
    pub(crate) fn new(inner: W) -> Self {
        Self { inner, bytes: 0 }
    }

    pub(crate) fn bytes_written(&self) -> u64 {
        self.bytes
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let size = self.inner.write(buf)?;
        self.bytes = self.bytes.saturating_add(size as u64);
        Ok(size)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}
