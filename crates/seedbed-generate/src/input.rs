use std::collections::BTreeSet;
use std::path::Path;

use seedbed_core::{Error, Row, Table, Value};

use crate::errors::GenerationError;

/// Load a headered CSV file into a table. Cells are typed per value.
pub fn read_table_csv(path: &Path) -> Result<Table, GenerationError> {
    let mut reader = open_reader(path)?;
    let headers = read_headers(&mut reader)?;

    let mut table = Table::new(headers.clone());
    for record in reader.records() {
        let record = record?;
        table.push_row(row_from_record(&headers, &record));
    }

    Ok(table)
}

/// Load only the data rows at the given 0-based positions (header excluded).
///
/// Positions are matched as a set; rows come back in file order and reading
/// stops after the largest requested position.
pub fn read_csv_rows(path: &Path, positions: &[i64]) -> Result<Table, GenerationError> {
    let wanted: BTreeSet<u64> = positions
        .iter()
        .filter_map(|position| u64::try_from(*position).ok())
        .collect();

    let mut reader = open_reader(path)?;
    let headers = read_headers(&mut reader)?;
    let mut table = Table::new(headers.clone());

    let Some(last) = wanted.last().copied() else {
        return Ok(table);
    };

    for (position, record) in reader.records().enumerate() {
        let position = position as u64;
        if position > last {
            break;
        }
        let record = record?;
        if wanted.contains(&position) {
            table.push_row(row_from_record(&headers, &record));
        }
    }

    Ok(table)
}

fn open_reader(path: &Path) -> Result<csv::Reader<std::fs::File>, GenerationError> {
    if !path.is_file() {
        return Err(Error::SourceUnavailable(format!(
            "CSV file not found at: {}",
            path.display()
        ))
        .into());
    }
    let reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)?;
    Ok(reader)
}

fn read_headers(reader: &mut csv::Reader<std::fs::File>) -> Result<Vec<String>, GenerationError> {
    Ok(reader
        .headers()?
        .iter()
        .map(|header| header.to_string())
        .collect())
}

fn row_from_record(headers: &[String], record: &csv::StringRecord) -> Row {
    headers
        .iter()
        .zip(record.iter())
        .map(|(header, cell)| (header.clone(), Value::parse_cell(cell)))
        .collect()
}
