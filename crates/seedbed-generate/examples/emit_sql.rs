use std::env;
use std::path::PathBuf;

use seedbed_generate::{EmissionUnit, TableEmitter};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = env::args().skip(1);
    let csv_path = args.next().map(PathBuf::from).ok_or("missing csv path")?;
    let table = args.next().ok_or("missing table name")?;
    let sql_path = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| csv_path.with_extension("sql"));

    let report = TableEmitter::new().write(&csv_path, &sql_path, &EmissionUnit::new(table))?;
    println!(
        "{} rows written, {} skipped -> {}",
        report.rows_written,
        report.rows_skipped,
        report.output.display()
    );
    Ok(())
}
