use std::fs;
use std::path::PathBuf;

use seedbed_core::{Error, Result, Row, Table, Value};
use seedbed_generate::{
    EmissionUnit, GenerationError, PipelineStep, TableEmitter, TablePipeline,
};
use seedbed_plan::DuplicateAction;

#[test]
fn deduped_rows_render_as_one_transaction() {
    let mut table = Table::from_rows(vec![
        Row::new().with("a", 1).with("b", 1),
        Row::new().with("a", 1).with("b", 2),
        Row::new().with("a", 1).with("b", 1),
    ]);
    TablePipeline::seeded(1)
        .apply(
            &mut table,
            &[PipelineStep::dedupe(["a", "b"], DuplicateAction::Remove)],
        )
        .expect("dedupe");
    assert_eq!(table.len(), 2);

    let output = TableEmitter::new()
        .render(table, &EmissionUnit::new("t"))
        .expect("render");
    assert_eq!(
        output.sql,
        "START TRANSACTION;\n\
         INSERT INTO t (a, b) VALUES (1, 1);\n\
         INSERT INTO t (a, b) VALUES (1, 2);\n\
         COMMIT;\n"
    );
}

#[test]
fn inserts_list_exactly_the_non_empty_columns() {
    let table = Table::from_rows(vec![
        Row::new()
            .with("id", 1)
            .with("title", Value::Empty)
            .with("cover", "c.png")
            .with("year", Value::Empty),
        Row::new()
            .with("id", Value::Empty)
            .with("title", Value::Empty)
            .with("cover", Value::Empty)
            .with("year", Value::Empty),
        Row::new().with("title", "A Night at the Opera").with("year", 1975),
    ]);
    let output = TableEmitter::new()
        .render(table, &EmissionUnit::new("albums"))
        .expect("render");

    let inserts: Vec<&str> = output
        .sql
        .lines()
        .filter(|line| line.starts_with("INSERT"))
        .collect();
    assert_eq!(
        inserts,
        vec![
            "INSERT INTO albums (id, cover) VALUES (1, 'c.png');",
            "INSERT INTO albums (title, year) VALUES ('A Night at the Opera', 1975);",
        ]
    );
    assert_eq!(output.rows_written, 2);
    assert_eq!(output.rows_skipped, 1);
}

#[test]
fn write_reads_csv_and_creates_output_directories() {
    let dir = temp_out_dir("emit");
    let csv_path = dir.join("users.csv");
    fs::write(
        &csv_path,
        "user_id,name,bio,tmp\n1,Ada,\"says \"\"hi\"\"\",x\n2,O'Neil,,y\n",
    )
    .expect("write csv");
    let sql_path = dir.join("sql").join("nested").join("users.sql");

    let unit = EmissionUnit::new("users")
        .with_ddl("CREATE TABLE IF NOT EXISTS users (user_id INT, name TEXT, bio TEXT);")
        .dropping(["tmp"]);
    let report = TableEmitter::new()
        .write(&csv_path, &sql_path, &unit)
        .expect("write sql");

    let sql = fs::read_to_string(&sql_path).expect("read sql");
    assert_eq!(
        sql,
        "START TRANSACTION;\n\
         CREATE TABLE IF NOT EXISTS users (user_id INT, name TEXT, bio TEXT);\n\
         INSERT INTO users (user_id, name, bio) VALUES (1, 'Ada', 'says \\\"hi\\\"');\n\
         INSERT INTO users (user_id, name) VALUES (2, 'O\\'Neil');\n\
         COMMIT;\n"
    );
    assert_eq!(report.rows_written, 2);
    assert_eq!(report.bytes_written, sql.len() as u64);
}

#[test]
fn pre_transform_runs_before_columns_are_dropped() {
    let table = Table::from_rows(vec![
        Row::new().with("song_id", 1).with("duration", "3:20"),
        Row::new().with("song_id", 2).with("duration", "4:05"),
    ]);
    let to_seconds = |mut table: Table| -> Result<Table> {
        table.add_column_with("seconds", |idx| Value::Int([200, 245][idx]));
        Ok(table)
    };
    let unit = EmissionUnit::new("songs")
        .with_pre_transform(to_seconds)
        .dropping(["duration"]);
    let output = TableEmitter::new().render(table, &unit).expect("render");
    assert!(output.sql.contains("INSERT INTO songs (song_id, seconds) VALUES (1, 200);"));
    assert!(output.sql.contains("INSERT INTO songs (song_id, seconds) VALUES (2, 245);"));
}

#[test]
fn missing_and_empty_inputs_are_fatal() {
    let dir = temp_out_dir("emit_missing");
    let emitter = TableEmitter::new();
    let unit = EmissionUnit::new("t");

    let err = emitter
        .write(&dir.join("absent.csv"), &dir.join("t.sql"), &unit)
        .unwrap_err();
    assert!(matches!(
        err,
        GenerationError::Table(Error::SourceUnavailable(_))
    ));

    let header_only = dir.join("empty.csv");
    fs::write(&header_only, "a,b\n").expect("write csv");
    let err = emitter
        .write(&header_only, &dir.join("t.sql"), &unit)
        .unwrap_err();
    assert!(matches!(err, GenerationError::Table(Error::EmptyResult(_))));
    assert!(!dir.join("t.sql").exists());
}

fn temp_out_dir(label: &str) -> PathBuf {
    let mut dir = std::env::temp_dir();
    dir.push(format!("seedbed_generate_{label}_{}", uuid::Uuid::new_v4()));
    fs::create_dir_all(&dir).expect("create temp out dir");
    dir
}
