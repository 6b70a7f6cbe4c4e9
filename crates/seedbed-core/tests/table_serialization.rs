use seedbed_core::{Row, Table, Value};

#[test]
fn serializes_table_deterministically() {
    let table = Table::from_rows(vec![
        Row::new().with("album_id", 3).with("name", "Intro"),
        Row::new().with("album_id", 3).with("name", Value::Empty),
    ]);

    let json = serde_json::to_string(&table).expect("serialize table");
    let expected = r#"{"columns":["album_id","name"],"rows":[{"cells":[["album_id",3],["name","Intro"]]},{"cells":[["album_id",3],["name",null]]}]}"#;
    assert_eq!(json, expected);

    let decoded: Table = serde_json::from_str(&json).expect("deserialize table");
    assert_eq!(decoded, table);
}
