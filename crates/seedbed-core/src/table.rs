use serde::{Deserialize, Serialize};

use crate::value::Value;

static EMPTY: Value = Value::Empty;

/// Ordered mapping from column name to value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Row {
    cells: Vec<(String, Value)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter.
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(column, value);
        self
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.cells
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    /// Value for `column`, or `Empty` when the column is absent.
    pub fn value(&self, column: &str) -> &Value {
        self.get(column).unwrap_or(&EMPTY)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.get(column).is_some()
    }

    /// Replace the value of an existing column or append a new one.
    pub fn set(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        let column = column.into();
        let value = value.into();
        match self.cells.iter_mut().find(|(name, _)| *name == column) {
            Some((_, slot)) => *slot = value,
            None => self.cells.push((column, value)),
        }
    }

    pub fn remove(&mut self, column: &str) -> Option<Value> {
        let idx = self.cells.iter().position(|(name, _)| name == column)?;
        Some(self.cells.remove(idx).1)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.cells.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// True when every cell is `Empty`.
    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(|(_, value)| value.is_empty())
    }

    /// Tuple of canonical keys for `columns`, used for grouping.
    pub fn key_for(&self, columns: &[String]) -> Vec<String> {
        columns.iter().map(|col| self.value(col).key()).collect()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut row = Row::new();
        for (column, value) in iter {
            row.set(column, value);
        }
        row
    }
}

/// Ordered column set plus ordered rows.
///
/// Every stored row holds exactly the declared columns, in header order.
/// All mutation goes through methods that keep that invariant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        let mut deduped: Vec<String> = Vec::with_capacity(columns.len());
        for column in columns {
            if !deduped.contains(&column) {
                deduped.push(column);
            }
        }
        Self {
            columns: deduped,
            rows: Vec::new(),
        }
    }

    /// Build a table whose header is the union of row keys in first-seen order.
    pub fn from_rows(rows: impl IntoIterator<Item = Row>) -> Self {
        let mut table = Table::default();
        table.extend(rows);
        table
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row(&self, idx: usize) -> Option<&Row> {
        self.rows.get(idx)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|name| name == column)
    }

    /// First column of `columns` that the table lacks.
    pub fn first_missing<'a>(&self, columns: &'a [String]) -> Option<&'a String> {
        columns.iter().find(|col| !self.has_column(col))
    }

    /// Append a row. Unknown columns extend the header and are back-filled
    /// with `Empty` in earlier rows.
    pub fn push_row(&mut self, row: Row) {
        let new_columns: Vec<String> = row
            .names()
            .filter(|name| !self.has_column(name))
            .map(str::to_string)
            .collect();
        for column in new_columns {
            self.declare_column(column, |_| Value::Empty);
        }
        let row = self.normalize(row);
        self.rows.push(row);
    }

    pub fn extend(&mut self, rows: impl IntoIterator<Item = Row>) {
        for row in rows {
            self.push_row(row);
        }
    }

    /// Add a column computed per row. Returns false if it already exists.
    pub fn add_column_with<F>(&mut self, column: &str, fill: F) -> bool
    where
        F: FnMut(usize) -> Value,
    {
        if self.has_column(column) {
            return false;
        }
        self.declare_column(column.to_string(), fill);
        true
    }

    /// Remove a column from the header and every row. Returns false if absent.
    pub fn drop_column(&mut self, column: &str) -> bool {
        let Some(idx) = self.columns.iter().position(|name| name == column) else {
            return false;
        };
        self.columns.remove(idx);
        for row in &mut self.rows {
            row.remove(column);
        }
        true
    }

    /// Apply `update` to every value of `column`. Returns false if absent.
    pub fn update_column<F>(&mut self, column: &str, mut update: F) -> bool
    where
        F: FnMut(usize, &Value) -> Value,
    {
        if !self.has_column(column) {
            return false;
        }
        for (idx, row) in self.rows.iter_mut().enumerate() {
            let next = update(idx, row.value(column));
            row.set(column, next);
        }
        true
    }

    pub fn set_value(&mut self, row_idx: usize, column: &str, value: impl Into<Value>) -> bool {
        if !self.has_column(column) {
            return false;
        }
        match self.rows.get_mut(row_idx) {
            Some(row) => {
                row.set(column, value);
                true
            }
            None => false,
        }
    }

    /// Keep rows for which `keep` returns true; returns the number removed.
    pub fn retain<F>(&mut self, mut keep: F) -> usize
    where
        F: FnMut(usize, &Row) -> bool,
    {
        let before = self.rows.len();
        let mut idx = 0;
        self.rows.retain(|row| {
            let decision = keep(idx, row);
            idx += 1;
            decision
        });
        before - self.rows.len()
    }

    /// Append `count` rows with `Empty` in every column.
    pub fn pad_rows(&mut self, count: usize) {
        let blank: Row = self
            .columns
            .iter()
            .map(|col| (col.clone(), Value::Empty))
            .collect();
        self.rows.extend(std::iter::repeat_n(blank, count));
    }

    /// Replace the rows wholesale, re-deriving any new columns.
    pub fn replace_rows(&mut self, rows: Vec<Row>) {
        self.rows.clear();
        self.extend(rows);
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }

    fn declare_column<F>(&mut self, column: String, mut fill: F)
    where
        F: FnMut(usize) -> Value,
    {
        for (idx, row) in self.rows.iter_mut().enumerate() {
            row.set(column.clone(), fill(idx));
        }
        self.columns.push(column);
    }

    fn normalize(&self, row: Row) -> Row {
        self.columns
            .iter()
            .map(|col| (col.clone(), row.value(col).clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_row_backfills_new_columns() {
        let mut table = Table::new(vec!["a".to_string()]);
        table.push_row(Row::new().with("a", 1));
        table.push_row(Row::new().with("b", "x").with("a", 2));

        assert_eq!(table.columns(), &["a".to_string(), "b".to_string()]);
        assert_eq!(table.rows()[0].value("b"), &Value::Empty);
        let names: Vec<&str> = table.rows()[1].names().collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn pad_rows_fills_every_column() {
        let mut table = Table::from_rows(vec![Row::new().with("a", 1).with("b", 2)]);
        table.pad_rows(2);
        assert_eq!(table.len(), 3);
        assert!(table.rows()[2].is_blank());
        assert_eq!(table.rows()[2].len(), 2);
    }

    #[test]
    fn drop_and_add_column_report_noop() {
        let mut table = Table::from_rows(vec![Row::new().with("a", 1)]);
        assert!(!table.drop_column("missing"));
        assert!(table.add_column_with("b", |idx| Value::Int(idx as i64)));
        assert!(!table.add_column_with("b", |_| Value::Empty));
        assert!(table.drop_column("a"));
        assert_eq!(table.columns(), &["b".to_string()]);
        assert_eq!(table.rows()[0].len(), 1);
    }
}
