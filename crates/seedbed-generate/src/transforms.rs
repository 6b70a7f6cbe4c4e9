use seedbed_core::{CountDeltas, CountReport, Error, Result, Row, Table, Value};

/// Row returned by a [`RowTransform`] plus the counts it wants recorded.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformedRow {
    pub row: Row,
    pub deltas: CountDeltas,
}

impl TransformedRow {
    pub fn new(row: Row, deltas: CountDeltas) -> Self {
        Self { row, deltas }
    }

    /// A row that leaves the count report untouched.
    pub fn uncounted(row: Row) -> Self {
        Self {
            row,
            deltas: CountDeltas::none(),
        }
    }
}

/// Pure per-row function that may read counts of earlier rows.
///
/// The pipeline applies `deltas` after the call, so a transform never
/// observes its own row in `counts`.
pub trait RowTransform {
    fn name(&self) -> &str {
        "custom"
    }

    fn apply(&self, row: Row, counts: &CountReport) -> Result<TransformedRow>;
}

impl<F> RowTransform for F
where
    F: Fn(Row, &CountReport) -> Result<TransformedRow>,
{
    fn apply(&self, row: Row, counts: &CountReport) -> Result<TransformedRow> {
        self(row, counts)
    }
}

/// Writes each row's 0-based position within its group.
///
/// `target_column` receives `base + rows already seen with the same
/// group value`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrdinalTransform {
    pub group_column: String,
    pub target_column: String,
    pub base: i64,
}

impl OrdinalTransform {
    pub fn new(group_column: impl Into<String>, target_column: impl Into<String>) -> Self {
        Self {
            group_column: group_column.into(),
            target_column: target_column.into(),
            base: 0,
        }
    }

    pub fn with_base(mut self, base: i64) -> Self {
        self.base = base;
        self
    }
}

impl RowTransform for OrdinalTransform {
    fn name(&self) -> &str {
        "ordinal"
    }

    fn apply(&self, mut row: Row, counts: &CountReport) -> Result<TransformedRow> {
        let group = row
            .get(&self.group_column)
            .cloned()
            .ok_or_else(|| Error::MissingColumn(self.group_column.clone()))?;
        if group.is_empty() {
            return Err(Error::row(
                0,
                format!("'{}' is empty; row has no group", self.group_column),
            ));
        }

        let mut deltas = CountDeltas::none();
        deltas.push(self.group_column.clone(), &group);

        let prior = counts.seen(&self.group_column, &group);
        let ordinal = i64::try_from(prior)
            .ok()
            .and_then(|prior| self.base.checked_add(prior))
            .ok_or_else(|| Error::row(0, "ordinal overflows i64"))?;
        row.set(self.target_column.clone(), Value::Int(ordinal));

        Ok(TransformedRow::new(row, deltas))
    }
}

/// Whole-table rewrite applied before emission.
pub trait TableTransform {
    fn name(&self) -> &str {
        "custom"
    }

    fn apply(&self, table: Table) -> Result<Table>;
}

impl<F> TableTransform for F
where
    F: Fn(Table) -> Result<Table>,
{
    fn apply(&self, table: Table) -> Result<Table> {
        self(table)
    }
}

/// Clips overlong text in one column. Numbers and empties pass through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipColumn {
    pub column: String,
    pub max_length: usize,
}

impl ClipColumn {
    pub fn new(column: impl Into<String>, max_length: usize) -> Self {
        Self {
            column: column.into(),
            max_length,
        }
    }
}

impl TableTransform for ClipColumn {
    fn name(&self) -> &str {
        "clip"
    }

    fn apply(&self, mut table: Table) -> Result<Table> {
        if self.max_length == 0 {
            return Err(Error::InvalidArgument(
                "clip max_length must be positive".to_string(),
            ));
        }
        let max_length = self.max_length;
        let found = table.update_column(&self.column, |_, value| match value {
            Value::Text(text) if text.chars().count() > max_length => {
                Value::Text(text.chars().take(max_length).collect())
            }
            other => other.clone(),
        });
        if !found {
            return Err(Error::MissingColumn(self.column.clone()));
        }
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordinal_reads_prior_counts_without_recording() {
        let transform = OrdinalTransform::new("playlist_id", "position").with_base(1);
        let mut counts = CountReport::tracking(["playlist_id"]);
        counts.observe("playlist_id", &Value::Int(7));

        let row = Row::new().with("playlist_id", 7).with("song_id", 3);
        let out = transform.apply(row, &counts).expect("transform");

        assert_eq!(out.row.value("position"), &Value::Int(2));
        assert_eq!(out.deltas.len(), 1);
        assert_eq!(counts.seen("playlist_id", &Value::Int(7)), 1);
    }

    #[test]
    fn ordinal_rejects_missing_and_empty_groups() {
        let transform = OrdinalTransform::new("playlist_id", "position");
        let counts = CountReport::tracking(["playlist_id"]);

        let missing = transform.apply(Row::new().with("song_id", 1), &counts);
        assert_eq!(
            missing.unwrap_err(),
            Error::MissingColumn("playlist_id".to_string())
        );

        let empty = transform.apply(Row::new().with("playlist_id", Value::Empty), &counts);
        assert!(empty.unwrap_err().is_row_level());
    }

    #[test]
    fn clip_only_touches_long_text() {
        let table = Table::from_rows(vec![
            Row::new().with("bio", "abcdefgh"),
            Row::new().with("bio", 123456789),
            Row::new().with("bio", Value::Empty),
        ]);
        let clipped = ClipColumn::new("bio", 4).apply(table).expect("clip");
        assert_eq!(clipped.rows()[0].value("bio"), &Value::from("abcd"));
        assert_eq!(clipped.rows()[1].value("bio"), &Value::Int(123456789));
        assert!(clipped.rows()[2].value("bio").is_empty());

        let err = ClipColumn::new("missing", 4)
            .apply(Table::default())
            .unwrap_err();
        assert_eq!(err, Error::MissingColumn("missing".to_string()));
    }

    #[test]
    fn closures_are_row_transforms() {
        let upper = |row: Row, _: &CountReport| -> Result<TransformedRow> {
            let name = row.value("name").key().to_uppercase();
            Ok(TransformedRow::uncounted(row.with("name", name)))
        };
        let row = Row::new().with("name", "queen");
        let out = RowTransform::apply(&upper, row, &CountReport::default()).expect("transform");
        assert_eq!(out.row.value("name"), &Value::from("QUEEN"));
        assert_eq!(RowTransform::name(&upper), "custom");
    }
}
