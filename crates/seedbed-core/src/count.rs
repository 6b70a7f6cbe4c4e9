use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::table::Row;
use crate::value::Value;

/// Running per-column, per-value occurrence tally.
///
/// Counts only grow. A lookup for a value not yet seen returns 0, so the
/// count observed by a row is its 0-based ordinal within its group.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CountReport {
    counts: BTreeMap<String, BTreeMap<String, u64>>,
}

impl CountReport {
    /// Fresh report tracking the given columns.
    pub fn tracking<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let counts = columns
            .into_iter()
            .map(|column| (column.into(), BTreeMap::new()))
            .collect();
        Self { counts }
    }

    pub fn is_tracked(&self, column: &str) -> bool {
        self.counts.contains_key(column)
    }

    pub fn tracked(&self) -> impl Iterator<Item = &str> {
        self.counts.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.counts.values().all(BTreeMap::is_empty)
    }

    /// Occurrences of `value` in `column` seen before now.
    pub fn seen(&self, column: &str, value: &Value) -> u64 {
        self.seen_key(column, &value.key())
    }

    pub fn seen_key(&self, column: &str, key: &str) -> u64 {
        self.counts
            .get(column)
            .and_then(|values| values.get(key))
            .copied()
            .unwrap_or(0)
    }

    pub fn values(&self, column: &str) -> Option<&BTreeMap<String, u64>> {
        self.counts.get(column)
    }

    /// Record one occurrence and return the count before it. Untracked
    /// columns are ignored.
    pub fn observe(&mut self, column: &str, value: &Value) -> u64 {
        let Some(values) = self.counts.get_mut(column) else {
            return 0;
        };
        let slot = values.entry(value.key()).or_insert(0);
        let prior = *slot;
        *slot += 1;
        prior
    }

    /// Deltas for every tracked column present in `row`.
    pub fn deltas_for(&self, row: &Row) -> CountDeltas {
        let mut deltas = CountDeltas::default();
        for column in self.counts.keys() {
            if let Some(value) = row.get(column) {
                deltas.push(column.clone(), value);
            }
        }
        deltas
    }

    pub fn observe_row(&mut self, row: &Row) {
        let deltas = self.deltas_for(row);
        self.apply(&deltas);
    }

    pub fn apply(&mut self, deltas: &CountDeltas) {
        for (column, key) in &deltas.entries {
            if let Some(values) = self.counts.get_mut(column) {
                *values.entry(key.clone()).or_insert(0) += 1;
            }
        }
    }
}

/// Increments a row transform asks the pipeline to apply after it returns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CountDeltas {
    entries: Vec<(String, String)>,
}

impl CountDeltas {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn push(&mut self, column: impl Into<String>, value: &Value) {
        self.entries.push((column.into(), value.key()));
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
