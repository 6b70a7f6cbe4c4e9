//! Paged collection from a search-style source.
//!
//! A [`BatchScraper`] splits one request into fixed-size pages, turns each
//! page into a [`Table`] and keeps a [`CountReport`] alive across the pages
//! of one collection so page transformers can number rows per group.

use std::fmt;
use std::iter::FusedIterator;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde_json::Value as JsonValue;
use tracing::{info, warn};

use seedbed_core::{CountReport, Error, Row, Table, Value};

use crate::errors::GenerationError;
use crate::model::ScrapeReport;
use crate::output::csv::{CsvWriter, WriteMode};
use crate::sampler::RandomSampler;

/// Largest page requested from a source unless configured otherwise.
pub const DEFAULT_PAGE_SIZE_CAP: u64 = 10;

/// Raw response document returned by a [`SearchSource`].
pub type SearchPage = JsonValue;

/// Kinds of catalog items a source can be searched for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemType {
    Artist,
    Album,
    Track,
    Playlist,
    Show,
    Episode,
    Audiobook,
}

impl ItemType {
    pub const ALL: [ItemType; 7] = [
        ItemType::Artist,
        ItemType::Album,
        ItemType::Track,
        ItemType::Playlist,
        ItemType::Show,
        ItemType::Episode,
        ItemType::Audiobook,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ItemType::Artist => "artist",
            ItemType::Album => "album",
            ItemType::Track => "track",
            ItemType::Playlist => "playlist",
            ItemType::Show => "show",
            ItemType::Episode => "episode",
            ItemType::Audiobook => "audiobook",
        }
    }

    /// Key holding this type's results in a response document.
    pub fn result_key(&self) -> &'static str {
        match self {
            ItemType::Artist => "artists",
            ItemType::Album => "albums",
            ItemType::Track => "tracks",
            ItemType::Playlist => "playlists",
            ItemType::Show => "shows",
            ItemType::Episode => "episodes",
            ItemType::Audiobook => "audiobooks",
        }
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemType {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        ItemType::ALL
            .into_iter()
            .find(|kind| kind.as_str() == value)
            .ok_or_else(|| {
                Error::InvalidArgument(format!(
                    "unsupported item type '{value}' (expected one of artist, album, track, \
                     playlist, show, episode, audiobook)"
                ))
            })
    }
}

/// One page request sent to a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub text: String,
    pub item_type: ItemType,
    pub offset: u64,
    pub limit: u64,
    pub market: Option<String>,
}

/// Search-style backend returning one page per call.
pub trait SearchSource {
    fn search(&mut self, query: &SearchQuery) -> Result<SearchPage, GenerationError>;
}

/// Offline source serving pages out of a captured response document.
///
/// The document is shaped like `{ "albums": { "items": [...] } }`; each
/// search returns the `[offset, offset + limit)` slice of the items for
/// the requested type.
#[derive(Debug, Clone)]
pub struct FixtureSource {
    document: JsonValue,
    requests: Vec<SearchQuery>,
}

impl FixtureSource {
    pub fn new(document: JsonValue) -> Self {
        Self {
            document,
            requests: Vec::new(),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, GenerationError> {
        if !path.exists() {
            return Err(Error::SourceUnavailable(format!(
                "fixture not found at: {}",
                path.display()
            ))
            .into());
        }
        let contents = std::fs::read_to_string(path)?;
        Ok(Self::new(serde_json::from_str(&contents)?))
    }

    /// Every query served so far, in order.
    pub fn requests(&self) -> &[SearchQuery] {
        &self.requests
    }
}

impl SearchSource for FixtureSource {
    fn search(&mut self, query: &SearchQuery) -> Result<SearchPage, GenerationError> {
        self.requests.push(query.clone());
        let key = query.item_type.result_key();
        let items = self
            .document
            .get(key)
            .and_then(|results| results.get("items"))
            .and_then(JsonValue::as_array)
            .ok_or_else(|| {
                Error::SourceUnavailable(format!("fixture has no '{key}' results"))
            })?;

        let start = usize::try_from(query.offset)
            .unwrap_or(usize::MAX)
            .min(items.len());
        let end = usize::try_from(query.limit)
            .map(|limit| start.saturating_add(limit))
            .unwrap_or(usize::MAX)
            .min(items.len());

        Ok(serde_json::json!({
            key: {
                "items": &items[start..end],
                "offset": query.offset,
                "limit": query.limit,
                "total": items.len(),
            }
        }))
    }
}

/// A complete collection request, split into pages by the scraper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectRequest {
    pub item_type: ItemType,
    pub limit: u64,
    pub query: Option<String>,
    pub condition: Option<String>,
    pub offset: u64,
    pub market: Option<String>,
    /// Columns counted across pages and shown to the page transformer.
    pub tracked_columns: Vec<String>,
}

impl CollectRequest {
    pub fn new(item_type: ItemType, limit: u64) -> Self {
        Self {
            item_type,
            limit,
            query: None,
            condition: None,
            offset: 0,
            market: None,
            tracked_columns: Vec::new(),
        }
    }

    pub fn query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    /// Extra filter such as `year:2020`, appended after the query.
    pub fn condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    pub fn market(mut self, market: impl Into<String>) -> Self {
        self.market = Some(market.into());
        self
    }

    pub fn tracking<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tracked_columns
            .extend(columns.into_iter().map(Into::into));
        self
    }

    /// `query`, `condition`, or both separated by a space.
    pub fn query_string(&self) -> String {
        match (&self.query, &self.condition) {
            (Some(query), Some(condition)) => format!("{query} {condition}"),
            (Some(query), None) => query.clone(),
            (None, Some(condition)) => condition.clone(),
            (None, None) => String::new(),
        }
    }
}

/// Turns one page of raw items into rows.
///
/// `counts` holds the tracked-column tallies of every earlier page; the
/// scraper records this page's rows after the call returns.
pub trait PageTransformer {
    fn transform(
        &mut self,
        items: &[JsonValue],
        counts: &CountReport,
        sampler: &mut RandomSampler,
    ) -> seedbed_core::Result<Vec<Row>>;

    /// Columns this transformer reads from `counts`. They are tracked in
    /// addition to the request's own.
    fn tracked_columns(&self) -> Vec<String> {
        Vec::new()
    }
}

impl<F> PageTransformer for F
where
    F: FnMut(&[JsonValue], &CountReport, &mut RandomSampler) -> seedbed_core::Result<Vec<Row>>,
{
    fn transform(
        &mut self,
        items: &[JsonValue],
        counts: &CountReport,
        sampler: &mut RandomSampler,
    ) -> seedbed_core::Result<Vec<Row>> {
        self(items, counts, sampler)
    }
}

/// Random foreign key drawn from `[offset, offset + pool_size)` per row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignDraw {
    pub column: String,
    pub offset: i64,
    pub pool_size: u64,
}

/// Per-group position written into `target_column`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageOrdinal {
    pub group_column: String,
    pub target_column: String,
    pub base: i64,
}

/// Declarative page transformer: project item fields, draw foreign keys,
/// then number rows within their group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectionTransformer {
    fields: Vec<(String, String)>,
    foreign: Vec<ForeignDraw>,
    ordinal: Option<PageOrdinal>,
}

impl ProjectionTransformer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy the value at JSON `pointer` (e.g. `/album/name`) into `column`.
    pub fn field(mut self, column: impl Into<String>, pointer: impl Into<String>) -> Self {
        self.fields.push((column.into(), pointer.into()));
        self
    }

    pub fn foreign_key(mut self, column: impl Into<String>, offset: i64, pool_size: u64) -> Self {
        self.foreign.push(ForeignDraw {
            column: column.into(),
            offset,
            pool_size,
        });
        self
    }

    pub fn ordinal(
        mut self,
        group_column: impl Into<String>,
        target_column: impl Into<String>,
        base: i64,
    ) -> Self {
        self.ordinal = Some(PageOrdinal {
            group_column: group_column.into(),
            target_column: target_column.into(),
            base,
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.foreign.is_empty() && self.ordinal.is_none()
    }
}

impl PageTransformer for ProjectionTransformer {
    fn transform(
        &mut self,
        items: &[JsonValue],
        counts: &CountReport,
        sampler: &mut RandomSampler,
    ) -> seedbed_core::Result<Vec<Row>> {
        if let Some(ordinal) = &self.ordinal {
            if !counts.is_tracked(&ordinal.group_column) {
                return Err(Error::InvalidArgument(format!(
                    "ordinal group column '{}' is not tracked",
                    ordinal.group_column
                )));
            }
        }
        // Rows of this page are not in `counts` yet.
        let mut local = counts.clone();
        let mut rows = Vec::with_capacity(items.len());

        for item in items {
            let mut row = if self.fields.is_empty() {
                flatten_item(item)
            } else {
                self.fields
                    .iter()
                    .map(|(column, pointer)| {
                        let value = item.pointer(pointer).map(json_to_value).unwrap_or_default();
                        (column.clone(), value)
                    })
                    .collect()
            };

            for draw in &self.foreign {
                let id = sampler
                    .draw(draw.offset, draw.pool_size, 1, false, false)?
                    .first()
                    .copied()
                    .unwrap_or(draw.offset);
                row.set(draw.column.clone(), Value::Int(id));
            }

            if let Some(ordinal) = &self.ordinal {
                let group = row
                    .get(&ordinal.group_column)
                    .cloned()
                    .ok_or_else(|| Error::MissingColumn(ordinal.group_column.clone()))?;
                let prior = local.observe(&ordinal.group_column, &group);
                let position = ordinal.base.saturating_add(prior as i64);
                row.set(ordinal.target_column.clone(), Value::Int(position));
            }

            rows.push(row);
        }
        Ok(rows)
    }

    fn tracked_columns(&self) -> Vec<String> {
        self.ordinal
            .iter()
            .map(|ordinal| ordinal.group_column.clone())
            .collect()
    }
}

/// Paginates a [`SearchSource`] into row batches.
#[derive(Debug)]
pub struct BatchScraper<S> {
    source: S,
    sampler: RandomSampler,
    page_size_cap: u64,
}

impl<S: SearchSource> BatchScraper<S> {
    pub fn new(source: S, sampler: RandomSampler) -> Self {
        Self {
            source,
            sampler,
            page_size_cap: DEFAULT_PAGE_SIZE_CAP,
        }
    }

    pub fn with_page_size_cap(mut self, cap: u64) -> Self {
        self.page_size_cap = cap;
        self
    }

    pub fn page_size_cap(&self) -> u64 {
        self.page_size_cap
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn into_source(self) -> S {
        self.source
    }

    /// Lazily collect `request.limit` items, one page per iteration.
    pub fn collect<'a>(
        &'a mut self,
        request: CollectRequest,
        transformer: Option<&'a mut dyn PageTransformer>,
    ) -> Result<Batches<'a, S>, GenerationError> {
        if self.page_size_cap == 0 {
            let err = Error::InvalidArgument("page size cap must be positive".to_string());
            return Err(err.into());
        }

        let max_each = request.limit.min(self.page_size_cap);
        let pages = if max_each == 0 {
            0
        } else {
            request.limit.div_ceil(max_each)
        };
        let mut tracked = request.tracked_columns.clone();
        if let Some(transformer) = transformer.as_deref() {
            for column in transformer.tracked_columns() {
                if !tracked.contains(&column) {
                    tracked.push(column);
                }
            }
        }
        let counts = CountReport::tracking(tracked);

        info!(
            item_type = %request.item_type,
            query = %request.query_string(),
            limit = request.limit,
            page_size = max_each,
            pages,
            "collection started"
        );

        Ok(Batches {
            scraper: self,
            transformer,
            request,
            max_each,
            pages,
            next_page: 0,
            counts,
            header: None,
            finished: false,
        })
    }
}

/// Finite, fused sequence of page tables. The first error ends it.
pub struct Batches<'a, S> {
    scraper: &'a mut BatchScraper<S>,
    transformer: Option<&'a mut dyn PageTransformer>,
    request: CollectRequest,
    max_each: u64,
    pages: u64,
    next_page: u64,
    counts: CountReport,
    header: Option<Vec<String>>,
    finished: bool,
}

impl<S: SearchSource> Batches<'_, S> {
    pub fn pages(&self) -> u64 {
        self.pages
    }

    /// Tallies of every page produced so far.
    pub fn counts(&self) -> &CountReport {
        &self.counts
    }

    /// Drain every page into one table.
    pub fn into_table(self) -> Result<Table, GenerationError> {
        let mut table = Table::default();
        for page in self {
            table.extend(page?.into_rows());
        }
        Ok(table)
    }

    /// Drain every page into a CSV file.
    ///
    /// The first page truncates the file and later pages append, unless
    /// `enforce_mode` pins one mode for every page.
    pub fn write_csv(
        mut self,
        path: &Path,
        enforce_mode: Option<WriteMode>,
    ) -> Result<ScrapeReport, GenerationError> {
        let writer = CsvWriter::new(path)?;
        let mut report = ScrapeReport {
            item_type: self.request.item_type.to_string(),
            output: PathBuf::from(path),
            pages: 0,
            rows_written: 0,
            bytes_written: 0,
        };

        let total = self.pages;
        let mut index = 0_u64;
        while let Some(page) = self.next() {
            let page = page?;
            let mode = enforce_mode.unwrap_or(if index == 0 {
                WriteMode::Write
            } else {
                WriteMode::Append
            });
            let remarks = format!("({}/{total})", index + 1);
            report.bytes_written += writer.write(&page, mode, Some(&remarks))?;
            report.rows_written += page.len() as u64;
            report.pages += 1;
            index += 1;
        }

        info!(
            item_type = %report.item_type,
            path = %path.display(),
            pages = report.pages,
            rows = report.rows_written,
            "collection written"
        );
        Ok(report)
    }

    fn fetch(&mut self, page: u64) -> Result<Table, GenerationError> {
        let consumed = page * self.max_each;
        let query = SearchQuery {
            text: self.request.query_string(),
            item_type: self.request.item_type,
            offset: self.request.offset + consumed,
            limit: self.max_each.min(self.request.limit - consumed),
            market: self.request.market.clone(),
        };

        let response = self.scraper.source.search(&query)?;
        let items = page_items(&response, query.item_type)?;

        let rows = match self.transformer.as_mut() {
            Some(transformer) => {
                transformer.transform(&items, &self.counts, &mut self.scraper.sampler)?
            }
            None => items.iter().map(flatten_item).collect(),
        };
        for row in &rows {
            self.counts.observe_row(row);
        }

        let table = self.conform(Table::from_rows(rows), page);
        info!(
            item_type = %query.item_type,
            page = page + 1,
            pages = self.pages,
            offset = query.offset,
            requested = query.limit,
            rows = table.len(),
            "page collected"
        );
        Ok(table)
    }
}

impl<S: SearchSource> Batches<'_, S> {
    /// Lay a page out under the header fixed by the first page with
    /// columns. Columns the first page lacked are dropped with a warning.
    fn conform(&mut self, table: Table, page: u64) -> Table {
        let Some(header) = self.header.clone() else {
            if !table.columns().is_empty() {
                self.header = Some(table.columns().to_vec());
            }
            return table;
        };
        if table.columns() == header.as_slice() {
            return table;
        }

        let extra: Vec<&String> = table
            .columns()
            .iter()
            .filter(|column| !header.contains(column))
            .collect();
        if !extra.is_empty() {
            warn!(
                page = page + 1,
                columns = ?extra,
                "columns missing from the first page dropped"
            );
        }

        let mut conformed = Table::new(header.clone());
        for row in table.into_rows() {
            conformed.push_row(
                header
                    .iter()
                    .map(|column| (column.clone(), row.value(column).clone()))
                    .collect(),
            );
        }
        conformed
    }
}

impl<S: SearchSource> Iterator for Batches<'_, S> {
    type Item = Result<Table, GenerationError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished || self.next_page >= self.pages {
            return None;
        }
        let page = self.next_page;
        self.next_page += 1;

        let result = self.fetch(page);
        if result.is_err() {
            self.finished = true;
        }
        Some(result)
    }
}

impl<S: SearchSource> FusedIterator for Batches<'_, S> {}

/// Non-null items of `item_type` in a response document.
fn page_items(
    response: &JsonValue,
    item_type: ItemType,
) -> Result<Vec<JsonValue>, GenerationError> {
    let key = item_type.result_key();
    let items = response
        .get(key)
        .and_then(|results| results.get("items"))
        .and_then(JsonValue::as_array)
        .ok_or_else(|| {
            Error::SourceUnavailable(format!("response has no '{key}.items' array"))
        })?;
    Ok(items.iter().filter(|item| !item.is_null()).cloned().collect())
}

/// Top-level fields as columns; nested values become compact JSON text.
pub fn flatten_item(item: &JsonValue) -> Row {
    match item {
        JsonValue::Object(fields) => fields
            .iter()
            .map(|(name, value)| (name.clone(), json_to_value(value)))
            .collect(),
        other => Row::new().with("value", json_to_value(other)),
    }
}

pub fn json_to_value(value: &JsonValue) -> Value {
    match value {
        JsonValue::Null => Value::Empty,
        JsonValue::Bool(flag) => Value::Text(flag.to_string()),
        JsonValue::Number(number) => match number.as_i64() {
            Some(int) => Value::Int(int),
            None => number.as_f64().map(Value::Float).unwrap_or_default(),
        },
        JsonValue::String(text) if text.is_empty() => Value::Empty,
        JsonValue::String(text) => Value::Text(text.clone()),
        nested => Value::Text(nested.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn query_string_joins_query_and_condition() {
        let request = CollectRequest::new(ItemType::Track, 5);
        assert_eq!(request.query_string(), "");
        assert_eq!(request.clone().query("love").query_string(), "love");
        assert_eq!(
            request.clone().condition("year:2020").query_string(),
            "year:2020"
        );
        assert_eq!(
            request.query("love").condition("year:2020").query_string(),
            "love year:2020"
        );
    }

    #[test]
    fn item_types_parse_and_pluralise() {
        let kind: ItemType = "audiobook".parse().expect("parse");
        assert_eq!(kind.result_key(), "audiobooks");
        assert!(matches!(
            "podcast".parse::<ItemType>(),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn flatten_types_scalars_and_serializes_nested_values() {
        let row = flatten_item(&json!({
            "name": "Queen",
            "popularity": 81,
            "score": 0.5,
            "genres": ["rock", "glam"],
            "explicit": false,
            "href": null
        }));
        assert_eq!(row.value("name"), &Value::from("Queen"));
        assert_eq!(row.value("popularity"), &Value::Int(81));
        assert_eq!(row.value("score"), &Value::Float(0.5));
        assert_eq!(row.value("genres"), &Value::from("[\"rock\",\"glam\"]"));
        assert_eq!(row.value("explicit"), &Value::from("false"));
        assert!(row.value("href").is_empty());
    }

    #[test]
    fn projection_numbers_rows_within_a_page() {
        let items = vec![
            json!({"name": "a", "album": {"id": 1}}),
            json!({"name": "b", "album": {"id": 1}}),
            json!({"name": "c", "album": {"id": 2}}),
        ];
        let mut transformer = ProjectionTransformer::new()
            .field("title", "/name")
            .field("album_id", "/album/id")
            .ordinal("album_id", "track_number", 1);
        let mut counts = CountReport::tracking(["album_id"]);
        counts.observe("album_id", &Value::Int(2));
        let mut sampler = RandomSampler::seeded(1);

        let rows = transformer
            .transform(&items, &counts, &mut sampler)
            .expect("transform");
        let numbers: Vec<i64> = rows
            .iter()
            .filter_map(|row| row.value("track_number").as_i64())
            .collect();
        assert_eq!(numbers, vec![1, 2, 2]);
        assert_eq!(counts.seen("album_id", &Value::Int(1)), 0);
    }
}
