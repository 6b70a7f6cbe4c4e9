//! Sampling, sanitizing, scraping and SQL emission for seedbed.
//!
//! Tables flow from a paged search source (`scrape`) into CSV files, are
//! repaired in place by the `pipeline`, and are rendered as transactional
//! insert scripts by `output::sql`.

pub mod engine;
pub mod errors;
pub mod input;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod planner;
pub mod sampler;
pub mod scrape;
pub mod transforms;

pub use engine::{EngineOptions, SeedEngine};
pub use errors::GenerationError;
pub use model::{EmitReport, PipelineReport, RunReport, SampleReport, ScrapeReport, StepReport};
pub use output::sql::{EmissionUnit, EmitOutput, TableEmitter};
pub use pipeline::{PipelineStep, StepOutcome, TablePipeline};
pub use sampler::RandomSampler;
pub use scrape::{
    BatchScraper, CollectRequest, FixtureSource, ItemType, PageTransformer, ProjectionTransformer,
    SearchQuery, SearchSource,
};
pub use transforms::{ClipColumn, OrdinalTransform, RowTransform, TableTransform, TransformedRow};
