mod registry;
mod settings;

use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use seedbed_core::Error as CoreError;
use seedbed_generate::output::csv::WriteMode;
use seedbed_generate::{
    BatchScraper, CollectRequest, EngineOptions, FixtureSource, GenerationError, ItemType,
    PageTransformer, ProjectionTransformer, RandomSampler, SeedEngine,
};
use seedbed_plan::{PlanError, SeedPlan, load_plan, plan_json_schema};

use registry::{RunRecord, init_logging, write_json_atomic, write_run_record};
use settings::{Settings, SettingsError, load_env_file};

#[derive(Debug, Error)]
enum CliError {
    #[error("registry error: {0}")]
    Registry(#[from] registry::RegistryError),
    #[error("settings error: {0}")]
    Settings(#[from] SettingsError),
    #[error("plan error: {0}")]
    Plan(#[from] PlanError),
    #[error("generation error: {0}")]
    Generation(#[from] GenerationError),
    #[error("core error: {0}")]
    Core(#[from] CoreError),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

#[derive(Parser, Debug)]
#[command(name = "seedbed", version, about = "Seedbed test data CLI")]
struct Cli {
    /// Settings file (TOML).
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Append NDJSON log events to this file.
    #[arg(long, global = true, value_name = "PATH")]
    log_file: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run every job of a plan: sample, then sanitize, then emit.
    Run(PlanArgs),
    /// Run only the sample jobs of a plan.
    Sample(PlanArgs),
    /// Run only the sanitize jobs of a plan.
    Sanitize(PlanArgs),
    /// Run only the emit jobs of a plan.
    Emit(PlanArgs),
    /// Validate a plan file and print its issues.
    Validate(ValidateArgs),
    /// Print the JSON Schema of the plan format.
    PlanSchema(PlanSchemaArgs),
    /// Collect search results page by page into a CSV file.
    Scrape(ScrapeArgs),
}

#[derive(Args, Debug)]
struct PlanArgs {
    /// Plan file (JSON).
    #[arg(long, value_name = "PATH")]
    plan: PathBuf,
    /// Directory relative job paths resolve against. Defaults to the plan's directory.
    #[arg(long, value_name = "DIR")]
    base_dir: Option<PathBuf>,
    /// Seed overriding the plan and settings.
    #[arg(long)]
    seed: Option<u64>,
    /// Write a JSON run record here.
    #[arg(long, value_name = "PATH")]
    report: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ValidateArgs {
    /// Plan file (JSON).
    #[arg(long, value_name = "PATH")]
    plan: PathBuf,
}

#[derive(Args, Debug)]
struct PlanSchemaArgs {
    /// Write the schema here instead of stdout.
    #[arg(long, value_name = "PATH")]
    out: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ScrapeArgs {
    /// JSON document served as the search source.
    #[arg(long, value_name = "PATH")]
    fixture: PathBuf,
    /// Item type: album, artist, playlist, track, show, episode or audiobook.
    #[arg(long = "type", value_name = "TYPE")]
    item_type: String,
    #[arg(long, default_value = "")]
    query: String,
    #[arg(long)]
    condition: Option<String>,
    #[arg(long, default_value_t = 0)]
    offset: u64,
    #[arg(long)]
    limit: u64,
    #[arg(long)]
    market: Option<String>,
    /// Largest page to request.
    #[arg(long)]
    page_size: Option<u64>,
    #[arg(long)]
    seed: Option<u64>,
    /// Output CSV file.
    #[arg(long, value_name = "PATH")]
    out: PathBuf,
    /// Write mode for every page: w (truncate) or a (append). Without it the
    /// first page truncates and later pages append.
    #[arg(long)]
    mode: Option<String>,
    /// Projected column, as `column=/json/pointer`.
    #[arg(long = "field", value_name = "COLUMN=POINTER")]
    fields: Vec<String>,
    /// Random foreign key, as `column:offset:pool_size`.
    #[arg(long = "foreign", value_name = "COLUMN:OFFSET:POOL")]
    foreign: Vec<String>,
    /// Per-group ordinal, as `group:target[:base]`.
    #[arg(long, value_name = "GROUP:TARGET[:BASE]")]
    ordinal: Option<String>,
    /// Extra columns whose values are counted across pages.
    #[arg(long = "track", value_name = "COLUMN")]
    tracked: Vec<String>,
    /// Write a JSON run record here.
    #[arg(long, value_name = "PATH")]
    report: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy)]
enum Stage {
    All,
    Sample,
    Sanitize,
    Emit,
}

impl Stage {
    fn command(self) -> &'static str {
        match self {
            Stage::All => "run",
            Stage::Sample => "sample",
            Stage::Sanitize => "sanitize",
            Stage::Emit => "emit",
        }
    }

    /// Keep only the jobs this stage runs.
    fn select(self, mut plan: SeedPlan) -> SeedPlan {
        match self {
            Stage::All => {}
            Stage::Sample => {
                plan.sanitize.clear();
                plan.emit.clear();
            }
            Stage::Sanitize => {
                plan.sample.clear();
                plan.emit.clear();
            }
            Stage::Emit => {
                plan.sample.clear();
                plan.sanitize.clear();
            }
        }
        plan
    }
}

fn main() -> Result<(), CliError> {
    let env_file = load_env_file()?;
    let cli = Cli::parse();
    init_logging(cli.log_file.as_deref())?;
    if let Some(path) = env_file {
        debug!(path = %path.display(), "loaded env file");
    }

    let settings = Settings::load(cli.config.as_deref())?;
    debug!(?settings, "settings loaded");

    match cli.command {
        Command::Run(args) => run_plan(args, Stage::All, &settings),
        Command::Sample(args) => run_plan(args, Stage::Sample, &settings),
        Command::Sanitize(args) => run_plan(args, Stage::Sanitize, &settings),
        Command::Emit(args) => run_plan(args, Stage::Emit, &settings),
        Command::Validate(args) => run_validate(args),
        Command::PlanSchema(args) => run_plan_schema(args),
        Command::Scrape(args) => run_scrape(args, &settings),
    }
}

fn run_plan(args: PlanArgs, stage: Stage, settings: &Settings) -> Result<(), CliError> {
    let started_at = Utc::now();
    let validated = load_plan(&args.plan)?;
    for issue in &validated.warnings {
        warn!(code = %issue.code, path = %issue.path, "{}", issue.message);
    }

    let plan = stage.select(validated.plan);
    let base_dir = match args.base_dir {
        Some(dir) => dir,
        None => plan_dir(&args.plan),
    };
    let seed = args.seed.or(plan.seed).or(settings.seed);
    let engine = SeedEngine::new(EngineOptions {
        base_dir,
        seed,
        email_domains: settings.email_domains.clone(),
        report_path: None,
    });

    info!(
        plan = %args.plan.display(),
        command = stage.command(),
        "starting plan"
    );
    let report = engine.run(&plan)?;
    println!(
        "{}: {} sample, {} sanitize, {} emit job(s) in {} ms (seed {})",
        stage.command(),
        report.samples.len(),
        report.pipelines.len(),
        report.emits.len(),
        report.duration_ms,
        report.seed
    );

    if let Some(path) = &args.report {
        write_record(path, &report.run_id, stage.command(), started_at, &report)?;
    }
    Ok(())
}

fn run_validate(args: ValidateArgs) -> Result<(), CliError> {
    match load_plan(&args.plan) {
        Ok(validated) => {
            for issue in &validated.warnings {
                println!("{issue}");
            }
            println!("plan is valid: {}", args.plan.display());
            Ok(())
        }
        Err(PlanError::Invalid(report)) => {
            for issue in report.issues() {
                println!("{issue}");
            }
            Err(PlanError::Invalid(report).into())
        }
        Err(err) => Err(err.into()),
    }
}

fn run_plan_schema(args: PlanSchemaArgs) -> Result<(), CliError> {
    let schema = plan_json_schema();
    match args.out {
        Some(path) => {
            write_json_atomic(&path, &schema)?;
            info!(path = %path.display(), "plan schema written");
        }
        None => println!("{}", serde_json::to_string_pretty(&schema)?),
    }
    Ok(())
}

fn run_scrape(args: ScrapeArgs, settings: &Settings) -> Result<(), CliError> {
    let started_at = Utc::now();
    let run_id = Uuid::new_v4().to_string();
    let timer = Instant::now();

    let item_type: ItemType = args.item_type.parse()?;
    let mode = args
        .mode
        .as_deref()
        .map(str::parse::<WriteMode>)
        .transpose()?;

    let mut transformer = ProjectionTransformer::new();
    for spec in &args.fields {
        let (column, pointer) = parse_field(spec)?;
        transformer = transformer.field(column, pointer);
    }
    for spec in &args.foreign {
        let (column, offset, pool_size) = parse_foreign(spec)?;
        transformer = transformer.foreign_key(column, offset, pool_size);
    }

    if let Some(spec) = &args.ordinal {
        let (group, target, base) = parse_ordinal(spec)?;
        transformer = transformer.ordinal(group, target, base);
    }

    let mut request = CollectRequest::new(item_type, args.limit)
        .query(args.query.as_str())
        .offset(args.offset)
        .tracking(args.tracked.iter().cloned());
    if let Some(condition) = &args.condition {
        request = request.condition(condition.as_str());
    }
    if let Some(market) = args.market.as_ref().or(settings.market.as_ref()) {
        request = request.market(market.as_str());
    }

    if settings.credentials.is_configured() {
        debug!(credentials = ?settings.credentials, "source credentials present");
    }

    let seed = args
        .seed
        .or(settings.seed)
        .unwrap_or_else(|| RandomSampler::from_entropy().seed());
    let sampler =
        RandomSampler::seeded(seed).with_email_domains(settings.email_domains.iter().cloned());
    let page_size_cap = args.page_size.unwrap_or_else(|| settings.page_size_cap());
    let mut scraper = BatchScraper::new(FixtureSource::from_path(&args.fixture)?, sampler)
        .with_page_size_cap(page_size_cap);

    let transformer = if transformer.is_empty() {
        None
    } else {
        Some(&mut transformer as &mut dyn PageTransformer)
    };
    let report = scraper
        .collect(request, transformer)?
        .write_csv(&args.out, mode)?;

    println!(
        "scrape: {} row(s) in {} page(s) written to {} in {} ms",
        report.rows_written,
        report.pages,
        report.output.display(),
        timer.elapsed().as_millis()
    );

    if let Some(path) = &args.report {
        write_record(path, &run_id, "scrape", started_at, &report)?;
    }
    Ok(())
}

fn parse_field(spec: &str) -> Result<(String, String), CliError> {
    match spec.split_once('=') {
        Some((column, pointer)) if !column.trim().is_empty() && pointer.starts_with('/') => {
            Ok((column.trim().to_string(), pointer.to_string()))
        }
        _ => Err(CliError::InvalidConfig(format!(
            "--field expects column=/json/pointer, got '{spec}'"
        ))),
    }
}

fn parse_foreign(spec: &str) -> Result<(String, i64, u64), CliError> {
    let invalid = || {
        CliError::InvalidConfig(format!(
            "--foreign expects column:offset:pool_size, got '{spec}'"
        ))
    };
    let parts: Vec<&str> = spec.split(':').collect();
    let [column, offset, pool_size] = parts.as_slice() else {
        return Err(invalid());
    };
    if column.trim().is_empty() {
        return Err(invalid());
    }
    let offset = offset.trim().parse().map_err(|_| invalid())?;
    let pool_size = pool_size.trim().parse().map_err(|_| invalid())?;
    Ok((column.trim().to_string(), offset, pool_size))
}

fn parse_ordinal(spec: &str) -> Result<(String, String, i64), CliError> {
    let invalid = || {
        CliError::InvalidConfig(format!(
            "--ordinal expects group:target[:base], got '{spec}'"
        ))
    };
    let parts: Vec<&str> = spec.split(':').collect();
    let (group, target, base) = match parts.as_slice() {
        [group, target] => (*group, *target, 0),
        [group, target, base] => (*group, *target, base.trim().parse().map_err(|_| invalid())?),
        _ => return Err(invalid()),
    };
    if group.trim().is_empty() || target.trim().is_empty() {
        return Err(invalid());
    }
    Ok((group.trim().to_string(), target.trim().to_string(), base))
}

fn plan_dir(plan: &Path) -> PathBuf {
    plan.parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

fn write_record<T: Serialize>(
    path: &Path,
    run_id: &str,
    command: &str,
    started_at: chrono::DateTime<Utc>,
    report: &T,
) -> Result<(), CliError> {
    let record = RunRecord::new(run_id, command, started_at, report);
    write_run_record(path, &record)?;
    info!(path = %path.display(), "run record written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_scrape_arguments() {
        let cli = Cli::try_parse_from([
            "seedbed",
            "--log-file",
            "logs/seedbed.ndjson",
            "scrape",
            "--fixture",
            "fixtures/albums.json",
            "--type",
            "album",
            "--limit",
            "25",
            "--out",
            "raw/albums.csv",
            "--field",
            "album_id=/id",
            "--foreign",
            "label_id:1:50",
            "--ordinal",
            "artist_id:album_no:1",
        ])
        .expect("parse");
        assert_eq!(cli.log_file, Some(PathBuf::from("logs/seedbed.ndjson")));
        let Command::Scrape(args) = cli.command else {
            panic!("expected scrape");
        };
        assert_eq!(args.limit, 25);
        assert_eq!(args.mode, None);
        assert_eq!(args.fields, vec!["album_id=/id".to_string()]);
    }

    #[test]
    fn multi_page_scrape_keeps_every_page_by_default() {
        let mut dir = std::env::temp_dir();
        dir.push(format!("seedbed_cli_scrape_{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).expect("create temp dir");
        let items: Vec<serde_json::Value> = (0..25)
            .map(|idx| serde_json::json!({"id": format!("alb{idx}")}))
            .collect();
        let fixture = dir.join("albums.json");
        std::fs::write(
            &fixture,
            serde_json::json!({"albums": {"items": items}}).to_string(),
        )
        .expect("write fixture");
        let out = dir.join("out.csv");

        let cli = Cli::try_parse_from([
            "seedbed",
            "scrape",
            "--fixture",
            fixture.to_str().expect("utf-8 path"),
            "--type",
            "album",
            "--limit",
            "25",
            "--page-size",
            "10",
            "--out",
            out.to_str().expect("utf-8 path"),
        ])
        .expect("parse");
        let Command::Scrape(args) = cli.command else {
            panic!("expected scrape");
        };
        run_scrape(args, &Settings::default()).expect("scrape");

        let contents = std::fs::read_to_string(&out).expect("read csv");
        assert_eq!(contents.lines().count(), 26);
        assert_eq!(contents.lines().next(), Some("id"));
        assert_eq!(contents.lines().nth(1), Some("alb0"));
        assert_eq!(contents.lines().last(), Some("alb24"));
    }

    #[test]
    fn stage_selection_keeps_only_its_jobs() {
        let plan: SeedPlan = serde_json::from_value(serde_json::json!({
            "plan_version": "0.1",
            "sample": [{"input": "a.csv", "output": "b.csv", "pool_size": 3, "rows": 1}],
            "sanitize": [{"input": "b.csv", "steps": []}],
            "emit": [{"input": "b.csv", "output": "b.sql", "table": "b"}]
        }))
        .expect("plan");

        let emit_only = Stage::Emit.select(plan.clone());
        assert!(emit_only.sample.is_empty());
        assert!(emit_only.sanitize.is_empty());
        assert_eq!(emit_only.emit.len(), 1);

        let all = Stage::All.select(plan);
        assert_eq!(all.sample.len(), 1);
        assert_eq!(all.sanitize.len(), 1);
    }

    #[test]
    fn projection_specs_parse() {
        assert_eq!(
            parse_field("name=/name").expect("field"),
            ("name".to_string(), "/name".to_string())
        );
        assert!(parse_field("name").is_err());
        assert!(parse_field("name=name").is_err());

        assert_eq!(
            parse_foreign("user_id:1:50").expect("foreign"),
            ("user_id".to_string(), 1, 50)
        );
        assert!(parse_foreign("user_id:1").is_err());
        assert!(parse_foreign("user_id:x:50").is_err());

        assert_eq!(
            parse_ordinal("artist_id:album_no").expect("ordinal"),
            ("artist_id".to_string(), "album_no".to_string(), 0)
        );
        assert_eq!(
            parse_ordinal("artist_id:album_no:1").expect("ordinal").2,
            1
        );
        assert!(parse_ordinal(":album_no").is_err());
    }

    #[test]
    fn plan_dir_defaults_to_current_directory() {
        assert_eq!(plan_dir(Path::new("plan.json")), PathBuf::from("."));
        assert_eq!(plan_dir(Path::new("seeds/plan.json")), PathBuf::from("seeds"));
    }
}
