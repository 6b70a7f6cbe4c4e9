use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{info, warn};

use seedbed_core::{Error, Value};
use seedbed_plan::{EmitJob, SampleJob, SanitizeJob, SeedPlan};

use crate::errors::GenerationError;
use crate::input::read_csv_rows;
use crate::model::{EmitReport, PipelineReport, RunReport, SampleReport};
use crate::output::csv::write_table_csv;
use crate::output::sql::TableEmitter;
use crate::pipeline::TablePipeline;
use crate::planner::{build_emission_unit, build_steps};
use crate::sampler::RandomSampler;

/// Options for the seed engine.
#[derive(Debug, Clone, Default)]
pub struct EngineOptions {
    /// Relative job paths are resolved against this directory.
    pub base_dir: PathBuf,
    /// Overrides the plan seed when set.
    pub seed: Option<u64>,
    /// Extra placeholder email domains, after the plan's own.
    pub email_domains: Vec<String>,
    /// Where to write the JSON run report, if anywhere.
    pub report_path: Option<PathBuf>,
}

/// Runs the sample, sanitize and emit jobs of a plan, in that order.
#[derive(Debug, Clone)]
pub struct SeedEngine {
    options: EngineOptions,
}

impl SeedEngine {
    pub fn new(options: EngineOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Sampler for `plan`, seeded from the options, the plan, or entropy.
    pub fn sampler_for(&self, plan: &SeedPlan) -> RandomSampler {
        let seed = self
            .options
            .seed
            .or(plan.seed)
            .unwrap_or_else(rand::random);
        RandomSampler::seeded(seed).with_email_domains(
            plan.email_domains
                .iter()
                .chain(&self.options.email_domains)
                .cloned(),
        )
    }

    pub fn run(&self, plan: &SeedPlan) -> Result<RunReport, GenerationError> {
        let start = Instant::now();
        let mut sampler = self.sampler_for(plan);
        let mut report = RunReport::new(uuid::Uuid::new_v4().to_string(), sampler.seed());

        info!(
            run_id = %report.run_id,
            seed = report.seed,
            samples = plan.sample.len(),
            sanitize = plan.sanitize.len(),
            emits = plan.emit.len(),
            "run started"
        );

        let outcome = (|| -> Result<(), GenerationError> {
            for job in &plan.sample {
                report.samples.push(self.run_sample(job, &mut sampler)?);
            }
            for job in &plan.sanitize {
                report.pipelines.push(self.run_sanitize(job, &mut sampler)?);
            }
            for job in &plan.emit {
                report.emits.push(self.run_emit(job)?);
            }
            Ok(())
        })();

        report.duration_ms = start.elapsed().as_millis() as u64;
        match outcome {
            Ok(()) => {
                self.write_report(&report)?;
                info!(
                    run_id = %report.run_id,
                    duration_ms = report.duration_ms,
                    "run completed"
                );
                Ok(report)
            }
            Err(err) => {
                warn!(run_id = %report.run_id, error = %err, "run failed");
                Err(err)
            }
        }
    }

    /// Copy `rows` randomly chosen data rows of `input` to `output`.
    pub fn run_sample(
        &self,
        job: &SampleJob,
        sampler: &mut RandomSampler,
    ) -> Result<SampleReport, GenerationError> {
        let input = self.resolve(&job.input);
        let output = self.resolve(&job.output);
        let count = usize::try_from(job.rows)
            .map_err(|_| Error::InvalidArgument(format!("rows {} is too large", job.rows)))?;

        let positions = sampler.draw(0, job.pool_size, count, true, true)?;
        let mut table = read_csv_rows(&input, &positions)?;
        if table.len() < count {
            warn!(
                path = %input.display(),
                requested = count,
                found = table.len(),
                "input has fewer rows than the sampling pool"
            );
        }

        if let Some(email) = &job.email {
            if !table.has_column(&email.name_column) {
                return Err(Error::MissingColumn(email.name_column.clone()).into());
            }
            let emails: Vec<Value> = table
                .rows()
                .iter()
                .map(|row| {
                    let name = row.value(&email.name_column).key();
                    Value::Text(sampler.random_email(&name))
                })
                .collect();
            if !table.update_column(&email.target_column, |idx, _| emails[idx].clone()) {
                table.add_column_with(&email.target_column, |idx| emails[idx].clone());
            }
        }

        let bytes_written = write_table_csv(&output, &table)?;
        info!(
            input = %input.display(),
            output = %output.display(),
            rows = table.len(),
            bytes = bytes_written,
            "sample written"
        );
        Ok(SampleReport {
            input,
            output,
            rows_requested: job.rows,
            rows_written: table.len() as u64,
            bytes_written,
        })
    }

    /// Rewrite one CSV in place. The sampler stream continues across jobs.
    pub fn run_sanitize(
        &self,
        job: &SanitizeJob,
        sampler: &mut RandomSampler,
    ) -> Result<PipelineReport, GenerationError> {
        let steps = build_steps(&job.steps)?;
        let mut pipeline = TablePipeline::new(sampler.clone());
        let report = pipeline.run(&self.resolve(&job.input), &steps)?;
        *sampler = pipeline.into_sampler();
        Ok(report)
    }

    pub fn run_emit(&self, job: &EmitJob) -> Result<EmitReport, GenerationError> {
        let unit = build_emission_unit(job)?;
        TableEmitter::new().write(&self.resolve(&job.input), &self.resolve(&job.output), &unit)
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.options.base_dir.join(path)
        }
    }

    fn write_report(&self, report: &RunReport) -> Result<(), GenerationError> {
        let Some(path) = &self.options.report_path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, serde_json::to_vec_pretty(report)?)?;
        Ok(())
    }
}
