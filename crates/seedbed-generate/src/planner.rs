use seedbed_core::Error;
use seedbed_plan::{EmitJob, StepSpec};

use crate::output::sql::EmissionUnit;
use crate::pipeline::PipelineStep;
use crate::transforms::{ClipColumn, OrdinalTransform};

/// Turn declarative plan steps into executable pipeline steps.
pub fn build_steps(specs: &[StepSpec]) -> Result<Vec<PipelineStep>, Error> {
    specs.iter().map(build_step).collect()
}

pub fn build_step(spec: &StepSpec) -> Result<PipelineStep, Error> {
    let step = match spec {
        StepSpec::Dedupe(step) => PipelineStep::Dedupe {
            columns: step.columns.clone(),
            action: step.action,
            modify_column: step.modify_column.clone(),
        },
        StepSpec::DropEqual(step) => PipelineStep::DropEqual {
            column_a: step.column_a.clone(),
            column_b: step.column_b.clone(),
        },
        StepSpec::Trim(step) => PipelineStep::Trim {
            column: step.column.clone(),
            max_length: positive_length(step.max_length)?,
        },
        StepSpec::RandomColumn(step) => PipelineStep::RandomColumn {
            column: step.column.clone(),
            min: step.min,
            max: step.max,
            integer: step.integer,
        },
        StepSpec::DropColumn(step) => PipelineStep::DropColumn {
            column: step.column.clone(),
        },
        StepSpec::Ordinal(step) => PipelineStep::transform(
            OrdinalTransform::new(&step.group_column, &step.target_column).with_base(step.base),
            [step.group_column.clone()],
        ),
        StepSpec::PadEmpty(step) => PipelineStep::PadEmpty {
            column: step.column.clone(),
            extra_rows: usize::try_from(step.extra_rows).map_err(|_| {
                Error::InvalidArgument(format!(
                    "extra_rows must be a non-negative integer, got {}",
                    step.extra_rows
                ))
            })?,
        },
    };
    Ok(step)
}

/// Emission settings for one plan job. The clip, if any, runs as the
/// pre-transform.
pub fn build_emission_unit(job: &EmitJob) -> Result<EmissionUnit, Error> {
    let mut unit = EmissionUnit::new(&job.table).dropping(job.drop_columns.iter().cloned());
    if let Some(ddl) = &job.ddl {
        unit = unit.with_ddl(ddl);
    }
    if let Some(clip) = &job.clip {
        if clip.max_length == 0 {
            return Err(Error::InvalidArgument(
                "clip max_length must be a positive integer".to_string(),
            ));
        }
        unit = unit.with_pre_transform(ClipColumn::new(&clip.column, clip.max_length));
    }
    Ok(unit)
}

fn positive_length(max_length: i64) -> Result<usize, Error> {
    usize::try_from(max_length)
        .ok()
        .filter(|length| *length > 0)
        .ok_or_else(|| {
            Error::InvalidArgument(format!(
                "max_length must be a positive integer, got {max_length}"
            ))
        })
}
