//! Seed plan contracts and validation.
//!
//! A plan lists the sample, sanitize and emit jobs for one seeding run.

pub mod errors;
pub mod model;
pub mod schema;
pub mod validate;

pub use errors::{IssueSeverity, PlanError, Result, ValidationIssue, ValidationReport};
pub use model::{
    ClipSpec, DedupeStep, DropColumnStep, DropEqualStep, DuplicateAction, EmailSpec, EmitJob,
    OrdinalStep, PLAN_VERSION, PadEmptyStep, RandomColumnStep, SampleJob, SanitizeJob, SeedPlan,
    StepSpec, TrimStep,
};
pub use schema::plan_json_schema;
pub use validate::{ValidatedPlan, load_plan, validate_plan, validate_plan_json};
