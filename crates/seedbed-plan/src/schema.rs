use schemars::schema::RootSchema;
use schemars::schema_for;

use crate::model::SeedPlan;

/// Emit the JSON Schema for seed plan documents.
pub fn plan_json_schema() -> RootSchema {
    schema_for!(SeedPlan)
}
