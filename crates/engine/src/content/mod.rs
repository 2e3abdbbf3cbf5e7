mod atomic_io;
mod compiler;
mod database;
mod discovery;
mod hashing;
mod pack;
mod pipeline;
mod types;

pub use compiler::{
    compile_mod_recipe_defs, ContentCompileError, ContentErrorCode, SourceLocation,
};
pub use database::{RecipeDef, RecipeDefDatabase, RecipeDefId, WaterRequirementDef};
pub use pipeline::{build_or_load_recipe_database, ContentPipelineError};
pub use types::{ContentPlanError, ContentPlanRequest};
