use std::collections::BTreeMap;

use thiserror::Error;
use tracing::{info, warn};

use crate::AppPaths;

use super::compiler::{compile_mod_recipe_defs, ContentCompileError};
use super::database::{RecipeDef, RecipeDefDatabase};
use super::discovery::{discover_mod_sources, ModSource};
use super::hashing::{content_fingerprint, hash_enabled_mods_list, hash_mod_xml_inputs};
use super::pack::{
    pack_path_for, read_recipe_pack, write_recipe_pack, RecipePack, RecipePackMeta,
    RECIPE_PACK_FORMAT_VERSION,
};
use super::types::{ContentPlanError, ContentPlanRequest};

#[derive(Debug, Error)]
pub enum ContentPipelineError {
    #[error(transparent)]
    Plan(#[from] ContentPlanError),
    #[error(transparent)]
    Compile(#[from] ContentCompileError),
}

/// Loads base content plus every enabled mod, reusing cached packs whose
/// inputs are unchanged. A later mod's recipe replaces an earlier one with the
/// same `defName`.
pub fn build_or_load_recipe_database(
    app_paths: &AppPaths,
    request: &ContentPlanRequest,
) -> Result<RecipeDefDatabase, ContentPipelineError> {
    let sources = discover_mod_sources(app_paths, request)?;
    let mod_ids: Vec<String> = sources.iter().map(|source| source.mod_id.clone()).collect();
    let enabled_mods_hash = hash_enabled_mods_list(&mod_ids);

    let mut merged = BTreeMap::<String, RecipeDef>::new();
    let mut input_hashes = Vec::<String>::with_capacity(sources.len());
    let mut compile_count = 0usize;
    let mut cache_hit_count = 0usize;

    for source in &sources {
        let input = hash_mod_xml_inputs(&source.source_dir)?;
        let expected_meta = RecipePackMeta {
            format_version: RECIPE_PACK_FORMAT_VERSION,
            compiler_version: request.compiler_version.clone(),
            mod_id: source.mod_id.clone(),
            mod_load_index: source.mod_load_index,
            input_hash: input.hash_hex.clone(),
        };

        let recipes = match load_cached(app_paths, source, &expected_meta) {
            Some(recipes) => {
                cache_hit_count += 1;
                info!(
                    mod_id = %source.mod_id,
                    mod_load_index = source.mod_load_index,
                    input_hash = %input.hash_hex,
                    recipe_count = recipes.len(),
                    "content_cache_hit"
                );
                recipes
            }
            None => {
                compile_count += 1;
                let recipes = compile_mod_recipe_defs(&source.source_dir, &source.mod_id)?;
                info!(
                    mod_id = %source.mod_id,
                    mod_load_index = source.mod_load_index,
                    xml_file_count = input.xml_file_count,
                    recipe_count = recipes.len(),
                    "content_compiled"
                );
                store_pack(app_paths, source, expected_meta, &recipes);
                recipes
            }
        };

        for recipe in recipes {
            if let Some(previous) = merged.insert(recipe.def_name.clone(), recipe) {
                info!(
                    def_name = %previous.def_name,
                    overridden_by = %source.mod_id,
                    "recipe_def_overridden"
                );
            }
        }
        input_hashes.push(input.hash_hex);
    }

    let fingerprint = content_fingerprint(&enabled_mods_hash, &input_hashes);
    info!(
        total_mods = sources.len(),
        compile_count,
        cache_hit_count,
        recipe_count = merged.len(),
        content_fingerprint = %fingerprint,
        "content_pipeline_summary"
    );

    Ok(RecipeDefDatabase::from_recipe_defs(
        merged.into_values().collect(),
        fingerprint,
    ))
}

fn load_cached(
    app_paths: &AppPaths,
    source: &ModSource,
    expected_meta: &RecipePackMeta,
) -> Option<Vec<RecipeDef>> {
    let pack_path = pack_path_for(&app_paths.cache_dir, &source.mod_id);
    match read_recipe_pack(&pack_path) {
        Ok(Some(pack)) if pack.meta == *expected_meta => Some(pack.recipes),
        Ok(Some(_)) => {
            info!(mod_id = %source.mod_id, "content_cache_stale");
            None
        }
        Ok(None) => None,
        Err(error) => {
            warn!(mod_id = %source.mod_id, error = %error, "content_cache_invalid_rebuilding_mod");
            None
        }
    }
}

fn store_pack(app_paths: &AppPaths, source: &ModSource, meta: RecipePackMeta, recipes: &[RecipeDef]) {
    let pack_path = pack_path_for(&app_paths.cache_dir, &source.mod_id);
    let pack = RecipePack {
        meta,
        recipes: recipes.to_vec(),
    };
    if let Err(error) = write_recipe_pack(&pack_path, &pack) {
        warn!(mod_id = %source.mod_id, error = %error, "content_cache_write_failed");
    }
}
