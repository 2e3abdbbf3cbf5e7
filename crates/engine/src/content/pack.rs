use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::atomic_io::write_text_atomic;
use super::database::RecipeDef;

pub(crate) const RECIPE_PACK_FORMAT_VERSION: u32 = 1;

/// Identity a cached pack must match before its recipes are reused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct RecipePackMeta {
    pub format_version: u32,
    pub compiler_version: String,
    pub mod_id: String,
    pub mod_load_index: u32,
    pub input_hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct RecipePack {
    #[serde(flatten)]
    pub meta: RecipePackMeta,
    pub recipes: Vec<RecipeDef>,
}

#[derive(Debug, Error)]
pub(crate) enum RecipePackError {
    #[error("failed to read pack {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to decode pack {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode pack for {mod_id}: {source}")]
    Encode {
        mod_id: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write pack {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

pub(crate) fn pack_path_for(cache_dir: &Path, mod_id: &str) -> PathBuf {
    cache_dir
        .join("recipe_packs")
        .join(format!("{mod_id}.pack.json"))
}

/// `Ok(None)` means no pack exists yet.
pub(crate) fn read_recipe_pack(path: &Path) -> Result<Option<RecipePack>, RecipePackError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(RecipePackError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|source| RecipePackError::Decode {
            path: path.to_path_buf(),
            source,
        })
}

pub(crate) fn write_recipe_pack(path: &Path, pack: &RecipePack) -> Result<(), RecipePackError> {
    let text = serde_json::to_string_pretty(pack).map_err(|source| RecipePackError::Encode {
        mod_id: pack.meta.mod_id.clone(),
        source,
    })?;
    write_text_atomic(path, &text).map_err(|source| RecipePackError::Write {
        path: path.to_path_buf(),
        source,
    })
}
