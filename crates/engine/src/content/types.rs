use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Clone)]
pub struct ContentPlanRequest {
    pub enabled_mods: Vec<String>,
    pub compiler_version: String,
}

impl Default for ContentPlanRequest {
    fn default() -> Self {
        Self {
            enabled_mods: Vec::new(),
            compiler_version: "dev".to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ContentPlanError {
    #[error("enabled mod id cannot be empty")]
    EmptyEnabledMod,
    #[error("duplicate enabled mod id in request: {mod_id}")]
    DuplicateEnabledMod { mod_id: String },
    #[error("enabled mod does not exist on disk: {mod_id} at {expected_dir}")]
    EnabledModMissing {
        mod_id: String,
        expected_dir: PathBuf,
    },
    #[error("base content directory is missing: {expected_dir}")]
    BaseContentMissing { expected_dir: PathBuf },
    #[error("failed to read directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read directory entry in {path}: {source}")]
    ReadDirEntry {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
