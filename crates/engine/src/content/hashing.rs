use std::fs;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use super::types::ContentPlanError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ModInputHash {
    pub xml_file_count: usize,
    pub hash_hex: String,
}

pub(crate) fn hash_enabled_mods_list(mod_ids_in_order: &[String]) -> String {
    let mut hasher = Sha256::new();
    for mod_id in mod_ids_in_order {
        hasher.update(mod_id.as_bytes());
        hasher.update([0u8]);
    }
    to_hex_lower(&hasher.finalize())
}

/// Hash over relative paths and bytes of every XML file under `mod_dir`.
pub(crate) fn hash_mod_xml_inputs(mod_dir: &Path) -> Result<ModInputHash, ContentPlanError> {
    let xml_files = collect_xml_files(mod_dir)?;
    let mut hasher = Sha256::new();
    for (normalized_rel, abs_path) in &xml_files {
        let bytes = fs::read(abs_path).map_err(|source| ContentPlanError::ReadFile {
            path: abs_path.clone(),
            source,
        })?;
        hasher.update(normalized_rel.as_bytes());
        hasher.update([0u8]);
        hasher.update(&bytes);
    }

    Ok(ModInputHash {
        xml_file_count: xml_files.len(),
        hash_hex: to_hex_lower(&hasher.finalize()),
    })
}

/// Fingerprint of a whole content load: the mod list hash followed by every
/// mod's input hash, in load order.
pub(crate) fn content_fingerprint(enabled_mods_hash: &str, input_hashes: &[String]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(enabled_mods_hash.as_bytes());
    for input_hash in input_hashes {
        hasher.update([0u8]);
        hasher.update(input_hash.as_bytes());
    }
    to_hex_lower(&hasher.finalize())
}

fn collect_xml_files(mod_dir: &Path) -> Result<Vec<(String, PathBuf)>, ContentPlanError> {
    let mut files = Vec::<(String, PathBuf)>::new();
    collect_recursive(mod_dir, mod_dir, &mut files)?;
    files.sort_by(|(a, _), (b, _)| a.cmp(b));
    Ok(files)
}

fn collect_recursive(
    root: &Path,
    current: &Path,
    files: &mut Vec<(String, PathBuf)>,
) -> Result<(), ContentPlanError> {
    let entries = fs::read_dir(current).map_err(|source| ContentPlanError::ReadDir {
        path: current.to_path_buf(),
        source,
    })?;

    for entry in entries {
        let entry = entry.map_err(|source| ContentPlanError::ReadDirEntry {
            path: current.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path.is_dir() {
            collect_recursive(root, &path, files)?;
            continue;
        }
        if !is_xml_file(&path) {
            continue;
        }
        let Ok(rel) = path.strip_prefix(root) else {
            continue;
        };
        let normalized = normalize_rel_path(rel);
        files.push((normalized, path));
    }
    Ok(())
}

pub(crate) fn is_xml_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("xml"))
}

pub(crate) fn normalize_rel_path(path: &Path) -> String {
    path.components()
        .map(|component| component.as_os_str().to_string_lossy().to_string())
        .collect::<Vec<_>>()
        .join("/")
}

fn to_hex_lower(bytes: &[u8]) -> String {
    let mut output = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        use std::fmt::Write as _;
        let _ = write!(&mut output, "{byte:02x}");
    }
    output
}
