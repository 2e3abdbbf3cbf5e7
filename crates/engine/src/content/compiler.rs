use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use roxmltree::{Document, Node};

use super::database::{RecipeDef, WaterRequirementDef};
use super::hashing::{is_xml_file, normalize_rel_path};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentErrorCode {
    ReadFile,
    XmlMalformed,
    InvalidRoot,
    UnknownDefType,
    UnknownField,
    DuplicateField,
    MissingField,
    InvalidValue,
    DuplicateDefInMod,
}

#[derive(Debug, Clone)]
pub struct ContentCompileError {
    pub code: ContentErrorCode,
    pub message: String,
    pub mod_id: String,
    pub file_path: PathBuf,
    pub location: Option<SourceLocation>,
}

impl fmt::Display for ContentCompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.location {
            Some(loc) => write!(
                f,
                "{:?}: {} (mod={}, file={}, line={}, column={})",
                self.code,
                self.message,
                self.mod_id,
                self.file_path.display(),
                loc.line,
                loc.column
            ),
            None => write!(
                f,
                "{:?}: {} (mod={}, file={})",
                self.code,
                self.message,
                self.mod_id,
                self.file_path.display()
            ),
        }
    }
}

impl std::error::Error for ContentCompileError {}

/// Compiles every `<RecipeDef>` found in XML files under `source_dir`.
///
/// Files are visited in normalized relative-path order so the result does not
/// depend on directory iteration order.
pub fn compile_mod_recipe_defs(
    source_dir: &Path,
    mod_id: &str,
) -> Result<Vec<RecipeDef>, ContentCompileError> {
    let xml_files = collect_xml_files_sorted(source_dir)
        .map_err(|error| read_error(mod_id, error.path, error.source))?;
    let mut seen_in_mod = HashSet::<String>::new();
    let mut compiled = Vec::<RecipeDef>::new();

    for xml_file in xml_files {
        let raw = fs::read_to_string(&xml_file)
            .map_err(|source_err| read_error(mod_id, xml_file.clone(), source_err))?;
        for def in parse_defs_document(mod_id, &xml_file, &raw)? {
            if !seen_in_mod.insert(def.def_name.clone()) {
                return Err(ContentCompileError {
                    code: ContentErrorCode::DuplicateDefInMod,
                    message: format!(
                        "duplicate RecipeDef '{}' in mod '{}'; each mod may define a defName only once",
                        def.def_name, mod_id
                    ),
                    mod_id: mod_id.to_string(),
                    file_path: xml_file.clone(),
                    location: None,
                });
            }
            compiled.push(def);
        }
    }

    Ok(compiled)
}

fn parse_defs_document(
    mod_id: &str,
    file_path: &Path,
    raw: &str,
) -> Result<Vec<RecipeDef>, ContentCompileError> {
    let doc = Document::parse(raw).map_err(|error| ContentCompileError {
        code: ContentErrorCode::XmlMalformed,
        message: format!("malformed XML: {error}"),
        mod_id: mod_id.to_string(),
        file_path: file_path.to_path_buf(),
        location: Some(SourceLocation {
            line: error.pos().row as usize,
            column: error.pos().col as usize,
        }),
    })?;

    let ctx = NodeContext {
        mod_id,
        file_path,
        doc: &doc,
    };
    let root = doc.root_element();
    if root.tag_name().name() != "Defs" {
        return Err(ctx.error(
            ContentErrorCode::InvalidRoot,
            "root element must be <Defs>".to_string(),
            root,
        ));
    }

    let mut defs = Vec::<RecipeDef>::new();
    for child in root.children().filter(|node| node.is_element()) {
        if child.tag_name().name() != "RecipeDef" {
            return Err(ctx.error(
                ContentErrorCode::UnknownDefType,
                format!(
                    "unsupported def type <{}>; only <RecipeDef> is supported",
                    child.tag_name().name()
                ),
                child,
            ));
        }
        defs.push(parse_recipe_def(&ctx, child)?);
    }

    Ok(defs)
}

struct NodeContext<'a, 'input> {
    mod_id: &'a str,
    file_path: &'a Path,
    doc: &'a Document<'input>,
}

impl NodeContext<'_, '_> {
    fn error(
        &self,
        code: ContentErrorCode,
        message: String,
        node: Node<'_, '_>,
    ) -> ContentCompileError {
        let pos = self.doc.text_pos_at(node.range().start);
        ContentCompileError {
            code,
            message,
            mod_id: self.mod_id.to_string(),
            file_path: self.file_path.to_path_buf(),
            location: Some(SourceLocation {
                line: pos.row as usize,
                column: pos.col as usize,
            }),
        }
    }

    fn required_text(
        &self,
        node: Node<'_, '_>,
        field_name: &str,
    ) -> Result<String, ContentCompileError> {
        let value = node.text().map(str::trim).unwrap_or_default().to_string();
        if value.is_empty() {
            return Err(self.error(
                ContentErrorCode::MissingField,
                format!("field <{}> must not be empty", field_name),
                node,
            ));
        }
        Ok(value)
    }

    fn parse_bool(&self, node: Node<'_, '_>, field_name: &str) -> Result<bool, ContentCompileError> {
        let value = self.required_text(node, field_name)?;
        match value.as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            _ => Err(self.error(
                ContentErrorCode::InvalidValue,
                format!("{} '{}' must be true or false", field_name, value),
                node,
            )),
        }
    }
}

fn parse_recipe_def(
    ctx: &NodeContext<'_, '_>,
    node: Node<'_, '_>,
) -> Result<RecipeDef, ContentCompileError> {
    let mut seen_fields = HashSet::<String>::new();
    let mut def_name: Option<String> = None;
    let mut label: Option<String> = None;
    let mut water = WaterRequirementDef::None;
    let mut tea: Option<String> = None;
    let mut full_brew = false;
    let mut milk: Option<bool> = None;
    let mut ice = false;
    let mut min_ice = 0u32;
    let mut min_ice_node: Option<Node<'_, '_>> = None;
    let mut toppings = BTreeSet::<String>::new();

    for field in node.children().filter(|child| child.is_element()) {
        let field_name = field.tag_name().name().to_string();
        if !seen_fields.insert(field_name.clone()) {
            return Err(ctx.error(
                ContentErrorCode::DuplicateField,
                format!("duplicate field <{}> in <RecipeDef>", field_name),
                field,
            ));
        }

        match field_name.as_str() {
            "defName" => def_name = Some(ctx.required_text(field, "defName")?),
            "label" => label = Some(ctx.required_text(field, "label")?),
            "water" => {
                let value = ctx.required_text(field, "water")?;
                water = match value.as_str() {
                    "None" => WaterRequirementDef::None,
                    "Hot" => WaterRequirementDef::Hot,
                    "Cold" => WaterRequirementDef::Cold,
                    _ => {
                        return Err(ctx.error(
                            ContentErrorCode::InvalidValue,
                            format!("invalid water '{}'; allowed values: None, Hot, Cold", value),
                            field,
                        ))
                    }
                };
            }
            "tea" => tea = Some(ctx.required_text(field, "tea")?),
            "fullBrew" => full_brew = ctx.parse_bool(field, "fullBrew")?,
            "milk" => milk = Some(ctx.parse_bool(field, "milk")?),
            "ice" => ice = ctx.parse_bool(field, "ice")?,
            "minIce" => {
                let value = ctx.required_text(field, "minIce")?;
                min_ice = value.parse::<u32>().map_err(|_| {
                    ctx.error(
                        ContentErrorCode::InvalidValue,
                        format!("minIce '{}' is not a non-negative integer", value),
                        field,
                    )
                })?;
                min_ice_node = Some(field);
            }
            "toppings" => {
                for item in field.children().filter(|child| child.is_element()) {
                    if item.tag_name().name() != "li" {
                        return Err(ctx.error(
                            ContentErrorCode::UnknownField,
                            format!(
                                "unexpected <{}> in <toppings>; use <li> items",
                                item.tag_name().name()
                            ),
                            item,
                        ));
                    }
                    toppings.insert(ctx.required_text(item, "li")?);
                }
            }
            _ => {
                return Err(ctx.error(
                    ContentErrorCode::UnknownField,
                    format!("unknown field <{}> in <RecipeDef>", field_name),
                    field,
                ))
            }
        }
    }

    let Some(def_name) = def_name else {
        return Err(ctx.error(
            ContentErrorCode::MissingField,
            "missing required field <defName> in <RecipeDef>".to_string(),
            node,
        ));
    };
    let Some(label) = label else {
        return Err(ctx.error(
            ContentErrorCode::MissingField,
            "missing required field <label> in <RecipeDef>".to_string(),
            node,
        ));
    };
    if let Some(min_ice_node) = min_ice_node {
        if min_ice > 0 && !ice {
            return Err(ctx.error(
                ContentErrorCode::InvalidValue,
                "minIce requires <ice>true</ice>".to_string(),
                min_ice_node,
            ));
        }
    }
    if full_brew && tea.is_none() {
        return Err(ctx.error(
            ContentErrorCode::InvalidValue,
            "fullBrew requires a <tea>".to_string(),
            node,
        ));
    }

    Ok(RecipeDef {
        def_name,
        label,
        water,
        tea,
        full_brew,
        milk,
        ice,
        min_ice,
        toppings: toppings.into_iter().collect(),
    })
}

struct ReadError {
    path: PathBuf,
    source: std::io::Error,
}

fn collect_xml_files_sorted(root: &Path) -> Result<Vec<PathBuf>, ReadError> {
    let mut files = Vec::<(String, PathBuf)>::new();
    collect_recursive(root, root, &mut files)?;
    files.sort_by(|(a, _), (b, _)| a.cmp(b));
    Ok(files.into_iter().map(|(_, path)| path).collect())
}

fn collect_recursive(
    root: &Path,
    current: &Path,
    files: &mut Vec<(String, PathBuf)>,
) -> Result<(), ReadError> {
    let entries = fs::read_dir(current).map_err(|source| ReadError {
        path: current.to_path_buf(),
        source,
    })?;
    for entry in entries {
        let entry = entry.map_err(|source| ReadError {
            path: current.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path.is_dir() {
            collect_recursive(root, &path, files)?;
        } else if is_xml_file(&path) {
            let rel = path
                .strip_prefix(root)
                .map(normalize_rel_path)
                .unwrap_or_default();
            files.push((rel, path));
        }
    }
    Ok(())
}

fn read_error(mod_id: &str, path: PathBuf, source: std::io::Error) -> ContentCompileError {
    ContentCompileError {
        code: ContentErrorCode::ReadFile,
        message: format!("failed to read XML content: {source}"),
        mod_id: mod_id.to_string(),
        file_path: path,
        location: None,
    }
}
