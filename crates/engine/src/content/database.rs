use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecipeDefId(pub u32);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum WaterRequirementDef {
    #[default]
    None,
    Hot,
    Cold,
}

/// A recipe exactly as authored. Tea names stay strings here; the game
/// resolves them against its own tea catalogue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeDef {
    pub def_name: String,
    pub label: String,
    pub water: WaterRequirementDef,
    pub tea: Option<String>,
    pub full_brew: bool,
    pub milk: Option<bool>,
    pub ice: bool,
    pub min_ice: u32,
    pub toppings: Vec<String>,
}

#[derive(Debug, Default, Clone)]
pub struct RecipeDefDatabase {
    recipe_defs: Vec<RecipeDef>,
    recipe_ids_by_name: HashMap<String, RecipeDefId>,
    content_fingerprint: String,
}

impl RecipeDefDatabase {
    /// Ids follow the order of `recipe_defs`.
    pub fn from_recipe_defs(recipe_defs: Vec<RecipeDef>, content_fingerprint: String) -> Self {
        let recipe_ids_by_name = recipe_defs
            .iter()
            .enumerate()
            .map(|(idx, def)| (def.def_name.clone(), RecipeDefId(idx as u32)))
            .collect();
        Self {
            recipe_defs,
            recipe_ids_by_name,
            content_fingerprint,
        }
    }

    pub fn recipe_def_id_by_name(&self, name: &str) -> Option<RecipeDefId> {
        self.recipe_ids_by_name.get(name).copied()
    }

    pub fn recipe_def(&self, id: RecipeDefId) -> Option<&RecipeDef> {
        self.recipe_defs.get(id.0 as usize)
    }

    pub fn recipe_def_by_name(&self, name: &str) -> Option<&RecipeDef> {
        self.recipe_def_id_by_name(name)
            .and_then(|id| self.recipe_def(id))
    }

    pub fn recipe_defs(&self) -> &[RecipeDef] {
        &self.recipe_defs
    }

    pub fn content_fingerprint(&self) -> &str {
        &self.content_fingerprint
    }
}
