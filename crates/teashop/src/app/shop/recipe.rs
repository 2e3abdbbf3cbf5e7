use std::collections::{BTreeSet, HashMap};

use engine::{RecipeDef, RecipeDefDatabase, WaterRequirementDef};
use thiserror::Error;
use tracing::warn;

use super::beverage::{TeaKind, WaterTemperature};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RequiredWater {
    /// No water requirement at all.
    None,
    Hot,
    Cold,
}

impl RequiredWater {
    pub(crate) fn temperature(self) -> Option<WaterTemperature> {
        match self {
            Self::None => None,
            Self::Hot => Some(WaterTemperature::Hot),
            Self::Cold => Some(WaterTemperature::Cold),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub(crate) enum RecipeError {
    #[error("recipe '{def_name}' names unknown tea '{tea}'")]
    UnknownTea { def_name: String, tea: String },
}

/// What a customer expects in the cup. Never mutated after loading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Recipe {
    pub(crate) def_name: String,
    pub(crate) display_name: String,
    pub(crate) required_water: RequiredWater,
    pub(crate) tea: Option<TeaKind>,
    pub(crate) requires_full_brew: bool,
    pub(crate) requires_milk: bool,
    pub(crate) requires_ice: bool,
    pub(crate) minimum_ice_count: u32,
    pub(crate) required_toppings: BTreeSet<String>,
}

impl Recipe {
    pub(crate) fn from_def(def: &RecipeDef) -> Result<Self, RecipeError> {
        let tea = match &def.tea {
            Some(name) => Some(TeaKind::from_name(name).ok_or_else(|| RecipeError::UnknownTea {
                def_name: def.def_name.clone(),
                tea: name.clone(),
            })?),
            None => None,
        };
        let required_water = match def.water {
            WaterRequirementDef::None => RequiredWater::None,
            WaterRequirementDef::Hot => RequiredWater::Hot,
            WaterRequirementDef::Cold => RequiredWater::Cold,
        };
        Ok(Self {
            def_name: def.def_name.clone(),
            display_name: def.label.clone(),
            required_water,
            tea,
            requires_full_brew: def.full_brew,
            requires_milk: def
                .milk
                .unwrap_or_else(|| tea.is_some_and(TeaKind::defaults_to_milk)),
            requires_ice: def.ice,
            minimum_ice_count: def.min_ice,
            required_toppings: def.toppings.iter().cloned().collect(),
        })
    }

    #[cfg(test)]
    pub(crate) fn builder(def_name: &str) -> RecipeBuilder {
        RecipeBuilder {
            recipe: Recipe {
                def_name: def_name.to_string(),
                display_name: def_name.to_string(),
                required_water: RequiredWater::None,
                tea: None,
                requires_full_brew: false,
                requires_milk: false,
                requires_ice: false,
                minimum_ice_count: 0,
                required_toppings: BTreeSet::new(),
            },
        }
    }
}

#[cfg(test)]
pub(crate) struct RecipeBuilder {
    recipe: Recipe,
}

#[cfg(test)]
impl RecipeBuilder {
    pub(crate) fn water(mut self, water: RequiredWater) -> Self {
        self.recipe.required_water = water;
        self
    }

    pub(crate) fn tea(mut self, tea: TeaKind) -> Self {
        self.recipe.tea = Some(tea);
        self
    }

    pub(crate) fn full_brew(mut self) -> Self {
        self.recipe.requires_full_brew = true;
        self
    }

    pub(crate) fn milk(mut self) -> Self {
        self.recipe.requires_milk = true;
        self
    }

    pub(crate) fn ice(mut self, minimum: u32) -> Self {
        self.recipe.requires_ice = true;
        self.recipe.minimum_ice_count = minimum;
        self
    }

    pub(crate) fn topping(mut self, topping: &str) -> Self {
        self.recipe.required_toppings.insert(topping.to_string());
        self
    }

    pub(crate) fn build(self) -> Recipe {
        self.recipe
    }
}

#[derive(Debug, Default, Clone)]
pub(crate) struct RecipeBook {
    recipes: Vec<Recipe>,
    index_by_name: HashMap<String, usize>,
}

impl RecipeBook {
    /// Recipes that fail to resolve are skipped with a warning.
    pub(crate) fn from_database(database: &RecipeDefDatabase) -> Self {
        let mut book = Self::default();
        for def in database.recipe_defs() {
            match Recipe::from_def(def) {
                Ok(recipe) => book.insert(recipe),
                Err(error) => warn!(error = %error, "recipe_skipped"),
            }
        }
        book
    }

    pub(crate) fn insert(&mut self, recipe: Recipe) {
        match self.index_by_name.get(&recipe.def_name) {
            Some(&idx) => self.recipes[idx] = recipe,
            None => {
                self.index_by_name
                    .insert(recipe.def_name.clone(), self.recipes.len());
                self.recipes.push(recipe);
            }
        }
    }

    pub(crate) fn get(&self, def_name: &str) -> Option<&Recipe> {
        self.index_by_name
            .get(def_name)
            .and_then(|&idx| self.recipes.get(idx))
    }

    pub(crate) fn len(&self) -> usize {
        self.recipes.len()
    }

    /// Finds the recipe whose display name appears in a line of customer
    /// dialogue. The longest matching name wins so "Iced Matcha Latte" beats
    /// "Matcha Latte".
    pub(crate) fn match_dialogue_line(&self, line: &str) -> Option<&Recipe> {
        let haystack = line.to_lowercase();
        self.recipes
            .iter()
            .filter(|recipe| {
                let needle = recipe.display_name.trim().to_lowercase();
                !needle.is_empty() && haystack.contains(&needle)
            })
            .max_by_key(|recipe| recipe.display_name.trim().len())
    }
}
