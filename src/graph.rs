//! Recipe catalog with a producer index

use std::collections::{BTreeSet, HashMap};

use crate::error::{PlannerError, Result};
use crate::models::Recipe;

/// All known recipes plus an index from item to the recipes that output it.
///
/// Recipes are stored in insertion order and the producer lists follow that
/// order, so iteration never depends on hash ordering.
#[derive(Debug, Clone, Default)]
pub struct RecipeGraph {
    recipes: Vec<Recipe>,
    by_name: HashMap<String, usize>,
    producers: HashMap<String, Vec<usize>>,
}

impl RecipeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a recipe, replacing any recipe with the same name.
    ///
    /// A replaced recipe keeps its original position; its old outputs are
    /// dropped from the index before the new ones are added.
    pub fn add_recipe(&mut self, recipe: Recipe) -> Result<()> {
        recipe.validate()?;

        let slot = match self.by_name.get(&recipe.name) {
            Some(&slot) => {
                for (item, _) in &self.recipes[slot].outputs {
                    if let Some(list) = self.producers.get_mut(item) {
                        list.retain(|&i| i != slot);
                        if list.is_empty() {
                            self.producers.remove(item);
                        }
                    }
                }
                self.recipes[slot] = recipe;
                slot
            }
            None => {
                let slot = self.recipes.len();
                self.by_name.insert(recipe.name.clone(), slot);
                self.recipes.push(recipe);
                slot
            }
        };

        for (item, qty) in &self.recipes[slot].outputs {
            if *qty <= 0.0 {
                continue;
            }
            let list = self.producers.entry(item.clone()).or_default();
            if !list.contains(&slot) {
                list.push(slot);
                list.sort_unstable();
            }
        }
        Ok(())
    }

    /// Recipes that output `item`, in insertion order.
    pub fn producers_of(&self, item: &str) -> Vec<&Recipe> {
        self.producers
            .get(item)
            .map(|slots| slots.iter().map(|&i| &self.recipes[i]).collect())
            .unwrap_or_default()
    }

    /// Recipes that list `item` as an input, in insertion order.
    pub fn consumers_of(&self, item: &str) -> Vec<&Recipe> {
        self.recipes
            .iter()
            .filter(|r| r.inputs.iter().any(|(name, _)| name == item))
            .collect()
    }

    pub fn recipe(&self, name: &str) -> Result<&Recipe> {
        self.by_name
            .get(name)
            .map(|&i| &self.recipes[i])
            .ok_or_else(|| PlannerError::NotFound {
                kind: "recipe",
                name: name.to_string(),
            })
    }

    pub fn recipes(&self) -> impl Iterator<Item = &Recipe> {
        self.recipes.iter()
    }

    /// Every item mentioned by any recipe, sorted.
    pub fn items(&self) -> BTreeSet<&str> {
        self.recipes
            .iter()
            .flat_map(|r| r.inputs.iter().chain(&r.outputs))
            .map(|(name, _)| name.as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.recipes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recipes.is_empty()
    }
}
