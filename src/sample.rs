//! Built-in vanilla catalog
//!
//! A slice of the base game up to plastics, used by `load-sample` and by
//! tests. Quantities follow the normal-difficulty prototypes.

use rusqlite::Connection;
use tracing::info;

use crate::db;
use crate::error::Result;
use crate::graph::RecipeGraph;
use crate::models::{Category, Item, ItemKind, ItemProperty, Recipe, Technology};
use crate::research::TechTree;

/// Recipes enabled before any research
pub const STARTER_RECIPES: &[&str] = &[
    "iron-plate",
    "copper-plate",
    "stone-brick",
    "iron-gear-wheel",
    "copper-cable",
    "pipe",
    "stone-furnace",
    "automation-science-pack",
    "inserter",
    "transport-belt",
];

pub fn items() -> Vec<Item> {
    let stack = |name: &str, kind: ItemKind, size: u32| {
        Item::new(name, kind).with_property(ItemProperty::StackSize(size))
    };
    let fuel =
        |item: Item, megajoules: f64| item.with_property(ItemProperty::FuelValue { megajoules });

    vec![
        stack("iron-ore", ItemKind::Raw, 50),
        stack("copper-ore", ItemKind::Raw, 50),
        stack("stone", ItemKind::Raw, 50),
        fuel(stack("coal", ItemKind::Raw, 50), 4.0),
        fuel(stack("wood", ItemKind::Raw, 100), 2.0),
        Item::new("crude-oil", ItemKind::Raw),
        Item::new("water", ItemKind::Raw),
        stack("iron-plate", ItemKind::Intermediate, 100),
        stack("copper-plate", ItemKind::Intermediate, 100),
        stack("steel-plate", ItemKind::Intermediate, 100),
        stack("stone-brick", ItemKind::Intermediate, 100),
        stack("iron-gear-wheel", ItemKind::Intermediate, 100),
        stack("copper-cable", ItemKind::Intermediate, 200),
        stack("electronic-circuit", ItemKind::Intermediate, 200),
        stack("plastic-bar", ItemKind::Intermediate, 100),
        stack("sulfur", ItemKind::Intermediate, 50),
        fuel(stack("solid-fuel", ItemKind::Intermediate, 50), 12.0),
        Item::new("heavy-oil", ItemKind::Intermediate),
        Item::new("light-oil", ItemKind::Intermediate),
        Item::new("petroleum-gas", ItemKind::Intermediate),
        stack("automation-science-pack", ItemKind::Tool, 200),
        stack("logistic-science-pack", ItemKind::Tool, 200),
        stack("pipe", ItemKind::Building, 100),
        stack("stone-furnace", ItemKind::Building, 50),
        stack("inserter", ItemKind::Building, 50),
        stack("long-handed-inserter", ItemKind::Building, 50),
        stack("transport-belt", ItemKind::Building, 100),
        stack("underground-belt", ItemKind::Building, 50),
        stack("splitter", ItemKind::Building, 50),
        stack("assembling-machine-1", ItemKind::Building, 50),
    ]
}

pub fn recipes() -> Vec<Recipe> {
    use Category::*;

    vec![
        // Smelting
        Recipe::new("iron-plate", 3.2, Smelting)
            .input("iron-ore", 1.0)
            .output("iron-plate", 1.0),
        Recipe::new("copper-plate", 3.2, Smelting)
            .input("copper-ore", 1.0)
            .output("copper-plate", 1.0),
        Recipe::new("stone-brick", 3.2, Smelting)
            .input("stone", 2.0)
            .output("stone-brick", 1.0),
        Recipe::new("steel-plate", 16.0, Smelting)
            .input("iron-plate", 5.0)
            .output("steel-plate", 1.0),
        // Intermediates
        Recipe::new("iron-gear-wheel", 0.5, Crafting)
            .input("iron-plate", 2.0)
            .output("iron-gear-wheel", 1.0),
        Recipe::new("copper-cable", 0.5, Crafting)
            .input("copper-plate", 1.0)
            .output("copper-cable", 2.0),
        Recipe::new("electronic-circuit", 0.5, Crafting)
            .input("iron-plate", 1.0)
            .input("copper-cable", 3.0)
            .output("electronic-circuit", 1.0),
        // Science
        Recipe::new("automation-science-pack", 5.0, Crafting)
            .input("copper-plate", 1.0)
            .input("iron-gear-wheel", 1.0)
            .output("automation-science-pack", 1.0),
        Recipe::new("logistic-science-pack", 6.0, Crafting)
            .input("inserter", 1.0)
            .input("transport-belt", 1.0)
            .output("logistic-science-pack", 1.0),
        // Buildings
        Recipe::new("pipe", 0.5, Crafting)
            .input("iron-plate", 1.0)
            .output("pipe", 1.0),
        Recipe::new("stone-furnace", 0.5, Crafting)
            .input("stone", 5.0)
            .output("stone-furnace", 1.0),
        Recipe::new("inserter", 0.5, Crafting)
            .input("electronic-circuit", 1.0)
            .input("iron-gear-wheel", 1.0)
            .input("iron-plate", 1.0)
            .output("inserter", 1.0),
        Recipe::new("long-handed-inserter", 0.5, Crafting)
            .input("electronic-circuit", 1.0)
            .input("iron-gear-wheel", 1.0)
            .input("inserter", 1.0)
            .output("long-handed-inserter", 1.0),
        Recipe::new("transport-belt", 0.5, Crafting)
            .input("iron-plate", 1.0)
            .input("iron-gear-wheel", 1.0)
            .output("transport-belt", 2.0),
        Recipe::new("underground-belt", 1.0, Crafting)
            .input("iron-plate", 10.0)
            .input("transport-belt", 5.0)
            .output("underground-belt", 2.0),
        Recipe::new("splitter", 1.0, Crafting)
            .input("electronic-circuit", 5.0)
            .input("iron-plate", 5.0)
            .input("transport-belt", 4.0)
            .output("splitter", 1.0),
        Recipe::new("assembling-machine-1", 0.5, Crafting)
            .input("electronic-circuit", 3.0)
            .input("iron-gear-wheel", 5.0)
            .input("iron-plate", 9.0)
            .output("assembling-machine-1", 1.0),
        // Oil
        Recipe::new("basic-oil-processing", 5.0, OilProcessing)
            .input("crude-oil", 100.0)
            .output("petroleum-gas", 45.0),
        Recipe::new("advanced-oil-processing", 5.0, OilProcessing)
            .input("water", 50.0)
            .input("crude-oil", 100.0)
            .output("heavy-oil", 25.0)
            .output("light-oil", 45.0)
            .output("petroleum-gas", 55.0),
        Recipe::new("heavy-oil-cracking", 2.0, Chemistry)
            .input("water", 30.0)
            .input("heavy-oil", 40.0)
            .output("light-oil", 30.0),
        Recipe::new("light-oil-cracking", 2.0, Chemistry)
            .input("water", 30.0)
            .input("light-oil", 30.0)
            .output("petroleum-gas", 20.0),
        Recipe::new("plastic-bar", 1.0, Chemistry)
            .input("petroleum-gas", 20.0)
            .input("coal", 1.0)
            .output("plastic-bar", 2.0),
        Recipe::new("sulfur", 1.0, Chemistry)
            .input("water", 30.0)
            .input("petroleum-gas", 30.0)
            .output("sulfur", 2.0),
        Recipe::new("solid-fuel-from-light-oil", 2.0, Chemistry)
            .input("light-oil", 10.0)
            .output("solid-fuel", 1.0),
        Recipe::new("solid-fuel-from-petroleum-gas", 2.0, Chemistry)
            .input("petroleum-gas", 20.0)
            .output("solid-fuel", 1.0),
        Recipe::new("solid-fuel-from-heavy-oil", 2.0, Chemistry)
            .input("heavy-oil", 20.0)
            .output("solid-fuel", 1.0),
    ]
}

fn tech(name: &str, prerequisites: &[&str], unlocks: &[&str]) -> Technology {
    Technology {
        name: name.to_string(),
        prerequisites: prerequisites.iter().map(|s| s.to_string()).collect(),
        unlocks: unlocks.iter().map(|s| s.to_string()).collect(),
    }
}

pub fn technologies() -> Vec<Technology> {
    vec![
        tech("automation", &[], &["assembling-machine-1", "long-handed-inserter"]),
        tech("electronics", &["automation"], &["electronic-circuit"]),
        tech("logistics", &[], &["underground-belt", "splitter"]),
        tech("logistic-science-pack", &["automation"], &["logistic-science-pack"]),
        tech("steel-processing", &[], &["steel-plate"]),
        tech(
            "oil-processing",
            &["steel-processing", "logistic-science-pack"],
            &["basic-oil-processing", "solid-fuel-from-petroleum-gas"],
        ),
        tech(
            "advanced-oil-processing",
            &["oil-processing"],
            &[
                "advanced-oil-processing",
                "heavy-oil-cracking",
                "light-oil-cracking",
                "solid-fuel-from-light-oil",
                "solid-fuel-from-heavy-oil",
            ],
        ),
        tech("plastics", &["oil-processing"], &["plastic-bar"]),
        tech("sulfur-processing", &["oil-processing"], &["sulfur"]),
    ]
}

/// Build the sample catalog in memory.
pub fn catalog() -> Result<(RecipeGraph, TechTree)> {
    let mut graph = RecipeGraph::new();
    for recipe in recipes() {
        graph.add_recipe(recipe)?;
    }

    let mut tree = TechTree::new();
    for tech in technologies() {
        tree.add_technology(tech);
    }
    for starter in STARTER_RECIPES {
        tree.add_starter_recipe(*starter);
    }
    Ok((graph, tree))
}

/// Replace the database catalog with the sample data
pub fn load_into(conn: &Connection) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    db::clear_catalog(&tx)?;

    for item in items() {
        db::upsert_item(&tx, &item)?;
    }
    let recipes = recipes();
    for recipe in &recipes {
        db::upsert_recipe(&tx, recipe, STARTER_RECIPES.contains(&recipe.name.as_str()))?;
    }
    let technologies = technologies();
    for tech in &technologies {
        db::upsert_technology(&tx, tech)?;
    }
    tx.commit()?;

    info!(
        recipes = recipes.len(),
        technologies = technologies.len(),
        "sample catalog loaded"
    );
    Ok(())
}
