//! Database schema and operations for the recipe catalog

use rusqlite::{Connection, OptionalExtension, params};

use crate::error::{PlannerError, Result};
use crate::graph::RecipeGraph;
use crate::models::{Category, Item, ItemKind, ItemProperty, Recipe, Technology};
use crate::research::TechTree;

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS items (
            name TEXT PRIMARY KEY,
            kind TEXT NOT NULL,
            stack_size INTEGER,
            fuel_value_mj REAL
        );

        -- id order is insertion order, which fixes producer order on load
        CREATE TABLE IF NOT EXISTS recipes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            category TEXT NOT NULL,
            crafting_time_s REAL NOT NULL,
            enabled INTEGER NOT NULL DEFAULT 1
        );

        CREATE TABLE IF NOT EXISTS recipe_inputs (
            recipe_id INTEGER NOT NULL,
            position INTEGER NOT NULL,
            item TEXT NOT NULL,
            quantity REAL NOT NULL,
            PRIMARY KEY (recipe_id, position)
        );

        CREATE TABLE IF NOT EXISTS recipe_outputs (
            recipe_id INTEGER NOT NULL,
            position INTEGER NOT NULL,
            item TEXT NOT NULL,
            quantity REAL NOT NULL,
            PRIMARY KEY (recipe_id, position)
        );

        CREATE TABLE IF NOT EXISTS technologies (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE
        );

        CREATE TABLE IF NOT EXISTS technology_prerequisites (
            technology TEXT NOT NULL,
            prerequisite TEXT NOT NULL,
            PRIMARY KEY (technology, prerequisite)
        );

        CREATE TABLE IF NOT EXISTS technology_unlocks (
            technology TEXT NOT NULL,
            recipe TEXT NOT NULL,
            PRIMARY KEY (technology, recipe)
        );

        CREATE INDEX IF NOT EXISTS idx_recipe_outputs_item ON recipe_outputs(item);
        CREATE INDEX IF NOT EXISTS idx_recipe_inputs_item ON recipe_inputs(item);
        CREATE INDEX IF NOT EXISTS idx_technology_unlocks_recipe ON technology_unlocks(recipe);
        "#,
    )?;
    Ok(())
}

/// Insert or replace an item
pub fn upsert_item(conn: &Connection, item: &Item) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO items (name, kind, stack_size, fuel_value_mj)
         VALUES (?1, ?2, ?3, ?4)",
        params![item.name, item.kind.as_str(), item.stack_size(), item.fuel_value()],
    )?;
    Ok(())
}

/// Insert or update a recipe, keeping its original position if it exists.
///
/// `enabled` marks recipes available before any research.
pub fn upsert_recipe(conn: &Connection, recipe: &Recipe, enabled: bool) -> Result<()> {
    recipe.validate()?;

    conn.execute(
        "INSERT INTO recipes (name, category, crafting_time_s, enabled)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(name) DO UPDATE SET
            category = excluded.category,
            crafting_time_s = excluded.crafting_time_s,
            enabled = excluded.enabled",
        params![recipe.name, recipe.category.as_str(), recipe.crafting_time, enabled],
    )?;
    let id: i64 = conn.query_row(
        "SELECT id FROM recipes WHERE name = ?1",
        [&recipe.name],
        |row| row.get(0),
    )?;

    conn.execute("DELETE FROM recipe_inputs WHERE recipe_id = ?1", [id])?;
    conn.execute("DELETE FROM recipe_outputs WHERE recipe_id = ?1", [id])?;
    for (position, (item, qty)) in recipe.inputs.iter().enumerate() {
        conn.execute(
            "INSERT INTO recipe_inputs (recipe_id, position, item, quantity) VALUES (?1, ?2, ?3, ?4)",
            params![id, position as i64, item, qty],
        )?;
    }
    for (position, (item, qty)) in recipe.outputs.iter().enumerate() {
        conn.execute(
            "INSERT INTO recipe_outputs (recipe_id, position, item, quantity) VALUES (?1, ?2, ?3, ?4)",
            params![id, position as i64, item, qty],
        )?;
    }
    Ok(())
}

/// Insert or replace a technology with its prerequisites and unlocks
pub fn upsert_technology(conn: &Connection, tech: &Technology) -> Result<()> {
    conn.execute(
        "INSERT INTO technologies (name) VALUES (?1) ON CONFLICT(name) DO NOTHING",
        [&tech.name],
    )?;
    conn.execute(
        "DELETE FROM technology_prerequisites WHERE technology = ?1",
        [&tech.name],
    )?;
    conn.execute("DELETE FROM technology_unlocks WHERE technology = ?1", [&tech.name])?;
    for prerequisite in &tech.prerequisites {
        conn.execute(
            "INSERT OR IGNORE INTO technology_prerequisites (technology, prerequisite) VALUES (?1, ?2)",
            [&tech.name, prerequisite],
        )?;
    }
    for recipe in &tech.unlocks {
        conn.execute(
            "INSERT OR IGNORE INTO technology_unlocks (technology, recipe) VALUES (?1, ?2)",
            [&tech.name, recipe],
        )?;
    }
    Ok(())
}

/// Clear the whole catalog (for re-extraction)
pub fn clear_catalog(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        DELETE FROM technology_unlocks;
        DELETE FROM technology_prerequisites;
        DELETE FROM technologies;
        DELETE FROM recipe_outputs;
        DELETE FROM recipe_inputs;
        DELETE FROM recipes;
        DELETE FROM items;
        "#,
    )?;
    Ok(())
}

fn load_side(conn: &Connection, table: &str, recipe_id: i64) -> Result<Vec<(String, f64)>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT item, quantity FROM {} WHERE recipe_id = ?1 ORDER BY position",
        table
    ))?;
    let rows = stmt.query_map([recipe_id], |row| Ok((row.get(0)?, row.get(1)?)))?;

    let mut results = Vec::new();
    for row in rows {
        results.push(row?);
    }
    Ok(results)
}

/// Load every recipe, in insertion order
pub fn list_recipes(conn: &Connection) -> Result<Vec<Recipe>> {
    let mut stmt =
        conn.prepare("SELECT id, name, category, crafting_time_s FROM recipes ORDER BY id")?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, f64>(3)?,
        ))
    })?;

    let mut results = Vec::new();
    for row in rows {
        let (id, name, category, crafting_time) = row?;
        let category: Category = category
            .parse()
            .map_err(|reason: String| PlannerError::invalid_recipe(&name, reason))?;
        let mut recipe = Recipe::new(name, crafting_time, category);
        recipe.inputs = load_side(conn, "recipe_inputs", id)?;
        recipe.outputs = load_side(conn, "recipe_outputs", id)?;
        results.push(recipe);
    }
    Ok(results)
}

/// Snapshot the stored recipes into a graph
pub fn load_recipe_graph(conn: &Connection) -> Result<RecipeGraph> {
    let mut graph = RecipeGraph::new();
    for recipe in list_recipes(conn)? {
        graph.add_recipe(recipe)?;
    }
    Ok(graph)
}

/// Load technologies and the recipes enabled at game start
pub fn load_tech_tree(conn: &Connection) -> Result<TechTree> {
    let mut tree = TechTree::new();

    let mut stmt = conn.prepare("SELECT name FROM technologies ORDER BY id")?;
    let names = stmt.query_map([], |row| row.get::<_, String>(0))?;
    let mut prereq_stmt = conn.prepare(
        "SELECT prerequisite FROM technology_prerequisites WHERE technology = ?1 ORDER BY prerequisite",
    )?;
    let mut unlock_stmt = conn.prepare(
        "SELECT recipe FROM technology_unlocks WHERE technology = ?1 ORDER BY recipe",
    )?;

    for name in names {
        let name = name?;
        let prerequisites = prereq_stmt
            .query_map([&name], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        let unlocks = unlock_stmt
            .query_map([&name], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        tree.add_technology(Technology {
            name,
            prerequisites,
            unlocks,
        });
    }

    let mut starter_stmt = conn.prepare("SELECT name FROM recipes WHERE enabled = 1 ORDER BY id")?;
    let starters = starter_stmt.query_map([], |row| row.get::<_, String>(0))?;
    for starter in starters {
        tree.add_starter_recipe(starter?);
    }
    Ok(tree)
}

type ItemRow = (String, String, Option<u32>, Option<f64>);

fn item_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ItemRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

fn item_from_row((name, kind, stack_size, fuel): ItemRow) -> Result<Item> {
    let kind: ItemKind = kind.parse().map_err(|_| PlannerError::NotFound {
        kind: "item kind",
        name: kind.clone(),
    })?;
    let mut item = Item::new(name, kind);
    if let Some(n) = stack_size {
        item = item.with_property(ItemProperty::StackSize(n));
    }
    if let Some(megajoules) = fuel {
        item = item.with_property(ItemProperty::FuelValue { megajoules });
    }
    Ok(item)
}

/// List all items in the database
pub fn list_items(conn: &Connection) -> Result<Vec<Item>> {
    let mut stmt = conn.prepare(
        "SELECT name, kind, stack_size, fuel_value_mj FROM items ORDER BY kind, name",
    )?;
    let rows = stmt.query_map([], item_row)?;

    let mut results = Vec::new();
    for row in rows {
        results.push(item_from_row(row?)?);
    }
    Ok(results)
}

/// Look up a single item
pub fn find_item(conn: &Connection, name: &str) -> Result<Option<Item>> {
    conn.query_row(
        "SELECT name, kind, stack_size, fuel_value_mj FROM items WHERE name = ?1",
        [name],
        item_row,
    )
    .optional()?
    .map(item_from_row)
    .transpose()
}
