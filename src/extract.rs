//! Factorio Lua prototype extraction
//!
//! Scans a `data/` directory (for example `data/base/prototypes`) for Lua
//! files declaring `recipe` and `technology` prototypes and imports them into
//! the catalog database.
//!
//! This is pattern matching, not a Lua interpreter. It understands the
//! literal table syntax the game data files use:
//!
//! ```lua
//! {
//!   type = "recipe",
//!   name = "iron-gear-wheel",
//!   energy_required = 0.5,
//!   ingredients = {{"iron-plate", 2}},
//!   result = "iron-gear-wheel"
//! }
//! ```
//!
//! Recipes with `normal`/`expensive` variants use the `normal` one.

use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;
use rusqlite::Connection;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::db;
use crate::error::{PlannerError, Result};
use crate::models::{Category, Recipe, Technology};

/// Crafting time Factorio uses when `energy_required` is absent.
const DEFAULT_ENERGY_REQUIRED: f64 = 0.5;

/// A prototype read from a Lua data file
#[derive(Debug, Clone, PartialEq)]
pub enum Prototype {
    Recipe { recipe: Recipe, enabled: bool },
    Technology(Technology),
}

struct Patterns {
    prototype: Regex,
    comment: Regex,
    name: Regex,
    energy: Regex,
    category: Regex,
    disabled: Regex,
    result: Regex,
    result_count: Regex,
    short_entry: Regex,
    amount: Regex,
    amount_min: Regex,
    amount_max: Regex,
    probability: Regex,
    unlock: Regex,
    quoted: Regex,
}

impl Patterns {
    fn new() -> Result<Self> {
        Ok(Self {
            prototype: Regex::new(r#"type\s*=\s*"(recipe|technology)""#)?,
            comment: Regex::new(r"--[^\n]*")?,
            name: Regex::new(r#"\bname\s*=\s*"([^"]+)""#)?,
            energy: Regex::new(r"\benergy_required\s*=\s*([\d.]+)")?,
            category: Regex::new(r#"\bcategory\s*=\s*"([\w-]+)""#)?,
            disabled: Regex::new(r"\benabled\s*=\s*false")?,
            result: Regex::new(r#"\bresult\s*=\s*"([\w-]+)""#)?,
            result_count: Regex::new(r"\bresult_count\s*=\s*([\d.]+)")?,
            short_entry: Regex::new(r#"^\s*"([\w-]+)"\s*,\s*([\d.]+)\s*$"#)?,
            amount: Regex::new(r"\bamount\s*=\s*([\d.]+)")?,
            amount_min: Regex::new(r"\bamount_min\s*=\s*([\d.]+)")?,
            amount_max: Regex::new(r"\bamount_max\s*=\s*([\d.]+)")?,
            probability: Regex::new(r"\bprobability\s*=\s*([\d.]+)")?,
            unlock: Regex::new(r#"type\s*=\s*"unlock-recipe"\s*,\s*recipe\s*=\s*"([\w-]+)""#)?,
            quoted: Regex::new(r#""([\w-]+)""#)?,
        })
    }
}

/// Find all Lua files that declare recipes or technologies
pub fn find_prototype_files(data_dir: &Path) -> Result<Vec<PathBuf>> {
    let marker = Regex::new(r#"type\s*=\s*"(recipe|technology)""#)?;
    let mut files = Vec::new();

    for entry in WalkDir::new(data_dir)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "lua") {
            let content = fs::read_to_string(path).unwrap_or_default();
            if marker.is_match(&content) {
                files.push(path.to_path_buf());
            }
        }
    }

    Ok(files)
}

/// Parse every recipe and technology prototype in a Lua source string.
///
/// Prototypes that cannot be understood are skipped and counted in the
/// second element of the result.
pub fn parse_prototypes(content: &str) -> Result<(Vec<Prototype>, usize)> {
    let patterns = Patterns::new()?;
    let content = patterns.comment.replace_all(content, "");

    let starts: Vec<(usize, &str)> = patterns
        .prototype
        .captures_iter(&content)
        .filter_map(|cap| {
            let whole = cap.get(0)?;
            Some((whole.start(), cap.get(1)?.as_str()))
        })
        .collect();

    let mut prototypes = Vec::new();
    let mut skipped = 0;
    for (i, (start, kind)) in starts.iter().enumerate() {
        let end = starts.get(i + 1).map_or(content.len(), |(next, _)| *next);
        let chunk = &content[*start..end];

        let parsed = match *kind {
            "recipe" => parse_recipe(&patterns, chunk),
            _ => parse_technology(&patterns, chunk),
        };
        match parsed {
            Ok(Some(prototype)) => prototypes.push(prototype),
            Ok(None) => skipped += 1,
            Err(e) => {
                warn!("skipping {} prototype: {}", kind, e);
                skipped += 1;
            }
        }
    }
    Ok((prototypes, skipped))
}

fn parse_recipe(patterns: &Patterns, chunk: &str) -> Result<Option<Prototype>> {
    let Some(name) = first_capture(&patterns.name, chunk) else {
        return Ok(None);
    };

    // Difficulty variants nest the recipe body one level down.
    let body = block_after(chunk, "normal").unwrap_or(chunk);

    let crafting_time = match first_capture(&patterns.energy, body) {
        Some(value) => parse_number(name, value)?,
        None => DEFAULT_ENERGY_REQUIRED,
    };
    let category = match first_capture(&patterns.category, chunk) {
        Some(value) => value
            .parse::<Category>()
            .map_err(|reason| PlannerError::invalid_recipe(name, reason))?,
        None => Category::Crafting,
    };
    let enabled = !patterns.disabled.is_match(body);

    let mut recipe = Recipe::new(name, crafting_time, category);
    if let Some(block) = block_after(body, "ingredients") {
        recipe.inputs = parse_entries(patterns, name, block)?;
    }
    if let Some(block) = block_after(body, "results") {
        recipe.outputs = parse_entries(patterns, name, block)?;
    } else if let Some(result) = first_capture(&patterns.result, body) {
        let count = match first_capture(&patterns.result_count, body) {
            Some(value) => parse_number(name, value)?,
            None => 1.0,
        };
        recipe.outputs.push((result.to_string(), count));
    }

    recipe.validate()?;
    debug!(
        recipe = %recipe.name,
        inputs = recipe.inputs.len(),
        outputs = recipe.outputs.len(),
        "parsed recipe"
    );
    Ok(Some(Prototype::Recipe { recipe, enabled }))
}

fn parse_technology(patterns: &Patterns, chunk: &str) -> Result<Option<Prototype>> {
    let Some(name) = first_capture(&patterns.name, chunk) else {
        return Ok(None);
    };

    let unlocks = block_after(chunk, "effects")
        .map(|block| {
            patterns
                .unlock
                .captures_iter(block)
                .map(|cap| cap[1].to_string())
                .collect()
        })
        .unwrap_or_default();
    let prerequisites = block_after(chunk, "prerequisites")
        .map(|block| {
            patterns
                .quoted
                .captures_iter(block)
                .map(|cap| cap[1].to_string())
                .collect()
        })
        .unwrap_or_default();

    Ok(Some(Prototype::Technology(Technology {
        name: name.to_string(),
        prerequisites,
        unlocks,
    })))
}

/// Parse `{{"iron-plate", 2}, {type = "fluid", name = "water", amount = 10}}`
/// style lists. `probability` scales the amount; ranges use their midpoint.
fn parse_entries(patterns: &Patterns, recipe: &str, block: &str) -> Result<Vec<(String, f64)>> {
    let mut entries = Vec::new();
    let mut rest = block;
    while let Some(open) = rest.find('{') {
        let Some(inner) = balanced(rest, open) else {
            break;
        };
        rest = &rest[open + inner.len() + 2..];

        if let Some(cap) = patterns.short_entry.captures(inner) {
            entries.push((cap[1].to_string(), parse_number(recipe, &cap[2])?));
            continue;
        }
        let Some(item) = first_capture(&patterns.name, inner) else {
            continue;
        };
        let amount = match first_capture(&patterns.amount, inner) {
            Some(value) => parse_number(recipe, value)?,
            None => {
                let min = first_capture(&patterns.amount_min, inner);
                let max = first_capture(&patterns.amount_max, inner);
                match (min, max) {
                    (Some(min), Some(max)) => {
                        (parse_number(recipe, min)? + parse_number(recipe, max)?) / 2.0
                    }
                    _ => 1.0,
                }
            }
        };
        let probability = match first_capture(&patterns.probability, inner) {
            Some(value) => parse_number(recipe, value)?,
            None => 1.0,
        };
        entries.push((item.to_string(), amount * probability));
    }
    Ok(entries)
}

fn first_capture<'t>(re: &Regex, text: &'t str) -> Option<&'t str> {
    re.captures(text).and_then(|cap| cap.get(1)).map(|m| m.as_str())
}

fn parse_number(recipe: &str, value: &str) -> Result<f64> {
    value
        .parse::<f64>()
        .map_err(|e| PlannerError::invalid_recipe(recipe, format!("bad number '{}': {}", value, e)))
}

/// Contents of the table assigned to `key`, e.g. `key = { ... }`.
fn block_after<'t>(text: &'t str, key: &str) -> Option<&'t str> {
    let re = Regex::new(&format!(r"\b{}\s*=\s*\{{", regex::escape(key))).ok()?;
    let m = re.find(text)?;
    balanced(text, m.end() - 1)
}

/// Contents between the brace at `open` and its matching close brace.
fn balanced(text: &str, open: usize) -> Option<&str> {
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    for (i, &b) in bytes.iter().enumerate().skip(open) {
        match b {
            b'"' => in_string = !in_string,
            b'{' if !in_string => depth += 1,
            b'}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[open + 1..i]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Extract all recipe and technology prototypes and populate the database
pub fn extract_to_database(conn: &Connection, data_dir: &Path) -> Result<ExtractStats> {
    let mut stats = ExtractStats::default();

    info!(dir = %data_dir.display(), "scanning for prototype files");
    let files = find_prototype_files(data_dir)?;
    info!(files = files.len(), "found prototype files");

    let tx = conn.unchecked_transaction()?;
    for path in &files {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                warn!(file = %path.display(), "cannot read: {}", e);
                stats.errors += 1;
                continue;
            }
        };
        let (prototypes, skipped) = parse_prototypes(&content)?;
        stats.files += 1;
        stats.skipped += skipped;

        for prototype in prototypes {
            match prototype {
                Prototype::Recipe { recipe, enabled } => {
                    db::upsert_recipe(&tx, &recipe, enabled)?;
                    stats.recipes += 1;
                }
                Prototype::Technology(tech) => {
                    db::upsert_technology(&tx, &tech)?;
                    stats.technologies += 1;
                }
            }
        }
        debug!(file = %path.display(), "imported");
    }
    tx.commit()?;

    Ok(stats)
}

#[derive(Debug, Default)]
pub struct ExtractStats {
    pub files: usize,
    pub recipes: usize,
    pub technologies: usize,
    pub skipped: usize,
    pub errors: usize,
}

impl std::fmt::Display for ExtractStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Extracted {} recipes and {} technologies from {} files. Skipped: {}, Errors: {}",
            self.recipes, self.technologies, self.files, self.skipped, self.errors
        )
    }
}
