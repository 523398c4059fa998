//! Research state and recipe availability
//!
//! A [`TechTree`] holds the known technologies and the recipes that are
//! enabled from the start of a game. A [`ResearchProgress`] is built from a
//! [`ResearchLevel`] preset (or an explicit recipe set) and answers whether a
//! recipe may be used by the resolver.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

use tracing::{debug, warn};

use crate::error::{PlannerError, Result};
use crate::models::Technology;

/// Predicate used by the resolver to skip locked recipes.
pub trait RecipeAvailability {
    fn is_available(&self, recipe: &str) -> bool;
}

impl<F> RecipeAvailability for F
where
    F: Fn(&str) -> bool,
{
    fn is_available(&self, recipe: &str) -> bool {
        self(recipe)
    }
}

/// Named research presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResearchLevel {
    /// Nothing researched, not even the starter recipes
    None,
    BasicScience,
    EarlyGame,
    /// Every recipe in the catalog
    All,
}

impl ResearchLevel {
    pub const ALL: [ResearchLevel; 4] = [
        ResearchLevel::None,
        ResearchLevel::BasicScience,
        ResearchLevel::EarlyGame,
        ResearchLevel::All,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ResearchLevel::None => "none",
            ResearchLevel::BasicScience => "basic-science",
            ResearchLevel::EarlyGame => "early-game",
            ResearchLevel::All => "all",
        }
    }

    /// Technologies researched at this level. Prerequisites are added when
    /// the level is applied to a tree.
    pub fn technologies(self) -> &'static [&'static str] {
        match self {
            ResearchLevel::None | ResearchLevel::All => &[],
            ResearchLevel::BasicScience => &["automation"],
            ResearchLevel::EarlyGame => &["automation", "electronics"],
        }
    }
}

impl fmt::Display for ResearchLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResearchLevel {
    type Err = PlannerError;

    fn from_str(s: &str) -> Result<Self> {
        ResearchLevel::ALL
            .into_iter()
            .find(|level| level.as_str() == s)
            .ok_or_else(|| PlannerError::UnknownResearchLevel(s.to_string()))
    }
}

/// Known technologies plus the recipes available without any research.
#[derive(Debug, Clone, Default)]
pub struct TechTree {
    technologies: Vec<Technology>,
    by_name: HashMap<String, usize>,
    starter_recipes: BTreeSet<String>,
}

impl TechTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a technology, replacing one with the same name.
    pub fn add_technology(&mut self, tech: Technology) {
        match self.by_name.get(&tech.name) {
            Some(&i) => self.technologies[i] = tech,
            None => {
                self.by_name.insert(tech.name.clone(), self.technologies.len());
                self.technologies.push(tech);
            }
        }
    }

    pub fn add_starter_recipe(&mut self, recipe: impl Into<String>) {
        self.starter_recipes.insert(recipe.into());
    }

    pub fn technology(&self, name: &str) -> Result<&Technology> {
        self.by_name
            .get(name)
            .map(|&i| &self.technologies[i])
            .ok_or_else(|| PlannerError::NotFound {
                kind: "technology",
                name: name.to_string(),
            })
    }

    pub fn technologies(&self) -> impl Iterator<Item = &Technology> {
        self.technologies.iter()
    }

    pub fn starter_recipes(&self) -> &BTreeSet<String> {
        &self.starter_recipes
    }

    /// First technology that unlocks `recipe`, if any.
    pub fn unlocked_by(&self, recipe: &str) -> Option<&Technology> {
        self.technologies
            .iter()
            .find(|t| t.unlocks.iter().any(|r| r == recipe))
    }
}

/// Researched technologies and the recipes they make available.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResearchProgress {
    technologies: BTreeSet<String>,
    recipes: BTreeSet<String>,
    unrestricted: bool,
}

impl ResearchProgress {
    /// Research state for a preset level.
    ///
    /// Preset technologies missing from the tree are skipped with a warning,
    /// since a partially extracted catalog may not define all of them.
    pub fn from_level(level: ResearchLevel, tree: &TechTree) -> Self {
        let mut progress = Self::default();
        match level {
            ResearchLevel::None => {}
            ResearchLevel::All => progress.unrestricted = true,
            ResearchLevel::BasicScience | ResearchLevel::EarlyGame => {
                progress.recipes.extend(tree.starter_recipes.iter().cloned());
                for name in level.technologies() {
                    if let Err(e) = progress.unlock_technology(tree, name) {
                        warn!(
                            level = %level,
                            technology = name,
                            "skipping preset technology: {}",
                            e
                        );
                    }
                }
            }
        }
        debug!(
            level = %level,
            technologies = progress.technologies.len(),
            recipes = progress.recipes.len(),
            "research progress built"
        );
        progress
    }

    /// Parse a level name and build its research state.
    pub fn from_level_name(name: &str, tree: &TechTree) -> Result<Self> {
        Ok(Self::from_level(name.parse()?, tree))
    }

    /// Research state with exactly these recipes available.
    pub fn from_recipes<I, S>(recipes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            recipes: recipes.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Mark `name` and all of its prerequisites as researched.
    pub fn unlock_technology(&mut self, tree: &TechTree, name: &str) -> Result<()> {
        tree.technology(name)?;

        let mut stack = vec![name.to_string()];
        while let Some(current) = stack.pop() {
            if self.technologies.contains(&current) {
                continue;
            }
            let tech = match tree.technology(&current) {
                Ok(tech) => tech,
                Err(_) => {
                    debug!(technology = %current, "prerequisite not in tech tree");
                    continue;
                }
            };
            self.recipes.extend(tech.unlocks.iter().cloned());
            stack.extend(tech.prerequisites.iter().cloned());
            self.technologies.insert(current);
        }
        Ok(())
    }

    pub fn unlock_recipe(&mut self, recipe: impl Into<String>) {
        self.recipes.insert(recipe.into());
    }

    pub fn is_technology_unlocked(&self, name: &str) -> bool {
        self.technologies.contains(name)
    }

    pub fn is_unrestricted(&self) -> bool {
        self.unrestricted
    }

    pub fn unlocked_recipes(&self) -> &BTreeSet<String> {
        &self.recipes
    }
}

impl RecipeAvailability for ResearchProgress {
    fn is_available(&self, recipe: &str) -> bool {
        self.unrestricted || self.recipes.contains(recipe)
    }
}
