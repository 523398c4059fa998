//! Factorio production planner
//!
//! Turns target output rates into machine counts, item flows, raw material
//! demand and an estimated power draw, using a recipe catalog stored in
//! SQLite and filtered by research progress.

pub mod db;
pub mod error;
pub mod extract;
pub mod graph;
pub mod models;
pub mod power;
pub mod research;
pub mod resolver;
pub mod sample;
pub mod summary;
pub mod target;

pub use error::{PlannerError, Result};
pub use graph::RecipeGraph;
pub use models::{ProductionPlan, ProductionTarget, Recipe};
pub use research::{ResearchLevel, ResearchProgress};
pub use resolver::{Resolver, ResolverOptions};
