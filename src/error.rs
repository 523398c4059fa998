//! Library error type.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, PlannerError>;

#[derive(Debug, Error)]
pub enum PlannerError {
    /// Malformed catalog entry. Rejected before it enters the graph.
    #[error("invalid recipe '{name}': {reason}")]
    InvalidRecipe { name: String, reason: String },

    #[error("{kind} '{name}' not found")]
    NotFound { kind: &'static str, name: String },

    #[error("unknown research level '{0}' (expected one of: none, basic-science, early-game, all)")]
    UnknownResearchLevel(String),

    #[error("invalid target '{target}': {reason}")]
    InvalidTarget { target: String, reason: String },

    #[error("no production targets given")]
    NilPlanInput,

    /// Safety net for the resolver loop. Reaching it means the graph walk did
    /// not terminate the way it should have.
    #[error("resolution exceeded {limit} iterations")]
    IterationLimit { limit: usize },

    #[error("recipe '{recipe}' would need {machines:e} machines, more than can be counted")]
    MachineCountOverflow { recipe: String, machines: f64 },

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),
}

impl PlannerError {
    pub(crate) fn invalid_recipe(name: &str, reason: impl Into<String>) -> Self {
        Self::InvalidRecipe {
            name: name.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_target(target: &str, reason: impl Into<String>) -> Self {
        Self::InvalidTarget {
            target: target.to_string(),
            reason: reason.into(),
        }
    }
}
