//! Error kinds raised while generating polygons for one task.

use std::time::Duration;

use thiserror::Error;

use crate::models::AdminLevel;

#[derive(Debug, Error)]
pub enum GenerateError {
    /// No admin-area records exist for the task. Not a failure; the task is skipped.
    #[error("no ADM{level} areas found in {country}")]
    EmptySelection { country: String, level: AdminLevel },

    /// Too few sites, or all of them collinear.
    #[error("cannot tessellate {sites} sites: {reason}")]
    DegenerateInput { sites: usize, reason: String },

    #[error("geometry operation failed: {0}")]
    GeometryOperation(String),

    #[error("no outline for country {0}")]
    MissingCountryOutline(String),

    #[error("task exceeded its budget of {budget:?}")]
    BudgetExceeded { budget: Duration },
}

impl GenerateError {
    /// Whether the task simply had nothing to generate.
    pub fn is_empty_selection(&self) -> bool {
        matches!(self, GenerateError::EmptySelection { .. })
    }
}
