//! Error types for the planner crate.

use thiserror::Error;

/// Errors raised while synthesizing a statement.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    /// An identifier taken from the catalog is not a plain SQL identifier.
    #[error("invalid identifier '{0}'")]
    InvalidIdentifier(String),

    /// A table referenced by the plan is not in the catalog.
    #[error("table {0} is not in the catalog")]
    UnknownTable(String),
}
