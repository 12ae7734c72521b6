//! Quarry runtime.
//!
//! Builds the catalog once from a [`SchemaSource`] and answers questions
//! through an [`Orchestrator`] backed by a [`QueryExecutor`]. Database access
//! is behind those two traits; `quarry-adapter-pg` provides the Postgres
//! implementations.

pub mod adapter;
pub mod catalog;
pub mod format;
pub mod orchestrator;

pub use adapter::{ColumnInfo, ForeignKeyInfo, QueryExecutor, QuerySession, ResultRow, SchemaSource};
pub use catalog::{CatalogError, build_catalog, build_relationships};
pub use format::{NO_MATCHING_TABLE, NO_RESULTS, ResultFormatter, database_error};
pub use orchestrator::{Orchestrator, QueryPlan, TablePlan};
