//! Core types for Quarry.
//!
//! Holds the in-memory catalog snapshot (tables, columns, relationship edges)
//! and the configuration structures shared by every other crate.

pub mod catalog;
pub mod config;

pub use catalog::{
    Cardinality, Catalog, JoinKind, RelationshipEdge, TableMetadata, DEFAULT_MAX_RESULTS,
    display_name_for, is_text_type,
};
pub use config::{
    CatalogConfig, ConfigError, FormatConfig, PolicyConfig, QuarryConfig, TableOverride,
    UpstreamConfig,
};
