//! Quarry planner.
//!
//! Turns a raw question into an [`Intent`] plus the set of catalog tables it
//! concerns, and synthesizes one parameterized [`Statement`] per table.
//! Identifiers in generated SQL only ever come from the catalog; values that
//! originate from the question are always bound parameters.

pub mod error;
pub mod intent;
pub mod synth;

pub use error::PlanError;
pub use intent::{
    Classification, Intent, IntentClassifier, IntentRule, KeywordClassifier, KeywordSet,
    Resolution, ResolutionStep,
};
pub use synth::{
    Statement, build_count, build_list, build_search, join_clause, quote_ident, quote_literal,
};
