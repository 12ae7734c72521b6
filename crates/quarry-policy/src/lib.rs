//! Quarry security policy.
//!
//! Decides which tables may enter the catalog and which columns are
//! sensitive. Table decisions are taken once while the catalog is built;
//! column sensitivity is consulted both when the catalog is built (search and
//! count eligibility) and when rows are rendered (masking).

use quarry_core::PolicyConfig;
use std::collections::BTreeSet;

/// Tables that never enter the catalog, compared case-insensitively.
pub const DENIED_TABLES: &[&str] = &[
    "password",
    "passwords",
    "password_resets",
    "password_reset_tokens",
    "password_history",
    "session",
    "sessions",
    "user_sessions",
    "audit",
    "audit_log",
    "audit_logs",
    "audit_trail",
    "admin",
    "admins",
    "admin_users",
    "security_tokens",
    "personal_access_tokens",
    "oauth_access_tokens",
    "oauth_refresh_tokens",
    "api_tokens",
    "refresh_tokens",
];

/// Name fragments marking migration or metadata tables.
pub const MIGRATION_TABLE_FRAGMENTS: &[&str] = &["flyway", "schema"];

/// Column name fragments that mark a column as sensitive.
pub const SENSITIVE_COLUMN_FRAGMENTS: &[&str] = &[
    "password", "secret", "token", "key", "salt", "hash", "pin", "security", "private",
];

/// Outcome of a table check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableDecision {
    Allowed,
    /// Name contains a migration/metadata fragment.
    MigrationTable,
    DenyListed,
    /// An allow-list is configured and the table is not on it.
    NotInAllowList,
}

impl TableDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, TableDecision::Allowed)
    }
}

/// Table and column policy. All comparisons are case-insensitive.
#[derive(Debug, Clone)]
pub struct SecurityPolicy {
    allowed_tables: BTreeSet<String>,
    denied_tables: BTreeSet<String>,
    sensitive_fragments: Vec<String>,
}

impl Default for SecurityPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl SecurityPolicy {
    /// Built-in deny-list and fragments, no allow-list.
    pub fn new() -> Self {
        Self {
            allowed_tables: BTreeSet::new(),
            denied_tables: DENIED_TABLES.iter().map(|t| t.to_string()).collect(),
            sensitive_fragments: SENSITIVE_COLUMN_FRAGMENTS
                .iter()
                .map(|f| f.to_string())
                .collect(),
        }
    }

    /// Built-in lists extended with the configured ones.
    pub fn from_config(config: &PolicyConfig) -> Self {
        let mut policy = Self::new();
        for t in &config.allowed_tables {
            policy = policy.with_allowed_table(t);
        }
        for t in &config.denied_tables {
            policy = policy.with_denied_table(t);
        }
        for f in &config.sensitive_column_fragments {
            policy = policy.with_sensitive_fragment(f);
        }
        tracing::debug!(
            allowed = policy.allowed_tables.len(),
            denied = policy.denied_tables.len(),
            fragments = policy.sensitive_fragments.len(),
            "security policy configured"
        );
        policy
    }

    pub fn with_allowed_table(mut self, table: impl AsRef<str>) -> Self {
        self.allowed_tables.insert(table.as_ref().to_lowercase());
        self
    }

    pub fn with_denied_table(mut self, table: impl AsRef<str>) -> Self {
        self.denied_tables.insert(table.as_ref().to_lowercase());
        self
    }

    pub fn with_sensitive_fragment(mut self, fragment: impl AsRef<str>) -> Self {
        let fragment = fragment.as_ref().to_lowercase();
        if !fragment.is_empty() && !self.sensitive_fragments.contains(&fragment) {
            self.sensitive_fragments.push(fragment);
        }
        self
    }

    pub fn table_decision(&self, table: &str) -> TableDecision {
        let lowered = table.to_lowercase();
        if MIGRATION_TABLE_FRAGMENTS
            .iter()
            .any(|f| lowered.contains(f))
        {
            return TableDecision::MigrationTable;
        }
        if self.denied_tables.contains(&lowered) {
            return TableDecision::DenyListed;
        }
        if !self.allowed_tables.is_empty() && !self.allowed_tables.contains(&lowered) {
            return TableDecision::NotInAllowList;
        }
        TableDecision::Allowed
    }

    pub fn is_table_allowed(&self, table: &str) -> bool {
        self.table_decision(table).is_allowed()
    }

    /// Substring match against the sensitive fragments: `api_key_hint` is
    /// sensitive because it contains `key`.
    pub fn is_sensitive_column(&self, column: &str) -> bool {
        let lowered = column.to_lowercase();
        self.sensitive_fragments
            .iter()
            .any(|f| lowered.contains(f.as_str()))
    }
}
