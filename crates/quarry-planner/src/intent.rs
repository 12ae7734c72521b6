//! Intent classification.
//!
//! Classification is data-driven: an ordered list of [`IntentRule`]s maps
//! keyword sets to an intent, and an ordered list of [`ResolutionStep`]s
//! decides which catalog tables a question is about. Both lists are
//! evaluated first-match-wins. All matching is case-insensitive substring
//! matching over the raw question.

use quarry_core::Catalog;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Phrases asking for a number of rows.
pub const COUNT_KEYWORDS: &[&str] = &[
    "count",
    "how many",
    "number of",
    "số lượng",
    "đếm",
    "bao nhiêu",
    "tổng số",
];

/// Phrases asking for rows to be listed.
pub const LIST_KEYWORDS: &[&str] = &[
    "list",
    "show",
    "display",
    "liệt kê",
    "danh sách",
    "hiển thị",
];

/// Question terms referring to people or accounts.
pub const USER_QUERY_TERMS: &[&str] = &[
    "user",
    "customer",
    "account",
    "member",
    "client",
    "người dùng",
    "khách hàng",
    "tài khoản",
    "thành viên",
    "khachhang",
    "nguoidung",
];

/// Table name fragments for user/account/customer-like tables.
pub const USER_TABLE_FRAGMENTS: &[&str] = &[
    "user",
    "customer",
    "account",
    "member",
    "client",
    "khachhang",
    "nguoidung",
    "taikhoan",
];

/// Generic words asking about "the data" without naming a table.
pub const GENERIC_DATA_TERMS: &[&str] = &["dữ liệu", "bản ghi", "thông tin", "records"];

/// What the question asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Intent {
    Count,
    List,
    Search,
    CountAndList,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Count => "COUNT",
            Intent::List => "LIST",
            Intent::Search => "SEARCH",
            Intent::CountAndList => "COUNT_AND_LIST",
        }
    }

    pub fn wants_count(&self) -> bool {
        matches!(self, Intent::Count | Intent::CountAndList)
    }

    pub fn wants_rows(&self) -> bool {
        !matches!(self, Intent::Count)
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named set of lowercase phrases.
#[derive(Debug, Clone)]
pub struct KeywordSet {
    name: String,
    keywords: Vec<String>,
}

impl KeywordSet {
    pub fn new<I, S>(name: impl Into<String>, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            name: name.into(),
            keywords: keywords
                .into_iter()
                .map(|k| k.as_ref().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    /// `lowered` must already be lowercase.
    pub fn matches(&self, lowered: &str) -> bool {
        self.keywords.iter().any(|k| lowered.contains(k.as_str()))
    }
}

/// Maps to `intent` when every keyword set in `requires` matches.
#[derive(Debug, Clone)]
pub struct IntentRule {
    pub intent: Intent,
    pub requires: Vec<KeywordSet>,
}

impl IntentRule {
    pub fn new(intent: Intent, requires: Vec<KeywordSet>) -> Self {
        Self { intent, requires }
    }

    pub fn matches(&self, lowered: &str) -> bool {
        !self.requires.is_empty() && self.requires.iter().all(|set| set.matches(lowered))
    }
}

/// One table resolution strategy.
#[derive(Debug, Clone)]
pub enum ResolutionStep {
    /// Tables whose name or display name occurs in the question, plus
    /// their direct relationship neighbours.
    CatalogMention,
    /// When a term matches, every table whose name contains a fragment.
    Synonyms {
        query_terms: KeywordSet,
        table_fragments: Vec<String>,
    },
    /// When a term matches, every catalog table.
    AllTables { query_terms: KeywordSet },
}

impl ResolutionStep {
    fn kind(&self) -> Resolution {
        match self {
            ResolutionStep::CatalogMention => Resolution::CatalogMention,
            ResolutionStep::Synonyms { .. } => Resolution::Synonyms,
            ResolutionStep::AllTables { .. } => Resolution::AllTables,
        }
    }

    fn resolve(&self, query: &str, lowered: &str, catalog: &Catalog) -> BTreeSet<String> {
        let mut tables = BTreeSet::new();
        match self {
            ResolutionStep::CatalogMention => {
                for meta in catalog.tables().filter(|t| t.mentioned_in(query)) {
                    tables.insert(meta.name.clone());
                    for related in meta.related_tables() {
                        if catalog.contains(related) {
                            tables.insert(related.to_string());
                        }
                    }
                }
            }
            ResolutionStep::Synonyms {
                query_terms,
                table_fragments,
            } => {
                if query_terms.matches(lowered) {
                    for name in catalog.table_names() {
                        let name_lower = name.to_lowercase();
                        if table_fragments.iter().any(|f| name_lower.contains(f.as_str())) {
                            tables.insert(name.to_string());
                        }
                    }
                }
            }
            ResolutionStep::AllTables { query_terms } => {
                if query_terms.matches(lowered) {
                    tables.extend(catalog.table_names().map(String::from));
                }
            }
        }
        tables
    }
}

/// Which resolution step produced the table set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    CatalogMention,
    Synonyms,
    AllTables,
    Unresolved,
}

/// Result of classifying one question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub intent: Intent,
    pub tables: BTreeSet<String>,
    pub resolution: Resolution,
}

impl Classification {
    /// No relevant table: a valid outcome, not an error.
    pub fn is_unresolved(&self) -> bool {
        self.tables.is_empty()
    }
}

pub trait IntentClassifier: Send + Sync {
    fn classify(&self, query: &str, catalog: &Catalog) -> Classification;
}

/// Rule-table classifier with the built-in bilingual keywords.
#[derive(Debug, Clone)]
pub struct KeywordClassifier {
    rules: Vec<IntentRule>,
    fallback: Intent,
    steps: Vec<ResolutionStep>,
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        let count = KeywordSet::new("count", COUNT_KEYWORDS);
        let list = KeywordSet::new("list", LIST_KEYWORDS);
        let rules = vec![
            IntentRule::new(Intent::CountAndList, vec![count.clone(), list.clone()]),
            IntentRule::new(Intent::Count, vec![count]),
            IntentRule::new(Intent::List, vec![list]),
        ];
        let steps = vec![
            ResolutionStep::CatalogMention,
            ResolutionStep::Synonyms {
                query_terms: KeywordSet::new("user_terms", USER_QUERY_TERMS),
                table_fragments: USER_TABLE_FRAGMENTS.iter().map(|f| f.to_string()).collect(),
            },
            ResolutionStep::AllTables {
                query_terms: KeywordSet::new("generic_data", GENERIC_DATA_TERMS),
            },
        ];
        Self::new(rules, Intent::Search, steps)
    }
}

impl KeywordClassifier {
    pub fn new(rules: Vec<IntentRule>, fallback: Intent, steps: Vec<ResolutionStep>) -> Self {
        Self {
            rules,
            fallback,
            steps,
        }
    }

    pub fn rules(&self) -> &[IntentRule] {
        &self.rules
    }

    pub fn steps(&self) -> &[ResolutionStep] {
        &self.steps
    }

    pub fn classify_intent(&self, query: &str) -> Intent {
        let lowered = query.to_lowercase();
        self.rules
            .iter()
            .find(|r| r.matches(&lowered))
            .map(|r| r.intent)
            .unwrap_or(self.fallback)
    }

    pub fn resolve_tables(&self, query: &str, catalog: &Catalog) -> (BTreeSet<String>, Resolution) {
        let lowered = query.to_lowercase();
        for step in &self.steps {
            let tables = step.resolve(query, &lowered, catalog);
            if !tables.is_empty() {
                return (tables, step.kind());
            }
        }
        (BTreeSet::new(), Resolution::Unresolved)
    }
}

impl IntentClassifier for KeywordClassifier {
    fn classify(&self, query: &str, catalog: &Catalog) -> Classification {
        let intent = self.classify_intent(query);
        let (tables, resolution) = self.resolve_tables(query, catalog);
        tracing::debug!(
            %intent,
            ?resolution,
            tables = ?tables,
            "classified question"
        );
        Classification {
            intent,
            tables,
            resolution,
        }
    }
}
