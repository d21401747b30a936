//! Deterministic keyword rules mapping normalized descriptions to categories.
//!
//! Rules are scanned in declaration order and the first keyword found as a
//! substring wins, so `"UBER EATS SHELL"` is Transport, not Gas.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tally_core::{LabelSource, TransactionTable};
use tracing::debug;

/// Category for descriptions no rule matches
pub const OTHER: &str = "Other";

/// Built-in rule table, in match order
pub const DEFAULT_RULES: &[(&str, &str)] = &[
    ("STARBUCKS", "Coffee"),
    ("UBER", "Transport"),
    ("LYFT", "Transport"),
    ("SHELL", "Gas"),
    ("CHEVRON", "Gas"),
    ("AMAZON", "Shopping"),
    ("WHOLE FOODS", "Groceries"),
    ("WALMART", "Groceries"),
    ("NETFLIX", "Entertainment"),
    ("SPOTIFY", "Entertainment"),
    ("CHIPOTLE", "Dining"),
    ("PAYROLL", "Income"),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordRule {
    pub keyword: String,
    pub category: String,
}

impl KeywordRule {
    pub fn new(keyword: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            category: category.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RulesFile {
    #[serde(default)]
    rules: Vec<KeywordRule>,
}

/// Ordered keyword -> category table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleClassifier {
    rules: Vec<KeywordRule>,
}

impl Default for RuleClassifier {
    fn default() -> Self {
        Self::new(
            DEFAULT_RULES
                .iter()
                .map(|(k, c)| KeywordRule::new(*k, *c))
                .collect(),
        )
    }
}

impl RuleClassifier {
    /// Keywords are uppercased; blank keywords are dropped (they would match everything).
    pub fn new(rules: Vec<KeywordRule>) -> Self {
        let rules = rules
            .into_iter()
            .filter(|r| !r.keyword.trim().is_empty())
            .map(|r| KeywordRule {
                keyword: r.keyword.to_uppercase(),
                category: r.category,
            })
            .collect();
        Self { rules }
    }

    /// Parse a rules file:
    ///
    /// ```toml
    /// [[rules]]
    /// keyword = "STARBUCKS"
    /// category = "Coffee"
    /// ```
    pub fn from_toml(content: &str) -> Result<Self> {
        let file: RulesFile = toml::from_str(content).context("parse rules file")?;
        Ok(Self::new(file.rules))
    }

    pub fn from_path(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("read {}", path.display()))?;
        Self::from_toml(&content).with_context(|| format!("rules file {}", path.display()))
    }

    pub fn rules(&self) -> &[KeywordRule] {
        &self.rules
    }

    /// Category of the first rule whose keyword occurs in `description_clean`.
    pub fn categorize(&self, description_clean: &str) -> &str {
        let text = description_clean.to_uppercase();
        self.rules
            .iter()
            .find(|r| text.contains(&r.keyword))
            .map(|r| r.category.as_str())
            .unwrap_or(OTHER)
    }

    /// Missing text is `Other`.
    pub fn categorize_opt(&self, description_clean: Option<&str>) -> &str {
        description_clean.map_or(OTHER, |d| self.categorize(d))
    }

    /// Fill `rule_category` for every record; nothing else is touched.
    pub fn apply(&self, table: &mut TransactionTable) {
        for record in &mut table.records {
            let label = self.categorize(&record.description_clean).to_string();
            record.set_category(LabelSource::Rule, label);
        }
        table.add_label(LabelSource::Rule);

        let other = table
            .records
            .iter()
            .filter(|r| r.rule_category.as_deref() == Some(OTHER))
            .count();
        debug!(rows = table.len(), other, "applied keyword rules");
    }
}
