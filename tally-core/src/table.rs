//! Transaction table types shared by the loader, the classifiers and the reports.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub const DATE_COLUMN: &str = "date";
pub const DESCRIPTION_COLUMN: &str = "description";
pub const AMOUNT_COLUMN: &str = "amount";
pub const DESCRIPTION_CLEAN_COLUMN: &str = "description_clean";

/// Output date format (locale-free).
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Which classifier produced a category column
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum LabelSource {
    #[serde(rename = "rules")]
    Rule,
    #[serde(rename = "model")]
    Model,
}

impl LabelSource {
    /// Column name used in exported CSVs
    pub fn column(&self) -> &'static str {
        match self {
            LabelSource::Rule => "rule_category",
            LabelSource::Model => "predicted_category",
        }
    }

    pub fn from_column(name: &str) -> Option<Self> {
        match name {
            "rule_category" => Some(LabelSource::Rule),
            "predicted_category" => Some(LabelSource::Model),
            _ => None,
        }
    }
}

/// A CSV as read from disk: header row plus string cells, rows padded to the header width.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cell at (row, column); short rows read as blank.
    pub fn cell(&self, row: usize, column: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .map(String::as_str)
            .unwrap_or("")
    }
}

/// One standardized transaction row
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TransactionRecord {
    /// `None` when the column is absent or the cell did not parse
    pub date: Option<NaiveDate>,
    pub description: String,
    /// Normalized `description`, the key every classifier matches on
    pub description_clean: String,
    /// Negative = expense/debit, positive = income/credit
    pub amount: Option<Decimal>,
    pub rule_category: Option<String>,
    pub predicted_category: Option<String>,
    /// Passthrough cells, aligned with `TransactionTable::extra_columns`
    pub extra: Vec<String>,
}

impl TransactionRecord {
    pub fn is_expense(&self) -> bool {
        self.amount.is_some_and(|a| a.is_sign_negative() && !a.is_zero())
    }

    pub fn is_income(&self) -> bool {
        self.amount.is_some_and(|a| a.is_sign_positive() && !a.is_zero())
    }

    /// Nothing would survive rendering: no date, no amount, blank text and
    /// passthrough cells, no labels.
    pub fn is_blank(&self) -> bool {
        self.date.is_none()
            && self.amount.is_none()
            && self.description.trim().is_empty()
            && self.extra.iter().all(|c| c.trim().is_empty())
            && self.rule_category.is_none()
            && self.predicted_category.is_none()
    }

    pub fn category(&self, source: LabelSource) -> Option<&str> {
        match source {
            LabelSource::Rule => self.rule_category.as_deref(),
            LabelSource::Model => self.predicted_category.as_deref(),
        }
    }

    pub fn set_category(&mut self, source: LabelSource, label: impl Into<String>) {
        let label = Some(label.into());
        match source {
            LabelSource::Rule => self.rule_category = label,
            LabelSource::Model => self.predicted_category = label,
        }
    }
}

/// Standardized table: typed canonical fields plus a passthrough side-table.
///
/// Column order is always `[date, description, amount, description_clean, ...extra, ...labels]`,
/// with `date`/`amount` present only when the input had them.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TransactionTable {
    pub has_date: bool,
    pub has_amount: bool,
    pub extra_columns: Vec<String>,
    /// Category columns, in the order they were added
    pub labels: Vec<LabelSource>,
    pub records: Vec<TransactionRecord>,
}

impl TransactionTable {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn has_label(&self, source: LabelSource) -> bool {
        self.labels.contains(&source)
    }

    /// Register a category column (no-op if already present).
    pub fn add_label(&mut self, source: LabelSource) {
        if !self.has_label(source) {
            self.labels.push(source);
        }
    }

    pub fn columns(&self) -> Vec<String> {
        let mut cols = Vec::with_capacity(4 + self.extra_columns.len() + self.labels.len());
        if self.has_date {
            cols.push(DATE_COLUMN.to_string());
        }
        cols.push(DESCRIPTION_COLUMN.to_string());
        if self.has_amount {
            cols.push(AMOUNT_COLUMN.to_string());
        }
        cols.push(DESCRIPTION_CLEAN_COLUMN.to_string());
        cols.extend(self.extra_columns.iter().cloned());
        cols.extend(self.labels.iter().map(|l| l.column().to_string()));
        cols
    }

    /// Textual form of one record, aligned with `columns()`.
    pub fn render_row(&self, record: &TransactionRecord) -> Vec<String> {
        let mut row = Vec::with_capacity(4 + self.extra_columns.len() + self.labels.len());
        if self.has_date {
            row.push(
                record
                    .date
                    .map(|d| d.format(DATE_FORMAT).to_string())
                    .unwrap_or_default(),
            );
        }
        row.push(record.description.clone());
        if self.has_amount {
            row.push(record.amount.map(|a| a.to_string()).unwrap_or_default());
        }
        row.push(record.description_clean.clone());
        for i in 0..self.extra_columns.len() {
            row.push(record.extra.get(i).cloned().unwrap_or_default());
        }
        for label in &self.labels {
            row.push(record.category(*label).unwrap_or_default().to_string());
        }
        row
    }

    /// Back to header + string cells (the export shape).
    pub fn to_raw(&self) -> RawTable {
        RawTable {
            headers: self.columns(),
            rows: self.records.iter().map(|r| self.render_row(r)).collect(),
        }
    }

    /// Unset or blank cells per output column.
    pub fn missing_counts(&self) -> Vec<(String, usize)> {
        let columns = self.columns();
        let mut counts = vec![0usize; columns.len()];
        for record in &self.records {
            for (i, cell) in self.render_row(record).iter().enumerate() {
                if cell.trim().is_empty() {
                    counts[i] += 1;
                }
            }
        }
        columns.into_iter().zip(counts).collect()
    }
}
