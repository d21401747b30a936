//! Schema standardization: variant bank headers -> canonical transaction table.
//!
//! Headers are matched case-insensitively after trimming. For each canonical
//! field the earliest-listed synonym that is present wins, whatever its column
//! position: with headers `posted,Date` the `Date` column becomes `date`.

use tally_core::{LabelSource, RawTable, TransactionRecord, TransactionTable, normalize};
use tracing::{debug, warn};

use crate::parsers::{parse_amount, parse_date};
use crate::types::{HeaderFallback, IngestError, Result, StandardizeOptions};

pub const DATE_SYNONYMS: &[&str] = &["date", "posted", "transaction date"];
pub const DESCRIPTION_SYNONYMS: &[&str] = &["description", "merchant", "details"];
pub const AMOUNT_SYNONYMS: &[&str] = &["amount", "amt", "value"];

/// Which raw column feeds each field of the standardized table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMapping {
    pub date: Option<usize>,
    pub description: Option<usize>,
    pub amount: Option<usize>,
    /// An incoming `description_clean` column; dropped, the field is recomputed
    pub description_clean: Option<usize>,
    /// Incoming category columns from a previous run
    pub labels: Vec<(usize, LabelSource)>,
}

impl ColumnMapping {
    fn claims(&self, column: usize) -> bool {
        [self.date, self.description, self.amount, self.description_clean].contains(&Some(column))
            || self.labels.iter().any(|(c, _)| *c == column)
    }

    /// Columns carried through untouched, in input order.
    pub fn passthrough(&self, width: usize) -> Vec<usize> {
        (0..width).filter(|c| !self.claims(*c)).collect()
    }
}

fn header_key(header: &str) -> String {
    header.trim().to_lowercase()
}

/// Index of the column matching the earliest-listed synonym. When two headers
/// share a key the leftmost one is used.
pub fn find_column(headers: &[String], synonyms: &[&str]) -> Option<usize> {
    let keys: Vec<String> = headers.iter().map(|h| header_key(h)).collect();
    synonyms
        .iter()
        .find_map(|syn| keys.iter().position(|k| k == syn))
}

/// Resolve the canonical columns for a header row under the given fallback policy.
pub fn detect_columns(headers: &[String], fallback: HeaderFallback) -> Result<ColumnMapping> {
    let mut mapping = ColumnMapping {
        date: find_column(headers, DATE_SYNONYMS),
        description: find_column(headers, DESCRIPTION_SYNONYMS),
        amount: find_column(headers, AMOUNT_SYNONYMS),
        ..Default::default()
    };

    let keys: Vec<String> = headers.iter().map(|h| header_key(h)).collect();
    mapping.description_clean = keys
        .iter()
        .position(|k| k == tally_core::DESCRIPTION_CLEAN_COLUMN)
        .filter(|c| !mapping.claims(*c));
    for source in [LabelSource::Rule, LabelSource::Model] {
        if let Some(c) = keys.iter().position(|k| k == source.column()) {
            if !mapping.claims(c) {
                mapping.labels.push((c, source));
            }
        }
    }
    mapping.labels.sort_by_key(|(c, _)| *c);

    match fallback {
        HeaderFallback::Positional => {
            if mapping.description.is_none() && !headers.is_empty() && !mapping.claims(0) {
                warn!(column = %headers[0], "no description header, using first column");
                mapping.description = Some(0);
            }
            if mapping.amount.is_none() && headers.len() > 1 && !mapping.claims(1) {
                warn!(column = %headers[1], "no amount header, using second column");
                mapping.amount = Some(1);
            }
        }
        HeaderFallback::Strict => {
            if mapping.description.is_none() {
                return Err(IngestError::MissingHeader("description"));
            }
            if mapping.amount.is_none() {
                return Err(IngestError::MissingHeader("amount"));
            }
        }
        HeaderFallback::Skip => {}
    }

    Ok(mapping)
}

fn non_blank(cell: &str) -> Option<&str> {
    if cell.trim().is_empty() { None } else { Some(cell) }
}

/// Map a raw table onto the canonical shape.
///
/// Unparseable dates and amounts become `None` and the row is kept. Rows with
/// nothing left after coercion are dropped. Running this on `table.to_raw()` of its own
/// output returns the same table.
pub fn standardize(raw: &RawTable, options: &StandardizeOptions) -> Result<TransactionTable> {
    let mapping = detect_columns(&raw.headers, options.header_fallback)?;
    let passthrough = mapping.passthrough(raw.headers.len());

    let mut table = TransactionTable {
        has_date: mapping.date.is_some(),
        has_amount: mapping.amount.is_some(),
        extra_columns: passthrough.iter().map(|&c| raw.headers[c].clone()).collect(),
        labels: mapping.labels.iter().map(|(_, s)| *s).collect(),
        records: Vec::with_capacity(raw.len()),
    };

    let mut bad_dates = 0usize;
    let mut bad_amounts = 0usize;
    let mut blank_rows = 0usize;

    for i in 0..raw.len() {
        let cell = |column: Option<usize>| column.map(|c| raw.cell(i, c));

        let date = cell(mapping.date).and_then(non_blank).and_then(|v| {
            let parsed = parse_date(v);
            if parsed.is_none() {
                bad_dates += 1;
            }
            parsed
        });

        let amount = cell(mapping.amount).and_then(non_blank).and_then(|v| {
            let parsed = parse_amount(v);
            if parsed.is_none() {
                bad_amounts += 1;
            }
            parsed
        });

        let description = cell(mapping.description).unwrap_or_default().to_string();
        let description_clean = normalize(&description);

        let mut record = TransactionRecord {
            date,
            description,
            description_clean,
            amount,
            extra: passthrough.iter().map(|&c| raw.cell(i, c).to_string()).collect(),
            ..Default::default()
        };
        for (c, source) in &mapping.labels {
            if let Some(label) = non_blank(raw.cell(i, *c)) {
                record.set_category(*source, label);
            }
        }

        // Judged after coercion: unparseable leftovers render as blank.
        if record.is_blank() {
            blank_rows += 1;
            continue;
        }
        table.records.push(record);
    }

    debug!(
        rows = table.len(),
        blank_rows, bad_dates, bad_amounts, "standardized transactions"
    );

    Ok(table)
}
