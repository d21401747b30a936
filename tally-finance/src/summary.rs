//! Spend analytics over a labeled table: totals, category counts, monthly trend.

use std::collections::{BTreeMap, HashMap};

use chrono::Datelike;
use rust_decimal::Decimal;
use serde::Serialize;
use tally_core::{LabelSource, TransactionTable};

/// Expense/income totals. Expenses are reported as a positive magnitude.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SpendSummary {
    pub total_expenses: Decimal,
    pub total_income: Decimal,
    pub net: Decimal,
    /// Rows that had an amount
    pub counted: usize,
}

impl SpendSummary {
    /// `None` when the table has no amount column. Rows without an amount are skipped.
    pub fn from_table(table: &TransactionTable) -> Option<Self> {
        if !table.has_amount {
            return None;
        }

        let mut expenses = Decimal::ZERO;
        let mut income = Decimal::ZERO;
        let mut counted = 0;
        for amount in table.records.iter().filter_map(|r| r.amount) {
            counted += 1;
            if amount < Decimal::ZERO {
                expenses += amount;
            } else {
                income += amount;
            }
        }

        Some(Self {
            total_expenses: expenses.abs(),
            total_income: income,
            net: income + expenses,
            counted,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryCount {
    pub category: String,
    pub count: usize,
}

/// Rows per category, most frequent first; ties keep first-appearance order.
/// Rows without a label from `source` are not counted.
pub fn category_breakdown(table: &TransactionTable, source: LabelSource) -> Vec<CategoryCount> {
    let mut counts: Vec<CategoryCount> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for label in table.records.iter().filter_map(|r| r.category(source)) {
        match index.get(label) {
            Some(&i) => counts[i].count += 1,
            None => {
                index.insert(label, counts.len());
                counts.push(CategoryCount {
                    category: label.to_string(),
                    count: 1,
                });
            }
        }
    }

    counts.sort_by(|a, b| b.count.cmp(&a.count));
    counts
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthlySpend {
    /// `YYYY-MM`
    pub month: String,
    pub category: String,
    /// Signed sum (negative)
    pub amount: Decimal,
    pub amount_abs: Decimal,
}

/// Expenses grouped by (month, category), sorted by month then category.
///
/// `None` unless the table has both date and amount columns. Rows without a
/// date, without a label, or that are not expenses are skipped.
pub fn monthly_spend(table: &TransactionTable, source: LabelSource) -> Option<Vec<MonthlySpend>> {
    if !(table.has_date && table.has_amount) {
        return None;
    }

    let mut groups: BTreeMap<(String, String), Decimal> = BTreeMap::new();
    for record in &table.records {
        let (Some(date), Some(amount), Some(category)) =
            (record.date, record.amount, record.category(source))
        else {
            continue;
        };
        if amount >= Decimal::ZERO {
            continue;
        }
        let month = format!("{:04}-{:02}", date.year(), date.month());
        *groups
            .entry((month, category.to_string()))
            .or_insert(Decimal::ZERO) += amount;
    }

    Some(
        groups
            .into_iter()
            .map(|((month, category), amount)| MonthlySpend {
                month,
                category,
                amount,
                amount_abs: amount.abs(),
            })
            .collect(),
    )
}
