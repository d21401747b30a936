//! Plain-text rendering for the console output of each command.

use rust_decimal::{Decimal, RoundingStrategy};
use std::fmt::Write;
use tally_core::TransactionTable;
use tally_finance::{CategoryCount, MonthlySpend, SpendSummary};

const MAX_CELL: usize = 40;

/// `$1,995.50`, `-$12.40`
pub fn format_money(amount: Decimal) -> String {
    let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let text = format!("{:.2}", rounded.abs());
    let (whole, frac) = text.split_once('.').unwrap_or((text.as_str(), "00"));

    let mut grouped = String::new();
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if rounded.is_sign_negative() && !rounded.is_zero() { "-" } else { "" };
    format!("{sign}${grouped}.{frac}")
}

fn clip(cell: &str) -> String {
    if cell.chars().count() <= MAX_CELL {
        cell.to_string()
    } else {
        let mut s: String = cell.chars().take(MAX_CELL - 3).collect();
        s.push_str("...");
        s
    }
}

fn grid(headers: &[String], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    let line = |out: &mut String, cells: &[String]| {
        let padded: Vec<String> = cells
            .iter()
            .zip(&widths)
            .map(|(c, w)| format!("{c:<w$}"))
            .collect();
        let _ = writeln!(out, "{}", padded.join("  ").trim_end());
    };
    line(&mut out, headers);
    for row in rows {
        line(&mut out, row);
    }
    out
}

/// First `n` rows under their column headers.
pub fn head(table: &TransactionTable, n: usize) -> String {
    let headers: Vec<String> = table.columns().iter().map(|h| clip(h)).collect();
    let rows: Vec<Vec<String>> = table
        .records
        .iter()
        .take(n)
        .map(|r| table.render_row(r).iter().map(|c| clip(c)).collect())
        .collect();
    grid(&headers, &rows)
}

pub fn shape(table: &TransactionTable) -> String {
    format!("Shape: ({}, {})", table.len(), table.columns().len())
}

pub fn columns(table: &TransactionTable) -> String {
    format!("Columns: {}", table.columns().join(", "))
}

pub fn missing(table: &TransactionTable) -> String {
    let mut out = String::from("Missing values per column:\n");
    for (column, count) in table.missing_counts() {
        let _ = writeln!(out, "  {column}: {count}");
    }
    out
}

pub fn summary(s: &SpendSummary) -> String {
    format!(
        "Total expenses: {}\nTotal income: {}\nNet: {}",
        format_money(s.total_expenses),
        format_money(s.total_income),
        format_money(s.net)
    )
}

pub fn breakdown(counts: &[CategoryCount]) -> String {
    let headers = vec!["category".to_string(), "count".to_string()];
    let rows: Vec<Vec<String>> = counts
        .iter()
        .map(|c| vec![c.category.clone(), c.count.to_string()])
        .collect();
    grid(&headers, &rows)
}

pub fn monthly(rows: &[MonthlySpend]) -> String {
    let headers = vec![
        "month".to_string(),
        "category".to_string(),
        "spend".to_string(),
    ];
    let rows: Vec<Vec<String>> = rows
        .iter()
        .map(|m| vec![m.month.clone(), m.category.clone(), format_money(m.amount_abs)])
        .collect();
    grid(&headers, &rows)
}
