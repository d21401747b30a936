//! Per-cell coercion. A cell that does not parse yields `None`; callers keep the row.

pub mod amount;
pub mod date;

pub use amount::parse_amount;
pub use date::parse_date;
