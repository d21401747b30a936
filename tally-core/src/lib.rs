//! tally-core: transaction table types and description normalization

pub mod normalize;
pub mod table;

pub use normalize::{normalize, normalize_opt};
pub use table::{
    LabelSource, RawTable, TransactionRecord, TransactionTable, AMOUNT_COLUMN, DATE_COLUMN,
    DATE_FORMAT, DESCRIPTION_CLEAN_COLUMN, DESCRIPTION_COLUMN,
};
