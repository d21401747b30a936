//! Write a standardized (and possibly labeled) table back out as CSV.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use tally_core::TransactionTable;

use crate::types::Result;

pub fn write_csv<W: Write>(table: &TransactionTable, writer: W) -> Result<()> {
    let raw = table.to_raw();
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(&raw.headers)?;
    for row in &raw.rows {
        wtr.write_record(row)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_csv_path(table: &TransactionTable, path: impl AsRef<Path>) -> Result<()> {
    let file = File::create(path.as_ref())?;
    write_csv(table, BufWriter::new(file))
}

pub fn to_csv_string(table: &TransactionTable) -> Result<String> {
    let mut buf = Vec::new();
    write_csv(table, &mut buf)?;
    Ok(String::from_utf8(buf)?)
}
