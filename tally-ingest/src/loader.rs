//! Read a transaction CSV from disk into a standardized table.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use tally_core::{RawTable, TransactionTable};
use tracing::{info, warn};

use crate::schema::standardize;
use crate::types::{IngestError, LoadOptions, Result};

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Load a CSV file: decode, parse, standardize.
pub fn load(path: impl AsRef<Path>, options: &LoadOptions) -> Result<TransactionTable> {
    let path = path.as_ref();
    let raw = read_raw(path, options.lossy_decode)?;
    let table = standardize(&raw, &options.standardize())?;
    info!(
        path = %path.display(),
        rows = table.len(),
        columns = table.columns().len(),
        "loaded transactions"
    );
    Ok(table)
}

/// Load CSV text that is already in memory.
pub fn load_str(text: &str, options: &LoadOptions) -> Result<TransactionTable> {
    standardize(&parse_raw(text)?, &options.standardize())
}

pub fn read_raw(path: impl AsRef<Path>, lossy_decode: bool) -> Result<RawTable> {
    let bytes = fs::read(path.as_ref())?;
    let text = decode(&bytes, lossy_decode)?;
    parse_raw(&text)
}

/// UTF-8 decode with an optional second, lossy attempt that drops invalid sequences.
pub fn decode(bytes: &[u8], lossy: bool) -> Result<String> {
    // Offsets are reported against the file, BOM included.
    let (bytes, skipped) = match bytes.strip_prefix(UTF8_BOM) {
        Some(rest) => (rest, UTF8_BOM.len()),
        None => (bytes, 0),
    };
    match std::str::from_utf8(bytes) {
        Ok(s) => Ok(s.to_string()),
        Err(e) if lossy => {
            warn!(
                offset = skipped + e.valid_up_to(),
                "invalid UTF-8, dropping undecodable bytes"
            );
            Ok(bytes.utf8_chunks().map(|chunk| chunk.valid()).collect())
        }
        Err(e) => Err(IngestError::Decode {
            offset: skipped + e.valid_up_to(),
        }),
    }
}

/// Parse CSV text with a header row. Short rows are padded with blanks; a row
/// with more fields than the header is an error.
pub fn parse_raw(text: &str) -> Result<RawTable> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .has_headers(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
    if headers.is_empty() {
        return Err(IngestError::EmptyInput);
    }
    let headers = clean_headers(headers);
    let width = headers.len();

    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result?;
        if record.len() > width {
            return Err(IngestError::Malformed {
                line: record.position().map(|p| p.line()).unwrap_or(0),
                expected: width,
                found: record.len(),
            });
        }
        let mut row: Vec<String> = record.iter().map(str::to_string).collect();
        row.resize(width, String::new());
        rows.push(row);
    }

    Ok(RawTable::new(headers, rows))
}

/// Blank headers become `Unnamed: <index>`; repeated headers get `.1`, `.2`, ...
pub fn clean_headers(headers: Vec<String>) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut out = Vec::with_capacity(headers.len());

    for (i, header) in headers.into_iter().enumerate() {
        let base = if header.trim().is_empty() {
            format!("Unnamed: {i}")
        } else {
            header
        };

        let mut name = base.clone();
        let mut n = 1;
        while seen.contains(&name) {
            name = format!("{base}.{n}");
            n += 1;
        }
        seen.insert(name.clone());
        out.push(name);
    }

    out
}
