//! # Delimited-text tables
//!
//! Loading and saving of labeled tables as comma- or tab-separated text.
//!
//! Layout: a header record with column labels, then one record per row. When the header's
//! first cell is empty, or the first column holds text, that column becomes the row labels;
//! otherwise rows are labeled by position.
//!
//! Input is decoded as UTF-8 first and GBK second, the two encodings spreadsheets in the
//! target environment export.

use crate::error::{Error, Result};
use crate::table::{index_labels, Table};
use log::{debug, info};
use ndarray::Array2;
use std::borrow::Cow;
use std::fs;
use std::path::Path;

/// Cell contents read as a missing value (compared case-insensitively).
const MISSING_TOKENS: [&str; 6] = ["", "na", "nan", "n/a", "null", "none"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Utf8,
    Gbk,
}

/// Loads a `.csv`, `.tsv` or `.txt` table.
pub fn load_table(path: &Path) -> Result<Table> {
    delimiter_for_extension(path)?;
    let bytes = fs::read(path)?;
    let (text, encoding) = decode(&bytes)?;
    let delimiter = sniff_delimiter(&text);
    debug!(
        "Loading {:?} as {:?} with delimiter {:?}",
        path, encoding, delimiter as char
    );
    let table = parse_table(&text, delimiter)?;
    info!(
        "Loaded {} x {} table from {:?}",
        table.nrows(),
        table.ncols(),
        path
    );
    Ok(table)
}

/// Writes a table; `.tsv`/`.txt` get tabs, anything else with a supported extension gets commas.
pub fn save_table(table: &Table, path: &Path) -> Result<()> {
    let delimiter = delimiter_for_extension(path)?;
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_path(path)?;

    let mut header = Vec::with_capacity(table.ncols() + 1);
    header.push(String::new());
    header.extend(table.col_labels().iter().cloned());
    writer.write_record(&header)?;

    for (label, row) in table.row_labels().iter().zip(table.values().rows()) {
        let mut record = Vec::with_capacity(row.len() + 1);
        record.push(label.clone());
        record.extend(row.iter().map(|v| format_value(*v)));
        writer.write_record(&record)?;
    }
    writer.flush()?;
    info!("Saved {} x {} table to {:?}", table.nrows(), table.ncols(), path);
    Ok(())
}

fn delimiter_for_extension(path: &Path) -> Result<u8> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    match ext.as_str() {
        "csv" => Ok(b','),
        "tsv" | "txt" => Ok(b'\t'),
        other => Err(Error::UnsupportedFormat(format!(
            "unsupported file extension '.{}' (expected .csv, .tsv or .txt)",
            other
        ))),
    }
}

/// Decodes UTF-8 (with or without BOM), falling back to GBK.
pub fn decode(bytes: &[u8]) -> Result<(Cow<'_, str>, TextEncoding)> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    if let Ok(text) = std::str::from_utf8(bytes) {
        return Ok((Cow::Borrowed(text), TextEncoding::Utf8));
    }
    encoding_rs::GBK
        .decode_without_bom_handling_and_without_replacement(bytes)
        .map(|text| (text, TextEncoding::Gbk))
        .ok_or_else(|| Error::Decode("input is neither valid UTF-8 nor GBK text".to_string()))
}

/// Tab when the header line contains one, comma otherwise.
fn sniff_delimiter(text: &str) -> u8 {
    let header = text.lines().next().unwrap_or("");
    if header.contains('\t') {
        b'\t'
    } else {
        b','
    }
}

fn parse_table(text: &str, delimiter: u8) -> Result<Table> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let mut records = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.iter().all(|cell| cell.is_empty()) {
            continue;
        }
        records.push(record.iter().map(str::to_string).collect::<Vec<String>>());
    }

    let Some((header, body)) = records.split_first() else {
        return Err(Error::input("file contains no header"));
    };
    if body.is_empty() {
        return Err(Error::input("file contains no data rows"));
    }

    let width = header.len();
    for (i, record) in body.iter().enumerate() {
        if record.len() != width {
            return Err(Error::input(format!(
                "record {} has {} fields, header has {}",
                i + 2,
                record.len(),
                width
            )));
        }
    }

    let labeled = header[0].is_empty() || body.iter().any(|r| parse_cell(&r[0]).is_none());
    let first_value = usize::from(labeled);
    let col_labels: Vec<String> = header[first_value..].to_vec();
    let row_labels = if labeled {
        body.iter().map(|r| r[0].clone()).collect()
    } else {
        index_labels(body.len())
    };

    let n_cols = col_labels.len();
    let mut values = Array2::from_elem((body.len(), n_cols), f64::NAN);
    for (i, record) in body.iter().enumerate() {
        for (j, cell) in record[first_value..].iter().enumerate() {
            values[[i, j]] = parse_cell(cell).ok_or_else(|| {
                Error::input(format!(
                    "non-numeric value '{}' at row '{}', column '{}'",
                    cell, row_labels[i], col_labels[j]
                ))
            })?;
        }
    }

    Table::new(row_labels, col_labels, values)
}

/// `Some(NaN)` for missing tokens, `None` for text that is not a number.
fn parse_cell(cell: &str) -> Option<f64> {
    let lowered = cell.to_ascii_lowercase();
    if MISSING_TOKENS.contains(&lowered.as_str()) {
        return Some(f64::NAN);
    }
    cell.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn format_value(v: f64) -> String {
    if v.is_nan() {
        String::new()
    } else {
        v.to_string()
    }
}
