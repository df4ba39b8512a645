//! Loads sales line items from flat CSV exports.
//!
//! Headers are matched after normalisation (see
//! [`normalize_column_name`](crate::sale_record::normalize_column_name)), so both
//! the public `"Product line"` style and the database `Product_line` style work.
//! Columns the pricing engine does not use are either captured as
//! [`SaleAttributes`] or ignored.

use crate::sale_record::{
    normalize_column_name, parse_sale_date, SaleAttributes, SaleRecord, REQUIRED_COLUMNS,
};
use crate::sales_source::{SalesSource, SalesSourceError};
use csv::{ReaderBuilder, StringRecord};
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Errors that can occur while loading a CSV file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    /// The file could not be opened
    Io(String),
    /// The CSV itself is malformed
    Csv(String),
    /// A required column is absent from the header row
    MissingColumn(String),
    /// A data row holds a value that cannot be parsed
    InvalidRow { line: u64, reason: String },
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadError::Io(msg) => write!(f, "I/O error: {}", msg),
            LoadError::Csv(msg) => write!(f, "CSV error: {}", msg),
            LoadError::MissingColumn(column) => write!(f, "Missing required column: {}", column),
            LoadError::InvalidRow { line, reason } => write!(f, "Line {}: {}", line, reason),
        }
    }
}

impl std::error::Error for LoadError {}

impl From<csv::Error> for LoadError {
    fn from(err: csv::Error) -> Self {
        LoadError::Csv(err.to_string())
    }
}

/// Header positions resolved once per file.
struct ColumnIndex {
    positions: HashMap<String, usize>,
}

impl ColumnIndex {
    fn from_headers(headers: &StringRecord) -> Result<Self, LoadError> {
        let positions: HashMap<String, usize> = headers
            .iter()
            .enumerate()
            .map(|(i, name)| (normalize_column_name(name), i))
            .collect();

        for column in REQUIRED_COLUMNS {
            if !positions.contains_key(column) {
                return Err(LoadError::MissingColumn(column.to_string()));
            }
        }

        Ok(ColumnIndex { positions })
    }

    fn get<'r>(&self, row: &'r StringRecord, column: &str) -> Option<&'r str> {
        self.positions
            .get(column)
            .and_then(|&i| row.get(i))
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }

    fn text(&self, row: &StringRecord, column: &str) -> Option<String> {
        self.get(row, column).map(str::to_string)
    }

    fn number(&self, row: &StringRecord, column: &str) -> Option<f64> {
        self.get(row, column).and_then(|v| v.parse::<f64>().ok())
    }
}

/// Loads all sales from a CSV file on disk.
pub fn load_sales_csv<P: AsRef<Path>>(path: P) -> Result<Vec<SaleRecord>, LoadError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| LoadError::Io(format!("{}: {}", path.display(), e)))?;
    let records = read_sales_csv(file)?;
    log::info!("Loaded {} sales from {}", records.len(), path.display());
    Ok(records)
}

/// Reads sales from any CSV reader with a header row.
pub fn read_sales_csv<R: Read>(reader: R) -> Result<Vec<SaleRecord>, LoadError> {
    let mut rdr = ReaderBuilder::new().flexible(true).from_reader(reader);
    let columns = ColumnIndex::from_headers(rdr.headers()?)?;

    let mut records = Vec::new();
    for result in rdr.records() {
        let row = result?;
        // Header is line 1
        let line = row.position().map(|p| p.line()).unwrap_or(records.len() as u64 + 2);
        records.push(parse_row(&columns, &row, line)?);
    }

    Ok(records)
}

fn parse_row(columns: &ColumnIndex, row: &StringRecord, line: u64) -> Result<SaleRecord, LoadError> {
    let invalid = |reason: String| LoadError::InvalidRow { line, reason };

    let product_line = columns
        .text(row, "product_line")
        .ok_or_else(|| invalid("empty product_line".to_string()))?;

    let raw_date = columns.get(row, "date").unwrap_or_default();
    let date = parse_sale_date(raw_date).ok_or_else(|| invalid(format!("invalid date '{}'", raw_date)))?;

    let unit_price = columns
        .number(row, "unit_price")
        .ok_or_else(|| invalid("invalid unit_price".to_string()))?;

    let raw_quantity = columns.get(row, "quantity").unwrap_or_default();
    let quantity = parse_quantity(raw_quantity)
        .ok_or_else(|| invalid(format!("invalid quantity '{}'", raw_quantity)))?;

    let gross_income = columns
        .number(row, "gross_income")
        .ok_or_else(|| invalid("invalid gross_income".to_string()))?;

    let attributes = SaleAttributes {
        invoice_id: columns.text(row, "invoice_id"),
        branch: columns.text(row, "branch"),
        customer_type: columns.text(row, "customer_type"),
        gender: columns.text(row, "gender"),
        total: columns.number(row, "total"),
        payment: columns.text(row, "payment"),
        time: columns.text(row, "time"),
        rating: columns.number(row, "rating"),
    };

    Ok(SaleRecord::new(
        product_line,
        columns.text(row, "city"),
        date,
        unit_price,
        quantity,
        gross_income,
    )
    .with_attributes(attributes))
}

/// Accepts integers and integral floats such as `"7.0"`.
pub(crate) fn parse_quantity(raw: &str) -> Option<u32> {
    raw.parse::<u32>().ok().or_else(|| {
        let value = raw.parse::<f64>().ok()?;
        (value.fract() == 0.0 && value >= 0.0 && value <= u32::MAX as f64).then(|| value as u32)
    })
}

/// A CSV file acting as a [`SalesSource`]; the file is re-read on every load.
#[derive(Debug, Clone)]
pub struct CsvSalesSource {
    path: PathBuf,
}

impl CsvSalesSource {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        CsvSalesSource { path: path.into() }
    }
}

impl SalesSource for CsvSalesSource {
    fn load_sales(&self) -> Result<Vec<SaleRecord>, SalesSourceError> {
        Ok(load_sales_csv(&self.path)?)
    }
}
