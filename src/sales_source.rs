use crate::csv_loader::LoadError;
use crate::sale_record::SaleRecord;
use crate::sqlite_store::StoreError;

/// Trait for the data-access collaborator that supplies sales line items.
///
/// Implementations can be:
/// - In-memory vector (for testing)
/// - SQLite database
/// - CSV file
pub trait SalesSource {
    /// Returns every sale known to the source, in storage order.
    ///
    /// # Errors
    /// Returns an error if the source cannot be read or a required column is
    /// missing from it.
    fn load_sales(&self) -> Result<Vec<SaleRecord>, SalesSourceError>;
}

/// Errors that can occur when reading from a sales source.
#[derive(Debug, Clone, PartialEq)]
pub enum SalesSourceError {
    /// The source lacks a column the pricing engine needs
    MissingColumn(String),
    /// A row could not be interpreted
    InvalidRow(String),
    /// Generic error message
    Other(String),
}

impl std::fmt::Display for SalesSourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SalesSourceError::MissingColumn(column) => write!(f, "Missing required column: {}", column),
            SalesSourceError::InvalidRow(msg) => write!(f, "Invalid row: {}", msg),
            SalesSourceError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for SalesSourceError {}

impl From<LoadError> for SalesSourceError {
    fn from(err: LoadError) -> Self {
        match err {
            LoadError::MissingColumn(column) => SalesSourceError::MissingColumn(column),
            LoadError::InvalidRow { .. } => SalesSourceError::InvalidRow(err.to_string()),
            _ => SalesSourceError::Other(err.to_string()),
        }
    }
}

impl From<StoreError> for SalesSourceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::MissingColumn(column) => SalesSourceError::MissingColumn(column),
            StoreError::InvalidRow { .. } => SalesSourceError::InvalidRow(err.to_string()),
            _ => SalesSourceError::Other(err.to_string()),
        }
    }
}

/// In-memory sales source for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemorySalesSource {
    records: Vec<SaleRecord>,
}

impl InMemorySalesSource {
    pub fn new() -> Self {
        InMemorySalesSource { records: Vec::new() }
    }

    /// Appends a record to the source.
    pub fn add_record(&mut self, record: SaleRecord) {
        self.records.push(record);
    }

    /// Clears all data from the source.
    pub fn clear(&mut self) {
        self.records.clear();
    }
}

impl From<Vec<SaleRecord>> for InMemorySalesSource {
    fn from(records: Vec<SaleRecord>) -> Self {
        InMemorySalesSource { records }
    }
}

impl SalesSource for InMemorySalesSource {
    fn load_sales(&self) -> Result<Vec<SaleRecord>, SalesSourceError> {
        Ok(self.records.clone())
    }
}
