use crate::sale_record::{normalize_column_name, parse_sale_date, SaleAttributes, SaleRecord};
use crate::sales_source::{SalesSource, SalesSourceError};
use rusqlite::types::Value;
use rusqlite::{params, Connection, Row};
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;

/// Name of the sales table.
pub const SALES_TABLE: &str = "supermarket_sales";

/// Table columns in storage order, paired with their normalised names.
const STORED_COLUMNS: [(&str, &str); 14] = [
    ("Invoice_ID", "invoice_id"),
    ("Branch", "branch"),
    ("City", "city"),
    ("Customer_type", "customer_type"),
    ("Gender", "gender"),
    ("Product_line", "product_line"),
    ("Unit_price", "unit_price"),
    ("Quantity", "quantity"),
    ("Total", "total"),
    ("Date", "date"),
    ("Time", "time"),
    ("Payment", "payment"),
    ("gross_income", "gross_income"),
    ("Rating", "rating"),
];

const REQUIRED_STORED: [&str; 5] = ["Product_line", "Date", "Unit_price", "Quantity", "gross_income"];

/// Errors raised by the SQLite sales store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Underlying SQLite failure
    Sqlite(String),
    /// The sales table lacks a column the pricing engine needs
    MissingColumn(String),
    /// A stored row holds a value that cannot be interpreted
    InvalidRow { id: i64, reason: String },
    /// No row with the given id
    NotFound(i64),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Sqlite(msg) => write!(f, "SQL error: {}", msg),
            StoreError::MissingColumn(column) => write!(f, "Missing required column: {}", column),
            StoreError::InvalidRow { id, reason } => write!(f, "Row {}: {}", id, reason),
            StoreError::NotFound(id) => write!(f, "Sale {} not found", id),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Sqlite(err.to_string())
    }
}

/// A sale together with its row id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredSale {
    pub id: i64,
    #[serde(flatten)]
    pub record: SaleRecord,
}

/// SQLite-backed store for sales line items.
///
/// Creates the sales table on first use. Tables written by other tools are read
/// as long as they carry the required columns; unknown columns are ignored.
#[derive(Debug)]
pub struct SqliteSalesStore {
    conn: Connection,
}

impl SqliteSalesStore {
    /// Opens (or creates) a file-based store.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or the schema cannot
    /// be created.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(db_path)?;
        let store = SqliteSalesStore { conn };
        store.ensure_schema()?;
        Ok(store)
    }

    /// Creates a store backed by an in-memory database.
    ///
    /// Useful for testing.
    pub fn new_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let store = SqliteSalesStore { conn };
        store.ensure_schema()?;
        Ok(store)
    }

    /// Opens the store at `db_path`, runs `body` and closes the connection
    /// explicitly on every path.
    ///
    /// An error from `body` takes precedence over a close failure.
    pub fn with_store<P, T, F>(db_path: P, body: F) -> Result<T, StoreError>
    where
        P: AsRef<Path>,
        F: FnOnce(&mut SqliteSalesStore) -> Result<T, StoreError>,
    {
        let mut store = SqliteSalesStore::new(db_path)?;
        let result = body(&mut store);
        let closed = store.close();
        match (result, closed) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), _) => Err(e),
        }
    }

    /// Closes the connection, reporting any error SQLite raises while doing so.
    pub fn close(self) -> Result<(), StoreError> {
        self.conn.close().map_err(|(_, e)| StoreError::from(e))
    }

    fn ensure_schema(&self) -> Result<(), StoreError> {
        self.conn.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS {} (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    Invoice_ID TEXT,
                    Branch TEXT,
                    City TEXT,
                    Customer_type TEXT,
                    Gender TEXT,
                    Product_line TEXT NOT NULL,
                    Unit_price REAL NOT NULL,
                    Quantity INTEGER NOT NULL,
                    Tax_5 REAL,
                    Total REAL,
                    Date TEXT NOT NULL,
                    Time TEXT,
                    Payment TEXT,
                    cogs REAL,
                    gross_margin_percentage REAL,
                    gross_income REAL NOT NULL,
                    Rating REAL
                )",
                SALES_TABLE
            ),
            [],
        )?;

        self.conn.execute(
            &format!("CREATE INDEX IF NOT EXISTS idx_sales_date ON {}(Date)", SALES_TABLE),
            [],
        )?;

        Ok(())
    }

    /// Checks if a table exists in the database.
    pub fn table_exists(&self, table_name: &str) -> Result<bool, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' AND name=?1")?;
        Ok(stmt.exists([table_name])?)
    }

    /// Returns a reference to the underlying SQLite connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Inserts one sale and returns its row id.
    pub fn insert_sale(&self, record: &SaleRecord) -> Result<i64, StoreError> {
        insert_with(&self.conn, record)?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Inserts many sales inside a single transaction.
    pub fn insert_sales_batch(&mut self, records: &[SaleRecord]) -> Result<usize, StoreError> {
        let tx = self.conn.transaction()?;
        for record in records {
            insert_with(&tx, record)?;
        }
        tx.commit()?;
        log::info!("Inserted {} sales into {}", records.len(), SALES_TABLE);
        Ok(records.len())
    }

    /// Replaces the sale stored under `id`.
    pub fn update_sale(&self, id: i64, record: &SaleRecord) -> Result<(), StoreError> {
        let changed = self.conn.execute(
            &format!(
                "UPDATE {} SET Invoice_ID = ?1, Branch = ?2, City = ?3, Customer_type = ?4,
                     Gender = ?5, Product_line = ?6, Unit_price = ?7, Quantity = ?8, Total = ?9,
                     Date = ?10, Time = ?11, Payment = ?12, gross_income = ?13, Rating = ?14
                 WHERE id = ?15",
                SALES_TABLE
            ),
            params![
                record.attributes.invoice_id,
                record.attributes.branch,
                record.city,
                record.attributes.customer_type,
                record.attributes.gender,
                record.product_line,
                record.unit_price,
                record.quantity,
                record.attributes.total,
                record.date.format("%Y-%m-%d").to_string(),
                record.attributes.time,
                record.attributes.payment,
                record.gross_income,
                record.attributes.rating,
                id,
            ],
        )?;

        if changed == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    /// Deletes the sale stored under `id`.
    pub fn delete_sale(&self, id: i64) -> Result<(), StoreError> {
        let changed = self
            .conn
            .execute(&format!("DELETE FROM {} WHERE id = ?1", SALES_TABLE), [id])?;
        if changed == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    /// Number of stored sales.
    pub fn count(&self) -> Result<usize, StoreError> {
        let count: i64 = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {}", SALES_TABLE), [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Reads the whole sales table in insertion order, with row ids.
    ///
    /// # Errors
    /// Returns `StoreError::MissingColumn` when the table lacks a required
    /// column.
    pub fn list_sales(&self) -> Result<Vec<StoredSale>, StoreError> {
        let present = self.table_columns()?;

        for required in REQUIRED_STORED {
            if !present.contains_key(&normalize_column_name(required)) {
                return Err(StoreError::MissingColumn(required.to_string()));
            }
        }

        // Absent optional columns are read as NULL.
        let select_list: Vec<String> = STORED_COLUMNS
            .iter()
            .map(|(_, normalized)| match present.get(*normalized) {
                Some(actual) => format!("\"{}\"", actual),
                None => "NULL".to_string(),
            })
            .collect();

        let sql = format!(
            "SELECT rowid, {} FROM {} ORDER BY rowid",
            select_list.join(", "),
            SALES_TABLE
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query([])?;

        let mut sales = Vec::new();
        while let Some(row) = rows.next()? {
            sales.push(read_row(row)?);
        }

        log::debug!("Read {} sales from {}", sales.len(), SALES_TABLE);
        Ok(sales)
    }

    /// Reads the whole sales table in insertion order.
    pub fn get_all_sales(&self) -> Result<Vec<SaleRecord>, StoreError> {
        Ok(self.list_sales()?.into_iter().map(|s| s.record).collect())
    }

    /// Maps normalised column name to the name actually used in the table.
    fn table_columns(&self) -> Result<HashMap<String, String>, StoreError> {
        let mut stmt = self
            .conn
            .prepare(&format!("PRAGMA table_info({})", SALES_TABLE))?;
        let names = stmt.query_map([], |row| row.get::<_, String>(1))?;

        let mut columns = HashMap::new();
        for name in names {
            let name = name?;
            columns.insert(normalize_column_name(&name), name);
        }
        Ok(columns)
    }
}

impl SalesSource for SqliteSalesStore {
    fn load_sales(&self) -> Result<Vec<SaleRecord>, SalesSourceError> {
        Ok(self.get_all_sales()?)
    }
}

fn insert_with(conn: &Connection, record: &SaleRecord) -> Result<(), StoreError> {
    conn.execute(
        &format!(
            "INSERT INTO {} (Invoice_ID, Branch, City, Customer_type, Gender, Product_line,
                 Unit_price, Quantity, Total, Date, Time, Payment, gross_income, Rating)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            SALES_TABLE
        ),
        params![
            record.attributes.invoice_id,
            record.attributes.branch,
            record.city,
            record.attributes.customer_type,
            record.attributes.gender,
            record.product_line,
            record.unit_price,
            record.quantity,
            record.attributes.total,
            record.date.format("%Y-%m-%d").to_string(),
            record.attributes.time,
            record.attributes.payment,
            record.gross_income,
            record.attributes.rating,
        ],
    )?;
    Ok(())
}

fn as_text(value: Value) -> Option<String> {
    match value {
        Value::Text(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Integer(i) => Some(i.to_string()),
        Value::Real(r) => Some(r.to_string()),
        _ => None,
    }
}

fn as_number(value: Value) -> Option<f64> {
    match value {
        Value::Integer(i) => Some(i as f64),
        Value::Real(r) => Some(r),
        Value::Text(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn read_row(row: &Row<'_>) -> Result<StoredSale, StoreError> {
    let id: i64 = row.get(0)?;
    let invalid = |reason: &str| StoreError::InvalidRow {
        id,
        reason: reason.to_string(),
    };

    // Offsets follow STORED_COLUMNS, shifted by the leading rowid.
    let value = |i: usize| row.get::<_, Value>(i + 1);

    let product_line = as_text(value(5)?).ok_or_else(|| invalid("empty Product_line"))?;
    let unit_price = as_number(value(6)?).ok_or_else(|| invalid("invalid Unit_price"))?;
    let quantity = as_number(value(7)?)
        .filter(|q| q.fract() == 0.0 && *q >= 0.0 && *q <= u32::MAX as f64)
        .ok_or_else(|| invalid("invalid Quantity"))? as u32;
    let date = as_text(value(9)?)
        .and_then(|raw| parse_sale_date(&raw))
        .ok_or_else(|| invalid("invalid Date"))?;
    let gross_income = as_number(value(12)?).ok_or_else(|| invalid("invalid gross_income"))?;

    let attributes = SaleAttributes {
        invoice_id: as_text(value(0)?),
        branch: as_text(value(1)?),
        customer_type: as_text(value(3)?),
        gender: as_text(value(4)?),
        total: as_number(value(8)?),
        payment: as_text(value(11)?),
        time: as_text(value(10)?),
        rating: as_number(value(13)?),
    };

    let record = SaleRecord::new(
        product_line,
        as_text(value(2)?),
        date,
        unit_price,
        quantity,
        gross_income,
    )
    .with_attributes(attributes);

    Ok(StoredSale { id, record })
}
