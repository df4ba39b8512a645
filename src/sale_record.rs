use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Columns every sales source must provide, in normalised form.
pub const REQUIRED_COLUMNS: [&str; 5] = ["product_line", "date", "unit_price", "quantity", "gross_income"];

/// Descriptive columns carried along with a sale but never used for pricing.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SaleAttributes {
    pub invoice_id: Option<String>,
    pub branch: Option<String>,
    pub customer_type: Option<String>,
    pub gender: Option<String>,
    /// Invoice total including tax
    pub total: Option<f64>,
    pub payment: Option<String>,
    pub time: Option<String>,
    pub rating: Option<f64>,
}

/// A single sales line item.
///
/// `cost` is derived from `unit_price - gross_income` when the record is
/// constructed and never recomputed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SaleRecord {
    /// Product category label
    pub product_line: String,
    /// City the sale happened in, when known
    pub city: Option<String>,
    /// Calendar date of the sale
    pub date: NaiveDate,
    /// Price charged for one unit
    pub unit_price: f64,
    /// Units sold
    pub quantity: u32,
    /// Margin recorded for the line item (may be negative)
    pub gross_income: f64,
    cost: f64,
    #[serde(flatten)]
    pub attributes: SaleAttributes,
}

impl SaleRecord {
    /// Creates a new sale record and derives its cost.
    pub fn new(
        product_line: impl Into<String>,
        city: Option<String>,
        date: NaiveDate,
        unit_price: f64,
        quantity: u32,
        gross_income: f64,
    ) -> Self {
        SaleRecord {
            product_line: product_line.into(),
            city,
            date,
            unit_price,
            quantity,
            gross_income,
            cost: unit_price - gross_income,
            attributes: SaleAttributes::default(),
        }
    }

    /// Attaches the descriptive attributes to the record.
    pub fn with_attributes(mut self, attributes: SaleAttributes) -> Self {
        self.attributes = attributes;
        self
    }

    /// Unit cost, `unit_price - gross_income`.
    pub fn cost(&self) -> f64 {
        self.cost
    }

    /// Invoice total, falling back to `unit_price * quantity` when the source
    /// did not record one.
    pub fn revenue(&self) -> f64 {
        self.attributes
            .total
            .unwrap_or(self.unit_price * self.quantity as f64)
    }
}

/// A dimension sales can be segmented by for price optimisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    ProductLine,
    City,
}

impl Dimension {
    /// Normalised column name backing this dimension.
    pub fn column_name(&self) -> &'static str {
        match self {
            Dimension::ProductLine => "product_line",
            Dimension::City => "city",
        }
    }

    /// Reads this dimension's value from a record.
    pub fn value_of<'a>(&self, record: &'a SaleRecord) -> Option<&'a str> {
        match self {
            Dimension::ProductLine => Some(record.product_line.as_str()),
            Dimension::City => record.city.as_deref(),
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.column_name())
    }
}

/// Error returned when a dimension name is not recognised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownDimension(pub String);

impl fmt::Display for UnknownDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unknown dimension: {}", self.0)
    }
}

impl std::error::Error for UnknownDimension {}

impl FromStr for Dimension {
    type Err = UnknownDimension;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_column_name(s).as_str() {
            "product_line" | "product" | "produto" => Ok(Dimension::ProductLine),
            "city" | "cidade" => Ok(Dimension::City),
            _ => Err(UnknownDimension(s.to_string())),
        }
    }
}

/// Values of the grouping dimensions for one segment, in `group_by` order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct GroupKey(pub Vec<String>);

impl GroupKey {
    pub fn values(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join(" / "))
    }
}

/// Normalises a column header: trims, lower-cases and turns spaces into
/// underscores, so `"Product line"` and `"Product_line"` compare equal.
pub fn normalize_column_name(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c.to_ascii_lowercase() })
        .collect()
}

/// Parses a sale date in any of the formats seen in sales exports.
pub fn parse_sale_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%m/%d/%Y"))
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|dt| dt.date()))
        .ok()
}
