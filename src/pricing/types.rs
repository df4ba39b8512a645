use crate::sale_record::{Dimension, GroupKey, SaleRecord};
use serde::Serialize;
use std::fmt;

/// Trailing window used by the dashboard when none is given.
pub const DEFAULT_WINDOW_MONTHS: u32 = 3;

/// Errors returned by the price optimisation engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PricingError {
    /// Malformed parameters or records
    InvalidInput(String),
}

impl fmt::Display for PricingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PricingError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
        }
    }
}

impl std::error::Error for PricingError {}

/// Ordered, non-empty, duplicate-free list of grouping dimensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupBy {
    dimensions: Vec<Dimension>,
}

impl GroupBy {
    /// Validates and builds a grouping.
    ///
    /// # Errors
    /// Returns `PricingError::InvalidInput` if `dimensions` is empty or repeats
    /// a dimension.
    pub fn new(dimensions: Vec<Dimension>) -> Result<Self, PricingError> {
        if dimensions.is_empty() {
            return Err(PricingError::InvalidInput(
                "group_by must name at least one dimension".to_string(),
            ));
        }
        for (i, dimension) in dimensions.iter().enumerate() {
            if dimensions[..i].contains(dimension) {
                return Err(PricingError::InvalidInput(format!(
                    "dimension '{}' appears more than once in group_by",
                    dimension
                )));
            }
        }
        Ok(GroupBy { dimensions })
    }

    /// Parses a comma-separated list such as `"product_line,city"`.
    pub fn parse(raw: &str) -> Result<Self, PricingError> {
        let dimensions = raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse::<Dimension>()
                    .map_err(|e| PricingError::InvalidInput(e.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        GroupBy::new(dimensions)
    }

    /// Grouping by product line alone.
    pub fn product() -> Self {
        GroupBy {
            dimensions: vec![Dimension::ProductLine],
        }
    }

    /// Grouping by product line and city.
    pub fn product_and_city() -> Self {
        GroupBy {
            dimensions: vec![Dimension::ProductLine, Dimension::City],
        }
    }

    pub fn dimensions(&self) -> &[Dimension] {
        &self.dimensions
    }

    pub fn contains(&self, dimension: Dimension) -> bool {
        self.dimensions.contains(&dimension)
    }

    /// Builds the group key for a record, or `None` when the record lacks one
    /// of the grouping dimensions.
    pub fn key_for(&self, record: &SaleRecord) -> Option<GroupKey> {
        self.dimensions
            .iter()
            .map(|d| d.value_of(record).map(str::to_string))
            .collect::<Option<Vec<_>>>()
            .map(GroupKey)
    }

    /// Looks up the value of `dimension` inside a key built by this grouping.
    pub fn value_in<'k>(&self, key: &'k GroupKey, dimension: Dimension) -> Option<&'k str> {
        self.dimensions
            .iter()
            .position(|d| *d == dimension)
            .and_then(|i| key.values().get(i))
            .map(String::as_str)
    }
}

impl Default for GroupBy {
    fn default() -> Self {
        GroupBy::product()
    }
}

/// Best-price recommendation for one group.
///
/// Percentages are rounded to one decimal. Positive deltas mean "higher than
/// the current baseline". `None` marks an undefined value: the current price
/// never occurs inside the window, or a zero denominator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_line: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    pub best_price: f64,
    pub current_price: f64,
    pub price_delta_pct: Option<f64>,
    pub captured_demand_pct: f64,
    pub current_captured_demand_pct: Option<f64>,
    pub demand_delta_pct: Option<f64>,
}

impl Recommendation {
    /// Key values in `group_by` order, for table output.
    pub fn group_values(&self, group_by: &GroupBy) -> Vec<String> {
        group_by
            .dimensions()
            .iter()
            .map(|d| match d {
                Dimension::ProductLine => self.product_line.clone().unwrap_or_default(),
                Dimension::City => self.city.clone().unwrap_or_default(),
            })
            .collect()
    }
}
