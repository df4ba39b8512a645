//! Best-price recommendations per product (or product and city).
//!
//! - `types`: grouping, recommendations and errors
//! - `buckets`: windowing and demand curves
//! - `engine`: [`optimize_prices`]
//! - `export`: table output for the presentation layer

pub mod buckets;
pub mod engine;
pub mod export;
pub mod types;

pub use buckets::{DemandCurve, PriceBucket};
pub use engine::optimize_prices;
pub use export::{write_recommendations_csv, DeltaSign};
pub use types::{GroupBy, PricingError, Recommendation, DEFAULT_WINDOW_MONTHS};
