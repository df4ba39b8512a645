pub mod sale_record;
pub mod sales_source;
pub mod csv_loader;
pub mod sqlite_store;
pub mod pricing;
pub mod basket;
pub mod assistant;
pub mod server;

pub use sale_record::{Dimension, GroupKey, SaleAttributes, SaleRecord, UnknownDimension};
pub use sales_source::{InMemorySalesSource, SalesSource, SalesSourceError};
pub use csv_loader::{load_sales_csv, read_sales_csv, CsvSalesSource, LoadError};
pub use sqlite_store::{SqliteSalesStore, StoreError, StoredSale};
pub use pricing::{
    optimize_prices,
    write_recommendations_csv,
    DeltaSign,
    DemandCurve,
    GroupBy,
    PriceBucket,
    PricingError,
    Recommendation,
    DEFAULT_WINDOW_MONTHS,
};
pub use basket::{
    mine_segment_rules,
    write_rules_csv,
    AssociationRule,
    BasketError,
    RuleThresholds,
    SegmentDimension,
    SegmentRules,
};
pub use assistant::{AssistantConfig, AssistantError, ChatMessage, ChatRole, ChatSession, DatasetSummary, OllamaClient};
pub use server::{run_server, ServerConfig, AppState, ApiError};
