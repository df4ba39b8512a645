//! REST API server for the sales dashboard, with Server-Sent Events for
//! assistant replies

mod error;
mod handlers;
mod routes;
mod state;

pub use error::ApiError;
pub use routes::create_router;
pub use state::{AppState, MAX_CHAT_SESSIONS};

use crate::assistant::{AssistantConfig, OllamaClient};
use crate::csv_loader::CsvSalesSource;
use crate::pricing::DEFAULT_WINDOW_MONTHS;
use crate::sales_source::SalesSource;
use crate::sqlite_store::SqliteSalesStore;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server host address (default: "127.0.0.1")
    pub host: String,
    /// Server port (default: 3000)
    pub port: u16,
    /// Path to SQLite database
    pub database_path: String,
    /// CSV imported at startup when the store is empty
    pub csv_path: Option<String>,
    /// Default price window in months (default: 3)
    pub window_months: u32,
    /// Text-generation service settings
    pub assistant: AssistantConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 3000,
            database_path: "sales.db".to_string(),
            csv_path: None,
            window_months: DEFAULT_WINDOW_MONTHS,
            assistant: AssistantConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Creates a new server configuration
    pub fn new(host: impl Into<String>, port: u16, database_path: impl Into<String>) -> Self {
        ServerConfig {
            host: host.into(),
            port,
            database_path: database_path.into(),
            ..Default::default()
        }
    }

    /// Reads the configuration from environment variables.
    ///
    /// `HOST`, `PORT`, `DATABASE_PATH`, `SALES_CSV`, `PRICE_WINDOW_MONTHS`,
    /// `OLLAMA_URL`, `OLLAMA_MODEL` and `CURRENCY_SYMBOL`. Unset or invalid
    /// values keep their defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = ServerConfig::default();

        if let Some(host) = lookup("HOST") {
            config.host = host;
        }
        if let Some(port) = parse_var(&lookup, "PORT") {
            config.port = port;
        }
        if let Some(path) = lookup("DATABASE_PATH") {
            config.database_path = path;
        }
        config.csv_path = lookup("SALES_CSV").filter(|p| !p.is_empty());
        match parse_var::<u32, _>(&lookup, "PRICE_WINDOW_MONTHS") {
            Some(0) => tracing::warn!("PRICE_WINDOW_MONTHS must be positive, using default"),
            Some(months) => config.window_months = months,
            None => {}
        }
        if let Some(url) = lookup("OLLAMA_URL") {
            config.assistant.base_url = url;
        }
        if let Some(model) = lookup("OLLAMA_MODEL") {
            config.assistant.default_model = model;
        }
        if let Some(symbol) = lookup("CURRENCY_SYMBOL") {
            config.assistant.currency_symbol = symbol;
        }

        config
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("ignoring invalid {}={:?}", key, raw);
            None
        }
    }
}

/// Installs the global tracing subscriber.
///
/// Honours `RUST_LOG`, defaulting to `info`. Calling it again is a no-op.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .try_init();
}

/// Copies every sale of `source` into the store unless it already holds sales.
///
/// Returns the number of imported rows.
pub fn seed_store(
    store: &mut SqliteSalesStore,
    source: &dyn SalesSource,
) -> Result<usize, Box<dyn std::error::Error>> {
    let existing = store.count()?;
    if existing > 0 {
        tracing::info!(existing, "store already populated, skipping import");
        return Ok(0);
    }

    let records = source.load_sales()?;
    let inserted = store.insert_sales_batch(&records)?;
    tracing::info!(inserted, "imported sales into the store");
    Ok(inserted)
}

/// Runs the API server
///
/// # Arguments
/// * `config` - Server configuration
///
/// # Returns
/// Returns an error if the server fails to start or encounters a fatal error
///
/// # Example
/// ```rust,no_run
/// use sales_analytics::server::{run_server, ServerConfig};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = ServerConfig::default();
///     run_server(config).await?;
///     Ok(())
/// }
/// ```
pub async fn run_server(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let mut store = SqliteSalesStore::new(&config.database_path)?;
    if let Some(csv_path) = &config.csv_path {
        tracing::info!("seeding store from {}", csv_path);
        seed_store(&mut store, &CsvSalesSource::new(csv_path))?;
    }

    let assistant = OllamaClient::new(config.assistant.clone())?;
    let state = Arc::new(AppState::new(store, assistant, config.window_months));

    let app = routes::create_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sale_record::SaleRecord;
    use crate::sales_source::InMemorySalesSource;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_config_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[]));
        assert_eq!(config.port, 3000);
        assert_eq!(config.window_months, 3);
        assert_eq!(config.csv_path, None);
        assert_eq!(config.assistant.base_url, "http://localhost:11434");
        assert_eq!(config.assistant.currency_symbol, "R$");
    }

    #[test]
    fn test_config_from_vars() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("HOST", "0.0.0.0"),
            ("PORT", "8080"),
            ("SALES_CSV", "supermarket_sales.csv"),
            ("PRICE_WINDOW_MONTHS", "6"),
            ("OLLAMA_MODEL", "mistral"),
            ("CURRENCY_SYMBOL", "$"),
        ]));
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8080);
        assert_eq!(config.csv_path.as_deref(), Some("supermarket_sales.csv"));
        assert_eq!(config.window_months, 6);
        assert_eq!(config.assistant.default_model, "mistral");
        assert_eq!(config.assistant.currency_symbol, "$");
    }

    #[test]
    fn test_invalid_values_keep_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("PORT", "eighty"),
            ("PRICE_WINDOW_MONTHS", "0"),
        ]));
        assert_eq!(config.port, 3000);
        assert_eq!(config.window_months, 3);
    }

    #[test]
    fn test_seed_store_imports_once() {
        let path = std::env::temp_dir().join(format!("seed_{}.csv", uuid::Uuid::new_v4()));
        std::fs::write(
            &path,
            "Product line,City,Date,Unit price,Quantity,gross income\n\
             Food,Yangon,1/5/2019,10.0,2,1.0\n\
             Sports,Mandalay,1/6/2019,20.0,1,2.0\n",
        )
        .unwrap();
        let source = CsvSalesSource::new(&path);

        let mut store = SqliteSalesStore::new_in_memory().unwrap();
        assert_eq!(seed_store(&mut store, &source).unwrap(), 2);
        assert_eq!(seed_store(&mut store, &source).unwrap(), 0);
        assert_eq!(store.count().unwrap(), 2);

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_seed_store_from_memory_keeps_record_order() {
        let date = chrono::NaiveDate::from_ymd_opt(2019, 1, 5).unwrap();
        let source = InMemorySalesSource::from(vec![
            SaleRecord::new("Food", Some("Yangon".to_string()), date, 10.0, 2, 1.0),
            SaleRecord::new("Sports", Some("Mandalay".to_string()), date, 20.0, 1, 2.0),
        ]);

        let mut store = SqliteSalesStore::new_in_memory().unwrap();
        assert_eq!(seed_store(&mut store, &source).unwrap(), 2);

        let stored = store.load_sales().unwrap();
        assert_eq!(stored, source.load_sales().unwrap());
    }

    #[test]
    fn test_seed_store_reports_missing_csv() {
        let mut store = SqliteSalesStore::new_in_memory().unwrap();
        let source = CsvSalesSource::new("does/not/exist.csv");
        assert!(seed_store(&mut store, &source).is_err());
        assert_eq!(store.count().unwrap(), 0);
    }
}
