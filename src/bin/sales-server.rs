//! Sales Dashboard API Server Binary
//!
//! Run with: `cargo run --bin sales-server`

use sales_analytics::server::init_tracing;
use sales_analytics::{run_server, ServerConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Set RUST_LOG environment variable to control log level:
    //   RUST_LOG=debug cargo run --bin sales-server
    //   RUST_LOG=sales_analytics::pricing=debug cargo run --bin sales-server  (engine only)
    init_tracing();

    let config = ServerConfig::from_env();

    println!("Starting Sales Dashboard API Server...");
    println!("   Host: {}", config.host);
    println!("   Port: {}", config.port);
    println!("   Database: {}", config.database_path);
    if let Some(csv_path) = &config.csv_path {
        println!("   Seed CSV: {}", csv_path);
    }
    println!("   Price window: {} months", config.window_months);
    println!("   Assistant: {} ({})", config.assistant.base_url, config.assistant.default_model);
    println!();
    println!(
        "Server will be available at: http://{}:{}",
        config.host, config.port
    );
    println!();
    println!("Available endpoints:");
    println!("  GET  /health                              - Health check");
    println!("  GET  /sales                               - Stored sales");
    println!("  GET  /prices?group_by=&months=            - Price recommendations");
    println!("  GET  /prices/export                       - Recommendations as CSV");
    println!("  GET  /rules?segment_by=&top=              - Basket rules per segment");
    println!("  GET  /assistant/models                    - Available models");
    println!("  POST /assistant/sessions                  - Start a conversation");
    println!("  GET  /assistant/sessions/:id              - Conversation history");
    println!("  POST /assistant/sessions/:id/messages     - Send a message (SSE reply)");
    println!();

    run_server(config).await?;

    Ok(())
}
