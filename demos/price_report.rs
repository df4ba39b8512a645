//! Price Report Example
//!
//! Loads a sales CSV, computes the best price per group over a trailing window
//! and prints the recommendations followed by the strongest basket rule of
//! each branch.
//!
//! Run with: cargo run --example price_report -- supermarket_sales.csv product_line,city 3

use sales_analytics::{
    load_sales_csv, mine_segment_rules, optimize_prices, DeltaSign, GroupBy, RuleThresholds,
    SegmentDimension, DEFAULT_WINDOW_MONTHS,
};

fn fmt_opt(value: Option<f64>) -> String {
    value.map(|v| format!("{:.1}", v)).unwrap_or_else(|| "-".to_string())
}

fn arrow(value: Option<f64>) -> &'static str {
    match DeltaSign::classify(value) {
        DeltaSign::Positive => "▲",
        DeltaSign::Negative => "▼",
        DeltaSign::Zero => "=",
        DeltaSign::Undefined => " ",
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let csv_path = args.next().unwrap_or_else(|| "supermarket_sales.csv".to_string());
    let group_by = match args.next() {
        Some(raw) => GroupBy::parse(&raw)?,
        None => GroupBy::product_and_city(),
    };
    let months = match args.next() {
        Some(m) => m.parse()?,
        None => DEFAULT_WINDOW_MONTHS,
    };

    println!("=== Price Recommendations ({} months) ===\n", months);

    let sales = load_sales_csv(&csv_path)?;
    println!("Loaded {} sales from {}\n", sales.len(), csv_path);

    let recommendations = optimize_prices(&sales, &group_by, months)?;

    println!(
        "{:<40} {:>10} {:>10} {:>9} {:>9} {:>9} {:>9}",
        "Group", "Best", "Current", "Price Δ%", "Demand%", "Curr. %", "Demand Δ%"
    );
    println!("{}", "-".repeat(104));
    for rec in &recommendations {
        println!(
            "{:<40} {:>10.2} {:>10.2} {:>8}{} {:>9.1} {:>9} {:>8}{}",
            rec.group_values(&group_by).join(" / "),
            rec.best_price,
            rec.current_price,
            fmt_opt(rec.price_delta_pct),
            arrow(rec.price_delta_pct),
            rec.captured_demand_pct,
            fmt_opt(rec.current_captured_demand_pct),
            fmt_opt(rec.demand_delta_pct),
            arrow(rec.demand_delta_pct),
        );
    }

    println!("\n=== Top Basket Rule per Branch ===\n");
    let segments = mine_segment_rules(&sales, &[SegmentDimension::Branch], &RuleThresholds::default())?;
    for segment in &segments {
        match segment.top(1).first() {
            Some(rule) => println!("{}: {}", segment.describe_segment(), segment.insight(rule)),
            None => println!("{}: no rules above thresholds", segment.describe_segment()),
        }
    }

    Ok(())
}
