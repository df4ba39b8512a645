use crate::sale_record::SaleRecord;
use serde::Serialize;
use std::collections::HashMap;

/// Headline facts about the sales data handed to the assistant.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DatasetSummary {
    pub product_lines: Vec<String>,
    pub payment_methods: Vec<String>,
    pub cities: Vec<String>,
    pub genders: Vec<String>,
    /// Revenue per product line, highest first
    pub revenue_by_product: Vec<(String, f64)>,
    /// Units sold per product line, highest first
    pub quantity_by_product: Vec<(String, u64)>,
}

fn push_unique(values: &mut Vec<String>, value: Option<&str>) {
    if let Some(value) = value {
        if !values.iter().any(|v| v == value) {
            values.push(value.to_string());
        }
    }
}

impl DatasetSummary {
    /// Summarises records; distinct values keep first-seen order.
    pub fn from_records(records: &[SaleRecord]) -> Self {
        let mut summary = DatasetSummary::default();
        let mut revenue: HashMap<&str, f64> = HashMap::new();
        let mut quantity: HashMap<&str, u64> = HashMap::new();

        for record in records {
            push_unique(&mut summary.product_lines, Some(record.product_line.as_str()));
            push_unique(&mut summary.payment_methods, record.attributes.payment.as_deref());
            push_unique(&mut summary.cities, record.city.as_deref());
            push_unique(&mut summary.genders, record.attributes.gender.as_deref());
            *revenue.entry(record.product_line.as_str()).or_insert(0.0) += record.revenue();
            *quantity.entry(record.product_line.as_str()).or_insert(0) += record.quantity as u64;
        }

        let mut revenue_by_product: Vec<(String, f64)> =
            revenue.into_iter().map(|(k, v)| (k.to_string(), v)).collect();
        revenue_by_product.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        let mut quantity_by_product: Vec<(String, u64)> =
            quantity.into_iter().map(|(k, v)| (k.to_string(), v)).collect();
        quantity_by_product.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        summary.revenue_by_product = revenue_by_product;
        summary.quantity_by_product = quantity_by_product;
        summary
    }
}

/// Formats an amount as `"<symbol> 56,144.84"`.
pub fn format_currency(amount: f64, symbol: &str) -> String {
    let fixed = format!("{:.2}", amount.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    let sign = if amount < 0.0 && fixed != "0.00" { "-" } else { "" };
    format!("{} {}{}.{}", symbol, sign, grouped, frac_part)
}

/// System prompt that sets up the assistant as a member of the store's team.
pub fn build_system_prompt(summary: &DatasetSummary, currency_symbol: &str) -> String {
    let top_revenue = summary
        .revenue_by_product
        .iter()
        .take(5)
        .map(|(product, total)| format!("    - {}: {}", product, format_currency(*total, currency_symbol)))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You are a strategic assistant on the supermarket's management team. \
Work with the managers to improve operations and store performance, giving detailed answers \
grounded in the data below and in your knowledge of the retail grocery sector.

Key facts about our supermarket data:
1. Product categories: {products}.
2. Payment methods used: {payments}.
3. Cities with sales: {cities}.
4. Customer genders served: {genders}.
5. Revenue by category (top 5):
{top_revenue}

Your tone is friendly and collaborative, like a colleague who knows the store well. \
Offer practical, specific and actionable suggestions based on the data, avoid repetitive or robotic phrasing, \
and always format monetary values as {symbol} amounts to stay consistent with internal reports.

Typical questions include: which category earns the most and how to grow it, \
which products to promote to attract customers, how to cut inventory costs without losing quality, \
which payment methods benefit the store most, and which seasonal trends to plan for.",
        products = summary.product_lines.join(", "),
        payments = summary.payment_methods.join(", "),
        cities = summary.cities.join(", "),
        genders = summary.genders.join(", "),
        top_revenue = top_revenue,
        symbol = currency_symbol,
    )
}
