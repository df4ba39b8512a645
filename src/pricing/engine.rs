use super::buckets::{percent_change, window_start, DemandCurve};
use super::types::{GroupBy, PricingError, Recommendation};
use crate::sale_record::{Dimension, GroupKey, SaleRecord};
use chrono::{NaiveDate, NaiveTime};
use ordered_float::OrderedFloat;
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

/// Computes one best-price recommendation per group.
///
/// The best price is searched among the prices charged during the trailing
/// `window_months` months (counted back from the latest sale). The cost and
/// the current price of a group come from its chronologically last sale over
/// the full history, whether or not that sale falls inside the window. Sales
/// sharing a date and time of day are ordered by unit price, then gross
/// income, so the baseline never depends on row order. Groups with no sale
/// inside the window get no recommendation.
///
/// # Errors
/// Returns `PricingError::InvalidInput` if `window_months` is zero, a record
/// lacks one of the grouping dimensions, or a record carries a negative or
/// non-finite price, a non-finite gross income or a zero quantity.
///
/// # Example
/// ```rust
/// use sales_analytics::pricing::{optimize_prices, GroupBy};
/// use sales_analytics::SaleRecord;
/// use chrono::NaiveDate;
///
/// let sales = vec![
///     SaleRecord::new("Snacks", None, NaiveDate::from_ymd_opt(2024, 4, 1).unwrap(), 15.0, 10, 9.0),
///     SaleRecord::new("Snacks", None, NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(), 10.0, 50, 4.0),
/// ];
/// let recommendations = optimize_prices(&sales, &GroupBy::product(), 3).unwrap();
/// assert_eq!(recommendations[0].best_price, 10.0);
/// ```
pub fn optimize_prices(
    records: &[SaleRecord],
    group_by: &GroupBy,
    window_months: u32,
) -> Result<Vec<Recommendation>, PricingError> {
    if window_months == 0 {
        return Err(PricingError::InvalidInput(
            "window_months must be positive".to_string(),
        ));
    }

    let keys = validate_records(records, group_by)?;

    let Some(latest) = records.iter().map(|r| r.date).max() else {
        return Ok(Vec::new());
    };
    let cutoff = window_start(latest, window_months);

    let mut chronological: Vec<usize> = (0..records.len()).collect();
    chronological.sort_by_cached_key(|&i| baseline_order(i, &records[i]));

    let mut baselines: HashMap<&GroupKey, &SaleRecord> = HashMap::new();
    for &i in &chronological {
        baselines.insert(&keys[i], &records[i]);
    }

    let mut windowed: BTreeMap<&GroupKey, Vec<&SaleRecord>> = BTreeMap::new();
    for (key, record) in keys.iter().zip(records) {
        if record.date >= cutoff {
            windowed.entry(key).or_default().push(record);
        }
    }

    debug!(
        records = records.len(),
        groups = baselines.len(),
        windowed_groups = windowed.len(),
        %cutoff,
        "optimising prices"
    );

    let groups: Vec<(&GroupKey, Vec<&SaleRecord>)> = windowed.into_iter().collect();
    let recommendations = groups
        .par_iter()
        .filter_map(|(key, group_records)| {
            let baseline = baselines.get(key)?;
            recommend_group(key, group_by, group_records, baseline)
        })
        .collect();

    Ok(recommendations)
}

/// Checks every record and returns its group key, index-aligned with `records`.
fn validate_records(records: &[SaleRecord], group_by: &GroupBy) -> Result<Vec<GroupKey>, PricingError> {
    records
        .iter()
        .enumerate()
        .map(|(i, record)| {
            if !record.unit_price.is_finite() || record.unit_price < 0.0 {
                return Err(PricingError::InvalidInput(format!(
                    "record {} has invalid unit_price {}",
                    i, record.unit_price
                )));
            }
            if !record.gross_income.is_finite() {
                return Err(PricingError::InvalidInput(format!(
                    "record {} has invalid gross_income {}",
                    i, record.gross_income
                )));
            }
            if record.quantity == 0 {
                return Err(PricingError::InvalidInput(format!("record {} has zero quantity", i)));
            }
            group_by.key_for(record).ok_or_else(|| {
                let missing = group_by
                    .dimensions()
                    .iter()
                    .find(|d| d.value_of(record).is_none())
                    .map(Dimension::column_name)
                    .unwrap_or("dimension");
                PricingError::InvalidInput(format!("record {} is missing column '{}'", i, missing))
            })
        })
        .collect()
}

/// Date, time of day when the source recorded one, then the price fields.
fn baseline_order(
    index: usize,
    record: &SaleRecord,
) -> (NaiveDate, Option<NaiveTime>, OrderedFloat<f64>, OrderedFloat<f64>) {
    (
        record.date,
        time_of_day(index, record),
        OrderedFloat(record.unit_price),
        OrderedFloat(record.gross_income),
    )
}

fn time_of_day(index: usize, record: &SaleRecord) -> Option<NaiveTime> {
    let raw = record.attributes.time.as_deref()?.trim();
    if raw.is_empty() {
        return None;
    }
    let parsed = NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .ok();
    if parsed.is_none() {
        warn!(record = index, time = raw, "unparseable time of day, ordering by date only");
    }
    parsed
}

fn recommend_group(
    key: &GroupKey,
    group_by: &GroupBy,
    records: &[&SaleRecord],
    baseline: &SaleRecord,
) -> Option<Recommendation> {
    let curve = DemandCurve::build(records.iter().copied(), baseline.cost())?;
    let best = curve.best_bucket()?;

    let current_price = baseline.unit_price;
    let current_captured_demand_pct = curve.bucket_at(current_price).map(|b| b.captured_demand_pct);
    if current_captured_demand_pct.is_none() {
        debug!(group = %key, current_price, "current price not observed inside the window");
    }

    Some(Recommendation {
        product_line: group_by.value_in(key, Dimension::ProductLine).map(str::to_string),
        city: group_by.value_in(key, Dimension::City).map(str::to_string),
        best_price: best.unit_price,
        current_price,
        price_delta_pct: percent_change(best.unit_price, current_price),
        captured_demand_pct: best.captured_demand_pct,
        current_captured_demand_pct,
        demand_delta_pct: current_captured_demand_pct
            .and_then(|current| percent_change(best.captured_demand_pct, current)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sale(product: &str, city: &str, date: (i32, u32, u32), price: f64, qty: u32, income: f64) -> SaleRecord {
        SaleRecord::new(
            product,
            Some(city.to_string()),
            NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            price,
            qty,
            income,
        )
    }

    #[test]
    fn test_zero_window_is_invalid() {
        let records = vec![sale("Snacks", "Yangon", (2024, 5, 1), 10.0, 1, 2.0)];
        let err = optimize_prices(&records, &GroupBy::product(), 0).unwrap_err();
        assert!(matches!(err, PricingError::InvalidInput(_)));
    }

    #[test]
    fn test_no_records_yields_empty_result() {
        assert!(optimize_prices(&[], &GroupBy::product(), 3).unwrap().is_empty());
    }

    #[test]
    fn test_missing_city_is_invalid_when_grouping_by_city() {
        let records = vec![SaleRecord::new(
            "Snacks",
            None,
            NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            10.0,
            1,
            2.0,
        )];
        assert!(optimize_prices(&records, &GroupBy::product(), 3).is_ok());

        match optimize_prices(&records, &GroupBy::product_and_city(), 3).unwrap_err() {
            PricingError::InvalidInput(msg) => assert!(msg.contains("city")),
        }
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let negative = vec![sale("Snacks", "Yangon", (2024, 5, 1), -1.0, 1, 0.0)];
        assert!(optimize_prices(&negative, &GroupBy::product(), 3).is_err());

        let zero_qty = vec![sale("Snacks", "Yangon", (2024, 5, 1), 1.0, 0, 0.0)];
        assert!(optimize_prices(&zero_qty, &GroupBy::product(), 3).is_err());

        let nan_income = vec![sale("Snacks", "Yangon", (2024, 5, 1), 1.0, 1, f64::NAN)];
        assert!(optimize_prices(&nan_income, &GroupBy::product(), 3).is_err());
    }

    #[test]
    fn test_old_sales_do_not_shape_the_curve() {
        let records = vec![
            sale("Drinks", "Yangon", (2024, 4, 1), 8.0, 10, 1.0),
            sale("Drinks", "Yangon", (2024, 1, 1), 5.0, 100, 1.0),
            sale("Snacks", "Yangon", (2024, 5, 1), 3.0, 10, 1.0),
        ];
        let result = optimize_prices(&records, &GroupBy::product(), 2).unwrap();
        assert_eq!(result.len(), 2);

        let drinks = &result[0];
        assert_eq!(drinks.product_line.as_deref(), Some("Drinks"));
        assert_eq!(drinks.best_price, 8.0);
        assert_eq!(drinks.current_price, 8.0);
        assert_eq!(drinks.captured_demand_pct, 100.0);
    }

    #[test]
    fn test_same_day_sales_order_by_time_of_day() {
        let mut early = sale("Snacks", "Yangon", (2024, 5, 1), 12.0, 5, 4.0);
        early.attributes.time = Some("09:15".to_string());
        let mut late = sale("Snacks", "Yangon", (2024, 5, 1), 10.0, 5, 4.0);
        late.attributes.time = Some("18:40".to_string());

        let result = optimize_prices(&[late.clone(), early.clone()], &GroupBy::product(), 3).unwrap();
        assert_eq!(result[0].current_price, 10.0);
        let swapped = optimize_prices(&[early, late], &GroupBy::product(), 3).unwrap();
        assert_eq!(result, swapped);
    }

    #[test]
    fn test_untimed_same_day_sales_ignore_row_order() {
        let cheap = sale("Snacks", "Yangon", (2024, 5, 1), 10.0, 50, 4.0);
        let dear = sale("Snacks", "Yangon", (2024, 5, 1), 15.0, 10, 9.0);

        let forward = optimize_prices(&[cheap.clone(), dear.clone()], &GroupBy::product(), 3).unwrap();
        let backward = optimize_prices(&[dear, cheap], &GroupBy::product(), 3).unwrap();
        assert_eq!(forward, backward);
        assert_eq!(forward[0].current_price, 15.0);
    }

    #[test]
    fn test_equal_price_ties_break_on_gross_income() {
        let low = sale("Snacks", "Yangon", (2024, 5, 1), 10.0, 5, 2.0);
        let high = sale("Snacks", "Yangon", (2024, 5, 1), 10.0, 5, 6.0);

        let forward = optimize_prices(&[low.clone(), high.clone()], &GroupBy::product(), 3).unwrap();
        let backward = optimize_prices(&[high, low], &GroupBy::product(), 3).unwrap();
        assert_eq!(forward, backward);
    }

    #[test]
    fn test_unparseable_time_orders_by_date_only() {
        let mut garbled = sale("Snacks", "Yangon", (2024, 5, 1), 15.0, 5, 4.0);
        garbled.attributes.time = Some("quarter past".to_string());
        let mut timed = sale("Snacks", "Yangon", (2024, 5, 1), 10.0, 5, 4.0);
        timed.attributes.time = Some("08:00".to_string());

        assert_eq!(time_of_day(0, &garbled), None);
        let result = optimize_prices(&[timed, garbled], &GroupBy::product(), 3).unwrap();
        assert_eq!(result[0].current_price, 10.0);
    }

    #[test]
    fn test_baseline_absent_from_window_is_undefined() {
        let in_window = vec![
            sale("Snacks", "Yangon", (2024, 5, 1), 15.0, 10, 9.0),
            sale("Snacks", "Yangon", (2024, 5, 2), 10.0, 50, 4.0),
        ];
        let refs: Vec<&SaleRecord> = in_window.iter().collect();
        let baseline = sale("Snacks", "Yangon", (2024, 5, 3), 20.0, 1, 14.0);
        let key = GroupKey(vec!["Snacks".to_string()]);

        let rec = recommend_group(&key, &GroupBy::product(), &refs, &baseline).unwrap();
        assert_eq!(rec.best_price, 10.0);
        assert_eq!(rec.current_price, 20.0);
        assert_eq!(rec.price_delta_pct, Some(-50.0));
        assert_eq!(rec.captured_demand_pct, 100.0);
        assert_eq!(rec.current_captured_demand_pct, None);
        assert_eq!(rec.demand_delta_pct, None);
    }

    #[test]
    fn test_zero_current_price_leaves_price_delta_undefined() {
        let records = vec![
            sale("Samples", "Yangon", (2024, 4, 1), 2.0, 10, 2.0),
            sale("Samples", "Yangon", (2024, 5, 1), 0.0, 10, 0.0),
        ];
        let result = optimize_prices(&records, &GroupBy::product(), 3).unwrap();
        assert_eq!(result[0].best_price, 2.0);
        assert_eq!(result[0].current_price, 0.0);
        assert_eq!(result[0].price_delta_pct, None);
        assert_eq!(result[0].current_captured_demand_pct, Some(100.0));
        assert_eq!(result[0].demand_delta_pct, Some(-50.0));
    }

    #[test]
    fn test_output_follows_group_by_order() {
        let records = vec![
            sale("Snacks", "Alpha", (2024, 5, 1), 1.0, 1, 0.5),
            sale("Drinks", "Beta", (2024, 5, 1), 1.0, 1, 0.5),
        ];
        let by_city_first =
            GroupBy::new(vec![Dimension::City, Dimension::ProductLine]).unwrap();
        let result = optimize_prices(&records, &by_city_first, 3).unwrap();
        assert_eq!(result[0].city.as_deref(), Some("Alpha"));
        assert_eq!(result[1].city.as_deref(), Some("Beta"));

        let result = optimize_prices(&records, &GroupBy::product_and_city(), 3).unwrap();
        assert_eq!(result[0].product_line.as_deref(), Some("Drinks"));
    }
}
