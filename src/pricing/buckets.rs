//! Demand curves built from windowed sales.
//!
//! A group's in-window line items are collapsed into one [`PriceBucket`] per
//! distinct unit price. Walking prices from highest to lowest, each bucket
//! carries the quantity sold at that price or above, so the curve never
//! decreases as the price drops.

use crate::sale_record::SaleRecord;
use chrono::{Months, NaiveDate};
use ordered_float::OrderedFloat;
use std::cmp::Reverse;
use std::collections::BTreeMap;

/// One distinct price point of a group inside the window.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceBucket {
    pub unit_price: f64,
    /// Units sold at this price or higher
    pub cumulative_quantity: u64,
    /// Representative unit cost of the group
    pub cost: f64,
    pub profit: f64,
    pub expected_profit: f64,
    /// `cumulative_quantity` relative to the group maximum, percent, one decimal
    pub captured_demand_pct: f64,
}

/// Price buckets of one group, highest price first.
#[derive(Debug, Clone, PartialEq)]
pub struct DemandCurve {
    buckets: Vec<PriceBucket>,
    max_demand: u64,
}

impl DemandCurve {
    /// Builds the curve from a group's in-window records and its cost.
    ///
    /// Returns `None` when there are no records.
    pub fn build<'a, I>(records: I, cost: f64) -> Option<Self>
    where
        I: IntoIterator<Item = &'a SaleRecord>,
    {
        let mut by_price: BTreeMap<Reverse<OrderedFloat<f64>>, u64> = BTreeMap::new();
        for record in records {
            *by_price
                .entry(Reverse(OrderedFloat(record.unit_price)))
                .or_insert(0) += record.quantity as u64;
        }

        if by_price.is_empty() {
            return None;
        }

        let mut running = 0u64;
        let cumulative: Vec<(f64, u64)> = by_price
            .into_iter()
            .map(|(Reverse(price), quantity)| {
                running += quantity;
                (price.into_inner(), running)
            })
            .collect();

        // The lowest price accumulates everything.
        let max_demand = running;

        let buckets = cumulative
            .into_iter()
            .map(|(unit_price, cumulative_quantity)| {
                let profit = unit_price - cost;
                PriceBucket {
                    unit_price,
                    cumulative_quantity,
                    cost,
                    profit,
                    expected_profit: cumulative_quantity as f64 * profit,
                    captured_demand_pct: captured_pct(cumulative_quantity, max_demand),
                }
            })
            .collect();

        Some(DemandCurve { buckets, max_demand })
    }

    /// Buckets ordered by descending price.
    pub fn buckets(&self) -> &[PriceBucket] {
        &self.buckets
    }

    pub fn max_demand(&self) -> u64 {
        self.max_demand
    }

    /// Bucket with the highest expected profit.
    ///
    /// Among equal expected profits the lowest price wins.
    pub fn best_bucket(&self) -> Option<&PriceBucket> {
        self.buckets.iter().fold(None, |best: Option<&PriceBucket>, bucket| match best {
            Some(current) if bucket.expected_profit < current.expected_profit => Some(current),
            _ => Some(bucket),
        })
    }

    /// Bucket whose price equals `unit_price` exactly.
    pub fn bucket_at(&self, unit_price: f64) -> Option<&PriceBucket> {
        self.buckets.iter().find(|b| b.unit_price == unit_price)
    }
}

fn captured_pct(quantity: u64, max_demand: u64) -> f64 {
    if max_demand == 0 {
        return 0.0;
    }
    round1(quantity as f64 * 100.0 / max_demand as f64)
}

/// Rounds to one decimal place.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// `(new - base) / base * 100`, one decimal; `None` when `base` is zero.
pub fn percent_change(new: f64, base: f64) -> Option<f64> {
    if base == 0.0 {
        return None;
    }
    Some(round1((new - base) * 100.0 / base))
}

/// First day of the window ending at `latest`, `months` calendar months back.
///
/// Day-of-month is clamped to the end of shorter months.
pub fn window_start(latest: NaiveDate, months: u32) -> NaiveDate {
    latest
        .checked_sub_months(Months::new(months))
        .unwrap_or(NaiveDate::MIN)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(price: f64, quantity: u32) -> SaleRecord {
        SaleRecord::new("Snacks", None, NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(), price, quantity, 1.0)
    }

    #[test]
    fn test_curve_accumulates_from_highest_price() {
        let records = vec![record(10.0, 5), record(15.0, 10), record(10.0, 45), record(12.0, 20)];
        let curve = DemandCurve::build(&records, 6.0).unwrap();

        let prices: Vec<f64> = curve.buckets().iter().map(|b| b.unit_price).collect();
        let cumulative: Vec<u64> = curve.buckets().iter().map(|b| b.cumulative_quantity).collect();
        assert_eq!(prices, vec![15.0, 12.0, 10.0]);
        assert_eq!(cumulative, vec![10, 30, 80]);
        assert_eq!(curve.max_demand(), 80);
        assert_eq!(curve.buckets()[2].captured_demand_pct, 100.0);
        assert_eq!(curve.buckets()[0].captured_demand_pct, 12.5);
    }

    #[test]
    fn test_expected_profit_uses_group_cost() {
        let records = vec![record(15.0, 10), record(10.0, 50)];
        let curve = DemandCurve::build(&records, 6.0).unwrap();
        assert_eq!(curve.buckets()[0].expected_profit, 90.0);
        assert_eq!(curve.buckets()[1].expected_profit, 240.0);
        assert_eq!(curve.best_bucket().unwrap().unit_price, 10.0);
    }

    #[test]
    fn test_best_bucket_tie_prefers_lowest_price() {
        // 10 * (10 - 4) == 20 * (7 - 4)
        let records = vec![record(10.0, 10), record(7.0, 10)];
        let curve = DemandCurve::build(&records, 4.0).unwrap();
        assert_eq!(curve.buckets()[0].expected_profit, 60.0);
        assert_eq!(curve.buckets()[1].expected_profit, 60.0);
        assert_eq!(curve.best_bucket().unwrap().unit_price, 7.0);
    }

    #[test]
    fn test_bucket_at_exact_price() {
        let records = vec![record(10.0, 1), record(12.0, 1)];
        let curve = DemandCurve::build(&records, 1.0).unwrap();
        assert!(curve.bucket_at(12.0).is_some());
        assert!(curve.bucket_at(11.0).is_none());
    }

    #[test]
    fn test_empty_records_build_nothing() {
        let records: Vec<SaleRecord> = Vec::new();
        assert!(DemandCurve::build(&records, 1.0).is_none());
    }

    #[test]
    fn test_percent_change_guards_zero_base() {
        assert_eq!(percent_change(12.0, 10.0), Some(20.0));
        assert_eq!(percent_change(10.0, 12.0), Some(-16.7));
        assert_eq!(percent_change(1.0, 0.0), None);
    }

    #[test]
    fn test_window_start_clamps_month_end() {
        let latest = NaiveDate::from_ymd_opt(2024, 5, 31).unwrap();
        assert_eq!(window_start(latest, 3), NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
        let latest = NaiveDate::from_ymd_opt(2019, 3, 30).unwrap();
        assert_eq!(window_start(latest, 3), NaiveDate::from_ymd_opt(2018, 12, 30).unwrap());
    }
}
