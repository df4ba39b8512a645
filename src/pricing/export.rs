use super::types::{GroupBy, Recommendation};
use serde::Serialize;
use std::io::Write;

/// Sign of a delta column, used by consumers to colour cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeltaSign {
    Positive,
    Negative,
    Zero,
    Undefined,
}

impl DeltaSign {
    pub fn classify(value: Option<f64>) -> DeltaSign {
        match value {
            Some(v) if v > 0.0 => DeltaSign::Positive,
            Some(v) if v < 0.0 => DeltaSign::Negative,
            Some(v) if v == 0.0 => DeltaSign::Zero,
            _ => DeltaSign::Undefined,
        }
    }
}

fn cell(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Writes recommendations as a CSV table.
///
/// One key column per grouping dimension (in `group_by` order) is followed by
/// the price and demand columns. Undefined values are written as empty cells.
pub fn write_recommendations_csv<W: Write>(
    writer: W,
    recommendations: &[Recommendation],
    group_by: &GroupBy,
) -> Result<(), csv::Error> {
    let mut wtr = csv::Writer::from_writer(writer);

    let mut header: Vec<&str> = group_by.dimensions().iter().map(|d| d.column_name()).collect();
    header.extend([
        "best_price",
        "current_price",
        "price_delta_pct",
        "captured_demand_pct",
        "current_captured_demand_pct",
        "demand_delta_pct",
    ]);
    wtr.write_record(&header)?;

    for rec in recommendations {
        let mut row = rec.group_values(group_by);
        row.extend([
            rec.best_price.to_string(),
            rec.current_price.to_string(),
            cell(rec.price_delta_pct),
            rec.captured_demand_pct.to_string(),
            cell(rec.current_captured_demand_pct),
            cell(rec.demand_delta_pct),
        ]);
        wtr.write_record(&row)?;
    }

    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recommendation(city: Option<&str>) -> Recommendation {
        Recommendation {
            product_line: Some("Snacks".to_string()),
            city: city.map(str::to_string),
            best_price: 12.0,
            current_price: 10.0,
            price_delta_pct: Some(20.0),
            captured_demand_pct: 40.0,
            current_captured_demand_pct: None,
            demand_delta_pct: None,
        }
    }

    #[test]
    fn test_delta_sign_classification() {
        assert_eq!(DeltaSign::classify(Some(1.5)), DeltaSign::Positive);
        assert_eq!(DeltaSign::classify(Some(-0.1)), DeltaSign::Negative);
        assert_eq!(DeltaSign::classify(Some(0.0)), DeltaSign::Zero);
        assert_eq!(DeltaSign::classify(None), DeltaSign::Undefined);
    }

    #[test]
    fn test_csv_without_city_column() {
        let mut out = Vec::new();
        write_recommendations_csv(&mut out, &[recommendation(None)], &GroupBy::product()).unwrap();
        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("product_line,best_price,current_price,price_delta_pct,captured_demand_pct,current_captured_demand_pct,demand_delta_pct")
        );
        assert_eq!(lines.next(), Some("Snacks,12,10,20,40,,"));
    }

    #[test]
    fn test_csv_with_city_column() {
        let mut out = Vec::new();
        write_recommendations_csv(
            &mut out,
            &[recommendation(Some("Yangon"))],
            &GroupBy::product_and_city(),
        )
        .unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("product_line,city,best_price"));
        assert!(text.contains("Snacks,Yangon,12,10,20,40,,"));
    }
}
