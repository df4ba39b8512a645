//! Product-line association rules per customer segment.
//!
//! A basket is the set of distinct product lines sold by one branch to one
//! customer type on one day. Within each segment (a combination of branch,
//! gender and/or customer type) single-item rules `A -> B` are scored by
//! support, confidence and lift.

use crate::sale_record::SaleRecord;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::io::Write;
use std::str::FromStr;

/// Attribute customers are segmented by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentDimension {
    Branch,
    Gender,
    CustomerType,
}

impl SegmentDimension {
    pub const ALL: [SegmentDimension; 3] = [
        SegmentDimension::Branch,
        SegmentDimension::Gender,
        SegmentDimension::CustomerType,
    ];

    pub fn column_name(&self) -> &'static str {
        match self {
            SegmentDimension::Branch => "branch",
            SegmentDimension::Gender => "gender",
            SegmentDimension::CustomerType => "customer_type",
        }
    }

    pub fn value_of<'a>(&self, record: &'a SaleRecord) -> Option<&'a str> {
        match self {
            SegmentDimension::Branch => record.attributes.branch.as_deref(),
            SegmentDimension::Gender => record.attributes.gender.as_deref(),
            SegmentDimension::CustomerType => record.attributes.customer_type.as_deref(),
        }
    }
}

impl fmt::Display for SegmentDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.column_name())
    }
}

impl FromStr for SegmentDimension {
    type Err = BasketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match crate::sale_record::normalize_column_name(s).as_str() {
            "branch" => Ok(SegmentDimension::Branch),
            "gender" => Ok(SegmentDimension::Gender),
            "customer_type" => Ok(SegmentDimension::CustomerType),
            other => Err(BasketError::InvalidInput(format!("Unknown segment dimension: {}", other))),
        }
    }
}

/// Errors raised while mining rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BasketError {
    InvalidInput(String),
}

impl fmt::Display for BasketError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BasketError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
        }
    }
}

impl std::error::Error for BasketError {}

/// Filters applied to candidate rules.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RuleThresholds {
    /// Minimum support of the item pair
    pub min_support: f64,
    pub min_confidence: f64,
    /// Rules must have lift strictly above this
    pub min_lift: f64,
    /// Rules kept per segment by [`SegmentRules::top`]
    pub top_n: usize,
}

impl Default for RuleThresholds {
    fn default() -> Self {
        RuleThresholds {
            min_support: 0.0001,
            min_confidence: 0.01,
            min_lift: 1.0,
            top_n: 5,
        }
    }
}

/// A single-antecedent, single-consequent rule.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssociationRule {
    pub antecedent: String,
    pub consequent: String,
    pub antecedent_support: f64,
    pub consequent_support: f64,
    pub support: f64,
    pub confidence: f64,
    pub lift: f64,
}

/// Rules mined for one segment, strongest first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentRules {
    pub segment: Vec<(SegmentDimension, String)>,
    pub basket_count: usize,
    pub rules: Vec<AssociationRule>,
}

impl SegmentRules {
    /// The `n` rules with the highest confidence.
    pub fn top(&self, n: usize) -> &[AssociationRule] {
        &self.rules[..n.min(self.rules.len())]
    }

    /// Human-readable summary of the segment, e.g. `branch A, gender Female`.
    pub fn describe_segment(&self) -> String {
        self.segment
            .iter()
            .map(|(d, v)| format!("{} {}", d, v))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// One-sentence insight for a rule of this segment.
    pub fn insight(&self, rule: &AssociationRule) -> String {
        format!(
            "Customers in {} who buy {} also buy {} in {:.2}% of their baskets (lift {:.2}); consider bundling or cross-promoting these categories.",
            self.describe_segment(),
            rule.antecedent,
            rule.consequent,
            rule.confidence * 100.0,
            rule.lift
        )
    }
}

/// Groups records into baskets keyed by branch, customer type and date.
///
/// Records without a branch or customer type are skipped.
pub fn build_baskets<'a, I>(records: I) -> Vec<BTreeSet<String>>
where
    I: IntoIterator<Item = &'a SaleRecord>,
{
    let mut baskets: BTreeMap<(&str, &str, NaiveDate), BTreeSet<String>> = BTreeMap::new();
    for record in records {
        let (Some(branch), Some(customer_type)) = (
            record.attributes.branch.as_deref(),
            record.attributes.customer_type.as_deref(),
        ) else {
            continue;
        };
        baskets
            .entry((branch, customer_type, record.date))
            .or_default()
            .insert(record.product_line.clone());
    }
    baskets.into_values().collect()
}

/// Scores every ordered pair of items that occur together.
pub fn pair_rules(baskets: &[BTreeSet<String>], thresholds: &RuleThresholds) -> Vec<AssociationRule> {
    if baskets.is_empty() {
        return Vec::new();
    }
    let total = baskets.len() as f64;

    let mut item_counts: HashMap<&str, usize> = HashMap::new();
    let mut pair_counts: BTreeMap<(&str, &str), usize> = BTreeMap::new();
    for basket in baskets {
        let items: Vec<&str> = basket.iter().map(String::as_str).collect();
        for (i, &a) in items.iter().enumerate() {
            *item_counts.entry(a).or_insert(0) += 1;
            for &b in &items[i + 1..] {
                *pair_counts.entry((a, b)).or_insert(0) += 1;
            }
        }
    }

    let support_of = |item: &str| item_counts.get(item).copied().unwrap_or(0) as f64 / total;

    let mut rules = Vec::new();
    for ((a, b), count) in pair_counts {
        let support = count as f64 / total;
        if support < thresholds.min_support {
            continue;
        }
        for (antecedent, consequent) in [(a, b), (b, a)] {
            let antecedent_support = support_of(antecedent);
            let consequent_support = support_of(consequent);
            if antecedent_support < thresholds.min_support || consequent_support < thresholds.min_support {
                continue;
            }
            let confidence = support / antecedent_support;
            let lift = confidence / consequent_support;
            if confidence >= thresholds.min_confidence && lift > thresholds.min_lift {
                rules.push(AssociationRule {
                    antecedent: antecedent.to_string(),
                    consequent: consequent.to_string(),
                    antecedent_support,
                    consequent_support,
                    support,
                    confidence,
                    lift,
                });
            }
        }
    }

    rules.sort_by(|x, y| {
        y.confidence
            .total_cmp(&x.confidence)
            .then_with(|| y.lift.total_cmp(&x.lift))
            .then_with(|| x.antecedent.cmp(&y.antecedent))
            .then_with(|| x.consequent.cmp(&y.consequent))
    });
    rules
}

/// Mines rules separately for every segment present in `records`.
///
/// Segments are returned in ascending order of their attribute values.
/// Records missing one of the `segment_by` attributes are ignored.
pub fn mine_segment_rules(
    records: &[SaleRecord],
    segment_by: &[SegmentDimension],
    thresholds: &RuleThresholds,
) -> Result<Vec<SegmentRules>, BasketError> {
    if segment_by.is_empty() {
        return Err(BasketError::InvalidInput(
            "select at least one segment dimension".to_string(),
        ));
    }

    let mut segments: BTreeMap<Vec<&str>, Vec<&SaleRecord>> = BTreeMap::new();
    for record in records {
        let key: Option<Vec<&str>> = segment_by.iter().map(|d| d.value_of(record)).collect();
        if let Some(key) = key {
            segments.entry(key).or_default().push(record);
        }
    }

    let result = segments
        .into_iter()
        .map(|(values, members)| {
            let baskets = build_baskets(members);
            let rules = pair_rules(&baskets, thresholds);
            tracing::debug!(segment = ?values, baskets = baskets.len(), rules = rules.len(), "mined segment");
            SegmentRules {
                segment: segment_by
                    .iter()
                    .copied()
                    .zip(values.into_iter().map(str::to_string))
                    .collect(),
                basket_count: baskets.len(),
                rules,
            }
        })
        .collect();

    Ok(result)
}

/// Writes every rule with its segment attributes as CSV.
pub fn write_rules_csv<W: Write>(writer: W, segments: &[SegmentRules]) -> Result<(), csv::Error> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record([
        "segment",
        "antecedent",
        "consequent",
        "antecedent_support",
        "consequent_support",
        "support",
        "confidence",
        "lift",
    ])?;
    for segment in segments {
        let label = segment.describe_segment();
        for rule in &segment.rules {
            wtr.write_record([
                label.clone(),
                rule.antecedent.clone(),
                rule.consequent.clone(),
                rule.antecedent_support.to_string(),
                rule.consequent_support.to_string(),
                rule.support.to_string(),
                rule.confidence.to_string(),
                rule.lift.to_string(),
            ])?;
        }
    }
    wtr.flush()?;
    Ok(())
}
