// src/aggregate/mod.rs
pub mod date_parser;

use chrono::NaiveDateTime;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, trace};

use crate::schema::{CanonicalRole, ColumnBinding, ResolvedTable};

/// One (label, summed amount) pair of a chart series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub label: String,
    pub value: f64,
}

/// A grouped rollup of the amount column by one role.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    pub role: CanonicalRole,
    /// Raw column the series groups by.
    pub column: String,
    /// Chart title, e.g. `Sales by Product Category`.
    pub title: String,
    pub points: Vec<SeriesPoint>,
}

impl Series {
    fn new(role: CanonicalRole, binding: &ColumnBinding, title: String) -> Self {
        Self {
            role,
            column: binding.name.clone(),
            title,
            points: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn sum(&self) -> f64 {
        self.points.iter().map(|p| p.value).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateResult {
    pub total: f64,
    /// `None` when there are no rows.
    pub mean: Option<f64>,
    pub count: usize,
    /// One series per bound categorical role, each sorted by descending sum.
    pub categories: Vec<Series>,
    /// Present when a date column is bound; sorted by ascending date.
    pub trend: Option<Series>,
}

impl AggregateResult {
    pub fn category(&self, role: CanonicalRole) -> Option<&Series> {
        self.categories.iter().find(|s| s.role == role)
    }
}

/// KPIs and grouped series over `filtered`. Non-numeric amounts count as a
/// row but add nothing to the total.
pub fn aggregate(filtered: &ResolvedTable) -> AggregateResult {
    let amounts = amounts(filtered);
    let count = amounts.len();
    let total: f64 = amounts.iter().sum();
    let mean = (count > 0).then(|| total / count as f64);

    let categories = CanonicalRole::CATEGORICAL
        .iter()
        .filter_map(|role| sum_by_category(filtered, &amounts, *role))
        .collect();
    let trend = sum_by_date(filtered, &amounts);

    debug!(count, total, "aggregated");
    AggregateResult {
        total,
        mean,
        count,
        categories,
        trend,
    }
}

fn amounts(resolved: &ResolvedTable) -> Vec<f64> {
    let col = resolved.amount().index;
    (0..resolved.num_rows())
        .map(|row| resolved.table.cell(row, col).as_number().unwrap_or(0.0))
        .collect()
}

/// Sum per distinct value of `role`, descending; ties keep first-seen order.
fn sum_by_category(
    resolved: &ResolvedTable,
    amounts: &[f64],
    role: CanonicalRole,
) -> Option<Series> {
    let binding = resolved.binding(role)?;
    let mut series = Series::new(role, binding, format!("Sales by {}", binding.title()));

    let mut slot: HashMap<String, usize> = HashMap::new();
    for (row, amount) in amounts.iter().enumerate() {
        let key = resolved.table.cell(row, binding.index).label();
        match slot.get(&key) {
            Some(&i) => series.points[i].value += amount,
            None => {
                slot.insert(key.clone(), series.points.len());
                series.points.push(SeriesPoint {
                    label: key,
                    value: *amount,
                });
            }
        }
    }

    // sort_by is stable
    series
        .points
        .sort_by(|a, b| b.value.total_cmp(&a.value));
    trace!(role = %role, groups = series.points.len(), "category rollup");
    Some(series)
}

/// Sum per parsed date, ascending. Unparsable dates are left out of this
/// series only.
fn sum_by_date(resolved: &ResolvedTable, amounts: &[f64]) -> Option<Series> {
    let binding = resolved.binding(CanonicalRole::Date)?;
    let mut series = Series::new(
        CanonicalRole::Date,
        binding,
        "Sales Trend Over Time".to_string(),
    );

    let mut by_date: BTreeMap<NaiveDateTime, f64> = BTreeMap::new();
    let mut dropped = 0usize;
    for (row, amount) in amounts.iter().enumerate() {
        match date_parser::parse_cell(resolved.table.cell(row, binding.index)) {
            Some(dt) => *by_date.entry(dt).or_insert(0.0) += amount,
            None => dropped += 1,
        }
    }
    if dropped > 0 {
        debug!(dropped, column = %binding.name, "rows with unparsable dates left out of trend");
    }

    series.points = by_date
        .into_iter()
        .map(|(dt, value)| SeriesPoint {
            label: date_parser::format_point(&dt),
            value,
        })
        .collect();
    Some(series)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{apply_filters, FilterSpec};
    use crate::ingest::{RawTable, Value};
    use crate::schema::resolve;
    use std::sync::Arc;

    fn text(s: &str) -> Value {
        Value::Text(s.to_string())
    }

    fn resolved(headers: &[&str], rows: Vec<Vec<Value>>) -> ResolvedTable {
        let t = RawTable::new(headers.iter().map(|h| h.to_string()).collect(), rows);
        resolve(Arc::new(t)).unwrap()
    }

    fn points(s: &Series) -> Vec<(&str, f64)> {
        s.points.iter().map(|p| (p.label.as_str(), p.value)).collect()
    }

    #[test]
    fn test_kpis_and_product_series() {
        let r = resolved(
            &["sales", "productline", "country"],
            vec![
                vec![Value::Number(100.0), text("A"), text("US")],
                vec![Value::Number(50.0), text("B"), text("US")],
            ],
        );
        let agg = aggregate(&r);
        assert_eq!(agg.total, 150.0);
        assert_eq!(agg.mean, Some(75.0));
        assert_eq!(agg.count, 2);
        let product = agg.category(CanonicalRole::Product).unwrap();
        assert_eq!(points(product), vec![("A", 100.0), ("B", 50.0)]);
        assert_eq!(product.title, "Sales by Productline");
        let region = agg.category(CanonicalRole::Region).unwrap();
        assert_eq!(points(region), vec![("US", 150.0)]);
        assert!(agg.trend.is_none());
    }

    #[test]
    fn test_category_ties_keep_first_seen_order() {
        let r = resolved(
            &["revenue", "product"],
            vec![
                vec![Value::Number(10.0), text("Z")],
                vec![Value::Number(30.0), text("M")],
                vec![Value::Number(10.0), text("A")],
                vec![Value::Number(20.0), text("M")],
            ],
        );
        let agg = aggregate(&r);
        let product = agg.category(CanonicalRole::Product).unwrap();
        assert_eq!(points(product), vec![("M", 50.0), ("Z", 10.0), ("A", 10.0)]);
        for w in product.points.windows(2) {
            assert!(w[0].value >= w[1].value);
        }
    }

    #[test]
    fn test_group_sums_conserve_total() {
        let r = resolved(
            &["sales", "region", "productline"],
            vec![
                vec![Value::Number(1.5), text("EMEA"), text("A")],
                vec![Value::Number(2.25), Value::Empty, text("B")],
                vec![text("n/a"), text("APAC"), text("A")],
                vec![Value::Number(4.0), text("EMEA"), Value::Empty],
            ],
        );
        let agg = aggregate(&r);
        assert_eq!(agg.count, 4);
        assert_eq!(agg.total, 7.75);
        for series in &agg.categories {
            assert_eq!(series.sum(), agg.total, "{}", series.title);
        }
        let region = agg.category(CanonicalRole::Region).unwrap();
        assert_eq!(
            points(region),
            vec![("EMEA", 5.5), ("", 2.25), ("APAC", 0.0)]
        );
    }

    #[test]
    fn test_trend_drops_only_unparsable_dates() {
        let r = resolved(
            &["sales", "orderdate"],
            vec![
                vec![Value::Number(10.0), text("not a date")],
                vec![Value::Number(20.0), text("2/24/2003 0:00")],
            ],
        );
        let agg = aggregate(&r);
        assert_eq!(agg.total, 30.0);
        assert_eq!(agg.mean, Some(15.0));
        assert_eq!(agg.count, 2);
        let trend = agg.trend.unwrap();
        assert_eq!(points(&trend), vec![("2003-02-24", 20.0)]);
    }

    #[test]
    fn test_trend_groups_by_exact_date_and_sorts_ascending() {
        let r = resolved(
            &["sales", "ORDERDATE"],
            vec![
                vec![Value::Number(1.0), text("2004-01-02")],
                vec![Value::Number(2.0), text("2003-05-07")],
                vec![Value::Number(4.0), text("2004/01/02")],
            ],
        );
        let trend = aggregate(&r).trend.unwrap();
        assert_eq!(
            points(&trend),
            vec![("2003-05-07", 2.0), ("2004-01-02", 5.0)]
        );
    }

    #[test]
    fn test_empty_filter_result_aggregates_without_error() {
        let r = resolved(
            &["sales", "productline", "country", "orderdate"],
            vec![
                vec![Value::Number(100.0), text("A"), text("US"), text("2003-01-01")],
                vec![Value::Number(50.0), text("B"), text("CA"), text("2003-01-02")],
            ],
        );
        let mut spec = FilterSpec::all_observed(&r);
        spec.narrow(CanonicalRole::Region, ["Atlantis"]);
        let agg = aggregate(&apply_filters(&r, &spec));
        assert_eq!(agg.count, 0);
        assert_eq!(agg.total, 0.0);
        assert_eq!(agg.mean, None);
        assert_eq!(agg.categories.len(), 2);
        assert!(agg.categories.iter().all(Series::is_empty));
        assert!(agg.trend.unwrap().is_empty());
    }

    #[test]
    fn test_text_categories_keep_their_spelling() {
        let table = crate::ingest::load_table(
            "mixed.csv",
            b"sales,product\n1,007\n2,7\n4,1.10\n8,1.1\n16,Widget\n",
        )
        .unwrap();
        let r = resolve(Arc::new(table)).unwrap();
        let agg = aggregate(&r);
        let product = agg.category(CanonicalRole::Product).unwrap();
        assert_eq!(
            points(product),
            vec![("Widget", 16.0), ("1.1", 8.0), ("1.10", 4.0), ("7", 2.0), ("007", 1.0)]
        );
        assert_eq!(agg.total, 31.0);

        let mut spec = FilterSpec::new();
        spec.narrow(CanonicalRole::Product, ["007"]);
        assert_eq!(aggregate(&apply_filters(&r, &spec)).total, 1.0);
    }
}
