// src/filter/mod.rs

use serde::{de::Error as _, Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use tracing::{debug, warn};

use crate::ingest::Value;
use crate::schema::{CanonicalRole, ResolvedTable};

/// Accepted values per role. A role absent from the map is not filtered.
///
/// Values are compared by [`Value::label`], so `2003` in a year column
/// matches the string `"2003"`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FilterSpec {
    accepted: BTreeMap<CanonicalRole, BTreeSet<String>>,
}

impl FilterSpec {
    /// No filters at all.
    pub fn new() -> Self {
        Self::default()
    }

    /// The default view: every bound filterable role accepts every value
    /// observed in its column.
    pub fn all_observed(resolved: &ResolvedTable) -> Self {
        let mut spec = Self::new();
        for role in CanonicalRole::FILTERABLE {
            if resolved.binding(role).is_some() {
                spec.narrow(role, observed_values(resolved, role));
            }
        }
        spec
    }

    /// Replace the accepted set for `role`.
    pub fn narrow<I, S>(&mut self, role: CanonicalRole, values: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.accepted
            .insert(role, values.into_iter().map(Into::into).collect());
        self
    }

    /// Stop filtering on `role`.
    pub fn clear(&mut self, role: CanonicalRole) -> &mut Self {
        self.accepted.remove(&role);
        self
    }

    pub fn accepted(&self, role: CanonicalRole) -> Option<&BTreeSet<String>> {
        self.accepted.get(&role)
    }

    pub fn iter(&self) -> impl Iterator<Item = (CanonicalRole, &BTreeSet<String>)> {
        self.accepted.iter().map(|(r, s)| (*r, s))
    }

    pub fn is_empty(&self) -> bool {
        self.accepted.is_empty()
    }

    /// Overlay `other` on `self`; roles named in `other` win.
    pub fn merge(&mut self, other: FilterSpec) -> &mut Self {
        self.accepted.extend(other.accepted);
        self
    }

    /// Load from YAML shaped as `{ product: [A, B], year: [2003] }`.
    /// Scalars of any type are accepted and compared by their label.
    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        let raw: BTreeMap<CanonicalRole, Vec<serde_yaml::Value>> = serde_yaml::from_str(text)?;
        let mut spec = Self::new();
        for (role, values) in raw {
            let mut labels = Vec::with_capacity(values.len());
            for v in &values {
                let Some(label) = yaml_label(v) else {
                    return Err(serde_yaml::Error::custom(format!(
                        "filter values for `{}` must be scalars, got {:?}",
                        role, v
                    )));
                };
                labels.push(label);
            }
            spec.narrow(role, labels);
        }
        Ok(spec)
    }
}

impl<'de> Deserialize<'de> for FilterSpec {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let accepted = BTreeMap::<CanonicalRole, BTreeSet<String>>::deserialize(d)?;
        Ok(Self { accepted })
    }
}

fn yaml_label(v: &serde_yaml::Value) -> Option<String> {
    match v {
        serde_yaml::Value::String(s) => Some(s.trim().to_string()),
        serde_yaml::Value::Number(n) => n.as_f64().map(|f| Value::Number(f).label()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        serde_yaml::Value::Null => Some(String::new()),
        _ => None,
    }
}

/// Distinct labels of `role`'s column in first-seen order; years sort ascending.
/// Empty when the role is unbound.
pub fn observed_values(resolved: &ResolvedTable, role: CanonicalRole) -> Vec<String> {
    let Some(binding) = resolved.binding(role) else {
        return Vec::new();
    };
    let table = &resolved.table;
    let mut seen = HashSet::new();
    let mut values: Vec<String> = (0..table.num_rows())
        .map(|row| table.cell(row, binding.index).label())
        .filter(|label| seen.insert(label.clone()))
        .collect();

    if role == CanonicalRole::Year {
        values.sort_by(|a, b| match (a.parse::<f64>(), b.parse::<f64>()) {
            (Ok(x), Ok(y)) => x.total_cmp(&y),
            (Ok(_), Err(_)) => std::cmp::Ordering::Less,
            (Err(_), Ok(_)) => std::cmp::Ordering::Greater,
            (Err(_), Err(_)) => a.cmp(b),
        });
    }
    values
}

/// Keep rows whose value is accepted for every filtered, bound role.
/// Roles that are unbound in `resolved` are ignored.
pub fn apply_filters(resolved: &ResolvedTable, spec: &FilterSpec) -> ResolvedTable {
    let mut active = Vec::new();
    for (role, accepted) in spec.iter() {
        match resolved.binding(role) {
            Some(b) => active.push((b.index, accepted)),
            None => warn!(role = %role, "filter names an unbound role; ignored"),
        }
    }
    if active.is_empty() {
        return resolved.clone();
    }

    let table = &resolved.table;
    let keep: Vec<usize> = (0..table.num_rows())
        .filter(|&row| {
            active
                .iter()
                .all(|(col, accepted)| accepted.contains(&table.cell(row, *col).label()))
        })
        .collect();

    debug!(
        before = table.num_rows(),
        after = keep.len(),
        roles = active.len(),
        "applied filters"
    );
    resolved.with_table(table.select_rows(&keep))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::RawTable;
    use crate::schema::resolve;
    use std::sync::Arc;

    fn resolved() -> ResolvedTable {
        let t = RawTable::new(
            vec!["SALES".into(), "PRODUCTLINE".into(), "COUNTRY".into(), "YEAR_ID".into()],
            vec![
                vec![Value::Number(100.0), Value::Text("A".into()), Value::Text("US".into()), Value::Number(2004.0)],
                vec![Value::Number(50.0), Value::Text("B".into()), Value::Text("US".into()), Value::Number(2003.0)],
                vec![Value::Number(30.0), Value::Text("A".into()), Value::Text("CA".into()), Value::Number(2005.0)],
                vec![Value::Number(20.0), Value::Text("C".into()), Value::Empty, Value::Number(2003.0)],
            ],
        );
        resolve(Arc::new(t)).unwrap()
    }

    fn amounts(r: &ResolvedTable) -> Vec<f64> {
        (0..r.num_rows())
            .filter_map(|row| r.table.cell(row, r.amount().index).as_number())
            .collect()
    }

    #[test]
    fn test_default_spec_keeps_every_row() {
        let r = resolved();
        let spec = FilterSpec::all_observed(&r);
        assert_eq!(
            spec.accepted(CanonicalRole::Region).unwrap(),
            &BTreeSet::from(["US".to_string(), "CA".to_string(), String::new()])
        );
        assert!(spec.accepted(CanonicalRole::Status).is_none());
        assert_eq!(apply_filters(&r, &spec), r);
    }

    #[test]
    fn test_observed_values_order() {
        let r = resolved();
        assert_eq!(observed_values(&r, CanonicalRole::Product), vec!["A", "B", "C"]);
        assert_eq!(observed_values(&r, CanonicalRole::Year), vec!["2003", "2004", "2005"]);
        assert!(observed_values(&r, CanonicalRole::Status).is_empty());
    }

    #[test]
    fn test_filters_compose_conjunctively_in_any_order() {
        let r = resolved();
        let mut a = FilterSpec::new();
        a.narrow(CanonicalRole::Product, ["A"]);
        let mut b = FilterSpec::new();
        b.narrow(CanonicalRole::Region, ["US"]);

        let ab = apply_filters(&apply_filters(&r, &a), &b);
        let ba = apply_filters(&apply_filters(&r, &b), &a);
        let mut both = a.clone();
        both.merge(b.clone());
        let once = apply_filters(&r, &both);

        assert_eq!(amounts(&ab), vec![100.0]);
        assert_eq!(ab, ba);
        assert_eq!(ab, once);
    }

    #[test]
    fn test_apply_filters_is_idempotent() {
        let r = resolved();
        let mut spec = FilterSpec::new();
        spec.narrow(CanonicalRole::Year, ["2003", "2005"]);
        let once = apply_filters(&r, &spec);
        let twice = apply_filters(&once, &spec);
        assert_eq!(once, twice);
        assert_eq!(amounts(&once), vec![50.0, 30.0, 20.0]);
    }

    #[test]
    fn test_empty_accepted_set_yields_empty_table() {
        let r = resolved();
        let mut spec = FilterSpec::all_observed(&r);
        spec.narrow(CanonicalRole::Product, Vec::<String>::new());
        let out = apply_filters(&r, &spec);
        assert_eq!(out.num_rows(), 0);
        assert_eq!(out.table.headers, r.table.headers);
    }

    #[test]
    fn test_unbound_role_passes_everything() {
        let r = resolved();
        let mut spec = FilterSpec::new();
        spec.narrow(CanonicalRole::Status, ["Shipped"]);
        assert_eq!(apply_filters(&r, &spec).num_rows(), 4);
    }

    #[test]
    fn test_from_yaml_accepts_mixed_scalars() {
        let spec = FilterSpec::from_yaml("product: [A, ' B ']\nyear: [2003, 2004.0]\n").unwrap();
        assert_eq!(
            spec.accepted(CanonicalRole::Product).unwrap(),
            &BTreeSet::from(["A".to_string(), "B".to_string()])
        );
        assert_eq!(
            spec.accepted(CanonicalRole::Year).unwrap(),
            &BTreeSet::from(["2003".to_string(), "2004".to_string()])
        );
        assert!(FilterSpec::from_yaml("product: [[nested]]").is_err());
        assert!(FilterSpec::from_yaml("colour: [red]").is_err());
    }

    #[test]
    fn test_clear_removes_role() {
        let r = resolved();
        let mut spec = FilterSpec::new();
        spec.narrow(CanonicalRole::Product, ["B"]).clear(CanonicalRole::Product);
        assert!(spec.is_empty());
        assert_eq!(apply_filters(&r, &spec).num_rows(), 4);
    }
}
