// src/schema/resolve.rs

use std::{collections::BTreeMap, sync::Arc};
use tracing::{debug, instrument, trace, warn};

use super::types::{CanonicalRole, ColumnBinding};
use crate::error::{PipelineError, PipelineResult};
use crate::ingest::RawTable;

/// Ordered (role, accepted column name) rules. For each role the first
/// candidate present in the file wins; within a candidate, the leftmost column.
pub const SYNONYMS: &[(CanonicalRole, &str)] = &[
    (CanonicalRole::Amount, "sales"),
    (CanonicalRole::Amount, "revenue"),
    (CanonicalRole::Product, "productline"),
    (CanonicalRole::Product, "product_category"),
    (CanonicalRole::Product, "product"),
    (CanonicalRole::Product, "products"),
    (CanonicalRole::Region, "region"),
    (CanonicalRole::Region, "country"),
    (CanonicalRole::Status, "status"),
    (CanonicalRole::Year, "year_id"),
    (CanonicalRole::Date, "orderdate"),
];

/// Header form used for synonym matching. The table keeps the original.
pub fn normalize_column(name: &str) -> String {
    name.trim().to_lowercase()
}

/// A table whose columns are bound to canonical roles.
///
/// The amount binding is held outside the optional map so that a
/// `ResolvedTable` without one cannot be built.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTable {
    pub table: Arc<RawTable>,
    amount: ColumnBinding,
    optional: BTreeMap<CanonicalRole, ColumnBinding>,
}

impl ResolvedTable {
    pub fn binding(&self, role: CanonicalRole) -> Option<&ColumnBinding> {
        match role {
            CanonicalRole::Amount => Some(&self.amount),
            other => self.optional.get(&other),
        }
    }

    pub fn amount(&self) -> &ColumnBinding {
        &self.amount
    }

    /// Every bound role with its column, in role order.
    pub fn bindings(&self) -> impl Iterator<Item = (CanonicalRole, &ColumnBinding)> {
        std::iter::once((CanonicalRole::Amount, &self.amount))
            .chain(self.optional.iter().map(|(r, b)| (*r, b)))
    }

    pub fn num_rows(&self) -> usize {
        self.table.num_rows()
    }

    /// Same bindings over a different set of rows.
    pub fn with_table(&self, table: RawTable) -> ResolvedTable {
        ResolvedTable {
            table: Arc::new(table),
            amount: self.amount.clone(),
            optional: self.optional.clone(),
        }
    }
}

/// Bind columns of `table` to roles using [`SYNONYMS`].
pub fn resolve(table: Arc<RawTable>) -> PipelineResult<ResolvedTable> {
    resolve_with(table, SYNONYMS)
}

/// Bind columns of `table` using an explicit rule list.
#[instrument(level = "debug", skip_all, fields(columns = table.headers.len(), rules = rules.len()))]
pub fn resolve_with(
    table: Arc<RawTable>,
    rules: &[(CanonicalRole, &str)],
) -> PipelineResult<ResolvedTable> {
    let normalized: Vec<String> = table.headers.iter().map(|h| normalize_column(h)).collect();
    let mut bound: BTreeMap<CanonicalRole, ColumnBinding> = BTreeMap::new();

    for (role, candidate) in rules {
        if bound.contains_key(role) {
            continue;
        }
        if let Some(index) = normalized.iter().position(|n| n == candidate) {
            trace!(role = %role, column = %table.headers[index], "bound column");
            bound.insert(
                *role,
                ColumnBinding {
                    name: table.headers[index].clone(),
                    normalized: normalized[index].clone(),
                    index,
                },
            );
        }
    }

    let amount = match bound.remove(&CanonicalRole::Amount) {
        Some(b) => b,
        None => {
            warn!(columns = ?table.headers, "no amount column");
            return Err(PipelineError::MissingAmount {
                columns: table.headers.clone(),
            });
        }
    };

    debug!(
        amount = %amount.name,
        optional = ?bound.keys().collect::<Vec<_>>(),
        "resolved roles"
    );
    Ok(ResolvedTable {
        table,
        amount,
        optional: bound,
    })
}
