// src/schema/types.rs

use serde::{Deserialize, Serialize};
use std::fmt;

/// Semantic meaning of a column, independent of how a file spells it.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum CanonicalRole {
    Amount,
    Product,
    Region,
    Status,
    Year,
    Date,
}

impl CanonicalRole {
    pub const ALL: [CanonicalRole; 6] = [
        CanonicalRole::Amount,
        CanonicalRole::Product,
        CanonicalRole::Region,
        CanonicalRole::Status,
        CanonicalRole::Year,
        CanonicalRole::Date,
    ];

    /// Roles offered as multi-select filters, in presentation order.
    pub const FILTERABLE: [CanonicalRole; 4] = [
        CanonicalRole::Product,
        CanonicalRole::Region,
        CanonicalRole::Status,
        CanonicalRole::Year,
    ];

    /// Roles rolled up into a per-category series, in presentation order.
    pub const CATEGORICAL: [CanonicalRole; 2] = [CanonicalRole::Product, CanonicalRole::Region];

    pub fn as_str(&self) -> &str {
        match self {
            CanonicalRole::Amount => "amount",
            CanonicalRole::Product => "product",
            CanonicalRole::Region => "region",
            CanonicalRole::Status => "status",
            CanonicalRole::Year => "year",
            CanonicalRole::Date => "date",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "amount" => Some(CanonicalRole::Amount),
            "product" => Some(CanonicalRole::Product),
            "region" => Some(CanonicalRole::Region),
            "status" => Some(CanonicalRole::Status),
            "year" => Some(CanonicalRole::Year),
            "date" => Some(CanonicalRole::Date),
            _ => None,
        }
    }
}

impl fmt::Display for CanonicalRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A raw column bound to a role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnBinding {
    /// Header exactly as the file spells it.
    pub name: String,
    /// Trimmed, lowercased header; the form synonyms are matched against.
    pub normalized: String,
    /// Position in [`crate::ingest::RawTable::headers`].
    pub index: usize,
}

impl ColumnBinding {
    /// Human title for charts and filter labels: `product_category` → `Product Category`.
    pub fn title(&self) -> String {
        self.normalized
            .split('_')
            .filter(|w| !w.is_empty())
            .map(|w| {
                let mut chars = w.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}
