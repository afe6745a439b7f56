use serde::Serialize;
use std::fmt;

use crate::ingest::utils::clean_str;

/// A single cell as it came out of the source file.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Number(f64),
    Text(String),
    Empty,
}

impl Value {
    /// Build a cell from raw text: trimmed and unquoted. The cell becomes a
    /// number only when its label reproduces the text exactly, so `"007"`
    /// and `"1.10"` stay text and keep their own groups.
    pub fn from_raw(raw: &str) -> Self {
        let cleaned = clean_str(raw);
        if cleaned.is_empty() {
            return Value::Empty;
        }
        match parse_finite(&cleaned) {
            Some(n) if Value::Number(n).label() == cleaned => Value::Number(n),
            _ => Value::Text(cleaned),
        }
    }

    /// Numeric reading of the cell; text such as `"1.10"` still parses.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Text(s) => parse_finite(s),
            Value::Empty => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Value::Empty)
    }

    /// Stable string key used for filter membership and grouping.
    /// Integral numbers drop the fractional part (`2003.0` → `"2003"`).
    pub fn label(&self) -> String {
        match self {
            Value::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", *n as i64),
            Value::Number(n) => n.to_string(),
            Value::Text(s) => s.clone(),
            Value::Empty => String::new(),
        }
    }
}

fn parse_finite(s: &str) -> Option<f64> {
    s.parse::<f64>().ok().filter(|n| n.is_finite())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

static EMPTY: Value = Value::Empty;

/// An uploaded table, immutable once parsed.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawTable {
    /// Column names exactly as the file spells them.
    pub headers: Vec<String>,
    /// One entry per data row, padded to `headers.len()`.
    pub rows: Vec<Vec<Value>>,
}

impl RawTable {
    /// Build a table, padding or truncating every row to the header width.
    pub fn new(headers: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        let width = headers.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, Value::Empty);
                row
            })
            .collect();
        Self { headers, rows }
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cell at (`row`, `col`); out-of-range reads yield [`Value::Empty`].
    pub fn cell(&self, row: usize, col: usize) -> &Value {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&EMPTY)
    }

    /// A copy holding only the rows at `indices`, in the given order.
    pub fn select_rows(&self, indices: &[usize]) -> RawTable {
        RawTable {
            headers: self.headers.clone(),
            rows: indices
                .iter()
                .filter_map(|&i| self.rows.get(i).cloned())
                .collect(),
        }
    }
}
