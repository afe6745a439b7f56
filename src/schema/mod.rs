pub mod arrow;
pub mod resolve;
pub mod types;

pub use self::arrow::{build_preview_schema, preview_batch};
pub use resolve::{normalize_column, resolve, resolve_with, ResolvedTable, SYNONYMS};
pub use types::{CanonicalRole, ColumnBinding};
