//! Sales dashboard core: load a loosely-specified sales table, bind its
//! columns to canonical roles, narrow it with per-role filters and roll the
//! result up into KPIs and chart-ready series.
//!
//! Data flows one way: [`ingest`] → [`schema`] → [`filter`] → [`aggregate`],
//! sequenced by [`pipeline`].

pub mod aggregate;
pub mod error;
pub mod filter;
pub mod format;
pub mod ingest;
pub mod pipeline;
pub mod schema;

pub use aggregate::{aggregate, AggregateResult, Series, SeriesPoint};
pub use error::{PipelineError, PipelineResult};
pub use filter::{apply_filters, FilterSpec};
pub use ingest::{load_cached, load_table, FileKind, RawTable, TableCache, Value};
pub use pipeline::{run, Outcome, Report, Session, Stage};
pub use schema::{resolve, CanonicalRole, ResolvedTable};
