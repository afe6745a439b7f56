// src/pipeline/mod.rs
pub mod state;

use arrow::{error::ArrowError, record_batch::RecordBatch};
use serde::Serialize;
use std::{collections::BTreeMap, sync::Arc};
use tracing::{debug, info, instrument, warn};

use crate::aggregate::{aggregate, AggregateResult};
use crate::error::{PipelineError, PipelineResult};
use crate::filter::{apply_filters, observed_values, FilterSpec};
use crate::ingest::{load_cached, RawTable};
use crate::schema::{preview_batch, resolve, CanonicalRole, ResolvedTable};

pub use state::Stage;

/// Everything the presentation layer needs after a successful cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    /// Rows in the uploaded table.
    pub source_rows: usize,
    /// Rows left after filtering.
    pub filtered_rows: usize,
    /// Role → raw column it was bound to.
    pub bindings: BTreeMap<CanonicalRole, String>,
    pub filters: FilterSpec,
    pub aggregates: AggregateResult,
}

impl Report {
    /// The filters matched nothing. Not an error; shown as a "no data" notice.
    pub fn is_empty(&self) -> bool {
        self.filtered_rows == 0
    }
}

/// Where a cycle came to rest.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// No usable file yet. `notice` explains why the last upload was refused.
    AwaitingInput { notice: Option<PipelineError> },
    /// The file has no amount column; the preview is still available.
    ResolutionFailed(PipelineError),
    Aggregated(Report),
}

impl Outcome {
    pub fn stage(&self) -> Stage {
        match self {
            Outcome::AwaitingInput { .. } => Stage::AwaitingInput,
            Outcome::ResolutionFailed(_) => Stage::ResolutionFailed,
            Outcome::Aggregated(_) => Stage::Aggregated,
        }
    }

    pub fn report(&self) -> Option<&Report> {
        match self {
            Outcome::Aggregated(r) => Some(r),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&PipelineError> {
        match self {
            Outcome::AwaitingInput { notice } => notice.as_ref(),
            Outcome::ResolutionFailed(e) => Some(e),
            Outcome::Aggregated(_) => None,
        }
    }
}

/// One multi-select the UI should offer: every observed value, all selected
/// by default.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterOption {
    pub role: CanonicalRole,
    pub title: String,
    pub values: Vec<String>,
}

/// One synchronous pass: resolve → filter → aggregate.
/// `filters = None` selects every observed value.
pub fn run(table: Arc<RawTable>, filters: Option<&FilterSpec>) -> PipelineResult<Report> {
    let resolved = resolve(table)?;
    let filters = filters
        .cloned()
        .unwrap_or_else(|| FilterSpec::all_observed(&resolved));
    Ok(filter_and_aggregate(&resolved, filters))
}

fn filter_and_aggregate(resolved: &ResolvedTable, filters: FilterSpec) -> Report {
    let filtered = apply_filters(resolved, &filters);
    let aggregates = aggregate(&filtered);
    Report {
        source_rows: resolved.num_rows(),
        filtered_rows: filtered.num_rows(),
        bindings: resolved
            .bindings()
            .map(|(role, b)| (role, b.name.clone()))
            .collect(),
        filters,
        aggregates,
    }
}

/// Per-user pipeline state. Sessions share nothing but the parsed-table cache.
#[derive(Debug, Clone)]
pub struct Session {
    source_name: Option<String>,
    table: Option<Arc<RawTable>>,
    resolved: Option<ResolvedTable>,
    filters: FilterSpec,
    stage: Stage,
    outcome: Outcome,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            source_name: None,
            table: None,
            resolved: None,
            filters: FilterSpec::new(),
            stage: Stage::AwaitingInput,
            outcome: Outcome::AwaitingInput { notice: None },
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn outcome(&self) -> &Outcome {
        &self.outcome
    }

    pub fn source_name(&self) -> Option<&str> {
        self.source_name.as_deref()
    }

    pub fn table(&self) -> Option<&Arc<RawTable>> {
        self.table.as_ref()
    }

    pub fn filters(&self) -> &FilterSpec {
        &self.filters
    }

    /// First `n` rows of the uploaded table, before any normalisation.
    pub fn preview(&self, n: usize) -> Option<Result<RecordBatch, ArrowError>> {
        self.table.as_ref().map(|t| preview_batch(t, n))
    }

    /// Multi-selects for every bound filterable role, in presentation order.
    pub fn filter_options(&self) -> Vec<FilterOption> {
        let Some(resolved) = &self.resolved else {
            return Vec::new();
        };
        CanonicalRole::FILTERABLE
            .iter()
            .filter_map(|role| {
                resolved.binding(*role).map(|b| FilterOption {
                    role: *role,
                    title: b.title(),
                    values: observed_values(resolved, *role),
                })
            })
            .collect()
    }

    /// New file: parse (through the cache), then restart at `Resolving`.
    /// Filters reset to every observed value.
    #[instrument(level = "info", skip(self, data), fields(bytes = data.len()))]
    pub fn upload(&mut self, source_name: &str, data: &[u8]) -> &Outcome {
        match load_cached(source_name, data) {
            Ok(table) => self.upload_table(source_name, table),
            Err(e) => {
                warn!(error = %e, "upload refused");
                self.source_name = None;
                self.table = None;
                self.resolved = None;
                self.filters = FilterSpec::new();
                self.transition(Stage::AwaitingInput);
                self.outcome = Outcome::AwaitingInput { notice: Some(e) };
                &self.outcome
            }
        }
    }

    /// New, already-parsed table: restart at `Resolving`.
    pub fn upload_table(&mut self, source_name: &str, table: Arc<RawTable>) -> &Outcome {
        self.source_name = Some(source_name.to_string());
        self.table = Some(Arc::clone(&table));
        self.transition(Stage::Resolving);

        match resolve(table) {
            Ok(resolved) => {
                self.filters = FilterSpec::all_observed(&resolved);
                self.resolved = Some(resolved);
                self.refilter()
            }
            Err(e) => {
                self.resolved = None;
                self.filters = FilterSpec::new();
                self.transition(Stage::ResolutionFailed);
                self.outcome = Outcome::ResolutionFailed(e);
                &self.outcome
            }
        }
    }

    /// Replace the whole filter spec and restart at `Filtering`. Roles the
    /// spec leaves out are unfiltered. Without a resolved table this is a no-op.
    pub fn set_filters(&mut self, filters: FilterSpec) -> &Outcome {
        if self.resolved.is_none() {
            debug!(stage = self.stage.as_str(), "no resolved table; filters ignored");
            return &self.outcome;
        }
        self.filters = filters;
        self.refilter()
    }

    /// Narrow a single role and restart at `Filtering`.
    pub fn select(&mut self, role: CanonicalRole, values: Vec<String>) -> &Outcome {
        let mut filters = self.filters.clone();
        filters.narrow(role, values);
        self.set_filters(filters)
    }

    fn refilter(&mut self) -> &Outcome {
        let Some(resolved) = &self.resolved else {
            return &self.outcome;
        };
        self.stage = self.next_stage(Stage::Filtering);
        let report = filter_and_aggregate(resolved, self.filters.clone());
        if report.is_empty() {
            info!("filters matched no rows");
        }
        self.transition(Stage::Aggregated);
        self.outcome = Outcome::Aggregated(report);
        &self.outcome
    }

    fn next_stage(&self, to: Stage) -> Stage {
        if !self.stage.can_transition_to(to) {
            warn!(from = self.stage.as_str(), to = to.as_str(), "unexpected stage transition");
        }
        debug!(from = self.stage.as_str(), to = to.as_str(), "stage");
        to
    }

    fn transition(&mut self, to: Stage) {
        self.stage = self.next_stage(to);
    }
}
