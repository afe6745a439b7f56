// src/ingest/mod.rs
pub mod cache;
pub mod csv_reader;
pub mod raw_table;
pub mod utils;
pub mod xlsx;

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::{PipelineError, PipelineResult};

pub use cache::{TableCache, DEFAULT_CACHE_TTL};
pub use raw_table::{RawTable, Value};

/// Which parser handles an upload, chosen by file-name extension.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Csv,
    Xlsx,
}

impl FileKind {
    pub fn from_name(file_name: &str) -> PipelineResult<Self> {
        match utils::extension_of(file_name).as_deref() {
            Some("csv") => Ok(FileKind::Csv),
            Some("xlsx") => Ok(FileKind::Xlsx),
            _ => Err(PipelineError::UnsupportedFileType {
                source_name: file_name.to_string(),
            }),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            FileKind::Csv => "CSV",
            FileKind::Xlsx => "XLSX",
        }
    }
}

/// Parse an uploaded file held fully in memory. Bypasses the cache.
#[tracing::instrument(level = "info", skip(data), fields(bytes = data.len()))]
pub fn load_table(source_name: &str, data: &[u8]) -> PipelineResult<RawTable> {
    let kind = FileKind::from_name(source_name).map_err(|e| {
        warn!(error = %e, "rejected upload");
        e
    })?;
    parse_bytes(kind, source_name, data)
}

/// Parse through the process-wide [`TableCache`].
pub fn load_cached(source_name: &str, data: &[u8]) -> PipelineResult<Arc<RawTable>> {
    TableCache::global().load(source_name, data)
}

pub(crate) fn parse_bytes(
    kind: FileKind,
    source_name: &str,
    data: &[u8],
) -> PipelineResult<RawTable> {
    if data.iter().all(u8::is_ascii_whitespace) {
        warn!(source = source_name, "empty upload");
        return Err(PipelineError::invalid(source_name, "file has no content"));
    }

    let table = match kind {
        FileKind::Csv => csv_reader::parse_csv(source_name, data),
        FileKind::Xlsx => xlsx::parse_xlsx(source_name, data),
    }
    .map_err(|e| {
        warn!(source = source_name, error = %e, "failed to parse upload");
        e
    })?;

    if table.is_empty() {
        warn!(source = source_name, "upload has a header but no rows");
        return Err(PipelineError::invalid(source_name, "no data rows"));
    }

    debug!(
        source = source_name,
        kind = kind.as_str(),
        rows = table.num_rows(),
        columns = table.headers.len(),
        "loaded table"
    );
    Ok(table)
}
