use csv::ReaderBuilder;
use std::io::Cursor;
use tracing::{debug, trace};

use crate::error::{PipelineError, PipelineResult};
use crate::ingest::raw_table::{RawTable, Value};
use crate::ingest::utils::strip_bom;

/// Parse a fully-buffered UTF-8 CSV file. The first record is the header.
pub fn parse_csv(source_name: &str, data: &[u8]) -> PipelineResult<RawTable> {
    let data = strip_bom(data);
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true) // keep this so records with different field-counts work
        .trim(csv::Trim::Fields)
        .from_reader(Cursor::new(data));

    let headers: Vec<String> = rdr
        .headers()
        .map_err(|e| PipelineError::invalid(source_name, e))?
        .iter()
        .map(|h| h.to_string())
        .collect();
    if headers.iter().all(|h| h.trim().is_empty()) {
        return Err(PipelineError::invalid(source_name, "no header row"));
    }
    trace!(columns = headers.len(), "parsed csv header");

    let mut rows = Vec::new();
    for (idx, result) in rdr.records().enumerate() {
        let record = result.map_err(|e| {
            PipelineError::invalid(source_name, format!("record {}: {}", idx + 1, e))
        })?;
        if record.iter().all(|f| f.trim().is_empty()) {
            continue;
        }
        rows.push(record.iter().map(Value::from_raw).collect());
    }

    debug!(rows = rows.len(), "parsed csv body");
    Ok(RawTable::new(headers, rows))
}
