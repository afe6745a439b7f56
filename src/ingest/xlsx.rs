use calamine::{Data, Reader, Xlsx};
use std::io::Cursor;
use tracing::{debug, trace};

use crate::error::{PipelineError, PipelineResult};
use crate::ingest::raw_table::{RawTable, Value};

/// Parse the first worksheet of a fully-buffered `.xlsx` workbook.
/// The first non-empty row is the header.
pub fn parse_xlsx(source_name: &str, data: &[u8]) -> PipelineResult<RawTable> {
    let mut workbook: Xlsx<_> =
        Xlsx::new(Cursor::new(data)).map_err(|e| PipelineError::invalid(source_name, e))?;

    let sheet_names = workbook.sheet_names();
    trace!(sheets = ?sheet_names, "opened workbook");

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| PipelineError::invalid(source_name, "workbook has no worksheets"))?
        .map_err(|e| PipelineError::invalid(source_name, e))?;

    let mut rows = range.rows();
    let headers: Vec<String> = rows
        .next()
        .ok_or_else(|| PipelineError::invalid(source_name, "first worksheet is empty"))?
        .iter()
        .map(|cell| cell_to_value(cell).label())
        .collect();

    let body: Vec<Vec<Value>> = rows
        .map(|row| row.iter().map(cell_to_value).collect::<Vec<_>>())
        .filter(|row| !row.iter().all(Value::is_empty))
        .collect();

    debug!(rows = body.len(), columns = headers.len(), "parsed xlsx sheet");
    Ok(RawTable::new(headers, body))
}

fn cell_to_value(cell: &Data) -> Value {
    match cell {
        Data::Int(i) => Value::Number(*i as f64),
        Data::Float(f) if f.is_finite() => Value::Number(*f),
        Data::Float(_) => Value::Empty,
        Data::String(s) => Value::from_raw(s),
        Data::Bool(b) => Value::Text(b.to_string()),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(ndt) => Value::Text(ndt.format("%Y-%m-%d %H:%M:%S").to_string()),
            None => Value::Number(dt.as_f64()),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => Value::Text(s.clone()),
        Data::Error(_) | Data::Empty => Value::Empty,
    }
}
