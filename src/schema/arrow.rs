// src/schema/arrow.rs

use arrow::{
    array::{ArrayRef, Float64Builder, StringBuilder},
    datatypes::{DataType, Field as ArrowField, Schema as ArrowSchema},
    error::ArrowError,
    record_batch::RecordBatch,
};
use std::sync::Arc;

use crate::ingest::{RawTable, Value};

/// Infer an Arrow DataType for a column slice: `Float64` when every
/// non-empty cell reads as a number (`"2871.00"` included), otherwise `Utf8`.
pub fn infer_arrow_type<'a>(cells: impl IntoIterator<Item = &'a Value>) -> DataType {
    let mut saw_value = false;
    for cell in cells {
        if cell.is_empty() {
            continue;
        }
        if cell.as_number().is_none() {
            return DataType::Utf8;
        }
        saw_value = true;
    }
    if saw_value {
        DataType::Float64
    } else {
        DataType::Utf8
    }
}

/// Build an ArrowSchema for the first `n` rows of `table`, under the
/// original header names.
pub fn build_preview_schema(table: &RawTable, n: usize) -> Arc<ArrowSchema> {
    let rows = n.min(table.num_rows());
    let fields: Vec<ArrowField> = table
        .headers
        .iter()
        .enumerate()
        .map(|(col, name)| {
            let dt = infer_arrow_type((0..rows).map(|row| table.cell(row, col)));
            ArrowField::new(name, dt, /* nullable = */ true)
        })
        .collect();

    Arc::new(ArrowSchema::new(fields))
}

/// First `n` rows of `table` as a RecordBatch; empty cells become nulls.
pub fn preview_batch(table: &RawTable, n: usize) -> Result<RecordBatch, ArrowError> {
    let schema = build_preview_schema(table, n);
    let rows = n.min(table.num_rows());

    let mut cols: Vec<ArrayRef> = Vec::with_capacity(schema.fields().len());
    for (col, field) in schema.fields().iter().enumerate() {
        match field.data_type() {
            DataType::Float64 => {
                let mut b = Float64Builder::with_capacity(rows);
                for row in 0..rows {
                    b.append_option(table.cell(row, col).as_number());
                }
                cols.push(Arc::new(b.finish()) as ArrayRef);
            }
            _ => {
                let mut b = StringBuilder::new();
                for row in 0..rows {
                    match table.cell(row, col) {
                        Value::Empty => b.append_null(),
                        v => b.append_value(v.label()),
                    }
                }
                cols.push(Arc::new(b.finish()) as ArrayRef);
            }
        }
    }

    RecordBatch::try_new(schema, cols)
}
