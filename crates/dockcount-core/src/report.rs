//! Arrow projection of a working set (or a stored conference) for export.

use std::io::Write;
use std::sync::Arc;

use arrow::array::{ArrayRef, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;

use crate::model::CountLine;

/// Schema of the flat reconciliation report.
///
/// `code` is the normalized join key; `raw_code` is the code as printed in
/// the manifest (or as first counted, for surplus lines).
pub fn report_schema() -> Schema {
    Schema::new(vec![
        Field::new("code", DataType::Utf8, false),
        Field::new("raw_code", DataType::Utf8, false),
        Field::new("description", DataType::Utf8, false),
        Field::new("expected_qty", DataType::Int64, false),
        Field::new("counted_qty", DataType::Int64, false),
        Field::new("difference", DataType::Int64, false),
        Field::new("status", DataType::Utf8, false),
    ])
}

/// One report row per line, in the given order.
pub fn to_table(lines: &[CountLine]) -> Result<RecordBatch, ArrowError> {
    project(lines.iter())
}

/// Only SHORTAGE, SURPLUS and UNEXPECTED_SURPLUS rows.
pub fn discrepancy_table(lines: &[CountLine]) -> Result<RecordBatch, ArrowError> {
    project(lines.iter().filter(|l| l.status().is_discrepancy()))
}

fn project<'a>(lines: impl Iterator<Item = &'a CountLine>) -> Result<RecordBatch, ArrowError> {
    let lines: Vec<&CountLine> = lines.collect();
    let schema: SchemaRef = Arc::new(report_schema());
    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from_iter_values(
            lines.iter().map(|l| l.normalized_code.as_str()),
        )),
        Arc::new(StringArray::from_iter_values(
            lines.iter().map(|l| l.raw_code.as_str()),
        )),
        Arc::new(StringArray::from_iter_values(
            lines.iter().map(|l| l.description.as_str()),
        )),
        Arc::new(Int64Array::from_iter_values(lines.iter().map(|l| l.expected_qty))),
        Arc::new(Int64Array::from_iter_values(lines.iter().map(|l| l.counted_qty))),
        Arc::new(Int64Array::from_iter_values(lines.iter().map(|l| l.difference()))),
        Arc::new(StringArray::from_iter_values(
            lines.iter().map(|l| l.status().as_str()),
        )),
    ];
    RecordBatch::try_new(schema, columns)
}

/// Write a report batch as CSV with a header row.
pub fn write_csv<W: Write>(batch: &RecordBatch, writer: W) -> Result<(), ArrowError> {
    let mut csv = arrow::csv::WriterBuilder::new()
        .with_header(true)
        .build(writer);
    csv.write(batch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Array;

    fn line(code: &str, expected: i64, counted: i64) -> CountLine {
        CountLine {
            normalized_code: code.to_string(),
            raw_code: format!("00{code}"),
            description: format!("item {code}"),
            expected_qty: expected,
            counted_qty: counted,
        }
    }

    fn lines() -> Vec<CountLine> {
        vec![line("1", 5, 5), line("2", 5, 3), line("3", 1, 4), line("4", 0, 2)]
    }

    fn strings(batch: &RecordBatch, name: &str) -> Vec<String> {
        let col = batch.column_by_name(name).unwrap();
        let arr = col.as_any().downcast_ref::<StringArray>().unwrap();
        (0..arr.len()).map(|i| arr.value(i).to_string()).collect()
    }

    #[test]
    fn schema_has_seven_columns() {
        let schema = report_schema();
        assert_eq!(schema.fields().len(), 7);
        assert!(schema.field_with_name("difference").is_ok());
    }

    #[test]
    fn table_keeps_order_and_derived_columns() {
        let batch = to_table(&lines()).unwrap();
        assert_eq!(batch.num_rows(), 4);
        assert_eq!(strings(&batch, "code"), vec!["1", "2", "3", "4"]);
        assert_eq!(strings(&batch, "raw_code"), vec!["001", "002", "003", "004"]);
        assert_eq!(
            strings(&batch, "status"),
            vec!["MATCHED", "SHORTAGE", "SURPLUS", "UNEXPECTED_SURPLUS"]
        );
        let diff = batch
            .column_by_name("difference")
            .unwrap()
            .as_any()
            .downcast_ref::<Int64Array>()
            .unwrap();
        assert_eq!(diff.values().to_vec(), vec![0, -2, 3, 2]);
    }

    #[test]
    fn discrepancies_drop_matched_rows() {
        let batch = discrepancy_table(&lines()).unwrap();
        assert_eq!(strings(&batch, "code"), vec!["2", "3", "4"]);
    }

    #[test]
    fn empty_input_gives_empty_batch() {
        let batch = to_table(&[]).unwrap();
        assert_eq!(batch.num_rows(), 0);
        assert_eq!(batch.num_columns(), 7);
    }

    #[test]
    fn csv_export_has_header_and_rows() {
        let batch = to_table(&lines()[..2]).unwrap();
        let mut out = Vec::new();
        write_csv(&batch, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let rows: Vec<&str> = text.lines().collect();
        assert_eq!(
            rows[0],
            "code,raw_code,description,expected_qty,counted_qty,difference,status"
        );
        assert_eq!(rows[1], "1,001,item 1,5,5,0,MATCHED");
        assert_eq!(rows[2], "2,002,item 2,5,3,-2,SHORTAGE");
    }
}
