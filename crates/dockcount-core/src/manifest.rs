//! Manifest parsing: store spreadsheet export → expected items + trip metadata.
//!
//! The export has a variable preamble (trip labels on the first row, blank
//! spacer rows), a header row somewhere below it, and occasionally blank
//! trailer rows or a second copy of the header embedded mid-sheet. Columns
//! are located by header name, never by position, and known garbage row
//! shapes are filtered by the denylist in [`ManifestRules`].

use std::io::{Cursor, Read};

use calamine::{Data, Reader, open_workbook_auto_from_rs};
use indexmap::IndexMap;
use tracing::{debug, info, warn};

use crate::code::normalize;
use crate::error::ParseError;
use crate::model::{ExpectedItem, TripMetadata};
use crate::rules::ManifestRules;

/// A spreadsheet cell, reduced to what the parser cares about.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
}

impl Cell {
    /// Cell rendered as text. Integral numbers print without a fraction so a
    /// numeric code column yields `"123"`, not `"123.0"`.
    pub fn text(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Text(s) => s.clone(),
            Cell::Number(n) => format_number(*n),
            Cell::Bool(b) => b.to_string(),
        }
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Text(s.to_string())
    }
}

impl From<f64> for Cell {
    fn from(n: f64) -> Self {
        Cell::Number(n)
    }
}

impl From<&Data> for Cell {
    fn from(data: &Data) -> Self {
        match data {
            Data::Int(i) => Cell::Number(*i as f64),
            Data::Float(f) => Cell::Number(*f),
            Data::String(s) => Cell::Text(s.clone()),
            Data::Bool(b) => Cell::Bool(*b),
            Data::DateTime(dt) => Cell::Number(dt.as_f64()),
            Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
            _ => Cell::Empty,
        }
    }
}

fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// Raw cell grid, row-major, no header assumption.
pub type Grid = Vec<Vec<Cell>>;

/// Result of a successful manifest parse.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedManifest {
    pub metadata: TripMetadata,
    /// One item per distinct normalized code, in sheet order.
    pub items: Vec<ExpectedItem>,
    /// Rows below the header rejected by the garbage-row filters.
    pub dropped_rows: usize,
}

/// Read the first worksheet of an `.xlsx`/`.xls`/`.ods` workbook and parse it.
pub fn read_manifest<R: Read>(
    mut reader: R,
    rules: &ManifestRules,
) -> Result<ParsedManifest, ParseError> {
    let grid = read_grid(&mut reader)?;
    parse_grid(&grid, rules)
}

/// Load the first worksheet as a raw [`Grid`].
pub fn read_grid<R: Read>(reader: &mut R) -> Result<Grid, ParseError> {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or(ParseError::EmptyWorkbook)??;
    Ok(range
        .rows()
        .map(|row| row.iter().map(Cell::from).collect())
        .collect())
}

/// Parse an already-loaded grid.
pub fn parse_grid(grid: &Grid, rules: &ManifestRules) -> Result<ParsedManifest, ParseError> {
    let metadata = grid
        .first()
        .map(|row| extract_metadata(row, rules))
        .unwrap_or_default();

    let header_idx = find_header_row(grid, &rules.header_marker).ok_or_else(|| {
        ParseError::HeaderNotFound {
            marker: rules.header_marker.clone(),
        }
    })?;
    let headers: Vec<String> = grid[header_idx]
        .iter()
        .map(|c| c.text().trim().to_string())
        .collect();

    let code_col = find_column(&headers, &rules.code_column, None);
    let desc_col = find_column(&headers, &rules.description_column, None);
    let qty_col = find_column(
        &headers,
        &rules.quantity_column,
        Some(&rules.quantity_exclude),
    );
    let (Some(code_col), Some(desc_col), Some(qty_col)) = (code_col, desc_col, qty_col) else {
        return Err(ParseError::MissingColumns {
            code: code_col.map(|i| headers[i].clone()),
            description: desc_col.map(|i| headers[i].clone()),
            quantity: qty_col.map(|i| headers[i].clone()),
        });
    };
    debug!(
        header_row = header_idx,
        code = %headers[code_col],
        description = %headers[desc_col],
        quantity = %headers[qty_col],
        "resolved manifest columns"
    );

    let mut by_code: IndexMap<String, ExpectedItem> = IndexMap::new();
    let mut dropped_rows = 0usize;

    for (offset, row) in grid[header_idx + 1..].iter().enumerate() {
        let cell = |i: usize| row.get(i).unwrap_or(&Cell::Empty);
        let raw_code = cell(code_col).text().trim().to_string();
        let description = cell(desc_col).text().trim().to_string();

        let Some(expected_qty) = coerce_quantity(cell(qty_col)) else {
            dropped_rows += 1;
            debug!(row = header_idx + 1 + offset, "dropped row: unresolvable quantity");
            continue;
        };
        if is_garbage(&raw_code, &description, rules) {
            dropped_rows += 1;
            continue;
        }
        let normalized_code = normalize(&raw_code);
        if normalized_code.is_empty() {
            dropped_rows += 1;
            debug!(row = header_idx + 1 + offset, raw_code = %raw_code, "dropped row: all-zero code");
            continue;
        }

        match by_code.get_mut(&normalized_code) {
            Some(existing) => match existing.expected_qty.checked_add(expected_qty) {
                Some(total) => {
                    warn!(
                        code = %normalized_code,
                        "code listed twice in manifest, summing expected quantities"
                    );
                    existing.expected_qty = total;
                }
                None => {
                    dropped_rows += 1;
                    warn!(
                        row = header_idx + 1 + offset,
                        code = %normalized_code,
                        "dropped row: merged expected quantity overflows"
                    );
                }
            },
            None => {
                by_code.insert(
                    normalized_code.clone(),
                    ExpectedItem {
                        raw_code,
                        normalized_code,
                        description,
                        expected_qty,
                    },
                );
            }
        }
    }

    let items: Vec<ExpectedItem> = by_code.into_values().collect();
    info!(
        items = items.len(),
        dropped_rows,
        trip = ?metadata.trip_id,
        store = ?metadata.store_id,
        "parsed manifest"
    );
    Ok(ParsedManifest {
        metadata,
        items,
        dropped_rows,
    })
}

/// Pull `Label: value` pairs out of the first row. A cell may carry more
/// than one label; later cells overwrite earlier ones.
fn extract_metadata(row: &[Cell], rules: &ManifestRules) -> TripMetadata {
    let mut metadata = TripMetadata::default();
    for cell in row {
        let text = cell.text();
        let value = || {
            text.split(':')
                .nth(1)
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(String::from)
        };
        if text.contains(&rules.trip_label)
            && let Some(v) = value()
        {
            metadata.trip_id = Some(v);
        }
        if text.contains(&rules.store_label)
            && let Some(v) = value()
        {
            metadata.store_id = Some(v);
        }
        if text.contains(&rules.date_label)
            && let Some(v) = value()
        {
            metadata.trip_date = Some(v);
        }
    }
    metadata
}

fn find_header_row(grid: &Grid, marker: &str) -> Option<usize> {
    let marker = marker.to_lowercase();
    grid.iter().position(|row| {
        row.iter()
            .any(|cell| cell.text().to_lowercase().contains(&marker))
    })
}

fn find_column(headers: &[String], token: &str, exclude: Option<&str>) -> Option<usize> {
    let token = token.to_uppercase();
    let exclude = exclude.map(str::to_uppercase).filter(|e| !e.is_empty());
    headers.iter().position(|name| {
        let name = name.to_uppercase();
        name.contains(&token) && exclude.as_ref().is_none_or(|e| !name.contains(e))
    })
}

/// Numeric cells truncate toward zero; non-numeric text and blanks count as
/// zero. Negative, non-finite, or out-of-range numbers are unresolvable.
fn coerce_quantity(cell: &Cell) -> Option<i64> {
    let number = match cell {
        Cell::Number(n) => *n,
        Cell::Text(s) => match s.trim().parse::<f64>() {
            Ok(n) => n,
            Err(_) => return Some(0),
        },
        Cell::Empty | Cell::Bool(_) => return Some(0),
    };
    // i64::MAX rounds up to 2^63 as f64, so `>=` rejects every value
    // the cast would saturate.
    if !number.is_finite() || number < 0.0 || number >= i64::MAX as f64 {
        return None;
    }
    Some(number.trunc() as i64)
}

fn is_garbage(code: &str, description: &str, rules: &ManifestRules) -> bool {
    code.is_empty()
        || description.is_empty()
        || rules.is_null_literal(code)
        || rules.is_null_literal(description)
        || rules.contains_junk_token(code)
        || rules.contains_junk_token(description)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Vec<Cell> {
        cells
            .iter()
            .map(|c| if c.is_empty() { Cell::Empty } else { Cell::from(*c) })
            .collect()
    }

    fn store_layout() -> Grid {
        vec![
            row(&["Viagem: 4471", "Loja: L012", "Data: 25-11-2025"]),
            row(&[]),
            row(&[
                "Roll", "Guia", "CodSap", "Depto", "Descrição", "Qtde", "Qtde Real",
            ]),
            vec![
                Cell::from("1"),
                Cell::from("G1"),
                Cell::from("00123"),
                Cell::from("10"),
                Cell::from("Widget"),
                Cell::Number(10.0),
                Cell::Number(99.0),
            ],
            vec![
                Cell::from("1"),
                Cell::from("G1"),
                Cell::Number(5.0),
                Cell::from("10"),
                Cell::from(" Bolt "),
                Cell::Number(3.0),
                Cell::Empty,
            ],
        ]
    }

    #[test]
    fn parses_store_layout() {
        let parsed = parse_grid(&store_layout(), &ManifestRules::default()).unwrap();
        assert_eq!(parsed.metadata.trip_id.as_deref(), Some("4471"));
        assert_eq!(parsed.metadata.store_id.as_deref(), Some("L012"));
        assert_eq!(parsed.metadata.trip_date.as_deref(), Some("25-11-2025"));
        assert_eq!(parsed.items.len(), 2);

        let widget = &parsed.items[0];
        assert_eq!(widget.raw_code, "00123");
        assert_eq!(widget.normalized_code, "123");
        assert_eq!(widget.description, "Widget");
        assert_eq!(widget.expected_qty, 10, "must read Qtde, not Qtde Real");

        let bolt = &parsed.items[1];
        assert_eq!(bolt.raw_code, "5");
        assert_eq!(bolt.description, "Bolt");
        assert_eq!(bolt.expected_qty, 3);
    }

    #[test]
    fn missing_header_row_fails() {
        let grid = vec![row(&["Viagem: 1"]), row(&["Code", "Description", "Qty"])];
        let err = parse_grid(&grid, &ManifestRules::default()).unwrap_err();
        assert!(matches!(err, ParseError::HeaderNotFound { .. }));
        assert!(err.to_string().contains("header row not found"));
    }

    #[test]
    fn header_marker_is_case_insensitive() {
        let grid = vec![
            row(&[]),
            row(&["CODSAP", "DESCRICAO", "QTDE"]),
            row(&["7", "Nut", "4"]),
        ];
        let parsed = parse_grid(&grid, &ManifestRules::default()).unwrap();
        assert_eq!(parsed.items.len(), 1);
        assert_eq!(parsed.metadata, TripMetadata::default());
    }

    #[test]
    fn missing_quantity_column_is_named() {
        let grid = vec![row(&["CodSap", "Descrição", "Qtde Real"])];
        let err = parse_grid(&grid, &ManifestRules::default()).unwrap_err();
        match err {
            ParseError::MissingColumns {
                code,
                description,
                quantity,
            } => {
                assert_eq!(code.as_deref(), Some("CodSap"));
                assert_eq!(description.as_deref(), Some("Descrição"));
                assert_eq!(quantity, None);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn drops_garbage_rows() {
        let mut grid = store_layout();
        // Blank trailer, stringified nulls, repeated header, all-zero code.
        grid.push(row(&[]));
        grid.push(row(&["", "", "nan", "", "Ghost", "1"]));
        grid.push(row(&["", "", "42", "", "nan", "1"]));
        grid.push(row(&["", "", "CodSap", "", "Descrição", "Qtde"]));
        grid.push(row(&["", "", "000", "", "Zero code", "1"]));
        grid.push(row(&["", "", "77", "", "Negative", "-2"]));
        let parsed = parse_grid(&grid, &ManifestRules::default()).unwrap();
        assert_eq!(parsed.items.len(), 2);
        assert_eq!(parsed.dropped_rows, 6);
    }

    #[test]
    fn non_numeric_quantity_becomes_zero() {
        let grid = vec![
            row(&["CodSap", "Descrição", "Qtde"]),
            row(&["8", "Washer", "a lot"]),
            row(&["9", "Spring", ""]),
            row(&["10", "Clip", "2.9"]),
        ];
        let parsed = parse_grid(&grid, &ManifestRules::default()).unwrap();
        let qty: Vec<i64> = parsed.items.iter().map(|i| i.expected_qty).collect();
        assert_eq!(qty, vec![0, 0, 2]);
    }

    #[test]
    fn out_of_range_quantity_is_unresolvable() {
        let grid = vec![
            row(&["CodSap", "Descrição", "Qtde"]),
            vec![Cell::from("12"), Cell::from("Hinge"), Cell::Number(1e300)],
            vec![Cell::from("12"), Cell::from("Hinge"), Cell::Number(1e300)],
            row(&["13", "Latch", "9.3e18"]),
            row(&["14", "Pin", "4"]),
        ];
        let parsed = parse_grid(&grid, &ManifestRules::default()).unwrap();
        let codes: Vec<&str> = parsed.items.iter().map(|i| i.normalized_code.as_str()).collect();
        assert_eq!(codes, vec!["14"]);
        assert_eq!(parsed.dropped_rows, 3);
    }

    #[test]
    fn duplicate_merge_overflow_drops_the_later_row() {
        let grid = vec![
            row(&["CodSap", "Descrição", "Qtde"]),
            vec![Cell::from("12"), Cell::from("Hinge"), Cell::Number(5e18)],
            vec![Cell::from("0012"), Cell::from("Hinge"), Cell::Number(5e18)],
        ];
        let parsed = parse_grid(&grid, &ManifestRules::default()).unwrap();
        assert_eq!(parsed.items.len(), 1);
        assert_eq!(parsed.items[0].expected_qty, 5_000_000_000_000_000_000);
        assert_eq!(parsed.dropped_rows, 1);
    }

    #[test]
    fn duplicate_codes_merge_into_first_row() {
        let grid = vec![
            row(&["CodSap", "Descrição", "Qtde"]),
            row(&["0012", "Hinge", "2"]),
            row(&["13", "Latch", "1"]),
            row(&["12", "Hinge (again)", "5"]),
        ];
        let parsed = parse_grid(&grid, &ManifestRules::default()).unwrap();
        assert_eq!(parsed.items.len(), 2);
        assert_eq!(parsed.items[0].normalized_code, "12");
        assert_eq!(parsed.items[0].description, "Hinge");
        assert_eq!(parsed.items[0].expected_qty, 7);
    }

    #[test]
    fn short_rows_are_padded_with_empty_cells() {
        let grid = vec![
            row(&["CodSap", "Descrição", "Qtde"]),
            row(&["21", "Cable"]),
        ];
        let parsed = parse_grid(&grid, &ManifestRules::default()).unwrap();
        assert_eq!(parsed.items[0].expected_qty, 0);
    }

    #[test]
    fn metadata_without_value_stays_none() {
        let grid = vec![
            row(&["Viagem", "Loja: ", "Data: 01/02/2026"]),
            row(&["CodSap", "Descrição", "Qtde"]),
        ];
        let parsed = parse_grid(&grid, &ManifestRules::default()).unwrap();
        assert_eq!(parsed.metadata.trip_id, None);
        assert_eq!(parsed.metadata.store_id, None);
        assert_eq!(parsed.metadata.trip_date.as_deref(), Some("01/02/2026"));
        assert!(parsed.items.is_empty());
    }

    #[test]
    fn custom_rules_extend_the_denylist() {
        let rules = ManifestRules {
            null_literals: vec!["nan".into(), "None".into()],
            ..ManifestRules::default()
        };
        let grid = vec![
            row(&["CodSap", "Descrição", "Qtde"]),
            row(&["None", "Phantom", "1"]),
            row(&["31", "Real item", "1"]),
        ];
        let parsed = parse_grid(&grid, &rules).unwrap();
        assert_eq!(parsed.items.len(), 1);
        assert_eq!(parsed.items[0].normalized_code, "31");
    }

    #[test]
    fn numeric_cells_render_without_fraction() {
        assert_eq!(Cell::Number(123.0).text(), "123");
        assert_eq!(Cell::Number(2.5).text(), "2.5");
        assert_eq!(Cell::Empty.text(), "");
    }

    #[test]
    fn non_workbook_bytes_are_a_workbook_error() {
        let err = read_manifest(Cursor::new(b"not a spreadsheet".to_vec()), &ManifestRules::default())
            .unwrap_err();
        assert!(matches!(err, ParseError::Workbook(_)));
    }
}
