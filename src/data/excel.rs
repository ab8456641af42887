//! Excel workbook parsing (`.xlsx`, `.xls`)
//!
//! The first worksheet is read. Its first row holds the column names.

use crate::error::{QuickmlError, Result};
use calamine::{open_workbook_auto_from_rs, Data, Range, Reader};
use polars::prelude::*;
use std::io::Cursor;

/// Parse workbook bytes into a data frame.
pub(crate) fn parse_workbook(data: &[u8]) -> Result<DataFrame> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(data))
        .map_err(|e| QuickmlError::ParseError(e.to_string()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| QuickmlError::ParseError("workbook has no worksheets".to_string()))?
        .map_err(|e| QuickmlError::ParseError(e.to_string()))?;
    range_to_frame(&range)
}

/// Header row to names, remaining rows to columns.
///
/// Blank header cells become `column_{i}`.
pub(crate) fn range_to_frame(range: &Range<Data>) -> Result<DataFrame> {
    let mut rows = range.rows();
    let header = rows
        .next()
        .ok_or_else(|| QuickmlError::ParseError("worksheet is empty".to_string()))?;
    let names: Vec<String> = header
        .iter()
        .enumerate()
        .map(|(i, cell)| match cell {
            Data::Empty => format!("column_{}", i),
            other => other.to_string().trim().to_string(),
        })
        .collect();
    let body: Vec<&[Data]> = rows.collect();

    let columns: Vec<Column> = names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let cells: Vec<&Data> = body.iter().map(|row| &row[i]).collect();
            build_column(name, &cells)
        })
        .collect();

    DataFrame::new(columns).map_err(|e| QuickmlError::ParseError(e.to_string()))
}

// Workbooks store every number as a float; whole-number columns come back as integers.
fn build_column(name: &str, cells: &[&Data]) -> Column {
    let present = || cells.iter().filter(|c| !is_missing(c));

    if present().all(|c| matches!(c, Data::Int(_) | Data::Float(_))) {
        let floats: Vec<Option<f64>> = cells.iter().map(|c| numeric(c)).collect();
        let integral = floats.iter().flatten().all(|v| v.fract() == 0.0 && v.abs() < 9.0e15);
        if integral {
            let ints: Vec<Option<i64>> = floats.iter().map(|v| v.map(|v| v as i64)).collect();
            return Series::new(name.into(), ints).into();
        }
        return Series::new(name.into(), floats).into();
    }

    let strings: Vec<Option<String>> = cells
        .iter()
        .map(|c| if is_missing(c) { None } else { Some(c.to_string()) })
        .collect();
    Series::new(name.into(), strings).into()
}

fn is_missing(cell: &Data) -> bool {
    matches!(cell, Data::Empty | Data::Error(_))
}

fn numeric(cell: &Data) -> Option<f64> {
    match cell {
        Data::Int(v) => Some(*v as f64),
        Data::Float(v) => Some(*v),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(df: &DataFrame) -> Vec<String> {
        df.get_column_names().iter().map(|s| s.to_string()).collect()
    }

    fn sheet(rows: &[&[Data]]) -> Range<Data> {
        let height = rows.len() as u32;
        let width = rows[0].len() as u32;
        let mut range = Range::new((0, 0), (height - 1, width - 1));
        for (r, row) in rows.iter().enumerate() {
            for (c, cell) in row.iter().enumerate() {
                range.set_value((r as u32, c as u32), cell.clone());
            }
        }
        range
    }

    #[test]
    fn test_column_types_follow_cells() {
        let range = sheet(&[
            &[Data::String("amount".into()), Data::String("city".into()), Data::String("label".into())],
            &[Data::Float(1.5), Data::String("Oslo".into()), Data::Float(1.0)],
            &[Data::Float(2.25), Data::Empty, Data::Float(0.0)],
            &[Data::Empty, Data::String("Bergen".into()), Data::Int(1)],
        ]);

        let df = range_to_frame(&range).unwrap();
        assert_eq!(names(&df), vec!["amount", "city", "label"]);
        assert_eq!(df.height(), 3);
        assert_eq!(df.column("amount").unwrap().dtype(), &DataType::Float64);
        assert_eq!(df.column("amount").unwrap().null_count(), 1);
        assert_eq!(df.column("city").unwrap().dtype(), &DataType::String);
        assert_eq!(df.column("city").unwrap().null_count(), 1);
        assert_eq!(df.column("label").unwrap().dtype(), &DataType::Int64);
    }

    #[test]
    fn test_blank_header_gets_positional_name() {
        let range = sheet(&[
            &[Data::String("x".into()), Data::Empty],
            &[Data::Float(1.0), Data::Float(2.5)],
        ]);
        let df = range_to_frame(&range).unwrap();
        assert_eq!(names(&df), vec!["x", "column_1"]);
    }

    #[test]
    fn test_empty_worksheet_is_parse_error() {
        let range: Range<Data> = Range::empty();
        let err = range_to_frame(&range).unwrap_err();
        assert!(matches!(err, QuickmlError::ParseError(_)));
    }

    #[test]
    fn test_garbage_bytes_are_parse_error() {
        let err = parse_workbook(b"not a workbook").unwrap_err();
        assert!(matches!(err, QuickmlError::ParseError(_)));
    }
}
