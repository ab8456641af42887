//! Dataset file parsing

use super::excel::parse_workbook;
use crate::error::{QuickmlError, Result};
use polars::prelude::*;
use std::io::Cursor;
use std::path::Path;

/// Supported upload formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetFormat {
    Csv,
    Json,
    Parquet,
    Excel,
}

impl DatasetFormat {
    /// Pick a format from a file name's extension (case-insensitive).
    pub fn from_filename(file_name: &str) -> Result<Self> {
        let ext = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "csv" => Ok(DatasetFormat::Csv),
            "json" => Ok(DatasetFormat::Json),
            "parquet" => Ok(DatasetFormat::Parquet),
            "xlsx" | "xls" => Ok(DatasetFormat::Excel),
            _ => Err(QuickmlError::UnsupportedFormat(format!(
                "'{}'; use CSV, JSON, Parquet, or Excel",
                file_name
            ))),
        }
    }
}

/// Parse raw file bytes into a data frame.
pub fn parse_bytes(format: DatasetFormat, data: &[u8]) -> Result<DataFrame> {
    let parsed = match format {
        DatasetFormat::Csv => CsvReadOptions::default()
            .with_infer_schema_length(Some(1000))
            .with_has_header(true)
            .into_reader_with_file_handle(Cursor::new(data))
            .finish(),
        DatasetFormat::Json => JsonReader::new(Cursor::new(data)).finish(),
        DatasetFormat::Parquet => ParquetReader::new(Cursor::new(data)).finish(),
        DatasetFormat::Excel => return parse_workbook(data),
    };

    parsed.map_err(|e| QuickmlError::ParseError(e.to_string()))
}

/// Read and parse a local dataset file.
pub fn load_path(path: &Path) -> Result<DataFrame> {
    let file_name = path.to_string_lossy();
    let format = DatasetFormat::from_filename(&file_name)?;
    let data = std::fs::read(path)?;
    parse_bytes(format, &data)
}
