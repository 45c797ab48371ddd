use std::fmt::Display;
use std::fs;
use std::path::Path;

use log::{debug, info};
use snafu::prelude::*;

use crate::columns::{ColumnClassifier, ColumnRole};
use crate::config::{Row, Table};
use crate::dates::normalize_date;
use crate::io_common::header_union;
use crate::{io_csv, io_excel, io_json};

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ParseError {
    #[snafu(display("unsupported file type: {extension:?}"))]
    UnsupportedFormat { extension: String },
    #[snafu(display("malformed CSV header: {source}"))]
    CsvHeader { source: csv::Error },
    #[snafu(display("malformed CSV record at line {line}: {source}"))]
    CsvRecord { source: csv::Error, line: u64 },
    #[snafu(display("CSV record at line {line} has {found} fields, the header has {expected}"))]
    RaggedRecord {
        line: u64,
        expected: usize,
        found: usize,
    },
    #[snafu(display("invalid JSON: {source}"))]
    JsonSyntax { source: serde_json::Error },
    #[snafu(display("the JSON root must be an array of records"))]
    JsonNotArray {},
    #[snafu(display("JSON record {index} is not an object"))]
    JsonRecordNotObject { index: usize },
    #[snafu(display("unreadable spreadsheet: {source}"))]
    Spreadsheet { source: calamine::Error },
    #[snafu(display("the spreadsheet contains no sheets"))]
    NoSheets {},
    #[snafu(display("the file is empty"))]
    EmptyBuffer {},
    #[snafu(display("cannot read {path}: {source}"))]
    ReadFile {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("file read interrupted: {source}"))]
    Interrupted { source: tokio::task::JoinError },
}

pub type ParseResult<T> = Result<T, ParseError>;

/// The broad families of parse failures.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum ParseErrorKind {
    UnsupportedFormat,
    MalformedSource,
    EmptySource,
    IoFailure,
}

impl ParseError {
    pub fn kind(&self) -> ParseErrorKind {
        match self {
            ParseError::UnsupportedFormat { .. } => ParseErrorKind::UnsupportedFormat,
            ParseError::CsvHeader { .. }
            | ParseError::CsvRecord { .. }
            | ParseError::RaggedRecord { .. }
            | ParseError::JsonSyntax { .. }
            | ParseError::JsonNotArray {}
            | ParseError::JsonRecordNotObject { .. }
            | ParseError::Spreadsheet { .. } => ParseErrorKind::MalformedSource,
            ParseError::NoSheets {} | ParseError::EmptyBuffer {} => ParseErrorKind::EmptySource,
            ParseError::ReadFile { .. } | ParseError::Interrupted { .. } => {
                ParseErrorKind::IoFailure
            }
        }
    }
}

/// The formats the parser understands.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum SourceFormat {
    Csv,
    Json,
    Xlsx,
    Xls,
}

impl SourceFormat {
    /// Case-insensitive, with or without the leading dot.
    pub fn from_extension(extension: &str) -> ParseResult<SourceFormat> {
        let ext = extension.trim().trim_start_matches('.').to_lowercase();
        match ext.as_str() {
            "csv" => Ok(SourceFormat::Csv),
            "json" => Ok(SourceFormat::Json),
            "xlsx" => Ok(SourceFormat::Xlsx),
            "xls" => Ok(SourceFormat::Xls),
            _ => UnsupportedFormatSnafu { extension }.fail(),
        }
    }

    pub fn from_path(path: &Path) -> ParseResult<SourceFormat> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        SourceFormat::from_extension(ext)
    }
}

impl Display for SourceFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SourceFormat::Csv => "csv",
            SourceFormat::Json => "json",
            SourceFormat::Xlsx => "xlsx",
            SourceFormat::Xls => "xls",
        };
        write!(f, "{}", name)
    }
}

/// Turns raw file contents into a [`Table`].
///
/// The classifier decides which columns hold dates.
#[derive(Debug, Clone, Default)]
pub struct TabularParser {
    classifier: ColumnClassifier,
}

impl TabularParser {
    pub fn new(classifier: ColumnClassifier) -> TabularParser {
        TabularParser { classifier }
    }

    pub fn classifier(&self) -> &ColumnClassifier {
        &self.classifier
    }

    pub fn parse_bytes(&self, bytes: &[u8], extension: &str) -> ParseResult<Table> {
        let format = SourceFormat::from_extension(extension)?;
        self.parse_format(bytes, format)
    }

    pub fn parse_format(&self, bytes: &[u8], format: SourceFormat) -> ParseResult<Table> {
        info!("Parsing {} bytes as {}", bytes.len(), format);
        let rows = match format {
            SourceFormat::Csv => io_csv::read_csv(bytes),
            SourceFormat::Json => io_json::read_json(bytes),
            SourceFormat::Xlsx | SourceFormat::Xls => io_excel::read_workbook(bytes, format),
        }?;
        Ok(self.assemble(rows))
    }

    pub fn parse_path(&self, path: &Path) -> ParseResult<Table> {
        let format = SourceFormat::from_path(path)?;
        info!("Attempting to read file {:?}", path);
        let bytes = fs::read(path).context(ReadFileSnafu {
            path: path.display().to_string(),
        })?;
        self.parse_format(&bytes, format)
    }

    // Computes the header union and normalizes the date columns.
    fn assemble(&self, rows: Vec<Row>) -> Table {
        if rows.is_empty() {
            return Table::default();
        }
        let headers = header_union(&rows);
        let date_columns: Vec<&String> = headers
            .iter()
            .filter(|h| self.classifier.has_role(h, ColumnRole::Date))
            .collect();
        debug!(
            "assemble: {} rows, headers: {:?}, date columns: {:?}",
            rows.len(),
            headers,
            date_columns
        );
        let rows: Vec<Row> = rows
            .into_iter()
            .map(|mut row| {
                for col in date_columns.iter() {
                    if let Some(v) = row.get_mut(col.as_str()) {
                        *v = normalize_date(v);
                    }
                }
                row
            })
            .collect();
        Table { headers, rows }
    }
}

/// Parses a buffer with the default column patterns.
pub fn parse_bytes(bytes: &[u8], extension: &str) -> ParseResult<Table> {
    TabularParser::default().parse_bytes(bytes, extension)
}

/// Reads and parses a file with the default column patterns.
pub fn parse_path(path: &Path) -> ParseResult<Table> {
    TabularParser::default().parse_path(path)
}
