// Primitives for reading Excel workbooks (xlsx and the older xls).

use std::io::{Cursor, Read, Seek};

use calamine::{Data, DataType, Range, Reader, Xls, Xlsx};
use log::{debug, info};
use snafu::prelude::*;

use crate::config::{CellValue, Row};
use crate::io_common::unique_header_names;
use crate::parser::*;

/// Reads the first sheet of a workbook. The first row holds the headers.
///
/// Empty cells are left out of the rows, and rows without any value are
/// skipped. Date-formatted cells come out as [`CellValue::Date`].
pub fn read_workbook(bytes: &[u8], format: SourceFormat) -> ParseResult<Vec<Row>> {
    ensure!(!bytes.is_empty(), EmptyBufferSnafu {});
    let cursor = Cursor::new(bytes.to_vec());
    let range = match format {
        SourceFormat::Xls => {
            let workbook: Xls<_> = Xls::new(cursor)
                .map_err(calamine::Error::from)
                .context(SpreadsheetSnafu {})?;
            first_sheet(workbook)?
        }
        _ => {
            let workbook: Xlsx<_> = Xlsx::new(cursor)
                .map_err(calamine::Error::from)
                .context(SpreadsheetSnafu {})?;
            first_sheet(workbook)?
        }
    };
    rows_from_range(&range)
}

fn first_sheet<RS, R>(mut workbook: R) -> ParseResult<Range<Data>>
where
    RS: Read + Seek,
    R: Reader<RS>,
    calamine::Error: From<R::Error>,
{
    let names = workbook.sheet_names();
    info!("read_workbook: sheets {:?}, reading the first one", names);
    workbook
        .worksheet_range_at(0)
        .context(NoSheetsSnafu {})?
        .map_err(calamine::Error::from)
        .context(SpreadsheetSnafu {})
}

fn rows_from_range(range: &Range<Data>) -> ParseResult<Vec<Row>> {
    let mut iter = range.rows();
    let header = match iter.next() {
        Some(header) => header,
        None => return Ok(Vec::new()),
    };
    let headers = unique_header_names(header.iter().map(header_text));
    debug!("read_workbook: headers: {:?}", headers);

    let mut res: Vec<Row> = Vec::new();
    for (idx, cells) in iter.enumerate() {
        let row: Row = headers
            .iter()
            .zip(cells.iter())
            .filter_map(|(name, cell)| cell_value(cell).map(|v| (name.clone(), v)))
            .collect();
        if row.is_empty() {
            debug!("read_workbook: skipping empty row {}", idx + 2);
            continue;
        }
        res.push(row);
    }
    Ok(res)
}

fn header_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        _ => cell.to_string(),
    }
}

fn cell_value(cell: &Data) -> Option<CellValue> {
    match cell {
        Data::Empty => None,
        Data::String(s) => Some(CellValue::String(s.clone())),
        Data::Float(f) => Some(CellValue::Number(*f)),
        Data::Int(i) => Some(CellValue::Number(*i as f64)),
        Data::Bool(b) => Some(CellValue::Bool(*b)),
        Data::DateTime(_) | Data::DateTimeIso(_) => Some(
            cell.as_datetime()
                .map(CellValue::Date)
                .unwrap_or_else(|| CellValue::String(cell.to_string())),
        ),
        Data::DurationIso(s) => Some(CellValue::String(s.clone())),
        Data::Error(e) => Some(CellValue::String(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const CANDIDATES_XLSX: &[u8] = include_bytes!("../../tests/data/candidatos.xlsx");
    const NO_SHEETS_XLSX: &[u8] = include_bytes!("../../tests/data/sin_hojas.xlsx");
    const CANDIDATES_XLS: &[u8] = include_bytes!("../../tests/data/candidatos.xls");

    #[test]
    fn first_sheet_rows() {
        let rows = read_workbook(CANDIDATES_XLSX, SourceFormat::Xlsx).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0]["Apellidos"], CellValue::from("Pérez Ruiz"));
        assert_eq!(rows[0]["Antigüedad"], CellValue::Number(12.0));
        let alta = NaiveDate::from_ymd_opt(2023, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(rows[0]["Fecha de alta"], CellValue::Date(alta));
        // Empty cells are not part of the row.
        assert!(rows[1].get("DNI").is_none());
        assert!(rows[1].get("Antigüedad").is_none());
        assert_eq!(rows[2]["Nombre"], CellValue::from("María"));
    }

    #[test]
    fn first_sheet_rows_xls() {
        let rows = read_workbook(CANDIDATES_XLS, SourceFormat::Xls).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(
            rows[0].keys().collect::<Vec<_>>(),
            vec!["Apellidos", "Nombre", "DNI", "Antigüedad"]
        );
        assert_eq!(rows[0]["Apellidos"], CellValue::from("Pérez Ruiz"));
        assert_eq!(rows[0]["DNI"], CellValue::from("12345678Z"));
        assert_eq!(rows[0]["Antigüedad"], CellValue::Number(12.0));
        assert_eq!(rows[1]["Nombre"], CellValue::from("María"));
        assert!(rows[1].get("DNI").is_none());
    }

    #[test]
    fn no_sheets() {
        let err = read_workbook(NO_SHEETS_XLSX, SourceFormat::Xlsx).unwrap_err();
        assert_eq!(err.kind(), ParseErrorKind::EmptySource);
    }

    #[test]
    fn garbage_is_malformed() {
        let err = read_workbook(b"PK\x03\x04garbage", SourceFormat::Xlsx).unwrap_err();
        assert!(matches!(err, ParseError::Spreadsheet { .. }));
        let err = read_workbook(b"not an ole file", SourceFormat::Xls).unwrap_err();
        assert!(matches!(err, ParseError::Spreadsheet { .. }));
    }

    #[test]
    fn empty_buffer() {
        let err = read_workbook(b"", SourceFormat::Xls).unwrap_err();
        assert!(matches!(err, ParseError::EmptyBuffer {}));
    }
}
