// Primitives for reading CSV files.

use log::{debug, info};
use snafu::prelude::*;

use crate::config::{CellValue, Row};
use crate::io_common::{decode_text, unique_header_names};
use crate::parser::*;

const CANDIDATE_DELIMITERS: [u8; 4] = [b',', b';', b'\t', b'|'];

/// Reads a CSV buffer with a mandatory header row.
///
/// Blank lines and records whose fields are all empty are skipped. Every
/// value is kept as text.
pub fn read_csv(bytes: &[u8]) -> ParseResult<Vec<Row>> {
    let text = decode_text(bytes);
    let delimiter = sniff_delimiter(&text);
    info!("read_csv: delimiter {:?}", delimiter as char);

    // Field counts are checked below, once blank lines are out of the way.
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers = unique_header_names(rdr.headers().context(CsvHeaderSnafu {})?.iter());
    debug!("read_csv: headers: {:?}", headers);

    let mut res: Vec<Row> = Vec::new();
    for record in rdr.records() {
        let record = record.with_context(|e| CsvRecordSnafu {
            line: e.position().map_or(0, |p| p.line()),
        })?;
        if record.iter().all(|field| field.trim().is_empty()) {
            debug!("read_csv: skipping empty record {:?}", record.position());
            continue;
        }
        let line = record.position().map_or(0, |p| p.line());
        ensure!(
            record.len() == headers.len(),
            RaggedRecordSnafu {
                line,
                expected: headers.len(),
                found: record.len(),
            }
        );
        let row: Row = headers
            .iter()
            .cloned()
            .zip(record.iter().map(|field| CellValue::String(field.to_string())))
            .collect();
        res.push(row);
    }
    Ok(res)
}

/// Picks the delimiter that appears most often, outside quotes, on the first
/// non-blank line. Commas win ties and empty input.
pub fn sniff_delimiter(text: &str) -> u8 {
    let first_line = match text.lines().find(|l| !l.trim().is_empty()) {
        Some(l) => l,
        None => return b',',
    };
    let mut counts = [0_usize; CANDIDATE_DELIMITERS.len()];
    let mut in_quotes = false;
    for b in first_line.bytes() {
        if b == b'"' {
            in_quotes = !in_quotes;
        } else if !in_quotes {
            if let Some(pos) = CANDIDATE_DELIMITERS.iter().position(|d| *d == b) {
                counts[pos] += 1;
            }
        }
    }
    let mut best = 0;
    for (idx, count) in counts.iter().enumerate() {
        if *count > counts[best] {
            best = idx;
        }
    }
    CANDIDATE_DELIMITERS[best]
}
