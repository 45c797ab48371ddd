// Helpers shared by the readers.

use std::borrow::Cow;
use std::collections::HashSet;

use indexmap::IndexSet;
use log::warn;

use crate::config::Row;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Name given to columns whose header cell is empty.
pub const EMPTY_HEADER: &str = "__EMPTY";

/// Strips the byte order mark and decodes the bytes as text.
///
/// Bytes that are not valid UTF-8 are read as Latin-1, which is what older
/// spreadsheet exports produce.
pub fn decode_text(bytes: &[u8]) -> Cow<'_, str> {
    let body = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    match std::str::from_utf8(body) {
        Ok(s) => Cow::Borrowed(s),
        Err(e) => {
            warn!("decode_text: not valid UTF-8 ({}), reading as Latin-1", e);
            Cow::Owned(body.iter().map(|&b| b as char).collect())
        }
    }
}

/// Makes header names unique and non-empty, keeping their order.
///
/// Empty names become `__EMPTY`, repeated names get a `_1`, `_2`... suffix.
pub fn unique_header_names<I, S>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen: HashSet<String> = HashSet::new();
    let mut res: Vec<String> = Vec::new();
    for name in names {
        let base = match name.as_ref().trim() {
            "" => EMPTY_HEADER.to_string(),
            s => s.to_string(),
        };
        let mut candidate = base.clone();
        let mut counter = 1;
        while seen.contains(&candidate) {
            candidate = format!("{}_{}", base, counter);
            counter += 1;
        }
        seen.insert(candidate.clone());
        res.push(candidate);
    }
    res
}

/// The union of the keys of all rows, in first-seen order.
pub fn header_union(rows: &[Row]) -> Vec<String> {
    let mut headers: IndexSet<&str> = IndexSet::new();
    for row in rows {
        for key in row.keys() {
            headers.insert(key.as_str());
        }
    }
    headers.into_iter().map(|h| h.to_string()).collect()
}
