use log::{debug, info};
use serde_json::Value as JSValue;
use snafu::prelude::*;

use crate::config::{CellValue, Row};
use crate::parser::*;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Reads a JSON array of objects, one row per element.
///
/// Keys keep the order they have in the document.
pub fn read_json(bytes: &[u8]) -> ParseResult<Vec<Row>> {
    let body = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    let js: JSValue = serde_json::from_slice(body).context(JsonSyntaxSnafu {})?;
    let records = match js {
        JSValue::Array(records) => records,
        other => {
            debug!("read_json: root is not an array: {:?}", other);
            return JsonNotArraySnafu {}.fail();
        }
    };
    info!("read_json: {} records", records.len());

    let mut res: Vec<Row> = Vec::with_capacity(records.len());
    for (index, record) in records.into_iter().enumerate() {
        match record {
            JSValue::Object(map) => {
                let row: Row = map
                    .into_iter()
                    .map(|(k, v)| (k, CellValue::from(v)))
                    .collect();
                res.push(row);
            }
            _ => return JsonRecordNotObjectSnafu { index }.fail(),
        }
    }
    Ok(res)
}
