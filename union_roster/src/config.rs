// ********* Input data structures ***********

use std::collections::BTreeMap;
use std::fmt::Display;

use chrono::NaiveDateTime;
use indexmap::IndexMap;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value as JSValue;

use crate::dates::format_date;

/// The union tags offered when nothing else is configured.
pub const DEFAULT_UNIONS: [&str; 5] = ["CCOO", "UGT", "SB", "SITCA", "OTRO"];

/// Identity returned for rows that carry no usable value at all.
pub const UNKNOWN_CANDIDATE: &str = "Candidato desconocido";

/// A single cell of an imported table.
///
/// The readers coerce whatever the source format provides into one of these
/// variants. Consumers never see the raw source types.
#[derive(PartialEq, Debug, Clone)]
pub enum CellValue {
    String(String),
    Number(f64),
    Bool(bool),
    /// A date or date-time decoded by the source (spreadsheet date cells).
    Date(NaiveDateTime),
    Null,
}

impl CellValue {
    /// True for nulls and strings made only of whitespace.
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Null => true,
            CellValue::String(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// The text shown for this value in tables, reports and search.
    pub fn display(&self) -> String {
        match self {
            CellValue::String(s) => s.clone(),
            CellValue::Number(n) => format_number(*n),
            CellValue::Bool(b) => b.to_string(),
            CellValue::Date(dt) => format_date(dt.date()),
            CellValue::Null => String::new(),
        }
    }
}

impl Display for CellValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display())
    }
}

// Whole numbers are written without a fractional part, as spreadsheets show them.
fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

impl From<JSValue> for CellValue {
    fn from(value: JSValue) -> Self {
        match value {
            JSValue::Null => CellValue::Null,
            JSValue::Bool(b) => CellValue::Bool(b),
            JSValue::Number(n) => n
                .as_f64()
                .map(CellValue::Number)
                .unwrap_or_else(|| CellValue::String(n.to_string())),
            JSValue::String(s) => CellValue::String(s),
            // Nested structures are kept as their JSON text.
            other => CellValue::String(other.to_string()),
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::String(value.to_string())
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

// Dates are written as a single-key object so that they read back as dates
// and not as text.
const DATE_TAG: &str = "$date";
const DATE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

impl Serialize for CellValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            CellValue::String(s) => serializer.serialize_str(s),
            CellValue::Number(n) if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 => {
                serializer.serialize_i64(*n as i64)
            }
            CellValue::Number(n) => serializer.serialize_f64(*n),
            CellValue::Bool(b) => serializer.serialize_bool(*b),
            CellValue::Date(dt) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(DATE_TAG, &dt.format(DATE_TIME_FORMAT).to_string())?;
                map.end()
            }
            CellValue::Null => serializer.serialize_unit(),
        }
    }
}

impl<'de> Deserialize<'de> for CellValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let js = JSValue::deserialize(deserializer)?;
        Ok(tagged_date(&js).map_or_else(|| CellValue::from(js), CellValue::Date))
    }
}

// {"$date": "2023-01-01T00:00:00"}, as written by the serializer.
fn tagged_date(js: &JSValue) -> Option<NaiveDateTime> {
    let obj = js.as_object().filter(|obj| obj.len() == 1)?;
    let text = obj.get(DATE_TAG)?.as_str()?;
    NaiveDateTime::parse_from_str(text, DATE_TIME_FORMAT).ok()
}

/// One imported record: column name to value, in the source's column order.
///
/// Rows of the same table may have different key sets.
pub type Row = IndexMap<String, CellValue>;

/// Stable handle of a row: its position in the table at import time.
///
/// Row ids are never reassigned, whatever filtering or sorting happens
/// downstream. Every other structure refers to rows through them.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RowId(pub usize);

impl Display for RowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The output of the parser: the header union and the rows in source order.
#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Row>,
}

impl Table {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn row(&self, id: RowId) -> Option<&Row> {
        self.rows.get(id.0)
    }

    /// Iterates over the rows together with their ids.
    pub fn iter(&self) -> impl Iterator<Item = (RowId, &Row)> {
        self.rows.iter().enumerate().map(|(idx, row)| (RowId(idx), row))
    }
}

/// Per row, per union markings. A missing entry means "not marked".
pub type SelectionState = BTreeMap<RowId, BTreeMap<String, bool>>;

// ******** Output data structures *********

/// A candidate marked under a union and under at least one other union.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateEntry {
    pub identity: String,
    /// The other unions this identity is marked under, sorted.
    #[serde(rename = "otherUnions")]
    pub other_unions: Vec<String>,
    /// The rows that resolved to this identity and carry at least one marking.
    pub rows: Vec<RowId>,
}

/// Duplicates per union, in the order of the union list given by the caller.
///
/// Unions without duplicates are absent.
pub type DuplicateGroups = IndexMap<String, Vec<DuplicateEntry>>;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    #[test]
    fn display_of_values() {
        assert_eq!(CellValue::Number(12.0).display(), "12");
        assert_eq!(CellValue::Number(1.5).display(), "1.5");
        assert_eq!(CellValue::Bool(true).display(), "true");
        assert_eq!(CellValue::Null.display(), "");
        let dt = NaiveDate::from_ymd_opt(2021, 3, 7)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(CellValue::Date(dt).display(), "07-03-2021");
    }

    #[test]
    fn json_coercion() {
        assert_eq!(CellValue::from(json!(null)), CellValue::Null);
        assert_eq!(CellValue::from(json!(3)), CellValue::Number(3.0));
        assert_eq!(CellValue::from(json!("x")), CellValue::from("x"));
        assert_eq!(
            CellValue::from(json!({"a": [1, 2]})),
            CellValue::from(r#"{"a":[1,2]}"#)
        );
    }

    #[test]
    fn serialized_numbers_stay_integral() {
        let row: Row = [
            ("n".to_string(), CellValue::Number(7.0)),
            ("f".to_string(), CellValue::Number(0.25)),
            ("z".to_string(), CellValue::Null),
        ]
        .into_iter()
        .collect();
        let js = serde_json::to_string(&row).unwrap();
        assert_eq!(js, r#"{"n":7,"f":0.25,"z":null}"#);
    }

    #[test]
    fn dates_read_back_as_dates() {
        let dt = NaiveDate::from_ymd_opt(2023, 1, 1)
            .unwrap()
            .and_hms_opt(8, 30, 0)
            .unwrap();
        let js = serde_json::to_value(CellValue::Date(dt)).unwrap();
        assert_eq!(js, json!({"$date": "2023-01-01T08:30:00"}));
        let back: CellValue = serde_json::from_value(js).unwrap();
        assert_eq!(back, CellValue::Date(dt));
        // Other objects stay text, as in imported JSON.
        let other: CellValue = serde_json::from_value(json!({"$date": "mañana"})).unwrap();
        assert_eq!(other, CellValue::from(r#"{"$date":"mañana"}"#));
    }

    #[test]
    fn blank_values() {
        assert!(CellValue::Null.is_blank());
        assert!(CellValue::from("  ").is_blank());
        assert!(!CellValue::Number(0.0).is_blank());
    }
}
