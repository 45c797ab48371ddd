//! Accent and case insensitive multi-term search over rows.
//!
//! Building the index is the expensive part: every row is flattened into one
//! normalized string. Queries only run substring checks against it.

use std::collections::BTreeSet;

use log::debug;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::config::{Row, RowId};

// Removed from both indexed text and queries.
const STRIPPED_PUNCTUATION: &[char] = &[
    '.', ',', '/', '#', '!', '$', '%', '^', '&', '*', ';', ':', '{', '}', '=', '-', '_', '`', '~',
    '(', ')',
];

/// Lowercases, strips diacritics and drops punctuation.
pub fn normalize_text(text: &str) -> String {
    text.to_lowercase()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .filter(|c| !STRIPPED_PUNCTUATION.contains(c))
        .collect()
}

/// Splits a query into normalized, non-empty terms.
pub fn query_terms(query: &str) -> Vec<String> {
    query
        .split_whitespace()
        .map(normalize_text)
        .filter(|t| !t.is_empty())
        .collect()
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct SearchEntry {
    /// All the values of the row, space-joined and normalized.
    pub text: String,
    pub row: RowId,
}

/// The precomputed search entries of one row set.
///
/// It has to be rebuilt when the rows change. It can be queried any number of
/// times.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct SearchIndex {
    entries: Vec<SearchEntry>,
}

impl SearchIndex {
    pub fn build(rows: &[Row]) -> SearchIndex {
        let entries: Vec<SearchEntry> = rows
            .iter()
            .enumerate()
            .map(|(idx, row)| {
                let joined = row
                    .values()
                    .map(|v| v.display())
                    .collect::<Vec<String>>()
                    .join(" ");
                SearchEntry {
                    text: normalize_text(&joined),
                    row: RowId(idx),
                }
            })
            .collect();
        debug!("SearchIndex::build: {} entries", entries.len());
        SearchIndex { entries }
    }

    pub fn entries(&self) -> &[SearchEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The rows containing every term of the query, in any order.
    ///
    /// A query without terms matches all rows.
    pub fn query(&self, query: &str) -> BTreeSet<RowId> {
        let terms = query_terms(query);
        self.entries
            .iter()
            .filter(|e| terms.iter().all(|t| e.text.contains(t.as_str())))
            .map(|e| e.row)
            .collect()
    }
}

pub fn build_search_index(rows: &[Row]) -> SearchIndex {
    SearchIndex::build(rows)
}

pub fn query(index: &SearchIndex, term: &str) -> BTreeSet<RowId> {
    index.query(term)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CellValue;

    fn rows(names: &[&[(&str, &str)]]) -> Vec<Row> {
        names
            .iter()
            .map(|cells| {
                cells
                    .iter()
                    .map(|(k, v)| (k.to_string(), CellValue::from(*v)))
                    .collect()
            })
            .collect()
    }

    fn ids(v: &[usize]) -> BTreeSet<RowId> {
        v.iter().map(|i| RowId(*i)).collect()
    }

    #[test]
    fn normalization() {
        assert_eq!(normalize_text("María-José PÉREZ, Ñ."), "mariajose perez n");
        assert_eq!(normalize_text("Çà ü"), "ca u");
    }

    #[test]
    fn all_terms_must_match() {
        let idx = build_search_index(&rows(&[
            &[("Nombre", "María"), ("Apellido", "García")],
            &[("Nombre", "María"), ("Apellido", "López")],
        ]));
        assert_eq!(query(&idx, "maria garcia"), ids(&[0]));
        assert_eq!(query(&idx, "garcia MARÍA"), ids(&[0]));
        assert_eq!(query(&idx, "maría"), ids(&[0, 1]));
        assert_eq!(query(&idx, "maria ruiz"), ids(&[]));
    }

    #[test]
    fn empty_query_matches_everything() {
        let idx = build_search_index(&rows(&[&[("a", "x")], &[("a", "y")], &[]]));
        assert_eq!(idx.query(""), ids(&[0, 1, 2]));
        assert_eq!(idx.query("   "), ids(&[0, 1, 2]));
        // Terms made only of punctuation vanish.
        assert_eq!(idx.query(" - . "), ids(&[0, 1, 2]));
    }

    #[test]
    fn substrings_and_punctuation() {
        let idx = build_search_index(&rows(&[
            &[("DNI", "12.345.678-Z"), ("Alta", "05-06-2023")],
            &[("DNI", "87654321X"), ("Alta", "01-01-2020")],
        ]));
        assert_eq!(idx.query("12345678z"), ids(&[0]));
        assert_eq!(idx.query("0606"), ids(&[]));
        assert_eq!(idx.query("2023"), ids(&[0]));
        assert_eq!(idx.query("765"), ids(&[1]));
    }

    #[test]
    fn numbers_are_searchable() {
        let mut r = Row::new();
        r.insert("Antigüedad".to_string(), CellValue::Number(15.0));
        r.insert("Activo".to_string(), CellValue::Bool(true));
        let idx = SearchIndex::build(&[r]);
        assert_eq!(idx.entries()[0].text, "15 true");
        assert_eq!(idx.query("15"), ids(&[0]));
    }
}
