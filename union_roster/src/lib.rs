mod columns;
mod config;
mod dates;
mod identity;
mod importer;
mod io_common;
mod io_csv;
mod io_excel;
mod io_json;
pub mod manual;
mod parser;
mod roster;
mod search;
mod session;

use log::{debug, info, warn};

use std::collections::{BTreeMap, BTreeSet, HashSet};

pub use crate::columns::{ColumnClassifier, ColumnPatterns, ColumnRole};
pub use crate::config::*;
pub use crate::dates::{
    format_date, format_iso_date, from_serial, normalize_date, parse_date_text, parse_iso_date,
};
pub use crate::identity::{identify, identify_with};
pub use crate::importer::{parse, ImportOutcome, ImportTicket, ImportedFile, Importer};
pub use crate::parser::{
    parse_bytes, parse_path, ParseError, ParseErrorKind, ParseResult, SourceFormat, TabularParser,
};
pub use crate::roster::{Roster, RosterError};
pub use crate::search::{build_search_index, normalize_text, query, SearchEntry, SearchIndex};
pub use crate::session::{JsonFileStore, MemoryStore, SessionSnapshot, SessionStore, StoreError};

// What one identity accumulates over all of its rows.
#[derive(Debug, Default)]
struct IdentityMarks<'a> {
    unions: BTreeSet<&'a str>,
    rows: Vec<RowId>,
}

/// Finds the candidates marked under more than one union, with the default
/// column patterns.
///
/// See [`group_duplicates_with`].
pub fn group_duplicates(
    rows: &[Row],
    unions: &[String],
    selections: &SelectionState,
) -> DuplicateGroups {
    group_duplicates_with(rows, unions, selections, ColumnClassifier::shared())
}

/// Finds the candidates marked under more than one union.
///
/// Rows are grouped by identity: the unions of every row resolving to the
/// same identity are pooled together. An identity pooling two unions or more
/// is a duplicate, and it is listed under each of its unions along with the
/// other ones.
///
/// Arguments:
/// * `rows` the imported rows, indexed by [`RowId`]
/// * `unions` the union list, which also gives the order of the result.
///   Markings under a union not in this list are ignored.
/// * `selections` the markings
///
/// Within a union, candidates are sorted by identity. Unions without any
/// duplicate are left out.
pub fn group_duplicates_with(
    rows: &[Row],
    unions: &[String],
    selections: &SelectionState,
    classifier: &ColumnClassifier,
) -> DuplicateGroups {
    info!(
        "Grouping duplicates: {} rows, {} marked, unions: {:?}",
        rows.len(),
        selections.len(),
        unions
    );
    let known_unions: HashSet<&str> = unions.iter().map(|u| u.as_str()).collect();

    let mut by_identity: BTreeMap<String, IdentityMarks> = BTreeMap::new();
    for (row_id, marks) in selections.iter() {
        let row = match rows.get(row_id.0) {
            Some(row) => row,
            None => {
                warn!("group_duplicates: markings for missing row {}", row_id);
                continue;
            }
        };
        let mut marked: BTreeSet<&str> = BTreeSet::new();
        for (union, selected) in marks.iter() {
            if !*selected {
                continue;
            }
            if known_unions.contains(union.as_str()) {
                marked.insert(union.as_str());
            } else {
                debug!("group_duplicates: row {}: ignoring union {:?}", row_id, union);
            }
        }
        if marked.is_empty() {
            continue;
        }
        let entry = by_identity
            .entry(identify_with(row, classifier))
            .or_default();
        entry.unions.extend(marked);
        entry.rows.push(*row_id);
    }

    // BTreeMap iteration keeps the identities sorted.
    let duplicates: Vec<(&String, &IdentityMarks)> = by_identity
        .iter()
        .filter(|(_, marks)| marks.unions.len() >= 2)
        .collect();
    debug!(
        "group_duplicates: {} identities, {} duplicated",
        by_identity.len(),
        duplicates.len()
    );

    let mut res = DuplicateGroups::new();
    for union in unions.iter() {
        if res.contains_key(union) {
            continue;
        }
        let entries: Vec<DuplicateEntry> = duplicates
            .iter()
            .filter(|(_, marks)| marks.unions.contains(union.as_str()))
            .map(|(identity, marks)| DuplicateEntry {
                identity: identity.to_string(),
                other_unions: marks
                    .unions
                    .iter()
                    .filter(|u| **u != union.as_str())
                    .map(|u| u.to_string())
                    .collect(),
                rows: marks.rows.clone(),
            })
            .collect();
        if !entries.is_empty() {
            info!("Union {}: {} duplicated candidates", union, entries.len());
            res.insert(union.clone(), entries);
        }
    }
    res
}
