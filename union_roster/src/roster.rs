use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

use chrono::NaiveDate;
use indexmap::IndexMap;
use log::{debug, info, warn};
use snafu::prelude::*;

use crate::columns::ColumnClassifier;
use crate::config::*;
use crate::dates::{format_iso_date, parse_iso_date};
use crate::identity::identify_with;
use crate::search::SearchIndex;
use crate::session::SessionSnapshot;

#[derive(Debug, Snafu, PartialEq, Eq)]
#[snafu(visibility(pub(crate)))]
pub enum RosterError {
    #[snafu(display("union names cannot be empty"))]
    EmptyUnionName {},
    #[snafu(display("union {name:?} already exists"))]
    DuplicateUnion { name: String },
    #[snafu(display("unknown union {name:?}"))]
    UnknownUnion { name: String },
    #[snafu(display("row {row} does not exist ({len} rows)"))]
    UnknownRow { row: RowId, len: usize },
}

/// An imported table together with the markings made on it.
///
/// Rows are never reordered or removed: the [`RowId`] given at import is
/// the only handle used by the selections. The search index is built on the
/// first search and kept until the rows are replaced.
#[derive(Debug, Clone)]
pub struct Roster {
    table: Table,
    unions: Vec<String>,
    selections: SelectionState,
    submission_date: Option<NaiveDate>,
    voting_date: Option<NaiveDate>,
    file_name: Option<String>,
    classifier: ColumnClassifier,
    index: OnceLock<SearchIndex>,
}

impl Default for Roster {
    fn default() -> Self {
        Roster::from_table(Table::default(), DEFAULT_UNIONS)
    }
}

impl Roster {
    /// Starts a roster without any marking.
    ///
    /// Union names are trimmed; empty and repeated names are skipped.
    pub fn from_table<I, S>(table: Table, unions: I) -> Roster
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut roster = Roster {
            table,
            unions: Vec::new(),
            selections: SelectionState::new(),
            submission_date: None,
            voting_date: None,
            file_name: None,
            classifier: ColumnClassifier::default(),
            index: OnceLock::new(),
        };
        for name in unions {
            if let Err(e) = roster.add_union(name.as_ref()) {
                warn!("Roster::from_table: skipping union {:?}: {}", name.as_ref(), e);
            }
        }
        info!(
            "Roster::from_table: {} rows, unions: {:?}",
            roster.table.len(),
            roster.unions
        );
        roster
    }

    /// Uses other column patterns to resolve identities.
    pub fn with_classifier(self, classifier: ColumnClassifier) -> Roster {
        Roster { classifier, ..self }
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn headers(&self) -> &[String] {
        &self.table.headers
    }

    pub fn rows(&self) -> &[Row] {
        &self.table.rows
    }

    pub fn unions(&self) -> &[String] {
        &self.unions
    }

    pub fn selections(&self) -> &SelectionState {
        &self.selections
    }

    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    pub fn set_file_name(&mut self, file_name: Option<String>) {
        self.file_name = file_name;
    }

    pub fn submission_date(&self) -> Option<NaiveDate> {
        self.submission_date
    }

    pub fn set_submission_date(&mut self, date: Option<NaiveDate>) {
        self.submission_date = date;
    }

    pub fn voting_date(&self) -> Option<NaiveDate> {
        self.voting_date
    }

    pub fn set_voting_date(&mut self, date: Option<NaiveDate>) {
        self.voting_date = date;
    }

    /// Loads a new table. The markings of the previous one are dropped, the
    /// union list is kept.
    pub fn replace_table(&mut self, table: Table, file_name: Option<String>) {
        info!(
            "Roster::replace_table: {} rows from {:?}",
            table.len(),
            file_name
        );
        self.table = table;
        self.file_name = file_name;
        self.selections.clear();
        self.index = OnceLock::new();
    }

    fn check_row(&self, row: RowId) -> Result<(), RosterError> {
        ensure!(
            row.0 < self.table.len(),
            UnknownRowSnafu {
                row,
                len: self.table.len()
            }
        );
        Ok(())
    }

    fn check_union(&self, union: &str) -> Result<(), RosterError> {
        ensure!(
            self.unions.iter().any(|u| u == union),
            UnknownUnionSnafu { name: union }
        );
        Ok(())
    }

    pub fn set_selected(
        &mut self,
        row: RowId,
        union: &str,
        selected: bool,
    ) -> Result<(), RosterError> {
        self.check_row(row)?;
        self.check_union(union)?;
        debug!("set_selected: row {} union {} -> {}", row, union, selected);
        if selected {
            self.selections
                .entry(row)
                .or_default()
                .insert(union.to_string(), true);
        } else if let Some(marks) = self.selections.get_mut(&row) {
            marks.remove(union);
            if marks.is_empty() {
                self.selections.remove(&row);
            }
        }
        Ok(())
    }

    /// Flips a marking and returns its new value.
    pub fn toggle(&mut self, row: RowId, union: &str) -> Result<bool, RosterError> {
        let selected = !self.is_selected(row, union);
        self.set_selected(row, union, selected)?;
        Ok(selected)
    }

    pub fn is_selected(&self, row: RowId, union: &str) -> bool {
        self.selections
            .get(&row)
            .and_then(|marks| marks.get(union))
            .copied()
            .unwrap_or(false)
    }

    pub fn add_union(&mut self, name: &str) -> Result<(), RosterError> {
        let name = name.trim();
        ensure!(!name.is_empty(), EmptyUnionNameSnafu {});
        ensure!(
            !self.unions.iter().any(|u| u == name),
            DuplicateUnionSnafu { name }
        );
        self.unions.push(name.to_string());
        Ok(())
    }

    /// Removes a union and every marking made under it.
    pub fn remove_union(&mut self, name: &str) -> Result<(), RosterError> {
        self.check_union(name)?;
        self.unions.retain(|u| u != name);
        for marks in self.selections.values_mut() {
            marks.remove(name);
        }
        self.selections.retain(|_, marks| !marks.is_empty());
        info!("Roster::remove_union: removed {:?}", name);
        Ok(())
    }

    /// The rows marked under a union, in row order.
    pub fn selected_rows(&self, union: &str) -> Vec<RowId> {
        self.selections
            .iter()
            .filter(|(_, marks)| marks.get(union).copied().unwrap_or(false))
            .map(|(row, _)| *row)
            .collect()
    }

    /// The number of marked rows per union, following the union list.
    pub fn counts(&self) -> IndexMap<String, usize> {
        self.unions
            .iter()
            .map(|u| (u.clone(), self.selected_rows(u).len()))
            .collect()
    }

    pub fn identify(&self, row: RowId) -> Option<String> {
        self.table
            .row(row)
            .map(|r| identify_with(r, &self.classifier))
    }

    pub fn duplicates(&self) -> DuplicateGroups {
        crate::group_duplicates_with(
            &self.table.rows,
            &self.unions,
            &self.selections,
            &self.classifier,
        )
    }

    /// The rows containing every term of the query. An empty query matches
    /// all the rows.
    pub fn search(&self, query: &str) -> BTreeSet<RowId> {
        self.index
            .get_or_init(|| SearchIndex::build(&self.table.rows))
            .query(query)
    }

    pub fn clear_selections(&mut self) {
        self.selections.clear();
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            headers: self.table.headers.clone(),
            rows: self.table.rows.clone(),
            selections: self.selections.clone(),
            unions: self.unions.clone(),
            submission_date: self.submission_date.map(format_iso_date),
            voting_date: self.voting_date.map(format_iso_date),
            file_name: self.file_name.clone(),
        }
    }

    /// Restores a saved session.
    ///
    /// Markings of rows that are not in the session are dropped. The union
    /// list is kept as it was saved, and dates that cannot be read are
    /// left unset.
    pub fn from_snapshot(snapshot: SessionSnapshot) -> Roster {
        let len = snapshot.rows.len();
        let mut selections: SelectionState = BTreeMap::new();
        for (row, marks) in snapshot.selections {
            if row.0 >= len {
                warn!(
                    "Roster::from_snapshot: dropping markings of row {} ({} rows)",
                    row, len
                );
                continue;
            }
            let marks: BTreeMap<String, bool> = marks.into_iter().filter(|(_, v)| *v).collect();
            if !marks.is_empty() {
                selections.insert(row, marks);
            }
        }
        let submission_date = read_session_date("submissionDate", snapshot.submission_date);
        let voting_date = read_session_date("votingDate", snapshot.voting_date);
        info!(
            "Roster::from_snapshot: {} rows, {} marked, unions: {:?}",
            len,
            selections.len(),
            snapshot.unions
        );
        Roster {
            table: Table {
                headers: snapshot.headers,
                rows: snapshot.rows,
            },
            unions: snapshot.unions,
            selections,
            submission_date,
            voting_date,
            file_name: snapshot.file_name,
            classifier: ColumnClassifier::default(),
            index: OnceLock::new(),
        }
    }
}

fn read_session_date(field: &str, text: Option<String>) -> Option<NaiveDate> {
    let text = text?;
    let date = parse_iso_date(&text);
    if date.is_none() {
        warn!("Roster::from_snapshot: ignoring {} {:?}", field, text);
    }
    date
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(names: &[(&str, &str)]) -> Table {
        let rows: Vec<Row> = names
            .iter()
            .map(|(surname, name)| {
                [
                    ("Apellidos".to_string(), CellValue::from(*surname)),
                    ("Nombre".to_string(), CellValue::from(*name)),
                ]
                .into_iter()
                .collect()
            })
            .collect();
        Table {
            headers: vec!["Apellidos".to_string(), "Nombre".to_string()],
            rows,
        }
    }

    fn roster() -> Roster {
        Roster::from_table(
            table(&[("Pérez", "Juan"), ("García", "María"), ("López", "María")]),
            DEFAULT_UNIONS,
        )
    }

    #[test]
    fn markings() {
        let mut r = roster();
        r.set_selected(RowId(1), "UGT", true).unwrap();
        assert!(r.is_selected(RowId(1), "UGT"));
        assert!(!r.is_selected(RowId(1), "CCOO"));
        assert!(!r.toggle(RowId(1), "UGT").unwrap());
        assert!(r.selections().is_empty());
        assert!(r.toggle(RowId(2), "SB").unwrap());
        assert_eq!(r.selected_rows("SB"), vec![RowId(2)]);

        assert_eq!(
            r.set_selected(RowId(3), "SB", true),
            Err(RosterError::UnknownRow {
                row: RowId(3),
                len: 3
            })
        );
        assert!(matches!(
            r.set_selected(RowId(0), "CGT", true),
            Err(RosterError::UnknownUnion { .. })
        ));
    }

    #[test]
    fn union_list() {
        let mut r = roster();
        assert_eq!(r.add_union("  "), Err(RosterError::EmptyUnionName {}));
        assert!(matches!(
            r.add_union(" UGT "),
            Err(RosterError::DuplicateUnion { .. })
        ));
        r.add_union(" CGT ").unwrap();
        assert_eq!(r.unions().last().map(|s| s.as_str()), Some("CGT"));

        r.set_selected(RowId(0), "CGT", true).unwrap();
        r.set_selected(RowId(0), "CCOO", true).unwrap();
        r.set_selected(RowId(1), "CGT", true).unwrap();
        r.remove_union("CGT").unwrap();
        assert!(!r.unions().contains(&"CGT".to_string()));
        assert_eq!(r.selections().len(), 1);
        assert!(r.is_selected(RowId(0), "CCOO"));
        assert!(r.remove_union("CGT").is_err());
    }

    #[test]
    fn counts_follow_union_order() {
        let mut r = roster();
        r.set_selected(RowId(0), "UGT", true).unwrap();
        r.set_selected(RowId(1), "UGT", true).unwrap();
        r.set_selected(RowId(2), "OTRO", true).unwrap();
        let counts: Vec<(String, usize)> = r.counts().into_iter().collect();
        assert_eq!(
            counts,
            vec![
                ("CCOO".to_string(), 0),
                ("UGT".to_string(), 2),
                ("SB".to_string(), 0),
                ("SITCA".to_string(), 0),
                ("OTRO".to_string(), 1),
            ]
        );
    }

    #[test]
    fn duplicates_through_the_roster() {
        let mut r = roster();
        r.set_selected(RowId(0), "CCOO", true).unwrap();
        r.set_selected(RowId(0), "UGT", true).unwrap();
        let groups = r.duplicates();
        assert_eq!(groups.keys().collect::<Vec<_>>(), vec!["CCOO", "UGT"]);
        assert_eq!(groups["UGT"][0].identity, "Pérez Juan");
        assert_eq!(r.identify(RowId(1)), Some("García María".to_string()));
        assert_eq!(r.identify(RowId(9)), None);
    }

    fn ids(v: &[usize]) -> BTreeSet<RowId> {
        v.iter().map(|i| RowId(*i)).collect()
    }

    #[test]
    fn search_uses_cached_index() {
        let mut r = roster();
        assert_eq!(r.search("maria"), ids(&[1, 2]));
        assert_eq!(r.search("MARÍA garcia"), ids(&[1]));
        assert_eq!(r.search("").len(), 3);

        r.replace_table(table(&[("Gil", "Ana")]), Some("nueva.csv".to_string()));
        assert!(r.search("maria").is_empty());
        assert_eq!(r.search("ana"), ids(&[0]));
        assert_eq!(r.file_name(), Some("nueva.csv"));
    }

    #[test]
    fn replacing_the_table_drops_markings() {
        let mut r = roster();
        r.set_selected(RowId(2), "SB", true).unwrap();
        r.replace_table(table(&[("Gil", "Ana")]), None);
        assert!(r.selections().is_empty());
        assert_eq!(r.unions().len(), DEFAULT_UNIONS.len());
    }

    #[test]
    fn snapshot_and_back() {
        let mut r = roster();
        r.set_selected(RowId(0), "CCOO", true).unwrap();
        r.set_file_name(Some("lista.csv".to_string()));
        r.set_voting_date(NaiveDate::from_ymd_opt(2024, 6, 1));
        let snapshot = r.snapshot();
        assert_eq!(snapshot.voting_date.as_deref(), Some("2024-06-01"));
        assert_eq!(snapshot.submission_date, None);

        let restored = Roster::from_snapshot(snapshot.clone());
        assert_eq!(restored.snapshot(), snapshot);
        assert!(restored.is_selected(RowId(0), "CCOO"));
    }

    #[test]
    fn date_cells_survive_a_saved_session() {
        use crate::session::{JsonFileStore, SessionStore};

        let alta = NaiveDate::from_ymd_opt(2023, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let mut t = table(&[("Pérez", "Juan")]);
        t.headers.push("Alta sindical".to_string());
        t.rows[0].insert("Alta sindical".to_string(), CellValue::Date(alta));
        let r = Roster::from_table(t, DEFAULT_UNIONS);
        assert_eq!(r.search("01-01-2023"), ids(&[0]));

        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("session.json"));
        store.save(&r.snapshot()).unwrap();
        let restored = Roster::from_snapshot(store.load().unwrap().unwrap());

        let cell = &restored.rows()[0]["Alta sindical"];
        assert_eq!(cell, &CellValue::Date(alta));
        assert_eq!(cell.display(), "01-01-2023");
        assert_eq!(restored.search("01-01-2023"), ids(&[0]));
    }

    #[test]
    fn snapshot_with_stale_rows() {
        let mut snapshot = roster().snapshot();
        snapshot.unions = vec!["A".to_string(), "B".to_string()];
        snapshot
            .selections
            .insert(RowId(7), BTreeMap::from([("A".to_string(), true)]));
        snapshot
            .selections
            .insert(RowId(1), BTreeMap::from([("B".to_string(), true)]));
        snapshot.submission_date = Some("mañana".to_string());
        let r = Roster::from_snapshot(snapshot);
        assert_eq!(r.selections().len(), 1);
        assert!(r.is_selected(RowId(1), "B"));
        assert_eq!(r.unions(), &["A".to_string(), "B".to_string()]);
        assert_eq!(r.submission_date(), None);
    }
}
