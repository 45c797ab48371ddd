use crate::columns::{ColumnClassifier, ColumnRole};
use crate::config::{Row, UNKNOWN_CANDIDATE};

/// Derives the human identifier of a row, using the default column patterns.
///
/// See [`identify_with`].
pub fn identify(row: &Row) -> String {
    identify_with(row, ColumnClassifier::shared())
}

/// Derives the human identifier of a row.
///
/// The first rule giving a non-empty string wins:
/// 1. surname columns (sorted by name), followed by the given-name columns
///    that are not also surname columns (sorted by name);
/// 2. every column that looks like part of a name, sorted by name;
/// 3. the first non-empty national identifier column;
/// 4. the first column of the row.
///
/// If all of them are empty, [`UNKNOWN_CANDIDATE`] is returned.
///
/// Two different people whose name columns concatenate to the same string
/// get the same identity.
pub fn identify_with(row: &Row, classifier: &ColumnClassifier) -> String {
    let columns_with = |role: ColumnRole| {
        let mut cols: Vec<&str> = row
            .keys()
            .map(|k| k.as_str())
            .filter(|k| classifier.has_role(k, role))
            .collect();
        cols.sort_unstable();
        cols
    };

    let surnames = columns_with(ColumnRole::Surname);
    if !surnames.is_empty() {
        let given: Vec<&str> = columns_with(ColumnRole::GivenName)
            .into_iter()
            .filter(|c| !surnames.contains(c))
            .collect();
        let id = join_values(row, surnames.iter().chain(given.iter()).copied());
        if !id.is_empty() {
            return id;
        }
    }

    let id = join_values(row, columns_with(ColumnRole::NameLike).into_iter());
    if !id.is_empty() {
        return id;
    }

    let national_id = row
        .iter()
        .filter(|(k, _)| classifier.has_role(k, ColumnRole::NationalId))
        .map(|(_, v)| v.display().trim().to_string())
        .find(|v| !v.is_empty());
    if let Some(id) = national_id {
        return id;
    }

    match row.first().map(|(_, v)| v.display().trim().to_string()) {
        Some(id) if !id.is_empty() => id,
        _ => UNKNOWN_CANDIDATE.to_string(),
    }
}

// Space-joins the trimmed, non-empty values of the given columns.
fn join_values<'a>(row: &Row, columns: impl Iterator<Item = &'a str>) -> String {
    columns
        .filter_map(|c| row.get(c))
        .map(|v| v.display().trim().to_string())
        .filter(|v| !v.is_empty())
        .collect::<Vec<String>>()
        .join(" ")
}
