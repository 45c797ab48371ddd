use log::{debug, info, warn};

use chrono::NaiveDate;
use snafu::{prelude::*, Snafu};
use union_roster::*;

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::json;
use serde_json::Map as JSMap;
use serde_json::Value as JSValue;
use text_diff::print_diff;

use crate::args::Args;
use crate::report::config_reader::*;

pub mod config_reader;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ReportError {
    #[snafu(display("Error opening file {path}: {source}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Invalid configuration in {path}: {source}"))]
    ParsingConfig {
        source: serde_json::Error,
        path: String,
    },
    #[snafu(display("Invalid JSON: {source}"))]
    ParsingJson { source: serde_json::Error },
    #[snafu(display("Error writing the summary to {path}: {source}"))]
    WritingSummary {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Cannot import {path}: {source}"))]
    Import { source: ParseError, path: String },
    #[snafu(display("Session error: {source}"))]
    Session { source: StoreError },
    #[snafu(display("Cannot apply marking {mark:?}: {source}"))]
    Marking { source: RosterError, mark: String },
    #[snafu(display("Invalid marking {mark:?}, expected ROW:UNION"))]
    InvalidMark { mark: String },
    #[snafu(display("Invalid {field} {value:?}, expected YYYY-MM-DD"))]
    InvalidDate { field: String, value: String },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type ReportResult<T> = Result<T, ReportError>;

fn counts_to_json(roster: &Roster) -> JSMap<String, JSValue> {
    let mut counts: JSMap<String, JSValue> = JSMap::new();
    for (union, count) in roster.counts() {
        counts.insert(union, json!(count));
    }
    counts
}

fn duplicates_to_json(groups: &DuplicateGroups) -> Vec<JSValue> {
    groups
        .iter()
        .map(|(union, candidates)| json!({"union": union, "candidates": candidates}))
        .collect()
}

pub fn build_summary_js(roster: &Roster) -> JSValue {
    let c = OutputConfig {
        file_name: roster.file_name().map(|s| s.to_string()),
        submission_date: roster.submission_date().map(format_iso_date),
        voting_date: roster.voting_date().map(format_iso_date),
        unions: roster.unions().to_vec(),
        row_count: roster.table().len(),
    };
    json!({
        "config": c,
        "counts": counts_to_json(roster),
        "duplicates": duplicates_to_json(&roster.duplicates()) })
}

// Relative paths from the configuration file start at its directory.
fn resolve_path(root: Option<&Path>, path: &str) -> PathBuf {
    match root {
        Some(root) if Path::new(path).is_relative() => root.join(path),
        _ => PathBuf::from(path),
    }
}

fn parse_mark(mark: &str) -> ReportResult<(RowId, String)> {
    let (row, union) = mark.split_once(':').context(InvalidMarkSnafu { mark })?;
    let row: usize = row
        .trim()
        .parse()
        .ok()
        .context(InvalidMarkSnafu { mark })?;
    Ok((RowId(row), union.trim().to_string()))
}

fn read_date(field: &str, value: Option<String>) -> ReportResult<Option<NaiveDate>> {
    match value {
        None => Ok(None),
        Some(s) => {
            let date = parse_iso_date(&s).context(InvalidDateSnafu { field, value: s })?;
            Ok(Some(date))
        }
    }
}

fn split_unions(unions: &str) -> Vec<String> {
    unions
        .split(',')
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
        .collect()
}

async fn import_roster(
    path: &Path,
    unions: &[String],
    classifier: &ColumnClassifier,
) -> ReportResult<Roster> {
    let importer = Importer::new(TabularParser::new(classifier.clone()));
    let outcome = importer.import_path(path).await.context(ImportSnafu {
        path: path.display().to_string(),
    })?;
    let file = match outcome {
        ImportOutcome::Loaded(file) => file,
        ImportOutcome::Superseded => whatever!("The import of {:?} was superseded", path),
    };
    let mut roster = Roster::from_table(file.table, unions).with_classifier(classifier.clone());
    roster.set_file_name(Some(file.file_name));
    Ok(roster)
}

/// Builds the roster described by the arguments, applies the markings and
/// writes the duplicates summary.
pub async fn run_report(args: &Args) -> ReportResult<()> {
    let (config, root_p): (RosterConfig, Option<PathBuf>) = match &args.config {
        Some(config_path) => {
            let config = read_config(config_path)?;
            let root_p = Path::new(config_path).parent().map(|p| p.to_path_buf());
            (config, root_p)
        }
        None => (RosterConfig::default(), None),
    };
    info!("config: {:?}", config);

    let classifier = ColumnClassifier::new(&config.column_patterns)
        .with_whatever_context(|e| format!("Invalid column pattern: {}", e))?;
    let unions: Vec<String> = match &args.unions {
        Some(s) => split_unions(s),
        None => config.unions.clone(),
    };

    let input_p: Option<PathBuf> = match (&args.input, &config.input) {
        (Some(p), _) => Some(PathBuf::from(p)),
        (None, Some(p)) => Some(resolve_path(root_p.as_deref(), p)),
        (None, None) => None,
    };
    let session_p: Option<PathBuf> = match (&args.session, &config.session) {
        (Some(p), _) => Some(PathBuf::from(p)),
        (None, Some(p)) => Some(resolve_path(root_p.as_deref(), p)),
        (None, None) => None,
    };
    let store: Option<JsonFileStore> = session_p.map(JsonFileStore::new);

    let mut roster = if let Some(p) = input_p {
        info!("Attempting to read input file {:?}", p);
        import_roster(&p, &unions, &classifier).await?
    } else if let Some(store) = &store {
        let snapshot = match store.load().context(SessionSnafu {})? {
            Some(snapshot) => snapshot,
            None => whatever!("No saved session at {:?}", store.path()),
        };
        let mut roster = Roster::from_snapshot(snapshot).with_classifier(classifier.clone());
        if args.unions.is_some() {
            for union in unions.iter() {
                if !roster.unions().contains(union) {
                    roster.add_union(union).context(MarkingSnafu {
                        mark: union.clone(),
                    })?;
                }
            }
        }
        roster
    } else {
        whatever!("No input file or session given, see --input and --session")
    };

    if let Some(date) = read_date(
        "submission date",
        args.submission_date.clone().or(config.submission_date),
    )? {
        roster.set_submission_date(Some(date));
    }
    if let Some(date) = read_date("voting date", args.voting_date.clone().or(config.voting_date))? {
        roster.set_voting_date(Some(date));
    }

    for mark in args.mark.iter() {
        let (row, union) = parse_mark(mark)?;
        roster
            .set_selected(row, &union, true)
            .context(MarkingSnafu { mark })?;
    }
    debug!("selections: {:?}", roster.selections());

    if let Some(query) = &args.query {
        let matches = roster.search(query);
        info!("query {:?}: {} matching rows", query, matches.len());
        for row in matches {
            println!("{}\t{}", row, roster.identify(row).unwrap_or_default());
        }
    }

    // Assemble the final json
    let summary_js = build_summary_js(&roster);
    let pretty_js_stats = serde_json::to_string_pretty(&summary_js).context(ParsingJsonSnafu {})?;

    match args.out.as_deref() {
        None | Some("stdout") => println!("{}", pretty_js_stats),
        Some(out_path) => {
            fs::write(out_path, &pretty_js_stats).context(WritingSummarySnafu { path: out_path })?;
            info!("Summary written to {:?}", out_path);
        }
    }

    if args.save {
        let store = match &store {
            Some(store) => store,
            None => whatever!("--save needs a session file, see --session"),
        };
        store.save(&roster.snapshot()).context(SessionSnafu {})?;
    }

    // The reference summary, if provided for comparison
    if let Some(summary_p) = &args.reference {
        let summary_ref = read_summary(summary_p)?;
        let pretty_js_summary_ref =
            serde_json::to_string_pretty(&summary_ref).context(ParsingJsonSnafu {})?;
        if pretty_js_summary_ref != pretty_js_stats {
            warn!("Found differences with the reference string");
            print_diff(
                pretty_js_summary_ref.as_str(),
                pretty_js_stats.as_ref(),
                "\n",
            );
            whatever!("Difference detected between calculated summary and reference summary")
        }
    }

    Ok(())
}
