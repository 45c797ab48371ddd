//! Saved work sessions.
//!
//! A session holds the imported table, the markings and the union list so
//! that work can be resumed later. Where it is kept is up to the
//! [`SessionStore`] implementation.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use log::{debug, info};
use serde::{Deserialize, Serialize};
use snafu::prelude::*;

use crate::config::{Row, SelectionState};

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum StoreError {
    #[snafu(display("cannot read session file {path}: {source}"))]
    ReadSession {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("cannot write session file {path}: {source}"))]
    WriteSession {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("cannot remove session file {path}: {source}"))]
    RemoveSession {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("session file {path} is not a valid session: {source}"))]
    DecodeSession {
        source: serde_json::Error,
        path: String,
    },
    #[snafu(display("cannot encode the session: {source}"))]
    EncodeSession { source: serde_json::Error },
}

/// Everything needed to resume a session.
///
/// Selections are keyed by the row index assigned at import time. Dates are
/// ISO-8601 strings.
#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub headers: Vec<String>,
    pub rows: Vec<Row>,
    #[serde(default)]
    pub selections: SelectionState,
    #[serde(default)]
    pub unions: Vec<String>,
    #[serde(rename = "submissionDate", default)]
    pub submission_date: Option<String>,
    #[serde(rename = "votingDate", default)]
    pub voting_date: Option<String>,
    #[serde(rename = "fileName", default)]
    pub file_name: Option<String>,
}

/// Where sessions are kept.
pub trait SessionStore {
    /// The saved session, if there is one.
    fn load(&self) -> Result<Option<SessionSnapshot>, StoreError>;
    fn save(&self, snapshot: &SessionSnapshot) -> Result<(), StoreError>;
    /// Forgets the saved session. Clearing an empty store is not an error.
    fn clear(&self) -> Result<(), StoreError>;
}

/// Keeps the session as one JSON document on disk.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> JsonFileStore {
        JsonFileStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn path_str(&self) -> String {
        self.path.display().to_string()
    }
}

impl SessionStore for JsonFileStore {
    fn load(&self) -> Result<Option<SessionSnapshot>, StoreError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("JsonFileStore::load: no session at {:?}", self.path);
                return Ok(None);
            }
            Err(source) => {
                return Err(StoreError::ReadSession {
                    source,
                    path: self.path_str(),
                })
            }
        };
        let snapshot: SessionSnapshot =
            serde_json::from_str(&contents).context(DecodeSessionSnafu {
                path: self.path_str(),
            })?;
        info!(
            "JsonFileStore::load: {} rows, {} unions from {:?}",
            snapshot.rows.len(),
            snapshot.unions.len(),
            self.path
        );
        Ok(Some(snapshot))
    }

    fn save(&self, snapshot: &SessionSnapshot) -> Result<(), StoreError> {
        let js = serde_json::to_string_pretty(snapshot).context(EncodeSessionSnafu {})?;
        fs::write(&self.path, js).context(WriteSessionSnafu {
            path: self.path_str(),
        })?;
        info!("JsonFileStore::save: session written to {:?}", self.path);
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::RemoveSession {
                source,
                path: self.path_str(),
            }),
        }
    }
}

/// Keeps the session in memory, for tests and short-lived tools.
#[derive(Debug, Default)]
pub struct MemoryStore {
    slot: Mutex<Option<SessionSnapshot>>,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<SessionSnapshot>> {
        // The slot only ever holds a complete snapshot, so a poisoned lock is still usable.
        self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl SessionStore for MemoryStore {
    fn load(&self) -> Result<Option<SessionSnapshot>, StoreError> {
        Ok(self.slot().clone())
    }

    fn save(&self, snapshot: &SessionSnapshot) -> Result<(), StoreError> {
        *self.slot() = Some(snapshot.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        *self.slot() = None;
        Ok(())
    }
}
