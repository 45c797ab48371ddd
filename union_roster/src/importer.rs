//! Asynchronous file import.
//!
//! Decoding runs on the blocking thread pool of tokio. The [`Importer`] hands
//! out a generation ticket per import so that the result of an import which
//! was overtaken by a newer one is thrown away instead of being loaded.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use log::{info, warn};
use snafu::prelude::*;

use crate::config::Table;
use crate::parser::*;

/// Parses a buffer on a blocking worker, with the default column patterns.
pub async fn parse(buffer: Vec<u8>, extension: &str) -> ParseResult<Table> {
    parse_with(Arc::new(TabularParser::default()), buffer, extension).await
}

async fn parse_with(
    parser: Arc<TabularParser>,
    buffer: Vec<u8>,
    extension: &str,
) -> ParseResult<Table> {
    let format = SourceFormat::from_extension(extension)?;
    tokio::task::spawn_blocking(move || parser.parse_format(&buffer, format))
        .await
        .context(InterruptedSnafu {})?
}

/// A file that was fully decoded by the latest import.
#[derive(PartialEq, Debug, Clone)]
pub struct ImportedFile {
    pub file_name: String,
    pub table: Table,
}

#[derive(PartialEq, Debug, Clone)]
pub enum ImportOutcome {
    Loaded(ImportedFile),
    /// A newer import started (or the import was cancelled) while this one
    /// was running. Its result was discarded.
    Superseded,
}

/// Identifies one import. Only the ticket of the latest import is current.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub struct ImportTicket(u64);

#[derive(Debug, Default)]
pub struct Importer {
    generation: AtomicU64,
    parser: Arc<TabularParser>,
}

impl Importer {
    pub fn new(parser: TabularParser) -> Importer {
        Importer {
            generation: AtomicU64::new(0),
            parser: Arc::new(parser),
        }
    }

    pub fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Starts a new import, which makes every earlier ticket stale.
    pub fn begin(&self) -> ImportTicket {
        ImportTicket(self.generation.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn is_current(&self, ticket: ImportTicket) -> bool {
        self.current_generation() == ticket.0
    }

    /// Makes the in-flight import, if any, come back as superseded.
    pub fn cancel(&self) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst);
        info!("Importer::cancel: generation {} cancelled", generation);
    }

    /// Decodes a buffer. The format comes from the extension of `file_name`.
    pub async fn import_bytes(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> ParseResult<ImportOutcome> {
        let ticket = self.begin();
        info!("import_bytes: {:?} ({} bytes), ticket {:?}", file_name, bytes.len(), ticket);
        let extension = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        let res = parse_with(self.parser.clone(), bytes, extension).await;
        self.finish(ticket, file_name, res)
    }

    /// Reads and decodes a file.
    pub async fn import_path(&self, path: &Path) -> ParseResult<ImportOutcome> {
        let ticket = self.begin();
        info!("import_path: {:?}, ticket {:?}", path, ticket);
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        let res = match tokio::fs::read(path).await {
            Ok(bytes) => parse_with(self.parser.clone(), bytes, extension).await,
            Err(source) => Err(ParseError::ReadFile {
                source,
                path: path.display().to_string(),
            }),
        };
        self.finish(ticket, &file_name, res)
    }

    // Failures of a stale import are dropped along with its result.
    fn finish(
        &self,
        ticket: ImportTicket,
        file_name: &str,
        res: ParseResult<Table>,
    ) -> ParseResult<ImportOutcome> {
        if !self.is_current(ticket) {
            warn!(
                "import of {:?} superseded (ticket {:?}, current generation {}), discarding",
                file_name,
                ticket,
                self.current_generation()
            );
            return Ok(ImportOutcome::Superseded);
        }
        let table = res?;
        info!("import of {:?}: {} rows", file_name, table.len());
        Ok(ImportOutcome::Loaded(ImportedFile {
            file_name: file_name.to_string(),
            table,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CellValue;
    use std::path::PathBuf;

    fn fixture(name: &str) -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("../tests/data")
            .join(name)
    }

    #[tokio::test]
    async fn parse_in_background() {
        let table = parse(b"a;b\n1;2\n".to_vec(), "CSV").await.unwrap();
        assert_eq!(table.headers, vec!["a", "b"]);
        let err = parse(b"".to_vec(), "txt").await.unwrap_err();
        assert_eq!(err.kind(), ParseErrorKind::UnsupportedFormat);
    }

    #[tokio::test]
    async fn loads_latest_import() {
        let importer = Importer::default();
        let outcome = importer
            .import_bytes("lista.json", br#"[{"Nombre": "Ana"}]"#.to_vec())
            .await
            .unwrap();
        match outcome {
            ImportOutcome::Loaded(file) => {
                assert_eq!(file.file_name, "lista.json");
                assert_eq!(file.table.rows[0]["Nombre"], CellValue::from("Ana"));
            }
            ImportOutcome::Superseded => panic!("import should not be superseded"),
        }
        assert_eq!(importer.current_generation(), 1);
    }

    #[test]
    fn newer_tickets_win() {
        let importer = Importer::default();
        let first = importer.begin();
        assert!(importer.is_current(first));
        let second = importer.begin();
        assert!(!importer.is_current(first));
        assert!(importer.is_current(second));
        let outcome = importer.finish(first, "old.csv", Ok(Table::default())).unwrap();
        assert_eq!(outcome, ImportOutcome::Superseded);
        importer.cancel();
        assert!(!importer.is_current(second));
    }

    #[test]
    fn stale_failures_are_dropped() {
        let importer = Importer::default();
        let ticket = importer.begin();
        importer.cancel();
        let err = SourceFormat::from_extension("txt").map(|_| Table::default());
        assert_eq!(
            importer.finish(ticket, "x.txt", err).unwrap(),
            ImportOutcome::Superseded
        );
    }

    #[tokio::test]
    async fn concurrent_imports_keep_the_last_one() {
        let importer = Importer::default();
        let (first, second) = tokio::join!(
            importer.import_bytes("a.csv", b"x\n1\n".to_vec()),
            importer.import_bytes("b.csv", b"y\n2\n".to_vec())
        );
        let first = first.unwrap();
        assert!(matches!(
            first,
            ImportOutcome::Superseded | ImportOutcome::Loaded(_)
        ));
        match second.unwrap() {
            ImportOutcome::Loaded(file) => assert_eq!(file.table.headers, vec!["y"]),
            ImportOutcome::Superseded => panic!("the last import must be loaded"),
        }
    }

    #[tokio::test]
    async fn import_fixture_path() {
        let importer = Importer::default();
        match importer.import_path(&fixture("candidatos.csv")).await.unwrap() {
            ImportOutcome::Loaded(file) => {
                assert_eq!(file.file_name, "candidatos.csv");
                assert!(!file.table.is_empty());
            }
            ImportOutcome::Superseded => panic!("import should not be superseded"),
        }
        let err = importer
            .import_path(&fixture("missing.csv"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ParseErrorKind::IoFailure);
    }
}
