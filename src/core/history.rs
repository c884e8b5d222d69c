/*
 * The history ledger: a bounded, deduplicated, most-recent-first list of file
 * paths that were successfully copied to the clipboard. It is persisted as a
 * plain text file with one path per line, index 0 (the top line) being the most
 * recent entry.
 *
 * Paths are compared by their exact string form; no canonicalization happens
 * beyond what the caller passes in. Every operation reads the persisted file
 * afresh, and there is no cross-process locking, so two concurrent writers race
 * with last-writer-wins semantics.
 */
use crate::core::config::Config;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug)]
pub enum HistoryError {
    Io(io::Error),
}

impl From<io::Error> for HistoryError {
    fn from(err: io::Error) -> Self {
        HistoryError::Io(err)
    }
}

impl std::fmt::Display for HistoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HistoryError::Io(e) => write!(f, "History I/O error: {e}"),
        }
    }
}

impl std::error::Error for HistoryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            HistoryError::Io(e) => Some(e),
        }
    }
}

pub type Result<T> = std::result::Result<T, HistoryError>;

/*
 * Operations on the ledger. The clipboard transfer only ever calls `add`, but
 * the presentation layer uses the read side, so all of it lives behind one trait
 * that tests can mock.
 */
pub trait HistoryOperations: Send + Sync {
    /*
     * Moves `path` to the front of the ledger, inserting it if absent, and
     * truncates the ledger to the configured `history_size`. A path that does
     * not exist on disk is ignored (returns `Ok(false)`).
     */
    fn add(&self, path: &Path) -> Result<bool>;

    /// Up to `count` entries from the front (default: `display_count`). Stale paths included.
    fn get(&self, count: Option<usize>) -> Vec<String>;

    /// Case-insensitive substring search over the whole ledger, in ledger order.
    fn search(&self, term: &str, count: Option<usize>) -> Vec<String>;

    fn clear(&self) -> Result<()>;
}

pub struct HistoryLedger {
    history_file: PathBuf,
    config: Arc<Config>,
}

impl HistoryLedger {
    pub fn new(history_file: &Path, config: Arc<Config>) -> Self {
        HistoryLedger {
            history_file: history_file.to_path_buf(),
            config,
        }
    }

    #[cfg(test)]
    pub fn history_file(&self) -> &Path {
        &self.history_file
    }

    fn load_all(&self) -> Vec<String> {
        match fs::read_to_string(&self.history_file) {
            Ok(contents) => contents
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                log::warn!(
                    "HistoryLedger: Could not read {:?}: {e}. Treating as empty.",
                    self.history_file
                );
                Vec::new()
            }
        }
    }

    fn store_all(&self, entries: &[String]) -> Result<()> {
        if let Some(parent) = self.history_file.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.history_file, entries.join("\n"))?;
        Ok(())
    }
}

impl HistoryOperations for HistoryLedger {
    fn add(&self, path: &Path) -> Result<bool> {
        if !path.exists() {
            log::debug!("HistoryLedger: Ignoring {path:?}; it does not exist.");
            return Ok(false);
        }

        let entry = path.to_string_lossy().into_owned();
        let mut entries = self.load_all();
        entries.retain(|existing| *existing != entry);
        entries.insert(0, entry);
        entries.truncate(self.config.history_size());

        self.store_all(&entries)?;
        log::debug!(
            "HistoryLedger: Recorded {path:?}; ledger now holds {} entries.",
            entries.len()
        );
        Ok(true)
    }

    fn get(&self, count: Option<usize>) -> Vec<String> {
        let count = count.unwrap_or_else(|| self.config.display_count());
        let mut entries = self.load_all();
        entries.truncate(count);
        entries
    }

    fn search(&self, term: &str, count: Option<usize>) -> Vec<String> {
        let count = count.unwrap_or_else(|| self.config.display_count());
        let needle = term.to_lowercase();
        self.load_all()
            .into_iter()
            .filter(|entry| entry.to_lowercase().contains(&needle))
            .take(count)
            .collect()
    }

    fn clear(&self) -> Result<()> {
        self.store_all(&[])?;
        log::info!("HistoryLedger: Cleared {:?}.", self.history_file);
        Ok(())
    }
}
