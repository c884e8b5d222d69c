use crate::core::content_search_progress::{ContentSearchMatch, ContentSearchProgress};
use crate::core::file_inspector;
use crate::core::scan_worker::CancellationToken;
use ignore::WalkBuilder;
use std::fs;
use std::path::{Path, PathBuf};

/*
 * Recursive, case-insensitive search for a term inside file contents. The walk
 * honours ignore files and skips hidden entries, the same way a project tree is
 * usually browsed. Files above 1 MiB, files whose guessed MIME type is known and
 * not text-like, and unreadable files are skipped. Results are produced in path
 * order and capped at `limit`.
 */

pub const DEFAULT_RESULT_LIMIT: usize = 20;
pub const MAX_SEARCHABLE_FILE_BYTES: u64 = 1024 * 1024;
const PROGRESS_INTERVAL: usize = 50;

#[derive(Debug)]
pub enum SearchError {
    EmptyTerm,
    InvalidRoot(PathBuf),
    InvalidGlob(glob::PatternError),
}

impl std::fmt::Display for SearchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SearchError::EmptyTerm => write!(f, "Search term must not be empty"),
            SearchError::InvalidRoot(p) => write!(f, "Not a directory: {}", p.display()),
            SearchError::InvalidGlob(e) => write!(f, "Invalid file pattern: {e}"),
        }
    }
}

impl std::error::Error for SearchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SearchError::InvalidGlob(e) => Some(e),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, SearchError>;

#[derive(Debug, Clone)]
pub struct ContentSearchRequest {
    pub term: String,
    pub root: PathBuf,
    pub file_glob: Option<String>,
    pub limit: usize,
}

impl ContentSearchRequest {
    pub fn new(term: &str, root: &Path) -> Self {
        ContentSearchRequest {
            term: term.to_string(),
            root: root.to_path_buf(),
            file_glob: None,
            limit: DEFAULT_RESULT_LIMIT,
        }
    }

    pub fn with_glob(mut self, file_glob: Option<&str>) -> Self {
        self.file_glob = file_glob.map(str::to_string);
        self
    }
}

/// Rejects an empty term, a root that is not a directory, or a malformed glob.
pub fn validate(request: &ContentSearchRequest) -> Result<Option<glob::Pattern>> {
    if request.term.trim().is_empty() {
        return Err(SearchError::EmptyTerm);
    }
    if !request.root.is_dir() {
        return Err(SearchError::InvalidRoot(request.root.clone()));
    }
    request
        .file_glob
        .as_deref()
        .map(glob::Pattern::new)
        .transpose()
        .map_err(SearchError::InvalidGlob)
}

pub trait ContentSearcherOperations: Send + Sync {
    /*
     * Runs the search, calling `progress` with batches as matches are found and
     * once more with a final batch. Checks `cancel` before every file; a
     * cancelled search still ends with a final batch holding what was found.
     */
    fn search(
        &self,
        request: &ContentSearchRequest,
        cancel: &CancellationToken,
        progress: &mut dyn FnMut(ContentSearchProgress),
    ) -> Result<Vec<ContentSearchMatch>>;
}

pub struct CoreContentSearcher {}

impl CoreContentSearcher {
    pub fn new() -> Self {
        CoreContentSearcher {}
    }
}

impl Default for CoreContentSearcher {
    fn default() -> Self {
        Self::new()
    }
}

fn glob_accepts(pattern: Option<&glob::Pattern>, root: &Path, path: &Path) -> bool {
    let Some(pattern) = pattern else {
        return true;
    };
    let by_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|name| pattern.matches(name));
    by_name
        || path
            .strip_prefix(root)
            .is_ok_and(|relative| pattern.matches_path(relative))
}

// Returns the 1-based line of the first case-insensitive occurrence.
fn first_match_line(path: &Path, needle: &str) -> Option<usize> {
    let metadata = fs::metadata(path).ok()?;
    if metadata.len() > MAX_SEARCHABLE_FILE_BYTES {
        return None;
    }
    if let Some(mime) = file_inspector::guess_mime(path) {
        if !file_inspector::is_text_like(&mime) {
            return None;
        }
    }
    let bytes = fs::read(path).ok()?;
    let haystack = String::from_utf8_lossy(&bytes).to_lowercase();
    let offset = haystack.find(needle)?;
    Some(haystack[..offset].matches('\n').count() + 1)
}

impl ContentSearcherOperations for CoreContentSearcher {
    fn search(
        &self,
        request: &ContentSearchRequest,
        cancel: &CancellationToken,
        progress: &mut dyn FnMut(ContentSearchProgress),
    ) -> Result<Vec<ContentSearchMatch>> {
        let pattern = validate(request)?;
        let needle = request.term.to_lowercase();
        log::debug!(
            "ContentSearch: Searching {:?} for '{}' (glob: {:?}).",
            request.root,
            request.term,
            request.file_glob
        );

        let walker = WalkBuilder::new(&request.root)
            .standard_filters(true)
            .parents(true)
            .git_global(false)
            .hidden(true)
            .sort_by_file_path(|a, b| a.cmp(b))
            .build();

        let mut results: Vec<ContentSearchMatch> = Vec::new();
        let mut files_scanned = 0;

        for entry_result in walker {
            if cancel.is_cancelled() {
                log::debug!("ContentSearch: Cancelled after {files_scanned} files.");
                break;
            }
            let entry = match entry_result {
                Ok(entry) => entry,
                Err(e) => {
                    log::debug!("ContentSearch: Skipping unreadable entry: {e}");
                    continue;
                }
            };
            if !entry.file_type().is_some_and(|ft| ft.is_file()) {
                continue;
            }
            let path = entry.path();
            if !glob_accepts(pattern.as_ref(), &request.root, path) {
                continue;
            }

            files_scanned += 1;
            if let Some(line_number) = first_match_line(path, &needle) {
                let found = ContentSearchMatch {
                    path: path.to_path_buf(),
                    line_number,
                };
                results.push(found.clone());
                progress(ContentSearchProgress {
                    is_final: false,
                    files_scanned,
                    results: vec![found],
                });
                if results.len() >= request.limit {
                    break;
                }
            } else if files_scanned % PROGRESS_INTERVAL == 0 {
                progress(ContentSearchProgress {
                    is_final: false,
                    files_scanned,
                    results: Vec::new(),
                });
            }
        }

        progress(ContentSearchProgress {
            is_final: true,
            files_scanned,
            results: Vec::new(),
        });
        log::debug!(
            "ContentSearch: {} matches in {files_scanned} files.",
            results.len()
        );
        Ok(results)
    }
}
