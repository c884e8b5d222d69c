/*
 * Messages exchanged between the background content-search worker and the
 * command layer. A search streams `ContentSearchProgress` batches; the last one
 * carries `is_final = true` and the total number of files looked at.
 */
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentSearchMatch {
    pub path: PathBuf,
    // 1-based line of the first occurrence.
    pub line_number: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ContentSearchProgress {
    pub is_final: bool,
    pub files_scanned: usize,
    pub results: Vec<ContentSearchMatch>,
}
