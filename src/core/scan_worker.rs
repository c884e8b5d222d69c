/*
 * Runs long scans (shell-history extraction, recursive content search) on a
 * worker thread so the caller stays responsive. Each spawn returns a
 * `ScanHandle` owning the cancellation token, the message receiver and the
 * thread handle. There is no timeout: a scan ends when it completes or when the
 * caller cancels it, and workers check the token at every file boundary.
 */
use crate::core::content_search::{
    self, ContentSearchRequest, ContentSearcherOperations, SearchError,
};
use crate::core::content_search_progress::ContentSearchProgress;
use crate::core::shell_history::ShellHistoryOperations;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::thread::{self, JoinHandle};

#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

pub struct ScanHandle<M> {
    cancel: CancellationToken,
    receiver: Receiver<M>,
    handle: JoinHandle<()>,
}

impl<M> ScanHandle<M> {
    #[cfg(test)]
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    #[cfg(test)]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Blocks until the worker exits and returns every message it sent.
    pub fn wait(self) -> Vec<M> {
        let messages: Vec<M> = self.receiver.iter().collect();
        if self.handle.join().is_err() {
            log::error!("ScanWorker: Worker thread panicked.");
        }
        messages
    }
}

fn spawn_worker<M, F>(name: &str, work: F) -> std::io::Result<ScanHandle<M>>
where
    M: Send + 'static,
    F: FnOnce(mpsc::Sender<M>, CancellationToken) + Send + 'static,
{
    let (sender, receiver) = mpsc::channel();
    let cancel = CancellationToken::new();
    let worker_cancel = cancel.clone();
    let handle = thread::Builder::new()
        .name(name.to_string())
        .spawn(move || work(sender, worker_cancel))?;
    Ok(ScanHandle {
        cancel,
        receiver,
        handle,
    })
}

/*
 * Extracts shell-history candidates in the background. The worker sends exactly
 * one message with the (possibly partial, if cancelled) candidate list.
 */
pub fn spawn_shell_history_scan(
    extractor: Arc<dyn ShellHistoryOperations>,
    count: Option<usize>,
) -> std::io::Result<ScanHandle<Vec<PathBuf>>> {
    spawn_worker("clipbard-history-scan", move |sender, cancel| {
        let files = extractor.extract_files(count, &cancel);
        log::debug!("ScanWorker: History scan produced {} files.", files.len());
        if sender.send(files).is_err() {
            log::debug!("ScanWorker: History scan result dropped; receiver gone.");
        }
    })
}

#[derive(Debug)]
pub enum SpawnError {
    Search(SearchError),
    Thread(std::io::Error),
}

impl std::fmt::Display for SpawnError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SpawnError::Search(e) => write!(f, "{e}"),
            SpawnError::Thread(e) => write!(f, "Could not start background scan: {e}"),
        }
    }
}

impl std::error::Error for SpawnError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SpawnError::Search(e) => Some(e),
            SpawnError::Thread(e) => Some(e),
        }
    }
}

/*
 * Validates `request` up front, so malformed input is rejected before any
 * thread starts, then streams `ContentSearchProgress` batches from the worker.
 */
pub fn spawn_content_search(
    searcher: Arc<dyn ContentSearcherOperations>,
    request: ContentSearchRequest,
) -> Result<ScanHandle<ContentSearchProgress>, SpawnError> {
    content_search::validate(&request).map_err(SpawnError::Search)?;
    spawn_worker("clipbard-content-search", move |sender, cancel| {
        let mut emit = |batch: ContentSearchProgress| {
            if sender.send(batch).is_err() {
                // Nobody is listening any more; stop scanning.
                cancel.cancel();
            }
        };
        if let Err(e) = searcher.search(&request, &cancel, &mut emit) {
            log::warn!("ScanWorker: Content search failed: {e}");
            emit(ContentSearchProgress {
                is_final: true,
                ..ContentSearchProgress::default()
            });
        }
    })
    .map_err(SpawnError::Thread)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::content_search::CoreContentSearcher;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::tempdir;

    struct BlockingExtractor {
        observed_cancel: Arc<Mutex<bool>>,
    }

    impl ShellHistoryOperations for BlockingExtractor {
        fn extract_files(&self, _count: Option<usize>, cancel: &CancellationToken) -> Vec<PathBuf> {
            while !cancel.is_cancelled() {
                thread::sleep(std::time::Duration::from_millis(5));
            }
            *self.observed_cancel.lock().unwrap() = true;
            vec![PathBuf::from("/partial.txt")]
        }
    }

    struct FixedExtractor;

    impl ShellHistoryOperations for FixedExtractor {
        fn extract_files(&self, count: Option<usize>, _cancel: &CancellationToken) -> Vec<PathBuf> {
            (0..count.unwrap_or(1))
                .map(|i| PathBuf::from(format!("/f{i}.txt")))
                .collect()
        }
    }

    #[test]
    fn test_token_is_shared_between_clones() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn test_history_scan_delivers_single_result() {
        let handle = spawn_shell_history_scan(Arc::new(FixedExtractor), Some(3)).unwrap();

        let messages = handle.wait();

        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].len(), 3);
    }

    #[test]
    fn test_history_scan_stops_only_when_cancelled() {
        let observed = Arc::new(Mutex::new(false));
        let handle = spawn_shell_history_scan(
            Arc::new(BlockingExtractor {
                observed_cancel: observed.clone(),
            }),
            None,
        )
        .unwrap();

        thread::sleep(std::time::Duration::from_millis(30));
        assert!(!handle.is_finished());
        handle.cancel();
        let messages = handle.wait();

        assert!(*observed.lock().unwrap());
        assert_eq!(messages, vec![vec![PathBuf::from("/partial.txt")]]);
    }

    #[test]
    fn test_content_search_streams_until_final_batch() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "needle here").unwrap();
        fs::write(dir.path().join("b.txt"), "nothing").unwrap();

        let handle = spawn_content_search(
            Arc::new(CoreContentSearcher::new()),
            ContentSearchRequest::new("NEEDLE", dir.path()),
        )
        .unwrap();
        let batches = handle.wait();

        assert!(batches.last().unwrap().is_final);
        let found: Vec<PathBuf> = batches
            .iter()
            .flat_map(|b| b.results.iter().map(|m| m.path.clone()))
            .collect();
        assert_eq!(found, vec![dir.path().join("a.txt")]);
    }

    #[test]
    fn test_content_search_rejects_bad_request_before_spawning() {
        let dir = tempdir().unwrap();
        let result = spawn_content_search(
            Arc::new(CoreContentSearcher::new()),
            ContentSearchRequest::new("   ", dir.path()),
        );
        assert!(matches!(
            result,
            Err(SpawnError::Search(SearchError::EmptyTerm))
        ));
    }
}
