/*
 * ClipboardTransfer moves file content and literal text onto the platform
 * clipboard and back. It owns the policy around a copy: the size gate, optional
 * gzip compression of large files, optional reversible obfuscation, recording
 * successful file copies in the history ledger, notifications and scheduling
 * the auto-clear.
 *
 * Failures are reported as `TransferError` values and are never fatal. A copy
 * that fails leaves the ledger untouched.
 */
use crate::core::auto_clear::AutoClearScheduler;
use crate::core::clipboard_backend::{ClipboardBackendOperations, ClipboardError};
use crate::core::config::Config;
use crate::core::history::HistoryOperations;
use crate::core::models::ClipboardBuffer;
use crate::core::notifier::{APP_TITLE, NotifierOperations};
use crate::core::obfuscation;
use flate2::Compression;
use flate2::write::GzEncoder;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const BYTES_PER_MB: u64 = 1024 * 1024;
// Files above 0.1 MiB are compressed when compression is enabled.
pub const COMPRESSION_THRESHOLD_BYTES: u64 = BYTES_PER_MB / 10;

#[derive(Debug)]
pub enum TransferError {
    NotFound(PathBuf),
    NotAFile(PathBuf),
    TooLarge { size: u64, limit: u64 },
    Io(io::Error),
    NoBackend,
    Backend(String),
}

impl From<io::Error> for TransferError {
    fn from(err: io::Error) -> Self {
        TransferError::Io(err)
    }
}

impl From<ClipboardError> for TransferError {
    fn from(err: ClipboardError) -> Self {
        match err {
            ClipboardError::NoBackend => TransferError::NoBackend,
            other => TransferError::Backend(other.to_string()),
        }
    }
}

impl std::fmt::Display for TransferError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransferError::NotFound(p) => write!(f, "File not found: {}", p.display()),
            TransferError::NotAFile(p) => write!(f, "Not a regular file: {}", p.display()),
            TransferError::TooLarge { size, limit } => write!(
                f,
                "File too large: {size} bytes exceeds the {limit} byte limit"
            ),
            TransferError::Io(e) => write!(f, "I/O error: {e}"),
            TransferError::NoBackend => write!(f, "No clipboard utility found"),
            TransferError::Backend(reason) => write!(f, "{reason}"),
        }
    }
}

impl std::error::Error for TransferError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TransferError::Io(e) => Some(e),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, TransferError>;

pub trait ClipboardTransferOperations: Send + Sync {
    /*
     * Copies the content of the file at `path`. The file must exist, be a
     * regular file, and be no larger than `clipboard.max_file_size` MiB. On
     * success the original path is recorded in the history ledger.
     */
    fn copy_file(&self, path: &Path, buffer: Option<ClipboardBuffer>) -> Result<()>;

    fn copy_text(&self, text: &str, buffer: Option<ClipboardBuffer>) -> Result<()>;

    /// Current clipboard text, de-obfuscated when enabled. Empty on any failure.
    fn clipboard_content(&self, buffer: Option<ClipboardBuffer>) -> String;

    fn clear_clipboard(&self, buffer: Option<ClipboardBuffer>) -> Result<()>;

    /// Returns false when notifications are disabled or the platform call fails.
    fn show_notification(&self, title: &str, message: &str) -> bool;
}

// Removes the compressed scratch copy once the transfer is over, whatever its outcome.
struct ScratchFile {
    path: PathBuf,
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            if e.kind() != io::ErrorKind::NotFound {
                log::warn!(
                    "ClipboardTransfer: Could not remove scratch file {:?}: {e}",
                    self.path
                );
            }
        }
    }
}

pub struct CoreClipboardTransfer {
    config: Arc<Config>,
    history: Arc<dyn HistoryOperations>,
    backend: Arc<dyn ClipboardBackendOperations>,
    notifier: Box<dyn NotifierOperations>,
    scratch_dir: PathBuf,
    scheduler: AutoClearScheduler,
}

impl CoreClipboardTransfer {
    pub fn new(
        config: Arc<Config>,
        history: Arc<dyn HistoryOperations>,
        backend: Arc<dyn ClipboardBackendOperations>,
        notifier: Box<dyn NotifierOperations>,
        scratch_dir: &Path,
    ) -> Self {
        CoreClipboardTransfer {
            config,
            history,
            backend,
            notifier,
            scratch_dir: scratch_dir.to_path_buf(),
            scheduler: AutoClearScheduler::new(),
        }
    }

    #[cfg(test)]
    pub fn with_scheduler(mut self, scheduler: AutoClearScheduler) -> Self {
        self.scheduler = scheduler;
        self
    }

    #[cfg(test)]
    pub fn pending_clears(&self) -> usize {
        self.scheduler.pending_count()
    }

    #[cfg(test)]
    pub fn cancel_pending_clears(&self) -> usize {
        self.scheduler.cancel_pending_clears()
    }

    fn resolve_buffer(&self, buffer: Option<ClipboardBuffer>) -> ClipboardBuffer {
        buffer.unwrap_or_else(|| self.config.default_buffer())
    }

    /*
     * Gzips `path` into the scratch directory and returns the guard for the
     * scratch file together with the compressed bytes.
     */
    fn compress_to_scratch(&self, path: &Path) -> io::Result<(ScratchFile, Vec<u8>)> {
        fs::create_dir_all(&self.scratch_dir)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "clipboard".to_string());
        let scratch = ScratchFile {
            path: self.scratch_dir.join(format!("{name}.gz")),
        };

        let mut reader = BufReader::new(File::open(path)?);
        let mut encoder = GzEncoder::new(
            BufWriter::new(File::create(&scratch.path)?),
            Compression::default(),
        );
        io::copy(&mut reader, &mut encoder)?;
        encoder.finish()?.flush()?;

        let bytes = fs::read(&scratch.path)?;
        Ok((scratch, bytes))
    }

    fn prepare_payload(&self, content: Vec<u8>) -> Vec<u8> {
        if self.config.obfuscation_enabled() {
            obfuscation::encode(&content).into_bytes()
        } else {
            content
        }
    }

    fn after_successful_copy(&self, buffer: ClipboardBuffer, message: &str) {
        if self.config.auto_clear() {
            self.scheduler.schedule(Arc::clone(&self.backend), buffer);
        }
        self.show_notification(APP_TITLE, message);
    }
}

impl ClipboardTransferOperations for CoreClipboardTransfer {
    fn copy_file(&self, path: &Path, buffer: Option<ClipboardBuffer>) -> Result<()> {
        let buffer = self.resolve_buffer(buffer);
        let metadata = fs::metadata(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => TransferError::NotFound(path.to_path_buf()),
            _ => TransferError::Io(e),
        })?;
        if !metadata.is_file() {
            return Err(TransferError::NotAFile(path.to_path_buf()));
        }

        let size = metadata.len();
        let limit = self.config.max_file_size_mb().saturating_mul(BYTES_PER_MB);
        if size > limit {
            log::info!("ClipboardTransfer: Rejecting {path:?}: {size} bytes > {limit} limit.");
            return Err(TransferError::TooLarge { size, limit });
        }

        let mut _scratch = None;
        let content = if self.config.compression_enabled() && size > COMPRESSION_THRESHOLD_BYTES {
            match self.compress_to_scratch(path) {
                Ok((scratch, bytes)) => {
                    log::debug!(
                        "ClipboardTransfer: Compressed {path:?} from {size} to {} bytes.",
                        bytes.len()
                    );
                    _scratch = Some(scratch);
                    bytes
                }
                Err(e) => {
                    log::warn!(
                        "ClipboardTransfer: Compression of {path:?} failed ({e}); sending raw content."
                    );
                    fs::read(path)?
                }
            }
        } else {
            fs::read(path)?
        };

        let payload = self.prepare_payload(content);
        self.backend.write(&payload)?;
        log::debug!(
            "ClipboardTransfer: Copied {path:?} ({} bytes) to buffer {buffer} via {}.",
            payload.len(),
            self.backend.kind().as_str()
        );

        if let Err(e) = self.history.add(path) {
            log::warn!("ClipboardTransfer: Copied {path:?} but could not record it: {e}");
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        self.after_successful_copy(buffer, &format!("Copied: {name}"));
        Ok(())
    }

    fn copy_text(&self, text: &str, buffer: Option<ClipboardBuffer>) -> Result<()> {
        let buffer = self.resolve_buffer(buffer);
        let payload = self.prepare_payload(text.as_bytes().to_vec());
        self.backend.write(&payload)?;
        log::debug!(
            "ClipboardTransfer: Copied {} bytes of text to buffer {buffer}.",
            payload.len()
        );
        self.after_successful_copy(buffer, "Text copied to clipboard");
        Ok(())
    }

    fn clipboard_content(&self, buffer: Option<ClipboardBuffer>) -> String {
        let buffer = self.resolve_buffer(buffer);
        match self.backend.read() {
            Ok(content) if self.config.obfuscation_enabled() => obfuscation::reveal(content),
            Ok(content) => content,
            Err(e) => {
                log::warn!("ClipboardTransfer: Could not read buffer {buffer}: {e}");
                String::new()
            }
        }
    }

    fn clear_clipboard(&self, buffer: Option<ClipboardBuffer>) -> Result<()> {
        let buffer = self.resolve_buffer(buffer);
        self.backend.clear()?;
        log::debug!("ClipboardTransfer: Cleared buffer {buffer}.");
        Ok(())
    }

    fn show_notification(&self, title: &str, message: &str) -> bool {
        if !self.config.notifications_enabled() {
            return false;
        }
        match self.notifier.notify(title, message) {
            Ok(()) => true,
            Err(e) => {
                log::debug!("ClipboardTransfer: Notification not shown: {e}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clipboard_backend::{BackendKind, Result as ClipboardResult};
    use crate::core::config::tests::config_with;
    use crate::core::config::{
        KEY_AUTO_CLEAR, KEY_COMPRESSION, KEY_ENCRYPTION, KEY_MAX_FILE_SIZE, KEY_NOTIFICATION,
        SECTION_CLIPBOARD, SECTION_SECURITY,
    };
    use crate::core::history::HistoryLedger;
    use crate::core::notifier::Result as NotifyResult;
    use flate2::read::GzDecoder;
    use std::io::Read;
    use std::sync::Mutex;
    use std::time::{Duration, Instant};
    use tempfile::{TempDir, tempdir};

    #[derive(Default)]
    struct MockBackend {
        writes: Mutex<Vec<Vec<u8>>>,
        clears: Mutex<usize>,
        content: Mutex<Option<String>>,
        fail: bool,
    }

    impl ClipboardBackendOperations for MockBackend {
        fn kind(&self) -> BackendKind {
            BackendKind::None
        }
        fn write(&self, content: &[u8]) -> ClipboardResult<()> {
            if self.fail {
                return Err(ClipboardError::Platform("tool crashed".to_string()));
            }
            self.writes.lock().unwrap().push(content.to_vec());
            Ok(())
        }
        fn read(&self) -> ClipboardResult<String> {
            self.content
                .lock()
                .unwrap()
                .clone()
                .ok_or(ClipboardError::NoBackend)
        }
        fn clear(&self) -> ClipboardResult<()> {
            *self.clears.lock().unwrap() += 1;
            Ok(())
        }
    }

    #[derive(Default)]
    struct MockNotifier {
        shown: Arc<Mutex<Vec<(String, String)>>>,
    }

    impl NotifierOperations for MockNotifier {
        fn notify(&self, title: &str, message: &str) -> NotifyResult<()> {
            self.shown
                .lock()
                .unwrap()
                .push((title.to_string(), message.to_string()));
            Ok(())
        }
    }

    struct Fixture {
        dir: TempDir,
        backend: Arc<MockBackend>,
        history: Arc<HistoryLedger>,
        shown: Arc<Mutex<Vec<(String, String)>>>,
        transfer: CoreClipboardTransfer,
    }

    impl Fixture {
        fn new(overrides: &[(&str, &str, &str)]) -> Self {
            Self::with_backend(overrides, MockBackend::default())
        }

        fn with_backend(overrides: &[(&str, &str, &str)], backend: MockBackend) -> Self {
            let dir = tempdir().unwrap();
            let config = Arc::new(config_with(overrides));
            let history = Arc::new(HistoryLedger::new(
                &dir.path().join("history"),
                Arc::clone(&config),
            ));
            let backend = Arc::new(backend);
            let notifier = MockNotifier::default();
            let shown = Arc::clone(&notifier.shown);
            let transfer = CoreClipboardTransfer::new(
                config,
                history.clone(),
                backend.clone(),
                Box::new(notifier),
                &dir.path().join("scratch"),
            )
            .with_scheduler(AutoClearScheduler::with_delay(Duration::from_millis(20)));
            Fixture {
                dir,
                backend,
                history,
                shown,
                transfer,
            }
        }

        fn file_of_len(&self, name: &str, len: u64) -> PathBuf {
            let path = self.dir.path().join(name);
            File::create(&path).unwrap().set_len(len).unwrap();
            path
        }

        fn file_with(&self, name: &str, content: &[u8]) -> PathBuf {
            let path = self.dir.path().join(name);
            fs::write(&path, content).unwrap();
            path
        }

        fn last_write(&self) -> Vec<u8> {
            self.backend.writes.lock().unwrap().last().cloned().unwrap()
        }
    }

    #[test]
    fn test_size_gate_boundary_is_inclusive() {
        let fx = Fixture::new(&[(SECTION_CLIPBOARD, KEY_MAX_FILE_SIZE, "1")]);
        let exact = fx.file_of_len("exact.txt", BYTES_PER_MB);
        let over = fx.file_of_len("over.txt", BYTES_PER_MB + 1);

        assert!(fx.transfer.copy_file(&exact, None).is_ok());
        match fx.transfer.copy_file(&over, None) {
            Err(TransferError::TooLarge { size, limit }) => {
                assert_eq!(size, BYTES_PER_MB + 1);
                assert_eq!(limit, BYTES_PER_MB);
            }
            other => panic!("expected TooLarge, got {other:?}"),
        }
        assert_eq!(fx.backend.writes.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_oversized_file_leaves_ledger_unchanged() {
        let fx = Fixture::new(&[(SECTION_CLIPBOARD, KEY_MAX_FILE_SIZE, "10")]);
        let big = fx.file_of_len("big.log", 15 * BYTES_PER_MB);

        let result = fx.transfer.copy_file(&big, None);

        assert!(matches!(result, Err(TransferError::TooLarge { .. })));
        assert!(fx.history.get(None).is_empty());
        assert!(fx.shown.lock().unwrap().is_empty());
    }

    #[test]
    fn test_copy_file_records_history_and_notifies() {
        let fx = Fixture::new(&[]);
        let path = fx.file_with("notes.md", b"# Notes\n");

        fx.transfer.copy_file(&path, None).unwrap();

        assert_eq!(fx.last_write(), b"# Notes\n");
        assert_eq!(fx.history.get(None), vec![path.to_string_lossy().into_owned()]);
        assert_eq!(
            fx.shown.lock().unwrap().as_slice(),
            &[("CLIPBARD".to_string(), "Copied: notes.md".to_string())]
        );
    }

    #[test]
    fn test_missing_and_directory_paths_are_rejected() {
        let fx = Fixture::new(&[]);

        let missing = fx.transfer.copy_file(&fx.dir.path().join("nope.txt"), None);
        assert!(matches!(missing, Err(TransferError::NotFound(_))));

        let dir = fx.transfer.copy_file(fx.dir.path(), None);
        assert!(matches!(dir, Err(TransferError::NotAFile(_))));

        assert!(fx.backend.writes.lock().unwrap().is_empty());
    }

    #[test]
    fn test_backend_failure_leaves_ledger_unchanged() {
        let fx = Fixture::with_backend(
            &[],
            MockBackend {
                fail: true,
                ..MockBackend::default()
            },
        );
        let path = fx.file_with("a.txt", b"a");

        let result = fx.transfer.copy_file(&path, None);

        assert!(matches!(result, Err(TransferError::Backend(_))));
        assert!(fx.history.get(None).is_empty());
        assert!(fx.shown.lock().unwrap().is_empty());
    }

    #[test]
    fn test_large_file_is_gzipped_and_scratch_removed() {
        let fx = Fixture::new(&[(SECTION_SECURITY, KEY_COMPRESSION, "true")]);
        let original: Vec<u8> = (0..200_000).map(|i| b"abcdefgh\n"[i % 9]).collect();
        let path = fx.file_with("big.txt", &original);

        fx.transfer.copy_file(&path, None).unwrap();

        let written = fx.last_write();
        assert_eq!(&written[..2], &[0x1f, 0x8b]);
        let mut decompressed = Vec::new();
        GzDecoder::new(written.as_slice())
            .read_to_end(&mut decompressed)
            .unwrap();
        assert_eq!(decompressed, original);

        let leftovers = fs::read_dir(fx.dir.path().join("scratch")).unwrap().count();
        assert_eq!(leftovers, 0);
        assert_eq!(fx.history.get(None), vec![path.to_string_lossy().into_owned()]);
    }

    #[test]
    fn test_small_file_is_not_compressed() {
        let fx = Fixture::new(&[(SECTION_SECURITY, KEY_COMPRESSION, "true")]);
        let path = fx.file_with("small.txt", b"tiny");

        fx.transfer.copy_file(&path, None).unwrap();

        assert_eq!(fx.last_write(), b"tiny");
    }

    #[test]
    fn test_obfuscation_wraps_and_reveals_content() {
        let fx = Fixture::new(&[(SECTION_SECURITY, KEY_ENCRYPTION, "true")]);

        fx.transfer.copy_text("top secret", None).unwrap();

        let written = String::from_utf8(fx.last_write()).unwrap();
        assert!(written.starts_with(obfuscation::MARKER));
        *fx.backend.content.lock().unwrap() = Some(written);
        assert_eq!(fx.transfer.clipboard_content(None), "top secret");
    }

    #[test]
    fn test_marked_content_is_left_alone_when_obfuscation_is_off() {
        let fx = Fixture::new(&[]);
        let marked = obfuscation::encode(b"x");
        *fx.backend.content.lock().unwrap() = Some(marked.clone());

        assert_eq!(fx.transfer.clipboard_content(None), marked);
    }

    #[test]
    fn test_read_failure_yields_empty_string() {
        let fx = Fixture::new(&[]);
        assert_eq!(fx.transfer.clipboard_content(None), "");
    }

    #[test]
    fn test_copy_text_does_not_touch_history() {
        let fx = Fixture::new(&[]);

        fx.transfer.copy_text("hello", None).unwrap();

        assert_eq!(fx.last_write(), b"hello");
        assert!(fx.history.get(None).is_empty());
        assert_eq!(
            fx.shown.lock().unwrap().last().map(|(_, m)| m.clone()),
            Some("Text copied to clipboard".to_string())
        );
    }

    #[test]
    fn test_notifications_can_be_disabled() {
        let fx = Fixture::new(&[(SECTION_SECURITY, KEY_NOTIFICATION, "false")]);

        assert!(!fx.transfer.show_notification("CLIPBARD", "hi"));
        fx.transfer.copy_text("hello", None).unwrap();

        assert!(fx.shown.lock().unwrap().is_empty());
    }

    #[test]
    fn test_auto_clear_fires_after_each_copy() {
        let fx = Fixture::new(&[(SECTION_CLIPBOARD, KEY_AUTO_CLEAR, "true")]);

        fx.transfer.copy_text("one", None).unwrap();
        fx.transfer.copy_text("two", None).unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while *fx.backend.clears.lock().unwrap() < 2 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(*fx.backend.clears.lock().unwrap(), 2);
    }

    #[test]
    fn test_auto_clear_disabled_schedules_nothing() {
        let fx = Fixture::new(&[]);

        fx.transfer.copy_text("one", None).unwrap();

        assert_eq!(fx.transfer.pending_clears(), 0);
        assert_eq!(fx.transfer.cancel_pending_clears(), 0);
    }

    #[test]
    fn test_clear_clipboard_maps_missing_backend() {
        let fx = Fixture::new(&[]);
        fx.transfer.clear_clipboard(None).unwrap();
        assert_eq!(*fx.backend.clears.lock().unwrap(), 1);

        let err = TransferError::from(ClipboardError::NoBackend);
        assert!(matches!(err, TransferError::NoBackend));
        assert_eq!(err.to_string(), "No clipboard utility found");
    }
}
