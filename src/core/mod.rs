/*
 * The platform-agnostic core of clipbard: configuration, the history ledger,
 * shell-history extraction, clipboard transfer and its platform backends, file
 * inspection and conversion, content search and the background scan worker.
 * Every seam the command layer talks to is a trait (`HistoryOperations`,
 * `ShellHistoryOperations`, `ClipboardTransferOperations`, ...) so the command
 * layer can be tested against mocks.
 */
pub mod auto_clear;
pub mod clipboard_backend;
pub mod config;
pub mod content_search;
pub mod content_search_progress;
pub mod file_inspector;
pub mod format_conversion;
pub mod history;
pub mod models;
pub mod notifier;
pub mod obfuscation;
pub mod path_utils;
pub mod scan_worker;
pub mod shell_history;
pub mod transfer;

pub use models::ClipboardBuffer;

pub use config::{Config, CoreConfigStore};

pub use history::{HistoryLedger, HistoryOperations};

pub use shell_history::{
    CoreHistoryCommand, ShellEnvironment, ShellHistoryExtractor, ShellHistoryOperations,
};

pub use clipboard_backend::ClipboardBackendOperations;
pub use notifier::CoreNotifier;
pub use transfer::{ClipboardTransferOperations, CoreClipboardTransfer};

pub use content_search::{ContentSearchRequest, ContentSearcherOperations, CoreContentSearcher};

pub use path_utils::AppPaths;
