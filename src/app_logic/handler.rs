use crate::app_logic::args::{Cli, Command, ConfigAction, HistoryAction};
use crate::core::config::{ConfigError, default_value, normalize_setting};
use crate::core::scan_worker::{spawn_content_search, spawn_shell_history_scan};
use crate::core::{
    ClipboardBuffer, ClipboardTransferOperations, Config, ContentSearchRequest,
    ContentSearcherOperations, HistoryOperations, ShellHistoryOperations, file_inspector,
    format_conversion,
};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

// The quick-pick list is addressed with a single digit.
pub const MAX_QUICK_CANDIDATES: usize = 9;

pub const EXIT_OK: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_USAGE: i32 = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/*
 * Everything a command wants shown, plus the process exit code. The logic never
 * prints; `main` renders the outcome.
 */
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandOutcome {
    pub lines: Vec<OutputLine>,
    pub exit_code: i32,
}

impl CommandOutcome {
    fn ok() -> Self {
        CommandOutcome {
            lines: Vec::new(),
            exit_code: EXIT_OK,
        }
    }

    fn failure(message: impl Into<String>, exit_code: i32) -> Self {
        CommandOutcome {
            lines: vec![OutputLine::Stderr(message.into())],
            exit_code,
        }
    }

    fn say(mut self, line: impl Into<String>) -> Self {
        self.lines.push(OutputLine::Stdout(line.into()));
        self
    }

    #[cfg(test)]
    pub fn stdout(&self) -> Vec<&str> {
        self.lines
            .iter()
            .filter_map(|line| match line {
                OutputLine::Stdout(s) => Some(s.as_str()),
                OutputLine::Stderr(_) => None,
            })
            .collect()
    }

    #[cfg(test)]
    pub fn stderr(&self) -> Vec<&str> {
        self.lines
            .iter()
            .filter_map(|line| match line {
                OutputLine::Stderr(s) => Some(s.as_str()),
                OutputLine::Stdout(_) => None,
            })
            .collect()
    }
}

/*
 * Executes parsed command lines against the core components. All collaborators
 * are trait objects so the command behaviour can be exercised with mocks; the
 * configuration is the one shared `Config` constructed at start-up.
 */
pub struct ClipbardLogic {
    pub(crate) config: Arc<Config>,
    pub(crate) history: Arc<dyn HistoryOperations>,
    pub(crate) shell_history: Arc<dyn ShellHistoryOperations>,
    pub(crate) transfer: Arc<dyn ClipboardTransferOperations>,
    pub(crate) searcher: Arc<dyn ContentSearcherOperations>,
    pub(crate) scratch_dir: PathBuf,
    pub(crate) current_dir: PathBuf,
}

impl ClipbardLogic {
    pub fn new(
        config: Arc<Config>,
        history: Arc<dyn HistoryOperations>,
        shell_history: Arc<dyn ShellHistoryOperations>,
        transfer: Arc<dyn ClipboardTransferOperations>,
        searcher: Arc<dyn ContentSearcherOperations>,
        scratch_dir: &Path,
        current_dir: &Path,
    ) -> Self {
        ClipbardLogic {
            config,
            history,
            shell_history,
            transfer,
            searcher,
            scratch_dir: scratch_dir.to_path_buf(),
            current_dir: current_dir.to_path_buf(),
        }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.current_dir.join(path)
        }
    }

    fn buffer_from(index: Option<u8>) -> Option<ClipboardBuffer> {
        index.and_then(ClipboardBuffer::new)
    }

    /*
     * History entries followed by shell-history candidates (when scanning is
     * enabled), each source limited to `display_count`. Duplicates and paths
     * that no longer exist are dropped; the result holds at most nine entries.
     */
    pub fn collect_quick_candidates(&self) -> Vec<PathBuf> {
        let display_count = self.config.display_count();
        let mut candidates: Vec<PathBuf> = self
            .history
            .get(Some(display_count))
            .into_iter()
            .map(PathBuf::from)
            .collect();

        if self.config.shell_history_scan() {
            match spawn_shell_history_scan(Arc::clone(&self.shell_history), Some(display_count)) {
                Ok(handle) => candidates.extend(handle.wait().into_iter().flatten()),
                Err(e) => log::warn!("AppLogic: Shell history scan not started: {e}"),
            }
        }

        let mut unique: Vec<PathBuf> = Vec::new();
        for candidate in candidates {
            if !unique.contains(&candidate) && candidate.exists() {
                unique.push(candidate);
            }
        }
        unique.truncate(MAX_QUICK_CANDIDATES);
        log::debug!("AppLogic: {} quick-pick candidates.", unique.len());
        unique
    }

    pub fn execute(&self, cli: Cli) -> CommandOutcome {
        let top_level_buffer = Self::buffer_from(cli.buffer);
        match (cli.command, cli.file) {
            (Some(_), Some(file)) => CommandOutcome::failure(
                format!("Unexpected file argument '{}' before a command.", file.display()),
                EXIT_USAGE,
            ),
            (None, Some(file)) => self.copy_file(&file, top_level_buffer),
            (None, None) => self.quick_list(),
            (Some(command), None) => self.run_command(command, top_level_buffer),
        }
    }

    fn run_command(&self, command: Command, default_buffer: Option<ClipboardBuffer>) -> CommandOutcome {
        match command {
            Command::Pick { index } => self.pick(index, default_buffer),
            Command::Copy { file, buffer } => {
                self.copy_file(&file, Self::buffer_from(buffer).or(default_buffer))
            }
            Command::Text { text, buffer } => {
                self.copy_text(&text.join(" "), Self::buffer_from(buffer).or(default_buffer))
            }
            Command::Lines {
                file,
                range,
                buffer,
            } => self.copy_lines(&file, &range, Self::buffer_from(buffer).or(default_buffer)),
            Command::Paste => self.paste(),
            Command::Save {
                file,
                force,
                append,
            } => self.save(&file, SaveMode::from_flags(force, append)),
            Command::Clear => self.clear(),
            Command::History { action } => self.history_command(action),
            Command::Scan { count } => self.scan(count),
            Command::Search { term, dir, glob } => self.search(&term, dir.as_deref(), glob),
            Command::Preview { file, json } => self.preview(&file, json),
            Command::Convert { file, format } => self.convert(&file, &format),
            Command::Config { action } => self.config_command(action),
            Command::Version => {
                CommandOutcome::ok().say(format!("clipbard {}", env!("CARGO_PKG_VERSION")))
            }
        }
    }

    fn quick_list(&self) -> CommandOutcome {
        let candidates = self.collect_quick_candidates();
        if candidates.is_empty() {
            return CommandOutcome::ok().say("No history items found.");
        }
        let mut outcome = CommandOutcome::ok();
        for (i, path) in candidates.iter().enumerate() {
            let size = fs::metadata(path).map(|m| m.len()).unwrap_or(0);
            outcome = outcome.say(format!(
                "{}. {} [{}]",
                i + 1,
                display_name(path),
                file_inspector::human_readable_size(size)
            ));
        }
        outcome.say("Copy one with `clipbard pick N`.")
    }

    fn pick(&self, index: usize, buffer: Option<ClipboardBuffer>) -> CommandOutcome {
        let candidates = self.collect_quick_candidates();
        match index.checked_sub(1).and_then(|i| candidates.get(i)) {
            Some(path) => self.copy_file(path, buffer),
            None => CommandOutcome::failure("Invalid selection.", EXIT_USAGE),
        }
    }

    fn copy_file(&self, file: &Path, buffer: Option<ClipboardBuffer>) -> CommandOutcome {
        let path = self.resolve(file);
        match self.transfer.copy_file(&path, buffer) {
            Ok(()) => CommandOutcome::ok().say(format!("Copied: {}", display_name(&path))),
            Err(e) => CommandOutcome::failure(
                format!("Error: Failed to copy {}: {e}", path.display()),
                EXIT_FAILURE,
            ),
        }
    }

    fn copy_text(&self, text: &str, buffer: Option<ClipboardBuffer>) -> CommandOutcome {
        match self.transfer.copy_text(text, buffer) {
            Ok(()) => CommandOutcome::ok().say("Text copied to clipboard."),
            Err(e) => CommandOutcome::failure(format!("Error: {e}"), EXIT_FAILURE),
        }
    }

    fn copy_lines(&self, file: &Path, range: &str, buffer: Option<ClipboardBuffer>) -> CommandOutcome {
        let Some((start, end)) = file_inspector::parse_line_range(range) else {
            return CommandOutcome::failure(
                format!("Invalid line range '{range}'. Use N or N-M."),
                EXIT_USAGE,
            );
        };
        let path = self.resolve(file);
        let Some(text) = file_inspector::extract_line_range(&path, start, Some(end)) else {
            return CommandOutcome::failure(
                format!("Lines {range} are not available in {}.", path.display()),
                EXIT_FAILURE,
            );
        };
        match self.transfer.copy_text(&text, buffer) {
            Ok(()) => CommandOutcome::ok().say(format!(
                "Copied lines {start}-{end} of {}.",
                display_name(&path)
            )),
            Err(e) => CommandOutcome::failure(format!("Error: {e}"), EXIT_FAILURE),
        }
    }

    fn paste(&self) -> CommandOutcome {
        let content = self.transfer.clipboard_content(None);
        if content.is_empty() {
            return CommandOutcome::failure("Clipboard is empty.", EXIT_FAILURE);
        }
        CommandOutcome::ok().say(content)
    }

    fn save(&self, file: &Path, mode: SaveMode) -> CommandOutcome {
        let path = self.resolve(file);
        let exists = path.exists();
        if exists && mode == SaveMode::Create {
            return CommandOutcome::failure(
                format!(
                    "{} already exists; use --force to overwrite or --append to add to it.",
                    path.display()
                ),
                EXIT_FAILURE,
            );
        }
        let content = self.transfer.clipboard_content(None);
        if content.is_empty() {
            return CommandOutcome::failure("Clipboard is empty; nothing saved.", EXIT_FAILURE);
        }

        let written = match mode {
            SaveMode::Append => OpenOptions::new()
                .append(true)
                .create(true)
                .open(&path)
                .and_then(|mut f| f.write_all(content.as_bytes())),
            SaveMode::Create | SaveMode::Overwrite => fs::write(&path, &content),
        };
        if let Err(e) = written {
            return CommandOutcome::failure(
                format!("Error: Could not write {}: {e}", path.display()),
                EXIT_FAILURE,
            );
        }
        log::debug!("AppLogic: Saved {} bytes to {path:?} ({mode:?}).", content.len());
        let verb = match (mode, exists) {
            (SaveMode::Append, true) => "Appended clipboard to",
            (SaveMode::Overwrite, true) => "Overwrote",
            _ => "Saved clipboard to",
        };
        CommandOutcome::ok().say(format!("{verb} {}", path.display()))
    }

    fn clear(&self) -> CommandOutcome {
        match self.transfer.clear_clipboard(None) {
            Ok(()) => CommandOutcome::ok().say("Clipboard cleared."),
            Err(e) => CommandOutcome::failure(format!("Error: {e}"), EXIT_FAILURE),
        }
    }

    fn history_command(&self, action: Option<HistoryAction>) -> CommandOutcome {
        let entries = match action.unwrap_or(HistoryAction::List { count: None }) {
            HistoryAction::List { count } => self.history.get(count),
            HistoryAction::Search { term, count } => {
                if term.trim().is_empty() {
                    return CommandOutcome::failure("Search term must not be empty.", EXIT_USAGE);
                }
                self.history.search(&term, count)
            }
            HistoryAction::Clear => {
                return match self.history.clear() {
                    Ok(()) => CommandOutcome::ok().say("History cleared."),
                    Err(e) => CommandOutcome::failure(format!("Error: {e}"), EXIT_FAILURE),
                };
            }
        };

        if entries.is_empty() {
            return CommandOutcome::ok().say("No history items found.");
        }
        let mut outcome = CommandOutcome::ok();
        for (i, entry) in entries.iter().enumerate() {
            let marker = if Path::new(entry).exists() {
                ""
            } else {
                " (missing)"
            };
            outcome = outcome.say(format!("{}. {entry}{marker}", i + 1));
        }
        outcome
    }

    fn scan(&self, count: Option<usize>) -> CommandOutcome {
        if !self.config.shell_history_scan() {
            return CommandOutcome::ok()
                .say("Shell history scanning is disabled (history.shell_history_scan = false).");
        }
        let files = match spawn_shell_history_scan(Arc::clone(&self.shell_history), count) {
            Ok(handle) => handle.wait().into_iter().flatten().collect::<Vec<_>>(),
            Err(e) => {
                return CommandOutcome::failure(format!("Error: {e}"), EXIT_FAILURE);
            }
        };
        if files.is_empty() {
            return CommandOutcome::ok().say("No files found in shell history.");
        }
        files
            .iter()
            .enumerate()
            .fold(CommandOutcome::ok(), |outcome, (i, path)| {
                outcome.say(format!("{}. {}", i + 1, path.display()))
            })
    }

    fn search(&self, term: &str, dir: Option<&Path>, glob: Option<String>) -> CommandOutcome {
        let root = dir.map_or_else(|| self.current_dir.clone(), |d| self.resolve(d));
        let request = ContentSearchRequest::new(term, &root).with_glob(glob.as_deref());
        let handle = match spawn_content_search(Arc::clone(&self.searcher), request) {
            Ok(handle) => handle,
            Err(e) => return CommandOutcome::failure(format!("Error: {e}"), EXIT_USAGE),
        };

        let mut outcome = CommandOutcome::ok();
        let mut found = 0;
        let mut files_scanned = 0;
        for batch in handle.wait() {
            files_scanned = files_scanned.max(batch.files_scanned);
            for hit in batch.results {
                found += 1;
                outcome = outcome.say(format!("{}:{}", hit.path.display(), hit.line_number));
            }
        }
        log::debug!("AppLogic: Content search scanned {files_scanned} files.");
        if found == 0 {
            return outcome.say("No matching content found.");
        }
        outcome
    }

    fn preview(&self, file: &Path, json: bool) -> CommandOutcome {
        let path = self.resolve(file);
        let Some(preview) = file_inspector::preview_file(&path) else {
            return CommandOutcome::failure(
                format!("File not found: {}", path.display()),
                EXIT_FAILURE,
            );
        };
        if json {
            return match serde_json::to_string_pretty(&preview) {
                Ok(text) => CommandOutcome::ok().say(text),
                Err(e) => CommandOutcome::failure(format!("Error: {e}"), EXIT_FAILURE),
            };
        }

        let mut outcome = CommandOutcome::ok()
            .say(format!("Name:     {}", preview.filename))
            .say(format!("Path:     {}", preview.path.display()))
            .say(format!("Size:     {} ({} bytes)", preview.size_human, preview.size))
            .say(format!("Modified: {}", preview.modified))
            .say(format!("Type:     {}", preview.kind));
        if preview.lines > 0 {
            outcome = outcome.say(format!("Lines:    {}", preview.lines));
        }
        outcome = outcome.say(format!("SHA-256:  {}", preview.checksum));
        if !preview.preview.is_empty() {
            outcome = outcome
                .say("--- Preview ---")
                .say(preview.preview.trim_end_matches('\n'));
        }
        outcome
    }

    fn convert(&self, file: &Path, format: &str) -> CommandOutcome {
        let path = self.resolve(file);
        match format_conversion::convert_format(&path, format, &self.scratch_dir) {
            Ok(output) => CommandOutcome::ok().say(format!("Converted to {}", output.display())),
            Err(e) => CommandOutcome::failure(format!("Error: {e}"), EXIT_FAILURE),
        }
    }

    fn config_command(&self, action: Option<ConfigAction>) -> CommandOutcome {
        match action.unwrap_or(ConfigAction::List) {
            ConfigAction::List => {
                let mut outcome = CommandOutcome::ok();
                let mut current_section = String::new();
                for (section, key, value) in self.config.entries() {
                    if section != current_section {
                        outcome = outcome.say(format!("[{section}]"));
                        current_section = section;
                    }
                    outcome = outcome.say(format!("{key} = {value}"));
                }
                outcome
            }
            ConfigAction::Get { section, key } => {
                if default_value(&section, &key).is_none() {
                    log::debug!("AppLogic: '{section}.{key}' is not a known setting.");
                }
                CommandOutcome::ok().say(self.config.get(&section, &key))
            }
            ConfigAction::Set {
                section,
                key,
                value,
            } => {
                let value = match normalize_setting(&section, &key, &value) {
                    Ok(value) => value,
                    Err(e @ (ConfigError::UnknownSetting(_) | ConfigError::InvalidValue { .. })) => {
                        return CommandOutcome::failure(e.to_string(), EXIT_USAGE);
                    }
                    Err(e) => return CommandOutcome::failure(format!("Error: {e}"), EXIT_FAILURE),
                };
                match self.config.set(&section, &key, &value) {
                    Ok(()) => CommandOutcome::ok().say(format!("{section}.{key} = {value}")),
                    Err(e) => CommandOutcome::failure(format!("Error: {e}"), EXIT_FAILURE),
                }
            }
        }
    }
}

// What `save` does when the target file already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SaveMode {
    Create,
    Overwrite,
    Append,
}

impl SaveMode {
    fn from_flags(force: bool, append: bool) -> Self {
        match (force, append) {
            (_, true) => SaveMode::Append,
            (true, false) => SaveMode::Overwrite,
            (false, false) => SaveMode::Create,
        }
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
