/*
 * Recovers files the user recently referenced by scraping shell history rather
 * than clipbard's own ledger. The extractor picks the active shell, assembles an
 * ordered list of history sources, runs three independent token passes over
 * each source, and keeps candidates that exist on disk and look like text.
 *
 * Extraction is best-effort throughout: unreadable sources and failing
 * subprocesses are skipped, and an empty result is a normal outcome. Results
 * are deterministic: sources are visited in order, passes run in a fixed order
 * within a source, and candidates keep their first-seen position.
 */
use crate::core::config::Config;
use crate::core::file_inspector;
use crate::core::models::{PreferredShell, ShellKind, is_recognized_extension};
use crate::core::scan_worker::CancellationToken;
use md5::{Digest, Md5};
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::{Arc, LazyLock};
use walkdir::WalkDir;

const ZSH_MARKER: &str = "ZSH_VERSION";
const BASH_MARKER: &str = "BASH_VERSION";
const HISTFILE_VAR: &str = "HISTFILE";
const ZSH_PER_DIRECTORY_HISTORY_DIR: &str = ".zsh_history_dirs";
const ZSH_GLOBAL_HISTORY: &str = ".zsh_history";
const BASH_GLOBAL_HISTORY: &str = ".bash_history";

static ABSOLUTE_PATH_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|\s)(/[a-zA-Z0-9._/-]+)").expect("valid regex"));

static FILENAME_WITH_EXTENSION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|\s)([a-zA-Z0-9._/-]+\.[a-zA-Z0-9]+)").expect("valid regex")
});

// Pagers, editors and text utilities whose first argument is usually a file.
static FILE_COMMAND_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:cat|nano|vim|vi|emacs|less|more|head|tail|grep|awk|sed)\s+(\S+)")
        .expect("valid regex")
});

/*
 * The slice of process state the extractor depends on. Captured once so tests
 * can describe a shell session without mutating the real environment.
 */
#[derive(Debug, Clone, Default)]
pub struct ShellEnvironment {
    pub vars: HashMap<String, String>,
    pub home_dir: Option<PathBuf>,
    pub current_dir: PathBuf,
}

impl ShellEnvironment {
    pub fn from_process() -> Self {
        let vars = [ZSH_MARKER, BASH_MARKER, HISTFILE_VAR]
            .into_iter()
            .filter_map(|name| std::env::var(name).ok().map(|value| (name.to_string(), value)))
            .collect();
        ShellEnvironment {
            vars,
            home_dir: directories::BaseDirs::new().map(|dirs| dirs.home_dir().to_path_buf()),
            current_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

    fn var(&self, name: &str) -> Option<&str> {
        self.vars
            .get(name)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }

    fn home_path(&self, name: &str) -> Option<PathBuf> {
        self.home_dir.as_ref().map(|home| home.join(name))
    }
}

/*
 * Runs the shell's own history mechanism. Used only when no history file could
 * be located at all.
 */
pub trait HistoryCommandOperations: Send + Sync {
    fn run_history(&self, shell: ShellKind) -> Option<String>;
}

pub struct CoreHistoryCommand {}

impl CoreHistoryCommand {
    pub fn new() -> Self {
        CoreHistoryCommand {}
    }
}

impl Default for CoreHistoryCommand {
    fn default() -> Self {
        Self::new()
    }
}

impl HistoryCommandOperations for CoreHistoryCommand {
    fn run_history(&self, shell: ShellKind) -> Option<String> {
        // `history` is a builtin that only has content in an interactive shell.
        let output = Command::new(shell.program())
            .args(["-i", "-c", "history"])
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output();
        match output {
            Ok(out) if out.status.success() => {
                Some(String::from_utf8_lossy(&out.stdout).into_owned())
            }
            Ok(out) => {
                log::debug!(
                    "ShellHistory: '{} -i -c history' exited with {}",
                    shell.program(),
                    out.status
                );
                None
            }
            Err(e) => {
                log::debug!("ShellHistory: Could not run {}: {e}", shell.program());
                None
            }
        }
    }
}

pub trait ShellHistoryOperations: Send + Sync {
    /*
     * Returns up to `count` (default: `display_count`) existing, text-like
     * files referenced in shell history, falling back to recognized files in the
     * current directory when history yields nothing.
     */
    fn extract_files(&self, count: Option<usize>, cancel: &CancellationToken) -> Vec<PathBuf>;
}

pub struct ShellHistoryExtractor {
    config: Arc<Config>,
    env: ShellEnvironment,
    history_command: Box<dyn HistoryCommandOperations>,
}

impl ShellHistoryExtractor {
    pub fn new(
        config: Arc<Config>,
        env: ShellEnvironment,
        history_command: Box<dyn HistoryCommandOperations>,
    ) -> Self {
        ShellHistoryExtractor {
            config,
            env,
            history_command,
        }
    }

    pub fn detect_shell(&self) -> ShellKind {
        match self.config.preferred_history() {
            PreferredShell::Zsh => ShellKind::Zsh,
            PreferredShell::Bash => ShellKind::Bash,
            PreferredShell::Auto => {
                if self.env.vars.contains_key(ZSH_MARKER) {
                    ShellKind::Zsh
                } else {
                    ShellKind::Bash
                }
            }
        }
    }

    /// Existing history files for `shell`, in the order they should be searched.
    pub fn history_sources(&self, shell: ShellKind) -> Vec<PathBuf> {
        let mut sources: Vec<PathBuf> = Vec::new();

        if let Some(histfile) = self.env.var(HISTFILE_VAR) {
            let histfile = PathBuf::from(histfile);
            if histfile.is_file() {
                sources.push(histfile);
            }
        }

        let global = match shell {
            ShellKind::Zsh => {
                if let Some(local) = self.per_directory_history_file() {
                    if self.config.prefer_local_history() {
                        sources.insert(0, local);
                    } else {
                        sources.push(local);
                    }
                }
                self.env.home_path(ZSH_GLOBAL_HISTORY)
            }
            ShellKind::Bash => self.env.home_path(BASH_GLOBAL_HISTORY),
        };

        if let Some(global) = global {
            if global.is_file() && !sources.contains(&global) {
                sources.push(global);
            }
        }

        log::debug!("ShellHistory: Sources for {shell:?}: {sources:?}");
        sources
    }

    // zsh's per-directory-history plugin keeps one file per MD5 of the cwd.
    fn per_directory_history_file(&self) -> Option<PathBuf> {
        let base = self.env.home_path(ZSH_PER_DIRECTORY_HISTORY_DIR)?;
        if !base.is_dir() {
            return None;
        }
        let cwd = self.env.current_dir.to_string_lossy();
        let hash = format!("{:x}", Md5::digest(cwd.as_bytes()));
        let file = base.join(hash);
        file.is_file().then_some(file)
    }

    fn collect_candidates(
        &self,
        shell: ShellKind,
        cancel: &CancellationToken,
    ) -> Vec<PathBuf> {
        let sources = self.history_sources(shell);
        let mut candidates = OrderedPaths::default();

        for source in &sources {
            if cancel.is_cancelled() {
                return candidates.into_vec();
            }
            match fs::read(source) {
                Ok(bytes) => {
                    let text = String::from_utf8_lossy(&bytes);
                    candidates.extend(extract_candidates(
                        &text,
                        &self.env.current_dir,
                        self.env.home_dir.as_deref(),
                    ));
                }
                Err(e) => {
                    log::debug!("ShellHistory: Skipping unreadable source {source:?}: {e}");
                }
            }
        }

        if sources.is_empty() && !cancel.is_cancelled() {
            log::debug!("ShellHistory: No history files found; asking the shell directly.");
            if let Some(text) = self.history_command.run_history(shell) {
                candidates.extend(extract_candidates(
                    &text,
                    &self.env.current_dir,
                    self.env.home_dir.as_deref(),
                ));
            }
        }

        candidates.into_vec()
    }

    fn current_directory_fallback(&self, count: usize) -> Vec<PathBuf> {
        WalkDir::new(&self.env.current_dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(is_recognized_extension)
            })
            .take(count)
            .collect()
    }
}

impl ShellHistoryOperations for ShellHistoryExtractor {
    fn extract_files(&self, count: Option<usize>, cancel: &CancellationToken) -> Vec<PathBuf> {
        let count = count.unwrap_or_else(|| self.config.display_count());
        let shell = self.detect_shell();
        let candidates = self.collect_candidates(shell, cancel);
        log::debug!(
            "ShellHistory: {} raw candidates from {shell:?} history.",
            candidates.len()
        );

        let mut valid_files = Vec::new();
        for candidate in candidates {
            if valid_files.len() >= count || cancel.is_cancelled() {
                break;
            }
            if is_interesting_file(&candidate) {
                valid_files.push(candidate);
            }
        }

        if valid_files.is_empty() && !cancel.is_cancelled() {
            log::debug!("ShellHistory: Nothing usable in history; listing current directory.");
            valid_files = self.current_directory_fallback(count);
        }
        valid_files
    }
}

/*
 * Insertion-ordered set of paths. Keeps the first position of each path so the
 * extraction result does not depend on hash iteration order.
 */
#[derive(Default)]
struct OrderedPaths {
    seen: HashSet<PathBuf>,
    order: Vec<PathBuf>,
}

impl OrderedPaths {
    fn extend(&mut self, paths: impl IntoIterator<Item = PathBuf>) {
        for path in paths {
            if self.seen.insert(path.clone()) {
                self.order.push(path);
            }
        }
    }

    fn into_vec(self) -> Vec<PathBuf> {
        self.order
    }
}

/*
 * Runs the three token passes over raw history text:
 *   (a) absolute paths,
 *   (b) bare tokens with a `.ext` suffix,
 *   (c) the first argument of a known file-viewing or editing command, skipping flags.
 * Relative tokens are resolved against `cwd`; `~/` is expanded when `home` is known.
 * The result is deduplicated and keeps first-seen order.
 */
pub fn extract_candidates(text: &str, cwd: &Path, home: Option<&Path>) -> Vec<PathBuf> {
    let mut found = OrderedPaths::default();

    found.extend(
        ABSOLUTE_PATH_PATTERN
            .captures_iter(text)
            .map(|caps| PathBuf::from(&caps[1])),
    );

    found.extend(
        FILENAME_WITH_EXTENSION_PATTERN
            .captures_iter(text)
            .map(|caps| resolve_token(&caps[1], cwd, home)),
    );

    found.extend(
        FILE_COMMAND_PATTERN
            .captures_iter(text)
            .map(|caps| caps[1].to_string())
            .filter(|token| !token.starts_with('-'))
            .map(|token| resolve_token(&token, cwd, home)),
    );

    found.into_vec()
}

fn resolve_token(token: &str, cwd: &Path, home: Option<&Path>) -> PathBuf {
    if let (Some(rest), Some(home)) = (token.strip_prefix("~/"), home) {
        return home.join(rest);
    }
    let path = Path::new(token);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    }
}

/// A regular file with a recognized extension, or failing that a text-like MIME type.
pub fn is_interesting_file(path: &Path) -> bool {
    if !path.is_file() {
        return false;
    }
    let recognized = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(is_recognized_extension);
    recognized
        || file_inspector::guess_mime(path)
            .as_deref()
            .is_some_and(file_inspector::is_text_like)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::tests::config_with;
    use crate::core::config::{
        KEY_DISPLAY_COUNT, KEY_PREFER_LOCAL_HISTORY, KEY_PREFERRED_HISTORY, SECTION_GENERAL,
        SECTION_HISTORY,
    };
    use std::fs::File;
    use std::sync::Mutex;
    use tempfile::{TempDir, tempdir};

    struct MockHistoryCommand {
        output: Option<String>,
        calls: Arc<Mutex<Vec<ShellKind>>>,
    }

    impl HistoryCommandOperations for MockHistoryCommand {
        fn run_history(&self, shell: ShellKind) -> Option<String> {
            self.calls.lock().unwrap().push(shell);
            self.output.clone()
        }
    }

    struct Fixture {
        _root: TempDir,
        home: PathBuf,
        project: PathBuf,
        command_calls: Arc<Mutex<Vec<ShellKind>>>,
    }

    impl Fixture {
        fn new() -> Self {
            let root = tempdir().unwrap();
            let home = root.path().join("home");
            let project = root.path().join("project");
            fs::create_dir_all(&home).unwrap();
            fs::create_dir_all(&project).unwrap();
            Fixture {
                _root: root,
                home,
                project,
                command_calls: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn env(&self, vars: &[(&str, &str)]) -> ShellEnvironment {
            ShellEnvironment {
                vars: vars
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                home_dir: Some(self.home.clone()),
                current_dir: self.project.clone(),
            }
        }

        fn extractor(
            &self,
            vars: &[(&str, &str)],
            overrides: &[(&str, &str, &str)],
            command_output: Option<&str>,
        ) -> ShellHistoryExtractor {
            ShellHistoryExtractor::new(
                Arc::new(config_with(overrides)),
                self.env(vars),
                Box::new(MockHistoryCommand {
                    output: command_output.map(str::to_string),
                    calls: Arc::clone(&self.command_calls),
                }),
            )
        }

        fn project_file(&self, name: &str) -> PathBuf {
            let path = self.project.join(name);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            File::create(&path).unwrap();
            path
        }

        fn write_home(&self, name: &str, contents: &str) -> PathBuf {
            let path = self.home.join(name);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(&path, contents).unwrap();
            path
        }
    }

    #[test]
    fn test_extract_candidates_takes_command_arguments_and_skips_flags() {
        let cwd = Path::new("/work");
        let found = extract_candidates("vim /home/u/notes.md\nls -la\n", cwd, None);

        assert!(found.contains(&PathBuf::from("/home/u/notes.md")));
        assert!(!found.iter().any(|p| p.to_string_lossy().contains("-la")));
    }

    #[test]
    fn test_extract_candidates_resolves_relative_tokens_against_cwd() {
        let cwd = Path::new("/work");
        let found = extract_candidates("cat notes\nless src/lib.rs\ntail -f app.log", cwd, None);

        assert!(found.contains(&PathBuf::from("/work/notes")));
        assert!(found.contains(&PathBuf::from("/work/src/lib.rs")));
        assert!(found.contains(&PathBuf::from("/work/app.log")));
        assert!(!found.contains(&PathBuf::from("/work/-f")));
    }

    #[test]
    fn test_extract_candidates_handles_zsh_extended_history_lines() {
        let cwd = Path::new("/work");
        let text = ": 1700000000:0;vim src/main.rs\n: 1700000001:0;cat ~/todo.txt\n";
        let found = extract_candidates(text, cwd, Some(Path::new("/home/u")));

        assert!(found.contains(&PathBuf::from("/work/src/main.rs")));
        assert!(found.contains(&PathBuf::from("/home/u/todo.txt")));
    }

    #[test]
    fn test_extract_candidates_is_deduplicated_and_ordered() {
        let cwd = Path::new("/w");
        let text = "/a/one.txt /b/two.md\nvim /a/one.txt\nthree.rs";
        let found = extract_candidates(text, cwd, None);

        assert_eq!(
            found,
            vec![
                PathBuf::from("/a/one.txt"),
                PathBuf::from("/b/two.md"),
                PathBuf::from("/w/three.rs"),
            ]
        );
    }

    #[test]
    fn test_command_name_must_be_a_whole_word() {
        let found = extract_candidates("concat draft", Path::new("/w"), None);
        assert!(found.is_empty(), "{found:?}");
    }

    #[test]
    fn test_detect_shell_prefers_zsh_marker_then_bash() {
        let fx = Fixture::new();
        let both = fx.extractor(&[("ZSH_VERSION", "5.9"), ("BASH_VERSION", "5.2")], &[], None);
        assert_eq!(both.detect_shell(), ShellKind::Zsh);

        let bash = fx.extractor(&[("BASH_VERSION", "5.2")], &[], None);
        assert_eq!(bash.detect_shell(), ShellKind::Bash);

        let neither = fx.extractor(&[], &[], None);
        assert_eq!(neither.detect_shell(), ShellKind::Bash);

        let pinned = fx.extractor(
            &[("ZSH_VERSION", "5.9")],
            &[(SECTION_HISTORY, KEY_PREFERRED_HISTORY, "bash")],
            None,
        );
        assert_eq!(pinned.detect_shell(), ShellKind::Bash);
    }

    #[test]
    fn test_zsh_sources_honour_local_preference() {
        let fx = Fixture::new();
        let histfile = fx.write_home("custom_hist", "");
        let global = fx.write_home(".zsh_history", "");
        let hash = format!(
            "{:x}",
            Md5::digest(fx.project.to_string_lossy().as_bytes())
        );
        let local = fx.write_home(&format!(".zsh_history_dirs/{hash}"), "");
        let histfile_str = histfile.to_string_lossy().into_owned();
        let vars = [("ZSH_VERSION", "5.9"), ("HISTFILE", histfile_str.as_str())];

        let prefer_local = fx.extractor(&vars, &[], None);
        assert_eq!(
            prefer_local.history_sources(ShellKind::Zsh),
            vec![local.clone(), histfile.clone(), global.clone()]
        );

        let prefer_global = fx.extractor(
            &vars,
            &[(SECTION_HISTORY, KEY_PREFER_LOCAL_HISTORY, "false")],
            None,
        );
        assert_eq!(
            prefer_global.history_sources(ShellKind::Zsh),
            vec![histfile, local, global]
        );
    }

    #[test]
    fn test_histfile_pointing_at_global_file_is_not_duplicated() {
        let fx = Fixture::new();
        let global = fx.write_home(".bash_history", "");
        let global_str = global.to_string_lossy().into_owned();

        let extractor = fx.extractor(&[("HISTFILE", global_str.as_str())], &[], None);

        assert_eq!(extractor.history_sources(ShellKind::Bash), vec![global]);
    }

    #[test]
    fn test_extract_files_filters_to_existing_interesting_files() {
        let fx = Fixture::new();
        let notes = fx.project_file("notes.md");
        let page = fx.project_file("page.htm");
        fx.project_file("blob.bin");
        let history = format!(
            "vim {}\ncat blob.bin\nless missing.txt\nopen page.htm\nls -la\n",
            notes.display()
        );
        fx.write_home(".bash_history", &history);

        let extractor = fx.extractor(&[], &[], None);
        let files = extractor.extract_files(Some(10), &CancellationToken::new());

        assert_eq!(files, vec![notes, page]);
        assert!(fx.command_calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_extract_files_stops_at_count() {
        let fx = Fixture::new();
        let a = fx.project_file("a.rs");
        let b = fx.project_file("b.rs");
        fx.project_file("c.rs");
        fx.write_home(".bash_history", "vim a.rs\nvim b.rs\nvim c.rs\n");

        let extractor = fx.extractor(&[], &[(SECTION_GENERAL, KEY_DISPLAY_COUNT, "2")], None);
        let files = extractor.extract_files(None, &CancellationToken::new());

        assert_eq!(files, vec![a, b]);
    }

    #[test]
    fn test_subprocess_fallback_only_when_no_sources_exist() {
        let fx = Fixture::new();
        let todo = fx.project_file("todo.txt");

        let extractor = fx.extractor(&[], &[], Some("  12  cat todo.txt\n"));
        let files = extractor.extract_files(Some(5), &CancellationToken::new());

        assert_eq!(files, vec![todo]);
        assert_eq!(fx.command_calls.lock().unwrap().as_slice(), &[ShellKind::Bash]);

        // An existing but empty history file suppresses the subprocess.
        fx.write_home(".bash_history", "");
        fx.command_calls.lock().unwrap().clear();
        let _ = extractor.extract_files(Some(5), &CancellationToken::new());
        assert!(fx.command_calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_falls_back_to_current_directory_listing() {
        let fx = Fixture::new();
        let b = fx.project_file("b.toml");
        let a = fx.project_file("a.py");
        fx.project_file("image.png");
        fx.project_file("nested/deep.rs");
        fx.write_home(".bash_history", "ls\ncd /nowhere\n");

        let extractor = fx.extractor(&[], &[], None);
        let files = extractor.extract_files(Some(5), &CancellationToken::new());

        assert_eq!(files, vec![a, b]);
    }

    #[test]
    fn test_cancelled_extraction_returns_nothing() {
        let fx = Fixture::new();
        fx.project_file("a.py");
        fx.write_home(".bash_history", "vim a.py\n");
        let cancel = CancellationToken::new();
        cancel.cancel();

        let extractor = fx.extractor(&[], &[], None);

        assert!(extractor.extract_files(Some(5), &cancel).is_empty());
    }
}
