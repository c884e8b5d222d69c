use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/*
 * Extensions the extractor and the directory fallback treat as interesting.
 * Matching is done on the lowercase extension without the leading dot.
 */
pub const RECOGNIZED_EXTENSIONS: &[&str] = &[
    // Programming
    "py", "js", "html", "css", "php", "java", "cpp", "c", "h", "hpp", "cs", "go", "rb", "pl",
    "swift", "kt", "rs", "ts", "sh", "bash", "zsh", "sql",
    // Data formats
    "json", "xml", "yaml", "yml", "toml", "ini", "csv", "tsv", "md", "markdown",
    // Documents
    "txt", "doc", "docx", "pdf", "xls", "xlsx",
    // Config
    "conf", "config", "cfg", "gitignore", "env",
];

pub fn is_recognized_extension(ext: &str) -> bool {
    let lowered = ext.to_ascii_lowercase();
    RECOGNIZED_EXTENSIONS.contains(&lowered.as_str())
}

/*
 * Advisory clipboard slot. Values 0-9 are accepted and threaded through every
 * transfer, but none of the platform backends has more than one real clipboard,
 * so the index only shows up in logs.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ClipboardBuffer(u8);

impl ClipboardBuffer {
    pub const MAX_INDEX: u8 = 9;

    pub fn new(index: u8) -> Option<Self> {
        (index <= Self::MAX_INDEX).then_some(ClipboardBuffer(index))
    }

    // Out-of-range values fall back to slot 0.
    pub fn from_config_value(value: i64) -> Self {
        u8::try_from(value)
            .ok()
            .and_then(Self::new)
            .unwrap_or_default()
    }
}

impl fmt::Display for ClipboardBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Theme {
    #[default]
    Synthwave,
    Matrix,
    Cyberpunk,
    Midnight,
}

impl Theme {
    pub const ALL: [Theme; 4] = [
        Theme::Synthwave,
        Theme::Matrix,
        Theme::Cyberpunk,
        Theme::Midnight,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Theme::Synthwave => "synthwave",
            Theme::Matrix => "matrix",
            Theme::Cyberpunk => "cyberpunk",
            Theme::Midnight => "midnight",
        }
    }
}

impl FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Theme::ALL
            .into_iter()
            .find(|theme| theme.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown theme '{s}'"))
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/*
 * The `history.preferred_history` setting. `Auto` defers to environment
 * detection; the other variants pin the shell whose history gets scanned.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PreferredShell {
    #[default]
    Auto,
    Bash,
    Zsh,
}

impl PreferredShell {
    pub fn as_str(self) -> &'static str {
        match self {
            PreferredShell::Auto => "auto",
            PreferredShell::Bash => "bash",
            PreferredShell::Zsh => "zsh",
        }
    }
}

impl FromStr for PreferredShell {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(PreferredShell::Auto),
            "bash" => Ok(PreferredShell::Bash),
            "zsh" => Ok(PreferredShell::Zsh),
            other => Err(format!("unknown shell preference '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellKind {
    Bash,
    Zsh,
}

impl ShellKind {
    pub fn program(self) -> &'static str {
        match self {
            ShellKind::Bash => "bash",
            ShellKind::Zsh => "zsh",
        }
    }
}

/*
 * Metadata and a short textual preview of a file, as produced by
 * `file_inspector::preview_file`. Serializable so the CLI can emit it as JSON.
 */
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilePreview {
    pub filename: String,
    pub path: PathBuf,
    pub size: u64,
    pub size_human: String,
    pub modified: String,
    pub kind: String,
    pub preview: String,
    pub lines: usize,
    pub checksum: String,
}
