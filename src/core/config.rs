/*
 * Manages clipbard's user settings: a mapping from (section, key) to a string
 * value, persisted as an INI-style file. Every key the application reads has a
 * compile-time default, so lookups never fail; typed accessors sit on top of the
 * string contract and fall back to defaults on parse failure.
 *
 * Persistence goes through the `ConfigStoreOperations` trait so the storage can
 * be swapped for an in-memory implementation in tests. `CoreConfigStore` is the
 * file-backed implementation. Mutations are written through immediately; there
 * is no locking across processes, so two concurrent writers race and the last
 * one wins.
 */
use crate::core::models::{ClipboardBuffer, PreferredShell, Theme};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

pub const SECTION_GENERAL: &str = "general";
pub const SECTION_CLIPBOARD: &str = "clipboard";
pub const SECTION_SECURITY: &str = "security";
pub const SECTION_HISTORY: &str = "history";

pub const KEY_HISTORY_SIZE: &str = "history_size";
pub const KEY_DISPLAY_COUNT: &str = "display_count";
pub const KEY_THEME: &str = "theme";
pub const KEY_VERBOSE_LOGGING: &str = "verbose_logging";
pub const KEY_AUTO_CLEAR: &str = "auto_clear";
pub const KEY_DEFAULT_BUFFER: &str = "default_buffer";
pub const KEY_MAX_FILE_SIZE: &str = "max_file_size";
pub const KEY_NOTIFICATION: &str = "notification";
pub const KEY_COMPRESSION: &str = "compression";
pub const KEY_ENCRYPTION: &str = "encryption";
pub const KEY_SHELL_HISTORY_SCAN: &str = "shell_history_scan";
pub const KEY_PREFER_LOCAL_HISTORY: &str = "prefer_local_history";
pub const KEY_PREFERRED_HISTORY: &str = "preferred_history";

const BACKUP_SUFFIX: &str = ".backup";

type SectionDefaults = (&'static str, &'static [(&'static str, &'static str)]);

/// The known sections and keys, in the order they are written to disk.
pub const DEFAULTS: &[SectionDefaults] = &[
    (
        SECTION_GENERAL,
        &[
            (KEY_HISTORY_SIZE, "50"),
            (KEY_DISPLAY_COUNT, "5"),
            (KEY_THEME, "synthwave"),
            (KEY_VERBOSE_LOGGING, "false"),
        ],
    ),
    (
        SECTION_CLIPBOARD,
        &[
            (KEY_AUTO_CLEAR, "false"),
            (KEY_DEFAULT_BUFFER, "0"),
            (KEY_MAX_FILE_SIZE, "10"),
        ],
    ),
    (
        SECTION_SECURITY,
        &[
            (KEY_NOTIFICATION, "true"),
            (KEY_COMPRESSION, "false"),
            (KEY_ENCRYPTION, "false"),
        ],
    ),
    (
        SECTION_HISTORY,
        &[
            (KEY_SHELL_HISTORY_SCAN, "true"),
            (KEY_PREFER_LOCAL_HISTORY, "true"),
            (KEY_PREFERRED_HISTORY, "auto"),
        ],
    ),
];

pub fn default_value(section: &str, key: &str) -> Option<&'static str> {
    DEFAULTS
        .iter()
        .find(|(name, _)| *name == section)
        .and_then(|(_, keys)| keys.iter().find(|(k, _)| *k == key))
        .map(|(_, value)| *value)
}

/*
 * Checks a user-supplied value against the type of a known setting and returns
 * the form it should be stored in. Enum settings are stored by their canonical
 * lowercase name; booleans as `true`/`false`.
 */
pub fn normalize_setting(section: &str, key: &str, value: &str) -> Result<String> {
    let setting = format!("{section}.{key}");
    if default_value(section, key).is_none() {
        return Err(ConfigError::UnknownSetting(setting));
    }
    let value = value.trim();
    let invalid = |reason: String| ConfigError::InvalidValue {
        setting: setting.clone(),
        reason,
    };
    match (section, key) {
        (SECTION_GENERAL, KEY_THEME) => value
            .parse::<Theme>()
            .map(|theme| theme.as_str().to_string())
            .map_err(invalid),
        (SECTION_HISTORY, KEY_PREFERRED_HISTORY) => value
            .parse::<PreferredShell>()
            .map(|shell| shell.as_str().to_string())
            .map_err(invalid),
        (SECTION_CLIPBOARD, KEY_DEFAULT_BUFFER) => value
            .parse::<u8>()
            .ok()
            .and_then(ClipboardBuffer::new)
            .map(|buffer| buffer.to_string())
            .ok_or_else(|| {
                invalid(format!(
                    "expected a buffer number 0-{}, got '{value}'",
                    ClipboardBuffer::MAX_INDEX
                ))
            }),
        (SECTION_GENERAL, KEY_HISTORY_SIZE | KEY_DISPLAY_COUNT)
        | (SECTION_CLIPBOARD, KEY_MAX_FILE_SIZE) => value
            .parse::<u64>()
            .map(|n| n.to_string())
            .map_err(|_| invalid(format!("expected a non-negative integer, got '{value}'"))),
        _ => parse_bool(value)
            .map(|flag| flag.to_string())
            .ok_or_else(|| invalid(format!("expected true or false, got '{value}'"))),
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io(io::Error),
    Parse { line: usize, reason: String },
    UnknownSetting(String),
    InvalidValue { setting: String, reason: String },
}

impl From<io::Error> for ConfigError {
    fn from(err: io::Error) -> Self {
        ConfigError::Io(err)
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "Configuration I/O error: {e}"),
            ConfigError::Parse { line, reason } => {
                write!(f, "Configuration parse error on line {line}: {reason}")
            }
            ConfigError::UnknownSetting(setting) => write!(f, "Unknown setting '{setting}'."),
            ConfigError::InvalidValue { setting, reason } => {
                write!(f, "Invalid value for '{setting}': {reason}")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/*
 * Raw access to the persisted configuration text. Implementations only move
 * bytes around; parsing, defaults and recovery live in `Config`.
 */
pub trait ConfigStoreOperations: Send + Sync {
    /// Returns `Ok(None)` when nothing has been persisted yet.
    fn load_raw(&self) -> Result<Option<String>>;
    fn save_raw(&self, contents: &str) -> Result<()>;
    /// Copies the current persisted text aside; returns where it went, if anywhere.
    fn backup_raw(&self) -> Result<Option<PathBuf>>;
}

pub struct CoreConfigStore {
    path: PathBuf,
}

impl CoreConfigStore {
    pub fn new(path: &Path) -> Self {
        CoreConfigStore {
            path: path.to_path_buf(),
        }
    }

    pub fn backup_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(BACKUP_SUFFIX);
        PathBuf::from(name)
    }
}

impl ConfigStoreOperations for CoreConfigStore {
    fn load_raw(&self) -> Result<Option<String>> {
        log::trace!("CoreConfigStore: Loading {:?}", self.path);
        if !self.path.exists() {
            log::debug!("CoreConfigStore: Config file {:?} does not exist.", self.path);
            return Ok(None);
        }
        let bytes = fs::read(&self.path)?;
        Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
    }

    fn save_raw(&self, contents: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, contents)?;
        log::debug!("CoreConfigStore: Saved config to {:?}.", self.path);
        Ok(())
    }

    fn backup_raw(&self) -> Result<Option<PathBuf>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let backup = self.backup_path();
        fs::copy(&self.path, &backup)?;
        log::warn!("CoreConfigStore: Created backup of old config: {backup:?}");
        Ok(Some(backup))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct IniSection {
    name: String,
    entries: Vec<(String, String)>,
}

/*
 * Ordered in-memory form of the INI text. Order is kept so rewriting the file
 * does not shuffle sections or keys the user arranged by hand.
 */
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct IniDocument {
    sections: Vec<IniSection>,
}

impl IniDocument {
    fn with_defaults() -> Self {
        let mut doc = IniDocument::default();
        doc.fill_defaults();
        doc
    }

    fn parse(text: &str) -> Result<Self> {
        let mut doc = IniDocument::default();
        let mut current: Option<usize> = None;

        for (index, raw_line) in text.lines().enumerate() {
            let line_no = index + 1;
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }

            if let Some(header) = line.strip_prefix('[') {
                let Some(name) = header.strip_suffix(']') else {
                    return Err(ConfigError::Parse {
                        line: line_no,
                        reason: format!("unterminated section header '{line}'"),
                    });
                };
                let name = name.trim();
                if doc.section_index(name).is_some() {
                    return Err(ConfigError::Parse {
                        line: line_no,
                        reason: format!("duplicate section '{name}'"),
                    });
                }
                doc.sections.push(IniSection {
                    name: name.to_string(),
                    entries: Vec::new(),
                });
                current = Some(doc.sections.len() - 1);
                continue;
            }

            let Some(section_idx) = current else {
                return Err(ConfigError::Parse {
                    line: line_no,
                    reason: "entry appears before any section header".to_string(),
                });
            };

            let Some(separator) = line.find(['=', ':']) else {
                return Err(ConfigError::Parse {
                    line: line_no,
                    reason: format!("expected 'key = value', found '{line}'"),
                });
            };
            let key = line[..separator].trim().to_lowercase();
            let value = line[separator + 1..].trim().to_string();
            if key.is_empty() {
                return Err(ConfigError::Parse {
                    line: line_no,
                    reason: "empty key".to_string(),
                });
            }

            let section = &mut doc.sections[section_idx];
            if section.entries.iter().any(|(k, _)| *k == key) {
                return Err(ConfigError::Parse {
                    line: line_no,
                    reason: format!("duplicate key '{key}' in section '{}'", section.name),
                });
            }
            section.entries.push((key, value));
        }

        Ok(doc)
    }

    fn render(&self) -> String {
        let mut out = String::new();
        for section in &self.sections {
            out.push_str(&format!("[{}]\n", section.name));
            for (key, value) in &section.entries {
                out.push_str(&format!("{key} = {value}\n"));
            }
            out.push('\n');
        }
        out
    }

    fn section_index(&self, name: &str) -> Option<usize> {
        self.sections.iter().position(|s| s.name == name)
    }

    fn get(&self, section: &str, key: &str) -> Option<&str> {
        let idx = self.section_index(section)?;
        self.sections[idx]
            .entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn set(&mut self, section: &str, key: &str, value: &str) {
        let idx = match self.section_index(section) {
            Some(idx) => idx,
            None => {
                self.sections.push(IniSection {
                    name: section.to_string(),
                    entries: Vec::new(),
                });
                self.sections.len() - 1
            }
        };
        let entries = &mut self.sections[idx].entries;
        match entries.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value.to_string(),
            None => entries.push((key.to_string(), value.to_string())),
        }
    }

    // Returns true when anything had to be added.
    fn fill_defaults(&mut self) -> bool {
        let mut changed = false;
        for (section, keys) in DEFAULTS {
            if self.section_index(section).is_none() {
                self.sections.push(IniSection {
                    name: section.to_string(),
                    entries: Vec::new(),
                });
                changed = true;
            }
            for (key, value) in keys.iter() {
                if self.get(section, key).is_none() {
                    self.set(section, key, value);
                    changed = true;
                }
            }
        }
        changed
    }
}

/*
 * Naive `key=value` scan of a store that failed to parse. Section headers are
 * ignored, so a salvaged key is re-applied to whichever known section owns it.
 */
fn salvage_values(text: &str) -> HashMap<String, String> {
    text.lines()
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| (key.trim().to_lowercase(), value.trim().to_string()))
        .filter(|(key, _)| !key.is_empty())
        .collect()
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

/*
 * The process-wide configuration object. Constructed once at start-up and shared
 * by `Arc` with every component that needs settings.
 */
pub struct Config {
    store: Box<dyn ConfigStoreOperations>,
    document: RwLock<IniDocument>,
}

impl Config {
    /*
     * Loads the configuration from `store`. This never fails: a missing store is
     * created with defaults; a corrupt store is backed up, rebuilt from defaults
     * and any salvageable `key=value` lines are re-applied. After a successful
     * load, missing known keys are filled in and the store is re-persisted once.
     */
    pub fn load(store: Box<dyn ConfigStoreOperations>) -> Self {
        let document = match store.load_raw() {
            Ok(Some(text)) => match IniDocument::parse(&text) {
                Ok(mut doc) => {
                    if doc.fill_defaults() {
                        log::debug!("Config: Filled missing defaults after load.");
                        Self::persist(store.as_ref(), &doc);
                    }
                    doc
                }
                Err(e) => {
                    log::warn!("Config: Error reading config: {e}. Recreating with defaults.");
                    Self::recover_from_corrupt(store.as_ref(), &text)
                }
            },
            Ok(None) => {
                let doc = IniDocument::with_defaults();
                Self::persist(store.as_ref(), &doc);
                doc
            }
            Err(e) => {
                log::warn!("Config: Could not read config store ({e}); using defaults.");
                IniDocument::with_defaults()
            }
        };

        Config {
            store,
            document: RwLock::new(document),
        }
    }

    fn recover_from_corrupt(store: &dyn ConfigStoreOperations, text: &str) -> IniDocument {
        if let Err(e) = store.backup_raw() {
            log::error!("Config: Failed to back up corrupt config: {e}");
        }

        let salvaged = salvage_values(text);
        let mut doc = IniDocument::with_defaults();
        for (section, keys) in DEFAULTS {
            for (key, _) in keys.iter() {
                if let Some(value) = salvaged.get(*key) {
                    log::debug!("Config: Salvaged {section}.{key} = '{value}'");
                    doc.set(section, key, value);
                }
            }
        }
        Self::persist(store, &doc);
        doc
    }

    fn persist(store: &dyn ConfigStoreOperations, doc: &IniDocument) {
        if let Err(e) = store.save_raw(&doc.render()) {
            log::error!("Config: Failed to persist configuration: {e}");
        }
    }

    fn read_doc(&self) -> std::sync::RwLockReadGuard<'_, IniDocument> {
        self.document.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stored value, else the built-in default, else an empty string.
    pub fn get(&self, section: &str, key: &str) -> String {
        self.get_or(section, key, default_value(section, key).unwrap_or_default())
    }

    /// Stored value, else `fallback`.
    pub fn get_or(&self, section: &str, key: &str, fallback: &str) -> String {
        self.read_doc()
            .get(section, key)
            .map_or_else(|| fallback.to_string(), str::to_string)
    }

    pub fn get_bool(&self, section: &str, key: &str) -> bool {
        self.get_bool_or(section, key, false)
    }

    pub fn get_bool_or(&self, section: &str, key: &str, fallback: bool) -> bool {
        parse_bool(&self.get(section, key)).unwrap_or(fallback)
    }

    pub fn get_int(&self, section: &str, key: &str) -> i64 {
        self.get_int_or(section, key, 0)
    }

    pub fn get_int_or(&self, section: &str, key: &str, fallback: i64) -> i64 {
        self.get(section, key).trim().parse().unwrap_or(fallback)
    }

    /*
     * Updates a value and immediately persists the whole store. The in-memory
     * value is updated even when persisting fails; the error is returned so the
     * caller can report it.
     */
    pub fn set(&self, section: &str, key: &str, value: &str) -> Result<()> {
        let rendered = {
            let mut doc = self.document.write().unwrap_or_else(PoisonError::into_inner);
            doc.set(section, &key.to_lowercase(), value.trim());
            doc.render()
        };
        log::debug!("Config: Set {section}.{key} = '{value}'");
        self.store.save_raw(&rendered)
    }

    /// Every (section, key, value) triple currently held, in file order.
    pub fn entries(&self) -> Vec<(String, String, String)> {
        self.read_doc()
            .sections
            .iter()
            .flat_map(|section| {
                section
                    .entries
                    .iter()
                    .map(|(k, v)| (section.name.clone(), k.clone(), v.clone()))
            })
            .collect()
    }

    pub fn history_size(&self) -> usize {
        self.get_int_or(SECTION_GENERAL, KEY_HISTORY_SIZE, 50).max(0) as usize
    }

    pub fn display_count(&self) -> usize {
        self.get_int_or(SECTION_GENERAL, KEY_DISPLAY_COUNT, 5).max(0) as usize
    }

    pub fn verbose_logging(&self) -> bool {
        self.get_bool(SECTION_GENERAL, KEY_VERBOSE_LOGGING)
    }

    pub fn auto_clear(&self) -> bool {
        self.get_bool(SECTION_CLIPBOARD, KEY_AUTO_CLEAR)
    }

    pub fn default_buffer(&self) -> ClipboardBuffer {
        ClipboardBuffer::from_config_value(self.get_int(SECTION_CLIPBOARD, KEY_DEFAULT_BUFFER))
    }

    pub fn max_file_size_mb(&self) -> u64 {
        self.get_int_or(SECTION_CLIPBOARD, KEY_MAX_FILE_SIZE, 10).max(0) as u64
    }

    pub fn notifications_enabled(&self) -> bool {
        self.get_bool_or(SECTION_SECURITY, KEY_NOTIFICATION, true)
    }

    pub fn compression_enabled(&self) -> bool {
        self.get_bool(SECTION_SECURITY, KEY_COMPRESSION)
    }

    /// The `security.encryption` flag; it enables obfuscation, not encryption.
    pub fn obfuscation_enabled(&self) -> bool {
        self.get_bool(SECTION_SECURITY, KEY_ENCRYPTION)
    }

    pub fn shell_history_scan(&self) -> bool {
        self.get_bool_or(SECTION_HISTORY, KEY_SHELL_HISTORY_SCAN, true)
    }

    pub fn prefer_local_history(&self) -> bool {
        self.get_bool_or(SECTION_HISTORY, KEY_PREFER_LOCAL_HISTORY, true)
    }

    pub fn preferred_history(&self) -> PreferredShell {
        self.get(SECTION_HISTORY, KEY_PREFERRED_HISTORY)
            .parse()
            .unwrap_or_default()
    }
}
