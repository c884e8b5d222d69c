/*
 * This module provides utility functions for path manipulation, focusing on
 * retrieving and ensuring the existence of the directories clipbard persists
 * into: the per-user configuration directory (config store and history ledger)
 * and the scratch directory used for compressed transfers and conversions.
 */
use directories::ProjectDirs;
use std::fs;
use std::path::{Path, PathBuf};

pub const APP_NAME: &str = "clipbard";
pub const CONFIG_FILENAME: &str = "config.ini";
pub const HISTORY_FILENAME: &str = "history";
const SCRATCH_DIR_NAME: &str = "clipbard-tmp";

/*
 * Resolved locations of everything clipbard reads or writes. Built once at
 * start-up and handed to the components; tests build one over a temp dir.
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    pub config_dir: PathBuf,
    pub config_file: PathBuf,
    pub history_file: PathBuf,
    pub scratch_dir: PathBuf,
}

impl AppPaths {
    pub fn in_dir(config_dir: &Path, scratch_dir: &Path) -> Self {
        AppPaths {
            config_dir: config_dir.to_path_buf(),
            config_file: config_dir.join(CONFIG_FILENAME),
            history_file: config_dir.join(HISTORY_FILENAME),
            scratch_dir: scratch_dir.to_path_buf(),
        }
    }

    /*
     * Resolves the standard per-user locations for `app_name` and makes sure
     * both directories exist. Returns `None` if no home directory can be
     * determined or a directory cannot be created.
     */
    pub fn resolve(app_name: &str) -> Option<Self> {
        let config_dir = get_base_app_config_dir(app_name)?;
        let scratch_dir = std::env::temp_dir().join(SCRATCH_DIR_NAME);
        ensure_dir(&scratch_dir)?;
        Some(AppPaths::in_dir(&config_dir, &scratch_dir))
    }
}

/*
 * Retrieves the application's configuration directory (e.g. `~/.config/clipbard`
 * on Linux). The path is derived without an organization qualifier. The
 * directory is created if it does not exist yet.
 *
 * Returns `None` if `ProjectDirs` cannot identify a suitable location or the
 * directory cannot be created.
 */
pub fn get_base_app_config_dir(app_name: &str) -> Option<PathBuf> {
    log::trace!("PathUtils: Attempting to get base app config dir for '{app_name}'");
    ProjectDirs::from("", "", app_name).and_then(|proj_dirs| ensure_dir(proj_dirs.config_dir()))
}

pub fn ensure_dir(path: &Path) -> Option<PathBuf> {
    if !path.exists() {
        if let Err(e) = fs::create_dir_all(path) {
            log::error!("PathUtils: Failed to create directory {path:?}: {e}");
            return None;
        }
        log::debug!("PathUtils: Created directory: {path:?}");
    } else {
        log::trace!("PathUtils: Directory already exists: {path:?}");
    }
    Some(path.to_path_buf())
}
