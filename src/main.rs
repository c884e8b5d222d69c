// src/main.rs

mod app_logic;
mod core;

use crate::app_logic::{Cli, ClipbardLogic, OutputLine};
use crate::core::clipboard_backend::probe_backend;
use crate::core::path_utils::{APP_NAME, ensure_dir};
use crate::core::{
    AppPaths, ClipboardBackendOperations, Config, CoreClipboardTransfer, CoreConfigStore,
    CoreContentSearcher, CoreHistoryCommand, CoreNotifier, HistoryLedger, ShellEnvironment,
    ShellHistoryExtractor,
};
use clap::Parser;
use log::LevelFilter;
use simplelog::{ColorChoice, ConfigBuilder, TermLogger, TerminalMode};
use std::path::PathBuf;
use std::sync::{Arc, Once};

static LOGGER_INIT: Once = Once::new();

/*
 * Installs the stderr logger. The logger itself passes everything up to Debug;
 * the global max level decides what is emitted, so verbosity can still be
 * raised once the configuration has been read. Safe to call repeatedly.
 */
pub fn initialize_logging(verbose: bool) {
    LOGGER_INIT.call_once(|| {
        let config = ConfigBuilder::new()
            .set_time_level(LevelFilter::Off)
            .set_target_level(LevelFilter::Off)
            .build();
        if let Err(e) = TermLogger::init(
            LevelFilter::Debug,
            config,
            TerminalMode::Stderr,
            ColorChoice::Auto,
        ) {
            eprintln!("Failed to initialize logger: {e}");
        }
    });
    log::set_max_level(if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    });
}

fn resolve_paths() -> AppPaths {
    if let Some(paths) = AppPaths::resolve(APP_NAME) {
        return paths;
    }
    // No usable home directory; keep everything under the temp dir.
    let fallback = std::env::temp_dir().join(APP_NAME);
    log::warn!("Main: Could not resolve per-user directories, using {fallback:?}.");
    let scratch = fallback.join("tmp");
    ensure_dir(&fallback);
    ensure_dir(&scratch);
    AppPaths::in_dir(&fallback, &scratch)
}

fn main() {
    let cli = Cli::parse();
    initialize_logging(cli.verbose);

    let paths = resolve_paths();
    let config = Arc::new(Config::load(Box::new(CoreConfigStore::new(
        &paths.config_file,
    ))));
    if config.verbose_logging() {
        log::set_max_level(LevelFilter::Debug);
    }
    log::debug!("Main: Using configuration at {:?}.", paths.config_file);

    let current_dir = std::env::current_dir().unwrap_or_else(|e| {
        log::warn!("Main: Cannot determine the working directory: {e}");
        PathBuf::from(".")
    });

    let history = Arc::new(HistoryLedger::new(&paths.history_file, Arc::clone(&config)));
    let shell_history = Arc::new(ShellHistoryExtractor::new(
        Arc::clone(&config),
        ShellEnvironment::from_process(),
        Box::new(CoreHistoryCommand::new()),
    ));
    let backend: Arc<dyn ClipboardBackendOperations> = Arc::from(probe_backend());
    log::debug!("Main: Clipboard backend is {}.", backend.kind().as_str());
    let transfer = Arc::new(CoreClipboardTransfer::new(
        Arc::clone(&config),
        history.clone(),
        backend,
        Box::new(CoreNotifier::new()),
        &paths.scratch_dir,
    ));

    let logic = ClipbardLogic::new(
        config,
        history,
        shell_history,
        transfer,
        Arc::new(CoreContentSearcher::new()),
        &paths.scratch_dir,
        &current_dir,
    );

    let outcome = logic.execute(cli);
    for line in &outcome.lines {
        match line {
            OutputLine::Stdout(text) => println!("{text}"),
            OutputLine::Stderr(text) => eprintln!("{text}"),
        }
    }
    std::process::exit(outcome.exit_code);
}
