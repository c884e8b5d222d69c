/*
 * Command-line grammar. `clipbard` alone lists quick-pick candidates, a bare
 * file argument copies that file, and everything else is a subcommand.
 */
use clap::{Parser, Subcommand};
use std::path::PathBuf;

fn buffer_parser() -> clap::builder::RangedI64ValueParser<u8> {
    clap::value_parser!(u8).range(0..=9)
}

#[derive(Parser, Debug)]
#[command(
    name = "clipbard",
    version,
    about = "Terminal clipboard assistant: copy recent files, text and line ranges."
)]
pub struct Cli {
    /// File to copy (same as `clipbard copy FILE`)
    pub file: Option<PathBuf>,

    /// Clipboard buffer (0-9) for the bare file form
    #[arg(short, long, value_parser = buffer_parser())]
    pub buffer: Option<u8>,

    /// Debug logging on stderr, overriding general.verbose_logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Copy the N-th entry of the quick-pick list
    Pick { index: usize },
    /// Copy file content
    Copy {
        file: PathBuf,
        #[arg(short, long, value_parser = buffer_parser())]
        buffer: Option<u8>,
    },
    /// Copy literal text
    #[command(visible_alias = "t")]
    Text {
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
        #[arg(short, long, value_parser = buffer_parser())]
        buffer: Option<u8>,
    },
    /// Copy a line range (`5` or `5-10`) of a file
    Lines {
        file: PathBuf,
        range: String,
        #[arg(short, long, value_parser = buffer_parser())]
        buffer: Option<u8>,
    },
    /// Print the clipboard content
    Paste,
    /// Write the clipboard content to a file
    Save {
        file: PathBuf,
        /// Overwrite an existing file
        #[arg(long, conflicts_with = "append")]
        force: bool,
        /// Add to the end of an existing file
        #[arg(short, long)]
        append: bool,
    },
    /// Clear the clipboard
    Clear,
    /// Inspect or clear the copy history
    History {
        #[command(subcommand)]
        action: Option<HistoryAction>,
    },
    /// List files recently referenced in shell history
    Scan {
        #[arg(short = 'n', long)]
        count: Option<usize>,
    },
    /// Search file contents below a directory
    Search {
        term: String,
        #[arg(short, long)]
        dir: Option<PathBuf>,
        /// Only search files whose name matches this glob
        #[arg(short, long)]
        glob: Option<String>,
    },
    /// Show file metadata and the first lines
    Preview {
        file: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Convert a file (md->html, html->md, json->csv, csv->json, otherwise copy)
    Convert { file: PathBuf, format: String },
    /// Show or edit configuration
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
    /// Print the version
    #[command(visible_alias = "v")]
    Version,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum HistoryAction {
    List {
        #[arg(short = 'n', long)]
        count: Option<usize>,
    },
    Search {
        term: String,
        #[arg(short = 'n', long)]
        count: Option<usize>,
    },
    Clear,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ConfigAction {
    List,
    Get {
        section: String,
        key: String,
    },
    Set {
        section: String,
        key: String,
        value: String,
    },
}
