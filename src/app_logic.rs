/*
 * This module provides the application logic layer: `args` holds the clap
 * command-line grammar and `handler` executes a parsed command line against the
 * core components through their `*Operations` traits (`ClipbardLogic`).
 * Unit tests for `ClipbardLogic` are in `handler_tests.rs`.
 */
pub mod args;
pub mod handler;


pub use args::Cli;
pub use handler::{ClipbardLogic, OutputLine};
