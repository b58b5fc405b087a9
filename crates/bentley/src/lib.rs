//! Leveled, colored operator output for the workspace binaries.
//!
//! Everything goes to stderr so stdout stays clean for command output.
//! `verbose` lines are dropped unless [`set_verbose`] was turned on.
//!
//! Library crates log through the macros (`bentley::info!("loaded {n}")`);
//! third-party crates log through `tracing`, which [`init_tracing`] wires up.

use colored::*;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

static VERBOSE: AtomicBool = AtomicBool::new(false);

pub fn set_verbose(enabled: bool) {
  VERBOSE.store(enabled, Ordering::Relaxed);
}

pub fn is_verbose() -> bool {
  VERBOSE.load(Ordering::Relaxed)
}

/// Install a `tracing` subscriber writing to stderr.
///
/// `RUST_LOG` wins when set. Calling this twice is harmless.
pub fn init_tracing(verbose: bool) {
  let default_directives = if verbose { "woofwise=debug,info" } else { "woofwise=info,warn" };
  let filter =
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives));

  let _ = tracing_subscriber::registry()
    .with(fmt::layer().with_writer(std::io::stderr))
    .with(filter)
    .try_init();
}

/// Core logging function that handles the actual output
pub fn log(message: &str) {
  for line in message.lines() {
    eprintln!("{line}");
  }
}

/// Prefix every line of `message` with a colored level tag
pub fn format_lines(color: Color, tag: &str, message: &str) -> Vec<String> {
  let prefix = format!("[{}]{:<width$}", tag.color(color).bold(), "", width = 7 - tag.len() - 2);
  message.lines().map(|line| format!("{prefix} {line}")).collect()
}

fn emit(color: Color, tag: &str, message: &str) {
  for line in format_lines(color, tag, message) {
    log(&line);
  }
}

pub fn verbose(message: &str) {
  if is_verbose() {
    emit(Color::Cyan, "verb", message);
  }
}

/// Info level logging - general information
pub fn info(message: &str) {
  emit(Color::Blue, "info", message);
}

/// Warning level logging - something needs attention
pub fn warn(message: &str) {
  emit(Color::Yellow, "warn", message);
}

/// Error level logging - something went wrong
pub fn error(message: &str) {
  emit(Color::Red, "error", message);
}

pub fn success(message: &str) {
  emit(Color::Green, "sccs", message);
}

#[macro_export]
macro_rules! info {
  ($($arg:tt)*) => {
    $crate::info(&format!($($arg)*)) // LCOV_EXCL_LINE
  };
}

#[macro_export]
macro_rules! warn {
  ($($arg:tt)*) => {
    $crate::warn(&format!($($arg)*)) // LCOV_EXCL_LINE
  };
}

#[macro_export]
macro_rules! error {
  ($($arg:tt)*) => {
    $crate::error(&format!($($arg)*)) // LCOV_EXCL_LINE
  };
}

/// Skips formatting entirely when verbose output is off
#[macro_export]
macro_rules! verbose {
  ($($arg:tt)*) => {
    if $crate::is_verbose() {
      $crate::verbose(&format!($($arg)*)) // LCOV_EXCL_LINE
    }
  };
}

#[macro_export]
macro_rules! success {
  ($($arg:tt)*) => {
    $crate::success(&format!($($arg)*)) // LCOV_EXCL_LINE
  };
}
