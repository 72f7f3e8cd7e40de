//! Logging utilities with colored output.
//!
//! This module provides:
//! - `log!` macro for formatted terminal output with colored prefixes
//! - `debug!` macro gated on the `--verbose` CLI argument
//!
//! # Example
//!
//! ```ignore
//! log!("build"; "transforming {} files", count);
//! debug!("watch"; "raw event: {:?}", event);
//! ```

use owo_colors::{OwoColorize, Stream, Style};
use std::{
    io::{Write, stdout},
    sync::atomic::{AtomicBool, Ordering},
};

/// Global verbose flag (set by --verbose CLI argument)
static VERBOSE: AtomicBool = AtomicBool::new(false);

/// Set verbose mode globally
pub fn set_verbose(v: bool) {
    VERBOSE.store(v, Ordering::SeqCst);
}

/// Check if verbose mode is enabled
pub fn is_verbose() -> bool {
    VERBOSE.load(Ordering::SeqCst)
}

// ============================================================================
// Log Macros
// ============================================================================

/// Log a message with a colored module prefix
///
/// # Usage
/// ```ignore
/// log!("module"; "message with {} formatting", args);
/// ```
#[macro_export]
macro_rules! log {
    ($module:expr; $($arg:tt)*) => {{
        $crate::logger::log($module, &format!($($arg)*))
    }};
}

/// Log a debug message (only shown when --verbose is enabled)
///
/// # Usage
/// ```ignore
/// debug!("module"; "debug info: {}", value);
/// ```
#[macro_export]
macro_rules! debug {
    ($module:expr; $($arg:tt)*) => {{
        if $crate::logger::is_verbose() {
            $crate::logger::log($module, &format!($($arg)*))
        }
    }};
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Log a message with a colored module prefix
#[inline]
pub fn log(module: &str, message: &str) {
    let prefix = colorize_prefix(module);
    let mut stdout = stdout().lock();
    let _ = writeln!(stdout, "{prefix} {message}");
}

/// Pick a stable color for a module prefix.
///
/// Known modules get fixed colors; anything else hashes into a palette so
/// the same prefix is always shown the same way.
fn colorize_prefix(module: &str) -> String {
    let style = match module {
        "error" => Style::new().red().bold(),
        "warn" => Style::new().yellow().bold(),
        "build" => Style::new().green().bold(),
        "watch" => Style::new().cyan().bold(),
        "cache" => Style::new().magenta().bold(),
        "manifest" => Style::new().blue().bold(),
        _ => {
            let idx = module.bytes().fold(0usize, |acc, b| acc + b as usize) % 4;
            match idx {
                0 => Style::new().green(),
                1 => Style::new().cyan(),
                2 => Style::new().magenta(),
                _ => Style::new().blue(),
            }
        }
    };

    let padded = format!("{module:>9}");
    padded
        .if_supports_color(Stream::Stdout, |text| text.style(style))
        .to_string()
}
