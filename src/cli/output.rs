//! Minimal CLI output helpers (respects `NO_COLOR` via `console::style`).

use console::style;
use std::fmt::Display;

/// Print a success message with checkmark (green).
pub fn success(msg: &str) {
    println!("{} {}", style("✓").green(), msg);
}

/// Print an error message to stderr, `error: ` prefixed (spec.md 6).
pub fn error(msg: &str) {
    eprintln!("error: {msg}");
}

/// Print an actionable hint below an error (dim).
pub fn hint(msg: &str) {
    eprintln!("  {}", style(msg).dim());
}

/// Print a warning message (yellow).
pub fn warn(msg: &str) {
    println!("{} {}", style("⚠").yellow(), msg);
}

/// Print a key-value pair.
pub fn kv(label: &str, value: impl Display) {
    println!("{label}: {value}");
}

/// Print a plain data line (for `get`, `load`, scripting-friendly output).
pub fn data(line: &str) {
    println!("{line}");
}

/// Format a key name in cyan for inline emphasis.
pub fn key(k: &str) -> String {
    style(k).cyan().to_string()
}
