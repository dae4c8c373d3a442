//! Output formatting utilities for the CLI
//!
//! Remote command output owns stdout, so status lines that could interleave
//! with it (progress and errors) go to stderr. Only the final result
//! of a transfer is printed to stdout.

use std::io::Write;

use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};
use radb_protocol::Welcome;

fn print_tagged(mut out: impl Write, color: Color, tag: &str, msg: &str) {
    let _ = crossterm::execute!(
        out,
        SetForegroundColor(color),
        Print(tag),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print a success message in green with a checkmark prefix
pub fn print_success(msg: &str) {
    print_tagged(std::io::stdout(), Color::Green, "✓ ", msg);
}

/// Print an error message in red with an X prefix
pub fn print_error(msg: &str) {
    print_tagged(std::io::stderr(), Color::Red, "✗ ", msg);
}

/// Print an informational message in cyan to stderr
pub fn print_info(msg: &str) {
    print_tagged(std::io::stderr(), Color::Cyan, "ℹ ", msg);
}

/// Describe the device greeting
pub fn format_welcome(welcome: &Welcome) -> String {
    let mut line = format!(
        "Connected! Mode: {}",
        welcome.mode.as_deref().unwrap_or("unknown")
    );
    if let Some(version) = &welcome.version {
        line.push_str(&format!(" (agent {})", version));
    }
    line
}

/// Human-readable byte count
pub fn format_bytes(bytes: usize) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}
