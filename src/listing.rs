//! Hex listing format shared by assembler output and emulator input.
//!
//! One word per line, `AAAA WWWWWWWWWWWWWWWW`: a 4-hex-digit address,
//! a space, and the 16-hex-digit big-endian word. Lines are indexed by
//! the embedded address, never by position.

use tracing::warn;

/// Parses one listing line into an `(address, word)` pair.
///
/// Malformed lines yield `None`; loaders skip them with a diagnostic
/// since garbage-padded dumps are expected during development.
pub fn parse_line(line: &str) -> Option<(u64, u64)> {
    let mut parts = line.split_whitespace();
    let addr = u64::from_str_radix(parts.next()?, 16).ok()?;
    let word = u64::from_str_radix(parts.next()?, 16).ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some((addr, word))
}

pub fn format_line(addr: u64, word: u64) -> String {
    format!("{addr:04X} {word:016X}")
}

/// Parses a whole listing, skipping malformed lines with a warning.
pub fn parse_listing(text: &str) -> Vec<(u64, u64)> {
    let mut entries = Vec::new();
    for line in text.lines() {
        if line.trim().is_empty() {
            continue;
        }
        match parse_line(line) {
            Some(entry) => entries.push(entry),
            None => warn!(line, "skipping malformed listing line"),
        }
    }
    entries
}
