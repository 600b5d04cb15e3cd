//! G-code line classification and command helpers
//!
//! Everything here operates on single lines of slicer output. Lines are
//! held without their terminators; the file layer strips and restores
//! them. Classification is intentionally shallow: the preprocessor only
//! needs to recognize tool changes, linear moves, dwells, and heater
//! commands, and to pull whitespace-separated `LETTER NUMBER` parameters
//! out of a command.

use std::collections::HashMap;

use regex::Regex;

/// Index of an addressable tool (`T0`, `T1`, ...).
pub type ToolId = u16;

/// Marker substring stamped into the first line of every processed file.
///
/// Its presence in the first line is the sole idempotence check: a file
/// whose first line contains it is never processed again.
pub const FINGERPRINT_MARKER: &str = "processed by prepkit";

/// Returns true when the line is a comment line (first non-blank char is `;`).
pub fn is_comment(line: &str) -> bool {
    line.trim_start().starts_with(';')
}

/// Returns true when the line is empty or whitespace only.
pub fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

/// Split a line into its command part and trailing comment (including `;`).
///
/// Lines without a comment return the whole line and an empty comment.
pub fn split_comment(line: &str) -> (&str, &str) {
    match line.find(';') {
        Some(pos) => (&line[..pos], &line[pos..]),
        None => (line, ""),
    }
}

/// Leading command word of a line: the first letter and its integer code.
///
/// `G1 X10` yields `('G', 1)`, `M104 T0 S0` yields `('M', 104)`, `T3`
/// yields `('T', 3)`. Comment-only and blank lines yield `None`.
fn leading_word(line: &str) -> Option<(char, u32)> {
    static WORD_REGEX: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    let regex = WORD_REGEX
        .get_or_init(|| Regex::new(r"^\s*([A-Za-z])(\d+)").expect("invalid regex pattern"));

    let (command, _) = split_comment(line);
    let captures = regex.captures(command)?;
    let letter = captures[1].chars().next()?.to_ascii_uppercase();
    let number = captures[2].parse().ok()?;
    Some((letter, number))
}

/// Extract the tool index from a tool-change directive (`T2`, `t11 ; swap`).
///
/// Commands that merely carry a `T` parameter (`M104 T0 S0`) do not match,
/// since the word must lead the line.
pub fn extract_tool_number(line: &str) -> Option<ToolId> {
    match leading_word(line) {
        Some(('T', number)) => ToolId::try_from(number).ok(),
        _ => None,
    }
}

/// Returns true for linear motion commands (`G0`/`G1`, `G00`/`G01`).
pub fn is_linear_move(line: &str) -> bool {
    matches!(leading_word(line), Some(('G', 0 | 1)))
}

/// Returns true for dwell commands (`G4`/`G04`).
pub fn is_dwell(line: &str) -> bool {
    matches!(leading_word(line), Some(('G', 4)))
}

/// Returns true for hotend temperature commands (`M104`/`M109`).
pub fn is_heater_command(line: &str) -> bool {
    matches!(leading_word(line), Some(('M', 104 | 109)))
}

/// Parse the whitespace-separated `LETTER NUMBER` parameters of a command.
///
/// `G1 X10.5 Y-3 F3000` yields `{G: 1.0, X: 10.5, Y: -3.0, F: 3000.0}`.
/// The trailing comment is ignored; words that do not parse as a letter
/// followed by a number are skipped.
pub fn parse_params(line: &str) -> HashMap<char, f64> {
    let (command, _) = split_comment(line);
    let mut params = HashMap::new();
    for word in command.split_whitespace() {
        let mut chars = word.chars();
        let Some(letter) = chars.next() else { continue };
        if !letter.is_ascii_alphabetic() {
            continue;
        }
        if let Ok(value) = chars.as_str().parse::<f64>() {
            params.insert(letter.to_ascii_uppercase(), value);
        }
    }
    params
}

/// Format the temperature command for a tool (`M104 T<n> S<temp>`).
///
/// A target of zero is the shutdown command inserted by the scheduling
/// stages.
pub fn format_tool_temp_command(tool: ToolId, temperature: u32) -> String {
    format!("M104 T{} S{}", tool, temperature)
}

/// Build the fingerprint comment stamped as the first line of output.
pub fn fingerprint_line(slicer: Option<&str>) -> String {
    let version = env!("CARGO_PKG_VERSION");
    match slicer {
        Some(slicer) => format!("; {} v{} (slicer: {})", FINGERPRINT_MARKER, version, slicer),
        None => format!("; {} v{}", FINGERPRINT_MARKER, version),
    }
}

/// Returns true when a first line carries the fingerprint marker.
pub fn has_fingerprint(line: &str) -> bool {
    line.contains(FINGERPRINT_MARKER)
}

/// Parse a comma-separated list of tool indices (`"0, 2, 5"`).
///
/// Entries that do not parse as a tool index are ignored.
pub fn parse_tool_list(value: &str) -> Vec<ToolId> {
    value
        .split(',')
        .filter_map(|entry| entry.trim().parse().ok())
        .collect()
}
