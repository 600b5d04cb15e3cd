//! Reading and committing G-code files as ordered line sequences
//!
//! A G-code file is treated as a sequence of lines without terminators.
//! Commits never write the target file in place: the rewritten content
//! goes to a sibling temporary file which is then renamed over the
//! original, so a failure at any point leaves the input untouched.

use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

/// Suffix appended to the input path for the temporary output file.
pub const PREPROCESSING_SUFFIX: &str = ".preprocessing";

/// Read a file into its ordered sequence of lines.
pub fn read_lines(path: &Path) -> io::Result<Vec<String>> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    reader.lines().collect()
}

/// Read only the first line of a file, if it has one.
pub fn first_line(path: &Path) -> io::Result<Option<String>> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut line = String::new();
    let bytes = reader.read_line(&mut line)?;
    if bytes == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
}

/// Sibling temporary path used while committing (`<path>.preprocessing`).
pub fn staging_path(path: &Path) -> PathBuf {
    let mut staged = path.as_os_str().to_os_string();
    staged.push(PREPROCESSING_SUFFIX);
    PathBuf::from(staged)
}

/// Write lines to the staging path, then rename it over the original.
///
/// The rename is the commit point: until it happens the original file is
/// not modified at all.
pub fn commit_lines(path: &Path, lines: &[String]) -> io::Result<()> {
    let staged = staging_path(path);
    {
        let file = File::create(&staged)?;
        let mut writer = BufWriter::new(file);
        for line in lines {
            writeln!(writer, "{}", line)?;
        }
        writer.flush()?;
    }
    debug!(
        "committing {} lines to {}",
        lines.len(),
        path.display()
    );
    fs::rename(&staged, path)
}
