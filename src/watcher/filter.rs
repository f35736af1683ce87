//! Source file recognition by extension.

use std::path::Path;

/// Recognized extensions and their field delimiters.
const DELIMITED_EXTENSIONS: &[(&str, u8)] = &[("csv", b','), ("tsv", b'\t')];

/// Field delimiter for a path, if its extension is recognized.
///
/// Matching is case-insensitive, so `DATA.CSV` is a comma-separated file.
#[must_use]
pub fn delimiter_for(path: &Path) -> Option<u8> {
    let ext = path.extension()?.to_str()?;
    DELIMITED_EXTENSIONS
        .iter()
        .find(|(known, _)| ext.eq_ignore_ascii_case(known))
        .map(|(_, delimiter)| *delimiter)
}

/// Check if a path names a delimited data file.
#[must_use]
pub fn is_delimited_file(path: &Path) -> bool {
    delimiter_for(path).is_some()
}
