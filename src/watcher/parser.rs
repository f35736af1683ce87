//! Delimited file reader.
//!
//! Thin adapter over the `csv` crate: the first record is the header row,
//! records may have any width, and quoting is lenient. Leading whitespace is
//! dropped from every field before tokenizing, so a quoted field that follows
//! `, ` is still recognized as quoted.

use std::fs;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord};

use super::filter::delimiter_for;
use crate::error::ParseError;
use crate::storage::{FileRecord, ModStamp};
use crate::Result;

/// A source file read into memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedFile {
    /// Header row, stamp and identity of the source.
    pub record: FileRecord,
    /// Data rows, header excluded, widths as found in the file.
    pub rows: Vec<Vec<String>>,
}

/// Read `path` as a delimited file to be stored under `table_name`.
///
/// # Errors
///
/// Returns [`ParseError::Open`] if the file cannot be opened or has an
/// unrecognized extension, [`ParseError::Empty`] if it has no header row, and
/// [`ParseError::Decode`] if its content is not valid delimited text.
pub fn parse_file(path: &Path, table_name: impl Into<String>) -> Result<ParsedFile> {
    let source = path.display().to_string();

    let delimiter = delimiter_for(path).ok_or_else(|| ParseError::Open {
        path: source.clone(),
        reason: "unrecognized file extension".to_string(),
    })?;

    let mod_stamp = ModStamp::of_file(path).map_err(|e| ParseError::Open {
        path: source.clone(),
        reason: e.to_string(),
    })?;

    let bytes = fs::read(path).map_err(|e| ParseError::Open {
        path: source.clone(),
        reason: e.to_string(),
    })?;
    let text = String::from_utf8(bytes).map_err(|e| ParseError::Decode {
        path: source.clone(),
        reason: e.to_string(),
    })?;
    let text = trim_field_starts(&text, char::from(delimiter));

    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut records = reader.records();

    let header_fields = match records.next() {
        Some(first) => fields(&first.map_err(|e| read_error(&source, &e))?),
        None => return Err(ParseError::Empty { path: source }.into()),
    };

    let mut rows = Vec::new();
    for record in records {
        rows.push(fields(&record.map_err(|e| read_error(&source, &e))?));
    }

    tracing::trace!(path = %source, rows = rows.len(), "Parsed file");

    Ok(ParsedFile {
        record: FileRecord {
            path: path.to_path_buf(),
            table_name: table_name.into(),
            delimiter,
            header_fields,
            mod_stamp,
        },
        rows,
    })
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Scan {
    FieldStart,
    Unquoted,
    Quoted,
    QuoteSeen,
}

/// Drop whitespace at the start of every field, outside quotes.
///
/// The delimiter itself and line breaks are never dropped, so empty TSV
/// fields survive.
fn trim_field_starts(text: &str, delimiter: char) -> String {
    let mut out = String::with_capacity(text.len());
    let mut state = Scan::FieldStart;

    for c in text.chars() {
        let ends_field = c == delimiter || c == '\n' || c == '\r';
        state = match state {
            Scan::FieldStart if ends_field => Scan::FieldStart,
            Scan::FieldStart if c.is_whitespace() => continue,
            Scan::FieldStart if c == '"' => Scan::Quoted,
            Scan::FieldStart | Scan::Unquoted if ends_field => Scan::FieldStart,
            Scan::FieldStart | Scan::Unquoted => Scan::Unquoted,
            Scan::Quoted if c == '"' => Scan::QuoteSeen,
            Scan::Quoted => Scan::Quoted,
            Scan::QuoteSeen if c == '"' => Scan::Quoted,
            Scan::QuoteSeen if ends_field => Scan::FieldStart,
            Scan::QuoteSeen => Scan::Unquoted,
        };
        out.push(c);
    }
    out
}

fn fields(record: &StringRecord) -> Vec<String> {
    record.iter().map(ToString::to_string).collect()
}

fn read_error(path: &str, err: &csv::Error) -> ParseError {
    if err.is_io_error() {
        ParseError::Open {
            path: path.to_string(),
            reason: err.to_string(),
        }
    } else {
        ParseError::Decode {
            path: path.to_string(),
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use std::fs;
    use tempfile::TempDir;

    fn strings(cells: &[&str]) -> Vec<String> {
        cells.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_parse_csv() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("users.csv");
        fs::write(&path, "id,name\n1,Alice\n2,Bob\n").unwrap();

        let parsed = parse_file(&path, "users").unwrap();

        assert_eq!(parsed.record.table_name, "users");
        assert_eq!(parsed.record.delimiter, b',');
        assert_eq!(parsed.record.header_fields, strings(&["id", "name"]));
        assert_eq!(parsed.record.mod_stamp, ModStamp::of_file(&path).unwrap());
        assert_eq!(
            parsed.rows,
            vec![strings(&["1", "Alice"]), strings(&["2", "Bob"])]
        );
    }

    #[test]
    fn test_parse_tsv() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("sales.tsv");
        fs::write(&path, "region\tamount\nnorth\t1,000\n").unwrap();

        let parsed = parse_file(&path, "sales").unwrap();
        assert_eq!(parsed.record.delimiter, b'\t');
        assert_eq!(parsed.rows, vec![strings(&["north", "1,000"])]);
    }

    #[test]
    fn test_parse_trims_leading_space_and_keeps_uneven_rows() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("loose.csv");
        fs::write(&path, "a, b, c\n1,  2\n1,2,3,4\n").unwrap();

        let parsed = parse_file(&path, "loose").unwrap();
        assert_eq!(parsed.record.header_fields, strings(&["a", "b", "c"]));
        assert_eq!(
            parsed.rows,
            vec![strings(&["1", "2"]), strings(&["1", "2", "3", "4"])]
        );
    }

    #[test]
    fn test_parse_quoted_field_after_padded_delimiter() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("people.csv");
        fs::write(&path, "id, name\n1, \"Smith, John\"\n2,   \" padded\"\n").unwrap();

        let parsed = parse_file(&path, "people").unwrap();
        assert_eq!(parsed.record.header_fields, strings(&["id", "name"]));
        assert_eq!(
            parsed.rows,
            vec![strings(&["1", "Smith, John"]), strings(&["2", " padded"])]
        );
    }

    #[test]
    fn test_parse_tsv_keeps_empty_fields() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("gaps.tsv");
        fs::write(&path, "a\tb\tc\n1\t\t 3\n").unwrap();

        let parsed = parse_file(&path, "gaps").unwrap();
        assert_eq!(parsed.rows, vec![strings(&["1", "", "3"])]);
    }

    #[test]
    fn test_trim_field_starts() {
        assert_eq!(trim_field_starts("a, b,\t\"c, d\"\n x", ','), "a,b,\"c, d\"\nx");
        assert_eq!(trim_field_starts("\"a \"\" b\", c", ','), "\"a \"\" b\",c");
        assert_eq!(trim_field_starts("x y, z", ','), "x y,z");
    }

    #[test]
    fn test_parse_quoted_fields() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("quoted.csv");
        fs::write(&path, "name,note\n\"Smith, J\",\"said \"\"hi\"\"\"\n").unwrap();

        let parsed = parse_file(&path, "quoted").unwrap();
        assert_eq!(parsed.rows, vec![strings(&["Smith, J", "said \"hi\""])]);
    }

    #[test]
    fn test_parse_header_only() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("header.csv");
        fs::write(&path, "x,y\n").unwrap();

        let parsed = parse_file(&path, "header").unwrap();
        assert_eq!(parsed.record.header_fields, strings(&["x", "y"]));
        assert!(parsed.rows.is_empty());
    }

    #[test]
    fn test_parse_empty_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("empty.csv");
        fs::write(&path, "").unwrap();

        let err = parse_file(&path, "empty").unwrap_err();
        assert!(matches!(err, Error::Parse(ParseError::Empty { .. })));
    }

    #[test]
    fn test_parse_invalid_utf8() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("binary.csv");
        fs::write(&path, b"a,b\n\xff\xfe,1\n").unwrap();

        let err = parse_file(&path, "binary").unwrap_err();
        assert!(matches!(err, Error::Parse(ParseError::Decode { .. })));
    }

    #[test]
    fn test_parse_missing_file() {
        let err = parse_file(Path::new("/nonexistent/gone.csv"), "gone").unwrap_err();
        assert!(matches!(err, Error::Parse(ParseError::Open { .. })));
    }

    #[test]
    fn test_parse_unrecognized_extension() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("notes.txt");
        fs::write(&path, "a,b\n").unwrap();

        let err = parse_file(&path, "notes").unwrap_err();
        assert!(matches!(err, Error::Parse(ParseError::Open { .. })));
    }
}
