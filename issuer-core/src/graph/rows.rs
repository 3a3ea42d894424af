//! CSV row reading

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use csv::ReaderBuilder;
use tracing::debug;

use crate::Result;

/// One CSV data row keyed by lower-cased column name
pub type Row = HashMap<String, String>;

/// Read all data rows of the CSV file at `path`
pub fn read_rows(path: &Path) -> Result<Vec<Row>> {
    let file = File::open(path)?;
    let rows = rows_from_reader(BufReader::new(file))?;
    debug!(path = %path.display(), rows = rows.len(), "Read CSV rows");
    Ok(rows)
}

/// Read CSV data rows from `reader`; the first record is the header
pub fn rows_from_reader<R: Read>(reader: R) -> Result<Vec<Row>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers: Vec<String> = rdr
        .headers()?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim().to_lowercase())
        .collect();

    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result?;
        let row: Row = headers
            .iter()
            .cloned()
            .zip(record.iter().map(str::to_string))
            .collect();
        rows.push(row);
    }

    Ok(rows)
}

/// Get the trimmed value of `column`, empty when absent
pub(crate) fn field<'a>(row: &'a Row, column: &str) -> &'a str {
    row.get(column).map(|s| s.trim()).unwrap_or_default()
}

/// Get the trimmed value of `column`, `None` when absent or blank
pub(crate) fn optional_field(row: &Row, column: &str) -> Option<String> {
    let value = field(row, column);
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_headers_are_normalized() {
        let data = "\u{feff}Title, BODY ,extra\nT,B,x\n";
        let rows = rows_from_reader(data.as_bytes()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["title"], "T");
        assert_eq!(rows[0]["body"], "B");
        assert_eq!(rows[0]["extra"], "x");
    }

    #[test]
    fn test_short_rows_leave_columns_missing() {
        let data = "title,body,labels\nT,B\n";
        let rows = rows_from_reader(data.as_bytes()).unwrap();
        assert_eq!(field(&rows[0], "labels"), "");
        assert_eq!(optional_field(&rows[0], "labels"), None);
        assert_eq!(optional_field(&rows[0], "title"), Some("T".to_string()));
    }

    #[test]
    fn test_multiline_quoted_values() {
        let data = "title,body\nT,\"line one\nline two\"\n";
        let rows = rows_from_reader(data.as_bytes()).unwrap();
        assert_eq!(rows[0]["body"], "line one\nline two");
    }

    #[test]
    fn test_read_rows_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "title,body").unwrap();
        writeln!(file, "A,first").unwrap();
        writeln!(file, "B,second").unwrap();

        let rows = read_rows(file.path()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1]["title"], "B");
    }

    #[test]
    fn test_read_rows_missing_file() {
        let err = read_rows(Path::new("/nonexistent/issues.csv")).unwrap_err();
        assert!(matches!(err, crate::Error::Io(_)));
    }
}
