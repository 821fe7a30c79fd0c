//! Lazy reader for newline-delimited JSON files

use std::fs::File;
use std::io::{BufRead, BufReader, ErrorKind};
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::{Error, Result};

/// One JSON object read from a source file
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRecord {
    /// 1-based line number in the source file
    pub line: usize,
    pub fields: Map<String, Value>,
}

/// Iterator over the records of a JSON-lines file
///
/// Each non-blank line must hold one JSON object. The iterator stops after the
/// first error; reading again means opening the file again.
pub struct JsonlReader<R> {
    reader: R,
    path: PathBuf,
    line: usize,
    buf: String,
    finished: bool,
}

impl JsonlReader<BufReader<File>> {
    /// Open a file for reading
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| Error::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(Self::new(BufReader::new(file), path))
    }
}

impl<R: BufRead> JsonlReader<R> {
    /// Wrap any buffered reader; `path` is only used in error messages
    pub fn new(reader: R, path: impl Into<PathBuf>) -> Self {
        Self {
            reader,
            path: path.into(),
            line: 0,
            buf: String::new(),
            finished: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of lines consumed so far
    pub fn lines_read(&self) -> usize {
        self.line
    }

    fn parse_error(&self, message: impl Into<String>) -> Error {
        Error::Parse {
            path: self.path.clone(),
            line: self.line,
            message: message.into(),
        }
    }

    fn read_record(&mut self) -> Option<Result<SourceRecord>> {
        loop {
            self.buf.clear();
            match self.reader.read_line(&mut self.buf) {
                Ok(0) => return None,
                Ok(_) => self.line += 1,
                Err(e) if e.kind() == ErrorKind::InvalidData => {
                    self.line += 1;
                    return Some(Err(self.parse_error("line is not valid UTF-8")));
                }
                Err(e) => {
                    return Some(Err(Error::Io {
                        path: self.path.clone(),
                        source: e,
                    }))
                }
            }

            let text = self.buf.trim();
            if text.is_empty() {
                continue;
            }

            return Some(match serde_json::from_str::<Value>(text) {
                Ok(Value::Object(fields)) => Ok(SourceRecord {
                    line: self.line,
                    fields,
                }),
                Ok(_) => Err(self.parse_error("expected a JSON object")),
                Err(e) => Err(self.parse_error(e.to_string())),
            });
        }
    }
}

impl<R: BufRead> Iterator for JsonlReader<R> {
    type Item = Result<SourceRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let item = self.read_record();
        if !matches!(item, Some(Ok(_))) {
            self.finished = true;
        }
        item
    }
}

impl<R: BufRead> std::iter::FusedIterator for JsonlReader<R> {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn reader(text: &str) -> JsonlReader<Cursor<Vec<u8>>> {
        JsonlReader::new(Cursor::new(text.as_bytes().to_vec()), "test.json")
    }

    #[test]
    fn test_reads_records_with_line_numbers() {
        let records: Vec<SourceRecord> = reader("{\"a\":1}\n\n{\"a\":2}\n")
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].line, 1);
        assert_eq!(records[1].line, 3);
        assert_eq!(records[1].fields["a"], serde_json::json!(2));
    }

    #[test]
    fn test_last_line_without_newline() {
        let records: Vec<SourceRecord> = reader("{\"a\":1}\n{\"a\":2}")
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_malformed_line_stops_iteration() {
        let mut r = reader("{\"a\":1}\n{\"a\":2}\n{\"a\":\n{\"a\":4}\n");
        assert!(r.next().unwrap().is_ok());
        assert!(r.next().unwrap().is_ok());
        match r.next() {
            Some(Err(Error::Parse { line, path, .. })) => {
                assert_eq!(line, 3);
                assert_eq!(path, PathBuf::from("test.json"));
            }
            other => panic!("expected parse error, got {:?}", other),
        }
        assert!(r.next().is_none());
    }

    #[test]
    fn test_non_object_line_is_parse_error() {
        let mut r = reader("[1, 2, 3]\n");
        let err = r.next().unwrap().unwrap_err();
        assert!(matches!(err, Error::Parse { line: 1, .. }));
    }

    #[test]
    fn test_invalid_utf8_is_parse_error() {
        let mut bytes = b"{\"a\":1}\n".to_vec();
        bytes.extend_from_slice(&[0xff, 0xfe, b'\n']);
        let mut r = JsonlReader::new(Cursor::new(bytes), "bad.json");
        assert!(r.next().unwrap().is_ok());
        let err = r.next().unwrap().unwrap_err();
        assert!(matches!(err, Error::Parse { line: 2, .. }));
    }

    #[test]
    fn test_open_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = JsonlReader::open(&dir.path().join("missing.json"))
            .err()
            .unwrap();
        assert!(matches!(err, Error::Io { .. }));
    }
}
