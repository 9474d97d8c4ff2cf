use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// One parsed line: a value per selected attribute.
pub type Row = Vec<f64>;

/// Something that can be read from the top any number of times.
///
/// Every call to [`RowSource::rows`] starts a fresh, independent pass.
pub trait RowSource {
    type Rows<'a>: Iterator<Item = Result<Row>>
    where
        Self: 'a;

    fn rows(&self) -> Result<Self::Rows<'_>>;
}

/// A delimited text file with a header line.
#[derive(Debug, Clone)]
pub struct CsvSource {
    path: PathBuf,
    attribute_indices: Vec<usize>,
    delimiter: u8,
}

impl CsvSource {
    /// An empty `attribute_indices` selects every column.
    pub fn new(path: impl AsRef<Path>, attribute_indices: Vec<usize>, delimiter: u8) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            attribute_indices,
            delimiter,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn attribute_indices(&self) -> &[usize] {
        &self.attribute_indices
    }
}

impl RowSource for CsvSource {
    type Rows<'a> = RowStream<BufReader<File>>
    where
        Self: 'a;

    fn rows(&self) -> Result<Self::Rows<'_>> {
        let file = File::open(&self.path).map_err(|e| Error::io(&self.path, e))?;
        Ok(RowStream::new(
            BufReader::new(file),
            self.path.clone(),
            self.attribute_indices.clone(),
            self.delimiter,
        ))
    }
}

impl RowSource for [Row] {
    type Rows<'a> = SliceRows<'a>
    where
        Self: 'a;

    fn rows(&self) -> Result<Self::Rows<'_>> {
        Ok(SliceRows { rows: self.iter() })
    }
}

/// Rows held in memory, mostly useful for tests and benchmarks.
pub struct SliceRows<'a> {
    rows: std::slice::Iter<'a, Row>,
}

impl Iterator for SliceRows<'_> {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        self.rows.next().map(|row| Ok(row.clone()))
    }
}

/// Pull-based reader yielding one numeric row per data line.
///
/// The first line is treated as a header and skipped. Blank lines are ignored.
/// Fields that fail to parse (or selected columns missing from a short line)
/// become `NaN`; filtering those is the caller's job.
pub struct RowStream<R> {
    reader: R,
    path: PathBuf,
    attribute_indices: Vec<usize>,
    delimiter: char,
    line: Vec<u8>,
    header_skipped: bool,
    rows: usize,
    width: Option<usize>,
}

impl<R: BufRead> RowStream<R> {
    pub fn new(
        reader: R,
        path: impl Into<PathBuf>,
        attribute_indices: Vec<usize>,
        delimiter: u8,
    ) -> Self {
        Self {
            reader,
            path: path.into(),
            attribute_indices,
            delimiter: delimiter as char,
            line: Vec::new(),
            header_skipped: false,
            rows: 0,
            width: None,
        }
    }

    /// Number of data rows yielded so far.
    pub fn rows_read(&self) -> usize {
        self.rows
    }

    fn parse(&mut self) -> Result<Row> {
        // invalid UTF-8 decodes to U+FFFD and then fails to parse as a number
        let text = String::from_utf8_lossy(&self.line);
        let line = text.trim_end_matches(['\n', '\r']);
        let row: Row = if self.attribute_indices.is_empty() {
            line.split(self.delimiter).map(parse_field).collect()
        } else {
            let fields: Vec<&str> = line.split(self.delimiter).collect();
            self.attribute_indices
                .iter()
                .map(|&i| fields.get(i).map_or(f64::NAN, |f| parse_field(f)))
                .collect()
        };

        // Selected columns always produce the same width; only "all columns" can drift.
        match self.width {
            Some(expected) if expected != row.len() => {
                return Err(Error::DimensionMismatch {
                    row: self.rows,
                    expected,
                    found: row.len(),
                })
            }
            None => self.width = Some(row.len()),
            _ => {}
        }
        Ok(row)
    }
}

impl<R: BufRead> Iterator for RowStream<R> {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.line.clear();
            match self.reader.read_until(b'\n', &mut self.line) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(e) => return Some(Err(Error::io(&self.path, e))),
            }
            if !self.header_skipped {
                self.header_skipped = true;
                continue;
            }
            if self.line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            let row = self.parse();
            self.rows += 1;
            return Some(row);
        }
    }
}

/// Parse one field, mapping anything non-numeric to `NaN`.
pub fn parse_field(field: &str) -> f64 {
    field.trim().parse::<f64>().unwrap_or(f64::NAN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn stream(text: &str, indices: Vec<usize>) -> RowStream<Cursor<Vec<u8>>> {
        RowStream::new(Cursor::new(text.as_bytes().to_vec()), "test.csv", indices, b',')
    }

    #[test]
    fn test_skips_header() {
        let rows: Vec<Row> = stream("a,b\n1,2\n3,4\n", vec![])
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(rows, vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
    }

    #[test]
    fn test_selects_attributes() {
        let rows: Vec<Row> = stream("a,b,c\n1,2,3\n4,5,6", vec![2, 0])
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(rows, vec![vec![3.0, 1.0], vec![6.0, 4.0]]);
    }

    #[test]
    fn test_malformed_fields_become_nan() {
        let rows: Vec<Row> = stream("a,b\nx,2\n", vec![0, 1, 5])
            .collect::<Result<_>>()
            .unwrap();
        assert!(rows[0][0].is_nan());
        assert_eq!(rows[0][1], 2.0);
        assert!(rows[0][2].is_nan());
    }

    #[test]
    fn test_crlf_and_blank_lines() {
        let mut s = stream("a\r\n0.5\r\n\r\n0.25\r\n", vec![]);
        assert_eq!(s.next().unwrap().unwrap(), vec![0.5]);
        assert_eq!(s.next().unwrap().unwrap(), vec![0.25]);
        assert!(s.next().is_none());
        assert_eq!(s.rows_read(), 2);
    }

    #[test]
    fn test_invalid_utf8_is_data() {
        let bytes = b"name,x\ncaf\xe9,0.1\nbar,0.9\n\xff\xfe,0.5\n".to_vec();
        let read = |indices| {
            RowStream::new(Cursor::new(bytes.clone()), "latin1.csv", indices, b',')
                .collect::<Result<Vec<Row>>>()
                .unwrap()
        };
        assert_eq!(read(vec![1]), vec![vec![0.1], vec![0.9], vec![0.5]]);

        let rows = read(vec![0, 1]);
        assert!(rows[0][0].is_nan());
        assert_eq!(rows[0][1], 0.1);
    }

    #[test]
    fn test_header_only() {
        assert_eq!(stream("a,b\n", vec![]).count(), 0);
        assert_eq!(stream("", vec![]).count(), 0);
    }

    #[test]
    fn test_ragged_rows_rejected_without_selection() {
        let result: Result<Vec<Row>> = stream("a,b\n1,2\n3\n", vec![]).collect();
        assert!(matches!(
            result,
            Err(Error::DimensionMismatch { row: 1, expected: 2, found: 1 })
        ));
    }

    #[test]
    fn test_missing_file() {
        let source = CsvSource::new("/definitely/not/here.csv", vec![0], b',');
        assert!(matches!(source.rows(), Err(Error::Io { .. })));
    }

    #[test]
    fn test_slice_source_restarts() {
        let data: Vec<Row> = vec![vec![1.0], vec![2.0]];
        let source: &[Row] = &data;
        assert_eq!(source.rows().unwrap().count(), 2);
        assert_eq!(source.rows().unwrap().count(), 2);
    }
}
