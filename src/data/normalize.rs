use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use log::info;

use super::attributes::header_line;
use super::rows::{CsvSource, RowSource};
use crate::error::{Error, Result};

/// Value written for cells that cannot be mapped into [0, 1]
/// (unparseable values, constant or all-missing columns).
pub const FALLBACK_VALUE: f64 = 0.5;

/// Per-column extent observed during the first normalization pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnRanges {
    pub min: Vec<f64>,
    pub max: Vec<f64>,
    pub rows: usize,
}

impl ColumnRanges {
    fn observe(&mut self, row: &[f64]) {
        if self.min.is_empty() {
            self.min = vec![f64::INFINITY; row.len()];
            self.max = vec![f64::NEG_INFINITY; row.len()];
        }
        for ((value, min), max) in row.iter().zip(&mut self.min).zip(&mut self.max) {
            if value.is_nan() {
                continue;
            }
            *min = min.min(*value);
            *max = max.max(*value);
        }
        self.rows += 1;
    }

    /// Map `value` in column `column` into [0, 1].
    pub fn scale(&self, column: usize, value: f64) -> f64 {
        let (min, max) = (self.min[column], self.max[column]);
        let scaled = (value - min) / (max - min);
        if scaled.is_finite() {
            scaled
        } else {
            FALLBACK_VALUE
        }
    }
}

/// `data/cars.csv` -> `data/cars_normalized.csv`.
pub fn normalized_path(input: impl AsRef<Path>) -> PathBuf {
    let input = input.as_ref();
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    input.with_file_name(format!("{stem}_normalized.csv"))
}

/// Scan every column for its min and max in one streaming pass.
pub fn column_ranges(input: impl AsRef<Path>, delimiter: u8) -> Result<ColumnRanges> {
    let source = CsvSource::new(input, Vec::new(), delimiter);
    let mut ranges = ColumnRanges {
        min: Vec::new(),
        max: Vec::new(),
        rows: 0,
    };
    for row in source.rows()? {
        ranges.observe(&row?);
    }
    Ok(ranges)
}

/// Min-max normalize every column of `input` into `output`.
///
/// Two streaming passes; the header is copied unchanged.
pub fn normalize_file(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    delimiter: u8,
) -> Result<ColumnRanges> {
    let (input, output) = (input.as_ref(), output.as_ref());
    let start = Instant::now();
    let ranges = column_ranges(input, delimiter)?;

    let header = header_line(input)?;
    let file = File::create(output).map_err(|e| Error::io(output, e))?;
    let mut writer = BufWriter::new(file);
    let write_err = |e| Error::io(output, e);
    writeln!(writer, "{header}").map_err(write_err)?;

    let separator = (delimiter as char).to_string();
    let source = CsvSource::new(input, Vec::new(), delimiter);
    for row in source.rows()? {
        let line = row?
            .iter()
            .enumerate()
            .map(|(column, &value)| ranges.scale(column, value).to_string())
            .collect::<Vec<_>>()
            .join(&separator);
        writeln!(writer, "{line}").map_err(write_err)?;
    }
    writer.flush().map_err(write_err)?;

    info!(
        "normalized {} rows x {} columns into {} in {:?}",
        ranges.rows,
        ranges.min.len(),
        output.display(),
        start.elapsed()
    );
    Ok(ranges)
}
