use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::{Error, Result};

/// Read the column names from the header line of `path`.
pub fn attribute_names(path: impl AsRef<Path>, delimiter: u8) -> Result<Vec<String>> {
    let header = header_line(path.as_ref())?;
    Ok(split_header(&header, delimiter))
}

/// The raw first line of `path`, without its line terminator.
pub(crate) fn header_line(path: &Path) -> Result<String> {
    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    let mut header = Vec::new();
    let read = BufReader::new(file)
        .read_until(b'\n', &mut header)
        .map_err(|e| Error::io(path, e))?;
    if read == 0 {
        return Err(Error::MissingHeader(path.to_path_buf()));
    }
    let header = String::from_utf8_lossy(&header);
    Ok(header.trim_end_matches(['\n', '\r']).to_string())
}

/// Split a header line into trimmed, unquoted names.
pub fn split_header(header: &str, delimiter: u8) -> Vec<String> {
    header
        .trim_end_matches(['\n', '\r'])
        .trim_start_matches('\u{feff}')
        .split(delimiter as char)
        .map(|name| name.trim().trim_matches('"').to_string())
        .collect()
}

/// Pick the names of the selected columns, in selection order.
/// An empty selection means every column.
pub fn select_attribute_names(names: &[String], indices: &[usize]) -> Result<Vec<String>> {
    if indices.is_empty() {
        return Ok(names.to_vec());
    }
    indices
        .iter()
        .map(|&index| {
            names.get(index).cloned().ok_or_else(|| Error::AttributeOutOfRange {
                index,
                columns: names.len(),
            })
        })
        .collect()
}
