use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Instant;

use log::info;
use serde::{Deserialize, Serialize};

use super::combine::{combine_files, DEFAULT_CAPACITY};
use crate::error::{Error, Result};

/// Width of a timeline bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeSpan {
    Day,
    Hour,
    Minute,
    Second,
}

impl TimeSpan {
    /// Truncate an ISO-8601 style timestamp (`2024-03-01T12:34:56`) to this span.
    pub fn bucket(self, timestamp: &str) -> String {
        let prefix = |n: usize| timestamp.chars().take(n).collect::<String>();
        match self {
            TimeSpan::Day => prefix(10),
            TimeSpan::Hour => prefix(13) + ":00",
            TimeSpan::Minute => prefix(16),
            TimeSpan::Second => prefix(19),
        }
    }
}

impl FromStr for TimeSpan {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "day" => Ok(TimeSpan::Day),
            "hour" => Ok(TimeSpan::Hour),
            "minute" => Ok(TimeSpan::Minute),
            "second" => Ok(TimeSpan::Second),
            _ => Err(Error::InvalidTimeSpan(s.to_string())),
        }
    }
}

impl fmt::Display for TimeSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TimeSpan::Day => "day",
            TimeSpan::Hour => "hour",
            TimeSpan::Minute => "minute",
            TimeSpan::Second => "second",
        };
        f.write_str(name)
    }
}

/// Row counts per cluster within one time bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeDataGroup {
    pub timestamp: String,
    pub count_per_cluster: Vec<usize>,
}

/// Parameters for [`timeline`].
#[derive(Debug, Clone)]
pub struct TimelineRequest<'a> {
    pub data_path: &'a Path,
    pub labels_path: &'a Path,
    pub k: usize,
    pub timestamp_index: usize,
    pub span: TimeSpan,
    pub delimiter: u8,
}

/// Count rows per cluster per time bucket.
///
/// Streams the raw dataset alongside a label side file (one label per line,
/// both with a header; blank lines are not rows) and groups rows by their truncated timestamp. Rows
/// labelled `-1` are not counted. Buckets come back in key order.
pub fn timeline(request: &TimelineRequest<'_>) -> Result<Vec<TimeDataGroup>> {
    let start = Instant::now();
    let delimiter = request.delimiter as char;
    let mut groups: BTreeMap<String, Vec<usize>> = BTreeMap::new();

    let lines = combine_files(
        request.data_path,
        request.labels_path,
        request.delimiter,
        DEFAULT_CAPACITY,
    )?;
    for (line_number, line) in lines.enumerate().skip(1) {
        let line = line?;
        let fields: Vec<&str> = line.split(delimiter).collect();
        // label column was appended last by the combiner
        let label_field = fields.last().copied().unwrap_or_default();
        let Some(cluster) = parse_label(label_field, request.k, line_number)? else {
            continue;
        };
        let timestamp = fields
            .get(request.timestamp_index)
            .filter(|_| request.timestamp_index + 1 < fields.len())
            .ok_or_else(|| Error::AttributeOutOfRange {
                index: request.timestamp_index,
                columns: fields.len().saturating_sub(1),
            })?;

        groups
            .entry(request.span.bucket(timestamp))
            .or_insert_with(|| vec![0; request.k])[cluster] += 1;
    }

    info!(
        "timeline for k = {} by {} produced {} buckets in {:?}",
        request.k,
        request.span,
        groups.len(),
        start.elapsed()
    );
    Ok(groups
        .into_iter()
        .map(|(timestamp, count_per_cluster)| TimeDataGroup {
            timestamp,
            count_per_cluster,
        })
        .collect())
}

fn parse_label(field: &str, k: usize, line_number: usize) -> Result<Option<usize>> {
    let label: i64 = field.trim().parse().map_err(|_| Error::InvalidParameter {
        name: "labels",
        message: format!("line {line_number}: {field:?} is not a cluster label"),
    })?;
    if label < 0 {
        return Ok(None);
    }
    match usize::try_from(label) {
        Ok(cluster) if cluster < k => Ok(Some(cluster)),
        _ => Err(Error::InvalidParameter {
            name: "labels",
            message: format!("line {line_number}: label {label} out of range for k = {k}"),
        }),
    }
}
