//! On-disk memoization of elbow results and per-k label side files.
//!
//! Layout under the cache root, for a key `cars` / `[0, 2]` / 100 / 0:
//!
//! ```text
//! cars-0_2-100-0.elbow.json     ElbowResult as JSON
//! cars-0_2-100-0-k3.labels.csv  header `cluster`, then one label per row
//! ```

use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use log::debug;

use crate::elbow::{ElbowOutcome, ElbowResult};
use crate::error::{Error, Result};
use crate::kmeans::Label;

/// Entries older than this are recomputed.
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(60 * 60);

const LABEL_HEADER: &str = "cluster";

/// Identifies one elbow computation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub dataset: String,
    pub attribute_indices: Vec<usize>,
    pub max_iterations: usize,
    pub batch_size: usize,
}

impl CacheKey {
    fn stem(&self) -> String {
        let indices = self
            .attribute_indices
            .iter()
            .map(usize::to_string)
            .collect::<Vec<_>>()
            .join("_");
        let dataset: String = self
            .dataset
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        format!("{dataset}-{indices}-{}-{}", self.max_iterations, self.batch_size)
    }
}

/// Elbow results and label files kept in one directory.
#[derive(Debug, Clone)]
pub struct ResultCache {
    root: PathBuf,
    max_age: Option<Duration>,
}

impl ResultCache {
    /// Open (creating if needed) a cache rooted at `root`.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).map_err(|e| Error::io(&root, e))?;
        Ok(Self {
            root,
            max_age: Some(DEFAULT_MAX_AGE),
        })
    }

    /// `None` keeps entries forever.
    pub fn with_max_age(mut self, max_age: Option<Duration>) -> Self {
        self.max_age = max_age;
        self
    }

    pub fn elbow_path(&self, key: &CacheKey) -> PathBuf {
        self.root.join(format!("{}.elbow.json", key.stem()))
    }

    pub fn labels_path(&self, key: &CacheKey, k: usize) -> PathBuf {
        self.root.join(format!("{}-k{k}.labels.csv", key.stem()))
    }

    /// The cached curve, if present and fresh.
    pub fn load_elbow(&self, key: &CacheKey) -> Result<Option<ElbowResult>> {
        let path = self.elbow_path(key);
        if !self.is_fresh(&path)? {
            return Ok(None);
        }
        let file = File::open(&path).map_err(|e| Error::io(&path, e))?;
        let elbow = serde_json::from_reader(BufReader::new(file))?;
        debug!("cache hit {}", path.display());
        Ok(Some(elbow))
    }

    pub fn store_elbow(&self, key: &CacheKey, elbow: &ElbowResult) -> Result<PathBuf> {
        let path = self.elbow_path(key);
        let file = File::create(&path).map_err(|e| Error::io(&path, e))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, elbow)?;
        writer.flush().map_err(|e| Error::io(&path, e))?;
        Ok(path)
    }

    /// Cached labels for one k, if present and fresh.
    pub fn load_labels(&self, key: &CacheKey, k: usize) -> Result<Option<Vec<Label>>> {
        let path = self.labels_path(key, k);
        if !self.is_fresh(&path)? {
            return Ok(None);
        }
        read_labels(&path).map(Some)
    }

    pub fn store_labels(&self, key: &CacheKey, k: usize, labels: &[Label]) -> Result<PathBuf> {
        let path = self.labels_path(key, k);
        write_labels(&path, labels)?;
        Ok(path)
    }

    /// Persist the curve and every label file of an outcome.
    pub fn store_outcome(&self, key: &CacheKey, outcome: &ElbowOutcome) -> Result<()> {
        for task in &outcome.tasks {
            self.store_labels(key, task.k, &task.labels)?;
        }
        self.store_elbow(key, &outcome.elbow)?;
        Ok(())
    }

    fn is_fresh(&self, path: &Path) -> Result<bool> {
        let metadata = match fs::metadata(path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(Error::io(path, e)),
        };
        let Some(max_age) = self.max_age else {
            return Ok(true);
        };
        let modified = metadata.modified().map_err(|e| Error::io(path, e))?;
        let age = SystemTime::now()
            .duration_since(modified)
            .unwrap_or(Duration::ZERO);
        Ok(age <= max_age)
    }
}

/// Write a label side file: a `cluster` header, then one label per line.
pub fn write_labels(path: impl AsRef<Path>, labels: &[Label]) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|e| Error::io(path, e))?;
    let mut writer = BufWriter::new(file);
    let write = |w: &mut BufWriter<File>| -> std::io::Result<()> {
        writeln!(w, "{LABEL_HEADER}")?;
        for label in labels {
            writeln!(w, "{label}")?;
        }
        w.flush()
    };
    write(&mut writer).map_err(|e| Error::io(path, e))
}

pub fn read_labels(path: impl AsRef<Path>) -> Result<Vec<Label>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    let mut labels = Vec::new();
    for (line_number, line) in BufReader::new(file).lines().enumerate().skip(1) {
        let line = line.map_err(|e| Error::io(path, e))?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let label = line.parse().map_err(|_| Error::InvalidParameter {
            name: "labels",
            message: format!("{}:{}: {line:?} is not a label", path.display(), line_number + 1),
        })?;
        labels.push(label);
    }
    Ok(labels)
}
