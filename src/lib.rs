//! Streaming, memory-bounded k-means over large delimited files.
//!
//! The main entry point is [`ElbowOrchestrator`], which clusters a file for
//! every k in `1..=10` on a pool of workers and returns the WCSS elbow curve
//! plus per-k row labels. Rows are streamed from disk on every pass, so only
//! the centroids and one label per row are ever resident.
//!
//! ```no_run
//! use elbow::{attribute_names, select_attribute_names, ElbowConfig, ElbowOrchestrator};
//!
//! let config = ElbowConfig::new("cars_normalized.csv")
//!     .with_attribute_indices(vec![1, 2])
//!     .with_max_iterations(50)
//!     .with_seed(7);
//! let names = select_attribute_names(&attribute_names(&config.path, b',')?, &[1, 2])?;
//! let outcome = ElbowOrchestrator::new(config)?.run(names)?;
//! println!("{:?}", outcome.elbow.wcss);
//! # Ok::<(), elbow::Error>(())
//! ```

pub mod cache;
pub mod config;
pub mod data;
pub mod elbow;
pub mod error;
pub mod kmeans;

pub use cache::{CacheKey, ResultCache};
pub use config::{ElbowConfig, K_MAX};
pub use data::{attribute_names, normalize_file, select_attribute_names, CsvSource, Row, RowSource};
pub use elbow::{
    compute_elbow, run_cluster_task, ClusterTaskResult, ElbowOrchestrator, ElbowOutcome,
    ElbowResult, StartClusterTask,
};
pub use error::{Error, Result};
pub use kmeans::{KMeansFit, KMeansTask, Label, UNASSIGNED};
