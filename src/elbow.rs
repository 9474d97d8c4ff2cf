//! Parallel elbow computation.
//!
//! The orchestrator sends one [`StartClusterTask`] per k in `1..=K_MAX` to a
//! fixed pool of workers. Each worker opens its own row stream, runs a
//! [`KMeansTask`] with its own generator and replies with exactly one
//! `Result<ClusterTaskResult>`. Nothing mutable is shared except the
//! cancellation flag raised when the first task fails.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use crossbeam_channel::bounded;
use log::{error, info, warn};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::{Deserialize, Serialize};

use crate::config::{ElbowConfig, K_MAX};
use crate::data::CsvSource;
use crate::error::{Error, Result};
use crate::kmeans::{CancelToken, KMeansTask, Label};

/// Request sent to a cluster worker.
#[derive(Debug, Clone, PartialEq)]
pub struct StartClusterTask {
    pub path: PathBuf,
    pub attribute_indices: Vec<usize>,
    pub delimiter: u8,
    pub k: usize,
    pub max_iterations: usize,
    pub batch_size: usize,
    pub tolerance: f64,
    /// Seed of the run; the worker uses ChaCha stream `k` of it.
    pub seed: u64,
}

/// Reply from a cluster worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterTaskResult {
    pub k: usize,
    pub wcss: f64,
    pub labels: Vec<Label>,
}

/// The elbow curve: one WCSS per k.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElbowResult {
    pub attribute_names: Vec<String>,
    pub wcss: Vec<f64>,
    pub k: Vec<usize>,
}

impl ElbowResult {
    /// Assemble the curve from one result per k in `1..=results.len()`.
    pub fn from_tasks(attribute_names: Vec<String>, results: &[ClusterTaskResult]) -> Result<Self> {
        for (i, result) in results.iter().enumerate() {
            if result.k != i + 1 {
                return Err(Error::InvalidParameter {
                    name: "results",
                    message: format!("expected k = {} at position {i}, found k = {}", i + 1, result.k),
                });
            }
        }
        Ok(Self {
            attribute_names,
            wcss: results.iter().map(|r| r.wcss).collect(),
            k: results.iter().map(|r| r.k).collect(),
        })
    }
}

/// Everything an elbow run produced.
#[derive(Debug, Clone)]
pub struct ElbowOutcome {
    pub elbow: ElbowResult,
    /// Per-k results ordered by k.
    pub tasks: Vec<ClusterTaskResult>,
}

impl ElbowOutcome {
    pub fn labels(&self, k: usize) -> Option<&[Label]> {
        self.tasks
            .iter()
            .find(|t| t.k == k)
            .map(|t| t.labels.as_slice())
    }
}

/// Body of a cluster worker: stream the file and run k-means for one k.
pub fn run_cluster_task(task: &StartClusterTask, cancel: &CancelToken) -> Result<ClusterTaskResult> {
    let source = CsvSource::new(&task.path, task.attribute_indices.clone(), task.delimiter);
    let mut rng = ChaCha20Rng::seed_from_u64(task.seed);
    rng.set_stream(task.k as u64);

    let fit = KMeansTask::new(&source, task.k)
        .with_max_iterations(task.max_iterations)
        .with_batch_size(task.batch_size)
        .with_tolerance(task.tolerance)
        .with_cancel(cancel.clone())
        .run(&mut rng)?;

    Ok(ClusterTaskResult {
        k: fit.k,
        wcss: fit.wcss,
        labels: fit.labels,
    })
}

type Runner = dyn Fn(&StartClusterTask, &CancelToken) -> Result<ClusterTaskResult> + Send + Sync;

/// Runs k-means for every k in `1..=K_MAX` concurrently and joins the results.
pub struct ElbowOrchestrator {
    config: ElbowConfig,
    pool: ThreadPool,
}

impl ElbowOrchestrator {
    pub fn new(config: ElbowConfig) -> Result<Self> {
        config.validate()?;
        let pool = ThreadPoolBuilder::new()
            .num_threads(K_MAX)
            .thread_name(|i| format!("kmeans-worker-{i}"))
            .panic_handler(|_| error!("cluster worker panicked"))
            .build()?;
        Ok(Self { config, pool })
    }

    pub fn config(&self) -> &ElbowConfig {
        &self.config
    }

    /// One start message per k, all sharing the run's seed.
    pub fn start_messages(&self, seed: u64) -> Vec<StartClusterTask> {
        (1..=K_MAX)
            .map(|k| StartClusterTask {
                path: self.config.path.clone(),
                attribute_indices: self.config.attribute_indices.clone(),
                delimiter: self.config.delimiter,
                k,
                max_iterations: self.config.max_iterations,
                batch_size: self.config.batch_size,
                tolerance: self.config.tolerance,
                seed,
            })
            .collect()
    }

    /// Compute the elbow curve for the configured file.
    pub fn run(&self, attribute_names: Vec<String>) -> Result<ElbowOutcome> {
        self.run_with(attribute_names, run_cluster_task)
    }

    /// Like [`ElbowOrchestrator::run`] with a custom worker body.
    ///
    /// Fails with the first worker error; results of the other workers are
    /// discarded and still-running workers are cancelled.
    pub fn run_with<F>(&self, attribute_names: Vec<String>, runner: F) -> Result<ElbowOutcome>
    where
        F: Fn(&StartClusterTask, &CancelToken) -> Result<ClusterTaskResult> + Send + Sync + 'static,
    {
        let start = Instant::now();
        let seed = self.config.seed.unwrap_or_else(rand::random);
        info!(
            "elbow run on {} (seed {}, max_iterations {}, batch_size {})",
            self.config.path.display(),
            seed,
            self.config.max_iterations,
            self.config.batch_size
        );

        let runner: Arc<Runner> = Arc::new(runner);
        let cancel = CancelToken::new();
        let (tx, rx) = bounded(K_MAX);
        for message in self.start_messages(seed) {
            let (tx, cancel, runner) = (tx.clone(), cancel.clone(), Arc::clone(&runner));
            self.pool.spawn(move || {
                let k = message.k;
                let result = runner(&message, &cancel);
                // the orchestrator stops listening after the first failure
                if tx.send((k, result)).is_err() {
                    warn!("k = {k}: result dropped, run already failed");
                }
            });
        }
        drop(tx);

        let mut slots: Vec<Option<ClusterTaskResult>> = vec![None; K_MAX];
        for received in 0..K_MAX {
            match rx.recv() {
                Ok((_, Ok(result))) if (1..=K_MAX).contains(&result.k) => {
                    let k = result.k;
                    slots[k - 1] = Some(result);
                }
                Ok((k, Ok(result))) => {
                    cancel.cancel();
                    return Err(Error::InvalidParameter {
                        name: "k",
                        message: format!("worker for k = {k} replied for k = {}", result.k),
                    });
                }
                Ok((k, Err(e))) => {
                    error!("k = {k}: cluster task failed: {e}");
                    cancel.cancel();
                    return Err(e);
                }
                Err(_) => {
                    cancel.cancel();
                    return Err(Error::WorkerLost(K_MAX - received));
                }
            }
        }

        let tasks: Vec<ClusterTaskResult> = slots.into_iter().flatten().collect();
        if tasks.len() != K_MAX {
            return Err(Error::WorkerLost(K_MAX - tasks.len()));
        }
        let elbow = ElbowResult::from_tasks(attribute_names, &tasks)?;
        info!("elbow run finished in {:?}", start.elapsed());
        Ok(ElbowOutcome { elbow, tasks })
    }
}

/// Convenience wrapper: build an orchestrator and run it once.
pub fn compute_elbow(config: ElbowConfig, attribute_names: Vec<String>) -> Result<ElbowOutcome> {
    ElbowOrchestrator::new(config)?.run(attribute_names)
}
