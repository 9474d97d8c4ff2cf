//! elbow CLI - streaming k-means elbow curves for large CSV files

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use env_logger::Env;
use log::info;

use elbow::cache::{CacheKey, ResultCache};
use elbow::data::normalize::normalized_path;
use elbow::data::timeline::{timeline, TimeSpan, TimelineRequest};
use elbow::{
    attribute_names, normalize_file, select_attribute_names, ElbowConfig, ElbowOrchestrator,
    ElbowResult, Error, Result, K_MAX,
};

#[derive(Parser)]
#[command(name = "elbow")]
#[command(author, version, about = "Streaming k-means elbow curves for large delimited files", long_about = None)]
struct Cli {
    /// Field delimiter
    #[arg(short, long, global = true, default_value_t = ',')]
    delimiter: char,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the column names of a file
    Attributes {
        /// Path to the delimited file
        file: PathBuf,
    },

    /// Min-max normalize every column into <file>_normalized.csv
    Normalize {
        /// Path to the delimited file
        file: PathBuf,
    },

    /// Cluster a file for k = 1..10 and print the elbow curve
    Cluster {
        /// Path to the delimited file
        file: PathBuf,

        /// Columns to cluster on (comma-separated indices, default all)
        #[arg(short, long, value_delimiter = ',')]
        attributes: Vec<usize>,

        /// Maximum assignment passes per k
        #[arg(short, long, default_value_t = 100)]
        max_iterations: usize,

        /// Mini-batch size (0 = full batch)
        #[arg(short, long, default_value_t = 0)]
        batch_size: usize,

        /// Random seed for reproducible runs
        #[arg(short, long)]
        seed: Option<u64>,

        /// Directory for memoized results and label files
        #[arg(long)]
        cache_dir: Option<PathBuf>,

        /// The file is already normalized to [0, 1]
        #[arg(long)]
        no_normalize: bool,
    },

    /// Count rows per cluster per time bucket
    Timeline {
        /// Path to the raw delimited file
        file: PathBuf,

        /// Label side file written by `cluster --cache-dir`
        #[arg(short, long)]
        labels: PathBuf,

        /// Number of clusters the labels were computed with
        #[arg(short, long)]
        k: usize,

        /// Index of the timestamp column
        #[arg(short, long)]
        timestamp_index: usize,

        /// Bucket width (day, hour, minute, second)
        #[arg(long, default_value = "day")]
        span: TimeSpan,
    },
}

fn main() -> Result<()> {
    env_logger::init_from_env(Env::default().filter_or("RUST_LOG", "info"));
    let cli = Cli::parse();
    let delimiter = delimiter_byte(cli.delimiter)?;

    match cli.command {
        Commands::Attributes { file } => attributes_command(&file, delimiter),
        Commands::Normalize { file } => normalize_command(&file, delimiter),
        Commands::Cluster {
            file,
            attributes,
            max_iterations,
            batch_size,
            seed,
            cache_dir,
            no_normalize,
        } => {
            let mut config = ElbowConfig::new(&file)
                .with_attribute_indices(attributes)
                .with_max_iterations(max_iterations)
                .with_batch_size(batch_size)
                .with_delimiter(delimiter);
            if let Some(seed) = seed {
                config = config.with_seed(seed);
            }
            cluster_command(config, cache_dir.as_deref(), !no_normalize)
        }
        Commands::Timeline {
            file,
            labels,
            k,
            timestamp_index,
            span,
        } => {
            let request = TimelineRequest {
                data_path: &file,
                labels_path: &labels,
                k,
                timestamp_index,
                span,
                delimiter,
            };
            println!("{}", serde_json::to_string_pretty(&timeline(&request)?)?);
            Ok(())
        }
    }
}

fn delimiter_byte(delimiter: char) -> Result<u8> {
    u8::try_from(delimiter)
        .ok()
        .filter(u8::is_ascii)
        .ok_or_else(|| Error::InvalidParameter {
            name: "delimiter",
            message: format!("{delimiter:?} is not a single-byte ASCII character"),
        })
}

fn attributes_command(file: &Path, delimiter: u8) -> Result<()> {
    for (i, name) in attribute_names(file, delimiter)?.iter().enumerate() {
        println!("{i}\t{name}");
    }
    Ok(())
}

fn normalize_command(file: &Path, delimiter: u8) -> Result<()> {
    let output = normalized_path(file);
    let ranges = normalize_file(file, &output, delimiter)?;
    println!(
        "wrote {} ({} rows, {} columns)",
        output.display(),
        ranges.rows,
        ranges.min.len()
    );
    Ok(())
}

fn cluster_command(mut config: ElbowConfig, cache_dir: Option<&Path>, normalize: bool) -> Result<()> {
    let raw = config.path.clone();
    let names = select_attribute_names(
        &attribute_names(&raw, config.delimiter)?,
        &config.attribute_indices,
    )?;

    let cache = cache_dir.map(ResultCache::open).transpose()?;
    let key = CacheKey {
        dataset: raw
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default(),
        attribute_indices: config.attribute_indices.clone(),
        max_iterations: config.max_iterations,
        batch_size: config.batch_size,
    };
    if let Some(elbow) = cached(cache.as_ref(), &key)? {
        return print_elbow(&elbow);
    }

    if normalize {
        let output = normalized_path(&raw);
        normalize_file(&raw, &output, config.delimiter)?;
        config.path = output;
    }

    let outcome = ElbowOrchestrator::new(config)?.run(names)?;
    if let Some(cache) = &cache {
        cache.store_outcome(&key, &outcome)?;
        info!("labels written to {}", cache.labels_path(&key, 1).display());
    }
    print_elbow(&outcome.elbow)
}

/// A cache hit needs the curve and every label file.
fn cached(cache: Option<&ResultCache>, key: &CacheKey) -> Result<Option<ElbowResult>> {
    let Some(cache) = cache else {
        return Ok(None);
    };
    let Some(elbow) = cache.load_elbow(key)? else {
        return Ok(None);
    };
    for k in 1..=K_MAX {
        if cache.load_labels(key, k)?.is_none() {
            return Ok(None);
        }
    }
    info!("using cached result for {}", key.dataset);
    Ok(Some(elbow))
}

fn print_elbow(elbow: &ElbowResult) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(elbow)?);
    Ok(())
}
