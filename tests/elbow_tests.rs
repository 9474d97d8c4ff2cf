use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use approx::assert_relative_eq;
use elbow::cache::{CacheKey, ResultCache};
use elbow::data::timeline::{timeline, TimeSpan, TimelineRequest};
use elbow::data::{normalize_file, normalized_path};
use elbow::{
    attribute_names, compute_elbow, select_attribute_names, ElbowConfig, ElbowOrchestrator,
    Error, K_MAX, UNASSIGNED,
};
use tempfile::TempDir;

fn write_csv(dir: &TempDir, name: &str, header: &str, rows: &[Vec<f64>]) -> PathBuf {
    let mut text = format!("{header}\n");
    for row in rows {
        let line: Vec<String> = row.iter().map(f64::to_string).collect();
        writeln!(text, "{}", line.join(",")).unwrap();
    }
    let path = dir.path().join(name);
    fs::write(&path, text).unwrap();
    path
}

/// Evenly spaced points on [0, 1] in the first column, noise-free second column.
fn uniform_line(n: usize) -> Vec<Vec<f64>> {
    (0..n)
        .map(|i| vec![i as f64 / (n - 1) as f64, 0.5])
        .collect()
}

fn config(path: &Path) -> ElbowConfig {
    ElbowConfig::new(path)
        .with_attribute_indices(vec![0, 1])
        .with_max_iterations(100)
        .with_seed(20240601)
}

#[test]
fn test_labels_cover_every_row() {
    let dir = TempDir::new().unwrap();
    let rows = uniform_line(200);
    let path = write_csv(&dir, "line.csv", "x,y", &rows);

    let outcome = compute_elbow(config(&path), vec!["x".into(), "y".into()]).unwrap();
    assert_eq!(outcome.elbow.k, (1..=K_MAX).collect::<Vec<_>>());
    assert_eq!(outcome.elbow.wcss.len(), K_MAX);
    assert_eq!(outcome.elbow.attribute_names, vec!["x", "y"]);
    for task in &outcome.tasks {
        assert_eq!(task.labels.len(), rows.len());
        assert!(task.labels.iter().all(|&l| l >= 0 && (l as usize) < task.k));
    }
}

#[test]
fn test_wcss_is_non_increasing_in_k() {
    let dir = TempDir::new().unwrap();
    let path = write_csv(&dir, "line.csv", "x,y", &uniform_line(400));

    let outcome = compute_elbow(config(&path), Vec::new()).unwrap();
    let wcss = &outcome.elbow.wcss;
    for pair in wcss.windows(2) {
        assert!(pair[1] <= pair[0] * (1.0 + 1e-9), "wcss not monotone: {wcss:?}");
    }
    assert!(wcss[K_MAX - 1] < wcss[0]);
}

#[test]
fn test_k1_matches_total_variance() {
    let dir = TempDir::new().unwrap();
    let rows: Vec<Vec<f64>> = (0..97)
        .map(|i| vec![((i * 37) % 97) as f64 / 96.0, ((i * 11) % 13) as f64 / 12.0])
        .collect();
    let path = write_csv(&dir, "scatter.csv", "a,b", &rows);

    let n = rows.len() as f64;
    let mean: Vec<f64> = (0..2)
        .map(|d| rows.iter().map(|r| r[d]).sum::<f64>() / n)
        .collect();
    let golden: f64 = rows
        .iter()
        .map(|r| (r[0] - mean[0]).powi(2) + (r[1] - mean[1]).powi(2))
        .sum();

    let outcome = compute_elbow(config(&path), Vec::new()).unwrap();
    assert_relative_eq!(outcome.elbow.wcss[0], golden, epsilon = 1e-9);
}

#[test]
fn test_same_seed_same_result() {
    let dir = TempDir::new().unwrap();
    let path = write_csv(&dir, "line.csv", "x,y", &uniform_line(150));
    let a = compute_elbow(config(&path).with_batch_size(20), Vec::new()).unwrap();
    let b = compute_elbow(config(&path).with_batch_size(20), Vec::new()).unwrap();
    assert_eq!(a.elbow, b.elbow);
    assert_eq!(a.tasks, b.tasks);
}

#[test]
fn test_minibatch_finalize_leaves_no_unassigned() {
    let dir = TempDir::new().unwrap();
    let rows = uniform_line(300);
    let path = write_csv(&dir, "line.csv", "x,y", &rows);

    let outcome = compute_elbow(config(&path).with_batch_size(25), Vec::new()).unwrap();
    for task in &outcome.tasks {
        assert_eq!(task.labels.len(), rows.len());
        assert!(!task.labels.contains(&UNASSIGNED), "k = {}", task.k);
    }
}

#[test]
fn test_zero_iterations_full_batch_keeps_sentinel() {
    let dir = TempDir::new().unwrap();
    let path = write_csv(&dir, "line.csv", "x,y", &uniform_line(30));

    let outcome = compute_elbow(config(&path).with_max_iterations(0), Vec::new()).unwrap();
    for task in &outcome.tasks {
        assert_eq!(task.labels, vec![UNASSIGNED; 30]);
        assert_eq!(task.wcss, 0.0);
    }
}

#[test]
fn test_missing_file_fails_whole_run() {
    let dir = TempDir::new().unwrap();
    let result = compute_elbow(config(&dir.path().join("absent.csv")), Vec::new());
    assert!(matches!(result, Err(Error::Io { .. })));
}

#[test]
fn test_single_failing_task_fails_whole_run() {
    let dir = TempDir::new().unwrap();
    let path = write_csv(&dir, "line.csv", "x,y", &uniform_line(50));
    let missing = dir.path().join("absent.csv");

    let orchestrator = ElbowOrchestrator::new(config(&path)).unwrap();
    let result = orchestrator.run_with(Vec::new(), move |task, cancel| {
        let mut task = task.clone();
        if task.k == 4 {
            task.path = missing.clone();
        }
        elbow::run_cluster_task(&task, cancel)
    });
    assert!(matches!(result, Err(Error::Io { .. })));
}

#[test]
fn test_fewer_rows_than_k() {
    let dir = TempDir::new().unwrap();
    let rows = vec![vec![0.0, 0.0], vec![1.0, 1.0], vec![0.5, 0.5]];
    let path = write_csv(&dir, "tiny.csv", "x,y", &rows);

    let outcome = compute_elbow(config(&path), Vec::new()).unwrap();
    for task in &outcome.tasks {
        let clusters = task.k.min(rows.len()) as i32;
        assert!(task.labels.iter().all(|&l| (0..clusters).contains(&l)));
    }
    assert_eq!(outcome.elbow.wcss[K_MAX - 1], 0.0);
}

#[test]
fn test_latin1_text_column_is_not_an_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("names.csv");
    let mut bytes = b"name,x\n".to_vec();
    for i in 0..20 {
        let name: &[u8] = if i % 2 == 0 { b"caf\xe9" } else { b"bar" };
        bytes.extend_from_slice(name);
        bytes.extend_from_slice(format!(",{}\n", i as f64 / 19.0).as_bytes());
    }
    fs::write(&path, bytes).unwrap();

    let names = attribute_names(&path, b',').unwrap();
    assert_eq!(select_attribute_names(&names, &[1]).unwrap(), vec!["x"]);

    let config = ElbowConfig::new(&path)
        .with_attribute_indices(vec![1])
        .with_seed(11);
    let outcome = compute_elbow(config, vec!["x".into()]).unwrap();
    for task in &outcome.tasks {
        assert_eq!(task.labels.len(), 20);
        assert!(!task.labels.contains(&UNASSIGNED));
    }
}

#[test]
fn test_blank_lines_keep_timeline_aligned() {
    let dir = TempDir::new().unwrap();
    let raw = dir.path().join("gappy.csv");
    let mut text = String::from("time,v\n");
    for i in 0..12 {
        let v = if i < 6 { 0.0 } else { 1.0 };
        writeln!(text, "2024-03-{:02}T00:00:00,{v}", 1 + i / 6).unwrap();
        if i == 3 {
            text.push('\n');
        }
    }
    fs::write(&raw, text).unwrap();

    let outcome = compute_elbow(
        ElbowConfig::new(&raw).with_attribute_indices(vec![1]).with_seed(5),
        vec!["v".into()],
    )
    .unwrap();
    let labels = outcome.labels(2).unwrap();
    assert_eq!(labels.len(), 12);

    let cache = ResultCache::open(dir.path().join("cache")).unwrap();
    let key = CacheKey {
        dataset: "gappy".to_string(),
        attribute_indices: vec![1],
        max_iterations: 100,
        batch_size: 0,
    };
    cache.store_outcome(&key, &outcome).unwrap();

    let request = TimelineRequest {
        data_path: &raw,
        labels_path: &cache.labels_path(&key, 2),
        k: 2,
        timestamp_index: 0,
        span: TimeSpan::Day,
        delimiter: b',',
    };
    let groups = timeline(&request).unwrap();
    assert_eq!(groups.len(), 2);
    // each day is one value, so each day lands wholly in one cluster
    for (group, &label) in groups.iter().zip([labels[0], labels[6]].iter()) {
        let mut expected = vec![0; 2];
        expected[label as usize] = 6;
        assert_eq!(group.count_per_cluster, expected);
    }
}

#[test]
fn test_normalize_cluster_cache_timeline() {
    let dir = TempDir::new().unwrap();
    let raw = dir.path().join("sensors.csv");
    let mut text = String::from("time,temp,load\n");
    for i in 0..48 {
        let temp = if i % 2 == 0 { 10.0 + (i % 5) as f64 } else { 80.0 + (i % 3) as f64 };
        let load = if i % 2 == 0 { 1.0 } else { 9.0 };
        writeln!(text, "2024-03-{:02}T{:02}:00:00,{temp},{load}", 1 + i / 24, i % 24).unwrap();
    }
    fs::write(&raw, text).unwrap();

    let names = attribute_names(&raw, b',').unwrap();
    assert_eq!(names, vec!["time", "temp", "load"]);
    let selected = select_attribute_names(&names, &[1, 2]).unwrap();

    let normalized = normalized_path(&raw);
    let ranges = normalize_file(&raw, &normalized, b',').unwrap();
    assert_eq!(ranges.rows, 48);

    let outcome = compute_elbow(
        ElbowConfig::new(&normalized)
            .with_attribute_indices(vec![1, 2])
            .with_seed(3),
        selected,
    )
    .unwrap();
    assert_eq!(outcome.elbow.attribute_names, vec!["temp", "load"]);

    let cache = ResultCache::open(dir.path().join("cache")).unwrap();
    let key = CacheKey {
        dataset: "sensors".to_string(),
        attribute_indices: vec![1, 2],
        max_iterations: 100,
        batch_size: 0,
    };
    cache.store_outcome(&key, &outcome).unwrap();
    assert_eq!(cache.load_elbow(&key).unwrap(), Some(outcome.elbow.clone()));

    let request = TimelineRequest {
        data_path: &raw,
        labels_path: &cache.labels_path(&key, 2),
        k: 2,
        timestamp_index: 0,
        span: TimeSpan::Day,
        delimiter: b',',
    };
    let groups = timeline(&request).unwrap();
    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0].timestamp, "2024-03-01");
    for group in &groups {
        assert_eq!(group.count_per_cluster.iter().sum::<usize>(), 24);
    }
}
