use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use elbow::kmeans::{AssignmentPass, Centroids, KMeansTask, UNASSIGNED};
use elbow::Row;
use rand::prelude::*;
use rand_chacha::ChaCha20Rng;

fn random_rows(n: usize, d: usize, seed: u64) -> Vec<Row> {
    let mut rng = ChaCha20Rng::seed_from_u64(seed);
    (0..n).map(|_| (0..d).map(|_| rng.gen::<f64>()).collect()).collect()
}

fn bench_assignment_pass(c: &mut Criterion) {
    let mut group = c.benchmark_group("assignment_pass");
    let data = random_rows(10_000, 8, 42);

    for &k in &[2usize, 5, 10] {
        group.bench_with_input(BenchmarkId::new("train", k), &k, |b, &k| {
            b.iter(|| {
                let mut rng = ChaCha20Rng::seed_from_u64(7);
                let mut centroids = Centroids::from_seeds(data[..k].to_vec());
                let mut labels = vec![UNASSIGNED; data.len()];
                AssignmentPass::train(0)
                    .run(data.iter().cloned().map(Ok), &mut centroids, &mut labels, &mut rng)
                    .unwrap();
                black_box(labels)
            })
        });
    }
    group.finish();
}

fn bench_task(c: &mut Criterion) {
    let mut group = c.benchmark_group("kmeans_task");
    group.sample_size(10);
    let data = random_rows(5_000, 4, 1);

    group.bench_function("full_batch_k5", |b| {
        b.iter(|| {
            KMeansTask::new(black_box(data.as_slice()), 5)
                .with_max_iterations(20)
                .run(&mut ChaCha20Rng::seed_from_u64(3))
                .unwrap()
        })
    });
    group.bench_function("minibatch_k5", |b| {
        b.iter(|| {
            KMeansTask::new(black_box(data.as_slice()), 5)
                .with_max_iterations(20)
                .with_batch_size(256)
                .run(&mut ChaCha20Rng::seed_from_u64(3))
                .unwrap()
        })
    });
    group.finish();
}

criterion_group!(benches, bench_assignment_pass, bench_task);
criterion_main!(benches);
