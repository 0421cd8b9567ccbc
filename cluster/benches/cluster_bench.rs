use criterion::{black_box, criterion_group, criterion_main, Criterion};
use voxgate_cluster::{ClusterConfig, ClusterModel};

fn random_unit_vec(dim: usize, seed: u64) -> Vec<f32> {
    let mut v = Vec::with_capacity(dim);
    let mut state = seed;
    for _ in 0..dim {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
        v.push(((state >> 33) as f32) / (u32::MAX as f32) - 0.5);
    }
    let norm: f64 = v.iter().map(|&x| (x as f64) * (x as f64)).sum::<f64>().sqrt();
    if norm > 0.0 {
        let s = (1.0 / norm) as f32;
        for x in &mut v {
            *x *= s;
        }
    }
    v
}

/// `speakers` speakers with 20 noisy utterances each around a random center.
fn population(dim: usize, speakers: usize) -> (Vec<Vec<f32>>, Vec<String>) {
    let mut vectors = Vec::new();
    let mut labels = Vec::new();
    for s in 0..speakers {
        let center = random_unit_vec(dim, s as u64 + 1);
        for u in 0..20 {
            let noise = random_unit_vec(dim, 1000 + (s * 20 + u) as u64);
            vectors.push(center.iter().zip(&noise).map(|(c, n)| c + 0.1 * n).collect());
            labels.push(format!("speaker-{s}"));
        }
    }
    (vectors, labels)
}

fn bench_fit(c: &mut Criterion) {
    let (vectors, labels) = population(192, 5);
    let cfg = ClusterConfig::default();

    c.bench_function("cluster_fit_192d_5speakers_100utts", |b| {
        b.iter(|| {
            let _ = black_box(ClusterModel::fit(black_box(&vectors), &labels, &cfg));
        });
    });
}

fn bench_assign_trial(c: &mut Criterion) {
    let (vectors, labels) = population(192, 5);
    let model = ClusterModel::fit(&vectors, &labels, &ClusterConfig::default()).unwrap();
    let trial = random_unit_vec(192, 999);

    c.bench_function("cluster_assign_trial_192d", |b| {
        b.iter(|| {
            let _ = black_box(model.cluster_match("speaker-0", black_box(&trial)));
        });
    });
}

criterion_group!(benches, bench_fit, bench_assign_trial);
criterion_main!(benches);
