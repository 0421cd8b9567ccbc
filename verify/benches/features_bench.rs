use criterion::{black_box, criterion_group, criterion_main, Criterion};
use voxgate_cluster::{ClusterConfig, ClusterModel};
use voxgate_embedstore::{EmbeddingStore, MemoryStore, Modality};
use voxgate_verify::build_feature_vector;

fn random_vec(dim: usize, seed: u64) -> Vec<f32> {
    let mut state = seed;
    (0..dim)
        .map(|_| {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
            ((state >> 33) as f32) / (u32::MAX as f32) - 0.5
        })
        .collect()
}

fn bench_features(c: &mut Criterion) {
    let store = MemoryStore::new();
    store.save("alice", Modality::Voiceprint, &random_vec(192, 1)).unwrap();
    store.save("alice", Modality::Prosody, &random_vec(128, 2)).unwrap();
    let trial_vp = random_vec(192, 3);
    let trial_pr = random_vec(128, 4);

    c.bench_function("features_192d_128d_no_cluster", |b| {
        b.iter(|| {
            let _ = black_box(build_feature_vector(
                &store,
                None,
                "alice",
                black_box(&trial_vp),
                black_box(&trial_pr),
            ));
        });
    });

    let vectors: Vec<Vec<f32>> = (0..60).map(|i| random_vec(192, 100 + i)).collect();
    let labels: Vec<String> = (0..60).map(|i| format!("s{}", i / 20)).collect();
    let model = ClusterModel::fit(&vectors, &labels, &ClusterConfig::default()).unwrap();

    c.bench_function("features_192d_128d_with_cluster", |b| {
        b.iter(|| {
            let _ = black_box(build_feature_vector(
                &store,
                Some(&model),
                "alice",
                black_box(&trial_vp),
                black_box(&trial_pr),
            ));
        });
    });
}

criterion_group!(benches, bench_features);
criterion_main!(benches);
