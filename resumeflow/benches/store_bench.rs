//! Benchmarks for job store updates.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::sync::Arc;

use resumeflow::core::{JobUpdate, Progress};
use resumeflow::store::{InMemoryJobStore, JobStore};
use resumeflow::testing::sample_summary;

fn store_benchmark(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap();

    c.bench_function("create_and_start", |b| {
        let store = InMemoryJobStore::new();
        b.iter(|| {
            runtime.block_on(async {
                let id = store.create(sample_summary()).await.id;
                let update = JobUpdate::running(Progress::starting("analyze_resume", "Analyzing resume", 5));
                black_box(store.update(id, update).await.unwrap());
            });
        });
    });

    c.bench_function("parallel_progress_updates", |b| {
        let store = Arc::new(InMemoryJobStore::new());
        b.iter(|| {
            runtime.block_on(async {
                let mut handles = Vec::new();
                for _ in 0..16 {
                    let store = store.clone();
                    handles.push(tokio::spawn(async move {
                        let id = store.create(sample_summary()).await.id;
                        store
                            .update(id, JobUpdate::running(Progress::starting("analyze_resume", "Analyzing resume", 5)))
                            .await
                            .unwrap();
                        for done in 1..=5 {
                            store
                                .update(id, JobUpdate::running(Progress::advanced(done, None, 5)))
                                .await
                                .unwrap();
                        }
                    }));
                }
                for handle in handles {
                    handle.await.unwrap();
                }
            });
        });
    });
}

criterion_group!(benches, store_benchmark);
criterion_main!(benches);
