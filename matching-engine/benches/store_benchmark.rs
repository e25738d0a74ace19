use criterion::{black_box, criterion_group, criterion_main, Criterion};
use kaamconnect_matcher::{
    store::{JobStore, OpenJobsQuery},
    Coordinates, JobId, MatcherConfig, MatchingEngine, NewJob, SqliteStore, WorkerId,
};
use std::sync::Arc;

async fn setup_store() -> Arc<SqliteStore> {
    let store = SqliteStore::new(":memory:").await.unwrap();

    // Populate with test data
    for i in 0..500 {
        let tag = if i % 3 == 0 { "plumber" } else { "painter" };
        let location = Coordinates::new(18.4 + (i % 50) as f64 * 0.01, 73.7 + (i / 50) as f64 * 0.01).unwrap();
        store
            .create_job(
                &NewJob::new(format!("Job {}", i), format!("{} work in block {}", tag, i % 20))
                    .tags([tag])
                    .located_at(location),
            )
            .await
            .unwrap();
    }
    store.add_skill(WorkerId(1), "plumber", 2).await.unwrap();
    for i in 1..=20 {
        store.record_application(WorkerId(1), JobId(i)).await.unwrap();
    }

    Arc::new(store)
}

fn bench_store_reads(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let store = runtime.block_on(setup_store());

    c.bench_function("get_open_jobs_tagged", |b| {
        let query = OpenJobsQuery::excluding((1..=20).map(JobId)).with_tags(["plumber".to_string()]);
        b.to_async(&runtime)
            .iter(|| async { black_box(store.get_open_jobs(&query).await.unwrap()) });
    });

    c.bench_function("get_job_hit", |b| {
        b.to_async(&runtime)
            .iter(|| async { black_box(store.get_job(JobId(250)).await.unwrap()) });
    });
}

fn bench_engine(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let store = runtime.block_on(setup_store());
    let engine = MatchingEngine::with_sqlite(store, MatcherConfig::default());

    c.bench_function("recommendations_500_jobs", |b| {
        b.to_async(&runtime)
            .iter(|| async { black_box(engine.get_job_recommendations(WorkerId(1), 10).await.unwrap()) });
    });

    c.bench_function("nearby_10km", |b| {
        let center = Coordinates::new(18.6, 73.8).unwrap();
        b.to_async(&runtime)
            .iter(|| async { black_box(engine.nearby_jobs(center, 10.0, 20).await.unwrap()) });
    });
}

criterion_group!(benches, bench_store_reads, bench_engine);
criterion_main!(benches);
