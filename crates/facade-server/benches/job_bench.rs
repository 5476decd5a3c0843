use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use tokio::runtime::Runtime;

use facade_core::FacadeError;
use facade_server::{JobExecutor, JobSettings};

fn executor() -> Arc<JobExecutor> {
    Arc::new(JobExecutor::new(JobSettings {
        fast_work_timeout: Duration::from_secs(1),
        retry_after: Duration::from_secs(10),
        pool_size: 8,
        abandon_after: Duration::from_secs(30),
    }))
}

/// Benchmark: job que termina dentro del fast-work timeout
fn bench_fast_job(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let jobs = executor();
    let counter = AtomicU64::new(0);

    c.bench_function("job_fast_path", |b| {
        b.to_async(&rt).iter(|| {
            let jobs = Arc::clone(&jobs);
            let id = format!("req-{}", counter.fetch_add(1, Ordering::Relaxed));
            async move {
                let result = jobs
                    .process(&id, || async { Ok::<_, FacadeError>(vec!["BILL-1"; 16]) })
                    .await;
                std::hint::black_box(result)
            }
        });
    });
}

/// Benchmark: N callers concurrentes con el mismo request id
fn bench_shared_job(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let jobs = executor();
    let counter = AtomicU64::new(0);
    let mut group = c.benchmark_group("job_shared");

    for callers in [2, 8, 32] {
        group.throughput(Throughput::Elements(callers as u64));
        group.bench_with_input(BenchmarkId::from_parameter(callers), &callers, |b, &callers| {
            b.to_async(&rt).iter(|| {
                let jobs = Arc::clone(&jobs);
                let id = format!("shared-{}", counter.fetch_add(1, Ordering::Relaxed));
                async move {
                    let handles: Vec<_> = (0..callers)
                        .map(|_| {
                            let jobs = Arc::clone(&jobs);
                            let id = id.clone();
                            tokio::spawn(async move {
                                jobs.process(&id, || async {
                                    tokio::task::yield_now().await;
                                    Ok::<_, FacadeError>(42)
                                })
                                .await
                            })
                        })
                        .collect();
                    for handle in handles {
                        std::hint::black_box(handle.await.ok());
                    }
                }
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_fast_job, bench_shared_job);
criterion_main!(benches);
