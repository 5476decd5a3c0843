use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use tokio::runtime::Runtime;

use facade_core::Repository;
use facade_vcs::testing::FakeVcsClient;
use facade_vcs::{RangeQuery, RangeResolver, RangeStrategy};

/// Crea un historial lineal de N commits con una rama de feature cada 10
fn create_history(commits: usize, depth: usize) -> (FakeVcsClient, Repository) {
    let client = FakeVcsClient::new("bench").with_range_strategy(RangeStrategy::GraphWalk {
        depth,
        page_size: 50,
    });
    let repo = client.add_repository("bench", "history");

    let mut previous: Option<String> = None;
    for i in 0..commits {
        let hash = format!("c{}", i);
        let mut parents: Vec<String> = previous.iter().cloned().collect();
        if i > 0 && i % 10 == 0 {
            let side = format!("f{}", i);
            let base = parents.clone();
            let base: Vec<&str> = base.iter().map(String::as_str).collect();
            client.add_commit(&repo, &side, &base, "feature work");
            parents.push(side);
        }
        let parents: Vec<&str> = parents.iter().map(String::as_str).collect();
        client.add_commit(&repo, &hash, &parents, "mainline work");
        if i == commits / 2 {
            client.set_tag(&repo, "midpoint", &hash);
        }
        previous = Some(hash);
    }
    if let Some(head) = previous {
        client.set_branch(&repo, "main", &head);
    }

    (client, repo)
}

/// Benchmark: rango completo hasta la profundidad configurada
fn bench_walk_full(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("graph_walk_full");

    for depth in [100, 500, 1000] {
        let (client, repo) = create_history(depth, depth);
        let query = RangeQuery::to("main");

        group.throughput(Throughput::Elements(depth as u64));
        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, _| {
            b.to_async(&rt).iter(|| async {
                let commits = RangeResolver::new(&client)
                    .resolve(&repo, &query)
                    .await
                    .unwrap();
                std::hint::black_box(commits)
            });
        });
    }

    group.finish();
}

/// Benchmark: rango desde un tag a mitad del historial
fn bench_walk_from_tag(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let (client, repo) = create_history(1000, 1000);
    let query = RangeQuery::to("main").from_ref("midpoint");

    c.bench_function("graph_walk_from_tag", |b| {
        b.to_async(&rt).iter(|| async {
            let commits = RangeResolver::new(&client)
                .resolve(&repo, &query)
                .await
                .unwrap();
            std::hint::black_box(commits)
        });
    });
}

criterion_group!(benches, bench_walk_full, bench_walk_from_tag);
criterion_main!(benches);
