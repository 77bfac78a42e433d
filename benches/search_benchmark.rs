use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use crossbeam::channel::{unbounded, Receiver};
use fanseek::{Config, Coordinator, Predicate, Record, Result, SearchResults, SubstringPredicate};
use rand::Rng;

/// Helper to create test records
fn create_test_records(count: usize) -> Vec<Record> {
    let mut rng = rand::thread_rng();
    let words = ["the", "quick", "brown", "fox", "jumps", "over", "lazy", "dog"];
    (0..count)
        .map(|id| {
            let content: String = (0..12)
                .map(|_| words[rng.gen_range(0..words.len())])
                .collect::<Vec<_>>()
                .join(" ");
            Record::new()
                .with_field("id", id as i64)
                .with_field("title", format!("Record {}", id))
                .with_field("content", content)
                .with_field("category", format!("category_{}", id % 10))
                .with_field("score", rng.gen_range(0.0..100.0f64))
        })
        .collect()
}

fn start(records: Vec<Record>, pool_size: usize) -> (Coordinator, Receiver<Result<SearchResults>>) {
    let (tx, rx) = unbounded();
    let mut coordinator = Coordinator::new(records);
    coordinator
        .initialize_with(Config::default().with_pool_size(pool_size), move |result| {
            let _ = tx.send(result);
        })
        .unwrap();
    (coordinator, rx)
}

/// Benchmark fan-out search against pool size
fn bench_pool_sizes(c: &mut Criterion) {
    let records = create_test_records(100_000);
    let mut group = c.benchmark_group("fan_out_search");

    for pool_size in [1, 2, 4, 8].iter() {
        let (coordinator, rx) = start(records.clone(), *pool_size);
        group.bench_with_input(BenchmarkId::from_parameter(pool_size), pool_size, |b, _| {
            b.iter(|| {
                coordinator.search(black_box("lazy dog")).unwrap();
                black_box(rx.recv().unwrap().unwrap());
            });
        });
    }

    group.finish();
}

/// Baseline: the same predicate in one pass on the calling thread
fn bench_linear_scan(c: &mut Criterion) {
    let records = create_test_records(100_000);
    c.bench_function("linear_scan", |b| {
        b.iter(|| black_box(SubstringPredicate.filter(&records, black_box("lazy dog")).unwrap()));
    });
}

/// Queued searches: submit a burst, then drain all callbacks
fn bench_query_burst(c: &mut Criterion) {
    let records = create_test_records(20_000);
    let (coordinator, rx) = start(records, num_cpus::get());
    let queries = ["fox", "category_3", "Record 19", "quick brown", "", "zzz"];

    c.bench_function("query_burst", |b| {
        b.iter(|| {
            for query in queries.iter() {
                coordinator.search(query).unwrap();
            }
            for _ in 0..queries.len() {
                black_box(rx.recv().unwrap().unwrap());
            }
        });
    });
}

criterion_group!(benches, bench_pool_sizes, bench_linear_scan, bench_query_burst);
criterion_main!(benches);
