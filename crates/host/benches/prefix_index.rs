use criterion::{Criterion, criterion_group, criterion_main};
use micro_host::prefix::PrefixIndex;
use std::hint::black_box;

fn mounts() -> Vec<String> {
    let mut mounts = vec!["/".to_owned(), "/api/".to_owned(), "/static/".to_owned()];
    for version in 1..=8 {
        mounts.push(format!("/api/v{version}/"));
        for resource in ["users", "orders", "items", "search"] {
            mounts.push(format!("/api/v{version}/{resource}/"));
        }
    }
    mounts
}

fn lookup(c: &mut Criterion) {
    let index = PrefixIndex::new(mounts()).unwrap();
    let mut group = c.benchmark_group("prefix_index");

    group.bench_function("deepest", |b| b.iter(|| index.lookup(black_box("/api/v7/orders/1234/lines"))));
    group.bench_function("intermediate", |b| b.iter(|| index.lookup(black_box("/api/v3/unknown/resource"))));
    group.bench_function("root", |b| b.iter(|| index.lookup(black_box("/index.html"))));
    group.bench_function("asterisk", |b| b.iter(|| index.lookup(black_box("*"))));

    group.finish();
}

criterion_group!(benches, lookup);
criterion_main!(benches);
