use criterion::{black_box, criterion_group, criterion_main, Criterion};
use shard::{shard_id, SuffixRules};

const URLS: &[&str] = &[
    "http://www.reddit.com/r/rust/comments/abc",
    "https://news.bbc.co.uk/sport/football",
    "tulas-handy-charts.de/en/index.html",
    "http://example.com./",
    "https://a.b.c.d.example.org/path?q=1",
];

fn shard_id_builtin_benchmark(c: &mut Criterion) {
    let rules = SuffixRules::builtin();
    c.bench_function("shard_id_builtin_rules", |b| {
        b.iter(|| {
            for url in URLS {
                black_box(shard_id(black_box(url), 8, &rules).unwrap());
            }
        });
    });
}

fn shard_id_extra_rules_benchmark(c: &mut Criterion) {
    let rules = SuffixRules::with_extra(["blogspot.example", "pages.example.org", "co.uk"]);
    c.bench_function("shard_id_extra_rules", |b| {
        b.iter(|| {
            for url in URLS {
                black_box(shard_id(black_box(url), 8, &rules).unwrap());
            }
        });
    });
}

criterion_group!(benches, shard_id_builtin_benchmark, shard_id_extra_rules_benchmark);
criterion_main!(benches);
