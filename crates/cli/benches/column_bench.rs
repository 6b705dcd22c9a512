use columns::{ColumnReader, ColumnWriter, Row};
use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use tempfile::tempdir;

const N_ROWS: usize = 10_000;
const TEXT_SIZE: usize = 512;
const COLS: &[&str] = &["plain_text", "url", "mime"];

fn build_rows() -> Vec<Row> {
    (0..N_ROWS)
        .map(|i| {
            let mut row = Row::new();
            row.insert("url".to_string(), format!("http://site{}.com/page", i % 97).into_bytes());
            row.insert("mime".to_string(), b"text/html".to_vec());
            row.insert("plain_text".to_string(), vec![b'x'; TEXT_SIZE]);
            row
        })
        .collect()
}

fn column_write_benchmark(c: &mut Criterion) {
    c.bench_function("column_write_10k", |b| {
        b.iter_batched(
            || (tempdir().unwrap(), build_rows()),
            |(dir, rows)| {
                let mut w = ColumnWriter::create(dir.path(), COLS).unwrap();
                for r in &rows {
                    w.write_row(r).unwrap();
                }
                w.close().unwrap();
            },
            BatchSize::LargeInput,
        );
    });
}

fn column_read_benchmark(c: &mut Criterion) {
    c.bench_function("column_read_10k", |b| {
        b.iter_batched(
            || {
                let dir = tempdir().unwrap();
                let mut w = ColumnWriter::create(dir.path(), COLS).unwrap();
                for r in &build_rows() {
                    w.write_row(r).unwrap();
                }
                w.close().unwrap();
                dir
            },
            |dir| {
                let n = ColumnReader::open(dir.path(), COLS)
                    .unwrap()
                    .rows()
                    .unwrap()
                    .map(|r| r.unwrap())
                    .count();
                assert_eq!(n, N_ROWS);
            },
            BatchSize::LargeInput,
        );
    });
}

criterion_group!(benches, column_write_benchmark, column_read_benchmark);
criterion_main!(benches);
