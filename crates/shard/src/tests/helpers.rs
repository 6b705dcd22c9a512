use columns::{ColumnReader, ColumnWriter, Row};
use std::fs;
use std::path::Path;

pub fn row(pairs: &[(&str, &str)]) -> Row {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.as_bytes().to_vec()))
        .collect()
}

/// Writes `rows` straight into `dir` as a finished column store.
pub fn write_store(dir: &Path, columns: &[&str], rows: &[Row]) {
    fs::create_dir_all(dir).unwrap();
    let mut w = ColumnWriter::create(dir, columns).unwrap();
    for r in rows {
        w.write_row(r).unwrap();
    }
    w.close().unwrap();
}

pub fn read_store(dir: &Path, columns: &[&str]) -> Vec<Row> {
    ColumnReader::open(dir, columns)
        .unwrap()
        .rows()
        .unwrap()
        .map(|r| r.unwrap())
        .collect()
}

/// Numeric subdirectories of `dir`, sorted.
pub fn batch_numbers(dir: &Path) -> Vec<u64> {
    let mut out: Vec<u64> = fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_dir())
        .filter_map(|e| e.file_name().to_str().and_then(|n| n.parse().ok()))
        .collect();
    out.sort_unstable();
    out
}
