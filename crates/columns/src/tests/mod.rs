
use crate::{ColumnWriter, Row};
use std::path::Path;

pub(crate) fn row(pairs: &[(&str, &str)]) -> Row {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.as_bytes().to_vec()))
        .collect()
}

pub(crate) fn write_rows(dir: &Path, columns: &[&str], rows: &[Row]) {
    let mut w = ColumnWriter::create(dir, columns).unwrap();
    for r in rows {
        w.write_row(r).unwrap();
    }
    w.close().unwrap();
}
