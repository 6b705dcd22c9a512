use super::helpers::{row, write_store};
use crate::*;
use anyhow::Result;
use linecodec::LineWriter;
use std::fs;
use tempfile::tempdir;

const COLS: &[&str] = &["url", "text"];

fn two_rows(dir: &std::path::Path) {
    write_store(
        dir,
        COLS,
        &[
            row(&[("url", "u1"), ("text", "t1")]),
            row(&[("url", "u2")]),
        ],
    );
}

#[test]
fn aligned_batch_is_fully_healthy() {
    let dir = tempdir().unwrap();
    two_rows(dir.path());

    let stats = ShardStats::calc(dir.path(), COLS);
    assert_eq!(stats.records["url"], 2);
    assert_eq!(stats.records["text"], 2);
    assert!(stats.bytes["url"] > 0);
    assert!(stats.is_aligned());
    assert_eq!(stats.rows(), Some(2));

    let health = stats.health();
    assert_eq!(health.overall, 1.0);
    assert!(health.tests.values().all(|t| t.status));
}

#[test]
fn extra_line_in_one_column_is_misaligned() -> Result<()> {
    let dir = tempdir()?;
    two_rows(dir.path());
    let mut w = LineWriter::create(dir.path().join("url.gz"))?;
    w.write_line(b"stray")?;
    w.close()?;

    let stats = ShardStats::calc(dir.path(), COLS);
    assert_eq!(stats.records["url"], 3);
    assert_eq!(stats.records["text"], 2);
    assert!(!stats.is_aligned());

    let health = stats.health();
    assert!(!health.tests["records"].status);
    assert!(health.tests["columns"].status);
    assert!(health.overall < 1.0);
    Ok(())
}

#[test]
fn missing_column_is_minus_one() {
    let dir = tempdir().unwrap();
    write_store(dir.path(), &["url"], &[row(&[("url", "u1")])]);

    let stats = ShardStats::calc(dir.path(), COLS);
    assert_eq!(stats.bytes["text"], -1);
    assert_eq!(stats.records["text"], -1);
    assert_eq!(stats.records["url"], 1);
    assert!(stats.is_aligned());
    assert!(!stats.health().tests["columns"].status);
}

#[test]
fn corrupt_column_is_unreadable() -> Result<()> {
    let dir = tempdir()?;
    two_rows(dir.path());
    fs::write(dir.path().join("text.gz"), b"not gzip at all")?;

    let stats = ShardStats::calc(dir.path(), COLS);
    assert_eq!(stats.records["text"], -1);
    assert!(stats.bytes["text"] > 0);
    assert!(!stats.health().tests["readable"].status);
    Ok(())
}

#[test]
fn stats_survive_write_and_read() -> Result<()> {
    let dir = tempdir()?;
    two_rows(dir.path());

    let stats = ShardStats::calc(dir.path(), COLS);
    stats.write()?;
    assert!(dir.path().join(STATS_FILE).exists());
    assert_eq!(ShardStats::read(dir.path())?, stats);

    let json: serde_json::Value = serde_json::from_str(&stats.to_json()?)?;
    assert_eq!(json["records"]["url"], 2);
    Ok(())
}
