use super::helpers::{batch_numbers, read_store, row};
use crate::*;
use anyhow::Result;
use config::ShardConfig;
use std::fs;
use tempfile::tempdir;

const COLS: &[&str] = &["url", "text"];

fn router(dir: &std::path::Path, bits: u32, budget: u64) -> ShardRouter {
    ShardRouter::new(dir, bits, budget, "url", COLS, SuffixRules::builtin()).unwrap()
}

// --------------------- Routing ---------------------

#[test]
fn row_lands_in_its_shard_and_first_batch() -> Result<()> {
    let dir = tempdir()?;
    let mut r = router(dir.path(), 8, 1 << 20);

    r.write_row(&row(&[("url", "http://www.reddit.com/"), ("text", "front page")]))?;
    r.close()?;

    let b1 = dir.path().join("249").join("1");
    assert!(b1.join("url.gz").exists());
    assert!(b1.join("text.gz").exists());
    assert_eq!(
        read_store(&b1, COLS),
        vec![row(&[("url", "http://www.reddit.com/"), ("text", "front page")])]
    );
    Ok(())
}

#[test]
fn shard_of_uses_key_column() {
    let dir = tempdir().unwrap();
    let r = router(dir.path(), 8, 1 << 20);
    let shard = r
        .shard_of(&row(&[("url", "tulas-handy-charts.de/en/index.html")]))
        .unwrap();
    assert_eq!(shard, 179);
}

#[test]
fn rows_spread_over_shards() -> Result<()> {
    let dir = tempdir()?;
    let mut r = router(dir.path(), 8, 1 << 20);

    r.write_row(&row(&[("url", "http://www.reddit.com/a"), ("text", "1")]))?;
    r.write_row(&row(&[("url", "tulas-handy-charts.de/"), ("text", "2")]))?;
    r.write_row(&row(&[("url", "http://old.reddit.com/b"), ("text", "3")]))?;
    assert_eq!(r.open_shards(), 2);
    assert_eq!(r.rows_written(), 3);
    assert_eq!(r.batch(249).map(Batch::number), Some(1));
    r.close()?;

    let reddit = read_store(&dir.path().join("249").join("1"), COLS);
    let texts: Vec<&[u8]> = reddit.iter().map(|r| r["text"].as_slice()).collect();
    assert_eq!(texts, vec![b"1".as_slice(), b"3".as_slice()]);

    let tulas = read_store(&dir.path().join("179").join("1"), COLS);
    assert_eq!(tulas.len(), 1);
    Ok(())
}

#[test]
fn routing_error_writes_nothing() {
    let dir = tempdir().unwrap();
    let mut r = router(dir.path(), 8, 1 << 20);

    let err = r.write_row(&row(&[("url", "$$$"), ("text", "x")])).unwrap_err();
    assert!(err.is_routing());
    let err = r.write_row(&row(&[("text", "no key")])).unwrap_err();
    assert!(err.is_routing());

    assert_eq!(r.open_shards(), 0);
    assert_eq!(r.rows_written(), 0);
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn zero_bits_means_one_shard() -> Result<()> {
    let dir = tempdir()?;
    let mut r = router(dir.path(), 0, 1 << 20);
    r.write_row(&row(&[("url", "http://www.reddit.com/"), ("text", "a")]))?;
    r.write_row(&row(&[("url", "tulas-handy-charts.de/"), ("text", "b")]))?;
    r.close()?;

    assert_eq!(read_store(&dir.path().join("0").join("1"), COLS).len(), 2);
    Ok(())
}

#[test]
fn shard_rotates_independently() -> Result<()> {
    let dir = tempdir()?;
    // two reddit urls overflow the budget, one tulas url fits
    let mut r = router(dir.path(), 8, 30);

    r.write_row(&row(&[("url", "http://reddit.com/"), ("text", "a")]))?;
    r.write_row(&row(&[("url", "http://reddit.com/"), ("text", "b")]))?;
    r.write_row(&row(&[("url", "tulas-handy-charts.de/"), ("text", "x")]))?;
    assert_eq!(r.batch(249).map(Batch::number), Some(2));
    assert_eq!(r.batch(179).map(Batch::number), Some(1));
    r.close()?;

    assert_eq!(batch_numbers(&dir.path().join("249")), vec![1, 2]);
    assert_eq!(batch_numbers(&dir.path().join("179")), vec![1]);
    Ok(())
}

// --------------------- Restart ---------------------

#[test]
fn restarted_router_appends_to_existing_batch() -> Result<()> {
    let dir = tempdir()?;
    {
        let mut r = router(dir.path(), 8, 1 << 20);
        r.write_row(&row(&[("url", "http://www.reddit.com/1"), ("text", "first")]))?;
        r.close()?;
    }
    {
        let mut r = router(dir.path(), 8, 1 << 20);
        r.write_row(&row(&[("url", "http://www.reddit.com/2"), ("text", "second")]))?;
        // dropped without close
    }

    let rows = read_store(&dir.path().join("249").join("1"), COLS);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1]["text"], b"second");
    Ok(())
}

// --------------------- Construction ---------------------

#[test]
fn new_rejects_bad_parameters() {
    let dir = tempdir().unwrap();
    let rules = SuffixRules::builtin;
    assert!(ShardRouter::new(dir.path(), 64, 1, "url", COLS, rules()).is_err());
    assert!(ShardRouter::new(dir.path(), 8, 0, "url", COLS, rules()).is_err());
    let none: &[&str] = &[];
    assert!(ShardRouter::new(dir.path(), 8, 1, "url", none, rules()).is_err());
}

#[test]
fn from_config_writes_provenance_column() -> Result<()> {
    let dir = tempdir()?;
    let cfg = ShardConfig {
        out_dir: dir.path().to_path_buf(),
        columns: vec!["url".to_string(), "text".to_string()],
        ..ShardConfig::default()
    };
    let mut r = ShardRouter::from_config(&cfg, SuffixRules::builtin())?;
    r.write_row(&row(&[
        ("url", "http://www.reddit.com/"),
        ("text", "t"),
        ("source", "host:file.gz"),
    ]))?;
    r.close()?;

    let b1 = dir.path().join("249").join("1");
    assert!(b1.join("source.gz").exists());
    let rows = read_store(&b1, &["url", "text", "source"]);
    assert_eq!(rows[0]["source"], b"host:file.gz");
    Ok(())
}

#[test]
fn from_config_rejects_invalid_config() {
    let dir = tempdir().unwrap();
    let cfg = ShardConfig {
        out_dir: dir.path().to_path_buf(),
        key_column: "missing".to_string(),
        ..ShardConfig::default()
    };
    assert!(ShardRouter::from_config(&cfg, SuffixRules::builtin()).is_err());
}
