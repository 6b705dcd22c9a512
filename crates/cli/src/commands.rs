//! Command implementations. Each returns once its work is on disk (or on
//! stdout); errors bubble up to `main` with context.

use anyhow::{Context, Result};
use columns::ColumnReader;
use config::ShardConfig;
use shard::{merge_batches, shard_id, ShardError, ShardRouter, ShardStats, SuffixRules};
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Row counts for one input or a whole run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IngestSummary {
    pub rows: u64,
    pub skipped: u64,
}

impl IngestSummary {
    fn add(&mut self, other: IngestSummary) {
        self.rows += other.rows;
        self.skipped += other.skipped;
    }
}

/// How `stat` obtains and reports statistics.
#[derive(Debug, Clone, Copy)]
pub struct StatMode {
    pub calculate: bool,
    pub write: bool,
    pub summary: bool,
}

/// Positional inputs followed by the lines of `list`, blanks dropped.
pub fn collect_inputs(mut inputs: Vec<PathBuf>, list: Option<&Path>) -> Result<Vec<PathBuf>> {
    if let Some(list) = list {
        let text = fs::read_to_string(list)
            .with_context(|| format!("failed to read input list {}", list.display()))?;
        inputs.extend(
            text.lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(PathBuf::from),
        );
    }
    Ok(inputs)
}

fn load_rules(cfg: &ShardConfig) -> Result<SuffixRules> {
    match &cfg.suffix_file {
        Some(path) => {
            let rules = SuffixRules::load_extra(path)?;
            info!(count = rules.extra_len(), path = %path.display(), "loaded additional public suffix rules");
            Ok(rules)
        }
        None => Ok(SuffixRules::builtin()),
    }
}

/// Shards every input batch into the tree under `cfg.out_dir`.
pub fn run_shard(cfg: &ShardConfig, inputs: &[PathBuf]) -> Result<()> {
    anyhow::ensure!(!inputs.is_empty(), "no input directories given");

    let rules = load_rules(cfg)?;
    let mut router = ShardRouter::from_config(cfg, rules)?;
    let host = hostname::get()
        .context("failed to read local hostname")?
        .to_string_lossy()
        .into_owned();

    let mut total = IngestSummary::default();
    for input in inputs {
        total.add(ingest(&mut router, cfg, input, &host)?);
    }
    router.close().context("failed to close output shards")?;

    info!(
        inputs = inputs.len(),
        rows = total.rows,
        skipped = total.skipped,
        shards = %cfg.out_dir.display(),
        "sharding finished"
    );
    Ok(())
}

/// Routes every row of one input batch. An input that cannot be opened is
/// logged and skipped.
pub fn ingest(
    router: &mut ShardRouter,
    cfg: &ShardConfig,
    input: &Path,
    host: &str,
) -> Result<IngestSummary> {
    info!(input = %input.display(), "processing input");
    let rows = match ColumnReader::open(input, &cfg.columns)
        .map(|r| r.with_policy(cfg.read_policy()))
        .and_then(|r| r.rows())
    {
        Ok(rows) => rows,
        Err(e) => {
            warn!(input = %input.display(), error = %format!("{:#}", e), "skipping input");
            return Ok(IngestSummary::default());
        }
    };

    let provenance = format!("{}:{}", host, input.display()).into_bytes();
    let mut summary = IngestSummary::default();

    for row in rows {
        let mut row = row.with_context(|| format!("failed to read input {}", input.display()))?;
        row.insert(cfg.provenance_column.clone(), provenance.clone());

        match router.write_row(&row) {
            Ok(()) => summary.rows += 1,
            Err(ShardError::Routing(e)) => {
                warn!(input = %input.display(), error = %e, "skipping row");
                summary.skipped += 1;
            }
            Err(e) => {
                return Err(e).with_context(|| format!("error writing row from {}", input.display()));
            }
        }
    }

    info!(input = %input.display(), rows = summary.rows, skipped = summary.skipped, "input done");
    Ok(summary)
}

/// Prints the shard id of each URL, or of each stdin line when `urls` is
/// empty. Stops at the first URL without a shard.
pub fn run_shard_id(cfg: &ShardConfig, urls: &[String]) -> Result<()> {
    let rules = load_rules(cfg)?;
    let stdout = io::stdout();
    let mut out = stdout.lock();

    let mut emit = |url: &str| -> Result<()> {
        let id = shard_id(url, cfg.shard_bits, &rules)
            .with_context(|| format!("error computing shard id for {:?}", url))?;
        writeln!(out, "{}", id)?;
        Ok(())
    };

    if urls.is_empty() {
        for line in io::stdin().lock().lines() {
            let line = line.context("failed to read standard input")?;
            emit(line.as_str())?;
        }
    } else {
        for url in urls {
            emit(url.as_str())?;
        }
    }
    Ok(())
}

/// Appends `sources` to the batches under `cfg.out_dir`.
pub fn run_merge(cfg: &ShardConfig, sources: &[PathBuf]) -> Result<()> {
    cfg.validate().context("invalid merge configuration")?;
    let summary = merge_batches(
        &cfg.out_dir,
        sources,
        &cfg.output_columns(),
        cfg.batch_size_bytes(),
    )?;
    info!(
        sources = summary.sources,
        batches = ?summary.batches,
        out = %cfg.out_dir.display(),
        "merge finished"
    );
    Ok(())
}

/// Prints statistics (or their health summary) for one batch as JSON.
pub fn run_stat(dir: &Path, columns: &[String], mode: StatMode) -> Result<()> {
    let stats = if mode.calculate {
        ShardStats::calc(dir, columns)
    } else {
        ShardStats::read(dir).context("no stored statistics, use -c to calculate")?
    };

    if mode.write {
        stats.write()?;
        info!(dir = %dir.display(), "statistics written");
    }

    let json = if mode.summary {
        serde_json::to_string_pretty(&stats.health())?
    } else {
        serde_json::to_string_pretty(&stats)?
    };
    let stdout = io::stdout();
    let mut out = stdout.lock();
    writeln!(out, "{}", json)?;
    Ok(())
}
