//! # crawlshard - domain-hash sharding of crawl column stores
//!
//! Reads batches in the column format (`<dir>/<column>.gz`, one line per
//! record) and redistributes their rows into a tree of shards keyed by the
//! registrable domain of each URL.
//!
//! ## Commands
//!
//! ```text
//! shard [-l list] [dirs...]   shard input batches into <out>/<shard>/<batch>/
//! shard-id [urls...]          print the shard id of each URL (or stdin line)
//! merge [dirs...]             append whole batches into <out>/<batch>/
//! stat [-c] [-w] [-s] <dir>   per-column byte/record counts and health
//! ```
//!
//! ## Configuration
//!
//! Every run starts from the `CRAWLSHARD_*` environment variables (see the
//! `config` crate); command-line flags override them.
//!
//! ```text
//! CRAWLSHARD_OUT_DIR      output root                   (default: ".")
//! CRAWLSHARD_SHARD_BITS   shard count is 2^bits         (default: 8)
//! CRAWLSHARD_BATCH_MB     batch budget in MiB           (default: 100)
//! CRAWLSHARD_KEY          routing key column            (default: "url")
//! CRAWLSHARD_COLUMNS      comma-separated input columns (default: "plain_text,url,mime")
//! CRAWLSHARD_SUFFIX_FILE  extra public suffix rules     (default: unset)
//! CRAWLSHARD_FATAL_READ   abort on column read errors   (default: "true")
//! RUST_LOG                log filter                    (default: "info")
//! ```
//!
//! Logs go to stderr. stdout carries only command output.
//!
//! ## Example
//!
//! ```text
//! $ crawlshard shard -o out -n 8 -b 100 crawl/batch-0001 crawl/batch-0002
//! $ echo http://www.reddit.com/ | crawlshard shard-id -n 8
//! 249
//! $ crawlshard merge -o merged/249 out-a/249/1 out-b/249/1
//! $ crawlshard stat -c -s merged/249/1
//! ```

mod commands;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use config::{split_columns, ShardConfig};
use std::io::IsTerminal;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "crawlshard")]
#[command(about = "Domain-hash sharding of crawl column stores", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Shard input batches into <out>/<shard>/<batch>/
    Shard(ShardArgs),
    /// Print the shard id of each URL, one per line
    ShardId(ShardIdArgs),
    /// Merge whole batches into the batches of one directory
    Merge(MergeArgs),
    /// Read, calculate or write batch statistics
    Stat(StatArgs),
}

/// Flags shared by every command that builds a [`ShardConfig`].
#[derive(Args, Debug)]
struct ConfigArgs {
    /// Output location
    #[arg(short = 'o', long)]
    out_dir: Option<PathBuf>,

    /// Number of shards is 2^n
    #[arg(short = 'n', long = "bits")]
    shard_bits: Option<u32>,

    /// Batch size in MiB
    #[arg(short = 'b', long = "batch-mb")]
    batch_size_mb: Option<u64>,

    /// Columns to shard, separated by commas
    #[arg(short = 'f', long)]
    columns: Option<String>,

    /// Additional public suffix entries, one per line
    #[arg(short = 'd', long)]
    suffix_file: Option<PathBuf>,
}

impl ConfigArgs {
    /// Layers these flags over the environment.
    fn resolve(&self) -> Result<ShardConfig> {
        let mut cfg = ShardConfig::from_env()?;
        if let Some(dir) = &self.out_dir {
            cfg.out_dir = dir.clone();
        }
        if let Some(bits) = self.shard_bits {
            cfg.shard_bits = bits;
        }
        if let Some(mb) = self.batch_size_mb {
            cfg.batch_size_mb = mb;
        }
        if let Some(list) = &self.columns {
            cfg.columns = split_columns(list);
        }
        if let Some(path) = &self.suffix_file {
            cfg.suffix_file = Some(path.clone());
        }
        Ok(cfg)
    }
}

#[derive(Args)]
struct ShardArgs {
    #[command(flatten)]
    config: ConfigArgs,

    /// Routing key column
    #[arg(short = 'k', long)]
    key: Option<String>,

    /// File listing input directories, one per line
    #[arg(short = 'l', long)]
    list: Option<PathBuf>,

    /// Log column read errors and move on to the next input
    #[arg(long)]
    lenient: bool,

    /// Input batch directories
    inputs: Vec<PathBuf>,
}

#[derive(Args)]
struct ShardIdArgs {
    #[command(flatten)]
    config: ConfigArgs,

    /// URLs to hash; reads stdin lines when none are given
    urls: Vec<String>,
}

#[derive(Args)]
struct MergeArgs {
    #[command(flatten)]
    config: ConfigArgs,

    /// Source batch directories, appended in order
    sources: Vec<PathBuf>,
}

#[derive(Args)]
struct StatArgs {
    /// Columns to count, separated by commas (default: configured columns plus provenance)
    #[arg(short = 'f', long)]
    columns: Option<String>,

    /// Force recalculation instead of reading stored statistics
    #[arg(short = 'c', long)]
    calculate: bool,

    /// Write the statistics into the batch
    #[arg(short = 'w', long)]
    write: bool,

    /// Print the health summary instead of the raw statistics
    #[arg(short = 's', long)]
    summary: bool,

    /// Batch directory
    dir: PathBuf,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Shard(args) => {
            let mut cfg = args.config.resolve()?;
            if let Some(key) = args.key {
                cfg.key_column = key;
            }
            if args.lenient {
                cfg.fatal_read_errors = false;
            }
            let inputs = commands::collect_inputs(args.inputs, args.list.as_deref())?;
            commands::run_shard(&cfg, &inputs)
        }
        Command::ShardId(args) => {
            let cfg = args.config.resolve()?;
            commands::run_shard_id(&cfg, &args.urls)
        }
        Command::Merge(args) => {
            let cfg = args.config.resolve()?;
            commands::run_merge(&cfg, &args.sources)
        }
        Command::Stat(args) => {
            let columns = match &args.columns {
                Some(list) => split_columns(list),
                None => ShardConfig::from_env()?.output_columns(),
            };
            commands::run_stat(
                &args.dir,
                &columns,
                commands::StatMode {
                    calculate: args.calculate,
                    write: args.write,
                    summary: args.summary,
                },
            )
        }
    }
}
