//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

/// Copy files and directory trees from a remote namespace to local storage.
///
/// Every `--item` pair is copied concurrently as part of one task; the
/// process exits once the task reaches a terminal status.
#[derive(Parser, Debug)]
#[command(name = "copier")]
#[command(author, version, about)]
pub struct Args {
    /// Namespace to copy from (resolved via <conf-basedir>/<namespace>.conf)
    #[arg(short, long, value_parser = parse_namespace)]
    pub namespace: String,

    /// Source and destination pair, as SRC=DST (repeatable)
    #[arg(
        short,
        long = "item",
        value_name = "SRC=DST",
        required = true,
        value_parser = parse_item_pair
    )]
    pub items: Vec<ItemPair>,

    /// Bandwidth limit per item in MB/s (unlimited if omitted)
    #[arg(short, long, value_name = "MBPS", value_parser = clap::value_parser!(u32).range(1..))]
    pub bandwidth: Option<u32>,

    /// Maximum concurrent item copies (1-100)
    #[arg(short, long, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub threads: Option<u8>,

    /// Skip checksum verification
    #[arg(long)]
    pub no_checksum: bool,

    /// Directory holding per-namespace configuration files
    #[arg(long, value_name = "DIR")]
    pub conf_basedir: Option<PathBuf>,

    /// Config file to use instead of the default location
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Print the final task snapshot as JSON
    #[arg(long)]
    pub json: bool,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}

/// One `SRC=DST` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemPair {
    /// Remote source path.
    pub source: String,
    /// Local destination path.
    pub dest: String,
}

fn parse_namespace(raw: &str) -> Result<String, String> {
    let namespace = raw.trim();
    if namespace.is_empty() {
        return Err("namespace must not be empty".to_string());
    }
    Ok(namespace.to_string())
}

fn parse_item_pair(raw: &str) -> Result<ItemPair, String> {
    let Some((source, dest)) = raw.split_once('=') else {
        return Err(format!("expected SRC=DST, got '{raw}'"));
    };
    let (source, dest) = (source.trim(), dest.trim());
    if source.is_empty() || dest.is_empty() {
        return Err(format!("source and destination must both be non-empty in '{raw}'"));
    }
    Ok(ItemPair {
        source: source.to_string(),
        dest: dest.to_string(),
    })
}
