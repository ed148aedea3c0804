use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use mini_program_require::{ChunkGraphStats, RequireRewriter, RewriteConfig};

/// Rewrite emitted chunks so each entry loads its runtime and shared chunks with `require`.
#[derive(Debug, Parser)]
#[command(name = "mini-program-require", version, about)]
struct Cli {
  /// Chunk-graph stats JSON written by the build.
  #[arg(long)]
  stats: PathBuf,

  /// Directory the build emitted its chunks into.
  #[arg(long)]
  output_dir: PathBuf,

  /// Configuration file (JSON or YAML). Discovered in the working directory when omitted.
  #[arg(long)]
  config: Option<PathBuf>,

  /// Report what would change without writing any file.
  #[arg(long)]
  dry_run: bool,

  /// Increase log verbosity (-v for debug, -vv for trace).
  #[arg(short, long, action = clap::ArgAction::Count)]
  verbose: u8,
}

fn init_tracing(verbose: u8) {
  let default_level = match verbose {
    0 => LevelFilter::INFO,
    1 => LevelFilter::DEBUG,
    _ => LevelFilter::TRACE,
  };

  tracing_subscriber::registry()
    .with(fmt::layer().with_target(false))
    .with(
      EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy(),
    )
    .init();
}

fn main() -> Result<()> {
  let cli = Cli::parse();
  init_tracing(cli.verbose);

  let cwd = std::env::current_dir().context("failed to determine working directory")?;
  let config = RewriteConfig::load(cli.config.as_deref(), &cwd)?;
  let stats = ChunkGraphStats::load_from_path(&cli.stats)?;
  let graph = stats.to_chunk_graph()?;

  let rewriter = RequireRewriter::for_stats(&config, &stats)?;
  let report = rewriter.rewrite_output_dir(&graph, &cli.output_dir, cli.dry_run)?;
  info!(
    rewritten = report.rewritten.len(),
    unchanged = report.unchanged.len(),
    missing = report.missing.len(),
    dry_run = cli.dry_run,
    "finished rewriting {}",
    cli.output_dir.display()
  );

  Ok(())
}
