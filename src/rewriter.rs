//! Rewrite every emitted chunk of a build so it loads its dependencies with `require`.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tracing::{debug, info, warn};

use crate::config::RewriteConfig;
use crate::graph::{ChunkGraph, ChunkUkey};
use crate::stats::ChunkGraphStats;
use crate::path::{escapes_root, normalize_segments};
use crate::render::{ConcatSource, MiniProgramRequirePlugin, RenderContext, RenderPlugin};
use crate::template::{JAVASCRIPT_CONTENT_HASH, OutputOptions, TemplateError, chunk_output_path};

/// Outcome of rewriting an output directory.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RewriteReport {
  /// Files whose contents changed.
  pub rewritten: Vec<PathBuf>,
  /// Files that were read but needed no change.
  pub unchanged: Vec<PathBuf>,
  /// Chunk outputs that were not found on disk.
  pub missing: Vec<PathBuf>,
}

/// Applies the require render hook to the chunks of a build.
#[derive(Debug, Clone)]
pub struct RequireRewriter {
  plugin: MiniProgramRequirePlugin,
  output: OutputOptions,
  content_hash_type: String,
}

impl Default for RequireRewriter {
  fn default() -> Self {
    Self {
      plugin: MiniProgramRequirePlugin::new(),
      output: OutputOptions::default(),
      content_hash_type: JAVASCRIPT_CONTENT_HASH.to_string(),
    }
  }
}

impl RequireRewriter {
  /// Create a rewriter from explicit parts.
  pub fn new(
    plugin: MiniProgramRequirePlugin,
    output: OutputOptions,
    content_hash_type: impl Into<String>,
  ) -> Self {
    Self {
      plugin,
      output,
      content_hash_type: content_hash_type.into(),
    }
  }

  /// Create a rewriter from configuration.
  pub fn from_config(config: &RewriteConfig) -> Result<Self> {
    let plugin = MiniProgramRequirePlugin::with_placeholder(&config.placeholder)
      .with_context(|| format!("invalid placeholder `{}`", config.placeholder))?;
    Ok(Self::new(
      plugin,
      config.to_output_options(),
      config.content_hash_type.clone(),
    ))
  }

  /// Create a rewriter for the build described by `stats`.
  ///
  /// The compilation hash recorded in the stats wins over the one in `config`.
  pub fn for_stats(config: &RewriteConfig, stats: &ChunkGraphStats) -> Result<Self> {
    let mut rewriter = Self::from_config(config)?;
    if let Some(full_hash) = &stats.full_hash {
      rewriter.output.full_hash = Some(full_hash.clone());
    }
    Ok(rewriter)
  }

  /// Output path of `chunk`, relative to the output directory.
  pub fn output_path(
    &self,
    graph: &ChunkGraph,
    chunk: ChunkUkey,
  ) -> Result<String, TemplateError> {
    chunk_output_path(&self.output, graph, chunk, &self.content_hash_type)
  }

  /// Render one chunk from its emitted body.
  pub fn rewrite_chunk(
    &self,
    graph: &ChunkGraph,
    chunk: ChunkUkey,
    body: &str,
  ) -> Result<String, TemplateError> {
    let ctx = RenderContext {
      chunk,
      chunk_graph: graph,
      templating: &self.output,
      content_hash_type: &self.content_hash_type,
    };
    let rendered = self.plugin.render(ConcatSource::from(body), &ctx)?;
    Ok(rendered.source())
  }

  /// Rewrite every chunk file of `graph` found under `output_dir`.
  ///
  /// Chunks whose file is absent are recorded as missing and skipped. With `dry_run` nothing
  /// is written, but the report still lists the files that would change.
  pub fn rewrite_output_dir(
    &self,
    graph: &ChunkGraph,
    output_dir: &Path,
    dry_run: bool,
  ) -> Result<RewriteReport> {
    let mut report = RewriteReport::default();

    for chunk in graph.chunks() {
      let location = self.output_path(graph, chunk).with_context(|| {
        format!(
          "failed to resolve output path of chunk `{}`",
          graph.chunk(chunk).id()
        )
      })?;
      let file = resolve_output_file(output_dir, &location)?;

      let body = match fs::read_to_string(&file) {
        Ok(body) => body,
        Err(err) if err.kind() == ErrorKind::NotFound => {
          warn!("chunk output {} not found, skipping", file.display());
          report.missing.push(file);
          continue;
        }
        Err(err) => {
          return Err(err).with_context(|| format!("failed to read {}", file.display()));
        }
      };

      let rewritten = self
        .rewrite_chunk(graph, chunk, &body)
        .with_context(|| format!("failed to render {}", file.display()))?;

      if rewritten == body {
        debug!("{} unchanged", file.display());
        report.unchanged.push(file);
        continue;
      }

      if !dry_run {
        fs::write(&file, rewritten)
          .with_context(|| format!("failed to write {}", file.display()))?;
      }
      info!("rewrote {}", file.display());
      report.rewritten.push(file);
    }

    Ok(report)
  }
}

fn resolve_output_file(output_dir: &Path, location: &str) -> Result<PathBuf> {
  let segments = normalize_segments(location);
  if escapes_root(&segments) {
    bail!(
      "chunk output `{location}` is emitted outside {}",
      output_dir.display()
    );
  }
  Ok(
    segments
      .iter()
      .fold(output_dir.to_path_buf(), |path, segment| path.join(segment)),
  )
}
