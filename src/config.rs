//! Rewrite configuration describing output naming and the placeholder token.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::warn;

use crate::render::DEFAULT_PLACEHOLDER;
use crate::template::{
  DEFAULT_CHUNK_FILENAME, DEFAULT_FILENAME, DEFAULT_HASH_DIGEST_LENGTH, JAVASCRIPT_CONTENT_HASH,
  OutputOptions,
};

/// File name searched for when discovering configuration in a directory.
pub const DEFAULT_CONFIG_FILE: &str = "mini-program-require.config.json";

/// Discoverable configuration for rewriting a build's output.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RewriteConfig {
  /// Token replaced with the relative path back to the build root.
  pub placeholder: String,
  /// Filename template for initial chunks.
  pub filename: String,
  /// Filename template for chunks loaded on demand.
  pub chunk_filename: String,
  /// Default length of hash placeholders.
  pub hash_digest_length: usize,
  /// Content type `[contenthash]` refers to.
  pub content_hash_type: String,
  /// Compilation hash, when the stats do not carry one.
  pub full_hash: Option<String>,
}

impl Default for RewriteConfig {
  fn default() -> Self {
    Self {
      placeholder: DEFAULT_PLACEHOLDER.into(),
      filename: DEFAULT_FILENAME.into(),
      chunk_filename: DEFAULT_CHUNK_FILENAME.into(),
      hash_digest_length: DEFAULT_HASH_DIGEST_LENGTH,
      content_hash_type: JAVASCRIPT_CONTENT_HASH.into(),
      full_hash: None,
    }
  }
}

impl RewriteConfig {
  /// Load configuration from `dir`, falling back to defaults.
  ///
  /// A missing file yields the defaults silently; an unreadable or malformed one is reported
  /// and the defaults are used so the rewrite can still proceed.
  pub fn discover(dir: &Path) -> Self {
    let candidate = dir.join(DEFAULT_CONFIG_FILE);
    if !candidate.exists() {
      return Self::default();
    }

    Self::from_path(&candidate).unwrap_or_else(|err| {
      warn!("ignoring {}: {err:#}", candidate.display());
      Self::default()
    })
  }

  /// Read `explicit` when given, otherwise discover configuration in `dir`.
  pub fn load(explicit: Option<&Path>, dir: &Path) -> Result<Self> {
    match explicit {
      Some(path) => Self::from_path(path),
      None => Ok(Self::discover(dir)),
    }
  }

  /// Read configuration from a JSON or YAML file, chosen by extension.
  pub fn from_path(path: &Path) -> Result<Self> {
    let content =
      fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;

    let is_yaml = path
      .extension()
      .and_then(|ext| ext.to_str())
      .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"));

    if is_yaml {
      serde_yaml::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))
    } else {
      serde_json::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))
    }
  }

  /// Output naming options derived from this configuration.
  pub fn to_output_options(&self) -> OutputOptions {
    OutputOptions {
      filename: self.filename.clone(),
      chunk_filename: self.chunk_filename.clone(),
      hash_digest_length: self.hash_digest_length,
      full_hash: self.full_hash.clone(),
    }
  }
}
