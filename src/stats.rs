//! Serialised chunk-graph description emitted by the host build.
//!
//! The document lists chunks, chunk groups and entry-module associations by identifier. It is
//! validated while being lowered into a [`ChunkGraph`] so that every reference resolves.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::graph::{Chunk, ChunkGraph, ChunkGroupUkey, ChunkUkey};

/// Chunk-graph stats as written by the host build.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkGraphStats {
  /// Compilation hash used by `[fullhash]`.
  #[serde(default)]
  pub full_hash: Option<String>,
  /// Every emitted chunk.
  #[serde(default)]
  pub chunks: Vec<ChunkRecord>,
  /// Entry points and async groups.
  #[serde(default)]
  pub chunk_groups: Vec<ChunkGroupRecord>,
  /// Entry modules and the chunk and entry point they belong to.
  #[serde(default)]
  pub entry_modules: Vec<EntryModuleRecord>,
}

/// One emitted chunk.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkRecord {
  /// Stable chunk identifier.
  pub id: String,
  /// Optional chunk name.
  #[serde(default)]
  pub name: Option<String>,
  /// Chunk hash.
  #[serde(default)]
  pub hash: Option<String>,
  /// Content hashes keyed by content type.
  #[serde(default)]
  pub content_hash: BTreeMap<String, String>,
  /// Filename template overriding the output options for this chunk.
  #[serde(default)]
  pub filename_template: Option<String>,
}

/// Chunk group entry, tagged by its `kind`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ChunkGroupRecord {
  /// A configured entry point.
  #[serde(rename_all = "camelCase")]
  Entrypoint {
    /// Entry name, referenced by `parents` and entry modules.
    name: String,
    /// Identifier of the runtime chunk.
    runtime_chunk: String,
    /// Identifiers of owned chunks.
    #[serde(default)]
    chunks: Vec<String>,
    /// Names of parent groups.
    #[serde(default)]
    parents: Vec<String>,
  },
  /// A group created by a dynamic import.
  #[serde(rename_all = "camelCase")]
  Async {
    /// Group name, referenced by `parents`.
    name: String,
    /// Identifiers of owned chunks.
    #[serde(default)]
    chunks: Vec<String>,
    /// Names of parent groups.
    #[serde(default)]
    parents: Vec<String>,
  },
}

impl ChunkGroupRecord {
  fn name(&self) -> &str {
    match self {
      Self::Entrypoint { name, .. } | Self::Async { name, .. } => name,
    }
  }

  fn chunks(&self) -> &[String] {
    match self {
      Self::Entrypoint { chunks, .. } | Self::Async { chunks, .. } => chunks,
    }
  }

  fn parents(&self) -> &[String] {
    match self {
      Self::Entrypoint { parents, .. } | Self::Async { parents, .. } => parents,
    }
  }
}

/// Association of an entry module with its chunk and entry point.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryModuleRecord {
  /// Module identifier.
  pub module: String,
  /// Identifier of the chunk the module is an entry of.
  pub chunk: String,
  /// Name of the entry point.
  pub entrypoint: String,
}

/// Errors raised while loading or lowering chunk-graph stats.
#[derive(Debug)]
pub enum StatsError {
  /// Failed to read the stats file.
  Io {
    /// Path that caused the error.
    path: PathBuf,
    /// Source I/O error.
    source: std::io::Error,
  },
  /// Failed to parse the stats JSON.
  Parse {
    /// Path that caused the error.
    path: PathBuf,
    /// Source parse error.
    source: serde_json::Error,
  },
  /// Two chunks share an identifier.
  DuplicateChunk(String),
  /// Two chunk groups share a name.
  DuplicateChunkGroup(String),
  /// A reference names a chunk that is not listed.
  UnknownChunk(String),
  /// A reference names a chunk group that is not listed.
  UnknownChunkGroup(String),
  /// An entry module points at a group that is not an entry point.
  NotAnEntrypoint(String),
}

impl std::fmt::Display for StatsError {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::Io { path, source } => write!(f, "failed to read {}: {}", path.display(), source),
      Self::Parse { path, source } => write!(f, "failed to parse {}: {}", path.display(), source),
      Self::DuplicateChunk(id) => write!(f, "duplicate chunk id `{id}`"),
      Self::DuplicateChunkGroup(name) => write!(f, "duplicate chunk group `{name}`"),
      Self::UnknownChunk(id) => write!(f, "unknown chunk `{id}`"),
      Self::UnknownChunkGroup(name) => write!(f, "unknown chunk group `{name}`"),
      Self::NotAnEntrypoint(name) => write!(f, "chunk group `{name}` is not an entry point"),
    }
  }
}

impl std::error::Error for StatsError {
  fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
    match self {
      Self::Io { source, .. } => Some(source),
      Self::Parse { source, .. } => Some(source),
      _ => None,
    }
  }
}

impl ChunkGraphStats {
  /// Read and parse a stats file.
  pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, StatsError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| StatsError::Io {
      path: path.to_path_buf(),
      source,
    })?;

    serde_json::from_str(&contents).map_err(|source| StatsError::Parse {
      path: path.to_path_buf(),
      source,
    })
  }

  /// Lower the stats into a chunk graph, resolving every reference.
  pub fn to_chunk_graph(&self) -> Result<ChunkGraph, StatsError> {
    let mut graph = ChunkGraph::new();
    let mut chunk_keys: HashMap<&str, ChunkUkey> = HashMap::new();
    let mut group_keys: HashMap<&str, ChunkGroupUkey> = HashMap::new();

    for record in &self.chunks {
      let ukey = graph.add_chunk(record.to_chunk());
      if chunk_keys.insert(&record.id, ukey).is_some() {
        return Err(StatsError::DuplicateChunk(record.id.clone()));
      }
    }

    let lookup_chunk = |id: &str| {
      chunk_keys
        .get(id)
        .copied()
        .ok_or_else(|| StatsError::UnknownChunk(id.to_string()))
    };

    for record in &self.chunk_groups {
      let ukey = match record {
        ChunkGroupRecord::Entrypoint {
          name,
          runtime_chunk,
          ..
        } => graph.add_entrypoint(name.clone(), lookup_chunk(runtime_chunk)?),
        ChunkGroupRecord::Async { name, .. } => graph.add_async_group(Some(name.clone())),
      };
      if group_keys.insert(record.name(), ukey).is_some() {
        return Err(StatsError::DuplicateChunkGroup(record.name().to_string()));
      }
    }

    let lookup_group = |name: &str| {
      group_keys
        .get(name)
        .copied()
        .ok_or_else(|| StatsError::UnknownChunkGroup(name.to_string()))
    };

    for record in &self.chunk_groups {
      let group = lookup_group(record.name())?;
      for id in record.chunks() {
        graph.connect_chunk_and_group(lookup_chunk(id)?, group);
      }
      for parent in record.parents() {
        graph.add_parent(group, lookup_group(parent)?);
      }
    }

    for record in &self.entry_modules {
      let chunk = lookup_chunk(&record.chunk)?;
      let group = lookup_group(&record.entrypoint)?;
      if graph.chunk_group(group).as_entrypoint().is_none() {
        return Err(StatsError::NotAnEntrypoint(record.entrypoint.clone()));
      }
      graph.connect_entry_module(record.module.clone(), chunk, group);
    }

    Ok(graph)
  }
}

impl ChunkRecord {
  fn to_chunk(&self) -> Chunk {
    let mut chunk = Chunk::new(self.id.clone());
    if let Some(name) = &self.name {
      chunk = chunk.with_name(name.clone());
    }
    if let Some(hash) = &self.hash {
      chunk = chunk.with_hash(hash.clone());
    }
    for (kind, hash) in &self.content_hash {
      chunk = chunk.with_content_hash(kind.clone(), hash.clone());
    }
    if let Some(template) = &self.filename_template {
      chunk = chunk.with_filename_template(template.clone());
    }
    chunk
  }
}
