//! In-memory model of the host build's chunk graph.
//!
//! The graph is an arena: chunks and chunk groups are stored once and referenced through
//! copyable keys handed out by [`ChunkGraph`]. Chunk groups form a closed set of variants so
//! traversals can ask whether an ancestor is an entry point without inspecting runtime types.

use std::collections::BTreeMap;

/// Key of a chunk stored in a [`ChunkGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkUkey(usize);

/// Key of a chunk group stored in a [`ChunkGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkGroupUkey(usize);

/// A unit of bundled output mapped to one emitted file.
#[derive(Debug, Clone, Default)]
pub struct Chunk {
  id: String,
  name: Option<String>,
  hash: Option<String>,
  content_hash: BTreeMap<String, String>,
  filename_template: Option<String>,
  groups: Vec<ChunkGroupUkey>,
}

impl Chunk {
  /// Create a chunk with the given stable identifier.
  pub fn new(id: impl Into<String>) -> Self {
    Self {
      id: id.into(),
      ..Self::default()
    }
  }

  /// Attach the chunk name used by `[name]` placeholders.
  pub fn with_name(mut self, name: impl Into<String>) -> Self {
    self.name = Some(name.into());
    self
  }

  /// Attach the chunk hash used by `[chunkhash]` placeholders.
  pub fn with_hash(mut self, hash: impl Into<String>) -> Self {
    self.hash = Some(hash.into());
    self
  }

  /// Attach a content hash for one content type, e.g. `javascript`.
  pub fn with_content_hash(mut self, kind: impl Into<String>, hash: impl Into<String>) -> Self {
    self.content_hash.insert(kind.into(), hash.into());
    self
  }

  /// Override the output filename template for this chunk only.
  pub fn with_filename_template(mut self, template: impl Into<String>) -> Self {
    self.filename_template = Some(template.into());
    self
  }

  /// Stable identifier; used to deduplicate chunks across entry points.
  pub fn id(&self) -> &str {
    &self.id
  }

  /// Optional chunk name.
  pub fn name(&self) -> Option<&str> {
    self.name.as_deref()
  }

  /// Optional chunk hash.
  pub fn hash(&self) -> Option<&str> {
    self.hash.as_deref()
  }

  /// Content hash recorded for the given content type.
  pub fn content_hash(&self, kind: &str) -> Option<&str> {
    self.content_hash.get(kind).map(String::as_str)
  }

  /// Per-chunk filename template override.
  pub fn filename_template(&self) -> Option<&str> {
    self.filename_template.as_deref()
  }

  /// Chunk groups this chunk belongs to, in connection order.
  pub fn groups(&self) -> &[ChunkGroupUkey] {
    &self.groups
  }
}

/// Root of the dependency graph for one configured entry.
#[derive(Debug, Clone)]
pub struct EntryPoint {
  name: String,
  runtime_chunk: ChunkUkey,
  chunks: Vec<ChunkUkey>,
  parents: Vec<ChunkGroupUkey>,
}

impl EntryPoint {
  /// Entry name.
  pub fn name(&self) -> &str {
    &self.name
  }

  /// Chunk carrying the module loading machinery for this entry.
  pub fn runtime_chunk(&self) -> ChunkUkey {
    self.runtime_chunk
  }

  /// Chunks owned by this entry point, in load order.
  pub fn chunks(&self) -> &[ChunkUkey] {
    &self.chunks
  }

  /// Parent chunk groups, which may or may not be entry points.
  pub fn parents(&self) -> &[ChunkGroupUkey] {
    &self.parents
  }
}

/// A chunk group created for an on-demand (dynamic) import.
#[derive(Debug, Clone)]
pub struct AsyncGroup {
  name: Option<String>,
  chunks: Vec<ChunkUkey>,
  parents: Vec<ChunkGroupUkey>,
}

impl AsyncGroup {
  /// Optional group name.
  pub fn name(&self) -> Option<&str> {
    self.name.as_deref()
  }
}

/// Node variants of the chunk-group ancestry graph.
#[derive(Debug, Clone)]
pub enum ChunkGroup {
  /// Configured entry with its own runtime chunk.
  EntryPoint(EntryPoint),
  /// Group created by a dynamic import.
  Async(AsyncGroup),
}

impl ChunkGroup {
  /// The entry point view of this group, when it is one.
  pub fn as_entrypoint(&self) -> Option<&EntryPoint> {
    match self {
      Self::EntryPoint(entry) => Some(entry),
      Self::Async(_) => None,
    }
  }

  /// Group name, if any.
  pub fn name(&self) -> Option<&str> {
    match self {
      Self::EntryPoint(entry) => Some(entry.name()),
      Self::Async(group) => group.name(),
    }
  }

  /// Chunks owned by the group.
  pub fn chunks(&self) -> &[ChunkUkey] {
    match self {
      Self::EntryPoint(entry) => &entry.chunks,
      Self::Async(group) => &group.chunks,
    }
  }

  /// Parent groups.
  pub fn parents(&self) -> &[ChunkGroupUkey] {
    match self {
      Self::EntryPoint(entry) => &entry.parents,
      Self::Async(group) => &group.parents,
    }
  }

  fn chunks_mut(&mut self) -> &mut Vec<ChunkUkey> {
    match self {
      Self::EntryPoint(entry) => &mut entry.chunks,
      Self::Async(group) => &mut group.chunks,
    }
  }

  fn parents_mut(&mut self) -> &mut Vec<ChunkGroupUkey> {
    match self {
      Self::EntryPoint(entry) => &mut entry.parents,
      Self::Async(group) => &mut group.parents,
    }
  }
}

#[derive(Debug, Clone)]
struct EntryModule {
  module: String,
  chunk: ChunkUkey,
  group: ChunkGroupUkey,
}

/// An entry module of a chunk together with the entry point it starts.
#[derive(Debug, Clone, Copy)]
pub struct EntryModuleRef<'a> {
  /// Identifier of the entry module.
  pub module: &'a str,
  /// Key of the entry point's chunk group.
  pub group: ChunkGroupUkey,
  /// The entry point itself.
  pub entrypoint: &'a EntryPoint,
}

/// Arena holding every chunk, chunk group and entry-module association of a build.
#[derive(Debug, Clone, Default)]
pub struct ChunkGraph {
  chunks: Vec<Chunk>,
  chunk_groups: Vec<ChunkGroup>,
  entry_modules: Vec<EntryModule>,
}

impl ChunkGraph {
  /// Create an empty graph.
  pub fn new() -> Self {
    Self::default()
  }

  /// Store a chunk and return its key.
  pub fn add_chunk(&mut self, mut chunk: Chunk) -> ChunkUkey {
    chunk.groups.clear();
    self.chunks.push(chunk);
    ChunkUkey(self.chunks.len() - 1)
  }

  /// Create an entry point whose runtime lives in `runtime_chunk`.
  ///
  /// The runtime chunk is connected to the new group as its first chunk.
  pub fn add_entrypoint(
    &mut self,
    name: impl Into<String>,
    runtime_chunk: ChunkUkey,
  ) -> ChunkGroupUkey {
    self.chunk_groups.push(ChunkGroup::EntryPoint(EntryPoint {
      name: name.into(),
      runtime_chunk,
      chunks: Vec::new(),
      parents: Vec::new(),
    }));
    let ukey = ChunkGroupUkey(self.chunk_groups.len() - 1);
    self.connect_chunk_and_group(runtime_chunk, ukey);
    ukey
  }

  /// Create a chunk group for a dynamic import.
  pub fn add_async_group(&mut self, name: Option<String>) -> ChunkGroupUkey {
    self.chunk_groups.push(ChunkGroup::Async(AsyncGroup {
      name,
      chunks: Vec::new(),
      parents: Vec::new(),
    }));
    ChunkGroupUkey(self.chunk_groups.len() - 1)
  }

  /// Record that `group` owns `chunk`. Connecting twice is a no-op.
  pub fn connect_chunk_and_group(&mut self, chunk: ChunkUkey, group: ChunkGroupUkey) {
    let chunks = self.chunk_groups[group.0].chunks_mut();
    if !chunks.contains(&chunk) {
      chunks.push(chunk);
    }

    let groups = &mut self.chunks[chunk.0].groups;
    if !groups.contains(&group) {
      groups.push(group);
    }
  }

  /// Record that `parent` is a parent group of `child`.
  pub fn add_parent(&mut self, child: ChunkGroupUkey, parent: ChunkGroupUkey) {
    let parents = self.chunk_groups[child.0].parents_mut();
    if !parents.contains(&parent) {
      parents.push(parent);
    }
  }

  /// Mark `module` as an entry module of `chunk` for `group`.
  ///
  /// The chunk is connected to the group as well.
  pub fn connect_entry_module(
    &mut self,
    module: impl Into<String>,
    chunk: ChunkUkey,
    group: ChunkGroupUkey,
  ) {
    self.connect_chunk_and_group(chunk, group);
    self.entry_modules.push(EntryModule {
      module: module.into(),
      chunk,
      group,
    });
  }

  /// Chunk stored under `ukey`.
  ///
  /// Keys are only handed out by this graph, so a foreign key is a caller bug and panics.
  pub fn chunk(&self, ukey: ChunkUkey) -> &Chunk {
    &self.chunks[ukey.0]
  }

  /// Chunk group stored under `ukey`.
  pub fn chunk_group(&self, ukey: ChunkGroupUkey) -> &ChunkGroup {
    &self.chunk_groups[ukey.0]
  }

  /// Look up a chunk by its stable identifier.
  pub fn chunk_by_id(&self, id: &str) -> Option<ChunkUkey> {
    self
      .chunks
      .iter()
      .position(|chunk| chunk.id == id)
      .map(ChunkUkey)
  }

  /// Every chunk key in insertion order.
  pub fn chunks(&self) -> impl Iterator<Item = ChunkUkey> + '_ {
    (0..self.chunks.len()).map(ChunkUkey)
  }

  /// Entry modules of `chunk` paired with the entry point they start, in insertion order.
  ///
  /// Associations pointing at a non-entry group are skipped.
  pub fn entry_modules_with_chunk_group(&self, chunk: ChunkUkey) -> Vec<EntryModuleRef<'_>> {
    self
      .entry_modules
      .iter()
      .filter(|entry| entry.chunk == chunk)
      .filter_map(|entry| {
        self
          .chunk_group(entry.group)
          .as_entrypoint()
          .map(|entrypoint| EntryModuleRef {
            module: &entry.module,
            group: entry.group,
            entrypoint,
          })
      })
      .collect()
  }

  /// Whether the chunk is loaded initially, i.e. belongs to at least one entry point.
  pub fn is_initial(&self, chunk: ChunkUkey) -> bool {
    self
      .chunk(chunk)
      .groups
      .iter()
      .any(|group| self.chunk_group(*group).as_entrypoint().is_some())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn entrypoint_owns_its_runtime_chunk_first() {
    let mut graph = ChunkGraph::new();
    let runtime = graph.add_chunk(Chunk::new("runtime"));
    let main = graph.add_chunk(Chunk::new("main"));
    let entry = graph.add_entrypoint("main", runtime);
    graph.connect_entry_module("./src/main.js", main, entry);
    graph.connect_chunk_and_group(main, entry);

    let group = graph.chunk_group(entry);
    assert_eq!(group.chunks(), &[runtime, main]);
    assert_eq!(group.as_entrypoint().map(EntryPoint::runtime_chunk), Some(runtime));
    assert_eq!(graph.chunk(main).groups(), &[entry]);
  }

  #[test]
  fn entry_modules_skip_non_entry_groups() {
    let mut graph = ChunkGraph::new();
    let chunk = graph.add_chunk(Chunk::new("lazy"));
    let lazy = graph.add_async_group(Some("lazy".into()));
    graph.connect_entry_module("./src/lazy.js", chunk, lazy);

    assert!(graph.entry_modules_with_chunk_group(chunk).is_empty());
    assert!(!graph.is_initial(chunk));
  }

  #[test]
  fn finds_chunks_by_identifier() {
    let mut graph = ChunkGraph::new();
    graph.add_chunk(Chunk::new("a"));
    let b = graph.add_chunk(Chunk::new("b").with_name("vendor"));

    assert_eq!(graph.chunk_by_id("b"), Some(b));
    assert_eq!(graph.chunk(b).name(), Some("vendor"));
    assert_eq!(graph.chunk_by_id("missing"), None);
    assert_eq!(graph.chunks().count(), 2);
  }

  #[test]
  fn parents_are_recorded_once() {
    let mut graph = ChunkGraph::new();
    let runtime = graph.add_chunk(Chunk::new("runtime"));
    let app = graph.add_entrypoint("app", runtime);
    let page = graph.add_entrypoint("page", runtime);
    graph.add_parent(page, app);
    graph.add_parent(page, app);

    assert_eq!(graph.chunk_group(page).parents(), &[app]);
    assert_eq!(graph.chunk_group(page).name(), Some("page"));
  }
}
