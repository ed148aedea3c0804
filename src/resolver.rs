//! Discovery of the chunks an entry chunk must load before its own body runs.

use indexmap::{IndexMap, IndexSet};
use tracing::trace;

use crate::graph::{ChunkGraph, ChunkGroupUkey, ChunkUkey, EntryModuleRef};
use crate::path::normalize_segments;
use crate::template::{PathTemplating, TemplateError, chunk_output_path};

/// Collect every chunk owned by `entrypoint` or any of its entry point ancestors.
///
/// The traversal is breadth-first over parent groups. Parents that are not entry points are
/// not followed, and each entry point is visited at most once, so cyclic ancestry terminates.
/// Chunks listed in `exclude` are never collected. The result keeps discovery order.
pub fn collect_ancestor_chunks(
  graph: &ChunkGraph,
  entrypoint: ChunkGroupUkey,
  exclude: &[ChunkUkey],
) -> IndexSet<ChunkUkey> {
  let mut visited = IndexSet::from([entrypoint]);
  let mut chunks = IndexSet::new();
  let mut cursor = 0;

  while let Some(&group) = visited.get_index(cursor) {
    cursor += 1;

    let Some(entry) = graph.chunk_group(group).as_entrypoint() else {
      continue;
    };

    chunks.extend(
      entry
        .chunks()
        .iter()
        .filter(|chunk| !exclude.contains(chunk))
        .copied(),
    );

    for &parent in entry.parents() {
      if graph.chunk_group(parent).as_entrypoint().is_some() {
        visited.insert(parent);
      }
    }
  }

  trace!(
    entrypoints = visited.len(),
    chunks = chunks.len(),
    "collected ancestor chunks"
  );
  chunks
}

/// Root-relative output paths of the shared chunks `chunk` depends on.
///
/// Chunks are gathered from every entry point in `entries`, deduplicated by their stable
/// identifier and kept in first-seen order. The chunk itself and the runtime chunk of every
/// entry point are excluded. Paths are normalised and joined with `/`.
pub fn commons_chunk_paths<T: PathTemplating + ?Sized>(
  graph: &ChunkGraph,
  templating: &T,
  chunk: ChunkUkey,
  entries: &[EntryModuleRef<'_>],
  content_hash_type: &str,
) -> Result<Vec<String>, TemplateError> {
  let mut exclude = vec![chunk];
  for entry in entries {
    let runtime = entry.entrypoint.runtime_chunk();
    if !exclude.contains(&runtime) {
      exclude.push(runtime);
    }
  }

  let mut commons: IndexMap<&str, ChunkUkey> = IndexMap::new();
  for entry in entries {
    for dependency in collect_ancestor_chunks(graph, entry.group, &exclude) {
      commons
        .entry(graph.chunk(dependency).id())
        .or_insert(dependency);
    }
  }

  commons
    .values()
    .map(|&dependency| {
      let location = chunk_output_path(templating, graph, dependency, content_hash_type)?;
      Ok(normalize_segments(&location).join("/"))
    })
    .collect()
}
