#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

pub mod config;
pub mod graph;
pub mod path;
pub mod render;
pub mod resolver;
pub mod rewriter;
pub mod stats;
pub mod template;

pub use config::RewriteConfig;
pub use graph::{Chunk, ChunkGraph, ChunkGroup, ChunkGroupUkey, ChunkUkey, EntryPoint};
pub use render::{
  ConcatSource, MiniProgramRequirePlugin, PlaceholderError, RenderContext, RenderPlugin,
};
pub use resolver::{collect_ancestor_chunks, commons_chunk_paths};
pub use rewriter::{RequireRewriter, RewriteReport};
pub use stats::{ChunkGraphStats, StatsError};
pub use template::{OutputOptions, PathTemplating, TemplateError};
