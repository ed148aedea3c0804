//! Render hook prepending explicit `require` calls to entry chunks.
//!
//! Mini-program hosts cannot inject script tags, so an entry chunk has to load its runtime
//! and shared chunks itself before its modules execute. The hook computes those dependencies
//! from the chunk graph and writes them as relative, synchronous `require` statements ahead
//! of the original body. Any placeholder token found in the body is replaced by the quoted
//! relative path from the chunk's directory back to the build root.

use std::borrow::Cow;
use std::fmt;

use regex::{NoExpand, Regex};
use tracing::debug;

use crate::graph::{ChunkGraph, ChunkUkey};
use crate::path::{
  js_string_literal, normalize, normalize_segments, relative_prefix, root_path_literal,
};
use crate::resolver::commons_chunk_paths;
use crate::template::{PathTemplating, TemplateError, chunk_output_path};

/// Token replaced with the chunk's relative path back to the build root.
pub const DEFAULT_PLACEHOLDER: &str = "__mini_program_path__";

/// Rendered chunk output made of independently replaceable pieces.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConcatSource {
  children: Vec<String>,
}

impl ConcatSource {
  /// Create an empty source.
  pub fn new() -> Self {
    Self::default()
  }

  /// Append a piece.
  pub fn add(&mut self, piece: impl Into<String>) {
    self.children.push(piece.into());
  }

  /// Pieces in output order.
  pub fn children(&self) -> &[String] {
    &self.children
  }

  /// Concatenated text of every piece.
  pub fn source(&self) -> String {
    self.children.concat()
  }
}

impl From<String> for ConcatSource {
  fn from(body: String) -> Self {
    Self {
      children: vec![body],
    }
  }
}

impl From<&str> for ConcatSource {
  fn from(body: &str) -> Self {
    Self::from(body.to_string())
  }
}

/// Errors raised when configuring the placeholder token.
#[derive(Debug)]
pub enum PlaceholderError {
  /// The token is empty and would match at every position.
  Empty,
  /// The escaped token could not be compiled.
  Regex(regex::Error),
}

impl fmt::Display for PlaceholderError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Empty => write!(f, "placeholder token must not be empty"),
      Self::Regex(err) => write!(f, "failed to compile placeholder: {err}"),
    }
  }
}

impl std::error::Error for PlaceholderError {
  fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
    match self {
      Self::Empty => None,
      Self::Regex(err) => Some(err),
    }
  }
}

/// Everything the render hook may read about the chunk being rendered.
#[derive(Clone, Copy)]
pub struct RenderContext<'a> {
  /// Chunk under render.
  pub chunk: ChunkUkey,
  /// Graph the chunk belongs to.
  pub chunk_graph: &'a ChunkGraph,
  /// Service resolving output filenames.
  pub templating: &'a dyn PathTemplating,
  /// Content type used for `[contenthash]`.
  pub content_hash_type: &'a str,
}

/// A transform the host pipeline invokes once per rendered chunk.
pub trait RenderPlugin: fmt::Debug {
  /// Name used in diagnostics.
  fn name(&self) -> Cow<'_, str>;

  /// Produce the final output for the chunk in `ctx` from its rendered `source`.
  fn render(
    &self,
    source: ConcatSource,
    ctx: &RenderContext<'_>,
  ) -> Result<ConcatSource, TemplateError>;
}

/// Replace every occurrence of the placeholder matched by `pattern` with `replacement`.
pub fn substitute_placeholder<'b>(
  pattern: &Regex,
  body: &'b str,
  replacement: &str,
) -> Cow<'b, str> {
  pattern.replace_all(body, NoExpand(replacement))
}

/// Render hook turning entry chunks into self-loading mini-program modules.
#[derive(Debug, Clone)]
pub struct MiniProgramRequirePlugin {
  token: String,
  placeholder: Regex,
}

impl Default for MiniProgramRequirePlugin {
  fn default() -> Self {
    Self {
      token: DEFAULT_PLACEHOLDER.to_string(),
      placeholder: placeholder_regex(DEFAULT_PLACEHOLDER).expect("invalid placeholder regex"),
    }
  }
}

fn placeholder_regex(token: &str) -> Result<Regex, regex::Error> {
  Regex::new(&regex::escape(token))
}

impl MiniProgramRequirePlugin {
  /// Plugin using the default `__mini_program_path__` token.
  pub fn new() -> Self {
    Self::default()
  }

  /// Plugin replacing a custom placeholder token. The token is matched literally.
  pub fn with_placeholder(token: &str) -> Result<Self, PlaceholderError> {
    if token.is_empty() {
      return Err(PlaceholderError::Empty);
    }
    Ok(Self {
      token: token.to_string(),
      placeholder: placeholder_regex(token).map_err(PlaceholderError::Regex)?,
    })
  }

  /// The literal placeholder token this plugin replaces.
  pub fn placeholder(&self) -> &str {
    &self.token
  }

  fn reattach(&self, output: &mut ConcatSource, source: ConcatSource, root_literal: &str) {
    for piece in source.children {
      let replaced = match substitute_placeholder(&self.placeholder, &piece, root_literal) {
        Cow::Owned(replaced) => Some(replaced),
        Cow::Borrowed(_) => None,
      };
      output.add(replaced.unwrap_or(piece));
    }
  }
}

impl RenderPlugin for MiniProgramRequirePlugin {
  fn name(&self) -> Cow<'_, str> {
    Cow::Borrowed("MiniProgramRequirePlugin")
  }

  fn render(
    &self,
    source: ConcatSource,
    ctx: &RenderContext<'_>,
  ) -> Result<ConcatSource, TemplateError> {
    let graph = ctx.chunk_graph;
    let current_location =
      chunk_output_path(ctx.templating, graph, ctx.chunk, ctx.content_hash_type)?;
    let current_dir = normalize(&current_location);
    let root_literal = root_path_literal(current_dir.len());

    let mut output = ConcatSource::new();
    let entries = graph.entry_modules_with_chunk_group(ctx.chunk);
    let Some(first) = entries.first() else {
      debug!(chunk = %current_location, "rendering non-entry chunk");
      self.reattach(&mut output, source, &root_literal);
      return Ok(output);
    };

    let runtime_chunk = first.entrypoint.runtime_chunk();
    let runtime_location =
      chunk_output_path(ctx.templating, graph, runtime_chunk, ctx.content_hash_type)?;
    let runtime_segments = normalize_segments(&runtime_location);

    let mut require_paths = vec![relative_prefix(&current_dir, &runtime_segments).to_path()];
    for commons in commons_chunk_paths(
      graph,
      ctx.templating,
      ctx.chunk,
      &entries,
      ctx.content_hash_type,
    )? {
      let segments = normalize_segments(&commons);
      require_paths.push(relative_prefix(&current_dir, &segments).to_path());
    }

    debug!(
      chunk = %current_location,
      runtime = %runtime_location,
      requires = require_paths.len(),
      "rendering entry chunk"
    );

    for path in &require_paths {
      output.add(format!("require({});\n", js_string_literal(path)));
    }
    self.reattach(&mut output, source, &root_literal);

    Ok(output)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::graph::Chunk;
  use crate::template::{JAVASCRIPT_CONTENT_HASH, OutputOptions};

  fn render(graph: &ChunkGraph, chunk: ChunkUkey, body: &str) -> String {
    let options = OutputOptions::default();
    let ctx = RenderContext {
      chunk,
      chunk_graph: graph,
      templating: &options,
      content_hash_type: JAVASCRIPT_CONTENT_HASH,
    };
    MiniProgramRequirePlugin::new()
      .render(ConcatSource::from(body), &ctx)
      .unwrap()
      .source()
  }

  fn page_graph() -> (ChunkGraph, ChunkUkey) {
    let mut graph = ChunkGraph::new();
    let runtime = graph.add_chunk(Chunk::new("runtime").with_name("runtime"));
    let vendor = graph.add_chunk(Chunk::new("vendor").with_name("vendor"));
    let page = graph.add_chunk(Chunk::new("page").with_name("pages/index/index"));
    let entry = graph.add_entrypoint("pages/index/index", runtime);
    graph.connect_chunk_and_group(vendor, entry);
    graph.connect_entry_module("./src/pages/index/index.js", page, entry);
    (graph, page)
  }

  #[test]
  fn prepends_runtime_and_commons_requires_to_entry_chunks() {
    let (graph, page) = page_graph();
    let output = render(&graph, page, "Page({});\n");
    assert_eq!(
      output,
      "require(\"../../runtime.js\");\nrequire(\"../../vendor.js\");\nPage({});\n"
    );
  }

  #[test]
  fn rendering_is_deterministic() {
    let (graph, page) = page_graph();
    assert_eq!(render(&graph, page, "body"), render(&graph, page, "body"));
  }

  #[test]
  fn substitutes_placeholder_in_non_entry_chunks() {
    let mut graph = ChunkGraph::new();
    let component =
      graph.add_chunk(Chunk::new("foo").with_filename_template("components/foo/foo.js"));

    let output = render(
      &graph,
      component,
      "var base = __mini_program_path__;\nvar again = __mini_program_path__;",
    );
    assert_eq!(output, "var base = \"../..\";\nvar again = \"../..\";");
  }

  #[test]
  fn passes_non_entry_chunks_through_without_placeholder() {
    let mut graph = ChunkGraph::new();
    let chunk = graph.add_chunk(Chunk::new("plain"));
    assert_eq!(render(&graph, chunk, "module.exports = 1;"), "module.exports = 1;");
  }

  #[test]
  fn entry_chunks_substitute_root_relative_placeholder() {
    let (graph, page) = page_graph();
    let output = render(&graph, page, "load(__mini_program_path__ + \"/a.js\");");
    assert!(output.ends_with("load(\"../..\" + \"/a.js\");"));
  }

  #[test]
  fn self_runtime_requires_itself_by_filename() {
    let mut graph = ChunkGraph::new();
    let app = graph.add_chunk(Chunk::new("app").with_name("app"));
    let entry = graph.add_entrypoint("app", app);
    graph.connect_entry_module("./src/app.js", app, entry);

    assert_eq!(render(&graph, app, "App({});"), "require(\"./app.js\");\nApp({});");
  }

  #[test]
  fn commons_paths_are_relative_to_the_chunk_directory() {
    let mut graph = ChunkGraph::new();
    let runtime = graph.add_chunk(Chunk::new("runtime").with_name("pages/runtime"));
    let shared = graph.add_chunk(Chunk::new("shared").with_name("pages/shared/common"));
    let page = graph.add_chunk(Chunk::new("page").with_name("pages/index/index"));
    let entry = graph.add_entrypoint("pages/index/index", runtime);
    graph.connect_chunk_and_group(shared, entry);
    graph.connect_entry_module("./src/pages/index/index.js", page, entry);

    assert_eq!(
      render(&graph, page, ""),
      "require(\"../runtime.js\");\nrequire(\"../shared/common.js\");\n"
    );
  }

  #[test]
  fn keeps_untouched_pieces_and_replaces_others() {
    let mut graph = ChunkGraph::new();
    let chunk = graph.add_chunk(Chunk::new("lib").with_filename_template("lib/index.js"));
    let options = OutputOptions::default();
    let ctx = RenderContext {
      chunk,
      chunk_graph: &graph,
      templating: &options,
      content_hash_type: JAVASCRIPT_CONTENT_HASH,
    };

    let mut source = ConcatSource::new();
    source.add("a;");
    source.add("b(__mini_program_path__);");
    let output = MiniProgramRequirePlugin::new().render(source, &ctx).unwrap();

    assert_eq!(output.children(), &["a;".to_string(), "b(\"..\");".to_string()]);
  }

  #[test]
  fn custom_placeholder_tokens_are_matched_literally() {
    let plugin = MiniProgramRequirePlugin::with_placeholder("$root.path$").unwrap();
    assert_eq!(plugin.placeholder(), "$root.path$");

    let replaced = substitute_placeholder(
      &plugin.placeholder,
      "x = $root.path$; y = $rootXpath$;",
      "\".\"",
    );
    assert_eq!(replaced, "x = \".\"; y = $rootXpath$;");
  }

  #[test]
  fn empty_placeholder_tokens_are_rejected() {
    let err = MiniProgramRequirePlugin::with_placeholder("").unwrap_err();
    assert!(matches!(err, PlaceholderError::Empty));
    assert_eq!(err.to_string(), "placeholder token must not be empty");
  }
}
