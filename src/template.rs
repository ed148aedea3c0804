//! Filename templating: turning chunk filename patterns into concrete output paths.

use std::borrow::Cow;
use std::sync::OnceLock;

use regex::Regex;

use crate::graph::{Chunk, ChunkGraph, ChunkUkey};

/// Default template for initial chunks.
pub const DEFAULT_FILENAME: &str = "[name].js";
/// Default template for chunks loaded on demand.
pub const DEFAULT_CHUNK_FILENAME: &str = "[id].js";
/// Default number of hash characters kept by hash placeholders.
pub const DEFAULT_HASH_DIGEST_LENGTH: usize = 20;
/// Content hash type used for JavaScript chunk output.
pub const JAVASCRIPT_CONTENT_HASH: &str = "javascript";

/// Values a template is rendered against.
#[derive(Debug, Clone, Copy)]
pub struct PathData<'a> {
  /// Chunk whose filename is being produced.
  pub chunk: &'a Chunk,
  /// Content type selecting which content hash `[contenthash]` refers to.
  pub content_hash_type: &'a str,
}

/// Errors raised while rendering a filename template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
  /// A hash placeholder was used but the chunk carries no such hash.
  MissingHash {
    /// Placeholder as written in the template.
    placeholder: String,
    /// Identifier of the chunk being rendered.
    chunk: String,
  },
  /// A placeholder length could not be parsed.
  InvalidLength {
    /// Placeholder as written in the template.
    placeholder: String,
  },
}

impl std::fmt::Display for TemplateError {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::MissingHash { placeholder, chunk } => {
        write!(f, "no hash available for {placeholder} in chunk {chunk}")
      }
      Self::InvalidLength { placeholder } => {
        write!(f, "invalid length in placeholder {placeholder}")
      }
    }
  }
}

impl std::error::Error for TemplateError {}

/// Host service resolving chunk filename templates to output paths.
pub trait PathTemplating {
  /// Template used to name the chunk's output file.
  fn chunk_filename_template<'a>(
    &'a self,
    graph: &'a ChunkGraph,
    chunk: ChunkUkey,
  ) -> Cow<'a, str>;

  /// Substitute every placeholder of `template` for the given path data.
  fn get_path(&self, template: &str, data: &PathData<'_>) -> Result<String, TemplateError>;
}

/// Output path of `chunk` as produced by the templating service.
pub fn chunk_output_path<T: PathTemplating + ?Sized>(
  templating: &T,
  graph: &ChunkGraph,
  chunk: ChunkUkey,
  content_hash_type: &str,
) -> Result<String, TemplateError> {
  let template = templating.chunk_filename_template(graph, chunk);
  templating.get_path(
    &template,
    &PathData {
      chunk: graph.chunk(chunk),
      content_hash_type,
    },
  )
}

/// Output naming options mirroring the host's `output` configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputOptions {
  /// Template for initial chunks.
  pub filename: String,
  /// Template for non-initial chunks.
  pub chunk_filename: String,
  /// Default truncation of hash placeholders.
  pub hash_digest_length: usize,
  /// Compilation hash used by `[fullhash]` and `[hash]`.
  pub full_hash: Option<String>,
}

impl Default for OutputOptions {
  fn default() -> Self {
    Self {
      filename: DEFAULT_FILENAME.into(),
      chunk_filename: DEFAULT_CHUNK_FILENAME.into(),
      hash_digest_length: DEFAULT_HASH_DIGEST_LENGTH,
      full_hash: None,
    }
  }
}

fn placeholder_pattern() -> &'static Regex {
  static PATTERN: OnceLock<Regex> = OnceLock::new();
  PATTERN.get_or_init(|| {
    Regex::new(r"\[(name|id|chunkhash|contenthash|fullhash|hash)(?::(\d+))?\]")
      .expect("invalid placeholder regex")
  })
}

impl OutputOptions {
  fn placeholder_value<'a>(
    &'a self,
    placeholder: &str,
    kind: &str,
    length: Option<&str>,
    data: &PathData<'a>,
  ) -> Result<Cow<'a, str>, TemplateError> {
    let chunk = data.chunk;
    let hash = match kind {
      "name" => return Ok(Cow::Borrowed(chunk.name().unwrap_or(chunk.id()))),
      "id" => return Ok(Cow::Borrowed(chunk.id())),
      "chunkhash" => chunk.hash(),
      "contenthash" => chunk.content_hash(data.content_hash_type),
      _ => self.full_hash.as_deref(),
    };

    let hash = hash.ok_or_else(|| TemplateError::MissingHash {
      placeholder: placeholder.to_string(),
      chunk: chunk.id().to_string(),
    })?;

    let length = match length {
      Some(value) => value
        .parse::<usize>()
        .map_err(|_| TemplateError::InvalidLength {
          placeholder: placeholder.to_string(),
        })?,
      None => self.hash_digest_length,
    };

    Ok(Cow::Owned(hash.chars().take(length).collect()))
  }
}

impl PathTemplating for OutputOptions {
  fn chunk_filename_template<'a>(
    &'a self,
    graph: &'a ChunkGraph,
    chunk: ChunkUkey,
  ) -> Cow<'a, str> {
    if let Some(template) = graph.chunk(chunk).filename_template() {
      Cow::Borrowed(template)
    } else if graph.is_initial(chunk) {
      Cow::Borrowed(&self.filename)
    } else {
      Cow::Borrowed(&self.chunk_filename)
    }
  }

  fn get_path(&self, template: &str, data: &PathData<'_>) -> Result<String, TemplateError> {
    let mut rendered = String::with_capacity(template.len());
    let mut last = 0;

    for caps in placeholder_pattern().captures_iter(template) {
      let Some(whole) = caps.get(0) else {
        continue;
      };
      rendered.push_str(&template[last..whole.start()]);
      let value = self.placeholder_value(
        whole.as_str(),
        &caps[1],
        caps.get(2).map(|m| m.as_str()),
        data,
      )?;
      rendered.push_str(&value);
      last = whole.end();
    }

    rendered.push_str(&template[last..]);
    Ok(rendered)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn options() -> OutputOptions {
    OutputOptions {
      full_hash: Some("f00dfeedcafebabe0123456789".into()),
      ..OutputOptions::default()
    }
  }

  #[test]
  fn renders_name_and_id_placeholders() {
    let chunk = Chunk::new("42").with_name("pages/index/index");
    let data = PathData {
      chunk: &chunk,
      content_hash_type: JAVASCRIPT_CONTENT_HASH,
    };

    let options = options();
    assert_eq!(options.get_path("[name].js", &data).unwrap(), "pages/index/index.js");
    assert_eq!(options.get_path("chunks/[id].js", &data).unwrap(), "chunks/42.js");
  }

  #[test]
  fn name_falls_back_to_id_for_unnamed_chunks() {
    let chunk = Chunk::new("7");
    let data = PathData {
      chunk: &chunk,
      content_hash_type: JAVASCRIPT_CONTENT_HASH,
    };
    assert_eq!(options().get_path("[name].js", &data).unwrap(), "7.js");
  }

  #[test]
  fn truncates_hashes_to_requested_length() {
    let chunk = Chunk::new("vendor")
      .with_hash("0123456789abcdef0123456789")
      .with_content_hash(JAVASCRIPT_CONTENT_HASH, "abcdefabcdefabcdefabcdef");
    let data = PathData {
      chunk: &chunk,
      content_hash_type: JAVASCRIPT_CONTENT_HASH,
    };

    let options = options();
    assert_eq!(
      options.get_path("[id].[contenthash:8].js", &data).unwrap(),
      "vendor.abcdefab.js"
    );
    assert_eq!(
      options.get_path("[id].[chunkhash].js", &data).unwrap(),
      "vendor.0123456789abcdef0123.js"
    );
    assert_eq!(
      options.get_path("[fullhash:4]/[id].js", &data).unwrap(),
      "f00d/vendor.js"
    );
  }

  #[test]
  fn missing_hash_is_an_error() {
    let chunk = Chunk::new("vendor");
    let data = PathData {
      chunk: &chunk,
      content_hash_type: JAVASCRIPT_CONTENT_HASH,
    };

    let err = options().get_path("[contenthash].js", &data).unwrap_err();
    assert_eq!(err, TemplateError::MissingHash {
      placeholder: "[contenthash]".into(),
      chunk: "vendor".into(),
    });
  }

  #[test]
  fn leaves_unknown_placeholders_untouched() {
    let chunk = Chunk::new("a");
    let data = PathData {
      chunk: &chunk,
      content_hash_type: JAVASCRIPT_CONTENT_HASH,
    };
    assert_eq!(options().get_path("[ext]/[id].js", &data).unwrap(), "[ext]/a.js");
  }

  #[test]
  fn picks_template_by_chunk_kind() {
    let mut graph = ChunkGraph::new();
    let runtime = graph.add_chunk(Chunk::new("runtime"));
    let lazy = graph.add_chunk(Chunk::new("lazy"));
    let custom = graph.add_chunk(Chunk::new("custom").with_filename_template("fixed/[id].js"));
    graph.add_entrypoint("app", runtime);

    let options = OutputOptions::default();
    assert_eq!(options.chunk_filename_template(&graph, runtime), DEFAULT_FILENAME);
    assert_eq!(options.chunk_filename_template(&graph, lazy), DEFAULT_CHUNK_FILENAME);
    assert_eq!(options.chunk_filename_template(&graph, custom), "fixed/[id].js");
    assert_eq!(
      chunk_output_path(&options, &graph, custom, JAVASCRIPT_CONTENT_HASH).unwrap(),
      "fixed/custom.js"
    );
  }
}
