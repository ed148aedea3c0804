//! Output path normalisation and relative-path arithmetic between emitted chunks.
//!
//! Output locations come from the filename templating service as plain strings. They are
//! normalised into directory segments so two locations can be compared segment by segment,
//! and every relative path produced here uses forward slashes regardless of the platform
//! separator the location was written with.

use std::path::MAIN_SEPARATOR;

/// Prefix used when a target lives in the same directory as the importing chunk.
const CURRENT_DIR_PREFIX: &str = "./";
/// One directory climb.
const PARENT_DIR_PREFIX: &str = "../";

/// Split an output location into its non-empty path components, filename included.
///
/// Both `/` and the platform separator are accepted. `.` components are dropped and `..`
/// removes the preceding component, so `a/./b/../c.js` yields `["a", "c.js"]`. A `..` with
/// nothing left to remove is kept, so `../lib/x.js` yields `["..", "lib", "x.js"]`.
pub fn normalize_segments(location: &str) -> Vec<String> {
  let mut segments: Vec<String> = Vec::new();

  for segment in location.split(is_separator) {
    match segment {
      "" | "." => {}
      ".." if segments.last().is_some_and(|last| last != "..") => {
        segments.pop();
      }
      other => segments.push(other.to_string()),
    }
  }

  segments
}

/// Whether normalised `segments` climb above the directory they are relative to.
pub fn escapes_root(segments: &[String]) -> bool {
  segments.first().is_some_and(|first| first == "..")
}

/// Directory segments of an output file, with the trailing filename removed.
///
/// An empty result means the file is emitted at the build root.
pub fn normalize(location: &str) -> Vec<String> {
  let mut segments = normalize_segments(location);
  segments.pop();
  segments
}

fn is_separator(c: char) -> bool {
  c == '/' || c == MAIN_SEPARATOR
}

/// Result of comparing a source directory against a target location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelativePrefix<'a> {
  depth: usize,
  remaining: &'a [String],
}

/// Strip the shared leading segments of `from` and `to`.
///
/// The number of `from` segments left over is how many directories must be climbed, and the
/// `to` segments left over are the path to descend into from the shared ancestor.
pub fn relative_prefix<'a>(from: &[String], to: &'a [String]) -> RelativePrefix<'a> {
  let shared = from
    .iter()
    .zip(to.iter())
    .take_while(|(left, right)| left == right)
    .count();

  RelativePrefix {
    depth: from.len() - shared,
    remaining: &to[shared..],
  }
}

impl RelativePrefix<'_> {
  /// Number of `../` climbs needed to reach the shared ancestor.
  pub fn depth(&self) -> usize {
    self.depth
  }

  /// Target segments below the shared ancestor.
  pub fn remaining(&self) -> &[String] {
    self.remaining
  }

  /// Climb prefix such as `../../`, or `./` when no climb is needed.
  pub fn prefix(&self) -> String {
    climb_prefix(self.depth)
  }

  /// Full relative path from the source directory to the target.
  pub fn to_path(&self) -> String {
    let mut path = self.prefix();
    path.push_str(&self.remaining.join("/"));
    path
  }
}

/// Build the prefix that climbs `depth` directories, never returning an empty string.
pub fn climb_prefix(depth: usize) -> String {
  if depth == 0 {
    CURRENT_DIR_PREFIX.to_string()
  } else {
    PARENT_DIR_PREFIX.repeat(depth)
  }
}

/// Quoted relative path from a directory `depth` levels deep back to the build root.
///
/// The trailing slash is dropped, so depth two becomes `"../.."` and the root itself `"."`.
pub fn root_path_literal(depth: usize) -> String {
  let prefix = climb_prefix(depth);
  js_string_literal(prefix.trim_end_matches('/'))
}

/// Render a value as a double-quoted JavaScript string literal.
pub fn js_string_literal(value: &str) -> String {
  serde_json::Value::from(value).to_string()
}
