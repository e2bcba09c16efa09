//! Hierarchical module identifiers.

use crate::error::{CoreError, Result};
use std::fmt;
use std::path::PathBuf;

/// File extension of DDlog program files.
pub const DDLOG_EXTENSION: &str = "dl";

/// Normalized module identifier such as `std::vec`.
///
/// Equality and ordering are segment-wise, so `a::b < a::b::c < a::c`.
///
/// # Examples
///
/// ```
/// use ddlog_core::ModulePath;
///
/// let path = ModulePath::parse("lib::graph").unwrap();
/// assert_eq!(path.segments(), ["lib", "graph"]);
/// assert_eq!(path.to_relative_path(), std::path::Path::new("lib/graph.dl"));
/// assert!(ModulePath::parse("lib::").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ModulePath {
    segments: Vec<String>,
}

impl ModulePath {
    /// Parses `a::b::c`, tolerating whitespace around separators.
    pub fn parse(text: &str) -> Result<Self> {
        let segments = text
            .split("::")
            .map(str::trim)
            .map(ToString::to_string)
            .collect();
        Self::from_segments(segments).map_err(|_| CoreError::InvalidModulePath(text.to_string()))
    }

    /// Builds a path from already-split segments, validating each one.
    pub fn from_segments(segments: Vec<String>) -> Result<Self> {
        if segments.is_empty() || !segments.iter().all(|s| is_identifier(s)) {
            return Err(CoreError::InvalidModulePath(segments.join("::")));
        }
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Last segment, which names the module file.
    pub fn name(&self) -> &str {
        self.segments.last().map_or("", String::as_str)
    }

    /// File name the module lives in, e.g. `graph.dl`.
    pub fn file_name(&self) -> String {
        format!("{}.{DDLOG_EXTENSION}", self.name())
    }

    /// Relative file path, e.g. `lib/graph.dl`.
    pub fn to_relative_path(&self) -> PathBuf {
        let mut path: PathBuf = self.segments.iter().collect();
        path.set_extension(DDLOG_EXTENSION);
        path
    }
}

impl fmt::Display for ModulePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("::"))
    }
}

impl std::str::FromStr for ModulePath {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

fn is_identifier(segment: &str) -> bool {
    let mut chars = segment.chars();
    chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_')
}
