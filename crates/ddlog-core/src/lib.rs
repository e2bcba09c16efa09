//! Core abstractions for ddlog-lsp.
//!
//! This crate holds everything below the language server that does not need
//! to know about sessions, workspaces, or the LSP transport.
//!
//! # Architecture
//!
//! ddlog-core defines:
//! - **Text**: immutable rope-backed snapshots with LSP position conversion
//! - **Syntax**: an error-tolerant DDlog parser producing immutable trees
//! - **Module paths**: validated `a::b::c` identifiers mapped to `a/b/c.dl`
//! - **Eager futures**: shared, immediately started computations and a keyed
//!   registry that deduplicates them
//!
//! # Examples
//!
//! Parsing an edited snapshot:
//!
//! ```
//! use ddlog_core::text::{Position, Range, Text, TextEdit};
//! use ddlog_core::syntax::parse;
//!
//! let text = Text::new("relation R(x: u32)\n");
//! let edit = TextEdit::replace(
//!     Range::new(Position::new(1, 0), Position::new(1, 0)),
//!     "R(1).\n",
//! );
//! let text = text.apply_edit(&edit).unwrap();
//! let tree = parse(&text.contents());
//! assert_eq!(tree.roots().count(), 2);
//! assert!(!tree.has_errors());
//! ```

pub mod error;
pub mod future;
pub mod module_path;
pub mod syntax;
pub mod text;

// Re-export commonly used types
pub use error::{CoreError, Result};
pub use future::{EagerFuture, FutureRegistry};
pub use module_path::{DDLOG_EXTENSION, ModulePath};
pub use syntax::{NodeId, NodeKind, SyntaxTree, parse};
pub use text::{Position, Range, Text, TextEdit};
