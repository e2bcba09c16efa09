//! DDlog syntax: lexer, error-tolerant parser, and immutable trees.

pub mod lexer;
mod parser;
mod tree;

pub use parser::parse;
pub use tree::{Name, Node, NodeId, NodeKind, RelationRole, SyntaxTree};
