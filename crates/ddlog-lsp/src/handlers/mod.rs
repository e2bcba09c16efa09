//! Analysis providers.
//!
//! Each provider is a function over immutable snapshots:
//!
//! - [`symbols`]: document outline from the syntax tree
//! - [`diagnostics`]: syntax errors and failed imports
//! - [`definition`]: import path to target document
//! - [`workspace_symbols`]: name search across document outlines
//!
//! Providers never mutate the session. They degrade to empty results when a
//! snapshot has no tree.

pub mod definition;
pub mod diagnostics;
pub mod symbols;
pub mod workspace_symbols;

use tower_lsp_server::ls_types;

pub fn to_lsp_position(position: ddlog_core::Position) -> ls_types::Position {
    ls_types::Position::new(position.line, position.character)
}

pub fn to_lsp_range(range: ddlog_core::Range) -> ls_types::Range {
    ls_types::Range::new(to_lsp_position(range.start), to_lsp_position(range.end))
}

pub fn from_lsp_position(position: ls_types::Position) -> ddlog_core::Position {
    ddlog_core::Position::new(position.line, position.character)
}

pub fn from_lsp_range(range: ls_types::Range) -> ddlog_core::Range {
    ddlog_core::Range::new(from_lsp_position(range.start), from_lsp_position(range.end))
}
