//! Go-to-definition for import paths.

use crate::document::DocumentSnapshot;
use crate::imports::ResolvedImport;
use ddlog_core::{Position, Range};
use std::path::PathBuf;

/// Location a definition request jumps to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefinitionTarget {
    pub path: PathBuf,
    pub range: Range,
}

/// Finds the import whose module path contains `position` and returns the
/// start of its resolved target document.
pub fn import_definition(
    snapshot: &DocumentSnapshot,
    imports: &[ResolvedImport],
    position: Position,
) -> Option<DefinitionTarget> {
    let import = imports.iter().find(|resolved| {
        snapshot
            .text
            .span_to_range(resolved.import.path_span.clone())
            .is_ok_and(|range| range.contains(position))
    })?;

    let Some(target) = import.target() else {
        tracing::debug!(module = %import.import.module, "definition on unresolved import");
        return None;
    };
    Some(DefinitionTarget {
        path: target.to_path_buf(),
        range: Range::default(),
    })
}
