//! Background parsing of document versions.

use super::state::{Document, ParseOutcome};
use ddlog_core::syntax::{SyntaxTree, parse};
use ddlog_core::{EagerFuture, Text};
use std::sync::Arc;

/// Starts parsing `text` as `version` of `document` and returns the shared
/// handle to the resulting tree.
///
/// The parse always covers the full text, so the tree for a version equals a
/// from-scratch parse no matter how many edits produced it. When the task
/// finishes, the tree is installed unless a newer version superseded it.
pub fn schedule_parse(
    document: &Arc<Document>,
    version: u64,
    text: Text,
) -> EagerFuture<Arc<SyntaxTree>> {
    let target = Arc::clone(document);
    let future = EagerFuture::spawn(async move {
        target.begin_parse(version);
        let tree = Arc::new(parse(&text.contents()));

        match target.complete_parse(version, Arc::clone(&tree)) {
            Ok(ParseOutcome::Applied) => {
                tracing::debug!(
                    path = %target.path().display(),
                    version,
                    errors = tree.errors().count(),
                    "parse applied"
                );
            }
            Ok(ParseOutcome::Discarded { current }) => {
                tracing::trace!(
                    path = %target.path().display(),
                    version,
                    current,
                    "parse superseded"
                );
            }
            Err(e) => tracing::error!("{e}"),
        }
        tree
    });

    document.set_pending_parse(version, future.clone());
    future
}
