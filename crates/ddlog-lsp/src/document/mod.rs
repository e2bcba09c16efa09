//! Document management module.
//!
//! - `state`: the per-file state machine and immutable snapshots
//! - `lifecycle`: background parsing of document versions
//! - `loader`: reading unopened import targets from disk

mod lifecycle;
mod loader;
mod state;

pub use lifecycle::schedule_parse;
pub use loader::{is_ddlog_path, load_document_from_disk};
pub use state::{Document, DocumentOrigin, DocumentSnapshot, DocumentState, ParseOutcome};
