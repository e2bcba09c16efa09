//! Language server for DDlog.
//!
//! # Architecture
//!
//! - **Session**: workspace folders and the documents known to the server
//! - **Document**: per-file text, syntax tree and lifecycle state
//! - **Imports**: module path resolution, memoized per document version,
//!   with cycle detection over the import graph
//! - **Handlers**: symbols, diagnostics and definitions over snapshots
//! - **Dispatch**: the boundary façade mapping failures to stable codes
//! - **Server**: the `tower-lsp-server` backend speaking LSP over stdio

pub mod config;
pub mod dispatch;
pub mod document;
pub mod error;
pub mod handlers;
pub mod imports;
pub mod server;
pub mod session;

// Re-export commonly used types
pub use dispatch::Dispatcher;
pub use error::{BoundaryError, LspError, Result};
pub use server::Backend;
pub use session::Session;
