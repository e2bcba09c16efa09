use ddlog_core::{CoreError, ModulePath};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;
use tower_lsp_server::jsonrpc;

/// Stable error codes reported at the server boundary.
///
/// Codes live in the JSON-RPC implementation-defined server error range and
/// never change between releases.
pub mod codes {
    pub const PARSE_FAILURE: i64 = -32001;
    pub const UNRESOLVED_IMPORT: i64 = -32002;
    pub const AMBIGUOUS_IMPORT: i64 = -32003;
    pub const CYCLIC_IMPORT: i64 = -32004;
    pub const UNKNOWN_DOCUMENT: i64 = -32005;
    pub const DOCUMENT_NOT_OPEN: i64 = -32006;
    pub const INVALID_DOCUMENT: i64 = -32007;
    pub const TEXT_ERROR: i64 = -32008;
    pub const IO_ERROR: i64 = -32009;
    pub const INTERNAL_INVARIANT: i64 = -32099;
}

/// Error types for the ddlog-lsp server.
///
/// Import failures appear here only when they are reported on their own (for
/// diagnostics or at the boundary); the resolver itself returns them as
/// per-import values.
///
/// # Examples
///
/// ```
/// use ddlog_lsp::error::{LspError, codes};
/// use std::path::PathBuf;
///
/// let error = LspError::UnknownDocument(PathBuf::from("/ws/a.dl"));
/// assert_eq!(error.code(), codes::UNKNOWN_DOCUMENT);
/// assert_eq!(error.to_string(), "unknown document: /ws/a.dl");
/// ```
#[derive(Error, Debug)]
pub enum LspError {
    #[error("{message}")]
    ParseFailure { message: String },

    #[error("unresolved import `{module}`")]
    UnresolvedImport { module: ModulePath },

    #[error("ambiguous import `{module}`: candidates {}", display_paths(.candidates, ", "))]
    AmbiguousImport {
        module: ModulePath,
        candidates: Vec<PathBuf>,
    },

    #[error("cyclic import `{module}`: {}", display_paths(.cycle, " -> "))]
    CyclicImport {
        module: ModulePath,
        cycle: Vec<PathBuf>,
    },

    #[error("unknown document: {}", .0.display())]
    UnknownDocument(PathBuf),

    #[error("document is not open: {}", .0.display())]
    DocumentNotOpen(PathBuf),

    #[error("invalid document URI: {0}")]
    InvalidUri(String),

    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("file too large: {} ({size} bytes, max {max} bytes)", .path.display())]
    FileTooLarge { path: PathBuf, size: u64, max: u64 },

    #[error("internal invariant violated: {0}")]
    InternalInvariantViolation(String),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LspError {
    /// Stable boundary code for this error kind.
    pub fn code(&self) -> i64 {
        match self {
            Self::ParseFailure { .. } => codes::PARSE_FAILURE,
            Self::UnresolvedImport { .. } => codes::UNRESOLVED_IMPORT,
            Self::AmbiguousImport { .. } => codes::AMBIGUOUS_IMPORT,
            Self::CyclicImport { .. } => codes::CYCLIC_IMPORT,
            Self::UnknownDocument(_) => codes::UNKNOWN_DOCUMENT,
            Self::DocumentNotOpen(_) => codes::DOCUMENT_NOT_OPEN,
            Self::InvalidUri(_) | Self::UnsupportedLanguage(_) => codes::INVALID_DOCUMENT,
            Self::Core(_) => codes::TEXT_ERROR,
            Self::Io(_) | Self::FileTooLarge { .. } => codes::IO_ERROR,
            Self::InternalInvariantViolation(_) => codes::INTERNAL_INVARIANT,
        }
    }
}

fn display_paths(paths: &[PathBuf], separator: &str) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(separator)
}

/// Convenience type alias for `Result<T, LspError>`.
pub type Result<T> = std::result::Result<T, LspError>;

/// `(code, message)` pair handed to callers of the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundaryError {
    pub code: i64,
    pub message: String,
}

impl fmt::Display for BoundaryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for BoundaryError {}

/// A [`BoundaryError`] anchored at a byte span of a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatedError {
    pub span: std::ops::Range<usize>,
    pub error: BoundaryError,
}

impl From<LspError> for BoundaryError {
    fn from(error: LspError) -> Self {
        if matches!(error, LspError::InternalInvariantViolation(_)) {
            tracing::error!("{error}");
        }
        Self {
            code: error.code(),
            message: error.to_string(),
        }
    }
}

impl From<BoundaryError> for jsonrpc::Error {
    fn from(error: BoundaryError) -> Self {
        Self {
            code: jsonrpc::ErrorCode::ServerError(error.code),
            message: error.message.into(),
            data: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = LspError::DocumentNotOpen(PathBuf::from("/ws/a.dl"));
        assert_eq!(error.to_string(), "document is not open: /ws/a.dl");
    }

    #[test]
    fn test_import_error_display() {
        let module = ModulePath::parse("lib::b").unwrap();
        let error = LspError::CyclicImport {
            module,
            cycle: vec!["/ws/a.dl".into(), "/ws/lib/b.dl".into(), "/ws/a.dl".into()],
        };
        assert_eq!(
            error.to_string(),
            "cyclic import `lib::b`: /ws/a.dl -> /ws/lib/b.dl -> /ws/a.dl"
        );
    }

    #[test]
    fn test_codes_are_distinct_per_kind() {
        let errors = [
            LspError::ParseFailure {
                message: "x".into(),
            },
            LspError::UnresolvedImport {
                module: ModulePath::parse("b").unwrap(),
            },
            LspError::AmbiguousImport {
                module: ModulePath::parse("b").unwrap(),
                candidates: vec![],
            },
            LspError::CyclicImport {
                module: ModulePath::parse("b").unwrap(),
                cycle: vec![],
            },
            LspError::UnknownDocument(PathBuf::new()),
            LspError::DocumentNotOpen(PathBuf::new()),
            LspError::InvalidUri("x".into()),
            LspError::Core(CoreError::TaskFailed("x".into())),
            std::io::Error::other("x").into(),
            LspError::InternalInvariantViolation("x".into()),
        ];
        let mut codes: Vec<_> = errors.iter().map(LspError::code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn test_core_error_conversion() {
        let error: LspError = CoreError::LineOutOfBounds { given: 9, max: 2 }.into();
        assert_eq!(error.code(), codes::TEXT_ERROR);
        assert!(error.to_string().contains("line out of bounds"));
    }

    #[test]
    fn test_boundary_error_from_lsp_error() {
        let boundary = BoundaryError::from(LspError::UnsupportedLanguage("rust".into()));
        assert_eq!(boundary.code, codes::INVALID_DOCUMENT);
        assert_eq!(boundary.message, "unsupported language: rust");
    }

    #[test]
    fn test_boundary_error_into_jsonrpc() {
        let boundary = BoundaryError {
            code: codes::UNKNOWN_DOCUMENT,
            message: "unknown document: /a.dl".into(),
        };
        let error: jsonrpc::Error = boundary.into();
        assert_eq!(error.code, jsonrpc::ErrorCode::ServerError(-32005));
        assert_eq!(error.message, "unknown document: /a.dl");
    }
}
