use thiserror::Error;

/// Core error types for ddlog-lsp.
///
/// Covers the failures that can happen below the language server: position
/// conversion against a [`Text`](crate::text::Text) snapshot, module path
/// validation, and shared computations that died before producing a value.
///
/// # Examples
///
/// ```
/// use ddlog_core::error::{CoreError, Result};
///
/// fn line_of(lines: usize, line: usize) -> Result<usize> {
///     if line >= lines {
///         return Err(CoreError::LineOutOfBounds { given: line, max: lines });
///     }
///     Ok(line)
/// }
///
/// assert!(line_of(3, 5).is_err());
/// ```
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("line out of bounds: given={given}, max={max}")]
    LineOutOfBounds { given: usize, max: usize },

    #[error("column out of bounds: given={given}, max={max}")]
    ColumnOutOfBounds { given: usize, max: usize },

    #[error("byte offset out of bounds: given={given}, max={max}")]
    ByteOutOfBounds { given: usize, max: usize },

    #[error("edit range is inverted: start={start}, end={end}")]
    InvertedRange { start: usize, end: usize },

    #[error("invalid module path: {0:?}")]
    InvalidModulePath(String),

    #[error("shared task failed: {0}")]
    TaskFailed(String),
}

/// Convenience type alias for `Result<T, CoreError>`.
pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_out_of_bounds_display() {
        let error = CoreError::LineOutOfBounds { given: 7, max: 3 };
        assert_eq!(error.to_string(), "line out of bounds: given=7, max=3");
    }

    #[test]
    fn test_invalid_module_path_display() {
        let error = CoreError::InvalidModulePath("a::::b".into());
        assert_eq!(error.to_string(), "invalid module path: \"a::::b\"");
    }

    #[test]
    fn test_task_failed_display() {
        let error = CoreError::TaskFailed("panicked".into());
        assert!(error.to_string().contains("shared task failed"));
    }
}
