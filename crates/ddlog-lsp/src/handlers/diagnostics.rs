//! Syntax and import diagnostics.

use crate::config::DiagnosticsConfig;
use crate::error::LocatedError;
use ddlog_core::Text;
use tower_lsp_server::ls_types::{Diagnostic, DiagnosticSeverity, NumberOrString};

const SOURCE: &str = "ddlog";

/// Diagnostics for one document: syntax failures first, then failed imports
/// at their module paths. Both lists arrive already mapped to boundary codes.
pub fn document_diagnostics(
    text: &Text,
    parse_failures: &[LocatedError],
    import_failures: &[LocatedError],
    config: &DiagnosticsConfig,
) -> Vec<Diagnostic> {
    let parse = parse_failures
        .iter()
        .map(|failure| (failure, config.parse_error_severity));
    let imports = import_failures
        .iter()
        .map(|failure| (failure, config.import_error_severity));

    parse
        .chain(imports)
        .filter_map(|(failure, severity)| diagnostic_at(text, failure, severity))
        .collect()
}

fn diagnostic_at(
    text: &Text,
    failure: &LocatedError,
    severity: DiagnosticSeverity,
) -> Option<Diagnostic> {
    let range = match text.span_to_range(failure.span.clone()) {
        Ok(range) => range,
        Err(e) => {
            tracing::warn!("dropping diagnostic `{}`: {e}", failure.error);
            return None;
        }
    };
    Some(Diagnostic {
        range: super::to_lsp_range(range),
        severity: Some(severity),
        code: Some(NumberOrString::Number(failure.error.code as i32)),
        source: Some(SOURCE.into()),
        message: failure.error.message.clone(),
        ..Default::default()
    })
}
