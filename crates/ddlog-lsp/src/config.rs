use serde::Deserialize;
use std::path::PathBuf;
use tower_lsp_server::ls_types::DiagnosticSeverity;

/// Root configuration for the ddlog-lsp server.
///
/// Provided by the LSP client via initialization options or
/// `workspace/didChangeConfiguration`. All fields use defaults if missing.
///
/// # Examples
///
/// ```
/// use ddlog_lsp::config::DdlogConfig;
///
/// let json = r#"{
///     "imports": {
///         "module_roots": ["lib", "/usr/share/ddlog"],
///         "load_from_disk": false
///     }
/// }"#;
///
/// let config: DdlogConfig = serde_json::from_str(json).unwrap();
/// assert_eq!(config.imports.module_roots.len(), 2);
/// assert!(!config.imports.load_from_disk);
/// ```
#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
pub struct DdlogConfig {
    #[serde(default)]
    pub imports: ImportsConfig,
    #[serde(default)]
    pub diagnostics: DiagnosticsConfig,
}

impl DdlogConfig {
    /// Parses client-provided settings, falling back to defaults on malformed
    /// input.
    pub fn from_value(value: serde_json::Value) -> Self {
        match serde_json::from_value::<Self>(value) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("ignoring malformed configuration: {e}");
                Self::default()
            }
        }
    }
}

/// Import resolution settings.
///
/// # Defaults
///
/// - `module_roots`: empty (only paths relative to the workspace folder)
/// - `load_from_disk`: `true`
/// - `max_file_size`: `10_000_000` bytes, never above that hard limit
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ImportsConfig {
    /// Extra directories searched for modules. Relative entries are resolved
    /// against every workspace folder.
    #[serde(default)]
    pub module_roots: Vec<PathBuf>,
    /// Load unopened import targets from disk.
    #[serde(default = "default_true")]
    pub load_from_disk: bool,
    #[serde(
        default = "default_max_file_size",
        deserialize_with = "deserialize_max_file_size"
    )]
    pub max_file_size: u64,
}

impl Default for ImportsConfig {
    fn default() -> Self {
        Self {
            module_roots: Vec::new(),
            load_from_disk: true,
            max_file_size: default_max_file_size(),
        }
    }
}

/// Severity levels for published diagnostics.
///
/// # Examples
///
/// ```
/// use ddlog_lsp::config::DiagnosticsConfig;
/// use tower_lsp_server::ls_types::DiagnosticSeverity;
///
/// let config = DiagnosticsConfig {
///     parse_error_severity: DiagnosticSeverity::ERROR,
///     import_error_severity: DiagnosticSeverity::WARNING,
/// };
///
/// assert_eq!(config.import_error_severity, DiagnosticSeverity::WARNING);
/// ```
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct DiagnosticsConfig {
    #[serde(default = "default_error_severity")]
    pub parse_error_severity: DiagnosticSeverity,
    #[serde(default = "default_error_severity")]
    pub import_error_severity: DiagnosticSeverity,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            parse_error_severity: default_error_severity(),
            import_error_severity: default_error_severity(),
        }
    }
}

/// Hard upper bound for files read from disk (10MB).
pub const MAX_FILE_SIZE: u64 = 10_000_000;

const fn default_true() -> bool {
    true
}

const fn default_max_file_size() -> u64 {
    MAX_FILE_SIZE
}

const fn default_error_severity() -> DiagnosticSeverity {
    DiagnosticSeverity::ERROR
}

fn deserialize_max_file_size<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let size = u64::deserialize(deserializer)?;
    if size > MAX_FILE_SIZE {
        tracing::warn!(
            "max_file_size {} exceeds hard limit, clamping to {}",
            size,
            MAX_FILE_SIZE
        );
        return Ok(MAX_FILE_SIZE);
    }
    Ok(size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DdlogConfig::default();
        assert!(config.imports.module_roots.is_empty());
        assert!(config.imports.load_from_disk);
        assert_eq!(config.imports.max_file_size, MAX_FILE_SIZE);
        assert_eq!(
            config.diagnostics.parse_error_severity,
            DiagnosticSeverity::ERROR
        );
    }

    #[test]
    fn test_diagnostics_config_deserialization() {
        let json = r#"{
            "parse_error_severity": 2,
            "import_error_severity": 3
        }"#;

        let config: DiagnosticsConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.parse_error_severity, DiagnosticSeverity::WARNING);
        assert_eq!(
            config.import_error_severity,
            DiagnosticSeverity::INFORMATION
        );
    }

    #[test]
    fn test_partial_config_deserialization() {
        let json = r#"{ "imports": { "module_roots": ["lib"] } }"#;
        let config: DdlogConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.imports.module_roots, vec![PathBuf::from("lib")]);
        assert!(config.imports.load_from_disk);
        assert_eq!(config.diagnostics, DiagnosticsConfig::default());
    }

    #[test]
    fn test_max_file_size_is_clamped() {
        let json = r#"{ "max_file_size": 99999999999 }"#;
        let config: ImportsConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.max_file_size, MAX_FILE_SIZE);

        let json = r#"{ "max_file_size": 4096 }"#;
        let config: ImportsConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.max_file_size, 4096);
    }

    #[test]
    fn test_from_value_falls_back_on_malformed_input() {
        let value = serde_json::json!({ "imports": { "load_from_disk": "yes" } });
        assert_eq!(DdlogConfig::from_value(value), DdlogConfig::default());
    }

    #[test]
    fn test_empty_object() {
        let config: DdlogConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, DdlogConfig::default());
    }
}
