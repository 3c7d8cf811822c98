use std::path::Path;

use crate::diagnostics::{ConfigValidationError, ConfigWarning, ValidationDiagnostics};
use crate::{LoggingConfig, NovaConfig};

/// Context for semantic config validation.
///
/// Relative paths in the config (like `logging.file`) are resolved against the workspace root
/// when known, otherwise against the directory containing the config file.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfigValidationContext<'a> {
    /// Workspace root used to resolve relative paths in the config.
    pub workspace_root: Option<&'a Path>,
    /// Directory containing the loaded config file, used as a fallback base directory.
    pub config_dir: Option<&'a Path>,
}

impl<'a> ConfigValidationContext<'a> {
    fn base_dir(self) -> Option<&'a Path> {
        self.workspace_root.or(self.config_dir)
    }
}

impl NovaConfig {
    /// Validate semantic invariants for a configuration.
    ///
    /// Validation is best-effort: it attempts to report as many problems as possible in one pass.
    #[must_use]
    pub fn validate(&self) -> ValidationDiagnostics {
        self.validate_with_context(ConfigValidationContext::default())
    }

    /// Like [`NovaConfig::validate`] but with access to additional context such as the workspace root.
    #[must_use]
    pub fn validate_with_context(&self, ctx: ConfigValidationContext<'_>) -> ValidationDiagnostics {
        let mut out = ValidationDiagnostics::default();

        validate_logging(self, ctx, &mut out);
        validate_text_change(self, &mut out);

        out
    }
}

fn validate_logging(config: &NovaConfig, ctx: ConfigValidationContext<'_>, out: &mut ValidationDiagnostics) {
    let normalized = LoggingConfig::normalize_level_directives(&config.logging.level);
    if !config.logging.level.trim().is_empty()
        && tracing_subscriber::EnvFilter::try_new(normalized.clone()).is_err()
    {
        out.warnings.push(ConfigWarning::LoggingLevelInvalid {
            value: config.logging.level.clone(),
            normalized,
        });
    }

    if config.logging.buffer_lines == 0 {
        out.errors.push(ConfigValidationError::InvalidValue {
            toml_path: "logging.buffer_lines".to_string(),
            message: "must be >= 1".to_string(),
        });
    }

    let Some(file) = config.logging.file.as_ref() else {
        return;
    };
    let resolved = if file.is_absolute() {
        file.clone()
    } else if let Some(base_dir) = ctx.base_dir() {
        base_dir.join(file)
    } else {
        return;
    };
    if let Some(parent) = resolved.parent() {
        if !parent.as_os_str().is_empty() && !parent.is_dir() {
            out.warnings.push(ConfigWarning::LoggingFileDirectoryMissing {
                toml_path: "logging.file".to_string(),
                resolved,
            });
        }
    }
}

fn validate_text_change(config: &NovaConfig, out: &mut ValidationDiagnostics) {
    if matches!(&config.text_change.text_type, Some(text_type) if text_type.trim().is_empty()) {
        out.warnings.push(ConfigWarning::InvalidValue {
            toml_path: "text_change.text_type".to_string(),
            message: "must not be blank; the default text type `txt` is used instead".to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let diagnostics = NovaConfig::default().validate();
        assert!(diagnostics.warnings.is_empty(), "{diagnostics:?}");
        assert!(diagnostics.errors.is_empty(), "{diagnostics:?}");
    }

    #[test]
    fn relative_log_file_without_base_dir_is_not_checked() {
        let mut config = NovaConfig::default();
        config.logging.file = Some("missing-dir/nova.log".into());
        assert!(config.validate().warnings.is_empty());
    }
}
