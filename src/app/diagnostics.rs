//! Per-share diagnostics
//!
//! Diagnostics are plain values attached to a [`Share`](crate::app::Share).
//! They carry the error name, a three-digit status code and a message, and
//! render into the `[SEVERITY][Name][code]` status strings consumed by reports
//! and the shared cache.

use std::fmt;

use serde::Serialize;

use crate::errors::{SettingError, StatsError, StatsWarning};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Severity {
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub error: String,
    pub status_code: String,
    pub message: String,
    pub debug: Option<String>,
}

impl Diagnostic {
    pub fn warning(
        error: impl Into<String>,
        status_code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity: Severity::Warning,
            error: error.into(),
            status_code: status_code.into(),
            message: message.into(),
            debug: None,
        }
    }

    pub fn error(
        error: impl Into<String>,
        status_code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity: Severity::Error,
            ..Self::warning(error, status_code, message)
        }
    }

    pub fn with_debug(mut self, debug: impl Into<String>) -> Self {
        let debug = debug.into();
        self.debug = (!debug.is_empty()).then_some(debug);
        self
    }

    /// Diagnostic for a setting problem, using the rule's status code
    pub fn from_setting(err: &SettingError, status_code: &str) -> Self {
        if err.is_warning() {
            Self::warning(err.error_name(), status_code, err.to_string())
        } else {
            Self::error(err.error_name(), status_code, err.to_string())
        }
    }

    /// `[SEVERITY][Name][code]`
    pub fn status_code_tag(&self) -> String {
        format!(
            "[{}][{}][{}]",
            self.severity.as_str(),
            self.error,
            self.status_code
        )
    }

    /// Status tag followed by the message and any debug detail
    pub fn debug_line(&self) -> String {
        match &self.debug {
            Some(debug) => format!("{}{} {}", self.status_code_tag(), self.message, debug),
            None => format!("{}{}", self.status_code_tag(), self.message),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.debug_line())
    }
}

impl From<&StatsError> for Diagnostic {
    fn from(err: &StatsError) -> Self {
        let diagnostic = Self::error(err.error_name(), err.status_code(), err.to_string());
        match err.debug_detail() {
            Some(debug) => diagnostic.with_debug(debug),
            None => diagnostic,
        }
    }
}

impl From<&StatsWarning> for Diagnostic {
    fn from(warning: &StatsWarning) -> Self {
        Self::warning(warning.error_name(), warning.status_code(), warning.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_tags() {
        let d = Diagnostic::from(&StatsWarning::NoQuotaGiven {
            default_quota: 1024,
        });
        assert_eq!(d.status_code_tag(), "[WARNING][NoQuotaGiven][098]");
        assert!(d.debug_line().starts_with("[WARNING][NoQuotaGiven][098]No quota"));
    }

    #[test]
    fn test_stats_error_keeps_debug_detail() {
        let err = StatsError::connection("ConnectionError", "400", "connection refused");
        let d = Diagnostic::from(&err);
        assert_eq!(d.severity, Severity::Error);
        assert_eq!(d.status_code_tag(), "[ERROR][ConnectionError][400]");
        assert_eq!(d.debug.as_deref(), Some("connection refused"));
    }

    #[test]
    fn test_setting_diagnostic_severity() {
        let missing = SettingError::Missing {
            setting: "conn_timeout".into(),
            default: "10".into(),
        };
        assert_eq!(
            Diagnostic::from_setting(&missing, "005").status_code_tag(),
            "[WARNING][MissingSetting][005]"
        );

        let required = SettingError::MissingRequired {
            setting: "s3.priv_key".into(),
        };
        assert_eq!(
            Diagnostic::from_setting(&required, "021").status_code_tag(),
            "[ERROR][MissingRequiredSetting][021]"
        );
    }
}
