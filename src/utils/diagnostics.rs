//! Sanitizer diagnostics
//!
//! Extractors never abort the document on malformed constructs; instead
//! they record what they skipped or degraded here. Diagnostics are
//! collected per sanitize call and surfaced on the result, so hosts can
//! show them next to the preview.

use std::fmt;

/// Diagnostic severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DiagnosticLevel {
    /// Informational note
    Info,
    /// Warning - the preview degraded a construct
    Warning,
    /// Error - a construct could not be previewed at all
    Error,
}

impl fmt::Display for DiagnosticLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticLevel::Info => write!(f, "info"),
            DiagnosticLevel::Warning => write!(f, "warning"),
            DiagnosticLevel::Error => write!(f, "error"),
        }
    }
}

/// A single diagnostic message
#[derive(Debug, Clone)]
pub struct Diagnostic {
    /// Severity level
    pub level: DiagnosticLevel,
    /// Human-readable message
    pub message: String,
    /// Construct kind that produced the diagnostic (e.g. "diagram", "table")
    pub construct: Option<String>,
    /// Byte offset into the raw input, when known
    pub offset: Option<usize>,
}

impl Diagnostic {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: DiagnosticLevel::Info,
            message: message.into(),
            construct: None,
            offset: None,
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: DiagnosticLevel::Warning,
            message: message.into(),
            construct: None,
            offset: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: DiagnosticLevel::Error,
            message: message.into(),
            construct: None,
            offset: None,
        }
    }

    pub fn with_construct(mut self, construct: impl Into<String>) -> Self {
        self.construct = Some(construct.into());
        self
    }

    pub fn at_offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.level, self.message)?;
        if let Some(ref c) = self.construct {
            write!(f, " [{}]", c)?;
        }
        if let Some(o) = self.offset {
            write!(f, " (at byte {})", o)?;
        }
        Ok(())
    }
}

/// Format a diagnostic list for terminal output
pub fn format_diagnostics(diagnostics: &[Diagnostic]) -> String {
    if diagnostics.is_empty() {
        return "No issues found.".to_string();
    }
    let mut out = String::new();
    for d in diagnostics {
        out.push_str(&d.to_string());
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_display() {
        let d = Diagnostic::warning("unterminated environment")
            .with_construct("diagram")
            .at_offset(120);
        let s = d.to_string();
        assert!(s.contains("warning"));
        assert!(s.contains("diagram"));
        assert!(s.contains("120"));
    }

    #[test]
    fn test_level_ordering() {
        assert!(DiagnosticLevel::Error > DiagnosticLevel::Warning);
        assert!(DiagnosticLevel::Warning > DiagnosticLevel::Info);
    }

    #[test]
    fn test_format_empty() {
        assert_eq!(format_diagnostics(&[]), "No issues found.");
    }
}
