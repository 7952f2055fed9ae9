//! Error handling for Prelax sanitization
//!
//! This module provides a unified error type and result type for the
//! sanitize-and-render pipeline. Construct-local failures are never
//! errors: extractors absorb them as visible placeholder fragments.
//! Only document-level conditions surface here.

use std::fmt;

/// Document-level preview error
#[derive(Debug, Clone)]
pub enum PreviewError {
    /// Content integrity failure - open/close construct markers are too
    /// unbalanced, input is likely truncated
    Integrity { opens: usize, closes: usize },
    /// The external markup renderer failed
    Render { message: String },
    /// Invalid input
    InvalidInput { message: String },
    /// Internal error
    Internal { message: String },
}

impl fmt::Display for PreviewError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PreviewError::Integrity { opens, closes } => {
                write!(
                    f,
                    "Content integrity check failed ({} environment opens vs {} closes); \
                     the document is likely truncated. The compiled PDF output is unaffected.",
                    opens, closes
                )
            }
            PreviewError::Render { message } => {
                write!(
                    f,
                    "Preview renderer failed: {}. The compiled PDF output is unaffected.",
                    message
                )
            }
            PreviewError::InvalidInput { message } => {
                write!(f, "Invalid input: {}", message)
            }
            PreviewError::Internal { message } => {
                write!(f, "Internal error: {}", message)
            }
        }
    }
}

impl std::error::Error for PreviewError {}

/// Result type for preview operations
pub type PreviewResult<T> = Result<T, PreviewError>;

// Convenience constructors
impl PreviewError {
    pub fn integrity(opens: usize, closes: usize) -> Self {
        PreviewError::Integrity { opens, closes }
    }

    pub fn render(message: impl Into<String>) -> Self {
        PreviewError::Render {
            message: message.into(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        PreviewError::InvalidInput {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        PreviewError::Internal {
            message: message.into(),
        }
    }

    /// User-facing error payload `{message}` for host UIs
    pub fn message(&self) -> String {
        self.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integrity_display() {
        let err = PreviewError::integrity(12, 7);
        let msg = err.to_string();
        assert!(msg.contains("12"));
        assert!(msg.contains("7"));
        assert!(msg.contains("truncated"));
    }

    #[test]
    fn test_render_display_mentions_compiled_output() {
        let err = PreviewError::render("unexpected token at 42");
        let msg = err.to_string();
        assert!(msg.contains("unexpected token at 42"));
        assert!(msg.contains("compiled PDF"));
    }
}
