//! Utility modules
//!
//! This module contains utilities and helpers:
//! - Balanced scanning primitives for nested constructs
//! - Diagnostics collection and formatting
//! - Error types and result types

pub mod diagnostics;
pub mod error;
pub mod scan;

// Re-export commonly used items
pub use diagnostics::{format_diagnostics, Diagnostic, DiagnosticLevel};
pub use error::{PreviewError, PreviewResult};
pub use scan::{
    find_balanced, find_environment, read_group, read_opt_group, split_rows, split_top_level,
    EnvSpan, MAX_SCAN_STEPS,
};
