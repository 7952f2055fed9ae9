//! Data layer - static mappings and constants
//!
//! This module contains the static data used by the sanitizer:
//! - Environment groupings consumed by the extraction engine
//! - Inline symbol mappings

pub mod constants;
pub mod symbols;

// Re-export commonly used items
pub use constants::{
    ALGORITHM_ENVS, LIST_ENVS, MATH_ENVS, MULTILINE_MATH_ENVS, QUOTE_ENVS, THEOREM_ENVS,
    UNSUPPORTED_PLOT_MARKERS, VERBATIM_ENVS,
};
pub use symbols::{ESCAPED_SPECIALS, TEXT_SYMBOLS};
