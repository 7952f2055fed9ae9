//! Constants for the preview sanitizer
//!
//! Environment groupings consumed by the extraction engine, plus the
//! commands that mark a diagram as unsupported in the sandboxed preview.

use lazy_static::lazy_static;
use std::collections::HashMap;

/// Verbatim-like environments whose bodies must stay literal. Extracted
/// before math so code containing `$` is never scanned as math.
pub const VERBATIM_ENVS: &[&str] = &["verbatim", "Verbatim", "lstlisting", "minted"];

/// Display math environments handed whole to the math renderer.
pub const MATH_ENVS: &[&str] = &[
    "equation",
    "equation*",
    "align",
    "align*",
    "gather",
    "gather*",
    "multline",
    "multline*",
    "eqnarray",
    "eqnarray*",
];

/// Math sub-environments that indicate a multi-line structured expression,
/// which the display auto-scaler must not shrink.
pub const MULTILINE_MATH_ENVS: &[&str] = &[
    "aligned", "cases", "split", "gathered", "matrix", "pmatrix", "bmatrix", "vmatrix", "array",
];

/// Algorithm pseudo-code environments.
pub const ALGORITHM_ENVS: &[&str] = &["algorithm", "algorithmic", "algorithm2e"];

/// Quotation-style environments rendered as blockquotes.
pub const QUOTE_ENVS: &[&str] = &["quote", "quotation", "verse"];

/// Plotting commands the diagram sandbox cannot render; their presence
/// short-circuits the diagram to a "see compiled output" placeholder.
pub const UNSUPPORTED_PLOT_MARKERS: &[&str] =
    &["\\begin{axis}", "\\addplot", "\\begin{groupplot}", "\\pgfplots"];

lazy_static! {
    /// Theorem-family environments and their running headers.
    pub static ref THEOREM_ENVS: HashMap<&'static str, &'static str> = {
        let mut m = HashMap::new();
        m.insert("theorem", "Theorem");
        m.insert("lemma", "Lemma");
        m.insert("proposition", "Proposition");
        m.insert("corollary", "Corollary");
        m.insert("definition", "Definition");
        m.insert("remark", "Remark");
        m.insert("example", "Example");
        m.insert("proof", "Proof");
        m.insert("assumption", "Assumption");
        m.insert("claim", "Claim");
        m
    };

    /// List environments and the HTML element each maps to.
    pub static ref LIST_ENVS: HashMap<&'static str, &'static str> = {
        let mut m = HashMap::new();
        m.insert("itemize", "ul");
        m.insert("enumerate", "ol");
        m.insert("description", "dl");
        m
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_theorem_headers() {
        assert_eq!(THEOREM_ENVS.get("lemma"), Some(&"Lemma"));
        assert!(THEOREM_ENVS.get("tabular").is_none());
    }

    #[test]
    fn test_list_env_elements() {
        assert_eq!(LIST_ENVS.get("enumerate"), Some(&"ol"));
        assert_eq!(LIST_ENVS.get("description"), Some(&"dl"));
    }
}
