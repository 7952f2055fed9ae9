//! # Prelax
//!
//! Safe browser-preview pipeline for generated academic markup.
//!
//! Generated LaTeX-like documents arrive untrusted and frequently
//! malformed: truncated environments, unbalanced braces, transport
//! artifacts like doubled escapes and Markdown code fences. Prelax turns
//! such a document into a safe HTML preview in two stages:
//!
//! 1. **Sanitize** — extract every construct the downstream renderer
//!    cannot be trusted with (diagrams, code, math, tables, lists, floats,
//!    bibliographies) into pre-rendered HTML fragments, leaving reduced
//!    markup containing only text, sectioning, and placeholder tokens.
//! 2. **Typeset and splice** — hand the reduced markup to a renderer,
//!    then splice each fragment back into the output tree at its token.
//!
//! Sanitizing never fails: construct-local problems degrade to visible
//! placeholder fragments. The render step is the only fallible one — it
//! refuses reduced markup whose environment balance shows the document was
//! truncated, and it surfaces renderer outages.
//!
//! ```
//! let html = prelax::sanitize_to_html("Hello $x^2$ world").unwrap();
//! assert!(html.contains("x^2"));
//! ```

pub mod core;
pub mod data;
pub mod features;
pub mod utils;

#[cfg(feature = "wasm")]
pub mod wasm;

pub use crate::core::sanitize::{
    sanitize, sanitize_with, DocumentMeta, SanitizeOptions, SanitizedDocument,
};
pub use crate::core::splice::{
    render_and_splice, MarkupRenderer, Measurer, PlainRenderer, PostLayout, RenderError,
    RenderedDocument,
};
pub use crate::features::math::{FallbackMathRenderer, MathRenderError, MathRenderer};
pub use crate::utils::diagnostics::{Diagnostic, DiagnosticLevel};
pub use crate::utils::error::{PreviewError, PreviewResult};

/// Sanitize and render in one call with the built-in renderers.
pub fn sanitize_and_render(input: &str) -> PreviewResult<RenderedDocument> {
    render_and_splice(sanitize(input), &PlainRenderer)
}

/// Sanitize and render straight to an HTML string.
pub fn sanitize_to_html(input: &str) -> PreviewResult<String> {
    Ok(sanitize_and_render(input)?.to_html())
}

/// Run the sanitize stage and the integrity gatekeeper, skipping the
/// render. The check runs on the reduced markup, so literal `\begin{` text
/// inside extracted code never counts against the balance.
pub fn check_integrity(input: &str) -> PreviewResult<()> {
    let doc = sanitize(input);
    crate::core::sanitize::gatekeeper::check_balance(&doc.reduced, doc.balance_tolerance)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_to_html_smoke() {
        let html = sanitize_to_html("\\section{One}\n\nSome text.").unwrap();
        assert!(html.contains("<h2>One</h2>"));
        assert!(html.contains("Some text."));
    }

    #[test]
    fn test_check_integrity() {
        assert!(check_integrity(r"\begin{a}\end{a}").is_ok());
        assert!(check_integrity(r"\begin{a}\begin{b}\begin{c}\begin{d}").is_err());
    }

    #[test]
    fn test_check_integrity_ignores_code_bodies() {
        let input = concat!(
            "\\begin{verbatim}\n",
            "\\begin{itemize}\n\\begin{tabular}\n\\begin{quote}\n\\begin{center}\n",
            "\\end{verbatim}"
        );
        assert!(check_integrity(input).is_ok());
    }
}
