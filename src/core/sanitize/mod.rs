//! Sanitize pipeline
//!
//! Turns untrusted generated markup into reduced markup plus a block table.
//! The reduced markup contains only text, sectioning commands, and
//! placeholder tokens; everything the downstream renderer cannot be trusted
//! with (diagrams, code, math, tables, lists, floats) has been extracted
//! into pre-rendered HTML fragments keyed by token.
//!
//! Pass order is fixed. Diagrams go first because their bodies look like
//! everything else (braces, `&`, `\\`); verbatim before math so code stays
//! literal; math before tables so cell splitting never sees `&` inside
//! math; bibliography after math so entry text can carry math tokens.
//!
//! Sanitizing never fails: every construct-level problem degrades to a
//! visible fragment plus a diagnostic. The integrity gatekeeper runs on
//! the reduced markup at render time, after extraction has already pulled
//! literal `\begin{` text (verbatim bodies, code listings) out of the
//! document.

pub mod context;
pub mod gatekeeper;
pub mod preamble;

use fxhash::FxHashMap;

use crate::features::bibliography::resolve_citations;
use crate::features::blocks::{
    extract_abstract, extract_algorithms, extract_boxes, extract_figures, extract_quoted,
};
use crate::features::diagrams::extract_diagrams;
use crate::features::lists::extract_lists;
use crate::features::math::{extract_math, FallbackMathRenderer, MathRenderer};
use crate::features::tables::extract_tables;
use crate::features::verbatim::extract_verbatim;
use crate::utils::diagnostics::Diagnostic;
use crate::utils::scan::{find_environment, read_group, skip_ws};

pub use context::{SanitizeContext, SanitizeOptions, TokenKind, TOKEN_RE};
pub use preamble::DocumentMeta;

use crate::data::constants::VERBATIM_ENVS;

/// Result of one sanitize call.
#[derive(Debug)]
pub struct SanitizedDocument {
    /// Reduced markup: text, sectioning, and placeholder tokens only
    pub reduced: String,
    /// Block table: placeholder token to pre-rendered HTML fragment
    pub blocks: FxHashMap<String, String>,
    /// Rendered bibliography fragment, appended after the body
    pub bibliography: Option<String>,
    /// Metadata lifted from the original preamble
    pub meta: DocumentMeta,
    /// Non-fatal problems found while extracting
    pub diagnostics: Vec<Diagnostic>,
    /// Gatekeeper tolerance, carried to the render step where the
    /// integrity check on the reduced markup runs
    pub balance_tolerance: usize,
}

/// Strip a Markdown code-fence wrapper if the whole input arrived inside
/// one (a common transport artifact of generated markup).
fn strip_code_fence(input: &str) -> &str {
    let trimmed = input.trim();
    if !trimmed.starts_with("```") {
        return input;
    }
    let Some(line_end) = trimmed.find('\n') else {
        return input;
    };
    let inner = &trimmed[line_end + 1..];
    match inner.rfind("```") {
        Some(close) => &inner[..close],
        None => inner,
    }
}

/// Drop private-use-plane characters so document text can never collide
/// with placeholder sentinels.
fn strip_private_use(input: &str) -> String {
    input
        .chars()
        .filter(|c| !('\u{E000}'..='\u{F8FF}').contains(c))
        .collect()
}

/// Strip `%` line comments outside verbatim environments. Escaped `\%`
/// stays literal.
fn strip_comments(input: &str) -> String {
    // Verbatim bodies are opaque to the comment scanner
    let mut protected: Vec<(usize, usize)> = Vec::new();
    for env in VERBATIM_ENVS {
        let mut pos = 0usize;
        while let Some(span) = find_environment(input, env, pos) {
            protected.push((span.start, span.end));
            if !span.closed {
                break;
            }
            pos = span.end;
        }
    }

    let mut out = String::with_capacity(input.len());
    let bytes = input.as_bytes();
    let mut i = 0usize;
    while i < bytes.len() {
        if let Some(&(start, end)) = protected.iter().find(|(s, e)| *s <= i && i < *e) {
            out.push_str(&input[start.max(i)..end]);
            i = end;
            continue;
        }
        let c = input[i..].chars().next().unwrap();
        match c {
            '\\' => {
                out.push(c);
                if let Some(n) = input[i + 1..].chars().next() {
                    out.push(n);
                    i += 1 + n.len_utf8();
                    continue;
                }
            }
            '%' => {
                // Comment runs to end of line; keep the newline itself
                match input[i..].find('\n') {
                    Some(nl) => {
                        i += nl;
                        continue;
                    }
                    None => break,
                }
            }
            _ => out.push(c),
        }
        i += c.len_utf8();
    }
    out
}

/// Remove `\label{...}` commands; the preview has no link targets.
fn strip_labels(input: &str) -> String {
    let mut out = input.to_string();
    while let Some(at) = out.find("\\label") {
        let next = skip_ws(&out, at + "\\label".len());
        match read_group(&out, next) {
            Some((_, end)) => out.replace_range(at..end, ""),
            None => out.replace_range(at..at + "\\label".len(), ""),
        }
    }
    out
}

/// Sanitize with the default options and the built-in math renderer.
pub fn sanitize(input: &str) -> SanitizedDocument {
    sanitize_with(input, &SanitizeOptions::default(), &FallbackMathRenderer)
}

/// Sanitize `input` into reduced markup plus a block table.
///
/// Never fails: every construct-level problem degrades to a visible
/// fragment and a diagnostic. Integrity of the reduced markup is checked
/// by the render step.
pub fn sanitize_with(
    input: &str,
    options: &SanitizeOptions,
    math: &dyn MathRenderer,
) -> SanitizedDocument {
    let input = strip_code_fence(input);
    let input = strip_private_use(input);
    let input = strip_comments(&input);

    let (markup, meta) = preamble::rewrite_preamble(&input);

    let mut ctx = SanitizeContext::new(options, math);
    let markup = extract_diagrams(&markup, &mut ctx);
    let markup = extract_figures(&markup, &mut ctx);
    let markup = extract_verbatim(&markup, &mut ctx);
    let markup = extract_math(&markup, &mut ctx);
    let markup = extract_abstract(&markup, &mut ctx);
    let (markup, bibliography) = resolve_citations(&markup, &mut ctx);
    let markup = extract_tables(&markup, &mut ctx);
    let markup = extract_lists(&markup, &mut ctx);
    let markup = extract_algorithms(&markup, &mut ctx);
    let markup = extract_boxes(&markup, &mut ctx);
    let markup = extract_quoted(&markup, &mut ctx);

    let reduced = strip_labels(&markup);

    SanitizedDocument {
        reduced,
        blocks: ctx.blocks,
        bibliography,
        meta,
        diagnostics: ctx.diagnostics,
        balance_tolerance: options.balance_tolerance,
    }
}
