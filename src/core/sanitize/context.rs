//! Per-call sanitizer state
//!
//! All mutable state of one sanitize call lives here: placeholder counters,
//! the block table, and collected diagnostics. Nothing is module-level, so
//! concurrent calls never collide on token numbering.

use fxhash::FxHashMap;
use lazy_static::lazy_static;
use regex::Regex;

use crate::features::diagrams::DiagramTuning;
use crate::features::math::MathRenderer;
use crate::utils::diagnostics::Diagnostic;

/// Sentinel opening a placeholder token. Private-use characters survive the
/// external renderer as plain text and cannot collide with document content
/// (the input is forced away from the private-use plane first).
pub const TOKEN_OPEN: char = '\u{E000}';
/// Sentinel closing a placeholder token.
pub const TOKEN_CLOSE: char = '\u{E001}';

lazy_static! {
    /// Matches any placeholder token in reduced markup or rendered text.
    pub static ref TOKEN_RE: Regex =
        Regex::new("\u{E000}(BLK|MATH|DIAG)(\\d+)\u{E001}").unwrap();
}

/// Placeholder namespace, one per extracted-construct family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// Tables, lists, boxes, algorithms, verbatim, and other block fragments
    Block,
    /// Math fragments
    Math,
    /// Sandboxed diagram fragments
    Diagram,
}

impl TokenKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            TokenKind::Block => "BLK",
            TokenKind::Math => "MATH",
            TokenKind::Diagram => "DIAG",
        }
    }
}

/// Tunable knobs of one sanitize call.
///
/// The numeric layout constants are empirical calibration, not hard
/// requirements, so they are all exposed here.
#[derive(Debug, Clone)]
pub struct SanitizeOptions {
    /// Gatekeeper tolerance for `|opens - closes|`
    pub balance_tolerance: usize,
    /// Estimated rendered width per character of display math, in em
    pub math_char_width: f64,
    /// Display math width budget before proportional shrink kicks in, in em
    pub math_width_budget: f64,
    /// Lower bound on any proportional shrink factor
    pub shrink_floor: f64,
    /// Diagram layout heuristic calibration
    pub diagram: DiagramTuning,
}

impl Default for SanitizeOptions {
    fn default() -> Self {
        Self {
            balance_tolerance: 2,
            math_char_width: 0.45,
            math_width_budget: 50.0,
            shrink_floor: 0.55,
            diagram: DiagramTuning::default(),
        }
    }
}

/// Mutable state of one sanitize call.
pub struct SanitizeContext<'a> {
    pub options: &'a SanitizeOptions,
    /// Block table: placeholder token to rendered fragment
    pub blocks: FxHashMap<String, String>,
    /// Diagnostics collected while extracting
    pub diagnostics: Vec<Diagnostic>,
    math: &'a dyn MathRenderer,
    block_counter: usize,
    math_counter: usize,
    diagram_counter: usize,
}

impl<'a> SanitizeContext<'a> {
    pub fn new(options: &'a SanitizeOptions, math: &'a dyn MathRenderer) -> Self {
        Self {
            options,
            blocks: FxHashMap::default(),
            diagnostics: Vec::new(),
            math,
            block_counter: 0,
            math_counter: 0,
            diagram_counter: 0,
        }
    }

    /// Mint the next placeholder token in `kind`'s namespace.
    pub fn next_token(&mut self, kind: TokenKind) -> String {
        let counter = match kind {
            TokenKind::Block => &mut self.block_counter,
            TokenKind::Math => &mut self.math_counter,
            TokenKind::Diagram => &mut self.diagram_counter,
        };
        *counter += 1;
        format!("{}{}{}{}", TOKEN_OPEN, kind.prefix(), counter, TOKEN_CLOSE)
    }

    /// Register `fragment` under a fresh token and return the token.
    pub fn register(&mut self, kind: TokenKind, fragment: String) -> String {
        let token = self.next_token(kind);
        self.blocks.insert(token.clone(), fragment);
        token
    }

    /// Inline any placeholder tokens inside `text` with their fragments.
    ///
    /// Used when an outer extractor (table, list, bibliography) absorbs
    /// content that an earlier pass already tokenized; the absorbed entries
    /// leave the block table so tokens and entries stay in bijection.
    pub fn resolve_tokens(&mut self, text: &str) -> String {
        if !text.contains(TOKEN_OPEN) {
            return text.to_string();
        }
        let mut out = String::with_capacity(text.len());
        let mut last = 0usize;
        let spans: Vec<(usize, usize, String)> = TOKEN_RE
            .find_iter(text)
            .map(|m| (m.start(), m.end(), m.as_str().to_string()))
            .collect();
        for (start, end, token) in spans {
            out.push_str(&text[last..start]);
            match self.blocks.remove(&token) {
                Some(fragment) => out.push_str(&fragment),
                None => out.push_str(&token),
            }
            last = end;
        }
        out.push_str(&text[last..]);
        out
    }

    /// Render math through the adapter; never fails.
    pub fn render_math(&mut self, expr: &str, display: bool) -> String {
        crate::features::math::render_with_adapter(self.math, expr, display, self.options)
    }

    pub fn diag(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::math::FallbackMathRenderer;
    use pretty_assertions::assert_eq;

    fn ctx_fixtures() -> (SanitizeOptions, FallbackMathRenderer) {
        (SanitizeOptions::default(), FallbackMathRenderer)
    }

    #[test]
    fn test_tokens_are_namespaced_and_sequential() {
        let (opts, math) = ctx_fixtures();
        let mut ctx = SanitizeContext::new(&opts, &math);
        let t1 = ctx.next_token(TokenKind::Block);
        let t2 = ctx.next_token(TokenKind::Block);
        let m1 = ctx.next_token(TokenKind::Math);
        assert_ne!(t1, t2);
        assert!(t1.contains("BLK1"));
        assert!(t2.contains("BLK2"));
        assert!(m1.contains("MATH1"));
    }

    #[test]
    fn test_register_and_resolve() {
        let (opts, math) = ctx_fixtures();
        let mut ctx = SanitizeContext::new(&opts, &math);
        let token = ctx.register(TokenKind::Math, "<span>x</span>".to_string());
        let resolved = ctx.resolve_tokens(&format!("cell with {} inside", token));
        assert_eq!(resolved, "cell with <span>x</span> inside");
        // Absorbed entry left the table
        assert!(ctx.blocks.is_empty());
    }

    #[test]
    fn test_resolve_keeps_unknown_tokens() {
        let (opts, math) = ctx_fixtures();
        let mut ctx = SanitizeContext::new(&opts, &math);
        let phantom = format!("{}BLK99{}", TOKEN_OPEN, TOKEN_CLOSE);
        assert_eq!(ctx.resolve_tokens(&phantom), phantom);
    }

    #[test]
    fn test_counters_are_per_context() {
        let (opts, math) = ctx_fixtures();
        let mut a = SanitizeContext::new(&opts, &math);
        let mut b = SanitizeContext::new(&opts, &math);
        assert_eq!(a.next_token(TokenKind::Diagram), b.next_token(TokenKind::Diagram));
    }
}
