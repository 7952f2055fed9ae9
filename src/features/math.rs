//! Math extraction and the math renderer adapter
//!
//! The adapter wraps an external math-typesetting engine behind the
//! [`MathRenderer`] trait. Errors never cross the adapter boundary: a
//! failing engine yields an inline error fragment, not a failed document.
//! Display-mode output gets an auto-scale pass so long single-line
//! equations do not overflow the preview column.

use crate::core::sanitize::context::{SanitizeContext, SanitizeOptions, TokenKind};
use crate::data::constants::{MATH_ENVS, MULTILINE_MATH_ENVS};
use crate::features::inline::escape_html;
use crate::utils::diagnostics::Diagnostic;
use crate::utils::scan::find_environment;
use lazy_static::lazy_static;
use regex::Regex;

/// Error from an external math engine.
#[derive(Debug, Clone)]
pub struct MathRenderError {
    pub message: String,
}

impl MathRenderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// External math-typesetting engine boundary.
pub trait MathRenderer {
    /// Render one math expression to an HTML fragment.
    fn render(&self, expr: &str, display: bool) -> Result<String, MathRenderError>;
}

/// Built-in engine-less renderer: emits the expression verbatim in a styled
/// span. Serves tests, the CLI, and hosts that wire a real engine later.
pub struct FallbackMathRenderer;

impl MathRenderer for FallbackMathRenderer {
    fn render(&self, expr: &str, display: bool) -> Result<String, MathRenderError> {
        let class = if display {
            "prelax-math prelax-math-display"
        } else {
            "prelax-math"
        };
        Ok(format!(
            "<span class=\"{}\">{}</span>",
            class,
            escape_html(expr.trim())
        ))
    }
}

lazy_static! {
    // Wrapper macros that contribute no visible width
    static ref WRAPPER_MACROS: Regex = Regex::new(
        r"\\(left|right|big|Big|bigg|Bigg|mathrm|mathbf|mathit|mathcal|mathbb|operatorname|text|textrm|,|;|!|quad|qquad|displaystyle)\b"
    )
    .unwrap();
}

/// Estimate the rendered width of a math expression in em.
///
/// Strips low-information macro names, then weights the remaining
/// characters. A rough calibration; only used to decide whether a display
/// equation needs shrinking.
pub fn estimate_width(expr: &str, char_width: f64) -> f64 {
    let stripped = WRAPPER_MACROS.replace_all(expr, "");
    let visible: usize = stripped
        .chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '{' | '}' | '\\' | '&'))
        .count();
    visible as f64 * char_width
}

/// True when the expression is a multi-line structured environment, which
/// wraps on its own and must not be shrunk.
pub fn is_multiline(expr: &str) -> bool {
    MULTILINE_MATH_ENVS
        .iter()
        .any(|env| expr.contains(&format!("\\begin{{{}}}", env)))
        || expr.contains("\\\\")
}

/// Adapter: render through `renderer`, absorb errors, auto-scale display
/// output.
pub fn render_with_adapter(
    renderer: &dyn MathRenderer,
    expr: &str,
    display: bool,
    options: &SanitizeOptions,
) -> String {
    let fragment = match renderer.render(expr, display) {
        Ok(f) => f,
        Err(e) => {
            return format!(
                "<span class=\"prelax-math-error\" title=\"{}\">[math error]</span>",
                escape_html(&e.message)
            );
        }
    };

    if !display {
        return fragment;
    }

    let estimated = estimate_width(expr, options.math_char_width);
    if estimated <= options.math_width_budget || is_multiline(expr) {
        return format!("<div class=\"prelax-math-block\">{}</div>", fragment);
    }

    let factor = (options.math_width_budget / estimated).max(options.shrink_floor);
    format!(
        "<div class=\"prelax-math-block\" style=\"transform:scale({:.2});transform-origin:left center\">{}</div>",
        factor, fragment
    )
}

/// Extract all math constructs, replacing each with a math placeholder.
///
/// Runs after verbatim extraction (so `$` inside code stays literal) and
/// before table/bibliography extraction (so cell and entry tokenization
/// never sees raw math delimiters). Display forms first, then inline.
pub fn extract_math(input: &str, ctx: &mut SanitizeContext) -> String {
    let mut out = input.to_string();

    // Display environments, handed whole to the engine
    for env in MATH_ENVS {
        let mut pos = 0usize;
        while let Some(span) = find_environment(&out, env, pos) {
            if !span.closed {
                ctx.diag(
                    Diagnostic::warning(format!("unterminated {} environment", env))
                        .with_construct("math")
                        .at_offset(span.start),
                );
                break;
            }
            let body = span.body(&out).to_string();
            let expr = if env.starts_with("align") || env.starts_with("eqnarray") {
                format!("\\begin{{aligned}}{}\\end{{aligned}}", body)
            } else if env.starts_with("gather") || env.starts_with("multline") {
                format!("\\begin{{gathered}}{}\\end{{gathered}}", body)
            } else {
                body
            };
            let fragment = ctx.render_math(&expr, true);
            let token = ctx.register(TokenKind::Math, fragment);
            out.replace_range(span.start..span.end, &token);
            pos = span.start + token.len();
        }
    }

    out = extract_delimited(&out, "\\[", "\\]", true, ctx);
    out = extract_delimited(&out, "$$", "$$", true, ctx);
    out = extract_delimited(&out, "\\(", "\\)", false, ctx);
    out = extract_inline_dollars(&out, ctx);
    out
}

fn extract_delimited(
    input: &str,
    open: &str,
    close: &str,
    display: bool,
    ctx: &mut SanitizeContext,
) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    loop {
        match rest.find(open) {
            None => {
                out.push_str(rest);
                return out;
            }
            Some(start) => {
                // Skip escaped openers: \$$ is a literal dollar, and \\[
                // is a row break with optional spacing, not display math
                if rest[..start].ends_with('\\') {
                    out.push_str(&rest[..start + open.len()]);
                    rest = &rest[start + open.len()..];
                    continue;
                }
                match rest[start + open.len()..].find(close) {
                    None => {
                        ctx.diag(
                            Diagnostic::warning(format!("unterminated {} math", open))
                                .with_construct("math"),
                        );
                        out.push_str(rest);
                        return out;
                    }
                    Some(len) => {
                        let expr = &rest[start + open.len()..start + open.len() + len];
                        out.push_str(&rest[..start]);
                        let fragment = ctx.render_math(expr, display);
                        let token = ctx.register(TokenKind::Math, fragment);
                        out.push_str(&token);
                        rest = &rest[start + open.len() + len + close.len()..];
                    }
                }
            }
        }
    }
}

fn extract_inline_dollars(input: &str, ctx: &mut SanitizeContext) -> String {
    let mut out = String::with_capacity(input.len());
    let bytes = input.as_bytes();
    let mut i = 0usize;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => {
                out.push_str(&input[i..i + 1]);
                if i + 1 < bytes.len() {
                    let c = input[i + 1..].chars().next().unwrap();
                    out.push(c);
                    i += 1 + c.len_utf8();
                } else {
                    i += 1;
                }
            }
            b'$' => {
                // Find the closing dollar, escape-aware
                let mut j = i + 1;
                let mut close = None;
                while j < bytes.len() {
                    match bytes[j] {
                        b'\\' => j += 2,
                        b'$' => {
                            close = Some(j);
                            break;
                        }
                        _ => j += 1,
                    }
                }
                match close {
                    Some(end) => {
                        let fragment = ctx.render_math(&input[i + 1..end], false);
                        let token = ctx.register(TokenKind::Math, fragment);
                        out.push_str(&token);
                        i = end + 1;
                    }
                    None => {
                        ctx.diag(
                            Diagnostic::warning("unterminated inline math")
                                .with_construct("math")
                                .at_offset(i),
                        );
                        out.push_str(&input[i..]);
                        return out;
                    }
                }
            }
            _ => {
                let c = input[i..].chars().next().unwrap();
                out.push(c);
                i += c.len_utf8();
            }
        }
    }
    out
}
