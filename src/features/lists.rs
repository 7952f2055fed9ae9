//! List extraction
//!
//! Supports arbitrary nesting without a recursive-descent grammar: the
//! innermost list (one whose body contains no further list begin marker)
//! is rendered and replaced by a placeholder, and the loop repeats until
//! no lists remain. Inner placeholders are resolved while rendering the
//! enclosing item, so nesting reassembles in dependency order.

use crate::core::sanitize::context::{SanitizeContext, TokenKind};
use crate::data::constants::LIST_ENVS;
use crate::features::inline::render_text;
use crate::utils::diagnostics::Diagnostic;
use crate::utils::scan::{find_environment, read_opt_group, skip_ws, EnvSpan, MAX_SCAN_STEPS};

fn contains_list_begin(body: &str) -> bool {
    LIST_ENVS
        .keys()
        .any(|env| body.contains(&format!("\\begin{{{}}}", env)))
}

/// Find the first innermost list environment.
fn find_leaf_list(input: &str) -> Option<(&'static str, EnvSpan)> {
    let mut best: Option<(&'static str, EnvSpan)> = None;
    for (&env, _) in LIST_ENVS.iter() {
        let mut pos = 0usize;
        while let Some(span) = find_environment(input, env, pos) {
            if !span.closed {
                break;
            }
            if !contains_list_begin(span.body(input)) {
                if best
                    .as_ref()
                    .map(|(_, b)| span.start < b.start)
                    .unwrap_or(true)
                {
                    best = Some((env, span.clone()));
                }
                break;
            }
            // Descend: the leaf is inside this body
            pos = span.body_start;
        }
    }
    best
}

/// Split a list body into items at brace depth zero.
fn split_items(body: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut current = String::new();
    let mut depth = 0i32;
    let mut i = 0usize;
    let bytes = body.as_bytes();
    let mut seen_item = false;

    while i < bytes.len() {
        let rest = &body[i..];
        if depth == 0 && rest.starts_with("\\item") {
            let after = rest["\\item".len()..].chars().next();
            let is_word_boundary = !matches!(after, Some(c) if c.is_ascii_alphabetic());
            if is_word_boundary {
                if seen_item {
                    items.push(std::mem::take(&mut current));
                }
                seen_item = true;
                i += "\\item".len();
                continue;
            }
        }
        let c = rest.chars().next().unwrap();
        match c {
            '\\' => {
                if seen_item {
                    current.push(c);
                }
                if let Some(n) = rest.chars().nth(1) {
                    if seen_item {
                        current.push(n);
                    }
                    i += 1 + n.len_utf8();
                    continue;
                }
            }
            '{' => {
                depth += 1;
                if seen_item {
                    current.push(c);
                }
            }
            '}' => {
                depth -= 1;
                if seen_item {
                    current.push(c);
                }
            }
            _ if seen_item => current.push(c),
            _ => {}
        }
        i += c.len_utf8();
    }
    if seen_item {
        items.push(current);
    }
    items
}

fn render_list(env: &str, body: &str, ctx: &mut SanitizeContext) -> String {
    let element = LIST_ENVS.get(env).copied().unwrap_or("ul");
    let mut html = format!("<{} class=\"prelax-list\">", element);

    for item in split_items(body) {
        let item = item.trim();
        if element == "dl" {
            // Definition items carry the term in an optional argument
            let (term, rest) = if item.starts_with('[') {
                match read_opt_group(item, 0) {
                    Some((term, next)) => (term, &item[next..]),
                    None => (String::new(), item),
                }
            } else {
                (String::new(), item)
            };
            html.push_str(&format!("<dt>{}</dt>", render_text(&term, ctx)));
            html.push_str(&format!("<dd>{}</dd>", render_text(rest.trim(), ctx)));
        } else {
            // A stray optional argument on a plain item is a custom marker
            let content = if item.starts_with('[') {
                match read_opt_group(item, 0) {
                    Some((_, next)) => &item[next..],
                    None => item,
                }
            } else {
                item
            };
            html.push_str(&format!("<li>{}</li>", render_text(content.trim(), ctx)));
        }
    }
    html.push_str(&format!("</{}>", element));
    html
}

/// Extract all lists leaf-first, replacing each with a block placeholder.
pub fn extract_lists(input: &str, ctx: &mut SanitizeContext) -> String {
    let mut out = input.to_string();
    let mut steps = 0usize;

    while let Some((env, span)) = find_leaf_list(&out) {
        steps += 1;
        if steps > MAX_SCAN_STEPS {
            ctx.diag(
                Diagnostic::warning("list nesting exceeded the scan cap")
                    .with_construct("list"),
            );
            break;
        }
        // Drop an option list like [label=...] before the first item
        let mut body = span.body(&out).to_string();
        let at = skip_ws(&body, 0);
        if body[at..].starts_with('[') {
            if let Some((_, next)) = read_opt_group(&body, at) {
                body = body[next..].to_string();
            }
        }
        let fragment = render_list(env, &body, ctx);
        let token = ctx.register(TokenKind::Block, fragment);
        out.replace_range(span.start..span.end, &token);
    }

    // Unterminated lists: degrade, keep the rest of the document
    for (&env, _) in LIST_ENVS.iter() {
        if let Some(span) = find_environment(&out, env, 0) {
            if !span.closed {
                ctx.diag(
                    Diagnostic::warning(format!("unterminated {} environment", env))
                        .with_construct("list")
                        .at_offset(span.start),
                );
                let fragment = render_list(env, span.body(&out), ctx);
                let token = ctx.register(TokenKind::Block, fragment);
                out.replace_range(span.start..span.end, &token);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::sanitize::context::SanitizeOptions;
    use crate::features::math::FallbackMathRenderer;
    use pretty_assertions::assert_eq;

    fn run(input: &str) -> (String, SanitizeContext<'static>) {
        // Leak fixtures so the context can be returned from the helper
        let opts: &'static SanitizeOptions = Box::leak(Box::new(SanitizeOptions::default()));
        let math: &'static FallbackMathRenderer = Box::leak(Box::new(FallbackMathRenderer));
        let mut ctx = SanitizeContext::new(opts, math);
        let out = extract_lists(input, &mut ctx);
        (out, ctx)
    }

    #[test]
    fn test_flat_itemize() {
        let (out, ctx) =
            run("\\begin{itemize}\\item one\\item two\\end{itemize}");
        assert!(!out.contains("itemize"));
        let html = ctx.blocks.values().next().unwrap();
        assert_eq!(html.matches("<li>").count(), 2);
        assert!(html.contains("one"));
    }

    #[test]
    fn test_enumerate_is_ordered() {
        let (_, ctx) = run("\\begin{enumerate}\\item a\\end{enumerate}");
        let html = ctx.blocks.values().next().unwrap();
        assert!(html.starts_with("<ol"));
    }

    #[test]
    fn test_nested_lists_reassemble() {
        let (out, mut ctx) = run(
            "\\begin{itemize}\\item outer\\begin{enumerate}\\item inner\\end{enumerate}\\item last\\end{itemize}",
        );
        // One top-level token remains; the inner list was absorbed
        assert_eq!(ctx.blocks.len(), 1);
        let token = ctx.blocks.keys().next().unwrap().clone();
        assert!(out.contains(&token));
        let html = ctx.blocks.get(&token).unwrap().clone();
        assert!(html.contains("<ol"));
        assert!(html.contains("inner"));
        assert!(html.contains("last"));
        let _ = ctx.resolve_tokens("");
    }

    #[test]
    fn test_description_terms() {
        let (_, ctx) = run(
            "\\begin{description}\\item[alpha] first\\item[beta] second\\end{description}",
        );
        let html = ctx.blocks.values().next().unwrap();
        assert!(html.contains("<dt>alpha</dt>"));
        assert!(html.contains("<dd>second</dd>"));
    }

    #[test]
    fn test_triple_nesting() {
        let (out, ctx) = run(
            "\\begin{itemize}\\item a\\begin{itemize}\\item b\\begin{itemize}\\item c\\end{itemize}\\end{itemize}\\end{itemize}",
        );
        assert_eq!(ctx.blocks.len(), 1);
        let html = ctx.blocks.values().next().unwrap();
        assert_eq!(html.matches("<ul").count(), 3);
        assert!(!out.contains("itemize"));
    }

    #[test]
    fn test_unterminated_list_degrades() {
        let (out, ctx) = run("\\begin{itemize}\\item only");
        assert!(!out.contains("itemize"));
        assert!(!ctx.diagnostics.is_empty());
        let html = ctx.blocks.values().next().unwrap();
        assert!(html.contains("only"));
    }

    #[test]
    fn test_item_with_custom_marker() {
        let (_, ctx) = run("\\begin{itemize}\\item[--] dashed\\end{itemize}");
        let html = ctx.blocks.values().next().unwrap();
        assert!(html.contains("<li>dashed</li>"));
    }
}
