//! Block-level extractors: abstract, figures, algorithms, boxes, and
//! quoted environments
//!
//! Each extractor locates its construct, renders a fragment, and replaces
//! the construct with a block placeholder. Parse failures degrade to a
//! visible "could not be previewed" fragment, never an error.

use crate::core::sanitize::context::{SanitizeContext, TokenKind};
use crate::data::constants::{ALGORITHM_ENVS, QUOTE_ENVS, THEOREM_ENVS};
use crate::features::inline::{escape_html, render_text};
use crate::features::math::extract_math;
use crate::features::tables::take_caption;
use crate::features::verbatim::extract_verbatim;
use crate::utils::diagnostics::Diagnostic;
use crate::utils::scan::{find_environment, read_group, read_opt_group, skip_ws};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref INCLUDEGRAPHICS_RE: Regex = Regex::new(r"\\includegraphics\b").unwrap();
    static ref ALGO_KEYWORD_RE: Regex = Regex::new(
        r"\\(State|STATE|If|IF|ElsIf|ELSIF|Else|ELSE|EndIf|ENDIF|For|FOR|ForAll|FORALL|EndFor|ENDFOR|While|WHILE|EndWhile|ENDWHILE|Repeat|REPEAT|Until|UNTIL|Return|RETURN|Function|FUNCTION|EndFunction|ENDFUNCTION|Procedure|PROCEDURE|EndProcedure|ENDPROCEDURE|Require|REQUIRE|Ensure|ENSURE|Comment|COMMENT)\b"
    )
    .unwrap();
}

/// Extract the `abstract` environment into a styled block.
pub fn extract_abstract(input: &str, ctx: &mut SanitizeContext) -> String {
    let mut out = input.to_string();
    if let Some(span) = find_environment(&out, "abstract", 0) {
        if !span.closed {
            ctx.diag(
                Diagnostic::warning("unterminated abstract environment")
                    .with_construct("abstract")
                    .at_offset(span.start),
            );
            return out;
        }
        let body = render_text(span.body(&out).trim(), ctx);
        let fragment = format!(
            "<div class=\"prelax-abstract\"><h4>Abstract</h4><p>{}</p></div>",
            body
        );
        let token = ctx.register(TokenKind::Block, fragment);
        out.replace_range(span.start..span.end, &token);
    }
    out
}

fn render_includegraphics(rest: &str) -> Option<(String, usize)> {
    let mut at = skip_ws(rest, 0);
    if rest[at..].starts_with('[') {
        let (_, next) = read_opt_group(rest, at)?;
        at = next;
    }
    let (path, end) = read_group(rest, skip_ws(rest, at))?;
    let fragment = format!(
        "<div class=\"prelax-figure-missing\">[Figure: {}]</div>",
        escape_html(path.trim())
    );
    Some((fragment, end))
}

/// Extract `figure` environments and bare `\includegraphics` commands.
///
/// Uploaded assets are outside this subsystem, so images render as named
/// placeholders; diagrams inside figures were already tokenized by the
/// diagram pass and are resolved into the figure body here.
pub fn extract_figures(input: &str, ctx: &mut SanitizeContext) -> String {
    let mut out = input.to_string();
    let mut figure_number = 0usize;

    let mut pos = 0usize;
    while let Some(span) = find_environment(&out, "figure", pos) {
        if !span.closed {
            ctx.diag(
                Diagnostic::warning("unterminated figure environment")
                    .with_construct("figure")
                    .at_offset(span.start),
            );
            break;
        }
        figure_number += 1;
        let (body, caption) = take_caption(span.body(&out));
        let mut inner = replace_includegraphics(&body);
        // Drop float placement noise the preview cannot honor
        for cmd in ["\\centering", "\\small", "\\footnotesize"] {
            inner = inner.replace(cmd, "");
        }
        // Figure bodies can hold code listings and display equations;
        // tokenize those first so the inline pass never sees them raw
        let inner = extract_verbatim(&inner, ctx);
        let inner = extract_math(&inner, ctx);
        let mut fragment = format!(
            "<figure class=\"prelax-figure\">{}",
            render_text(inner.trim(), ctx)
        );
        if let Some(caption) = caption {
            fragment.push_str(&format!(
                "<figcaption>Figure {}: {}</figcaption>",
                figure_number,
                render_text(&caption, ctx)
            ));
        }
        fragment.push_str("</figure>");
        let token = ctx.register(TokenKind::Block, fragment);
        out.replace_range(span.start..span.end, &token);
        pos = span.start + token.len();
    }

    // Bare includegraphics outside figures
    while let Some(m) = INCLUDEGRAPHICS_RE.find(&out) {
        let rest = &out[m.end()..];
        match render_includegraphics(rest) {
            Some((fragment, end)) => {
                let token = ctx.register(TokenKind::Block, fragment);
                let absolute_end = m.end() + end;
                out.replace_range(m.start()..absolute_end, &token);
            }
            None => {
                ctx.diag(
                    Diagnostic::warning("malformed \\includegraphics")
                        .with_construct("figure")
                        .at_offset(m.start()),
                );
                out.replace_range(m.start()..m.end(), "");
            }
        }
    }
    out
}

fn replace_includegraphics(body: &str) -> String {
    let mut out = body.to_string();
    while let Some(m) = INCLUDEGRAPHICS_RE.find(&out) {
        let rest = &out[m.end()..];
        match render_includegraphics(rest) {
            Some((fragment, end)) => {
                out.replace_range(m.start()..m.end() + end, &fragment);
            }
            None => {
                out.replace_range(m.start()..m.end(), "");
            }
        }
    }
    out
}

/// Extract algorithm environments into readable pseudo-code blocks.
pub fn extract_algorithms(input: &str, ctx: &mut SanitizeContext) -> String {
    let mut out = input.to_string();
    for env in ALGORITHM_ENVS {
        let mut pos = 0usize;
        while let Some(span) = find_environment(&out, env, pos) {
            if !span.closed {
                ctx.diag(
                    Diagnostic::warning(format!("unterminated {} environment", env))
                        .with_construct("algorithm")
                        .at_offset(span.start),
                );
                break;
            }
            let (body, caption) = take_caption(span.body(&out));
            let fragment = render_algorithm(&body, caption.as_deref(), ctx);
            let token = ctx.register(TokenKind::Block, fragment);
            out.replace_range(span.start..span.end, &token);
            pos = span.start + token.len();
        }
    }
    out
}

fn render_algorithm(body: &str, caption: Option<&str>, ctx: &mut SanitizeContext) -> String {
    // Inner algorithmic wrapper adds nothing over the outer float
    let mut body = body.to_string();
    for inner in ["algorithmic", "algorithm2e"] {
        if let Some(span) = find_environment(&body, inner, 0) {
            if span.closed {
                let mut stripped = span.body(&body).to_string();
                // Drop the line-numbering argument of \begin{algorithmic}[1]
                let at = skip_ws(&stripped, 0);
                if stripped[at..].starts_with('[') {
                    if let Some((_, next)) = read_opt_group(&stripped, at) {
                        stripped = stripped[next..].to_string();
                    }
                }
                body = stripped;
            }
        }
    }

    let mut lines: Vec<String> = Vec::new();
    let mut indent = 0usize;
    for piece in split_algo_statements(&body) {
        let piece = piece.trim();
        if piece.is_empty() {
            continue;
        }
        let lower_indent = piece.starts_with("end ")
            || piece.starts_with("else")
            || piece.starts_with("until");
        if lower_indent {
            indent = indent.saturating_sub(1);
        }
        lines.push(format!("{}{}", "  ".repeat(indent), piece));
        if piece.starts_with("if ")
            || piece.starts_with("for ")
            || piece.starts_with("while ")
            || piece.starts_with("function ")
            || piece.starts_with("procedure ")
            || piece.starts_with("repeat")
            || piece.starts_with("else")
        {
            indent += 1;
        }
    }

    let text = lines.join("\n");
    let mut html = String::from("<div class=\"prelax-algorithm\">");
    if let Some(caption) = caption {
        html.push_str(&format!(
            "<div class=\"prelax-algorithm-caption\">Algorithm: {}</div>",
            render_text(caption, ctx)
        ));
    }
    html.push_str(&format!("<pre>{}</pre></div>", escape_html(&text)));
    html
}

/// Break an algorithmic body into statements keyed on its keyword commands.
fn split_algo_statements(body: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut last_keyword: Option<String> = None;
    let mut last_end = 0usize;
    let mut starts: Vec<(usize, usize, String)> = Vec::new();

    for m in ALGO_KEYWORD_RE.captures_iter(body) {
        let whole = m.get(0).unwrap();
        starts.push((whole.start(), whole.end(), m[1].to_lowercase()));
    }

    for (start, end, keyword) in starts {
        if let Some(prev) = last_keyword.take() {
            statements.push(render_statement(&prev, &body[last_end..start]));
        }
        last_keyword = Some(keyword);
        last_end = end;
    }
    if let Some(prev) = last_keyword {
        statements.push(render_statement(&prev, &body[last_end..]));
    } else {
        let leftover = crate::features::inline::strip_macros(body);
        if !leftover.trim().is_empty() {
            statements.push(leftover.trim().to_string());
        }
    }
    statements
}

fn render_statement(keyword: &str, rest: &str) -> String {
    let arg = crate::features::inline::strip_macros(rest);
    let arg = arg.trim().trim_end_matches('\\').trim();
    match keyword {
        "state" => arg.to_string(),
        "if" | "elsif" => format!("if {}:", arg),
        "else" => "else:".to_string(),
        "endif" => "end if".to_string(),
        "for" | "forall" => format!("for {}:", arg),
        "endfor" => "end for".to_string(),
        "while" => format!("while {}:", arg),
        "endwhile" => "end while".to_string(),
        "repeat" => "repeat".to_string(),
        "until" => format!("until {}", arg),
        "return" => format!("return {}", arg),
        "function" => format!("function {}", arg),
        "endfunction" => "end function".to_string(),
        "procedure" => format!("procedure {}", arg),
        "endprocedure" => "end procedure".to_string(),
        "require" => format!("require: {}", arg),
        "ensure" => format!("ensure: {}", arg),
        "comment" => format!("// {}", arg),
        _ => arg.to_string(),
    }
}

/// Extract box commands (`\fbox`, `\framebox`, `\parbox`) and the
/// `tcolorbox` environment.
pub fn extract_boxes(input: &str, ctx: &mut SanitizeContext) -> String {
    let mut out = input.to_string();

    let mut pos = 0usize;
    while let Some(span) = find_environment(&out, "tcolorbox", pos) {
        if !span.closed {
            ctx.diag(
                Diagnostic::warning("unterminated tcolorbox environment")
                    .with_construct("box")
                    .at_offset(span.start),
            );
            break;
        }
        let mut body = span.body(&out).to_string();
        let at = skip_ws(&body, 0);
        if body[at..].starts_with('[') {
            if let Some((_, next)) = read_opt_group(&body, at) {
                body = body[next..].to_string();
            }
        }
        let fragment = format!(
            "<div class=\"prelax-box\">{}</div>",
            render_text(body.trim(), ctx)
        );
        let token = ctx.register(TokenKind::Block, fragment);
        out.replace_range(span.start..span.end, &token);
        pos = span.start + token.len();
    }

    for command in ["\\fbox", "\\framebox", "\\parbox", "\\makebox"] {
        loop {
            let Some(at) = out.find(command) else { break };
            let mut next = at + command.len();
            // Width and placement arguments may nest braces or brackets
            for _ in 0..2 {
                let ws = skip_ws(&out, next);
                if out[ws..].starts_with('[') {
                    match read_opt_group(&out, ws) {
                        Some((_, n)) => next = n,
                        None => break,
                    }
                } else {
                    break;
                }
            }
            // parbox takes a width group before the content group
            if command == "\\parbox" {
                let ws = skip_ws(&out, next);
                if let Some((_, n)) = read_group(&out, ws) {
                    let ws2 = skip_ws(&out, n);
                    if out[ws2..].starts_with('{') {
                        next = n;
                    }
                }
            }
            match read_group(&out, skip_ws(&out, next)) {
                Some((content, end)) => {
                    let fragment = format!(
                        "<div class=\"prelax-box\">{}</div>",
                        render_text(content.trim(), ctx)
                    );
                    let token = ctx.register(TokenKind::Block, fragment);
                    out.replace_range(at..end, &token);
                }
                None => {
                    ctx.diag(
                        Diagnostic::warning(format!("malformed {} command", command))
                            .with_construct("box")
                            .at_offset(at),
                    );
                    out.replace_range(at..at + command.len(), "");
                }
            }
        }
    }
    out
}

/// Extract quotation and theorem-family environments.
pub fn extract_quoted(input: &str, ctx: &mut SanitizeContext) -> String {
    let mut out = input.to_string();

    for env in QUOTE_ENVS {
        let mut pos = 0usize;
        while let Some(span) = find_environment(&out, env, pos) {
            if !span.closed {
                ctx.diag(
                    Diagnostic::warning(format!("unterminated {} environment", env))
                        .with_construct("quote")
                        .at_offset(span.start),
                );
                break;
            }
            let fragment = format!(
                "<blockquote class=\"prelax-quote\">{}</blockquote>",
                render_text(span.body(&out).trim(), ctx)
            );
            let token = ctx.register(TokenKind::Block, fragment);
            out.replace_range(span.start..span.end, &token);
            pos = span.start + token.len();
        }
    }

    for (&env, &header) in THEOREM_ENVS.iter() {
        let mut pos = 0usize;
        while let Some(span) = find_environment(&out, env, pos) {
            if !span.closed {
                ctx.diag(
                    Diagnostic::warning(format!("unterminated {} environment", env))
                        .with_construct("theorem")
                        .at_offset(span.start),
                );
                break;
            }
            let mut body = span.body(&out).to_string();
            let mut title = String::new();
            let at = skip_ws(&body, 0);
            if body[at..].starts_with('[') {
                if let Some((t, next)) = read_opt_group(&body, at) {
                    title = t;
                    body = body[next..].to_string();
                }
            }
            let head = if title.is_empty() {
                format!("{}.", header)
            } else {
                format!("{} ({}).", header, title)
            };
            let fragment = format!(
                "<div class=\"prelax-theorem\"><span class=\"prelax-theorem-head\">{}</span> {}</div>",
                escape_html(&head),
                render_text(body.trim(), ctx)
            );
            let token = ctx.register(TokenKind::Block, fragment);
            out.replace_range(span.start..span.end, &token);
            pos = span.start + token.len();
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::sanitize::context::SanitizeOptions;
    use crate::features::math::FallbackMathRenderer;

    fn run<F>(input: &str, f: F) -> (String, Vec<String>)
    where
        F: Fn(&str, &mut SanitizeContext) -> String,
    {
        let opts = SanitizeOptions::default();
        let math = FallbackMathRenderer;
        let mut ctx = SanitizeContext::new(&opts, &math);
        let out = f(input, &mut ctx);
        let fragments: Vec<String> = ctx.blocks.into_values().collect();
        (out, fragments)
    }

    #[test]
    fn test_abstract() {
        let (out, fragments) = run(
            "\\begin{abstract}We study things.\\end{abstract}",
            extract_abstract,
        );
        assert!(!out.contains("abstract"));
        assert!(fragments[0].contains("<h4>Abstract</h4>"));
        assert!(fragments[0].contains("We study things."));
    }

    #[test]
    fn test_figure_with_caption() {
        let (out, fragments) = run(
            "\\begin{figure}\\centering\\includegraphics[width=\\linewidth]{model.png}\\caption{The model}\\end{figure}",
            extract_figures,
        );
        assert!(!out.contains("figure"));
        let html = &fragments[0];
        assert!(html.contains("Figure 1: The model"));
        assert!(html.contains("[Figure: model.png]"));
    }

    #[test]
    fn test_figure_with_equation_body() {
        let (out, fragments) = run(
            "\\begin{figure}\\begin{equation}E=mc^2\\end{equation}\\caption{Energy}\\end{figure}",
            extract_figures,
        );
        assert!(!out.contains("equation"));
        let html = &fragments[0];
        assert!(html.contains("prelax-math"));
        assert!(html.contains("E=mc^2"));
        assert!(!html.contains("\\begin{equation}"));
    }

    #[test]
    fn test_bare_includegraphics() {
        let (out, fragments) = run(r"see \includegraphics{x.pdf} here", extract_figures);
        assert!(out.contains("see "));
        assert!(fragments[0].contains("[Figure: x.pdf]"));
    }

    #[test]
    fn test_algorithm_keywords() {
        let (_, fragments) = run(
            "\\begin{algorithm}\\caption{Train}\\begin{algorithmic}[1]\\State $x \\gets 0$\\For{$i = 1..n$}\\State $x \\gets x + i$\\EndFor\\Return $x$\\end{algorithmic}\\end{algorithm}",
            extract_algorithms,
        );
        let html = &fragments[0];
        assert!(html.contains("Algorithm: Train"));
        assert!(html.contains("for i = 1..n:"));
        assert!(html.contains("end for"));
        assert!(html.contains("return x"));
    }

    #[test]
    fn test_fbox() {
        let (out, fragments) = run(r"\fbox{boxed text} after", extract_boxes);
        assert!(out.contains("after"));
        assert!(fragments[0].contains("prelax-box"));
        assert!(fragments[0].contains("boxed text"));
    }

    #[test]
    fn test_parbox_width_argument() {
        let (_, fragments) = run(r"\parbox{3cm}{narrow content}", extract_boxes);
        assert!(fragments[0].contains("narrow content"));
        assert!(!fragments[0].contains("3cm"));
    }

    #[test]
    fn test_quote_env() {
        let (_, fragments) = run(
            "\\begin{quote}To be or not.\\end{quote}",
            extract_quoted,
        );
        assert!(fragments[0].contains("<blockquote"));
    }

    #[test]
    fn test_theorem_with_title() {
        let (_, fragments) = run(
            "\\begin{theorem}[Convergence]The loss converges.\\end{theorem}",
            extract_quoted,
        );
        let html = &fragments[0];
        assert!(html.contains("Theorem (Convergence)."));
        assert!(html.contains("The loss converges."));
    }
}
