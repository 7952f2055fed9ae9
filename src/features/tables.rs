//! Table extraction
//!
//! Converts `tabular`-family environments into HTML table fragments. Runs
//! after math extraction, so cell tokenization never sees raw math
//! delimiters. Row and cell splitting is brace-depth-aware; the column
//! specification is consumed with a balanced scan because paragraph
//! columns (`p{3cm}`) nest braces.

use crate::core::sanitize::context::{SanitizeContext, TokenKind};
use crate::features::inline::render_text;
use crate::utils::diagnostics::Diagnostic;
use crate::utils::scan::{find_environment, read_group, read_opt_group, skip_ws, split_rows, split_top_level};

const TABULAR_ENVS: &[&str] = &["tabular", "tabularx", "longtable"];

/// Cell alignment from a column specification character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Alignment {
    #[default]
    Left,
    Center,
    Right,
}

impl Alignment {
    fn from_spec_char(c: char) -> Option<Self> {
        match c {
            'l' | 'p' | 'm' | 'b' | 'X' => Some(Alignment::Left),
            'c' => Some(Alignment::Center),
            'r' => Some(Alignment::Right),
            _ => None,
        }
    }

    fn css(&self) -> &'static str {
        match self {
            Alignment::Left => "left",
            Alignment::Center => "center",
            Alignment::Right => "right",
        }
    }
}

/// Parse a column specification like `|l|c p{3cm}|` into alignments.
pub fn parse_colspec(spec: &str) -> Vec<Alignment> {
    let mut cols = Vec::new();
    let mut i = 0usize;
    let bytes = spec.as_bytes();
    while i < bytes.len() {
        let c = bytes[i] as char;
        if let Some(alignment) = Alignment::from_spec_char(c) {
            cols.push(alignment);
            // Width argument of p/m/b columns nests braces
            let next = skip_ws(spec, i + 1);
            if spec[next..].starts_with('{') {
                match read_group(spec, next) {
                    Some((_, end)) => i = end,
                    None => i = spec.len(),
                }
                continue;
            }
            i += 1;
        } else if c == '@' || c == '!' {
            let next = skip_ws(spec, i + 1);
            match read_group(spec, next) {
                Some((_, end)) => i = end,
                None => i += 1,
            }
        } else {
            i += 1;
        }
    }
    cols
}

struct ParsedCell {
    html: String,
    colspan: usize,
    alignment: Option<Alignment>,
}

fn parse_cell(raw: &str, ctx: &mut SanitizeContext) -> ParsedCell {
    let trimmed = raw.trim();
    if let Some(rest) = trimmed.strip_prefix("\\multicolumn") {
        let at = skip_ws(rest, 0);
        if let Some((count, after_count)) = read_group(rest, at) {
            let at2 = skip_ws(rest, after_count);
            if let Some((spec, after_spec)) = read_group(rest, at2) {
                let at3 = skip_ws(rest, after_spec);
                if let Some((content, _)) = read_group(rest, at3) {
                    return ParsedCell {
                        html: render_text(&content, ctx),
                        colspan: count.trim().parse().unwrap_or(1),
                        alignment: spec
                            .chars()
                            .find_map(Alignment::from_spec_char),
                    };
                }
            }
        }
    }
    ParsedCell {
        html: render_text(trimmed, ctx),
        colspan: 1,
        alignment: None,
    }
}

/// Render one tabular body (column spec group included) to an HTML table.
pub fn render_tabular(body: &str, caption: Option<&str>, ctx: &mut SanitizeContext) -> Option<String> {
    let at = skip_ws(body, 0);
    // tabularx has a leading width argument before the column spec
    let (first, after_first) = read_group(body, at)?;
    let (colspec_raw, content_start) = {
        let next = skip_ws(body, after_first);
        if body[next..].starts_with('{') {
            let (second, after_second) = read_group(body, next)?;
            (second, after_second)
        } else {
            (first, after_first)
        }
    };

    let columns = parse_colspec(&colspec_raw);
    if columns.is_empty() {
        return None;
    }

    let mut content = body[content_start..].to_string();
    let has_rules = content.contains("\\hline")
        || content.contains("\\toprule")
        || content.contains("\\midrule");
    for rule in ["\\toprule", "\\midrule", "\\bottomrule", "\\hline"] {
        content = content.replace(rule, "");
    }

    let mut html = String::new();
    let class = if has_rules {
        "prelax-table prelax-table-ruled"
    } else {
        "prelax-table"
    };
    html.push_str(&format!("<table class=\"{}\">", class));

    for (row_index, row) in split_rows(&content).into_iter().enumerate() {
        if row.trim().is_empty() {
            continue;
        }
        // Only tables that draw rules marked a header row; an unruled
        // first row is ordinary data
        let tag = if row_index == 0 && has_rules { "th" } else { "td" };
        html.push_str("<tr>");
        for (cell_index, raw_cell) in split_top_level(&row, '&').into_iter().enumerate() {
            let cell = parse_cell(&raw_cell, ctx);
            let alignment = cell
                .alignment
                .or_else(|| columns.get(cell_index).copied())
                .unwrap_or_default();
            let colspan = if cell.colspan > 1 {
                format!(" colspan=\"{}\"", cell.colspan)
            } else {
                String::new()
            };
            html.push_str(&format!(
                "<{tag} style=\"text-align:{}\"{colspan}>{}</{tag}>",
                alignment.css(),
                cell.html,
            ));
        }
        html.push_str("</tr>");
    }
    html.push_str("</table>");

    if let Some(caption) = caption {
        let caption_html = render_text(caption, ctx);
        html = format!(
            "<figure class=\"prelax-table-figure\">{}<figcaption>Table: {}</figcaption></figure>",
            html, caption_html
        );
    }
    Some(html)
}

/// Extract a caption command from an environment body, returning the body
/// with the caption removed.
pub fn take_caption(body: &str) -> (String, Option<String>) {
    match body.find("\\caption") {
        None => (body.to_string(), None),
        Some(at) => {
            let mut next = at + "\\caption".len();
            // Skip the short-caption optional argument
            if body[next..].starts_with('[') {
                if let Some((_, end)) = read_opt_group(body, next) {
                    next = end;
                }
            }
            match read_group(body, skip_ws(body, next)) {
                Some((caption, end)) => {
                    let mut rest = body[..at].to_string();
                    rest.push_str(&body[end..]);
                    (rest, Some(caption))
                }
                None => (body.to_string(), None),
            }
        }
    }
}

/// Extract all tables (wrapped `table` environments first, then bare
/// tabular forms), replacing each with a block placeholder.
pub fn extract_tables(input: &str, ctx: &mut SanitizeContext) -> String {
    let mut out = input.to_string();

    // Float wrappers: pull caption, then render the inner tabular
    let mut pos = 0usize;
    while let Some(span) = find_environment(&out, "table", pos) {
        if !span.closed {
            ctx.diag(
                Diagnostic::warning("unterminated table environment")
                    .with_construct("table")
                    .at_offset(span.start),
            );
            break;
        }
        let (body, caption) = take_caption(span.body(&out));
        let fragment = render_wrapped_table(&body, caption.as_deref(), ctx);
        let token = ctx.register(TokenKind::Block, fragment);
        out.replace_range(span.start..span.end, &token);
        pos = span.start + token.len();
    }

    // Bare tabular environments outside any float
    for env in TABULAR_ENVS {
        let mut pos = 0usize;
        while let Some(span) = find_environment(&out, env, pos) {
            if !span.closed {
                ctx.diag(
                    Diagnostic::warning(format!("unterminated {} environment", env))
                        .with_construct("table")
                        .at_offset(span.start),
                );
                break;
            }
            let fragment = render_tabular(span.body(&out), None, ctx).unwrap_or_else(|| {
                ctx.diag(
                    Diagnostic::warning("table column specification could not be parsed")
                        .with_construct("table")
                        .at_offset(span.start),
                );
                "<div class=\"prelax-parse-failed\">[table could not be previewed]</div>"
                    .to_string()
            });
            let token = ctx.register(TokenKind::Block, fragment);
            out.replace_range(span.start..span.end, &token);
            pos = span.start + token.len();
        }
    }
    out
}

fn render_wrapped_table(body: &str, caption: Option<&str>, ctx: &mut SanitizeContext) -> String {
    for env in TABULAR_ENVS {
        if let Some(span) = find_environment(body, env, 0) {
            if span.closed {
                if let Some(html) = render_tabular(span.body(body), caption, ctx) {
                    return html;
                }
            }
        }
    }
    ctx.diag(Diagnostic::warning("table body could not be parsed").with_construct("table"));
    "<div class=\"prelax-parse-failed\">[table could not be previewed]</div>".to_string()
}
