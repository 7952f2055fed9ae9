//! Inline formatting normalizer
//!
//! Converts the restricted inline command set (bold/italic/underline/
//! monospace/symbols/typographic dashes and quotes) into safe inline HTML.
//! Inline math is protected: [`render_text`] segments the input on math
//! spans and placeholder tokens before the character-level normalizer ever
//! sees it, so math bodies are never mangled by quote or dash substitution.

use crate::core::sanitize::context::{SanitizeContext, TOKEN_OPEN, TOKEN_RE};
use crate::data::symbols::{ESCAPED_SPECIALS, TEXT_SYMBOLS};
use crate::utils::scan::read_group;

/// Escape a string for HTML text content.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// Escape a string for an HTML attribute value.
pub fn escape_attr(input: &str) -> String {
    escape_html(input)
}

fn format_tag(command: &str) -> Option<(&'static str, &'static str)> {
    match command {
        "textbf" | "bf" => Some(("<b>", "</b>")),
        "textit" | "emph" | "it" => Some(("<i>", "</i>")),
        "underline" | "uline" => Some(("<u>", "</u>")),
        "texttt" | "tt" => Some(("<code>", "</code>")),
        "textsc" => Some((
            "<span style=\"font-variant:small-caps\">",
            "</span>",
        )),
        "textsuperscript" => Some(("<sup>", "</sup>")),
        "textsubscript" => Some(("<sub>", "</sub>")),
        _ => None,
    }
}

/// Normalize plain inline markup to safe HTML.
///
/// Pure text-level pass: no placeholder or math handling (see
/// [`render_text`]). Unknown commands degrade by keeping their argument
/// text and dropping the command itself.
pub fn normalize_inline(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let bytes = input.as_bytes();
    let mut i = 0usize;

    while i < bytes.len() {
        let rest = &input[i..];
        let c = rest.chars().next().unwrap();

        match c {
            '\\' => {
                let after = &input[i + 1..];
                let first = after.chars().next();
                match first {
                    Some(f) if f.is_ascii_alphabetic() => {
                        let name_len = after
                            .find(|ch: char| !ch.is_ascii_alphabetic())
                            .unwrap_or(after.len());
                        let name = &after[..name_len];
                        let mut next = i + 1 + name_len;
                        // Swallow the starred variant marker
                        if input[next..].starts_with('*') {
                            next += 1;
                        }
                        if let Some((open, close)) = format_tag(name) {
                            if let Some((inner, end)) = read_group(input, skip_spaces(input, next))
                            {
                                out.push_str(open);
                                out.push_str(&normalize_inline(&inner));
                                out.push_str(close);
                                i = end;
                                continue;
                            }
                        }
                        if let Some(replacement) = TEXT_SYMBOLS.get(name) {
                            out.push_str(replacement);
                            // Swallow an empty argument group like \LaTeX{}
                            if input[next..].starts_with("{}") {
                                next += 2;
                            }
                            i = next;
                            continue;
                        }
                        if name == "ref" || name == "eqref" || name == "autoref" {
                            if let Some((_, end)) = read_group(input, skip_spaces(input, next)) {
                                out.push('§');
                                i = end;
                                continue;
                            }
                        }
                        if name == "footnote" {
                            if let Some((inner, end)) = read_group(input, skip_spaces(input, next))
                            {
                                out.push_str("<sup class=\"prelax-footnote\">(");
                                out.push_str(&normalize_inline(&inner));
                                out.push_str(")</sup>");
                                i = end;
                                continue;
                            }
                        }
                        // Unknown command: keep the argument text, drop the command
                        if let Some((inner, end)) = read_group(input, skip_spaces(input, next)) {
                            out.push_str(&normalize_inline(&inner));
                            i = end;
                        } else {
                            i = next;
                        }
                        continue;
                    }
                    Some(f) => {
                        if let Some(replacement) = ESCAPED_SPECIALS.get(&f) {
                            out.push_str(replacement);
                        } else if f == '\\' {
                            out.push_str("<br>");
                        }
                        i += 1 + f.len_utf8();
                        continue;
                    }
                    None => {
                        i += 1;
                        continue;
                    }
                }
            }
            '-' if rest.starts_with("---") => {
                out.push('—');
                i += 3;
            }
            '-' if rest.starts_with("--") => {
                out.push('–');
                i += 2;
            }
            '`' if rest.starts_with("``") => {
                out.push('“');
                i += 2;
            }
            '`' => {
                out.push('‘');
                i += 1;
            }
            '\'' if rest.starts_with("''") => {
                out.push('”');
                i += 2;
            }
            '~' => {
                out.push_str("&nbsp;");
                i += 1;
            }
            '{' | '}' => {
                // Bare grouping braces carry no meaning in the preview
                i += 1;
            }
            '&' => {
                out.push_str("&amp;");
                i += 1;
            }
            '<' => {
                out.push_str("&lt;");
                i += 1;
            }
            '>' => {
                out.push_str("&gt;");
                i += 1;
            }
            _ => {
                out.push(c);
                i += c.len_utf8();
            }
        }
    }
    out
}

fn skip_spaces(input: &str, at: usize) -> usize {
    input[at..]
        .char_indices()
        .find(|(_, c)| !matches!(c, ' ' | '\t'))
        .map(|(off, _)| at + off)
        .unwrap_or(input.len())
}

/// Render mixed inline content (used for table cells, list items, captions,
/// bibliography entries) to safe HTML.
///
/// Segments the input into placeholder tokens, inline math spans, and plain
/// runs. Tokens are inlined from the block table, math goes through the
/// adapter, plain runs through [`normalize_inline`].
pub fn render_text(input: &str, ctx: &mut SanitizeContext) -> String {
    let mut out = String::with_capacity(input.len());
    for segment in segment_tokens(input) {
        match segment {
            Segment::Token(token) => {
                out.push_str(&ctx.resolve_tokens(&token));
            }
            Segment::Plain(text) => {
                out.push_str(&render_plain_with_math(&text, ctx));
            }
        }
    }
    out
}

enum Segment {
    Token(String),
    Plain(String),
}

fn segment_tokens(input: &str) -> Vec<Segment> {
    if !input.contains(TOKEN_OPEN) {
        return vec![Segment::Plain(input.to_string())];
    }
    let mut segments = Vec::new();
    let mut last = 0usize;
    for m in TOKEN_RE.find_iter(input) {
        if m.start() > last {
            segments.push(Segment::Plain(input[last..m.start()].to_string()));
        }
        segments.push(Segment::Token(m.as_str().to_string()));
        last = m.end();
    }
    if last < input.len() {
        segments.push(Segment::Plain(input[last..].to_string()));
    }
    segments
}

/// Render a plain run, protecting `$...$` and `\(...\)` math spans.
fn render_plain_with_math(input: &str, ctx: &mut SanitizeContext) -> String {
    let mut out = String::with_capacity(input.len());
    let mut plain = String::new();
    let bytes = input.as_bytes();
    let mut i = 0usize;

    while i < bytes.len() {
        let rest = &input[i..];
        if rest.starts_with("\\$") {
            plain.push('$');
            i += 2;
            continue;
        }
        if rest.starts_with("\\(") {
            if let Some(close) = input[i + 2..].find("\\)") {
                out.push_str(&normalize_inline(&plain));
                plain.clear();
                out.push_str(&ctx.render_math(&input[i + 2..i + 2 + close], false));
                i += 2 + close + 2;
                continue;
            }
        }
        if rest.starts_with('$') && !rest.starts_with("$$") {
            if let Some(close) = find_dollar_close(input, i + 1) {
                out.push_str(&normalize_inline(&plain));
                plain.clear();
                out.push_str(&ctx.render_math(&input[i + 1..close], false));
                i = close + 1;
                continue;
            }
        }
        let c = rest.chars().next().unwrap();
        if c == '\\' {
            // Keep escape pairs intact for the normalizer
            plain.push(c);
            if let Some(n) = rest.chars().nth(1) {
                plain.push(n);
                i += 1 + n.len_utf8();
                continue;
            }
        } else {
            plain.push(c);
        }
        i += c.len_utf8();
    }
    out.push_str(&normalize_inline(&plain));
    out
}

fn find_dollar_close(input: &str, from: usize) -> Option<usize> {
    let mut i = from;
    let bytes = input.as_bytes();
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'$' => return Some(i),
            _ => i += 1,
        }
    }
    None
}

/// Strip command names and grouping braces, keeping argument text.
///
/// Used by the diagram heuristic to estimate visible label length.
pub fn strip_macros(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                while let Some(&n) = chars.peek() {
                    if n.is_ascii_alphabetic() {
                        chars.next();
                    } else {
                        break;
                    }
                }
            }
            '{' | '}' | '$' => {}
            _ => out.push(c),
        }
    }
    out
}
