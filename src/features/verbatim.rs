//! Code and verbatim extraction
//!
//! Runs before math extraction so math-looking delimiters inside code are
//! never treated as math. Bodies stay byte-for-byte literal, HTML-escaped.

use crate::core::sanitize::context::{SanitizeContext, TokenKind};
use crate::data::constants::VERBATIM_ENVS;
use crate::features::inline::escape_html;
use crate::utils::diagnostics::Diagnostic;
use crate::utils::scan::{find_environment, read_opt_group};

/// Extract verbatim-like environments and inline `\verb` spans.
pub fn extract_verbatim(input: &str, ctx: &mut SanitizeContext) -> String {
    let mut out = input.to_string();

    for env in VERBATIM_ENVS {
        let mut pos = 0usize;
        while let Some(span) = find_environment(&out, env, pos) {
            let (fragment, end) = if span.closed {
                (render_code_block(span.body(&out), env), span.end)
            } else {
                ctx.diag(
                    Diagnostic::warning(format!("unterminated {} environment", env))
                        .with_construct("code")
                        .at_offset(span.start),
                );
                (
                    "<div class=\"prelax-parse-failed\">[code block could not be previewed]</div>"
                        .to_string(),
                    out.len(),
                )
            };
            let token = ctx.register(TokenKind::Block, fragment);
            out.replace_range(span.start..end, &token);
            pos = span.start + token.len();
        }
    }

    extract_inline_verb(&out, ctx)
}

fn render_code_block(body: &str, env: &str) -> String {
    let mut code = body;
    let mut language = None;

    // lstlisting/minted carry option or language arguments after \begin
    if env.starts_with("lstlisting") || env.starts_with("Verbatim") {
        if let Some((opts, next)) = read_opt_group(code, skip_leading_ws(code)) {
            language = opts
                .split(',')
                .find_map(|kv| kv.trim().strip_prefix("language=").map(str::to_string));
            code = &code[next..];
        }
    } else if env.starts_with("minted") {
        let at = skip_leading_ws(code);
        if code[at..].starts_with('{') {
            if let Some(close) = code[at..].find('}') {
                language = Some(code[at + 1..at + close].to_string());
                code = &code[at + close + 1..];
            }
        }
    }

    let lang_attr = language
        .map(|l| format!(" data-language=\"{}\"", escape_html(&l)))
        .unwrap_or_default();
    format!(
        "<pre class=\"prelax-code\"{}><code>{}</code></pre>",
        lang_attr,
        escape_html(code.trim_matches('\n'))
    )
}

fn skip_leading_ws(s: &str) -> usize {
    s.char_indices()
        .find(|(_, c)| !c.is_whitespace())
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

/// Extract `\verb<delim>...<delim>` spans into inline code fragments.
fn extract_inline_verb(input: &str, ctx: &mut SanitizeContext) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(at) = rest.find("\\verb") {
        let after = &rest[at + 5..];
        let mut chars = after.chars();
        match chars.next() {
            Some(delim) if !delim.is_ascii_alphabetic() && !delim.is_whitespace() => {
                match after[delim.len_utf8()..].find(delim) {
                    Some(len) => {
                        let content = &after[delim.len_utf8()..delim.len_utf8() + len];
                        out.push_str(&rest[..at]);
                        let fragment = format!("<code>{}</code>", escape_html(content));
                        let token = ctx.register(TokenKind::Block, fragment);
                        out.push_str(&token);
                        rest = &after[delim.len_utf8() + len + delim.len_utf8()..];
                    }
                    None => {
                        ctx.diag(
                            Diagnostic::warning("unterminated \\verb span")
                                .with_construct("code"),
                        );
                        out.push_str(&rest[..at + 5]);
                        rest = after;
                    }
                }
            }
            _ => {
                out.push_str(&rest[..at + 5]);
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}
