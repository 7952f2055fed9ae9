//! Bibliography extraction and citation resolution
//!
//! Strictly two-pass: pass 1 walks every `\bibitem` declaration and assigns
//! sequential 1-based labels in first-seen order; pass 2 rewrites citation
//! references against the completed map. Resolving citations before the map
//! is complete would mislabel forward references, so the order is part of
//! the contract.

use crate::core::sanitize::context::SanitizeContext;
use crate::features::inline::render_text;
use crate::utils::diagnostics::Diagnostic;
use crate::utils::scan::{find_environment, read_group, read_opt_group, skip_ws};
use indexmap::IndexMap;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref BIBITEM_RE: Regex = Regex::new(r"\\bibitem\b").unwrap();
    static ref CITE_RE: Regex = Regex::new(r"\\(?:cite|citep|citet)\b").unwrap();
    static ref BIB_COMMANDS_RE: Regex =
        Regex::new(r"\\(?:bibliographystyle|bibliography)\s*\{[^}]*\}").unwrap();
}

/// One parsed bibliography entry.
#[derive(Debug, Clone)]
struct BibEntry {
    key: String,
    text: String,
}

/// Pass 1: collect `\bibitem` entries in first-seen order.
fn collect_entries(input: &str) -> Vec<BibEntry> {
    let mut entries = Vec::new();
    let starts: Vec<usize> = BIBITEM_RE.find_iter(input).map(|m| m.start()).collect();

    for (idx, &start) in starts.iter().enumerate() {
        let mut at = start + "\\bibitem".len();
        // Skip a custom-label optional argument
        if input[at..].starts_with('[') {
            match read_opt_group(input, at) {
                Some((_, next)) => at = next,
                None => continue,
            }
        }
        let (key, after_key) = match read_group(input, skip_ws(input, at)) {
            Some(parsed) => parsed,
            None => continue,
        };
        let text_end = starts
            .get(idx + 1)
            .copied()
            .unwrap_or_else(|| {
                input[after_key..]
                    .find("\\end{thebibliography}")
                    .map(|i| i + after_key)
                    .unwrap_or(input.len())
            });
        entries.push(BibEntry {
            key: key.trim().to_string(),
            text: input[after_key..text_end].trim().to_string(),
        });
    }
    entries
}

fn render_bibliography(
    entries: &[BibEntry],
    map: &IndexMap<String, usize>,
    ctx: &mut SanitizeContext,
) -> String {
    let mut html = String::from("<ol class=\"prelax-bibliography\">");
    for entry in entries {
        let label = map.get(&entry.key).copied().unwrap_or(0);
        let text = render_text(&entry.text, ctx);
        html.push_str(&format!("<li value=\"{}\">{}</li>", label, text));
    }
    html.push_str("</ol>");
    html
}

/// Pass 2: rewrite citation references against the completed map.
fn rewrite_citations(input: &str, map: &IndexMap<String, usize>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut last = 0usize;

    for m in CITE_RE.find_iter(input) {
        out.push_str(&input[last..m.start()]);
        let mut at = m.end();
        // \citep[see][p. 4]{key} carries up to two optional arguments
        for _ in 0..2 {
            if input[at..].starts_with('[') {
                match read_opt_group(input, at) {
                    Some((_, next)) => at = next,
                    None => break,
                }
            }
        }
        match read_group(input, skip_ws(input, at)) {
            Some((keys, end)) => {
                let labels: Vec<String> = keys
                    .split(',')
                    .map(|k| match map.get(k.trim()) {
                        Some(label) => label.to_string(),
                        None => "?".to_string(),
                    })
                    .collect();
                out.push_str(&format!("[{}]", labels.join(", ")));
                last = end;
            }
            None => {
                // Malformed citation: keep the command text visible
                out.push_str(m.as_str());
                last = m.end();
            }
        }
    }
    out.push_str(&input[last..]);
    out
}

/// Resolve all citations and extract the bibliography.
///
/// Returns the rewritten markup and the rendered bibliography fragment
/// (None when the document has no bibliography entries).
pub fn resolve_citations(
    input: &str,
    ctx: &mut SanitizeContext,
) -> (String, Option<String>) {
    // Pass 1: build the citation map in first-seen bibitem order
    let entries = collect_entries(input);
    let mut map: IndexMap<String, usize> = IndexMap::new();
    for entry in &entries {
        let next_label = map.len() + 1;
        map.entry(entry.key.clone()).or_insert(next_label);
    }

    // Remove the bibliography source from the markup
    let mut out = input.to_string();
    if let Some(span) = find_environment(&out, "thebibliography", 0) {
        if !span.closed {
            ctx.diag(
                Diagnostic::warning("unterminated thebibliography environment")
                    .with_construct("bibliography")
                    .at_offset(span.start),
            );
        }
        out.replace_range(span.start..span.end, "");
    } else if let Some(first) = BIBITEM_RE.find(&out).map(|m| m.start()) {
        // Bare bibitem run without the wrapper (truncated scaffolding)
        out.truncate(first);
    }
    out = BIB_COMMANDS_RE.replace_all(&out, "").into_owned();

    // Pass 2 runs only after the map is complete
    let out = rewrite_citations(&out, &map);

    let bibliography = if entries.is_empty() {
        None
    } else {
        Some(render_bibliography(&entries, &map, ctx))
    };
    (out, bibliography)
}
