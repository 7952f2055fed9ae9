//! Typeset-and-splice
//!
//! Runs the integrity gate on the reduced markup, hands it to a
//! [`MarkupRenderer`], then walks the output tree and splices each
//! placeholder token's pre-rendered fragment back in. Block fragments get a
//! measurable wrapper so the post-layout pass can shrink overflowing ones;
//! a wrapper element holding nothing but one block token is replaced
//! wholesale, since a block element inside `<p>` is not valid output.

pub mod layout;
pub mod renderer;
pub mod tree;

use fxhash::FxHashMap;

use crate::core::sanitize::context::{TOKEN_OPEN, TOKEN_RE};
use crate::core::sanitize::{DocumentMeta, SanitizedDocument};
use crate::utils::diagnostics::Diagnostic;
use crate::utils::error::{PreviewError, PreviewResult};

pub use layout::{Measurer, PostLayout};
pub use renderer::{MarkupRenderer, PlainRenderer, RenderError};
pub use tree::{Node, NodeId, NodeKind, OutputTree};

/// Fully rendered preview document.
#[derive(Debug)]
pub struct RenderedDocument {
    pub tree: OutputTree,
    pub meta: DocumentMeta,
    pub diagnostics: Vec<Diagnostic>,
}

impl RenderedDocument {
    pub fn to_html(&self) -> String {
        self.tree.to_html()
    }
}

/// True when a fragment must live in its own measurable block wrapper.
fn is_block_fragment(kind: &str, fragment: &str) -> bool {
    match kind {
        "MATH" => fragment.starts_with("<div"),
        _ => true,
    }
}

fn wrap_block(tree: &mut OutputTree, fragment: &str) -> NodeId {
    let wrapper = tree.new_element("div");
    tree.set_attr(wrapper, "class", "prelax-block");
    let raw = tree.new_raw(fragment);
    tree.append(wrapper, raw);
    wrapper
}

/// Splice block-table fragments into the tree at their tokens.
///
/// Spliced entries leave the table; tokens without an entry stay visible as
/// text and produce a diagnostic rather than silently vanishing.
fn splice_tokens(
    tree: &mut OutputTree,
    blocks: &mut FxHashMap<String, String>,
    diagnostics: &mut Vec<Diagnostic>,
) {
    for id in tree.text_node_ids() {
        let text = match &tree.node(id).kind {
            NodeKind::Text(t) => t.clone(),
            _ => continue,
        };
        if !text.contains(TOKEN_OPEN) {
            continue;
        }

        // Node surgery: a wrapper element whose sole content is one block
        // token is replaced by the block itself, whatever the renderer
        // chose to wrap paragraphs in
        let trimmed = text.trim();
        let sole_token = TOKEN_RE
            .find(trimmed)
            .map(|m| m.start() == 0 && m.end() == trimmed.len())
            .unwrap_or(false);
        if sole_token {
            let parent = tree.node(id).parent;
            let parent_has_sole_child = parent
                .map(|p| match &tree.node(p).kind {
                    NodeKind::Element { .. } => tree.node(p).children.len() == 1,
                    _ => false,
                })
                .unwrap_or(false);
            let caps = TOKEN_RE.captures(trimmed).map(|c| c[1].to_string());
            if let (Some(fragment), Some(kind)) = (blocks.remove(trimmed), caps) {
                if is_block_fragment(&kind, &fragment) && parent_has_sole_child {
                    let wrapper = wrap_block(tree, &fragment);
                    let p = tree.node(id).parent.unwrap_or(id);
                    tree.replace(p, wrapper);
                } else if is_block_fragment(&kind, &fragment) {
                    let wrapper = wrap_block(tree, &fragment);
                    tree.replace(id, wrapper);
                } else {
                    let raw = tree.new_raw(&fragment);
                    tree.replace(id, raw);
                }
                continue;
            }
        }

        // Mixed content: split the text node into text and fragment pieces
        let mut sequence: Vec<NodeId> = Vec::new();
        let mut last = 0usize;
        let mut missing = 0usize;
        let spans: Vec<(usize, usize, String, String)> = TOKEN_RE
            .captures_iter(&text)
            .map(|c| {
                let whole = c.get(0).unwrap();
                (
                    whole.start(),
                    whole.end(),
                    whole.as_str().to_string(),
                    c[1].to_string(),
                )
            })
            .collect();
        for (start, end, token, kind) in spans {
            if start > last {
                let t = tree.new_text(&text[last..start]);
                sequence.push(t);
            }
            match blocks.remove(&token) {
                Some(fragment) => {
                    let node = if is_block_fragment(&kind, &fragment) {
                        wrap_block(tree, &fragment)
                    } else {
                        tree.new_raw(&fragment)
                    };
                    sequence.push(node);
                }
                None => {
                    missing += 1;
                    let t = tree.new_text(&token);
                    sequence.push(t);
                }
            }
            last = end;
        }
        if last < text.len() {
            let t = tree.new_text(&text[last..]);
            sequence.push(t);
        }
        if missing > 0 {
            diagnostics.push(
                Diagnostic::warning(format!(
                    "{} placeholder token(s) had no block-table entry",
                    missing
                ))
                .with_construct("splice"),
            );
        }
        tree.replace_with_sequence(id, &sequence);
    }
}

/// Render the reduced markup and splice every extracted fragment back in.
pub fn render_and_splice(
    doc: SanitizedDocument,
    renderer: &dyn MarkupRenderer,
) -> PreviewResult<RenderedDocument> {
    let SanitizedDocument {
        reduced,
        mut blocks,
        bibliography,
        meta,
        mut diagnostics,
        balance_tolerance,
    } = doc;

    // Integrity gate: a clearly truncated document renders as a misleading
    // half-preview, so refuse it here instead
    crate::core::sanitize::gatekeeper::check_balance(&reduced, balance_tolerance)?;

    let mut tree = renderer
        .render(&reduced)
        .map_err(|e| PreviewError::render(e.message))?;
    tree.normalize_text();

    splice_tokens(&mut tree, &mut blocks, &mut diagnostics);

    if !blocks.is_empty() {
        diagnostics.push(
            Diagnostic::warning(format!(
                "{} extracted fragment(s) never appeared in the rendered output",
                blocks.len()
            ))
            .with_construct("splice"),
        );
    }

    if let Some(bibliography) = bibliography {
        let root = tree.root();
        let heading = tree.new_element("h2");
        let label = tree.new_text("References");
        tree.append(heading, label);
        tree.append(root, heading);
        let section = wrap_block(&mut tree, &bibliography);
        tree.append(root, section);
    }

    Ok(RenderedDocument {
        tree,
        meta,
        diagnostics,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::sanitize::sanitize;

    fn render(input: &str) -> RenderedDocument {
        render_and_splice(sanitize(input), &PlainRenderer).unwrap()
    }

    #[test]
    fn test_lone_block_token_replaces_paragraph() {
        let out = render("\\begin{itemize}\\item a\\item b\\end{itemize}");
        let html = out.to_html();
        assert!(html.contains("prelax-block"));
        assert!(html.contains("<li>a</li>"));
        // The wrapping <p> the renderer made is gone
        assert!(!html.contains("<p><div"));
    }

    #[test]
    fn test_inline_math_splices_inside_paragraph() {
        let out = render("value $x+y$ matters");
        let html = out.to_html();
        assert!(html.contains("<p>"));
        assert!(html.contains("prelax-math"));
        assert!(html.contains("x+y"));
        assert!(!html.contains('\u{E000}'));
    }

    #[test]
    fn test_bibliography_appended_last() {
        let out = render(
            r"\cite{a} text\begin{thebibliography}{9}\bibitem{a} Paper A.\end{thebibliography}",
        );
        let html = out.to_html();
        let refs = html.find("References").unwrap();
        let body = html.find("[1]").unwrap();
        assert!(body < refs);
        assert!(html.contains("prelax-bibliography"));
    }

    #[test]
    fn test_renderer_failure_maps_to_render_error() {
        struct Failing;
        impl MarkupRenderer for Failing {
            fn render(&self, _: &str) -> Result<OutputTree, RenderError> {
                Err(RenderError::new("engine unavailable"))
            }
        }
        let err = render_and_splice(sanitize("plain"), &Failing).unwrap_err();
        assert!(matches!(err, PreviewError::Render { .. }));
    }

    #[test]
    fn test_truncated_document_refused_at_render() {
        // Unknown environments survive extraction, so their imbalance is
        // still visible in the reduced markup
        let input = r"\begin{center}\begin{flushleft}\begin{minipage}\begin{spacing}";
        let err = render_and_splice(sanitize(input), &PlainRenderer).unwrap_err();
        assert!(matches!(err, PreviewError::Integrity { .. }));
    }

    #[test]
    fn test_lone_token_surgery_works_for_any_wrapper_tag() {
        // Wraps each paragraph in <section> instead of <p>
        struct SectionRenderer;
        impl MarkupRenderer for SectionRenderer {
            fn render(&self, reduced: &str) -> Result<OutputTree, RenderError> {
                let mut tree = OutputTree::new("div");
                let root = tree.root();
                let token = TOKEN_RE
                    .find(reduced)
                    .ok_or_else(|| RenderError::new("no token"))?;
                let section = tree.new_element("section");
                let text = tree.new_text(token.as_str());
                tree.append(section, text);
                tree.append(root, section);
                Ok(tree)
            }
        }
        let doc = sanitize("\\begin{itemize}\\item a\\end{itemize}");
        let out = render_and_splice(doc, &SectionRenderer).unwrap();
        let html = out.to_html();
        assert!(html.contains("prelax-block"));
        assert!(!html.contains("<section>"));
    }

    #[test]
    fn test_no_tokens_leak_into_html() {
        let out = render(
            "\\section{S}\n\n$a$ and \\begin{quote}q\\end{quote}\n\n\\begin{verbatim}\ncode\n\\end{verbatim}",
        );
        let html = out.to_html();
        assert!(!html.contains('\u{E000}'));
        assert!(!html.contains('\u{E001}'));
    }
}
