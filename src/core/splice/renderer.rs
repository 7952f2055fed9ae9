//! Markup renderer boundary
//!
//! The splicer does not care who typesets the reduced markup; it only needs
//! an [`OutputTree`] with the placeholder tokens surviving as text. The
//! built-in [`PlainRenderer`] covers the sectioning-and-paragraphs subset
//! the sanitizer emits and serves tests, the CLI, and engine-less hosts.

use crate::core::sanitize::context::{TOKEN_OPEN, TOKEN_RE};
use crate::core::splice::tree::{NodeId, OutputTree};
use crate::features::inline::normalize_inline;
use crate::utils::scan::{read_group, skip_ws};
use std::fmt;

/// Error from an external markup renderer.
#[derive(Debug, Clone)]
pub struct RenderError {
    pub message: String,
}

impl RenderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for RenderError {}

/// External document renderer boundary.
///
/// Implementations must pass placeholder tokens through unchanged as text;
/// the sanitizer guarantees tokens are plain private-use-plane character
/// runs, so any text-preserving renderer satisfies this for free.
pub trait MarkupRenderer {
    fn render(&self, reduced: &str) -> Result<OutputTree, RenderError>;
}

/// Built-in renderer for the reduced markup subset.
pub struct PlainRenderer;

impl PlainRenderer {
    /// Append paragraph content, keeping tokens in their own text nodes so
    /// the splicer finds them without scanning raw HTML.
    fn append_inline(&self, tree: &mut OutputTree, parent: NodeId, content: &str) {
        if !content.contains(TOKEN_OPEN) {
            let raw = tree.new_raw(&normalize_inline(content));
            tree.append(parent, raw);
            return;
        }
        let mut last = 0usize;
        let spans: Vec<(usize, usize)> = TOKEN_RE
            .find_iter(content)
            .map(|m| (m.start(), m.end()))
            .collect();
        for (start, end) in spans {
            if start > last {
                let raw = tree.new_raw(&normalize_inline(&content[last..start]));
                tree.append(parent, raw);
            }
            let text = tree.new_text(&content[start..end]);
            tree.append(parent, text);
            last = end;
        }
        if last < content.len() {
            let raw = tree.new_raw(&normalize_inline(&content[last..]));
            tree.append(parent, raw);
        }
    }

    fn append_heading(&self, tree: &mut OutputTree, tag: &str, content: &str) {
        let root = tree.root();
        let heading = tree.new_element(tag);
        // Headings can carry math tokens too
        self.append_inline(tree, heading, content);
        tree.append(root, heading);
    }
}

/// Sectioning commands and their heading levels.
const SECTIONS: &[(&str, &str)] = &[
    ("\\subsubsection", "h4"),
    ("\\subsection", "h3"),
    ("\\section", "h2"),
];

impl MarkupRenderer for PlainRenderer {
    fn render(&self, reduced: &str) -> Result<OutputTree, RenderError> {
        let mut tree = OutputTree::new("div");
        let root = tree.root();
        tree.set_attr(root, "class", "prelax-document");

        // Header metadata from the reinjected preamble
        let mut title = None;
        let mut author = None;
        let mut date = None;
        for (command, slot) in [
            ("\\title", &mut title),
            ("\\author", &mut author),
            ("\\date", &mut date),
        ] {
            if let Some(at) = reduced.find(command) {
                let next = skip_ws(reduced, at + command.len());
                if let Some((arg, _)) = read_group(reduced, next) {
                    *slot = Some(arg);
                }
            }
        }

        let body = match reduced.find("\\begin{document}") {
            Some(at) => {
                let start = at + "\\begin{document}".len();
                let end = reduced[start..]
                    .find("\\end{document}")
                    .map(|i| i + start)
                    .unwrap_or(reduced.len());
                &reduced[start..end]
            }
            None => reduced,
        };

        let mut body = body.to_string();
        if let Some(at) = body.find("\\maketitle") {
            body.replace_range(at..at + "\\maketitle".len(), "");
            let header = tree.new_element("header");
            tree.set_attr(header, "class", "prelax-header");
            if let Some(title) = &title {
                let h1 = tree.new_element("h1");
                let raw = tree.new_raw(&normalize_inline(title));
                tree.append(h1, raw);
                tree.append(header, h1);
            }
            for (value, class) in [(&author, "prelax-authors"), (&date, "prelax-date")] {
                if let Some(value) = value {
                    let line = tree.new_element("div");
                    tree.set_attr(line, "class", class);
                    let raw = tree.new_raw(&normalize_inline(value));
                    tree.append(line, raw);
                    tree.append(header, line);
                }
            }
            tree.append(root, header);
        }

        for paragraph in body.split("\n\n") {
            let mut rest = paragraph.trim();
            if rest.is_empty() {
                continue;
            }
            // Leading sectioning commands become headings; the remainder of
            // the paragraph flows on as body text
            'headings: loop {
                for (command, tag) in SECTIONS {
                    if let Some(stripped) = rest.strip_prefix(command) {
                        let stripped = stripped.strip_prefix('*').unwrap_or(stripped);
                        let at = skip_ws(stripped, 0);
                        if let Some((content, end)) = read_group(stripped, at) {
                            self.append_heading(&mut tree, tag, &content);
                            rest = stripped[end..].trim_start();
                            continue 'headings;
                        }
                    }
                }
                break;
            }
            if rest.is_empty() {
                continue;
            }
            let p = tree.new_element("p");
            self.append_inline(&mut tree, p, rest);
            tree.append(root, p);
        }

        Ok(tree)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::sanitize::context::{TOKEN_CLOSE, TOKEN_OPEN};
    use crate::core::splice::tree::NodeKind;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_sections_become_headings() {
        let tree = PlainRenderer
            .render("\\section{Intro}\n\nBody text.\n\n\\subsection{Detail}\n\nMore.")
            .unwrap();
        let html = tree.to_html();
        assert!(html.contains("<h2>Intro</h2>"));
        assert!(html.contains("<h3>Detail</h3>"));
        assert!(html.contains("<p>Body text.</p>"));
    }

    #[test]
    fn test_tokens_live_in_text_nodes() {
        let token = format!("{}BLK1{}", TOKEN_OPEN, TOKEN_CLOSE);
        let tree = PlainRenderer
            .render(&format!("before {} after", token))
            .unwrap();
        let text_ids = tree.text_node_ids();
        assert_eq!(text_ids.len(), 1);
        match &tree.node(text_ids[0]).kind {
            NodeKind::Text(t) => assert_eq!(t, &token),
            other => panic!("unexpected node: {:?}", other),
        }
    }

    #[test]
    fn test_maketitle_header() {
        let tree = PlainRenderer
            .render("\\title{T}\\author{A}\\begin{document}\\maketitle body\\end{document}")
            .unwrap();
        let html = tree.to_html();
        assert!(html.contains("<h1>T</h1>"));
        assert!(html.contains("prelax-authors"));
        assert!(html.contains("body"));
    }

    #[test]
    fn test_inline_formatting_in_paragraphs() {
        let tree = PlainRenderer.render(r"some \textbf{bold} text").unwrap();
        assert!(tree.to_html().contains("<b>bold</b>"));
    }

    #[test]
    fn test_starred_section() {
        let tree = PlainRenderer.render("\\section*{Unnumbered}").unwrap();
        assert!(tree.to_html().contains("<h2>Unnumbered</h2>"));
    }
}
