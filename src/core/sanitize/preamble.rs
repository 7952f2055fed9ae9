//! Preamble rewriting
//!
//! Documents arrive with arbitrary preambles (package loads, custom macro
//! definitions, geometry tweaks) that the downstream renderer must never
//! see. The rewriter extracts the document metadata, drops the original
//! preamble entirely, and reinjects a minimal fixed one.

use crate::utils::scan::{read_group, skip_ws};

/// Metadata lifted from the original preamble.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentMeta {
    pub title: Option<String>,
    pub author: Option<String>,
    pub date: Option<String>,
}

/// Read the balanced argument of `\command{...}` anywhere in `input`.
fn read_command_arg(input: &str, command: &str) -> Option<String> {
    let at = input.find(command)?;
    let next = skip_ws(input, at + command.len());
    let (arg, _) = read_group(input, next)?;
    Some(arg.trim().to_string())
}

/// Remove every `\command{...}` occurrence from `input`.
fn strip_command(input: &str, command: &str) -> String {
    let mut out = input.to_string();
    while let Some(at) = out.find(command) {
        let next = skip_ws(&out, at + command.len());
        match read_group(&out, next) {
            Some((_, end)) => out.replace_range(at..end, ""),
            None => out.replace_range(at..at + command.len(), ""),
        }
    }
    out
}

/// Rewrite the document preamble.
///
/// Returns the body wrapped in a minimal fixed preamble, plus the extracted
/// metadata. Documents without `\begin{document}` are treated as bare
/// bodies. Multi-author `\and` separators become plain commas.
pub fn rewrite_preamble(input: &str) -> (String, DocumentMeta) {
    let (preamble, body) = match input.find("\\begin{document}") {
        Some(at) => {
            let body_start = at + "\\begin{document}".len();
            let body_end = input[body_start..]
                .find("\\end{document}")
                .map(|i| i + body_start)
                .unwrap_or(input.len());
            (&input[..at], &input[body_start..body_end])
        }
        None => ("", input),
    };

    let meta = DocumentMeta {
        title: read_command_arg(preamble, "\\title")
            .or_else(|| read_command_arg(body, "\\title")),
        author: read_command_arg(preamble, "\\author")
            .or_else(|| read_command_arg(body, "\\author"))
            .map(|a| {
                a.split("\\and")
                    .map(str::trim)
                    .collect::<Vec<_>>()
                    .join(", ")
            }),
        date: read_command_arg(preamble, "\\date")
            .or_else(|| read_command_arg(body, "\\date")),
    };

    // Metadata commands in the body would duplicate the reinjected ones
    let mut body = body.to_string();
    for command in ["\\title", "\\author", "\\date", "\\maketitle"] {
        body = if command == "\\maketitle" {
            body.replace(command, "")
        } else {
            strip_command(&body, command)
        };
    }

    let mut out = String::from("\\documentclass{article}\n");
    if let Some(title) = &meta.title {
        out.push_str(&format!("\\title{{{}}}\n", title));
    }
    if let Some(author) = &meta.author {
        out.push_str(&format!("\\author{{{}}}\n", author));
    }
    if let Some(date) = &meta.date {
        out.push_str(&format!("\\date{{{}}}\n", date));
    }
    out.push_str("\\begin{document}\n");
    if meta.title.is_some() {
        out.push_str("\\maketitle\n");
    }
    out.push_str(body.trim());
    out.push_str("\n\\end{document}\n");
    (out, meta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_preamble_is_replaced() {
        let input = "\\documentclass[11pt]{acmart}\\usepackage{weird}\\newcommand{\\x}{y}\\begin{document}Body.\\end{document}";
        let (out, meta) = rewrite_preamble(input);
        assert!(!out.contains("acmart"));
        assert!(!out.contains("usepackage"));
        assert!(out.contains("\\documentclass{article}"));
        assert!(out.contains("Body."));
        assert_eq!(meta, DocumentMeta::default());
    }

    #[test]
    fn test_metadata_extraction() {
        let input = "\\documentclass{article}\\title{A Study}\\author{A. One \\and B. Two}\\begin{document}\\maketitle text\\end{document}";
        let (out, meta) = rewrite_preamble(input);
        assert_eq!(meta.title.as_deref(), Some("A Study"));
        assert_eq!(meta.author.as_deref(), Some("A. One, B. Two"));
        assert!(out.contains("\\title{A Study}"));
        // Exactly one maketitle: the reinjected one
        assert_eq!(out.matches("\\maketitle").count(), 1);
    }

    #[test]
    fn test_bare_body_without_document_env() {
        let (out, _) = rewrite_preamble("Just a paragraph.");
        assert!(out.contains("Just a paragraph."));
        assert!(out.contains("\\begin{document}"));
    }

    #[test]
    fn test_missing_end_document() {
        let (out, _) = rewrite_preamble("\\begin{document}truncated body");
        assert!(out.contains("truncated body"));
        assert!(out.ends_with("\\end{document}\n"));
    }

    #[test]
    fn test_title_in_body() {
        let input = "\\begin{document}\\title{Late Title}\\maketitle rest\\end{document}";
        let (_, meta) = rewrite_preamble(input);
        assert_eq!(meta.title.as_deref(), Some("Late Title"));
    }
}
