//! Balanced scanning primitives
//!
//! Every construct whose argument may contain nested brace/bracket pairs
//! (diagram option lists, box width arguments, table column specifications)
//! is consumed with an explicit depth counter, never a bare regex. Quoted
//! substrings are opaque and escaped delimiters are literal. A fixed cap on
//! delimiter events guards against runaway scans on unbalanced input.

/// Maximum delimiter events processed by a single balanced scan. On cap
/// exhaustion the scan gives up and the caller leaves the construct
/// unextracted.
pub const MAX_SCAN_STEPS: usize = 500;

/// Find the byte index of the delimiter matching `open` at `open_at`.
///
/// `input[open_at]` must be `open`. Returns `None` when the input ends (or
/// the step cap is reached) before the matching `close` is seen.
pub fn find_balanced(input: &str, open_at: usize, open: char, close: char) -> Option<usize> {
    let bytes = input.as_bytes();
    if open_at >= bytes.len() || !input[open_at..].starts_with(open) {
        return None;
    }

    let mut depth = 0usize;
    let mut steps = 0usize;
    let mut in_quotes = false;
    let mut chars = input[open_at..].char_indices();

    while let Some((off, c)) = chars.next() {
        match c {
            '\\' => {
                // Escaped delimiter is literal: skip the next char entirely
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            _ if in_quotes => {}
            _ if c == open => {
                depth += 1;
                steps += 1;
                if steps > MAX_SCAN_STEPS {
                    return None;
                }
            }
            _ if c == close => {
                depth = depth.saturating_sub(1);
                steps += 1;
                if steps > MAX_SCAN_STEPS {
                    return None;
                }
                if depth == 0 {
                    return Some(open_at + off);
                }
            }
            _ => {}
        }
    }

    None
}

/// Read a `{...}` group starting at `at` (which must point at `{`).
///
/// Returns the inner content and the byte index just past the closing `}`.
pub fn read_group(input: &str, at: usize) -> Option<(String, usize)> {
    let close = find_balanced(input, at, '{', '}')?;
    Some((input[at + 1..close].to_string(), close + 1))
}

/// Read an optional `[...]` group starting at `at`.
pub fn read_opt_group(input: &str, at: usize) -> Option<(String, usize)> {
    let close = find_balanced(input, at, '[', ']')?;
    Some((input[at + 1..close].to_string(), close + 1))
}

/// Skip ASCII whitespace from `at`, returning the next non-space index.
pub fn skip_ws(input: &str, at: usize) -> usize {
    input[at..]
        .char_indices()
        .find(|(_, c)| !c.is_whitespace())
        .map(|(off, _)| at + off)
        .unwrap_or(input.len())
}

/// Span of one `\begin{name}...\end{name}` environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvSpan {
    /// Byte index of `\begin`
    pub start: usize,
    /// Byte index just past `\begin{name}`
    pub body_start: usize,
    /// Byte index of `\end` (or input end when unterminated)
    pub body_end: usize,
    /// Byte index just past `\end{name}` (or input end when unterminated)
    pub end: usize,
    /// False when the end marker was missing (truncated input)
    pub closed: bool,
}

impl EnvSpan {
    pub fn body<'a>(&self, input: &'a str) -> &'a str {
        &input[self.body_start..self.body_end]
    }
}

/// Locate the next `\begin{name}` at or after `from` and scan to its
/// matching `\end{name}`, counting nested same-name environments.
///
/// Unterminated environments yield a span with `closed == false` running to
/// the end of input, so the caller can recover instead of hanging.
pub fn find_environment(input: &str, name: &str, from: usize) -> Option<EnvSpan> {
    let begin_marker = format!("\\begin{{{}}}", name);
    let end_marker = format!("\\end{{{}}}", name);

    let start = input[from..].find(&begin_marker)? + from;
    let body_start = start + begin_marker.len();

    let mut depth = 1usize;
    let mut pos = body_start;
    let mut steps = 0usize;

    while depth > 0 {
        steps += 1;
        if steps > MAX_SCAN_STEPS {
            break;
        }
        let next_begin = input[pos..].find(&begin_marker).map(|i| i + pos);
        let next_end = input[pos..].find(&end_marker).map(|i| i + pos);
        match (next_begin, next_end) {
            (Some(b), Some(e)) if b < e => {
                depth += 1;
                pos = b + begin_marker.len();
            }
            (_, Some(e)) => {
                depth -= 1;
                if depth == 0 {
                    return Some(EnvSpan {
                        start,
                        body_start,
                        body_end: e,
                        end: e + end_marker.len(),
                        closed: true,
                    });
                }
                pos = e + end_marker.len();
            }
            _ => break,
        }
    }

    Some(EnvSpan {
        start,
        body_start,
        body_end: input.len(),
        end: input.len(),
        closed: false,
    })
}

/// Split `input` on `sep` at brace/bracket depth zero.
///
/// Escaped separators (`\&`) are literal and never split. Used for table
/// cells and comma-separated citation key lists.
pub fn split_top_level(input: &str, sep: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0i32;
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                current.push(c);
                if let Some(&next) = chars.peek() {
                    current.push(next);
                    chars.next();
                }
            }
            '{' | '[' => {
                depth += 1;
                current.push(c);
            }
            '}' | ']' => {
                depth -= 1;
                current.push(c);
            }
            _ if c == sep && depth <= 0 => {
                parts.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }
    parts.push(current);
    parts
}

/// Split table content into rows on `\\` at brace depth zero.
///
/// A `\\` immediately followed by a non-row character such as `&` is a
/// double-escape transport artifact (an escaped literal), not a row break,
/// and is left inside the row.
pub fn split_rows(input: &str) -> Vec<String> {
    let mut rows = Vec::new();
    let mut current = String::new();
    let mut depth = 0i32;
    let mut i = 0usize;

    while i < input.len() {
        let c = match input[i..].chars().next() {
            Some(c) => c,
            None => break,
        };
        match c {
            '\\' if input[i + 1..].starts_with('\\') => {
                // Candidate row break; inspect what follows the marker
                let after = input[i + 2..].chars().next();
                if let Some(a @ ('&' | '%' | '_' | '#')) = after {
                    // Double-escape transport artifact (\\& is an escaped
                    // literal), not a row break; keep it singly escaped so
                    // cell splitting treats it as literal too
                    current.push('\\');
                    current.push(a);
                    i += 2 + a.len_utf8();
                    continue;
                }
                if depth == 0 {
                    rows.push(std::mem::take(&mut current));
                    i += 2;
                    // Swallow a trailing optional spacing arg like \\[2pt]
                    let rest = &input[i..];
                    let ws = rest.len() - rest.trim_start().len();
                    if rest.trim_start().starts_with('[') {
                        if let Some(close) = find_balanced(input, i + ws, '[', ']') {
                            i = close + 1;
                        }
                    }
                } else {
                    current.push_str("\\\\");
                    i += 2;
                }
                continue;
            }
            '\\' => {
                current.push(c);
                if let Some(next) = input[i + 1..].chars().next() {
                    current.push(next);
                    i += 1 + next.len_utf8();
                } else {
                    i += 1;
                }
                continue;
            }
            '{' => depth += 1,
            '}' => depth -= 1,
            _ => {}
        }
        current.push(c);
        i += c.len_utf8();
    }
    rows.push(current);
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_find_balanced_simple() {
        let s = "{abc}";
        assert_eq!(find_balanced(s, 0, '{', '}'), Some(4));
    }

    #[test]
    fn test_find_balanced_nested() {
        let s = "{a{b{c}}d}rest";
        assert_eq!(find_balanced(s, 0, '{', '}'), Some(9));
    }

    #[test]
    fn test_find_balanced_escaped_delimiters_are_literal() {
        let s = r"{a\}b}";
        assert_eq!(find_balanced(s, 0, '{', '}'), Some(5));
    }

    #[test]
    fn test_find_balanced_quotes_are_opaque() {
        let s = "{label=\"}\"}";
        assert_eq!(find_balanced(s, 0, '{', '}'), Some(10));
    }

    #[test]
    fn test_find_balanced_unterminated() {
        assert_eq!(find_balanced("{abc", 0, '{', '}'), None);
    }

    #[test]
    fn test_read_group() {
        let (inner, next) = read_group("{x{y}}tail", 0).unwrap();
        assert_eq!(inner, "x{y}");
        assert_eq!(&"{x{y}}tail"[next..], "tail");
    }

    #[test]
    fn test_find_environment_nested_same_name() {
        let s = r"\begin{itemize}\item a \begin{itemize}\item b\end{itemize}\end{itemize}";
        let span = find_environment(s, "itemize", 0).unwrap();
        assert!(span.closed);
        assert_eq!(span.end, s.len());
        assert!(span.body(s).contains(r"\begin{itemize}\item b\end{itemize}"));
    }

    #[test]
    fn test_find_environment_unterminated() {
        let s = r"\begin{tikzpicture}\node at (0,0) {a};";
        let span = find_environment(s, "tikzpicture", 0).unwrap();
        assert!(!span.closed);
        assert_eq!(span.body_end, s.len());
    }

    #[test]
    fn test_split_top_level_cells() {
        let parts = split_top_level(r"a & \textbf{b & c} & d", '&');
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[1].trim(), r"\textbf{b & c}");
    }

    #[test]
    fn test_split_top_level_escaped_sep() {
        let parts = split_top_level(r"a \& b & c", '&');
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].trim(), r"a \& b");
    }

    #[test]
    fn test_split_rows_basic() {
        let rows = split_rows("a & b \\\\ c & d");
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_split_rows_double_escaped_ampersand() {
        // \\& is an escaped literal ampersand, not a row break followed by &
        let rows = split_rows("a \\\\& b & c \\\\ d & e & f");
        assert_eq!(rows.len(), 2);
        let cells = split_top_level(&rows[0], '&');
        assert_eq!(cells.len(), 3);
    }

    #[test]
    fn test_split_rows_depth_aware() {
        let rows = split_rows("a & {x \\\\ y} \\\\ b & c");
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_split_rows_keeps_multibyte_text_intact() {
        let rows = split_rows("café & naïve \\\\ приём & 数学");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].trim(), "café & naïve");
        assert_eq!(rows[1].trim(), "приём & 数学");
    }

    #[test]
    fn test_split_rows_optional_spacing() {
        let rows = split_rows("a \\\\[4pt] b");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].trim(), "b");
    }
}
