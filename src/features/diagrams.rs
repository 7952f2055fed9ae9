//! Diagram extraction and layout heuristic
//!
//! Generated TikZ diagrams carry no layout intent a browser can use, so
//! each diagram body is classified from structural signals (node/edge
//! counts, label density, coordinate bounding box) and wrapped in an
//! isolated rendering sandbox with synthesized scale and spacing options.
//! Diagrams run first in the extraction order: their bodies contain
//! characters a naive math scanner would misread.

use crate::core::sanitize::context::{SanitizeContext, TokenKind};
use crate::data::constants::UNSUPPORTED_PLOT_MARKERS;
use crate::features::inline::{escape_attr, strip_macros};
use crate::utils::diagnostics::Diagnostic;
use crate::utils::scan::{find_environment, read_opt_group, skip_ws};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref COORD_RE: Regex =
        Regex::new(r"\((-?\d+(?:\.\d+)?)\s*,\s*(-?\d+(?:\.\d+)?)\)").unwrap();
    static ref NODE_RE: Regex = Regex::new(r"\\node\b").unwrap();
    static ref DRAW_RE: Regex = Regex::new(r"\\(draw|path|filldraw|fill)\b").unwrap();
    static ref NODE_DISTANCE_RE: Regex =
        Regex::new(r"node distance\s*=\s*(\d+(?:\.\d+)?)").unwrap();
    static ref NODE_LABEL_RE: Regex = Regex::new(r"\\node[^;{]*\{([^}]*)\}").unwrap();
}

/// Calibration knobs of the layout heuristic.
///
/// All thresholds were tuned against generated diagrams; treat them as a
/// starting calibration, not a contract.
#[derive(Debug, Clone)]
pub struct DiagramTuning {
    /// Bounding-box aspect ratio (w:h) past which a diagram is "flat"
    pub flat_aspect: f64,
    /// Explicit `node distance` (cm) past which a diagram is "wide"
    pub wide_distance: f64,
    /// Mean label length past which a diagram is "large"
    pub large_label_len: f64,
    /// Node count at or past which a low-density diagram is "compact"
    pub compact_nodes: usize,
    /// Mean label length below which a busy diagram is still "compact"
    pub compact_label_len: f64,
    /// Target rendered width in length units
    pub target_width: f64,
    /// Wider budget for flat diagrams
    pub target_width_flat: f64,
    /// Target rendered height in length units
    pub target_height: f64,
    /// Clamp bounds for any synthesized unit scale
    pub min_unit: f64,
    pub max_unit: f64,
}

impl Default for DiagramTuning {
    fn default() -> Self {
        Self {
            flat_aspect: 3.0,
            wide_distance: 2.2,
            large_label_len: 12.0,
            compact_nodes: 8,
            compact_label_len: 6.0,
            target_width: 14.0,
            target_width_flat: 25.0,
            target_height: 8.0,
            min_unit: 0.4,
            max_unit: 3.0,
        }
    }
}

/// Visual-scale classification of one diagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagramIntent {
    Compact,
    Medium,
    Large,
    Wide,
    Flat,
}

/// Structural signals computed from a diagram body.
#[derive(Debug, Clone, PartialEq)]
pub struct DiagramSignals {
    pub nodes: usize,
    pub draws: usize,
    pub directed_edges: usize,
    pub mean_label_len: f64,
    /// (min_x, min_y, max_x, max_y) over explicit coordinates
    pub bbox: Option<(f64, f64, f64, f64)>,
    /// Explicit `node distance` from the option list, in cm
    pub node_distance: Option<f64>,
}

/// Synthesized layout parameters for the sandbox.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutParams {
    pub x_unit: f64,
    pub y_unit: f64,
    pub node_distance: f64,
    pub text_width: Option<f64>,
}

/// Compute structural signals from a diagram body and its option string.
pub fn analyze(body: &str, options: &str) -> DiagramSignals {
    let nodes = NODE_RE.find_iter(body).count();
    let draws = DRAW_RE.find_iter(body).count();
    let directed_edges = body.matches("->").count();

    let labels: Vec<String> = NODE_LABEL_RE
        .captures_iter(body)
        .map(|c| strip_macros(&c[1]).trim().to_string())
        .collect();
    let mean_label_len = if labels.is_empty() {
        0.0
    } else {
        labels.iter().map(|l| l.chars().count()).sum::<usize>() as f64 / labels.len() as f64
    };

    let mut bbox: Option<(f64, f64, f64, f64)> = None;
    for cap in COORD_RE.captures_iter(body) {
        let x: f64 = cap[1].parse().unwrap_or(0.0);
        let y: f64 = cap[2].parse().unwrap_or(0.0);
        bbox = Some(match bbox {
            None => (x, y, x, y),
            Some((minx, miny, maxx, maxy)) => {
                (minx.min(x), miny.min(y), maxx.max(x), maxy.max(y))
            }
        });
    }

    let node_distance = NODE_DISTANCE_RE
        .captures(options)
        .or_else(|| NODE_DISTANCE_RE.captures(body))
        .and_then(|c| c[1].parse().ok());

    DiagramSignals {
        nodes,
        draws,
        directed_edges,
        mean_label_len,
        bbox,
        node_distance,
    }
}

/// Classify visual intent. Deterministic: identical signals always yield
/// the same intent. Priority order matters and is part of the contract.
pub fn classify(signals: &DiagramSignals, tuning: &DiagramTuning) -> DiagramIntent {
    if let Some((minx, miny, maxx, maxy)) = signals.bbox {
        let width = (maxx - minx).abs();
        let height = (maxy - miny).abs();
        if height > 0.0 && width / height > tuning.flat_aspect {
            return DiagramIntent::Flat;
        }
        if width > 0.0 || height > 0.0 {
            return DiagramIntent::Large;
        }
    }
    if let Some(distance) = signals.node_distance {
        if distance >= tuning.wide_distance {
            return DiagramIntent::Wide;
        }
    }
    if signals.mean_label_len >= tuning.large_label_len {
        return DiagramIntent::Large;
    }
    if signals.nodes >= tuning.compact_nodes && signals.mean_label_len < tuning.compact_label_len
    {
        return DiagramIntent::Compact;
    }
    DiagramIntent::Medium
}

fn clamp(value: f64, min: f64, max: f64) -> f64 {
    value.max(min).min(max)
}

/// Synthesize layout parameters for one classification.
pub fn synthesize(
    intent: DiagramIntent,
    signals: &DiagramSignals,
    tuning: &DiagramTuning,
) -> LayoutParams {
    let (width, height) = signals
        .bbox
        .map(|(minx, miny, maxx, maxy)| ((maxx - minx).max(0.5), (maxy - miny).max(0.5)))
        .unwrap_or((tuning.target_width, tuning.target_height));

    match intent {
        DiagramIntent::Flat => LayoutParams {
            // Flat diagrams keep their horizontal reach and expand
            // vertically instead of uniformly scaling down
            x_unit: clamp(tuning.target_width_flat / width, tuning.min_unit, 1.2),
            y_unit: clamp(tuning.target_height / height, 1.0, tuning.max_unit),
            node_distance: 1.8,
            text_width: label_width(signals),
        },
        DiagramIntent::Large => {
            let scale = clamp(
                (tuning.target_width / width).min(tuning.target_height / height),
                tuning.min_unit,
                1.2,
            );
            LayoutParams {
                x_unit: scale,
                y_unit: scale,
                node_distance: 2.2,
                text_width: label_width(signals),
            }
        }
        DiagramIntent::Wide => LayoutParams {
            x_unit: 1.4,
            y_unit: 1.0,
            node_distance: signals.node_distance.unwrap_or(2.4),
            text_width: label_width(signals),
        },
        DiagramIntent::Compact => LayoutParams {
            x_unit: 0.8,
            y_unit: 0.8,
            node_distance: 1.2,
            text_width: None,
        },
        DiagramIntent::Medium => LayoutParams {
            x_unit: 1.0,
            y_unit: 1.0,
            node_distance: 1.8,
            text_width: label_width(signals),
        },
    }
}

fn label_width(signals: &DiagramSignals) -> Option<f64> {
    if signals.mean_label_len > 8.0 {
        Some(clamp(signals.mean_label_len * 0.18, 2.0, 4.5))
    } else {
        None
    }
}

/// Force the body to a Latin-1-compatible subset; the sandboxed renderer
/// cannot handle characters outside it.
fn force_safe_charset(body: &str) -> String {
    body.chars().filter(|&c| (c as u32) < 0x100).collect()
}

/// Build the merged TikZ option string: author options first, synthesized
/// layout parameters appended so they win.
fn merge_options(original: &str, params: &LayoutParams) -> String {
    let mut merged = original.trim().to_string();
    if !merged.is_empty() && !merged.ends_with(',') {
        merged.push(',');
    }
    merged.push_str(&format!(
        "x={:.2}cm,y={:.2}cm,node distance={:.2}cm",
        params.x_unit, params.y_unit, params.node_distance
    ));
    match params.text_width {
        Some(w) => merged.push_str(&format!(
            ",every node/.style={{align=center,text width={:.1}cm}}",
            w
        )),
        None => merged.push_str(",every node/.style={align=center}"),
    }
    merged
}

/// Self-contained sandbox sub-document: diagram source, minimal styling,
/// and a resize reporter. The reporter is one-directional (height only)
/// and must never throw across the isolation boundary.
fn sandbox_document(body: &str, options: &str) -> String {
    format!(
        concat!(
            "<!DOCTYPE html><html><head><meta charset=\"utf-8\">",
            "<style>body{{margin:0;overflow:hidden;text-align:center}}</style>",
            "</head><body>",
            "<script type=\"text/tikz\">\\begin{{tikzpicture}}[{options}]\n{body}\n\\end{{tikzpicture}}</script>",
            "<script>(function(){{",
            "function report(){{try{{parent.postMessage({{prelax:\"diagram-height\",",
            "height:document.body.scrollHeight}},\"*\");}}catch(e){{}}}}",
            "new MutationObserver(report).observe(document.body,{{childList:true,subtree:true}});",
            "window.addEventListener(\"load\",report);",
            "}})();</script>",
            "</body></html>"
        ),
        options = options,
        body = body,
    )
}

/// Layout one diagram and emit its sandbox fragment.
pub fn layout_diagram(body: &str, options: &str, ctx: &mut SanitizeContext) -> String {
    if UNSUPPORTED_PLOT_MARKERS.iter().any(|m| body.contains(m)) {
        ctx.diag(
            Diagnostic::info("diagram uses plotting features unsupported in preview")
                .with_construct("diagram"),
        );
        return "<div class=\"prelax-diagram-unsupported\">[Plot preview not supported; \
                see the compiled output]</div>"
            .to_string();
    }

    let safe_body = force_safe_charset(body);
    let signals = analyze(&safe_body, options);
    let intent = classify(&signals, &ctx.options.diagram);
    let params = synthesize(intent, &signals, &ctx.options.diagram);
    let merged = merge_options(options, &params);
    let doc = sandbox_document(&safe_body, &merged);

    format!(
        "<iframe class=\"prelax-diagram\" style=\"width:100%;border:0\" \
         sandbox=\"allow-scripts\" srcdoc=\"{}\"></iframe>",
        escape_attr(&doc)
    )
}

/// Extract every `tikzpicture` environment into a diagram placeholder.
pub fn extract_diagrams(input: &str, ctx: &mut SanitizeContext) -> String {
    let mut out = input.to_string();
    let mut pos = 0usize;

    while let Some(span) = find_environment(&out, "tikzpicture", pos) {
        if !span.closed {
            ctx.diag(
                Diagnostic::warning("unterminated tikzpicture environment")
                    .with_construct("diagram")
                    .at_offset(span.start),
            );
            let fragment = "<div class=\"prelax-parse-failed\">[diagram could not be \
                            previewed]</div>"
                .to_string();
            let token = ctx.register(TokenKind::Diagram, fragment);
            out.replace_range(span.start..out.len(), &token);
            break;
        }

        // Option list may nest braces; consume it with a balanced scan
        let mut body = span.body(&out).to_string();
        let mut options = String::new();
        let at = skip_ws(&body, 0);
        if body[at..].starts_with('[') {
            if let Some((opts, next)) = read_opt_group(&body, at) {
                options = opts;
                body = body[next..].to_string();
            }
        }

        let fragment = layout_diagram(&body, &options, ctx);
        let token = ctx.register(TokenKind::Diagram, fragment);
        out.replace_range(span.start..span.end, &token);
        pos = span.start + token.len();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::sanitize::context::SanitizeOptions;
    use crate::features::math::FallbackMathRenderer;
    use pretty_assertions::assert_eq;

    fn tuning() -> DiagramTuning {
        DiagramTuning::default()
    }

    #[test]
    fn test_flat_classification_for_10_to_1_aspect() {
        let body = r"\draw (0,0) -- (20,2); \node at (10,1) {mid};";
        let signals = analyze(body, "");
        assert_eq!(signals.bbox, Some((0.0, 0.0, 20.0, 2.0)));
        let intent = classify(&signals, &tuning());
        assert_eq!(intent, DiagramIntent::Flat);
        let params = synthesize(intent, &signals, &tuning());
        // Vertical expansion, not uniform scale-down
        assert!(params.y_unit > 1.0);
    }

    #[test]
    fn test_explicit_coords_without_extreme_aspect_is_large() {
        let body = r"\node at (0,0) {a}; \node at (6,5) {b};";
        let signals = analyze(body, "");
        assert_eq!(classify(&signals, &tuning()), DiagramIntent::Large);
    }

    #[test]
    fn test_node_distance_hint_is_wide() {
        let body = r"\node (a) {a}; \node (b) [right of=a] {b};";
        let signals = analyze(body, "node distance=3cm");
        assert_eq!(signals.node_distance, Some(3.0));
        assert_eq!(classify(&signals, &tuning()), DiagramIntent::Wide);
    }

    #[test]
    fn test_dense_labels_are_large() {
        let body = r"\node (a) {a very long descriptive label}; \node (b) {another quite long label};";
        let signals = analyze(body, "");
        assert!(signals.mean_label_len >= 12.0);
        assert_eq!(classify(&signals, &tuning()), DiagramIntent::Large);
    }

    #[test]
    fn test_many_terse_nodes_are_compact() {
        let body = (0..9)
            .map(|i| format!("\\node (n{i}) {{v{i}}};"))
            .collect::<String>();
        let signals = analyze(&body, "");
        assert_eq!(classify(&signals, &tuning()), DiagramIntent::Compact);
    }

    #[test]
    fn test_classification_is_deterministic() {
        let body = r"\node (a) {start}; \draw[->] (a) -- (b);";
        let s1 = analyze(body, "scale=1");
        let s2 = analyze(body, "scale=1");
        assert_eq!(s1, s2);
        let i1 = classify(&s1, &tuning());
        let i2 = classify(&s2, &tuning());
        assert_eq!(i1, i2);
        assert_eq!(
            synthesize(i1, &s1, &tuning()),
            synthesize(i2, &s2, &tuning())
        );
    }

    #[test]
    fn test_layout_params_are_clamped() {
        let body = r"\node at (0,0) {a}; \node at (500,400) {b};";
        let signals = analyze(body, "");
        let params = synthesize(classify(&signals, &tuning()), &signals, &tuning());
        assert!(params.x_unit >= tuning().min_unit);
        assert!(params.y_unit <= tuning().max_unit);
    }

    #[test]
    fn test_extract_unterminated_does_not_hang() {
        let opts = SanitizeOptions::default();
        let math = FallbackMathRenderer;
        let mut ctx = SanitizeContext::new(&opts, &math);
        let input = "intro \\begin{tikzpicture}\\node at (0,0) {a};";
        let out = extract_diagrams(input, &mut ctx);
        assert!(out.starts_with("intro "));
        assert!(!out.contains("tikzpicture"));
        assert!(!ctx.diagnostics.is_empty());
    }

    #[test]
    fn test_unsupported_plot_short_circuits() {
        let opts = SanitizeOptions::default();
        let math = FallbackMathRenderer;
        let mut ctx = SanitizeContext::new(&opts, &math);
        let input =
            "\\begin{tikzpicture}\\begin{axis}\\addplot {x^2};\\end{axis}\\end{tikzpicture}";
        extract_diagrams(input, &mut ctx);
        let fragment = ctx.blocks.values().next().unwrap();
        assert!(fragment.contains("prelax-diagram-unsupported"));
    }

    #[test]
    fn test_sandbox_fragment_shape() {
        let opts = SanitizeOptions::default();
        let math = FallbackMathRenderer;
        let mut ctx = SanitizeContext::new(&opts, &math);
        let html = layout_diagram(r"\node at (0,0) {a};", "", &mut ctx);
        assert!(html.contains("iframe"));
        assert!(html.contains("width:100%"));
        assert!(html.contains("srcdoc="));
        assert!(html.contains("postMessage"));
    }

    #[test]
    fn test_non_latin_chars_stripped() {
        let html = force_safe_charset("node 日本 label");
        assert_eq!(html, "node  label");
    }
}
