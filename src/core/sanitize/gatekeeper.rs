//! Integrity gatekeeper
//!
//! Generated markup is frequently truncated mid-stream. Rendering a
//! truncated document produces a misleading half-preview, so the render
//! step refuses reduced markup whose environment begin/end counts diverge
//! beyond a small tolerance. The check runs after extraction: literal
//! `\begin{` text inside code or verbatim bodies has already left the
//! document by then and never counts.

use crate::utils::error::{PreviewError, PreviewResult};

/// Reject markup whose environment delimiters diverge beyond `tolerance`.
pub fn check_balance(input: &str, tolerance: usize) -> PreviewResult<()> {
    let opens = input.matches("\\begin{").count();
    let closes = input.matches("\\end{").count();
    let divergence = opens.abs_diff(closes);
    if divergence > tolerance {
        return Err(PreviewError::integrity(opens, closes));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_balanced_document_passes() {
        let input = r"\begin{itemize}\item a\end{itemize}\begin{quote}q\end{quote}";
        assert!(check_balance(input, 2).is_ok());
    }

    #[test]
    fn test_small_imbalance_passes() {
        let input = r"\begin{a}\end{a}\begin{b}\begin{c}";
        assert!(check_balance(input, 2).is_ok());
    }

    #[test]
    fn test_large_imbalance_rejected() {
        let input = r"\begin{a}\begin{b}\begin{c}\begin{d}";
        let err = check_balance(input, 2).unwrap_err();
        match err {
            PreviewError::Integrity { opens, closes } => {
                assert_eq!(opens, 4);
                assert_eq!(closes, 0);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_zero_tolerance_rejects_any_imbalance() {
        assert!(check_balance(r"\begin{a}", 0).is_err());
        assert!(check_balance(r"\begin{a}\end{a}", 0).is_ok());
    }

    #[test]
    fn test_excess_closes_also_rejected() {
        let input = r"\end{a}\end{b}\end{c}";
        assert!(check_balance(input, 2).is_err());
    }

    #[test]
    fn test_empty_input_passes() {
        assert!(check_balance("", 2).is_ok());
    }
}
