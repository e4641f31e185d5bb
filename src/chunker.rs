//! Deterministic text chunking into fixed-token windows with overlap

use serde::{Deserialize, Serialize};

/// A window of document text, the unit of indexing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Window {
    /// 0-based position within the document
    pub ord: usize,
    /// Window text, whitespace-normalized
    pub text: String,
    /// Approximate token count of the window
    pub tokens: usize,
}

/// Approximate token count: whichever is larger of the word count and
/// one token per four characters. Stable and language-agnostic.
pub fn approx_tokens(text: &str) -> usize {
    let words = text.split_whitespace().count();
    let chars = text.chars().count();
    words.max(chars.div_ceil(4))
}

/// Split text into successive windows of `chunk_tokens` whitespace tokens,
/// each window after the first starting `overlap` tokens before the previous
/// window's end. Tokens are re-joined with a single space, so the output is
/// byte-deterministic for fixed inputs.
pub fn split(text: &str, chunk_tokens: usize, overlap: usize) -> Vec<Window> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }

    let chunk_tokens = chunk_tokens.max(1);
    let overlap = overlap.min(chunk_tokens - 1);
    let step = chunk_tokens - overlap;

    let tokens: Vec<&str> = text.split_whitespace().collect();
    let mut windows = Vec::new();
    let mut start = 0;
    let mut ord = 0;

    while start < tokens.len() {
        let end = (start + chunk_tokens).min(tokens.len());
        let joined = tokens[start..end].join(" ");
        let token_count = approx_tokens(&joined);
        windows.push(Window {
            ord,
            text: joined,
            tokens: token_count,
        });
        ord += 1;
        if end == tokens.len() {
            break;
        }
        start += step;
    }

    windows
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input() {
        assert!(split("", 8, 2).is_empty());
        assert!(split("   \n\t ", 8, 2).is_empty());
    }

    #[test]
    fn test_short_text_single_window() {
        let windows = split("one two three", 8, 2);
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].ord, 0);
        assert_eq!(windows[0].text, "one two three");
    }

    #[test]
    fn test_overlap_windows() {
        let text = "a b c d e f g h i j";
        let windows = split(text, 4, 2);

        assert_eq!(windows[0].text, "a b c d");
        assert_eq!(windows[1].text, "c d e f");
        assert_eq!(windows[2].text, "e f g h");
        assert_eq!(windows[3].text, "g h i j");
        assert_eq!(windows.len(), 4);

        for (i, w) in windows.iter().enumerate() {
            assert_eq!(w.ord, i);
        }
    }

    #[test]
    fn test_trailing_partial_window() {
        let windows = split("a b c d e", 4, 0);
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[1].text, "e");
    }

    #[test]
    fn test_whitespace_normalization() {
        let windows = split("one\n\ttwo   three", 8, 0);
        assert_eq!(windows[0].text, "one two three");
    }

    #[test]
    fn test_deterministic() {
        let text = "Lorem ipsum dolor sit amet consectetur adipiscing elit sed do eiusmod";
        let a = split(text, 5, 2);
        let b = split(text, 5, 2);
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b.iter()) {
            assert_eq!(x.text, y.text);
            assert_eq!(x.tokens, y.tokens);
        }
    }

    #[test]
    fn test_approx_tokens() {
        assert_eq!(approx_tokens(""), 0);
        assert_eq!(approx_tokens("word"), 1);
        // 9 words, 44 chars -> ceil(44/4) = 11 dominates
        let text = "the quick brown fox jumps over the lazy dogs";
        assert_eq!(approx_tokens(text), 11);
        // long unbroken string: chars/4 dominates word count
        assert_eq!(approx_tokens("abcdefghijklmnop"), 4);
    }
}
