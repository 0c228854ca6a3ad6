// Prompt safety: sanitization and content guarding
//
// Both components are total functions over arbitrary text. The sanitizer is a
// deterministic, idempotent rewrite; the guard validates against a banned-term
// vocabulary and produces a guaranteed-safe replacement when validation fails.

pub mod guard;
pub mod sanitizer;

pub use guard::{ContentGuard, Vocabulary};
pub use sanitizer::PromptSanitizer;

/// Find byte spans of whole-word, case-insensitive occurrences of `needle`
/// in `haystack`. Word characters are ASCII alphanumerics plus apostrophe,
/// so "i" does not match inside "I'm" or "iris".
pub(crate) fn find_word_spans(haystack: &str, needle: &str) -> Vec<(usize, usize)> {
    // ASCII-only folding keeps byte offsets valid for the original string
    let hay = haystack.to_ascii_lowercase();
    let pat = needle.to_ascii_lowercase();
    if pat.is_empty() {
        return Vec::new();
    }

    let bytes = hay.as_bytes();
    let mut spans = Vec::new();
    let mut from = 0;
    while let Some(rel) = hay[from..].find(&pat) {
        let start = from + rel;
        let end = start + pat.len();
        let before_ok = start == 0 || !is_word_byte(bytes[start - 1]);
        let after_ok = end >= bytes.len() || !is_word_byte(bytes[end]);
        if before_ok && after_ok {
            spans.push((start, end));
            from = end;
        } else {
            from = start + 1;
        }
    }
    spans
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'\''
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_spans_respect_boundaries() {
        assert_eq!(find_word_spans("I ran", "i"), vec![(0, 1)]);
        assert!(find_word_spans("iris island", "i").is_empty());
        assert!(find_word_spans("I'm here", "i").is_empty());
        assert_eq!(find_word_spans("say me, ME!", "me"), vec![(4, 6), (8, 10)]);
    }

    #[test]
    fn word_spans_handle_phrases() {
        assert_eq!(find_word_spans("then I was gone", "i was"), vec![(5, 10)]);
    }
}
