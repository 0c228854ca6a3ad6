// Rule-based removal of personal references from visual prompts.
//
// Rules run in a fixed order (longest phrases first) as case-insensitive
// whole-word rewrites. The pass is deterministic and idempotent: sanitizing
// already-sanitized text yields the same text.

use once_cell::sync::Lazy;

use crate::core::types::SanitizedPrompt;
use crate::services::safety::find_word_spans;

/// Ordered pattern -> replacement rules. Phrases and contractions come before
/// the bare pronouns they contain so "I was" never degrades into "was".
static RULES: Lazy<Vec<(&'static str, &'static str)>> = Lazy::new(|| {
    vec![
        // First-person phrases and contractions
        ("i was", ""),
        ("i am", ""),
        ("i'm", ""),
        ("i've", ""),
        ("i'd", ""),
        ("i'll", ""),
        ("we were", ""),
        ("we are", ""),
        ("we're", ""),
        ("we've", ""),
        ("we'll", ""),
        // Possessives get a neutral substitute; the rest are removed
        ("my", "the"),
        ("our", "the"),
        ("mine", ""),
        ("ours", ""),
        ("myself", ""),
        ("ourselves", ""),
        ("i", ""),
        ("me", ""),
        ("we", ""),
        ("us", ""),
        // Human identity nouns
        ("person", ""),
        ("people", ""),
        ("face", ""),
        ("faces", ""),
        ("hand", ""),
        ("hands", ""),
        ("body", ""),
        ("child", ""),
        ("children", ""),
        ("kid", ""),
        ("kids", ""),
        ("man", ""),
        ("woman", ""),
        ("men", ""),
        ("women", ""),
        ("boy", ""),
        ("girl", ""),
        ("friend", ""),
        ("friends", ""),
        ("family", ""),
        ("mom", ""),
        ("dad", ""),
        ("mother", ""),
        ("father", ""),
        ("brother", ""),
        ("sister", ""),
        // Common given names seen in journal text
        ("alex", ""),
        ("sam", ""),
        ("max", ""),
        ("mia", ""),
        ("emma", ""),
        ("liam", ""),
        ("noah", ""),
        ("olivia", ""),
        ("james", ""),
        ("sophia", ""),
    ]
});

/// Deterministic personal-reference scrubber
pub struct PromptSanitizer;

impl PromptSanitizer {
    pub fn new() -> Self {
        Self
    }

    /// Apply every rule in order, then clean up the whitespace and
    /// punctuation debris the deletions leave behind. Never fails; text with
    /// no matches passes through (modulo cleanup) unchanged.
    pub fn sanitize(&self, text: &str) -> SanitizedPrompt {
        // Normalize whitespace up front so phrase rules ("i was") still match
        // across runs of spaces left by earlier edits.
        let mut out = cleanup(text);
        for (pattern, replacement) in RULES.iter() {
            out = replace_whole_word(&out, pattern, replacement);
        }
        SanitizedPrompt::new(cleanup(&out))
    }
}

impl Default for PromptSanitizer {
    fn default() -> Self {
        Self::new()
    }
}

fn replace_whole_word(text: &str, pattern: &str, replacement: &str) -> String {
    let spans = find_word_spans(text, pattern);
    if spans.is_empty() {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for (start, end) in spans {
        out.push_str(&text[cursor..start]);
        out.push_str(replacement);
        cursor = end;
    }
    out.push_str(&text[cursor..]);
    out
}

/// Collapse the artifacts of word deletion: repeated whitespace, doubled
/// punctuation, space before punctuation, and orphaned leading punctuation.
/// Runs single passes until a fixpoint so the result is stable under re-runs.
fn cleanup(text: &str) -> String {
    let mut current = text.to_string();
    loop {
        let next = cleanup_pass(&current);
        if next == current {
            return next;
        }
        current = next;
    }
}

fn cleanup_pass(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut prev: Option<char> = None;
    for c in text.chars() {
        let c = if c == '\t' { ' ' } else { c };
        match (prev, c) {
            (Some(' '), ' ') => continue,
            (Some(','), ',') | (Some('.'), '.') => continue,
            (Some(' '), ',') | (Some(' '), '.') => {
                out.pop();
                out.push(c);
            }
            (Some(','), '.') => {
                out.pop();
                out.push(c);
            }
            _ => out.push(c),
        }
        prev = out.chars().last();
    }

    out.trim()
        .trim_start_matches(|c: char| c == ',' || c == '.' || c.is_whitespace())
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sanitize(text: &str) -> String {
        PromptSanitizer::new().sanitize(text).into_inner()
    }

    #[test]
    fn removes_first_person_pronouns() {
        assert_eq!(
            sanitize("I was running through my house"),
            "running through the house"
        );
    }

    #[test]
    fn removes_identity_nouns_and_names() {
        assert_eq!(
            sanitize("Emma waved her hand at the child"),
            "waved her at the"
        );
    }

    #[test]
    fn longest_rule_wins_over_bare_pronoun() {
        // "I was" must not leave a stray "was" behind
        assert_eq!(sanitize("I was flying"), "flying");
        assert_eq!(sanitize("I'm flying"), "flying");
    }

    #[test]
    fn no_match_is_a_noop() {
        assert_eq!(
            sanitize("a storm rolling over the ocean"),
            "a storm rolling over the ocean"
        );
    }

    #[test]
    fn cleans_up_orphaned_punctuation() {
        assert_eq!(sanitize("Me, the storm, and I."), "the storm, and.");
        assert_eq!(sanitize("I  was  there.."), "there.");
    }

    #[test]
    fn idempotent_for_all_samples() {
        let samples = [
            "I was running through my house with Emma",
            "We're lost, my friend and I",
            "a dragon over the mountain",
            "My hands, my face, myself",
            "",
            "   spaced    out   ",
        ];
        let sanitizer = PromptSanitizer::new();
        for sample in samples {
            let once = sanitizer.sanitize(sample).into_inner();
            let twice = sanitizer.sanitize(&once).into_inner();
            assert_eq!(once, twice, "not idempotent for {sample:?}");
        }
    }

    #[test]
    fn case_insensitive_matching() {
        assert_eq!(sanitize("MY HOUSE"), "the HOUSE");
    }
}
