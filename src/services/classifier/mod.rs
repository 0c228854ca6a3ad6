// Scene classification: maps a sanitized prompt onto a fixed archetype with
// a deterministic palette and sound-effect token.

use crate::core::types::{ArchetypeKind, Palette, SceneStyle};
use crate::services::safety::find_word_spans;

/// Keyword groups checked in fixed priority order; first match wins.
const KEYWORD_GROUPS: &[(ArchetypeKind, &[&str])] = &[
    (ArchetypeKind::Monster, &["monster", "beast", "creature"]),
    (ArchetypeKind::Hero, &["hero", "triumph", "victory"]),
    (ArchetypeKind::Shadow, &["shadow", "dark", "villain"]),
    (ArchetypeKind::Action, &["door", "burst", "break"]),
    (ArchetypeKind::Flying, &["fly", "soar", "sky"]),
    (ArchetypeKind::Chase, &["escape", "run", "chase"]),
];

/// Onomatopoeia vocabulary. A token already present in the prompt is
/// preferred over the archetype default.
const SOUND_EFFECTS: &[&str] = &[
    "BOOM", "BAM", "SMASH", "POW", "CRASH", "WHOOSH", "BANG", "SLAM", "ZOOM", "THUD", "WHAM",
    "CRACK",
];

/// Stateless, deterministic prompt classifier
pub struct SceneClassifier;

impl SceneClassifier {
    pub fn new() -> Self {
        Self
    }

    pub fn classify(&self, prompt: &str) -> SceneStyle {
        let lower = prompt.to_ascii_lowercase();

        let kind = KEYWORD_GROUPS
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|k| lower.contains(k)))
            .map(|(kind, _)| *kind)
            .unwrap_or(ArchetypeKind::Generic);

        let sound_effect = extract_sound_effect(prompt)
            .unwrap_or_else(|| default_sound_effect(kind).to_string());

        SceneStyle {
            kind,
            palette: palette_for(kind),
            sound_effect,
        }
    }
}

impl Default for SceneClassifier {
    fn default() -> Self {
        Self::new()
    }
}

fn extract_sound_effect(prompt: &str) -> Option<String> {
    SOUND_EFFECTS
        .iter()
        .find(|token| !find_word_spans(prompt, token).is_empty())
        .map(|token| format!("{token}!"))
}

pub fn palette_for(kind: ArchetypeKind) -> Palette {
    match kind {
        ArchetypeKind::Monster => Palette {
            primary: [86, 38, 117],
            secondary: [30, 16, 48],
            accent: [124, 252, 112],
        },
        ArchetypeKind::Hero => Palette {
            primary: [33, 84, 180],
            secondary: [16, 32, 84],
            accent: [255, 204, 54],
        },
        ArchetypeKind::Shadow => Palette {
            primary: [54, 54, 70],
            secondary: [18, 18, 26],
            accent: [255, 64, 64],
        },
        ArchetypeKind::Action => Palette {
            primary: [219, 68, 36],
            secondary: [120, 26, 14],
            accent: [255, 238, 88],
        },
        ArchetypeKind::Flying => Palette {
            primary: [70, 160, 224],
            secondary: [28, 74, 128],
            accent: [240, 250, 255],
        },
        ArchetypeKind::Chase => Palette {
            primary: [16, 130, 120],
            secondary: [8, 56, 54],
            accent: [255, 228, 94],
        },
        ArchetypeKind::Generic => Palette {
            primary: [70, 70, 160],
            secondary: [34, 32, 72],
            accent: [255, 196, 64],
        },
    }
}

fn default_sound_effect(kind: ArchetypeKind) -> &'static str {
    match kind {
        ArchetypeKind::Monster => "GRRR!",
        ArchetypeKind::Hero => "TA-DA!",
        ArchetypeKind::Shadow => "SHHH!",
        ArchetypeKind::Action => "BOOM!",
        ArchetypeKind::Flying => "WHOOSH!",
        ArchetypeKind::Chase => "ZOOM!",
        ArchetypeKind::Generic => "POW!",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_order_resolves_conflicts() {
        let c = SceneClassifier::new();
        // "door" (action) outranks "escape" (chase) in the fixed priority order
        let style = c.classify("The cat escaped through a crumbling door into the storm");
        assert_eq!(style.kind, ArchetypeKind::Action);

        // "monster" outranks everything
        let style = c.classify("a monster bursting through a door in the dark sky");
        assert_eq!(style.kind, ArchetypeKind::Monster);
    }

    #[test]
    fn unmatched_prompt_is_generic() {
        let c = SceneClassifier::new();
        let style = c.classify("a quiet garden in the rain");
        assert_eq!(style.kind, ArchetypeKind::Generic);
        assert_eq!(style.sound_effect, "POW!");
    }

    #[test]
    fn classification_is_deterministic() {
        let c = SceneClassifier::new();
        let a = c.classify("a beast soaring over the city");
        let b = c.classify("a beast soaring over the city");
        assert_eq!(a, b);
        assert_eq!(a.kind, ArchetypeKind::Monster);
    }

    #[test]
    fn explicit_onomatopoeia_wins() {
        let c = SceneClassifier::new();
        let style = c.classify("the door flew open with a CRASH");
        assert_eq!(style.kind, ArchetypeKind::Action);
        assert_eq!(style.sound_effect, "CRASH!");
    }

    #[test]
    fn archetype_defaults_apply_without_tokens() {
        let c = SceneClassifier::new();
        assert_eq!(c.classify("flying over the sea").sound_effect, "WHOOSH!");
        assert_eq!(c.classify("a villain in the fog").sound_effect, "SHHH!");
    }
}
