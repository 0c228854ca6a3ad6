// Scene planning: response parsing, panel-count clamping, and the
// pre-authored fallback scenes used when nothing parseable comes back.

pub mod parser;

pub use parser::parse;

/// Hard bounds on panels per story. The collaborator's panel count is
/// untrusted input and always clamped locally.
pub const MIN_PANELS: usize = 1;
pub const MAX_PANELS: usize = 4;

/// Pre-authored generic scene prompts, used when the text collaborator fails
/// or returns nothing parseable. Already safe: no personal references.
const FALLBACK_SCENES: &[&str] = &[
    "a winding path through a misty landscape, soft morning light",
    "a dramatic sky with storm clouds parting over distant hills",
    "a warm glowing doorway at the end of a long corridor",
    "a quiet rooftop view of a sleeping town under the stars",
];

/// Clamp a collaborator-chosen panel count into the supported range.
pub fn clamp_panel_count(count: usize) -> usize {
    count.clamp(MIN_PANELS, MAX_PANELS)
}

/// The fixed fallback scene prompts, `count` of them (clamped).
pub fn fallback_scenes(count: usize) -> Vec<String> {
    let count = clamp_panel_count(count);
    FALLBACK_SCENES
        .iter()
        .take(count)
        .map(|s| s.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_untrusted_counts() {
        assert_eq!(clamp_panel_count(0), 1);
        assert_eq!(clamp_panel_count(3), 3);
        assert_eq!(clamp_panel_count(99), 4);
    }

    #[test]
    fn fallback_scene_counts() {
        assert_eq!(fallback_scenes(3).len(), 3);
        assert_eq!(fallback_scenes(0).len(), 1);
        assert_eq!(fallback_scenes(10).len(), 4);
    }
}
