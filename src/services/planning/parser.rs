// Cascading parser for text-collaborator responses.
//
// Strategies are an ordered list of pure functions tried in sequence until
// one yields at least one non-empty prompt. The parser never errors;
// hopeless input degrades to an empty result and the caller substitutes its
// fixed fallback scenes.

use serde::Deserialize;
use tracing::debug;

/// Preferred schema: `{"panelCount": n, "panels": [{"panel": i, "storyPart": s, "prompt": p}]}`
#[derive(Debug, Deserialize)]
struct StrictResponse {
    #[serde(rename = "panelCount", alias = "panel_count")]
    #[allow(dead_code)]
    panel_count: i64,
    panels: Vec<PanelEntry>,
}

/// Legacy schema: `{"panels": [{"prompt": p}]}` — count implied by length
#[derive(Debug, Deserialize)]
struct LegacyResponse {
    panels: Vec<PanelEntry>,
}

#[derive(Debug, Deserialize)]
struct PanelEntry {
    prompt: Option<String>,
}

type Strategy = fn(&str) -> Vec<String>;

const STRATEGIES: &[(&str, Strategy)] = &[
    ("strict-json", parse_strict_json),
    ("legacy-json", parse_legacy_json),
    ("numbered-lines", parse_numbered_lines),
    ("paragraphs", parse_paragraphs),
];

/// Extract ordered panel prompts from a raw collaborator response.
/// Returns an empty vec only when every strategy fails.
pub fn parse(raw_response: &str) -> Vec<String> {
    let stripped = strip_code_fence(raw_response);
    for (name, strategy) in STRATEGIES {
        let prompts = strategy(&stripped);
        if !prompts.is_empty() {
            debug!(strategy = name, count = prompts.len(), "response parsed");
            return prompts;
        }
    }
    debug!("no parser strategy matched");
    Vec::new()
}

/// Remove a leading/trailing fence marker line (``` or ```json etc.)
fn strip_code_fence(text: &str) -> String {
    let mut lines: Vec<&str> = text.lines().collect();
    while lines.first().is_some_and(|l| l.trim().is_empty()) {
        lines.remove(0);
    }
    while lines.last().is_some_and(|l| l.trim().is_empty()) {
        lines.pop();
    }
    if lines.first().is_some_and(|l| l.trim().starts_with("```")) {
        lines.remove(0);
    }
    if lines.last().is_some_and(|l| l.trim().starts_with("```")) {
        lines.pop();
    }
    lines.join("\n")
}

fn parse_strict_json(text: &str) -> Vec<String> {
    match serde_json::from_str::<StrictResponse>(text) {
        Ok(response) => collect_prompts(response.panels),
        Err(_) => Vec::new(),
    }
}

fn parse_legacy_json(text: &str) -> Vec<String> {
    match serde_json::from_str::<LegacyResponse>(text) {
        Ok(response) => collect_prompts(response.panels),
        Err(_) => Vec::new(),
    }
}

fn collect_prompts(panels: Vec<PanelEntry>) -> Vec<String> {
    panels
        .into_iter()
        .filter_map(|p| p.prompt)
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect()
}

/// Numbered-list patterns, tested per line in order:
/// `1. text`, `1) text`, `1: text`, `Scene 1: text` (keyword case-insensitive,
/// separator after the number optional for the Scene form).
fn parse_numbered_lines(text: &str) -> Vec<String> {
    text.lines()
        .filter_map(|line| {
            let line = line.trim();
            capture_numbered(line).or_else(|| capture_scene(line))
        })
        .filter(|s| !s.is_empty())
        .collect()
}

fn capture_numbered(line: &str) -> Option<String> {
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 {
        return None;
    }
    let rest = &line[digits..];
    let mut chars = rest.chars();
    match chars.next() {
        Some('.') | Some(')') | Some(':') => Some(chars.as_str().trim().to_string()),
        _ => None,
    }
}

fn capture_scene(line: &str) -> Option<String> {
    let lower = line.to_ascii_lowercase();
    let rest = lower.strip_prefix("scene")?;
    let skipped = lower.len() - rest.len();
    let rest = &line[skipped..];

    let rest = rest.trim_start();
    let digits = rest.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 {
        return None;
    }
    let mut rest = &rest[digits..];
    if let Some(stripped) = rest
        .strip_prefix(':')
        .or_else(|| rest.strip_prefix('.'))
        .or_else(|| rest.strip_prefix(')'))
    {
        rest = stripped;
    }
    Some(rest.trim().to_string())
}

/// Split on blank-line boundaries; each block becomes one prompt.
fn parse_paragraphs(text: &str) -> Vec<String> {
    text.split("\n\n")
        .flat_map(|block| block.split("\r\n\r\n"))
        .map(|block| {
            block
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
        })
        .filter(|block| !block.is_empty())
        .collect()
}
