// Shared data model for the journal-to-comic pipeline

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use parking_lot::RwLock;

/// A scene description guaranteed (by construction or guard fallback) to be
/// safe to hand to an image collaborator. Built once per panel and owned by it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizedPrompt(String);

impl SanitizedPrompt {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl std::fmt::Display for SanitizedPrompt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fixed scene archetype buckets driving placeholder rendering.
///
/// Classification checks these in declaration order; the first match wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchetypeKind {
    Monster,
    Hero,
    Shadow,
    Action,
    Flying,
    Chase,
    Generic,
}

/// RGB palette derived deterministically from an archetype
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub primary: [u8; 3],
    pub secondary: [u8; 3],
    pub accent: [u8; 3],
}

/// Full classification of a panel prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneStyle {
    pub kind: ArchetypeKind,
    pub palette: Palette,
    pub sound_effect: String,
}

/// Page layout strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutStyle {
    Vertical,
    Grid,
    Widescreen,
    Dynamic,
}

impl std::str::FromStr for LayoutStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "vertical" => Ok(Self::Vertical),
            "grid" => Ok(Self::Grid),
            "widescreen" => Ok(Self::Widescreen),
            "dynamic" => Ok(Self::Dynamic),
            other => Err(other.to_string()),
        }
    }
}

/// Relative weight of a panel within its page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizeClass {
    Full,
    Wide,
    Half,
    Quarter,
}

/// One planned panel. `index` is contiguous 0..N-1 within a page; no two
/// plans on the same page share a (row, col) position.
#[derive(Debug, Clone)]
pub struct PanelPlan {
    pub index: usize,
    pub row: usize,
    pub col: usize,
    pub size_class: SizeClass,
    pub prompt: SanitizedPrompt,
    pub caption: Option<String>,
}

/// One page's worth of planned panels, in draw order
#[derive(Debug, Clone)]
pub struct PagePlan {
    pub panels: Vec<PanelPlan>,
}

/// Whole-story layout. Sum of panel counts across pages equals the panel
/// count decided for the story.
#[derive(Debug, Clone)]
pub struct PageLayout {
    pub style: LayoutStyle,
    pub pages: Vec<PagePlan>,
}

impl PageLayout {
    pub fn total_panels(&self) -> usize {
        self.pages.iter().map(|p| p.panels.len()).sum()
    }
}

/// A successfully rendered panel. A failed render produces no RenderedPanel;
/// composition tolerates the gap.
#[derive(Clone)]
pub struct RenderedPanel {
    pub index: usize,
    pub image_bytes: Vec<u8>,
    pub source_prompt: String,
    pub generation_ms: u64,
}

impl std::fmt::Debug for RenderedPanel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderedPanel")
            .field("index", &self.index)
            .field("image_bytes", &format!("{} bytes", self.image_bytes.len()))
            .field("source_prompt", &self.source_prompt)
            .field("generation_ms", &self.generation_ms)
            .finish()
    }
}

/// A composed page image (PNG bytes)
#[derive(Clone)]
pub struct ComposedPage {
    pub page_number: usize,
    pub image_bytes: Vec<u8>,
    pub created_at: SystemTime,
}

impl std::fmt::Debug for ComposedPage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComposedPage")
            .field("page_number", &self.page_number)
            .field("image_bytes", &format!("{} bytes", self.image_bytes.len()))
            .finish()
    }
}

/// Job lifecycle phases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobPhase {
    Idle,
    Planning,
    RenderingPanels,
    Compositing,
    Done,
    Cancelled,
    Failed,
}

impl JobPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Cancelled | Self::Failed)
    }
}

/// Shared, single-writer job state. Only the orchestrator mutates phase,
/// progress and status; every other component receives data by value.
/// Cancellation is the one field any holder may set.
pub struct JobState {
    phase: RwLock<JobPhase>,
    // f32 progress stored as bits so readers never take a lock
    progress_bits: AtomicU32,
    status_message: RwLock<String>,
    cancel_requested: AtomicBool,
}

impl JobState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            phase: RwLock::new(JobPhase::Idle),
            progress_bits: AtomicU32::new(0f32.to_bits()),
            status_message: RwLock::new(String::new()),
            cancel_requested: AtomicBool::new(false),
        })
    }

    pub fn phase(&self) -> JobPhase {
        *self.phase.read()
    }

    pub fn set_phase(&self, phase: JobPhase) {
        *self.phase.write() = phase;
    }

    pub fn progress(&self) -> f32 {
        f32::from_bits(self.progress_bits.load(Ordering::Relaxed))
    }

    /// Advance progress. Values below the current progress are ignored so the
    /// reported value stays monotonic.
    pub fn set_progress(&self, value: f32) {
        let clamped = value.clamp(0.0, 1.0);
        let mut current = self.progress_bits.load(Ordering::Relaxed);
        loop {
            if f32::from_bits(current) >= clamped {
                return;
            }
            match self.progress_bits.compare_exchange_weak(
                current,
                clamped.to_bits(),
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return,
                Err(observed) => current = observed,
            }
        }
    }

    pub fn status_message(&self) -> String {
        self.status_message.read().clone()
    }

    pub fn set_status(&self, message: impl Into<String>) {
        *self.status_message.write() = message.into();
    }

    pub fn request_cancel(&self) {
        self.cancel_requested.store(true, Ordering::SeqCst);
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.cancel_requested.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            phase: self.phase(),
            progress: self.progress(),
            status_message: self.status_message(),
            cancel_requested: self.is_cancel_requested(),
        }
    }
}

/// Serializable view of a job's state
#[derive(Debug, Clone, Serialize)]
pub struct JobSnapshot {
    pub phase: JobPhase,
    pub progress: f32,
    pub status_message: String,
    pub cancel_requested: bool,
}

/// Final result of a generation job. Cancellation is an outcome, not an
/// error: `phase` is `Cancelled` and `pages` is empty.
#[derive(Debug)]
pub struct JobOutcome {
    pub phase: JobPhase,
    pub pages: Vec<ComposedPage>,
    pub panels_attempted: usize,
    pub panels_rendered: usize,
    pub used_remote: bool,
}

/// Per-job request options accepted by the HTTP surface
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerationOptions {
    /// Override the configured layout style
    pub layout_style: Option<LayoutStyle>,
    /// Optional title rendered as a banner on the first page
    pub title: Option<String>,
    /// Force the local pipeline even when a remote collaborator is healthy
    pub force_local: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_is_monotonic() {
        let state = JobState::new();
        state.set_progress(0.4);
        state.set_progress(0.2);
        assert_eq!(state.progress(), 0.4);
        state.set_progress(0.9);
        assert_eq!(state.progress(), 0.9);
        state.set_progress(2.0);
        assert_eq!(state.progress(), 1.0);
    }

    #[test]
    fn cancel_flag_roundtrip() {
        let state = JobState::new();
        assert!(!state.is_cancel_requested());
        state.request_cancel();
        assert!(state.is_cancel_requested());
    }

    #[test]
    fn layout_style_parses_case_insensitively() {
        assert_eq!("GRID".parse::<LayoutStyle>(), Ok(LayoutStyle::Grid));
        assert!("diagonal".parse::<LayoutStyle>().is_err());
    }
}
