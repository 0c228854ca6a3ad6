// Remote generation collaborators.
//
// The orchestrator talks to the text and image models through these traits so
// tests can substitute deterministic fakes and so the local pipeline needs no
// network stack at all.

pub mod gemini;

pub use gemini::GeminiCollaborator;

use async_trait::async_trait;

use crate::core::errors::{PlanningResult, RenderResult};

/// Style anchor appended to every image prompt, remote or local fallback.
pub const STYLE_SUFFIX: &str =
    "flat vector illustration, bold outlines, vivid colors, no gradients";

/// Exclusions sent alongside every image prompt.
pub const NEGATIVE_PROMPT: &str =
    "photorealism, 3d render, photograph, blur, text, watermark, realistic faces";

/// Text collaborator: turns a journal story into a raw scene-plan response.
/// The response is untrusted and goes through the cascading parser.
#[async_trait]
pub trait ScenePlanner: Send + Sync {
    async fn plan_scenes(&self, story: &str) -> PlanningResult<String>;
}

/// Image collaborator: renders one panel prompt into PNG bytes.
#[async_trait]
pub trait PanelIllustrator: Send + Sync {
    async fn illustrate(&self, prompt: &str, negative_prompt: &str) -> RenderResult<Vec<u8>>;
}
