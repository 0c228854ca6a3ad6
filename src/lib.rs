// Library exports for the journal-to-comic generation service

pub mod core;
pub mod middleware;
pub mod orchestration;
pub mod services;
pub mod utils;

// Re-export commonly used types and functions
pub use core::{
    config::Config,
    errors::{
        CompositionError, ConfigError, GenerationError, PlanningError, RenderError,
    },
    types::{
        ComposedPage, GenerationOptions, JobOutcome, JobPhase, JobSnapshot, JobState,
        LayoutStyle, RenderedPanel, SanitizedPrompt,
    },
};

pub use middleware::{CollaboratorHealth, HealthConfig, HealthState};

pub use orchestration::GenerationOrchestrator;

pub use services::{
    ComicTextRenderer, ContentGuard, GeminiCollaborator, PageCompositor, PanelIllustrator,
    PlaceholderRenderer, PromptSanitizer, SceneClassifier, ScenePlanner,
};

pub use utils::{image_ops::to_data_url, Metrics};
