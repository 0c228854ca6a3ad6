// Core module: configuration, errors, and shared types

pub mod config;
pub mod errors;
pub mod types;

pub use config::Config;
pub use errors::{
    CompositionError, ConfigError, GenerationError, PlanningError, RenderError,
};
pub use types::{
    ArchetypeKind, ComposedPage, JobOutcome, JobPhase, JobState, LayoutStyle, PageLayout,
    PagePlan, Palette, PanelPlan, RenderedPanel, SanitizedPrompt, SceneStyle,
};
