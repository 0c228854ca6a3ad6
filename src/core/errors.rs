// Custom error types for the generation pipeline
//
// Using thiserror for ergonomic error definitions with:
// - Context preservation
// - Type-safe error matching
// - Source error chaining

use thiserror::Error;

/// Scene planning errors (text collaborator + response parsing)
#[derive(Debug, Error)]
pub enum PlanningError {
    #[error("Collaborator request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("Collaborator unresponsive after {0}s")]
    Timeout(u64),

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),
}

/// Panel rendering errors
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Image collaborator request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("Collaborator returned no image data")]
    MissingImageData,

    #[error("Image payload decode failed: {0}")]
    PayloadDecode(#[from] base64::DecodeError),

    #[error("Image decoding failed: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("Collaborator unresponsive after {0}s")]
    Timeout(u64),
}

/// Page compositing errors
#[derive(Debug, Error)]
pub enum CompositionError {
    #[error("Page {page_number} has zero renderable panels")]
    NoPanels { page_number: usize },

    #[error("Image encoding failed: {0}")]
    ImageError(#[from] image::ImageError),
}

/// Job-level errors surfaced to the caller.
///
/// Only `NotSupported` and `AllPagesFailed` terminate a job as a failure;
/// per-panel and per-parse problems are recovered internally. Cancellation
/// is reported through the job phase, never as an error.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("No generation capability available (remote unreachable and local generation disabled)")]
    NotSupported,

    #[error("No page could be composed ({pages_attempted} pages attempted)")]
    AllPagesFailed { pages_attempted: usize },
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid panel size {0} (must be 64..=2048)")]
    InvalidPanelSize(u32),

    #[error("Invalid page size {width}x{height}")]
    InvalidPageSize { width: u32, height: u32 },

    #[error("Margin + gutter leave no drawable area (margin {margin}, gutter {gutter})")]
    InvalidSpacing { margin: u32, gutter: u32 },

    #[error("Unknown layout style: {0}")]
    UnknownLayoutStyle(String),

    #[error("Fallback panel count must be in 1..=4, got {0}")]
    InvalidFallbackPanelCount(usize),

    #[error("Vocabulary file unreadable: {path}: {source}")]
    VocabularyFileUnreadable {
        path: String,
        source: std::io::Error,
    },
}

// Convenience type aliases for Results
pub type PlanningResult<T> = Result<T, PlanningError>;
pub type RenderResult<T> = Result<T, RenderError>;
pub type CompositionResult<T> = Result<T, CompositionError>;
pub type GenerationResult<T> = Result<T, GenerationError>;
pub type ConfigResult<T> = Result<T, ConfigError>;
