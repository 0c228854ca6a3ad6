// Service modules for the journal-to-comic pipeline

pub mod classifier;
pub mod collaborator;
pub mod compositor;
pub mod layout;
pub mod placeholder;
pub mod planning;
pub mod safety;
pub mod typesetting;

pub use classifier::SceneClassifier;
pub use collaborator::{GeminiCollaborator, PanelIllustrator, ScenePlanner};
pub use compositor::PageCompositor;
pub use placeholder::PlaceholderRenderer;
pub use safety::{ContentGuard, PromptSanitizer};
pub use typesetting::ComicTextRenderer;
