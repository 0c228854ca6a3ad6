// End-to-end pipeline tests with deterministic collaborator fakes.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use image::{Rgba, RgbaImage};
use once_cell::sync::OnceCell;

use comic_weaver::core::config::Config;
use comic_weaver::core::errors::{PlanningResult, RenderError, RenderResult};
use comic_weaver::core::types::{GenerationOptions, JobPhase, LayoutStyle};
use comic_weaver::middleware::CollaboratorHealth;
use comic_weaver::orchestration::GenerationOrchestrator;
use comic_weaver::services::collaborator::{PanelIllustrator, ScenePlanner};
use comic_weaver::utils::image_ops::encode_png_sync;
use comic_weaver::utils::Metrics;

fn tiny_png(color: Rgba<u8>) -> Vec<u8> {
    encode_png_sync(&RgbaImage::from_pixel(8, 8, color)).unwrap()
}

fn local_orchestrator() -> GenerationOrchestrator {
    GenerationOrchestrator::new(
        Arc::new(Config::for_tests()),
        None,
        None,
        CollaboratorHealth::new(),
        Metrics::new(),
    )
    .unwrap()
}

fn remote_config() -> Config {
    let mut config = Config::for_tests();
    config.collaborator.remote_enabled = true;
    config
}

struct FakePlanner {
    response: String,
}

#[async_trait]
impl ScenePlanner for FakePlanner {
    async fn plan_scenes(&self, _story: &str) -> PlanningResult<String> {
        Ok(self.response.clone())
    }
}

struct FakeIllustrator {
    calls: AtomicUsize,
    fail_on: Option<usize>,
}

impl FakeIllustrator {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_on: None,
        }
    }

    fn failing_on(call: usize) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_on: Some(call),
        }
    }
}

#[async_trait]
impl PanelIllustrator for FakeIllustrator {
    async fn illustrate(&self, _prompt: &str, _negative_prompt: &str) -> RenderResult<Vec<u8>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_on == Some(call) {
            return Err(RenderError::MissingImageData);
        }
        Ok(tiny_png(Rgba([0, 128, 255, 255])))
    }
}

/// Cancels the active job from inside the first illustrate call, so the
/// sequential render loop observes the flag before panel two.
struct CancellingIllustrator {
    orchestrator: OnceCell<Arc<GenerationOrchestrator>>,
    calls: AtomicUsize,
}

#[async_trait]
impl PanelIllustrator for CancellingIllustrator {
    async fn illustrate(&self, _prompt: &str, _negative_prompt: &str) -> RenderResult<Vec<u8>> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            if let Some(orch) = self.orchestrator.get() {
                assert!(orch.cancel_active());
            }
        }
        Ok(tiny_png(Rgba([200, 200, 200, 255])))
    }
}

fn strict_json_plan(prompts: &[&str]) -> String {
    let panels: Vec<String> = prompts
        .iter()
        .enumerate()
        .map(|(i, p)| {
            format!(
                r#"{{"panel": {}, "storyPart": "part {}", "prompt": "{}"}}"#,
                i + 1,
                i + 1,
                p
            )
        })
        .collect();
    format!(
        "```json\n{{\"panelCount\": {}, \"panels\": [{}]}}\n```",
        prompts.len(),
        panels.join(", ")
    )
}

#[tokio::test]
async fn local_story_end_to_end() {
    let orch = local_orchestrator();
    let outcome = orch
        .generate(
            "The cat escaped through a crumbling door into the storm",
            &GenerationOptions::default(),
        )
        .await
        .unwrap();

    assert_eq!(outcome.phase, JobPhase::Done);
    assert!(!outcome.used_remote);
    assert_eq!(outcome.panels_attempted, 1);
    assert_eq!(outcome.panels_rendered, 1);
    assert_eq!(outcome.pages.len(), 1);

    // Pages are valid PNGs at configured page size
    let page = image::load_from_memory(&outcome.pages[0].image_bytes).unwrap();
    assert_eq!(page.width(), 512);
    assert_eq!(page.height(), 768);
}

#[tokio::test]
async fn personal_journal_text_still_produces_pages() {
    let orch = local_orchestrator();
    let outcome = orch
        .generate(
            "I was running through my house when my friend called my name.",
            &GenerationOptions::default(),
        )
        .await
        .unwrap();
    assert_eq!(outcome.phase, JobPhase::Done);
    assert!(!outcome.pages.is_empty());
}

#[tokio::test]
async fn remote_plan_and_illustrate() {
    let planner = Arc::new(FakePlanner {
        response: strict_json_plan(&["a door opens onto a bright field", "a storm rolls in"]),
    });
    let illustrator = Arc::new(FakeIllustrator::new());

    let orch = GenerationOrchestrator::new(
        Arc::new(remote_config()),
        Some(planner),
        Some(illustrator.clone()),
        CollaboratorHealth::new(),
        Metrics::new(),
    )
    .unwrap();

    let outcome = orch
        .generate("Two moments from today.", &GenerationOptions::default())
        .await
        .unwrap();

    assert_eq!(outcome.phase, JobPhase::Done);
    assert!(outcome.used_remote);
    assert_eq!(outcome.panels_attempted, 2);
    assert_eq!(outcome.panels_rendered, 2);
    assert_eq!(outcome.pages.len(), 1);
    assert_eq!(illustrator.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn failed_remote_panel_is_skipped_not_fatal() {
    let planner = Arc::new(FakePlanner {
        response: strict_json_plan(&["first scene", "second scene"]),
    });
    let illustrator = Arc::new(FakeIllustrator::failing_on(1));

    let orch = GenerationOrchestrator::new(
        Arc::new(remote_config()),
        Some(planner),
        Some(illustrator),
        CollaboratorHealth::new(),
        Metrics::new(),
    )
    .unwrap();

    let outcome = orch
        .generate("Two moments.", &GenerationOptions::default())
        .await
        .unwrap();

    assert_eq!(outcome.phase, JobPhase::Done);
    assert_eq!(outcome.panels_attempted, 2);
    assert_eq!(outcome.panels_rendered, 1);
    assert_eq!(outcome.pages.len(), 1);
}

#[tokio::test]
async fn force_local_ignores_remote_collaborators() {
    let planner = Arc::new(FakePlanner {
        response: strict_json_plan(&["should not be used"]),
    });
    let illustrator = Arc::new(FakeIllustrator::new());

    let orch = GenerationOrchestrator::new(
        Arc::new(remote_config()),
        Some(planner),
        Some(illustrator.clone()),
        CollaboratorHealth::new(),
        Metrics::new(),
    )
    .unwrap();

    let options = GenerationOptions {
        force_local: Some(true),
        ..Default::default()
    };
    let outcome = orch.generate("A quiet evening.", &options).await.unwrap();

    assert!(!outcome.used_remote);
    assert_eq!(illustrator.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn cancellation_lands_between_panels() {
    let planner = Arc::new(FakePlanner {
        response: strict_json_plan(&["one", "two", "three", "four"]),
    });
    let illustrator = Arc::new(CancellingIllustrator {
        orchestrator: OnceCell::new(),
        calls: AtomicUsize::new(0),
    });

    let orch = Arc::new(
        GenerationOrchestrator::new(
            Arc::new(remote_config()),
            Some(planner),
            Some(illustrator.clone()),
            CollaboratorHealth::new(),
            Metrics::new(),
        )
        .unwrap(),
    );
    illustrator.orchestrator.set(Arc::clone(&orch)).ok().unwrap();

    let outcome = orch
        .generate("Four moments.", &GenerationOptions::default())
        .await
        .unwrap();

    assert_eq!(outcome.phase, JobPhase::Cancelled);
    assert!(outcome.pages.is_empty());
    assert_eq!(outcome.panels_rendered, 1);
    // The cancel flag is checked before each panel, so only one call went out
    assert_eq!(illustrator.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn layout_override_applies() {
    let orch = local_orchestrator();
    let story = "First.\n\nSecond.\n\nThird.";
    for style in [LayoutStyle::Vertical, LayoutStyle::Grid, LayoutStyle::Widescreen] {
        let options = GenerationOptions {
            layout_style: Some(style),
            ..Default::default()
        };
        let outcome = orch.generate(story, &options).await.unwrap();
        assert_eq!(outcome.phase, JobPhase::Done);
        assert_eq!(outcome.pages.len(), 1);
    }
}

#[tokio::test]
async fn title_banner_renders_on_first_page() {
    let orch = local_orchestrator();
    let options = GenerationOptions {
        title: Some("My Week".to_string()),
        ..Default::default()
    };
    let outcome = orch.generate("A calm lake at sunset.", &options).await.unwrap();
    assert_eq!(outcome.phase, JobPhase::Done);
    // Banner drawing degrades silently without fonts; the page must still compose
    assert_eq!(outcome.pages.len(), 1);
}
