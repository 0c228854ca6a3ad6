// Generation orchestrator: the single coordinator that takes a journal story
// through planning, panel rendering and page composition.
//
// One job runs at a time. Submitting a new story cancels the active job and
// takes over. The remote/local branch is decided exactly once per job, at
// planning time; panels then render strictly in order so a cancel lands
// between panels, never mid-image.

use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use parking_lot::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::core::config::Config;
use crate::core::errors::{ConfigResult, GenerationError, GenerationResult};
use crate::core::types::{
    ComposedPage, GenerationOptions, JobOutcome, JobPhase, JobSnapshot, JobState, PageLayout,
    PanelPlan, RenderedPanel, SanitizedPrompt,
};
use crate::middleware::CollaboratorHealth;
use crate::services::classifier::SceneClassifier;
use crate::services::collaborator::{
    PanelIllustrator, ScenePlanner, NEGATIVE_PROMPT, STYLE_SUFFIX,
};
use crate::services::compositor::PageCompositor;
use crate::services::layout::{build_layout, compute_slots, PageGeometry};
use crate::services::placeholder::PlaceholderRenderer;
use crate::services::planning;
use crate::services::safety::{ContentGuard, PromptSanitizer, Vocabulary};
use crate::services::typesetting::ComicTextRenderer;
use crate::utils::image_ops::encode_png_sync;
use crate::utils::Metrics;

/// Grace period for a cancelled job to observe its flag before the
/// replacement starts.
const TAKEOVER_SETTLE: Duration = Duration::from_millis(150);

pub struct GenerationOrchestrator {
    config: Arc<Config>,
    planner: Option<Arc<dyn ScenePlanner>>,
    illustrator: Option<Arc<dyn PanelIllustrator>>,
    remote_health: CollaboratorHealth,
    sanitizer: PromptSanitizer,
    guard: ContentGuard,
    classifier: SceneClassifier,
    placeholder: Arc<PlaceholderRenderer>,
    compositor: Arc<PageCompositor>,
    metrics: Metrics,
    active_job: Mutex<Option<Arc<JobState>>>,
}

impl GenerationOrchestrator {
    #[instrument(skip_all)]
    pub fn new(
        config: Arc<Config>,
        planner: Option<Arc<dyn ScenePlanner>>,
        illustrator: Option<Arc<dyn PanelIllustrator>>,
        remote_health: CollaboratorHealth,
        metrics: Metrics,
    ) -> ConfigResult<Self> {
        let vocabulary = Vocabulary::from_config(&config.safety)?;
        let text = Arc::new(ComicTextRenderer::new());

        info!(
            remote = illustrator.is_some(),
            local_fallback = config.collaborator.local_fallback_enabled,
            "✓ Orchestrator ready"
        );

        Ok(Self {
            config,
            planner,
            illustrator,
            remote_health,
            sanitizer: PromptSanitizer::new(),
            guard: ContentGuard::new(vocabulary),
            classifier: SceneClassifier::new(),
            placeholder: Arc::new(PlaceholderRenderer::new(Arc::clone(&text))),
            compositor: Arc::new(PageCompositor::new(text)),
            metrics,
            active_job: Mutex::new(None),
        })
    }

    /// Request cancellation of the active job, if any. Returns whether a
    /// running job was asked to stop.
    pub fn cancel_active(&self) -> bool {
        let guard = self.active_job.lock();
        match guard.as_ref() {
            Some(job) if !job.phase().is_terminal() => {
                job.request_cancel();
                info!("cancellation requested");
                true
            }
            _ => false,
        }
    }

    pub fn active_snapshot(&self) -> Option<JobSnapshot> {
        self.active_job.lock().as_ref().map(|job| job.snapshot())
    }

    /// Run a full generation job. A non-terminal active job is cancelled and
    /// replaced. Cancellation surfaces as `JobPhase::Cancelled` in the
    /// outcome, never as an error.
    #[instrument(skip(self, story, options), fields(story_len = story.len()))]
    pub async fn generate(
        &self,
        story: &str,
        options: &GenerationOptions,
    ) -> GenerationResult<JobOutcome> {
        let job = self.take_over().await;
        self.metrics.record_job_started();

        // -- Planning ---------------------------------------------------
        job.set_phase(JobPhase::Planning);
        job.set_status("planning scenes");
        job.set_progress(0.05);
        let planning_start = Instant::now();

        let force_local = options.force_local.unwrap_or(false);
        let use_remote = self.illustrator.is_some()
            && self.config.collaborator.remote_enabled
            && !force_local
            && self.remote_health.allow_request();

        if !use_remote && !self.config.collaborator.local_fallback_enabled {
            job.set_phase(JobPhase::Failed);
            self.metrics.record_job_failed();
            return Err(GenerationError::NotSupported);
        }

        let prompts = self.plan(story, use_remote).await;
        let safe_prompts = self.make_safe(prompts);

        let style = options
            .layout_style
            .unwrap_or(self.config.generation.layout_style);
        let geometry = PageGeometry {
            width: self.config.generation.page_width,
            height: self.config.generation.page_height,
            margin: self.config.generation.margin,
            gutter: self.config.generation.gutter,
        };
        let layout = build_layout(
            &safe_prompts,
            self.config.generation.panels_per_page,
            geometry,
            style,
        );
        let panel_count = layout.total_panels();

        self.metrics.record_planning_duration(planning_start.elapsed());
        debug!(panel_count, use_remote, "plan ready");

        // -- Rendering --------------------------------------------------
        job.set_phase(JobPhase::RenderingPanels);
        job.set_progress(0.15);
        let rendering_start = Instant::now();

        let plans: Vec<PanelPlan> = layout
            .pages
            .iter()
            .flat_map(|page| page.panels.iter().cloned())
            .collect();

        let mut rendered: Vec<RenderedPanel> = Vec::with_capacity(panel_count);
        for (index, plan) in plans.iter().enumerate() {
            if job.is_cancel_requested() {
                return Ok(self.finish_cancelled(&job, panel_count, rendered.len(), use_remote));
            }

            job.set_status(format!("rendering panel {}/{}", index + 1, panel_count));
            let panel_start = Instant::now();
            let prompt = &plan.prompt;

            let result = if use_remote {
                self.render_remote(index, prompt).await
            } else {
                self.render_local(index, prompt).await
            };

            match result {
                Some(bytes) => {
                    rendered.push(RenderedPanel {
                        index,
                        image_bytes: bytes,
                        source_prompt: prompt.as_str().to_string(),
                        generation_ms: panel_start.elapsed().as_millis() as u64,
                    });
                    self.metrics.record_panel_rendered(use_remote);
                }
                None => self.metrics.record_panel_skipped(),
            }

            job.set_progress(0.15 + 0.7 * ((index + 1) as f32 / panel_count as f32));
        }

        self.metrics.record_rendering_duration(rendering_start.elapsed());

        if job.is_cancel_requested() {
            return Ok(self.finish_cancelled(&job, panel_count, rendered.len(), use_remote));
        }

        // -- Compositing ------------------------------------------------
        job.set_phase(JobPhase::Compositing);
        job.set_progress(0.85);
        let compositing_start = Instant::now();

        let panels_rendered = rendered.len();
        let pages_attempted = layout.pages.len();
        let pages = self
            .compose_pages(&job, &layout, geometry, rendered, options.title.as_deref())
            .await;

        self.metrics.record_compositing_duration(compositing_start.elapsed());

        if pages.is_empty() {
            job.set_phase(JobPhase::Failed);
            job.set_status("all pages failed");
            self.metrics.record_job_failed();
            return Err(GenerationError::AllPagesFailed { pages_attempted });
        }

        job.set_progress(1.0);
        job.set_status("done");
        job.set_phase(JobPhase::Done);
        self.metrics.record_job_completed();
        info!(pages = pages.len(), panels = panels_rendered, "job complete");

        Ok(JobOutcome {
            phase: JobPhase::Done,
            pages,
            panels_attempted: panel_count,
            panels_rendered,
            used_remote: use_remote,
        })
    }

    /// Cancel any non-terminal job and install a fresh JobState.
    async fn take_over(&self) -> Arc<JobState> {
        let previous = {
            let guard = self.active_job.lock();
            guard.as_ref().filter(|job| !job.phase().is_terminal()).cloned()
        };

        if let Some(previous) = previous {
            warn!("new story takes over a running job");
            previous.request_cancel();
            tokio::time::sleep(TAKEOVER_SETTLE).await;
        }

        let job = JobState::new();
        *self.active_job.lock() = Some(Arc::clone(&job));
        job
    }

    /// Produce raw panel prompts. The remote planner's response and the raw
    /// story both go through the same cascading parser; when nothing is
    /// parseable the pre-authored fallback scenes step in.
    async fn plan(&self, story: &str, use_remote: bool) -> Vec<String> {
        let raw = if use_remote {
            if let Some(planner) = &self.planner {
                match planner.plan_scenes(story).await {
                    Ok(response) => response,
                    Err(e) => {
                        warn!("scene planning failed, using fallback scenes: {e}");
                        String::new()
                    }
                }
            } else {
                story.to_string()
            }
        } else {
            story.to_string()
        };

        let mut prompts = planning::parse(&raw);
        if prompts.is_empty() {
            prompts = planning::fallback_scenes(self.config.generation.fallback_panel_count);
        }
        prompts.truncate(planning::MAX_PANELS);
        prompts
    }

    /// Sanitize every prompt; anything the guard still rejects is replaced
    /// by a guaranteed-safe fallback built from the original text.
    fn make_safe(&self, prompts: Vec<String>) -> Vec<SanitizedPrompt> {
        prompts
            .into_iter()
            .map(|raw| {
                let sanitized = self.sanitizer.sanitize(&raw);
                if self.guard.is_clean(sanitized.as_str()) {
                    sanitized
                } else {
                    debug!("prompt replaced by safe fallback");
                    self.guard.fallback(&raw)
                }
            })
            .collect()
    }

    async fn render_remote(&self, index: usize, prompt: &SanitizedPrompt) -> Option<Vec<u8>> {
        let illustrator = self.illustrator.as_ref()?;

        let text = prompt.as_str();
        let full_prompt = if text.ends_with(STYLE_SUFFIX) {
            text.to_string()
        } else {
            format!("{text}, {STYLE_SUFFIX}")
        };

        match illustrator.illustrate(&full_prompt, NEGATIVE_PROMPT).await {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                warn!(panel = index, "remote render failed, panel skipped: {e}");
                None
            }
        }
    }

    async fn render_local(&self, index: usize, prompt: &SanitizedPrompt) -> Option<Vec<u8>> {
        let style = self.classifier.classify(prompt.as_str());
        let placeholder = Arc::clone(&self.placeholder);
        let text = prompt.as_str().to_string();
        let size = self.config.generation.panel_size;

        let result = tokio::task::spawn_blocking(move || {
            let img = placeholder.render(&text, &style, size);
            encode_png_sync(&img)
        })
        .await;

        match result {
            Ok(Ok(bytes)) => Some(bytes),
            Ok(Err(e)) => {
                warn!(panel = index, "panel encoding failed: {e}");
                None
            }
            Err(e) => {
                warn!(panel = index, "panel render task failed: {e}");
                None
            }
        }
    }

    /// Compose every page, dropping the ones with zero usable panels.
    async fn compose_pages(
        &self,
        job: &Arc<JobState>,
        layout: &PageLayout,
        geometry: PageGeometry,
        rendered: Vec<RenderedPanel>,
        title: Option<&str>,
    ) -> Vec<ComposedPage> {
        let total_pages = layout.pages.len();
        let mut pages = Vec::with_capacity(total_pages);
        let mut offset = 0usize;

        for (page_number, page_plan) in layout.pages.iter().enumerate() {
            job.set_status(format!("composing page {}/{}", page_number + 1, total_pages));
            let count = page_plan.panels.len();

            // Re-key this page's panels to page-local slot indices
            let page_panels: Vec<RenderedPanel> = rendered
                .iter()
                .filter(|p| p.index >= offset && p.index < offset + count)
                .map(|p| RenderedPanel {
                    index: p.index - offset,
                    image_bytes: p.image_bytes.clone(),
                    source_prompt: p.source_prompt.clone(),
                    generation_ms: p.generation_ms,
                })
                .collect();
            offset += count;

            let slots = compute_slots(count, geometry, layout.style);
            let compositor = Arc::clone(&self.compositor);
            let title = title.map(|t| t.to_string());

            let result = tokio::task::spawn_blocking(move || {
                let title = title.as_deref();
                let page = compositor.compose(&page_panels, &slots, geometry, title, page_number)?;
                let bytes = encode_png_sync(&page).map_err(|e| {
                    crate::core::errors::CompositionError::ImageError(
                        image::ImageError::IoError(std::io::Error::other(e.to_string())),
                    )
                })?;
                Ok::<Vec<u8>, crate::core::errors::CompositionError>(bytes)
            })
            .await;

            match result {
                Ok(Ok(bytes)) => {
                    self.metrics.record_page_composed();
                    pages.push(ComposedPage {
                        page_number,
                        image_bytes: bytes,
                        created_at: SystemTime::now(),
                    });
                }
                Ok(Err(e)) => {
                    warn!(page = page_number, "page dropped: {e}");
                    self.metrics.record_page_dropped();
                }
                Err(e) => {
                    warn!(page = page_number, "composition task failed: {e}");
                    self.metrics.record_page_dropped();
                }
            }

            let done = (page_number + 1) as f32 / total_pages as f32;
            job.set_progress(0.85 + 0.15 * done * 0.9);
        }

        pages
    }

    fn finish_cancelled(
        &self,
        job: &Arc<JobState>,
        panels_attempted: usize,
        panels_rendered: usize,
        used_remote: bool,
    ) -> JobOutcome {
        job.set_status("cancelled");
        job.set_phase(JobPhase::Cancelled);
        self.metrics.record_job_cancelled();
        info!(
            panels_rendered,
            panels_attempted, "job cancelled between panels"
        );
        JobOutcome {
            phase: JobPhase::Cancelled,
            pages: Vec::new(),
            panels_attempted,
            panels_rendered,
            used_remote,
        }
    }
}
