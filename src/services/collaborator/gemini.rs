// Gemini API client implementing both collaborator traits.
//
// One HTTP client, shared health breaker, bounded retries with backoff.
// Retry only on 429/503 and transport errors; everything else fails the call
// immediately and the orchestrator decides what survives.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine};
use serde_json::json;
use tracing::{debug, instrument, warn};

use crate::core::config::Config;
use crate::core::errors::{PlanningError, PlanningResult, RenderError, RenderResult};
use crate::middleware::CollaboratorHealth;
use crate::services::collaborator::{PanelIllustrator, ScenePlanner};
use crate::utils::Metrics;

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

pub struct GeminiCollaborator {
    config: Arc<Config>,
    http_client: reqwest::Client,
    health: CollaboratorHealth,
    metrics: Option<Metrics>,
}

impl GeminiCollaborator {
    pub fn new(
        config: Arc<Config>,
        health: CollaboratorHealth,
        metrics: Option<Metrics>,
    ) -> Result<Self> {
        let timeout = Duration::from_secs(config.collaborator.request_timeout_secs);

        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            config,
            http_client,
            health,
            metrics,
        })
    }

    fn api_key(&self) -> &str {
        self.config.collaborator.api_key.as_deref().unwrap_or("")
    }

    /// POST with bounded retries. 429/503 and transport errors back off and
    /// retry; other HTTP errors fail immediately.
    async fn send_with_retries(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, reqwest::Error> {
        let max_retries = self.config.collaborator.max_retries;

        let mut attempt = 0;
        loop {
            let result = self
                .http_client
                .post(url)
                .header("Content-Type", "application/json")
                .json(body)
                .send()
                .await;

            match result {
                Ok(response) if response.status().is_success() => {
                    return response.json().await;
                }
                Ok(response) => {
                    let status = response.status();
                    let retryable = status.as_u16() == 429 || status.as_u16() == 503;

                    if retryable && attempt < max_retries {
                        warn!(
                            "Collaborator returned {}, retrying ({}/{})",
                            status,
                            attempt + 1,
                            max_retries
                        );
                        tokio::time::sleep(backoff_delay(attempt)).await;
                        attempt += 1;
                        continue;
                    }

                    match response.error_for_status() {
                        Ok(response) => return response.json().await,
                        Err(e) => return Err(e),
                    }
                }
                Err(e) => {
                    if attempt < max_retries {
                        debug!(
                            "HTTP request error: {}. Retrying ({}/{})",
                            e,
                            attempt + 1,
                            max_retries
                        );
                        tokio::time::sleep(backoff_delay(attempt)).await;
                        attempt += 1;
                        continue;
                    }
                    return Err(e);
                }
            }
        }
    }

    fn record_call(&self, success: bool, started: Instant) {
        if success {
            self.health.record_success();
        } else {
            self.health.record_failure();
        }
        if let Some(ref m) = self.metrics {
            m.record_collaborator_call(success, started.elapsed());
        }
    }
}

/// Exponential backoff with jitter: 1s, 2s, 4s... plus 0-999ms.
fn backoff_delay(attempt: u32) -> Duration {
    let base = 2_u64.pow(attempt.min(5));
    let jitter = rand::random::<u64>() % 1000;
    Duration::from_millis(base * 1000 + jitter)
}

#[async_trait]
impl ScenePlanner for GeminiCollaborator {
    #[instrument(skip(self, story), fields(story_len = story.len()))]
    async fn plan_scenes(&self, story: &str) -> PlanningResult<String> {
        let url = format!(
            "{}/{}:generateContent?key={}",
            API_BASE,
            self.config.collaborator.text_model,
            self.api_key()
        );

        let prompt = format!(
            "Split the following story into 1 to 4 comic panels. For each panel write \
             a short visual scene description with no people, no names, and no personal \
             references. Return JSON with 'panelCount' and a 'panels' array where each \
             object has 'panel' (1-indexed), 'storyPart' and 'prompt'.\n\nStory:\n{story}"
        );

        let request_body = json!({
            "contents": [{
                "parts": [{"text": prompt}]
            }],
            "generationConfig": {
                "response_mime_type": "application/json",
                "response_schema": {
                    "type": "object",
                    "properties": {
                        "panelCount": {"type": "integer"},
                        "panels": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "properties": {
                                    "panel": {"type": "integer"},
                                    "storyPart": {"type": "string"},
                                    "prompt": {"type": "string"}
                                },
                                "required": ["panel", "storyPart", "prompt"]
                            }
                        }
                    },
                    "required": ["panelCount", "panels"]
                }
            }
        });

        let start = Instant::now();
        let response = match self.send_with_retries(&url, &request_body).await {
            Ok(response) => response,
            Err(e) => {
                self.record_call(false, start);
                if e.is_timeout() {
                    return Err(PlanningError::Timeout(
                        self.config.collaborator.request_timeout_secs,
                    ));
                }
                return Err(PlanningError::RequestFailed(e));
            }
        };
        self.record_call(true, start);

        response["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| {
                PlanningError::InvalidResponse("missing text part in response".to_string())
            })
    }
}

#[async_trait]
impl PanelIllustrator for GeminiCollaborator {
    #[instrument(skip(self, prompt, negative_prompt))]
    async fn illustrate(&self, prompt: &str, negative_prompt: &str) -> RenderResult<Vec<u8>> {
        let url = format!(
            "{}/{}:generateContent?key={}",
            API_BASE,
            self.config.collaborator.image_model,
            self.api_key()
        );

        let text = format!("{prompt}. Do not include: {negative_prompt}.");
        let request_body = json!({
            "contents": [{
                "parts": [{"text": text}]
            }]
        });

        let start = Instant::now();
        let response = match self.send_with_retries(&url, &request_body).await {
            Ok(response) => response,
            Err(e) => {
                self.record_call(false, start);
                if e.is_timeout() {
                    return Err(RenderError::Timeout(
                        self.config.collaborator.request_timeout_secs,
                    ));
                }
                return Err(RenderError::RequestFailed(e));
            }
        };
        self.record_call(true, start);

        // The image part can land at any position; scan all parts for
        // inline data under either naming convention.
        let empty = Vec::new();
        let parts = response["candidates"][0]["content"]["parts"]
            .as_array()
            .unwrap_or(&empty);

        let image_base64 = parts
            .iter()
            .find_map(|part| {
                part["inline_data"]["data"]
                    .as_str()
                    .or_else(|| part["inlineData"]["data"].as_str())
            })
            .ok_or(RenderError::MissingImageData)?;

        let image_bytes = general_purpose::STANDARD.decode(image_base64)?;
        debug!(bytes = image_bytes.len(), "panel illustrated");
        Ok(image_bytes)
    }
}
