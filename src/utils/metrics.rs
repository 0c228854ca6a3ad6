use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Global metrics collector for the generation service.
///
/// Tracks job outcomes, panel/page throughput, collaborator usage, and
/// phase durations. Thread-safe and cheap to clone.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    // Job outcomes
    jobs_started: AtomicUsize,
    jobs_completed: AtomicUsize,
    jobs_cancelled: AtomicUsize,
    jobs_failed: AtomicUsize,

    // Panel/page throughput
    panels_rendered_remote: AtomicUsize,
    panels_rendered_local: AtomicUsize,
    panels_skipped: AtomicUsize,
    pages_composed: AtomicUsize,
    pages_dropped: AtomicUsize,

    // Collaborator calls
    collaborator_calls_total: AtomicUsize,
    collaborator_calls_failed: AtomicUsize,
    collaborator_latency_ms: RwLock<Vec<u64>>,

    // Phase durations
    planning_duration_ms: RwLock<Vec<u64>>,
    rendering_duration_ms: RwLock<Vec<u64>>,
    compositing_duration_ms: RwLock<Vec<u64>>,

    // Per-endpoint request counters
    endpoint_counters: DashMap<String, AtomicUsize>,

    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner {
                jobs_started: AtomicUsize::new(0),
                jobs_completed: AtomicUsize::new(0),
                jobs_cancelled: AtomicUsize::new(0),
                jobs_failed: AtomicUsize::new(0),
                panels_rendered_remote: AtomicUsize::new(0),
                panels_rendered_local: AtomicUsize::new(0),
                panels_skipped: AtomicUsize::new(0),
                pages_composed: AtomicUsize::new(0),
                pages_dropped: AtomicUsize::new(0),
                collaborator_calls_total: AtomicUsize::new(0),
                collaborator_calls_failed: AtomicUsize::new(0),
                collaborator_latency_ms: RwLock::new(Vec::new()),
                planning_duration_ms: RwLock::new(Vec::new()),
                rendering_duration_ms: RwLock::new(Vec::new()),
                compositing_duration_ms: RwLock::new(Vec::new()),
                endpoint_counters: DashMap::new(),
                start_time: Instant::now(),
            }),
        }
    }

    pub fn record_job_started(&self) {
        self.inner.jobs_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_job_completed(&self) {
        self.inner.jobs_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_job_cancelled(&self) {
        self.inner.jobs_cancelled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_job_failed(&self) {
        self.inner.jobs_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_panel_rendered(&self, remote: bool) {
        if remote {
            self.inner.panels_rendered_remote.fetch_add(1, Ordering::Relaxed);
        } else {
            self.inner.panels_rendered_local.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_panel_skipped(&self) {
        self.inner.panels_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_page_composed(&self) {
        self.inner.pages_composed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_page_dropped(&self) {
        self.inner.pages_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_collaborator_call(&self, success: bool, duration: Duration) {
        self.inner.collaborator_calls_total.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.inner.collaborator_calls_failed.fetch_add(1, Ordering::Relaxed);
        }
        self.inner
            .collaborator_latency_ms
            .write()
            .push(duration.as_millis() as u64);
    }

    pub fn record_planning_duration(&self, duration: Duration) {
        self.inner.planning_duration_ms.write().push(duration.as_millis() as u64);
    }

    pub fn record_rendering_duration(&self, duration: Duration) {
        self.inner.rendering_duration_ms.write().push(duration.as_millis() as u64);
    }

    pub fn record_compositing_duration(&self, duration: Duration) {
        self.inner
            .compositing_duration_ms
            .write()
            .push(duration.as_millis() as u64);
    }

    pub fn record_endpoint_request(&self, endpoint: &str) {
        self.inner
            .endpoint_counters
            .entry(endpoint.to_string())
            .or_insert_with(|| AtomicUsize::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let latency = self.inner.collaborator_latency_ms.read();
        let latency_avg = avg(&latency);
        let latency_p95 = percentile(&latency, 0.95);
        drop(latency);

        MetricsSnapshot {
            jobs_started: self.inner.jobs_started.load(Ordering::Relaxed),
            jobs_completed: self.inner.jobs_completed.load(Ordering::Relaxed),
            jobs_cancelled: self.inner.jobs_cancelled.load(Ordering::Relaxed),
            jobs_failed: self.inner.jobs_failed.load(Ordering::Relaxed),
            panels_rendered_remote: self.inner.panels_rendered_remote.load(Ordering::Relaxed),
            panels_rendered_local: self.inner.panels_rendered_local.load(Ordering::Relaxed),
            panels_skipped: self.inner.panels_skipped.load(Ordering::Relaxed),
            pages_composed: self.inner.pages_composed.load(Ordering::Relaxed),
            pages_dropped: self.inner.pages_dropped.load(Ordering::Relaxed),
            collaborator_calls_total: self.inner.collaborator_calls_total.load(Ordering::Relaxed),
            collaborator_calls_failed: self.inner.collaborator_calls_failed.load(Ordering::Relaxed),
            collaborator_latency_avg_ms: latency_avg,
            collaborator_latency_p95_ms: latency_p95,
            planning_avg_ms: avg(&self.inner.planning_duration_ms.read()),
            rendering_avg_ms: avg(&self.inner.rendering_duration_ms.read()),
            compositing_avg_ms: avg(&self.inner.compositing_duration_ms.read()),
            endpoint_requests: self
                .inner
                .endpoint_counters
                .iter()
                .map(|entry| (entry.key().clone(), entry.value().load(Ordering::Relaxed)))
                .collect(),
            uptime_seconds: self.inner.start_time.elapsed().as_secs(),
        }
    }

    /// Generate Prometheus-format metrics
    pub fn to_prometheus(&self) -> String {
        let s = self.snapshot();
        let mut out = format!(
            r#"# HELP jobs_started_total Generation jobs accepted
# TYPE jobs_started_total counter
jobs_started_total {{}} {}

# HELP jobs_completed_total Generation jobs finishing in Done
# TYPE jobs_completed_total counter
jobs_completed_total {{}} {}

# HELP jobs_cancelled_total Generation jobs finishing in Cancelled
# TYPE jobs_cancelled_total counter
jobs_cancelled_total {{}} {}

# HELP jobs_failed_total Generation jobs finishing in Failed
# TYPE jobs_failed_total counter
jobs_failed_total {{}} {}

# HELP panels_rendered_total Panels rendered, by source
# TYPE panels_rendered_total counter
panels_rendered_total {{source="remote"}} {}
panels_rendered_total {{source="local"}} {}

# HELP panels_skipped_total Panels dropped after render failure
# TYPE panels_skipped_total counter
panels_skipped_total {{}} {}

# HELP pages_composed_total Pages successfully composed
# TYPE pages_composed_total counter
pages_composed_total {{}} {}

# HELP pages_dropped_total Pages dropped during composition
# TYPE pages_dropped_total counter
pages_dropped_total {{}} {}

# HELP collaborator_calls_total Remote collaborator calls
# TYPE collaborator_calls_total counter
collaborator_calls_total {{}} {}

# HELP collaborator_calls_failed Remote collaborator call failures
# TYPE collaborator_calls_failed counter
collaborator_calls_failed {{}} {}

# HELP collaborator_latency_avg_ms Average collaborator latency
# TYPE collaborator_latency_avg_ms gauge
collaborator_latency_avg_ms {{}} {}

# HELP phase_avg_duration_ms Average phase duration in milliseconds
# TYPE phase_avg_duration_ms gauge
phase_avg_duration_ms {{phase="planning"}} {}
phase_avg_duration_ms {{phase="rendering"}} {}
phase_avg_duration_ms {{phase="compositing"}} {}

# HELP uptime_seconds Application uptime in seconds
# TYPE uptime_seconds counter
uptime_seconds {{}} {}
"#,
            s.jobs_started,
            s.jobs_completed,
            s.jobs_cancelled,
            s.jobs_failed,
            s.panels_rendered_remote,
            s.panels_rendered_local,
            s.panels_skipped,
            s.pages_composed,
            s.pages_dropped,
            s.collaborator_calls_total,
            s.collaborator_calls_failed,
            s.collaborator_latency_avg_ms,
            s.planning_avg_ms,
            s.rendering_avg_ms,
            s.compositing_avg_ms,
            s.uptime_seconds,
        );

        if !s.endpoint_requests.is_empty() {
            out.push_str(
                "\n# HELP endpoint_requests_total HTTP requests per endpoint\n\
                 # TYPE endpoint_requests_total counter\n",
            );
            for (endpoint, count) in &s.endpoint_requests {
                out.push_str(&format!(
                    "endpoint_requests_total {{endpoint=\"{endpoint}\"}} {count}\n"
                ));
            }
        }

        out
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub jobs_started: usize,
    pub jobs_completed: usize,
    pub jobs_cancelled: usize,
    pub jobs_failed: usize,
    pub panels_rendered_remote: usize,
    pub panels_rendered_local: usize,
    pub panels_skipped: usize,
    pub pages_composed: usize,
    pub pages_dropped: usize,
    pub collaborator_calls_total: usize,
    pub collaborator_calls_failed: usize,
    pub collaborator_latency_avg_ms: u64,
    pub collaborator_latency_p95_ms: u64,
    pub planning_avg_ms: u64,
    pub rendering_avg_ms: u64,
    pub compositing_avg_ms: u64,
    pub endpoint_requests: BTreeMap<String, usize>,
    pub uptime_seconds: u64,
}

fn percentile(values: &[u64], p: f64) -> u64 {
    if values.is_empty() {
        return 0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let idx = ((values.len() as f64 - 1.0) * p) as usize;
    sorted[idx]
}

fn avg(values: &[u64]) -> u64 {
    if values.is_empty() {
        return 0;
    }
    values.iter().sum::<u64>() / values.len() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_job_and_panel_counters() {
        let metrics = Metrics::new();
        metrics.record_job_started();
        metrics.record_job_completed();
        metrics.record_panel_rendered(true);
        metrics.record_panel_rendered(false);
        metrics.record_panel_skipped();
        metrics.record_page_composed();
        metrics.record_collaborator_call(true, Duration::from_millis(120));
        metrics.record_collaborator_call(false, Duration::from_millis(40));

        let s = metrics.snapshot();
        assert_eq!(s.jobs_started, 1);
        assert_eq!(s.jobs_completed, 1);
        assert_eq!(s.panels_rendered_remote, 1);
        assert_eq!(s.panels_rendered_local, 1);
        assert_eq!(s.panels_skipped, 1);
        assert_eq!(s.pages_composed, 1);
        assert_eq!(s.collaborator_calls_total, 2);
        assert_eq!(s.collaborator_calls_failed, 1);
        assert_eq!(s.collaborator_latency_avg_ms, 80);
    }

    #[test]
    fn endpoint_counters_reach_snapshot_and_prometheus() {
        let metrics = Metrics::new();
        metrics.record_endpoint_request("/generate");
        metrics.record_endpoint_request("/generate");
        metrics.record_endpoint_request("/health");

        let s = metrics.snapshot();
        assert_eq!(s.endpoint_requests.get("/generate"), Some(&2));
        assert_eq!(s.endpoint_requests.get("/health"), Some(&1));

        let out = metrics.to_prometheus();
        assert!(out.contains("endpoint_requests_total {endpoint=\"/generate\"} 2"));
        assert!(out.contains("endpoint_requests_total {endpoint=\"/health\"} 1"));
    }

    #[test]
    fn prometheus_format() {
        let metrics = Metrics::new();
        metrics.record_job_started();
        metrics.record_panel_rendered(true);

        let out = metrics.to_prometheus();
        assert!(out.contains("jobs_started_total {} 1"));
        assert!(out.contains("panels_rendered_total {source=\"remote\"} 1"));
    }
}
