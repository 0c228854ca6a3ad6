use parking_lot::RwLock;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Health state of the remote collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    /// Requests are allowed
    Closed,
    /// Requests are blocked (failing fast)
    Open,
    /// Allowing test requests to check if the collaborator recovered
    HalfOpen,
}

#[derive(Debug, Clone)]
pub struct HealthConfig {
    /// Consecutive failures before blocking requests
    pub failure_threshold: usize,
    /// How long to block before allowing a test request
    pub timeout: Duration,
    /// Consecutive successes in half-open state to fully reopen
    pub success_threshold: usize,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            timeout: Duration::from_secs(60),
            success_threshold: 2,
        }
    }
}

/// Circuit breaker guarding the remote collaborator.
///
/// A job decides its remote/local branch exactly once, at planning time, by
/// asking `allow_request`. Per-call results feed back via `record_success`
/// and `record_failure`.
#[derive(Clone)]
pub struct CollaboratorHealth {
    inner: Arc<RwLock<HealthInner>>,
    config: HealthConfig,
}

struct HealthInner {
    state: HealthState,
    consecutive_failures: usize,
    consecutive_successes: usize,
    last_failure_time: Option<Instant>,
}

impl CollaboratorHealth {
    pub fn new() -> Self {
        Self::with_config(HealthConfig::default())
    }

    pub fn with_config(config: HealthConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(HealthInner {
                state: HealthState::Closed,
                consecutive_failures: 0,
                consecutive_successes: 0,
                last_failure_time: None,
            })),
            config,
        }
    }

    /// Returns true if a remote request may proceed right now.
    pub fn allow_request(&self) -> bool {
        let mut inner = self.inner.write();

        match inner.state {
            HealthState::Closed => true,
            HealthState::Open => {
                if let Some(last_failure) = inner.last_failure_time {
                    if last_failure.elapsed() >= self.config.timeout {
                        inner.state = HealthState::HalfOpen;
                        inner.consecutive_successes = 0;
                        true
                    } else {
                        false
                    }
                } else {
                    false
                }
            }
            HealthState::HalfOpen => true,
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.write();
        inner.consecutive_failures = 0;

        match inner.state {
            HealthState::Closed => {}
            HealthState::HalfOpen => {
                inner.consecutive_successes += 1;
                if inner.consecutive_successes >= self.config.success_threshold {
                    inner.state = HealthState::Closed;
                    inner.consecutive_successes = 0;
                }
            }
            HealthState::Open => {
                inner.state = HealthState::HalfOpen;
                inner.consecutive_successes = 1;
            }
        }
    }

    pub fn record_failure(&self) {
        let mut inner = self.inner.write();
        inner.consecutive_successes = 0;
        inner.last_failure_time = Some(Instant::now());

        match inner.state {
            HealthState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.config.failure_threshold {
                    inner.state = HealthState::Open;
                }
            }
            HealthState::HalfOpen => {
                inner.state = HealthState::Open;
                inner.consecutive_failures = 1;
            }
            HealthState::Open => {
                inner.consecutive_failures += 1;
            }
        }
    }

    pub fn state(&self) -> HealthState {
        self.inner.read().state
    }
}

impl Default for CollaboratorHealth {
    fn default() -> Self {
        Self::new()
    }
}
