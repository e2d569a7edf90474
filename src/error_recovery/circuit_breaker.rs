//! Circuit breaker pattern implementation for resilient hub access
//!
//! A breaker counts connectivity failures for one named remote dependency
//! and, once the failure threshold is reached, rejects calls without
//! attempting them. Recovery is checked lazily: an open breaker only moves to
//! half-open when a call arrives after the recovery timeout has elapsed.

use crate::error::{HomeyError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Circuit is closed - normal operation
    Closed,
    /// Circuit is open - operations fail fast
    Open,
    /// Circuit is half-open - probing whether the dependency recovered
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "CLOSED"),
            CircuitState::Open => write!(f, "OPEN"),
            CircuitState::HalfOpen => write!(f, "HALF_OPEN"),
        }
    }
}

/// Circuit breaker configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Failures before the circuit opens
    pub failure_threshold: u32,
    /// How long an open circuit waits before allowing a probe
    #[serde(with = "humantime_serde")]
    pub recovery_timeout: Duration,
    /// Successes in half-open needed to close the circuit
    pub success_threshold: u32,
    /// Upper bound for a single wrapped call
    #[serde(with = "humantime_serde")]
    pub call_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(60),
            success_threshold: 3,
            call_timeout: Duration::from_secs(30),
        }
    }
}

/// Point-in-time view of a breaker, suitable for health output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerStatus {
    pub name: String,
    pub state: CircuitState,
    pub failure_count: u32,
    pub success_count: u32,
    pub last_failure_time: Option<DateTime<Utc>>,
    /// Calls rejected while open
    pub blocked_requests: u64,
    pub config: CircuitBreakerConfig,
}

/// Internal circuit breaker state
struct BreakerState {
    current_state: CircuitState,
    failure_count: u32,
    success_count: u32,
    last_failure_at: Option<Instant>,
    last_failure_time: Option<DateTime<Utc>>,
    blocked_requests: u64,
}

/// Failure-counting gate for one named dependency
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    state: RwLock<BreakerState>,
}

impl CircuitBreaker {
    /// Create new circuit breaker in the closed state
    pub fn new<S: Into<String>>(name: S, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            state: RwLock::new(BreakerState {
                current_state: CircuitState::Closed,
                failure_count: 0,
                success_count: 0,
                last_failure_at: None,
                last_failure_time: None,
                blocked_requests: 0,
            }),
        }
    }

    /// Breaker name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Breaker configuration
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Current state without triggering the lazy recovery check
    pub async fn state(&self) -> CircuitState {
        self.state.read().await.current_state
    }

    /// Execute `operation` through the breaker.
    ///
    /// Fails fast with [`HomeyError::CircuitOpen`] while the circuit is open.
    /// Otherwise the call runs under `call_timeout`; timeouts and
    /// connectivity errors count as failures, any other error is returned
    /// unchanged without touching the counters.
    pub async fn call<F, Fut, T>(&self, operation: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.try_acquire().await?;

        match tokio::time::timeout(self.config.call_timeout, operation()).await {
            Ok(Ok(value)) => {
                self.record_success().await;
                Ok(value)
            }
            Ok(Err(error)) if error.is_connectivity() => {
                self.record_failure().await;
                Err(error)
            }
            Ok(Err(error)) => {
                debug!(breaker = %self.name, "Non-network error in circuit breaker: {}", error);
                Err(error)
            }
            Err(_) => {
                self.record_failure().await;
                Err(HomeyError::timeout(format!(
                    "Request timed out after {:?}",
                    self.config.call_timeout
                )))
            }
        }
    }

    /// Decide whether a call may proceed, moving OPEN -> HALF_OPEN when due
    async fn try_acquire(&self) -> Result<()> {
        let mut state = self.state.write().await;

        match state.current_state {
            CircuitState::Closed | CircuitState::HalfOpen => Ok(()),
            CircuitState::Open => {
                let recovered = state
                    .last_failure_at
                    .map(|at| at.elapsed() >= self.config.recovery_timeout)
                    .unwrap_or(true);

                if recovered {
                    state.current_state = CircuitState::HalfOpen;
                    state.success_count = 0;
                    info!("Circuit breaker {} moving to HALF_OPEN", self.name);
                    Ok(())
                } else {
                    state.blocked_requests += 1;
                    debug!("Circuit breaker {} open, blocking request", self.name);
                    Err(HomeyError::CircuitOpen {
                        name: self.name.clone(),
                        state: state.current_state,
                        last_failure: state.last_failure_time,
                    })
                }
            }
        }
    }

    /// Record successful operation
    pub async fn record_success(&self) {
        let mut state = self.state.write().await;

        match state.current_state {
            CircuitState::HalfOpen => {
                state.success_count += 1;
                if state.success_count >= self.config.success_threshold {
                    state.current_state = CircuitState::Closed;
                    state.failure_count = 0;
                    info!("Circuit breaker {} moved to CLOSED", self.name);
                }
            }
            CircuitState::Closed => {
                state.failure_count = 0;
            }
            CircuitState::Open => {
                // A call admitted before the circuit opened finished late.
                debug!("Success recorded while circuit {} is open", self.name);
            }
        }
    }

    /// Record failed operation
    pub async fn record_failure(&self) {
        let mut state = self.state.write().await;
        state.failure_count += 1;
        state.last_failure_at = Some(Instant::now());
        state.last_failure_time = Some(Utc::now());

        match state.current_state {
            CircuitState::Closed => {
                if state.failure_count >= self.config.failure_threshold {
                    state.current_state = CircuitState::Open;
                    warn!(
                        "Circuit breaker {} moved to OPEN after {} failures",
                        self.name, state.failure_count
                    );
                }
            }
            CircuitState::HalfOpen => {
                state.current_state = CircuitState::Open;
                warn!(
                    "Circuit breaker {} moved back to OPEN from HALF_OPEN",
                    self.name
                );
            }
            CircuitState::Open => {}
        }
    }

    /// Get current status
    pub async fn status(&self) -> CircuitBreakerStatus {
        let state = self.state.read().await;
        CircuitBreakerStatus {
            name: self.name.clone(),
            state: state.current_state,
            failure_count: state.failure_count,
            success_count: state.success_count,
            last_failure_time: state.last_failure_time,
            blocked_requests: state.blocked_requests,
            config: self.config.clone(),
        }
    }

    /// Reset circuit breaker to closed
    pub async fn reset(&self) {
        let mut state = self.state.write().await;
        state.current_state = CircuitState::Closed;
        state.failure_count = 0;
        state.success_count = 0;
        state.last_failure_at = None;
        info!("Circuit breaker {} reset to closed state", self.name);
    }
}

/// Name -> breaker registry; breakers are created on first use and live as
/// long as the registry
pub struct CircuitBreakerRegistry {
    breakers: RwLock<HashMap<String, Arc<CircuitBreaker>>>,
    default_config: CircuitBreakerConfig,
}

impl CircuitBreakerRegistry {
    /// Create new registry
    pub fn new(default_config: CircuitBreakerConfig) -> Self {
        Self {
            breakers: RwLock::new(HashMap::new()),
            default_config,
        }
    }

    /// Get or create the breaker for `name` with the default configuration
    pub async fn get_breaker(&self, name: &str) -> Arc<CircuitBreaker> {
        self.get_breaker_with_config(name, None).await
    }

    /// Get or create the breaker for `name`. `config` only applies when the
    /// breaker does not exist yet.
    pub async fn get_breaker_with_config(
        &self,
        name: &str,
        config: Option<CircuitBreakerConfig>,
    ) -> Arc<CircuitBreaker> {
        if let Some(breaker) = self.breakers.read().await.get(name) {
            return breaker.clone();
        }

        let mut breakers = self.breakers.write().await;
        breakers
            .entry(name.to_string())
            .or_insert_with(|| {
                info!("Created new circuit breaker: {}", name);
                Arc::new(CircuitBreaker::new(
                    name,
                    config.unwrap_or_else(|| self.default_config.clone()),
                ))
            })
            .clone()
    }

    /// Status of every breaker created so far
    pub async fn all_status(&self) -> HashMap<String, CircuitBreakerStatus> {
        let breakers: Vec<Arc<CircuitBreaker>> =
            self.breakers.read().await.values().cloned().collect();

        let mut statuses = HashMap::new();
        for breaker in breakers {
            statuses.insert(breaker.name().to_string(), breaker.status().await);
        }
        statuses
    }

    /// Reset all circuit breakers
    pub async fn reset_all(&self) {
        let breakers: Vec<Arc<CircuitBreaker>> =
            self.breakers.read().await.values().cloned().collect();
        for breaker in breakers {
            breaker.reset().await;
        }
    }
}

impl Default for CircuitBreakerRegistry {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}
