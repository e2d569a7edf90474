//! Retry policy with exponential backoff
//!
//! Only connectivity-class failures (connection errors, timeouts and open
//! circuits) are retried. Anything else is returned on the first attempt.

use crate::error::Result;
use crate::error_recovery::circuit_breaker::CircuitBreaker;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Retry policy configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry
    #[serde(with = "humantime_serde")]
    pub base_delay: Duration,
    /// Multiplier applied per attempt
    pub backoff_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            backoff_factor: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay after the zero-based failed `attempt`
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let factor = self.backoff_factor.powi(attempt as i32);
        Duration::from_secs_f64(self.base_delay.as_secs_f64() * factor)
    }

    /// Total attempts including the first one
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }
}

/// Retry statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetryStats {
    /// Total operations attempted
    pub total_operations: u64,
    /// Successful operations (no retry needed)
    pub successful_first_attempt: u64,
    /// Successful operations (after retry)
    pub successful_after_retry: u64,
    /// Failed operations (all retries exhausted)
    pub failed_after_retries: u64,
    /// Total retry attempts
    pub total_retry_attempts: u64,
    /// Last retry timestamp
    pub last_retry: Option<DateTime<Utc>>,
}

/// Retry executor, optionally routing every attempt through a breaker
pub struct RetryExecutor {
    policy: RetryPolicy,
    breaker: Option<Arc<CircuitBreaker>>,
    stats: Arc<RwLock<RetryStats>>,
}

impl RetryExecutor {
    /// Create new retry executor
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            breaker: None,
            stats: Arc::new(RwLock::new(RetryStats::default())),
        }
    }

    /// Route each attempt through `breaker`
    pub fn with_breaker(mut self, breaker: Arc<CircuitBreaker>) -> Self {
        self.breaker = Some(breaker);
        self
    }

    /// Share statistics with other executors
    pub fn with_stats(mut self, stats: Arc<RwLock<RetryStats>>) -> Self {
        self.stats = stats;
        self
    }

    /// Execute operation with retry policy
    pub async fn execute<F, T, Fut>(&self, operation: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.stats.write().await.total_operations += 1;

        let max_attempts = self.policy.max_attempts();
        let mut attempt = 0;

        loop {
            let outcome = match &self.breaker {
                Some(breaker) => breaker.call(&operation).await,
                None => operation().await,
            };

            let error = match outcome {
                Ok(result) => {
                    let mut stats = self.stats.write().await;
                    if attempt == 0 {
                        stats.successful_first_attempt += 1;
                    } else {
                        stats.successful_after_retry += 1;
                        info!("Operation succeeded after {} attempts", attempt + 1);
                    }
                    return Ok(result);
                }
                Err(error) => error,
            };

            if !error.is_connectivity() {
                debug!("Error not retryable: {}", error);
                return Err(error);
            }

            if attempt + 1 >= max_attempts {
                self.stats.write().await.failed_after_retries += 1;
                warn!("Operation failed after {} attempts: {}", attempt + 1, error);
                return Err(error);
            }

            let delay = self.policy.calculate_delay(attempt);
            {
                let mut stats = self.stats.write().await;
                stats.total_retry_attempts += 1;
                stats.last_retry = Some(Utc::now());
            }

            warn!(
                "Attempt {}/{} failed: {}. Retrying in {:?}",
                attempt + 1,
                max_attempts,
                error,
                delay
            );
            sleep(delay).await;
            attempt += 1;
        }
    }

    /// Get retry statistics
    pub async fn stats(&self) -> RetryStats {
        self.stats.read().await.clone()
    }
}
