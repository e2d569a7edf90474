//! Error recovery patterns for talking to the hub
//!
//! Circuit breakers keep a failing hub from being hammered, the retry
//! executor rides out short connectivity blips.

pub mod circuit_breaker;
pub mod retry_policy;

pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerRegistry, CircuitBreakerStatus,
    CircuitState,
};
pub use retry_policy::{RetryExecutor, RetryPolicy, RetryStats};
