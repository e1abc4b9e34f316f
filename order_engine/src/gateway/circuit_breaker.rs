//! A count-based circuit breaker.
//!
//! * **Closed**: calls flow through. The outcomes of the last `window_size` calls are kept; once at least
//!   `minimum_calls` have been recorded and the failure rate reaches `failure_rate_threshold`, the breaker opens.
//! * **Open**: calls are rejected with [`GatewayError::CallNotPermitted`] without being attempted. After `open_wait`
//!   the next call moves the breaker to half-open.
//! * **HalfOpen**: up to `half_open_calls` trial calls are let through. If all of them succeed the breaker closes
//!   with a fresh window; any failure opens it again. A trial call that is dropped before it reports an outcome
//!   gives its slot back.
//!
//! Every permitted call holds a [`CallPermit`] and reports its outcome through it.
//!
//! Breakers are shared state keyed by the name of the dependency they protect; use [`CircuitBreakerRegistry`] to get
//! one.
use std::{
    collections::{HashMap, VecDeque},
    fmt::Display,
    future::Future,
    sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError},
    time::{Duration, Instant},
};

use log::*;

use crate::gateway::GatewayError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CircuitBreakerConfig {
    pub window_size: usize,
    pub minimum_calls: usize,
    /// Percentage, 0-100
    pub failure_rate_threshold: f64,
    pub open_wait: Duration,
    pub half_open_calls: usize,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            window_size: 10,
            minimum_calls: 5,
            failure_rate_threshold: 50.0,
            open_wait: Duration::from_secs(60),
            half_open_calls: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Closed => "CLOSED",
            Self::Open => "OPEN",
            Self::HalfOpen => "HALF_OPEN",
        };
        f.write_str(s)
    }
}

#[derive(Debug)]
enum BreakerState {
    /// `true` marks a failed call
    Closed { outcomes: VecDeque<bool> },
    Open { since: Instant },
    /// `since` identifies this half-open period, so that permits from an earlier one are ignored
    HalfOpen { since: Instant, permitted: usize, succeeded: usize },
}

impl BreakerState {
    fn closed() -> Self {
        Self::Closed { outcomes: VecDeque::new() }
    }

    fn kind(&self) -> CircuitState {
        match self {
            Self::Closed { .. } => CircuitState::Closed,
            Self::Open { .. } => CircuitState::Open,
            Self::HalfOpen { .. } => CircuitState::HalfOpen,
        }
    }
}

#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    state: Mutex<BreakerState>,
}

impl CircuitBreaker {
    pub fn new<S: Into<String>>(name: S, mut config: CircuitBreakerConfig) -> Self {
        config.window_size = config.window_size.max(1);
        config.minimum_calls = config.minimum_calls.clamp(1, config.window_size);
        config.half_open_calls = config.half_open_calls.max(1);
        Self { name: name.into(), config, state: Mutex::new(BreakerState::closed()) }
    }

    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// The state as of the last call. An open breaker whose wait has elapsed still reports `Open` until the next call
    /// is attempted.
    pub fn state(&self) -> CircuitState {
        self.lock().kind()
    }

    /// Failure rate of the current window, as a percentage. `None` unless the breaker is closed.
    pub fn failure_rate(&self) -> Option<f64> {
        match &*self.lock() {
            BreakerState::Closed { outcomes } if !outcomes.is_empty() => Some(failure_rate(outcomes)),
            BreakerState::Closed { .. } => Some(0.0),
            _ => None,
        }
    }

    /// Runs `call` if the breaker permits it, and records the outcome.
    pub async fn call<T, F, Fut>(&self, call: F) -> Result<T, GatewayError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, GatewayError>>,
    {
        let permit = self.try_acquire()?;
        let result = call().await;
        permit.record(result.is_ok());
        result
    }

    /// Asks for permission to make a call. The outcome of the call is reported with [`CallPermit::record`].
    pub fn try_acquire(&self) -> Result<CallPermit<'_>, GatewayError> {
        let mut state = self.lock();
        if let BreakerState::Open { since } = *state {
            if since.elapsed() < self.config.open_wait {
                trace!("⚡️ Circuit '{}' is open. Rejecting call", self.name);
                return Err(GatewayError::CallNotPermitted(self.name.clone()));
            }
            info!(
                "⚡️ Circuit '{}' is now HALF_OPEN. Allowing {} trial calls",
                self.name, self.config.half_open_calls
            );
            *state = BreakerState::HalfOpen { since: Instant::now(), permitted: 0, succeeded: 0 };
        }
        match &mut *state {
            BreakerState::Closed { .. } => Ok(CallPermit { breaker: self, trial: None, recorded: false }),
            BreakerState::HalfOpen { since, permitted, .. } if *permitted < self.config.half_open_calls => {
                *permitted += 1;
                Ok(CallPermit { breaker: self, trial: Some(*since), recorded: false })
            },
            _ => {
                trace!("⚡️ Circuit '{}' has no trial calls left. Rejecting call", self.name);
                Err(GatewayError::CallNotPermitted(self.name.clone()))
            },
        }
    }

    fn record(&self, success: bool) {
        let mut state = self.lock();
        let config = &self.config;
        let next = match &mut *state {
            BreakerState::Closed { outcomes } => {
                outcomes.push_back(!success);
                while outcomes.len() > config.window_size {
                    outcomes.pop_front();
                }
                let rate = failure_rate(outcomes);
                (outcomes.len() >= config.minimum_calls && rate >= config.failure_rate_threshold).then(|| {
                    warn!(
                        "⚡️ Circuit '{}' is now OPEN. Failure rate {rate:.1}% over the last {} calls",
                        self.name,
                        outcomes.len()
                    );
                    BreakerState::Open { since: Instant::now() }
                })
            },
            BreakerState::HalfOpen { succeeded, .. } => {
                if success {
                    *succeeded += 1;
                    (*succeeded >= config.half_open_calls).then(|| {
                        info!("⚡️ Circuit '{}' is now CLOSED", self.name);
                        BreakerState::closed()
                    })
                } else {
                    warn!("⚡️ Circuit '{}' trial call failed. Circuit is OPEN again", self.name);
                    Some(BreakerState::Open { since: Instant::now() })
                }
            },
            // Calls that were let through before the breaker opened
            BreakerState::Open { .. } => None,
        };
        if let Some(next) = next {
            *state = next;
        }
    }

    fn release(&self, trial: Instant) {
        let mut state = self.lock();
        if let BreakerState::HalfOpen { since, permitted, .. } = &mut *state {
            if *since == trial {
                *permitted = permitted.saturating_sub(1);
                debug!("⚡️ Circuit '{}': a trial call was abandoned. Its slot is free again", self.name);
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Permission to make one call through a [`CircuitBreaker`].
///
/// A permit dropped without [`CallPermit::record`] counts as no call at all; a half-open trial slot is handed back.
#[must_use = "the outcome of the call must be recorded"]
#[derive(Debug)]
pub struct CallPermit<'a> {
    breaker: &'a CircuitBreaker,
    trial: Option<Instant>,
    recorded: bool,
}

impl CallPermit<'_> {
    pub fn record(mut self, success: bool) {
        self.recorded = true;
        self.breaker.record(success);
    }
}

impl Drop for CallPermit<'_> {
    fn drop(&mut self) {
        if let (false, Some(trial)) = (self.recorded, self.trial) {
            self.breaker.release(trial);
        }
    }
}

fn failure_rate(outcomes: &VecDeque<bool>) -> f64 {
    if outcomes.is_empty() {
        return 0.0;
    }
    let failures = outcomes.iter().filter(|&&failed| failed).count();
    #[allow(clippy::cast_precision_loss)]
    let rate = failures as f64 * 100.0 / outcomes.len() as f64;
    rate
}

/// Hands out one shared breaker per dependency name.
#[derive(Debug, Clone, Default)]
pub struct CircuitBreakerRegistry {
    breakers: Arc<Mutex<HashMap<String, Arc<CircuitBreaker>>>>,
}

impl CircuitBreakerRegistry {
    /// The process-wide registry.
    pub fn global() -> &'static CircuitBreakerRegistry {
        static REGISTRY: OnceLock<CircuitBreakerRegistry> = OnceLock::new();
        REGISTRY.get_or_init(CircuitBreakerRegistry::default)
    }

    /// Returns the breaker registered under `name`, creating it with `config` if there is none yet. The config of an
    /// existing breaker is left unchanged.
    pub fn breaker(&self, name: &str, config: CircuitBreakerConfig) -> Arc<CircuitBreaker> {
        let mut breakers = self.breakers.lock().unwrap_or_else(PoisonError::into_inner);
        let breaker = breakers.entry(name.to_string()).or_insert_with(|| {
            debug!("⚡️ Registering circuit breaker '{name}' with {config:?}");
            Arc::new(CircuitBreaker::new(name, config))
        });
        Arc::clone(breaker)
    }
}
