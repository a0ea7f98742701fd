//! Request pacing and retry backoff.
//!
//! The throttle gate spaces outbound calls by a freshly drawn random delay so
//! traffic looks like a person clicking around rather than a polling loop.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{Instant, sleep};

use crate::modules::random::SharedRng;

pub const MIN_REQUEST_DELAY: Duration = Duration::from_millis(300);
pub const MAX_REQUEST_DELAY: Duration = Duration::from_millis(2_000);
pub const MIN_RETRY_DELAY: Duration = Duration::from_millis(2_000);
pub const MAX_RETRY_DELAY: Duration = Duration::from_millis(5_000);
pub const DEFAULT_MAX_ATTEMPTS: u32 = 4;

/// Randomized minimum spacing between consecutive outbound requests.
///
/// The timestamp lock is held across the sleep, so concurrent callers queue
/// behind each other and each one measures against the completion of the
/// previous `wait`.
#[derive(Debug)]
pub struct ThrottleGate {
    min_delay: Duration,
    max_delay: Duration,
    last_request: Mutex<Option<Instant>>,
    rng: SharedRng,
}

impl ThrottleGate {
    pub fn new(min_delay: Duration, max_delay: Duration, rng: SharedRng) -> Self {
        Self {
            min_delay,
            max_delay: max_delay.max(min_delay),
            last_request: Mutex::new(None),
            rng,
        }
    }

    pub fn min_delay(&self) -> Duration {
        self.min_delay
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    /// Suspends until the drawn spacing since the previous call has elapsed.
    /// Returns the time actually slept.
    pub async fn wait(&self) -> Duration {
        let mut last = self.last_request.lock().await;
        let target = self.rng.duration_between(self.min_delay, self.max_delay);

        let shortfall = match *last {
            Some(previous) => target.saturating_sub(previous.elapsed()),
            None => Duration::ZERO,
        };

        if !shortfall.is_zero() {
            log::debug!("throttling request for {}ms", shortfall.as_millis());
            sleep(shortfall).await;
        }

        *last = Some(Instant::now());
        shortfall
    }
}

impl Default for ThrottleGate {
    fn default() -> Self {
        Self::new(MIN_REQUEST_DELAY, MAX_REQUEST_DELAY, SharedRng::default())
    }
}

/// Bounded retry budget with a jittered pause before each new attempt.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub min_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    pub fn with_backoff(mut self, min: Duration, max: Duration) -> Self {
        self.min_backoff = min;
        self.max_backoff = if max < min { min } else { max };
        self
    }

    /// Whether another attempt is allowed after `attempt` (1-based) failed.
    pub fn allows_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    pub fn backoff(&self, rng: &SharedRng) -> Duration {
        rng.duration_between(self.min_backoff, self.max_backoff)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            min_backoff: MIN_RETRY_DELAY,
            max_backoff: MAX_RETRY_DELAY,
        }
    }
}
