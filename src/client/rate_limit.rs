use std::time::Duration;

use rand::Rng;

const DEFAULT_MAX_ATTEMPTS: u32 = 5;
const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);

/// Whether an upstream status should be retried: 429 or any 5xx.
pub fn is_retryable(status: u16) -> bool {
    status == 429 || (500..600).contains(&status)
}

/// Bounded exponential backoff with jitter for retryable upstream responses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per page, including the first one.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// At least one attempt is always made.
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Upper bound of the wait before retry number `retry` (0-based):
    /// `base * 2^retry`, capped at `max_delay`.
    pub fn ceiling_for_retry(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Jittered wait before retry number `retry`, uniform in
    /// `[ceiling / 2, ceiling]`.
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        let ceiling = self.ceiling_for_retry(retry);
        let floor = ceiling / 2;
        if ceiling <= floor {
            return ceiling;
        }
        rand::thread_rng().gen_range(floor..=ceiling)
    }
}

/// Sleep before retry number `retry` of `path`.
pub async fn backoff_sleep(policy: &RetryPolicy, path: &str, status: u16, retry: u32) {
    let wait = policy.delay_for_retry(retry);
    log::warn!(
        "CRM returned {status} for {path}. Waiting {}ms before retry {}/{}",
        wait.as_millis(),
        retry + 1,
        policy.attempts() - 1
    );
    tokio::time::sleep(wait).await;
}
