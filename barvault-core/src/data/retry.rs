//! Bounded retry with exponential backoff and jitter.

use super::provider::DataError;
use rand::Rng;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one. Never zero.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Spread each delay by ±50% so parallel workers do not retry in lockstep.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// No waiting between attempts. Used by tests and fixture sources.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            jitter: false,
        }
    }

    /// Delay before retry number `retry` (1-based): `base * 2^(retry-1)`, capped.
    pub fn delay(&self, retry: u32) -> Duration {
        let exp = retry.saturating_sub(1).min(20);
        let raw = self.base_delay.saturating_mul(1u32 << exp);
        let capped = raw.min(self.max_delay);
        if !self.jitter || capped.is_zero() {
            return capped;
        }
        let factor = rand::thread_rng().gen_range(0.5..1.5);
        capped.mul_f64(factor).min(self.max_delay)
    }

    /// Delay honouring a provider-supplied `Retry-After`, still capped by `max_delay`.
    pub fn delay_for(&self, retry: u32, err: &DataError) -> Duration {
        let backoff = self.delay(retry);
        match err.retry_after_secs() {
            Some(secs) => backoff.max(Duration::from_secs(secs)).min(self.max_delay),
            None => backoff,
        }
    }

    /// Run `op` until it succeeds, fails with a non-transient error, or the
    /// attempt budget is exhausted. The closure receives the 1-based attempt.
    pub fn run<T>(
        &self,
        label: &str,
        mut op: impl FnMut(u32) -> Result<T, DataError>,
    ) -> Result<T, DataError> {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op(attempt) {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < attempts => {
                    let wait = self.delay_for(attempt, &err);
                    tracing::debug!(
                        target: "barvault::retry",
                        %label,
                        attempt,
                        wait_ms = wait.as_millis() as u64,
                        error = %err,
                        "transient failure, backing off"
                    );
                    if !wait.is_zero() {
                        std::thread::sleep(wait);
                    }
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(1000),
            jitter: false,
        }
    }

    #[test]
    fn delay_grows_exponentially_and_caps() {
        let p = policy();
        assert_eq!(p.delay(1), Duration::from_millis(100));
        assert_eq!(p.delay(2), Duration::from_millis(200));
        assert_eq!(p.delay(3), Duration::from_millis(400));
        assert_eq!(p.delay(5), Duration::from_millis(1000));
        assert_eq!(p.delay(40), Duration::from_millis(1000));
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let p = RetryPolicy {
            jitter: true,
            ..policy()
        };
        for _ in 0..50 {
            let d = p.delay(2);
            assert!(d >= Duration::from_millis(100) && d <= Duration::from_millis(300));
        }
    }

    #[test]
    fn retry_after_is_honoured_but_capped() {
        let p = RetryPolicy {
            max_delay: Duration::from_secs(2),
            ..policy()
        };
        let err = DataError::RateLimited { retry_after_secs: 60 };
        assert_eq!(p.delay_for(1, &err), Duration::from_secs(2));
    }

    #[test]
    fn succeeds_after_transient_failures() {
        let p = RetryPolicy::immediate(3);
        let result = p.run("SPY", |attempt| {
            if attempt < 3 {
                Err(DataError::NetworkUnreachable("timeout".into()))
            } else {
                Ok(attempt)
            }
        });
        assert_eq!(result.unwrap(), 3);
    }

    #[test]
    fn gives_up_after_budget() {
        let p = RetryPolicy::immediate(3);
        let mut calls = 0;
        let result: Result<(), _> = p.run("SPY", |_| {
            calls += 1;
            Err(DataError::Upstream { status: 502 })
        });
        assert!(matches!(result, Err(DataError::Upstream { status: 502 })));
        assert_eq!(calls, 3);
    }

    #[test]
    fn terminal_errors_are_not_retried() {
        let p = RetryPolicy::immediate(5);
        let mut calls = 0;
        let result: Result<(), _> = p.run("GONE", |_| {
            calls += 1;
            Err(DataError::SymbolNotFound {
                symbol: "GONE".into(),
            })
        });
        assert!(matches!(result, Err(DataError::SymbolNotFound { .. })));
        assert_eq!(calls, 1);
    }
}
