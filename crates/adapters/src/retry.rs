use std::thread;
use std::time::Duration;

use log::warn;

use content_core::{GenerationError, RetrySettings};

/// Bounded exponential backoff. Only transient failures are retried.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryConfig {
    pub max_attempts: usize,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryConfig {
    pub const fn new(max_attempts: usize, initial_backoff: Duration, max_backoff: Duration) -> Self {
        Self {
            max_attempts,
            initial_backoff,
            max_backoff,
        }
    }

    pub const fn no_retry() -> Self {
        Self::new(1, Duration::ZERO, Duration::ZERO)
    }

    /// Delay before attempt `attempt + 1`, where `attempt` starts at 1.
    pub fn backoff(&self, attempt: usize) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16) as u32;
        self.initial_backoff
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }

    fn delay_for(&self, err: &GenerationError, attempt: usize) -> Duration {
        match err {
            GenerationError::RateLimit {
                retry_after: Some(hint),
                ..
            } => (*hint).min(self.max_backoff),
            _ => self.backoff(attempt),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::from(&RetrySettings::default())
    }
}

impl From<&RetrySettings> for RetryConfig {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            max_attempts: settings.max_attempts.max(1),
            initial_backoff: Duration::from_millis(settings.initial_backoff_ms),
            max_backoff: Duration::from_millis(settings.max_backoff_ms.max(settings.initial_backoff_ms)),
        }
    }
}

pub fn call_with_retry<F, T>(f: F, config: &RetryConfig) -> Result<T, GenerationError>
where
    F: FnMut() -> Result<T, GenerationError>,
{
    call_with_retry_using(f, config, thread::sleep)
}

/// Like [`call_with_retry`] with an injectable sleep, so tests run instantly.
pub fn call_with_retry_using<F, S, T>(
    mut f: F,
    config: &RetryConfig,
    mut sleep: S,
) -> Result<T, GenerationError>
where
    F: FnMut() -> Result<T, GenerationError>,
    S: FnMut(Duration),
{
    let max_attempts = config.max_attempts.max(1);

    for attempt in 1..=max_attempts {
        let err = match f() {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if !err.is_transient() {
            return Err(err);
        }
        if attempt == max_attempts {
            return Err(if max_attempts > 1 {
                GenerationError::retry_exhausted(max_attempts, err)
            } else {
                err
            });
        }

        let delay = config.delay_for(&err, attempt);
        warn!(
            "[call_with_retry] attempt {}/{} failed: {}; retrying in {:?}",
            attempt, max_attempts, err, delay
        );
        sleep(delay);
    }

    unreachable!("the final attempt always returns")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> RetryConfig {
        RetryConfig::new(3, Duration::from_secs(1), Duration::from_secs(3))
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let config = config();
        assert_eq!(config.backoff(1), Duration::from_secs(1));
        assert_eq!(config.backoff(2), Duration::from_secs(2));
        assert_eq!(config.backoff(3), Duration::from_secs(3));
        assert_eq!(config.backoff(60), Duration::from_secs(3));
    }

    #[test]
    fn retries_transient_errors_until_success() {
        let mut calls = 0;
        let mut sleeps = Vec::new();
        let result = call_with_retry_using(
            || {
                calls += 1;
                if calls < 3 {
                    Err(GenerationError::Network("connection reset".into()))
                } else {
                    Ok("done")
                }
            },
            &config(),
            |delay| sleeps.push(delay),
        );

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls, 3);
        assert_eq!(sleeps, [Duration::from_secs(1), Duration::from_secs(2)]);
    }

    #[test]
    fn gives_up_after_max_attempts() {
        let mut calls = 0;
        let result: Result<(), _> = call_with_retry_using(
            || {
                calls += 1;
                Err(GenerationError::Network("timed out".into()))
            },
            &config(),
            |_| {},
        );

        assert_eq!(calls, 3);
        let err = result.unwrap_err();
        assert!(matches!(err, GenerationError::RetryExhausted { attempts: 3, .. }));
        assert_eq!(err.root(), &GenerationError::Network("timed out".into()));
    }

    #[test]
    fn permanent_errors_are_not_retried() {
        for permanent in [
            GenerationError::Auth("invalid key".into()),
            GenerationError::Upstream {
                status: 400,
                body: "bad model".into(),
            },
        ] {
            let mut calls = 0;
            let result: Result<(), _> = call_with_retry_using(
                || {
                    calls += 1;
                    Err(permanent.clone())
                },
                &config(),
                |_| panic!("must not sleep"),
            );
            assert_eq!(calls, 1);
            assert_eq!(result.unwrap_err(), permanent);
        }
    }

    #[test]
    fn retry_after_hint_is_capped() {
        let mut sleeps = Vec::new();
        let mut calls = 0;
        let _ = call_with_retry_using(
            || {
                calls += 1;
                if calls == 1 {
                    Err(GenerationError::RateLimit {
                        message: "slow down".into(),
                        retry_after: Some(Duration::from_secs(60)),
                    })
                } else {
                    Ok(())
                }
            },
            &config(),
            |delay| sleeps.push(delay),
        );
        assert_eq!(sleeps, [Duration::from_secs(3)]);
    }

    #[test]
    fn single_attempt_returns_raw_error() {
        let result: Result<(), _> = call_with_retry_using(
            || Err(GenerationError::Network("down".into())),
            &RetryConfig::no_retry(),
            |_| {},
        );
        assert_eq!(
            result.unwrap_err(),
            GenerationError::Network("down".into())
        );
    }

    #[test]
    fn settings_conversion_clamps() {
        let config = RetryConfig::from(&RetrySettings {
            max_attempts: 0,
            initial_backoff_ms: 500,
            max_backoff_ms: 100,
        });
        assert_eq!(config.max_attempts, 1);
        assert_eq!(config.max_backoff, Duration::from_millis(500));
    }
}
