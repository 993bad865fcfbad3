use std::time::Duration;

use rand::Rng as _;

use crate::config::ReconnectConfig;

/// Exponential backoff with full jitter, capped at `max`.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    max_attempts: Option<u32>,
    attempt: u32,
}

impl Backoff {
    pub fn new(config: &ReconnectConfig) -> Self {
        Backoff {
            initial: config.initial_delay(),
            max: config.max_delay(),
            max_attempts: config.max_attempts,
            attempt: 0,
        }
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Upper bound of the delay for the given attempt (0-based).
    pub fn ceiling(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.min(31)).unwrap_or(u32::MAX);
        self.initial.saturating_mul(factor).min(self.max)
    }

    /// Delay before the next attempt, or `None` once attempts are exhausted.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.max_attempts.is_some_and(|max| self.attempt >= max) {
            return None;
        }
        let ceiling = self.ceiling(self.attempt).as_millis() as u64;
        self.attempt += 1;
        let jittered = rand::rng().random_range(0..=ceiling);
        Some(Duration::from_millis(jittered))
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(max_attempts: Option<u32>) -> ReconnectConfig {
        ReconnectConfig {
            initial_delay_ms: Some(100),
            max_delay_ms: Some(1_000),
            max_attempts,
        }
    }

    #[test]
    fn test_ceiling_doubles_then_caps() {
        let backoff = Backoff::new(&config(None));
        assert_eq!(backoff.ceiling(0), Duration::from_millis(100));
        assert_eq!(backoff.ceiling(1), Duration::from_millis(200));
        assert_eq!(backoff.ceiling(3), Duration::from_millis(800));
        assert_eq!(backoff.ceiling(4), Duration::from_millis(1_000));
        assert_eq!(backoff.ceiling(200), Duration::from_millis(1_000));
    }

    #[test]
    fn test_delay_within_ceiling() {
        let mut backoff = Backoff::new(&config(None));
        for attempt in 0..20 {
            let ceiling = backoff.ceiling(attempt);
            let delay = backoff.next_delay().unwrap();
            assert!(delay <= ceiling, "attempt {attempt}: {delay:?} > {ceiling:?}");
        }
    }

    #[test]
    fn test_gives_up_and_resets() {
        let mut backoff = Backoff::new(&config(Some(2)));
        assert!(backoff.next_delay().is_some());
        assert!(backoff.next_delay().is_some());
        assert!(backoff.next_delay().is_none());
        assert_eq!(backoff.attempt(), 2);

        backoff.reset();
        assert!(backoff.next_delay().is_some());
    }
}
