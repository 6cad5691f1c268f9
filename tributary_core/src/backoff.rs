//! Delay calculation for unproductive reads.

use crate::config::BackoffPolicy;
use std::time::Duration;

const JITTER_FRACTION: f64 = 0.1;

impl BackoffPolicy {
    /// Returns the delay to wait after `attempt` consecutive unproductive reads (0-indexed).
    pub fn delay(&self, attempt: u32) -> Duration {
        match *self {
            BackoffPolicy::Fixed(delay) => delay,
            BackoffPolicy::Exponential {
                initial,
                max,
                jitter,
            } => {
                // doubling past 2^31 always hits the cap
                let doubled = initial.saturating_mul(1u32 << attempt.min(31)).min(max);
                if jitter { jittered(doubled, max) } else { doubled }
            }
        }
    }
}

/// Spreads `delay` uniformly over ±10%, never above `max` and never zero.
fn jittered(delay: Duration, max: Duration) -> Duration {
    use rand::Rng;

    let spread = delay.mul_f64(JITTER_FRACTION);
    if spread.is_zero() {
        return delay;
    }
    let low = delay.saturating_sub(spread).max(Duration::from_millis(1));
    let high = (delay + spread).min(max);
    if low >= high {
        return high;
    }
    rand::thread_rng().gen_range(low..=high)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_jitter(initial: Duration, max: Duration) -> BackoffPolicy {
        BackoffPolicy::Exponential {
            initial,
            max,
            jitter: false,
        }
    }

    #[test]
    fn fixed_delay_ignores_attempts() {
        let policy = BackoffPolicy::Fixed(Duration::from_millis(250));
        assert_eq!(policy.delay(0), Duration::from_millis(250));
        assert_eq!(policy.delay(17), Duration::from_millis(250));
    }

    #[test]
    fn exponential_delay_doubles() {
        let policy = no_jitter(Duration::from_millis(100), Duration::from_secs(10));

        assert_eq!(policy.delay(0), Duration::from_millis(100));
        assert_eq!(policy.delay(1), Duration::from_millis(200));
        assert_eq!(policy.delay(2), Duration::from_millis(400));
    }

    #[test]
    fn exponential_delay_handles_large_attempt_numbers() {
        let policy = no_jitter(Duration::from_secs(1), Duration::from_secs(60));
        assert_eq!(policy.delay(100), Duration::from_secs(60));
    }

    #[test]
    fn exponential_delay_with_jitter_stays_within_bounds() {
        let policy = BackoffPolicy::exponential(Duration::from_secs(10), Duration::from_secs(60));

        for _ in 0..100 {
            let delay = policy.delay(0);
            assert!(
                delay >= Duration::from_secs(9) && delay <= Duration::from_secs(11),
                "Delay {:?} out of expected range",
                delay
            );
        }
    }

    #[test]
    fn jitter_never_exceeds_the_cap() {
        let policy = BackoffPolicy::exponential(Duration::from_secs(1), Duration::from_secs(5));

        for _ in 0..100 {
            let delay = policy.delay(10);
            assert!(
                delay >= Duration::from_millis(4500) && delay <= Duration::from_secs(5),
                "Delay {:?} out of expected range",
                delay
            );
        }
    }

    #[test]
    fn jitter_leaves_tiny_delays_alone() {
        let policy = BackoffPolicy::exponential(Duration::from_nanos(3), Duration::from_secs(1));
        assert_eq!(policy.delay(0), Duration::from_nanos(3));
    }
}
