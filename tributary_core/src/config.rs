//! Configuration types for stream readers.

use std::time::Duration;

/// Configuration for a stream event reader.
///
/// This struct controls paging, backoff while caught up, and what happens at the end of the
/// stream.
#[derive(Debug, Clone, PartialEq)]
pub struct ReaderConfig {
    /// Maximum number of events requested per page.
    pub max_count: u32,

    /// How long to wait before reading again after a read found nothing new.
    pub backoff: BackoffPolicy,

    /// Stop the reader once it reaches the end of the stream instead of waiting for new
    /// events. Used by one-shot queries.
    ///
    /// Default: `false`
    pub stop_on_eof: bool,

    /// Resolve link records to the events they point at.
    ///
    /// Default: `true`
    pub resolve_links: bool,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            max_count: 111,
            backoff: BackoffPolicy::default(),
            stop_on_eof: false,
            resolve_links: true,
        }
    }
}

/// Determines the delay before re-reading a stream that had nothing new.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum BackoffPolicy {
    /// Always wait the same amount of time.
    Fixed(Duration),

    /// Double the delay for every consecutive unproductive read, starting from `initial` and
    /// capped at `max`. A read that delivers events resets the sequence.
    ///
    /// **Use when:** many readers tail mostly quiescent streams and polling load matters more
    /// than pick-up latency.
    Exponential {
        /// Delay after the first unproductive read.
        initial: Duration,
        /// Upper bound for the delay.
        max: Duration,
        /// Apply ±10% random jitter so readers started together do not poll in lockstep.
        jitter: bool,
    },
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::Fixed(Duration::from_millis(250))
    }
}

impl BackoffPolicy {
    /// Creates an `Exponential` policy with jitter enabled.
    ///
    /// # Example
    /// ```
    /// use tributary_core::config::BackoffPolicy;
    /// use std::time::Duration;
    ///
    /// let policy = BackoffPolicy::exponential(Duration::from_millis(100), Duration::from_secs(5));
    /// ```
    pub fn exponential(initial: Duration, max: Duration) -> Self {
        Self::Exponential {
            initial,
            max,
            jitter: true,
        }
    }
}
