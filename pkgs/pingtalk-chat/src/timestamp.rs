//! Ordering keys for outbound messages
//!
//! The remote store orders messages purely by the numeric `timestamp` field.
//! A key is `now_ms + uniform[0, 1)`: the fractional jitter separates sends
//! from different users that land in the same millisecond without any shared
//! sequence counter. This is an approximation, not a consistency guarantee;
//! clock skew between devices still reorders messages.
//!
//! The jitter only survives up to `f64` resolution: around current epoch
//! milliseconds (about 2^40.6) the spacing between representable values is
//! 2^-12 ms, so each millisecond holds 4096 distinct keys. Two independent
//! senders in the same millisecond collide with probability about 1/4096.
//!
//! Within one allocator keys are additionally kept strictly increasing, so
//! two sends from the same composer never tie or invert even when the jitter
//! of the second draw is smaller than that of the first.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use pingtalk_store::OrderingKey;
use rand::Rng;

type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

pub struct TimestampAllocator {
    clock: Clock,
    /// Bit pattern of the last issued key; zero before the first allocation.
    last: AtomicU64,
}

impl TimestampAllocator {
    /// Allocator on the system wall clock.
    pub fn new() -> Self {
        Self::with_clock(|| chrono::Utc::now().timestamp_millis())
    }

    /// Allocator on a custom millisecond clock.
    pub fn with_clock(clock: impl Fn() -> i64 + Send + Sync + 'static) -> Self {
        Self {
            clock: Arc::new(clock),
            last: AtomicU64::new(0),
        }
    }

    /// Current clock reading in epoch milliseconds.
    pub fn now_millis(&self) -> i64 {
        (self.clock)()
    }

    pub fn allocate(&self) -> OrderingKey {
        let jitter: f64 = rand::thread_rng().gen();
        let candidate = self.now_millis() as f64 + jitter;

        let mut chosen = candidate;
        // The closure always returns Some, so the update cannot fail.
        let _ = self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |previous_bits| {
                let previous = f64::from_bits(previous_bits);
                chosen = if previous_bits != 0 && candidate <= previous {
                    next_up(previous)
                } else {
                    candidate
                };
                Some(chosen.to_bits())
            });

        OrderingKey(chosen)
    }
}

impl Default for TimestampAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// Smallest representable value above a positive finite `x`.
fn next_up(x: f64) -> f64 {
    f64::from_bits(x.to_bits() + 1)
}
