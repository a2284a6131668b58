//! Freshness tokens for the computed `id` attribute.
//!
//! The id is not an identity, it only signals that a resource was written again. It is the
//! wall clock time in nanoseconds, bumped when the clock did not advance since the last id.

use std::{
    fmt::Debug,
    sync::atomic::{AtomicI64, Ordering},
};

/// A source of the current time in nanoseconds since the Unix epoch.
pub trait Clock: Debug + Send + Sync {
    fn now_nanos(&self) -> i64;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_nanos(&self) -> i64 {
        // i64 nanoseconds cover the years 1678 to 2262
        i64::try_from(jiff::Timestamp::now().as_nanosecond()).unwrap_or(i64::MAX)
    }
}

/// Hands out strictly increasing ids.
#[derive(Debug)]
pub struct IdGenerator<C = SystemClock> {
    clock: C,
    last: AtomicI64,
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new(SystemClock)
    }
}

impl<C: Clock> IdGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            last: AtomicI64::new(i64::MIN),
        }
    }

    /// Returns `max(now, last + 1)`.
    pub fn next_id(&self) -> i64 {
        let now = self.clock.now_nanos();
        let previous = self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last.saturating_add(1)))
            })
            .unwrap_or_else(|last| last);

        now.max(previous.saturating_add(1))
    }

    /// Records an id handed out earlier, possibly by another process. Every following id is
    /// greater than `id`, even if the clock has gone backwards since.
    pub fn observe(&self, id: i64) {
        self.last.fetch_max(id, Ordering::SeqCst);
    }
}
