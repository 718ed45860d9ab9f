//! Time sources for session bookkeeping.
//!
//! Sessions read elapsed time through a trait so tests can drive the
//! clock by hand.

use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// A monotonic time source. Readings only ever grow.
pub trait SessionClock {
    /// Time elapsed since the clock was created.
    fn now(&self) -> Duration;
}

impl<C: SessionClock + ?Sized> SessionClock for Rc<C> {
    fn now(&self) -> Duration {
        (**self).now()
    }
}

/// Wall-clock time source backed by [`Instant`].
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionClock for SystemClock {
    fn now(&self) -> Duration {
        self.start.elapsed()
    }
}

/// A hand-driven clock for tests. Time passes only through [`advance`].
///
/// [`advance`]: ManualClock::advance
#[derive(Default)]
pub struct ManualClock {
    now: Cell<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl SessionClock for ManualClock {
    fn now(&self) -> Duration {
        self.now.get()
    }
}
