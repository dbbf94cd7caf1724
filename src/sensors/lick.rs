//! Capacitive lick/touch detector.
//!
//! The sensor board drives a digital line while the animal's tongue is on
//! the spout.  A lick is a not-touching → touching edge.  Edges closer than
//! [`LICK_MIN_INTERVAL_MS`](crate::config::LICK_MIN_INTERVAL_MS) to the
//! previous *accepted* lick are contact bounce and are dropped without
//! touching the count or the last-accepted time.

/// Edge detector with a refractory window.
#[derive(Debug, Clone)]
pub struct LickDetector {
    min_interval_ms: u64,
    was_touching: bool,
    last_accepted_ms: Option<u64>,
    count: u32,
    rejected: u32,
}

impl LickDetector {
    pub const fn new(min_interval_ms: u64) -> Self {
        Self {
            min_interval_ms,
            was_touching: false,
            last_accepted_ms: None,
            count: 0,
            rejected: 0,
        }
    }

    /// Feed one sample.  Returns `true` when a lick is accepted.
    pub fn poll(&mut self, touching: bool, now_ms: u64) -> bool {
        let rising = touching && !self.was_touching;
        self.was_touching = touching;
        if !rising {
            return false;
        }

        let clear = match self.last_accepted_ms {
            None => true,
            Some(last) => now_ms.saturating_sub(last) >= self.min_interval_ms,
        };
        if !clear {
            self.rejected = self.rejected.saturating_add(1);
            return false;
        }

        self.last_accepted_ms = Some(now_ms);
        self.count = self.count.saturating_add(1);
        true
    }

    /// Zero the lick count.  The refractory window keeps running.
    pub fn reset_count(&mut self) {
        self.count = 0;
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    /// Edges dropped inside the refractory window since boot.
    pub fn rejected(&self) -> u32 {
        self.rejected
    }

    pub fn last_accepted_ms(&self) -> Option<u64> {
        self.last_accepted_ms
    }
}
