//! Admission gate - counts live connections against the table capacity

use parking_lot::Mutex;
use std::sync::Arc;

/// Mutex-guarded count of live connections
///
/// Only consulted at accept time. Slot occupancy in the session table is the
/// source of truth; this is the coarse gate in front of it.
#[derive(Debug)]
pub struct ConnectionCounter {
    count: Mutex<usize>,
    limit: usize,
}

/// RAII guard that decrements the connection count on drop
#[derive(Debug)]
pub struct ConnectionPermit {
    counter: Arc<ConnectionCounter>,
}

impl Drop for ConnectionPermit {
    fn drop(&mut self) {
        let mut count = self.counter.count.lock();
        *count = count.saturating_sub(1);
    }
}

impl ConnectionCounter {
    pub fn new(limit: usize) -> Arc<Self> {
        Arc::new(Self {
            count: Mutex::new(0),
            limit,
        })
    }

    /// Take one unit of capacity, or `None` if the limit is reached
    pub fn try_reserve(self: &Arc<Self>) -> Option<ConnectionPermit> {
        let mut count = self.count.lock();
        if *count >= self.limit {
            return None;
        }
        *count += 1;
        Some(ConnectionPermit {
            counter: Arc::clone(self),
        })
    }

    pub fn current(&self) -> usize {
        *self.count.lock()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_past_limit_and_recovers_on_drop() {
        let counter = ConnectionCounter::new(2);
        let first = counter.try_reserve().unwrap();
        let _second = counter.try_reserve().unwrap();
        assert_eq!(counter.current(), 2);
        assert!(counter.try_reserve().is_none());

        drop(first);
        assert_eq!(counter.current(), 1);
        assert!(counter.try_reserve().is_some());
    }
}
