//! Keyed, cancellable timers.
//!
//! `TimerWheel` holds at most one pending deadline per key. Scheduling a key
//! that is already pending replaces the old deadline and payload, so callers
//! cannot stack duplicate timers for the same slot.
//!
//! Built on `tokio_util::time::DelayQueue`, which follows tokio's clock and
//! therefore works with `tokio::time::pause` in tests.

use std::collections::HashMap;
use std::future::poll_fn;
use std::hash::Hash;
use std::time::Duration;
use tokio_util::time::{delay_queue, DelayQueue};

#[derive(Debug)]
pub struct TimerWheel<K, T> {
    queue: DelayQueue<K>,
    entries: HashMap<K, (delay_queue::Key, T)>,
}

impl<K, T> Default for TimerWheel<K, T>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, T> TimerWheel<K, T>
where
    K: Eq + Hash + Clone,
{
    #[must_use]
    pub fn new() -> Self {
        Self {
            queue: DelayQueue::new(),
            entries: HashMap::new(),
        }
    }

    /// Arms `key` to fire after `after`, replacing any pending entry.
    ///
    /// Returns the payload of the replaced entry, if there was one.
    pub fn schedule(&mut self, key: K, payload: T, after: Duration) -> Option<T> {
        let replaced = self.cancel(&key);
        let queue_key = self.queue.insert(key.clone(), after);
        self.entries.insert(key, (queue_key, payload));
        replaced
    }

    /// Disarms `key`. Returns its payload if it was pending.
    pub fn cancel(&mut self, key: &K) -> Option<T> {
        let (queue_key, payload) = self.entries.remove(key)?;
        // Every key in `entries` is still live in `queue`: expired entries
        // are removed from `entries` in the same poll that yields them.
        self.queue.remove(&queue_key);
        Some(payload)
    }

    #[must_use]
    pub fn get(&self, key: &K) -> Option<&T> {
        self.entries.get(key).map(|(_, payload)| payload)
    }

    #[must_use]
    pub fn is_scheduled(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Waits for the next deadline and returns its key and payload.
    ///
    /// Pends forever while nothing is scheduled, which makes it safe to use
    /// as a `tokio::select!` branch. Cancel-safe: an entry is only removed
    /// in the poll that returns it.
    pub async fn expired(&mut self) -> (K, T) {
        loop {
            if self.entries.is_empty() {
                std::future::pending::<()>().await;
            }

            let Some(expired) = poll_fn(|cx| self.queue.poll_expired(cx)).await else {
                // Queue drained while entries remain cannot happen; treat as idle.
                std::future::pending::<()>().await;
                continue;
            };

            let key = expired.into_inner();
            if let Some((_, payload)) = self.entries.remove(&key) {
                return (key, payload);
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use tokio::time::{timeout, Instant};

    #[tokio::test(start_paused = true)]
    async fn test_fires_after_deadline() {
        let mut wheel = TimerWheel::new();
        wheel.schedule("room-1", 7u32, Duration::from_secs(60));

        let start = Instant::now();
        let (key, payload) = wheel.expired().await;

        assert_eq!(key, "room-1");
        assert_eq!(payload, 7);
        assert!(start.elapsed() >= Duration::from_secs(60));
        assert!(start.elapsed() < Duration::from_secs(61));
        assert!(wheel.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reschedule_replaces_pending_entry() {
        let mut wheel = TimerWheel::new();
        assert_eq!(wheel.schedule("room-1", "cleanup", Duration::from_secs(60)), None);
        assert_eq!(
            wheel.schedule("room-1", "idle", Duration::from_secs(1800)),
            Some("cleanup")
        );
        assert_eq!(wheel.len(), 1);
        assert_eq!(wheel.get(&"room-1"), Some(&"idle"));

        // The replaced 60s deadline must not fire.
        let early = timeout(Duration::from_secs(61), wheel.expired()).await;
        assert!(early.is_err());

        let (_, payload) = wheel.expired().await;
        assert_eq!(payload, "idle");
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_prevents_firing() {
        let mut wheel = TimerWheel::new();
        wheel.schedule(1u8, (), Duration::from_secs(5));
        assert!(wheel.is_scheduled(&1));

        assert_eq!(wheel.cancel(&1), Some(()));
        assert_eq!(wheel.cancel(&1), None);
        assert!(!wheel.is_scheduled(&1));

        let result = timeout(Duration::from_secs(10), wheel.expired()).await;
        assert!(result.is_err(), "cancelled timer must not fire");
    }

    #[tokio::test(start_paused = true)]
    async fn test_independent_keys_fire_in_deadline_order() {
        let mut wheel = TimerWheel::new();
        wheel.schedule("lifetime", 1, Duration::from_secs(30));
        wheel.schedule("cleanup", 2, Duration::from_secs(10));

        assert_eq!(wheel.expired().await, ("cleanup", 2));
        assert_eq!(wheel.expired().await, ("lifetime", 1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_wheel_pends() {
        let mut wheel: TimerWheel<u8, ()> = TimerWheel::new();
        let result = timeout(Duration::from_secs(3600), wheel.expired()).await;
        assert!(result.is_err());
    }
}
