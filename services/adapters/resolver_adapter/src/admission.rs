//! Bounded admission queue with time-based eviction
//!
//! The queue is the only shared mutable state in the resolver. It holds the set
//! of keys currently being processed and enforces two rules:
//!
//! - at most one entry per key
//! - at most `capacity` entries overall
//!
//! Every entry carries a deadline `admitted_at + ttl`. Once the clock reaches
//! the deadline the entry is evicted whether or not anyone released it, and its
//! cancellation token fires so the work holding the slot can stop. Expired
//! entries are purged at the start of every queue operation and by an optional
//! background sweeper; both take the same lock as admit and release.
//!
//! Per key: `Unadmitted -> Admitted -> {Released | Evicted} -> Unadmitted`.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use types::{ProcessingKey, QueueStatus};

use crate::clock::Clock;

/// Why a key was not admitted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionRejection {
    /// The key already holds a slot
    AlreadyInFlight,
    /// Every slot is taken
    AtCapacity,
}

impl fmt::Display for AdmissionRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdmissionRejection::AlreadyInFlight => f.write_str("already in flight"),
            AdmissionRejection::AtCapacity => f.write_str("queue at capacity"),
        }
    }
}

/// One admitted key
#[derive(Debug, Clone)]
pub struct QueueEntry {
    key: ProcessingKey,
    admitted_at: Instant,
    deadline: Instant,
    ticket: u64,
    cancel: CancellationToken,
}

impl QueueEntry {
    pub fn key(&self) -> &ProcessingKey {
        &self.key
    }

    pub fn admitted_at(&self) -> Instant {
        self.admitted_at
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.deadline
    }
}

#[derive(Debug, Default)]
struct QueueState {
    entries: HashMap<ProcessingKey, QueueEntry>,
    next_ticket: u64,
    evicted_total: u64,
}

impl QueueState {
    fn purge_expired(&mut self, now: Instant) -> usize {
        let expired: Vec<ProcessingKey> = self
            .entries
            .values()
            .filter(|entry| entry.is_expired(now))
            .map(|entry| entry.key.clone())
            .collect();

        for key in &expired {
            if let Some(entry) = self.entries.remove(key) {
                entry.cancel.cancel();
                warn!("Processing timeout for {}", key);
            }
        }

        self.evicted_total += expired.len() as u64;
        expired.len()
    }
}

/// Instance-owned admission queue
pub struct AdmissionQueue {
    capacity: usize,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    state: Mutex<QueueState>,
}

impl AdmissionQueue {
    pub fn new(capacity: usize, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            capacity,
            ttl,
            clock,
            state: Mutex::new(QueueState::default()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Admit `key` if it is absent and a slot is free
    pub fn try_admit(&self, key: &ProcessingKey) -> bool {
        self.admit(key).is_ok()
    }

    /// Admit `key`, returning the new entry or the reason for refusal
    pub fn admit(&self, key: &ProcessingKey) -> Result<QueueEntry, AdmissionRejection> {
        let now = self.clock.now();
        let mut state = self.state.lock();
        state.purge_expired(now);

        if state.entries.contains_key(key) {
            debug!("Rejected {}: {}", key, AdmissionRejection::AlreadyInFlight);
            return Err(AdmissionRejection::AlreadyInFlight);
        }
        if state.entries.len() >= self.capacity {
            debug!("Rejected {}: {}", key, AdmissionRejection::AtCapacity);
            return Err(AdmissionRejection::AtCapacity);
        }

        let ticket = state.next_ticket;
        state.next_ticket += 1;

        let entry = QueueEntry {
            key: key.clone(),
            admitted_at: now,
            deadline: now + self.ttl,
            ticket,
            cancel: CancellationToken::new(),
        };
        state.entries.insert(key.clone(), entry.clone());
        debug!(
            "Admitted {} ({}/{} in flight)",
            key,
            state.entries.len(),
            self.capacity
        );
        Ok(entry)
    }

    /// Admit `key` and hand back a permit that releases the slot when dropped
    pub fn try_acquire(
        self: &Arc<Self>,
        key: &ProcessingKey,
    ) -> Result<AdmissionPermit, AdmissionRejection> {
        let entry = self.admit(key)?;
        Ok(AdmissionPermit {
            queue: Arc::clone(self),
            key: entry.key,
            ticket: entry.ticket,
            cancel: entry.cancel,
            released: false,
        })
    }

    /// Remove `key` if present; returns whether anything was removed.
    ///
    /// Work still holding a permit for `key` is cancelled, so the key never has
    /// two resolutions in flight.
    pub fn release(&self, key: &ProcessingKey) -> bool {
        let now = self.clock.now();
        let mut state = self.state.lock();
        state.purge_expired(now);

        match state.entries.remove(key) {
            Some(entry) => {
                entry.cancel.cancel();
                debug!("Released {}", key);
                true
            }
            None => false,
        }
    }

    /// Remove `key` only if it is still the admission identified by `ticket`
    fn release_ticket(&self, key: &ProcessingKey, ticket: u64) -> bool {
        let now = self.clock.now();
        let mut state = self.state.lock();
        state.purge_expired(now);

        match state.entries.get(key) {
            Some(entry) if entry.ticket == ticket => {
                state.entries.remove(key);
                debug!("Released {}", key);
                true
            }
            _ => false,
        }
    }

    pub fn status(&self) -> QueueStatus {
        let now = self.clock.now();
        let mut state = self.state.lock();
        state.purge_expired(now);

        QueueStatus {
            processing: state.entries.len(),
            max_concurrent: self.capacity,
        }
    }

    pub fn contains(&self, key: &ProcessingKey) -> bool {
        let now = self.clock.now();
        let mut state = self.state.lock();
        state.purge_expired(now);
        state.entries.contains_key(key)
    }

    /// Snapshot of the entry for `key`
    pub fn entry(&self, key: &ProcessingKey) -> Option<QueueEntry> {
        let now = self.clock.now();
        let mut state = self.state.lock();
        state.purge_expired(now);
        state.entries.get(key).cloned()
    }

    /// Evict every entry whose deadline has passed; returns how many
    pub fn evict_expired(&self) -> usize {
        let now = self.clock.now();
        self.state.lock().purge_expired(now)
    }

    /// Entries evicted by deadline since construction
    pub fn evicted_total(&self) -> u64 {
        self.state.lock().evicted_total
    }

    /// Evict expired entries every `interval` until the queue is dropped
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let queue = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                let Some(queue) = queue.upgrade() else {
                    debug!("Admission queue dropped, stopping sweeper");
                    break;
                };
                let evicted = queue.evict_expired();
                if evicted > 0 {
                    debug!("Sweeper evicted {} expired entries", evicted);
                }
            }
        })
    }
}

impl fmt::Debug for AdmissionQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdmissionQueue")
            .field("capacity", &self.capacity)
            .field("ttl", &self.ttl)
            .field("in_flight", &self.state.lock().entries.len())
            .finish()
    }
}

/// Held slot for one admitted key.
///
/// Dropping the permit releases the slot unless it was already released or the
/// key has since been evicted and admitted again by someone else.
#[derive(Debug)]
pub struct AdmissionPermit {
    queue: Arc<AdmissionQueue>,
    key: ProcessingKey,
    ticket: u64,
    cancel: CancellationToken,
    released: bool,
}

impl AdmissionPermit {
    pub fn key(&self) -> &ProcessingKey {
        &self.key
    }

    /// Fires when the entry is evicted by its deadline or released externally
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_evicted(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Release the slot now; returns whether this permit's entry was removed
    pub fn release(mut self) -> bool {
        self.released = true;
        self.queue.release_ticket(&self.key, self.ticket)
    }
}

impl Drop for AdmissionPermit {
    fn drop(&mut self) {
        if !self.released {
            self.queue.release_ticket(&self.key, self.ticket);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn queue(capacity: usize, ttl_ms: u64) -> (Arc<AdmissionQueue>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let queue = Arc::new(AdmissionQueue::new(
            capacity,
            Duration::from_millis(ttl_ms),
            clock.clone(),
        ));
        (queue, clock)
    }

    fn key(s: &str) -> ProcessingKey {
        ProcessingKey::from(s)
    }

    #[test]
    fn test_capacity_and_duplicates() {
        let (queue, _clock) = queue(3, 30_000);

        assert!(queue.try_admit(&key("a")));
        assert!(queue.try_admit(&key("b")));
        assert_eq!(
            queue.admit(&key("a")).unwrap_err(),
            AdmissionRejection::AlreadyInFlight
        );
        assert!(queue.try_admit(&key("c")));

        assert_eq!(
            queue.status(),
            QueueStatus {
                processing: 3,
                max_concurrent: 3
            }
        );
        assert_eq!(
            queue.admit(&key("d")).unwrap_err(),
            AdmissionRejection::AtCapacity
        );
        // A duplicate of a full queue is reported as a duplicate
        assert_eq!(
            queue.admit(&key("a")).unwrap_err(),
            AdmissionRejection::AlreadyInFlight
        );
    }

    #[test]
    fn test_release_is_idempotent_and_frees_key() {
        let (queue, _clock) = queue(1, 30_000);

        assert!(queue.try_admit(&key("sig")));
        assert!(queue.release(&key("sig")));
        assert!(!queue.release(&key("sig")));
        assert!(!queue.release(&key("never-admitted")));

        assert!(queue.try_admit(&key("sig")), "Released key must be admissible again");
    }

    #[test]
    fn test_external_release_cancels_held_permit() {
        let (queue, _clock) = queue(2, 30_000);
        let held = queue.try_acquire(&key("sig")).unwrap();

        assert!(queue.release(&key("sig")));
        assert!(held.is_evicted(), "Released entry must cancel its in-flight work");

        let fresh = queue.try_acquire(&key("sig")).unwrap();
        assert!(!held.release(), "Cancelled permit must not remove the new admission");
        assert!(!fresh.is_evicted());
        assert!(queue.contains(&key("sig")));
    }

    #[test]
    fn test_entry_deadline_is_admission_plus_ttl() {
        let (queue, clock) = queue(2, 30_000);
        clock.advance(Duration::from_secs(5));

        let entry = queue.admit(&key("sig")).unwrap();
        assert_eq!(entry.deadline() - entry.admitted_at(), Duration::from_secs(30));
        assert_eq!(entry.admitted_at(), clock.now());
    }

    #[test]
    fn test_entries_expire_at_deadline() {
        let (queue, clock) = queue(2, 1_000);
        let permit = queue.try_acquire(&key("sig")).unwrap();

        clock.advance(Duration::from_millis(999));
        assert!(queue.contains(&key("sig")));
        assert!(!permit.is_evicted());

        clock.advance(Duration::from_millis(1));
        assert_eq!(queue.status().processing, 0);
        assert!(permit.is_evicted(), "Eviction must cancel the permit's token");
        assert_eq!(queue.evicted_total(), 1);
    }

    #[test]
    fn test_evict_expired_counts_only_expired() {
        let (queue, clock) = queue(3, 1_000);
        assert!(queue.try_admit(&key("old")));
        clock.advance(Duration::from_millis(600));
        assert!(queue.try_admit(&key("new")));
        clock.advance(Duration::from_millis(400));

        assert_eq!(queue.evict_expired(), 1);
        assert!(!queue.contains(&key("old")));
        assert!(queue.contains(&key("new")));
    }

    #[test]
    fn test_permit_drop_releases_slot() {
        let (queue, _clock) = queue(1, 30_000);
        {
            let _permit = queue.try_acquire(&key("sig")).unwrap();
            assert_eq!(queue.status().processing, 1);
        }
        assert_eq!(queue.status().processing, 0);

        let permit = queue.try_acquire(&key("sig")).unwrap();
        assert!(permit.release());
        assert_eq!(queue.status().processing, 0);
    }

    #[test]
    fn test_stale_permit_cannot_release_readmitted_key() {
        let (queue, clock) = queue(2, 1_000);
        let stale = queue.try_acquire(&key("sig")).unwrap();

        clock.advance(Duration::from_millis(1_000));
        let fresh = queue.try_acquire(&key("sig")).unwrap();

        assert!(!stale.release(), "Stale permit must not remove the new admission");
        assert!(queue.contains(&key("sig")));
        assert!(!fresh.is_evicted());
        drop(fresh);
        assert!(!queue.contains(&key("sig")));
    }

    #[tokio::test]
    async fn test_sweeper_evicts_without_callers() {
        let (queue, clock) = queue(2, 1_000);
        let permit = queue.try_acquire(&key("hung")).unwrap();
        let sweeper = queue.spawn_sweeper(Duration::from_millis(10));

        clock.advance(Duration::from_millis(1_500));
        tokio::time::timeout(Duration::from_secs(2), permit.cancellation().cancelled())
            .await
            .expect("Sweeper should evict the expired entry");
        assert_eq!(queue.evicted_total(), 1);

        drop(permit);
        drop(queue);
        tokio::time::timeout(Duration::from_secs(2), sweeper)
            .await
            .expect("Sweeper should stop once the queue is dropped")
            .unwrap();
    }
}
