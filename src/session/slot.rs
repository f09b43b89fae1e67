//! Single active publisher slot
//!
//! At most one publisher session may run the broadcast loop at a time.
//! The slot is a lock with a cooperative side channel: a newcomer that
//! finds it held signals `preempt` on the holder and is rejected, and the
//! holder notices the flag at its next polling point, closes its own
//! connection, and releases. Nothing here ever forces another task's
//! socket closed; killing a peer mid-read is not portable.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Observable state of the publisher slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// No active publisher
    Idle,
    /// One publisher is running its broadcast loop
    Active,
    /// The holder has been signalled to yield but has not released yet
    Preempting,
}

struct ActivePublisher {
    session_id: u64,
    preempt: Arc<AtomicBool>,
}

/// Rejection returned when the slot is already held
///
/// Not an error in the failure sense: the rejected caller is expected to
/// retry after the hand-off retry interval, and the returned signal has
/// already been delivered to the holder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rejected {
    /// Session id of the current holder
    pub holder: u64,
}

impl std::fmt::Display for Rejected {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "publisher slot held by session {}", self.holder)
    }
}

/// The single-active-publisher slot
pub struct PublisherSlot {
    inner: Mutex<Option<ActivePublisher>>,
}

impl PublisherSlot {
    /// Create an idle slot
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(None),
        }
    }

    /// Try to become the active publisher
    ///
    /// On success the returned guard holds the slot until dropped. If the
    /// slot is held, the holder's `preempt` flag is set and [`Rejected`]
    /// is returned; last publisher to keep retrying wins.
    pub fn acquire(self: &Arc<Self>, session_id: u64) -> Result<PublisherGuard, Rejected> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(ref active) = *inner {
            active.preempt.store(true, Ordering::Release);
            return Err(Rejected {
                holder: active.session_id,
            });
        }

        let preempt = Arc::new(AtomicBool::new(false));
        *inner = Some(ActivePublisher {
            session_id,
            preempt: Arc::clone(&preempt),
        });

        tracing::debug!(session_id = session_id, "Publisher slot acquired");

        Ok(PublisherGuard {
            slot: Arc::clone(self),
            session_id,
            preempt,
        })
    }

    /// Current slot state
    pub fn state(&self) -> SlotState {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        match *inner {
            None => SlotState::Idle,
            Some(ref active) if active.preempt.load(Ordering::Acquire) => SlotState::Preempting,
            Some(_) => SlotState::Active,
        }
    }

    /// Session id of the current holder, if any
    pub fn holder(&self) -> Option<u64> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.as_ref().map(|active| active.session_id)
    }

    fn release(&self, session_id: u64) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());

        // Only the holder releases; a stale guard from a superseded session
        // must not clear a newer holder.
        if inner.as_ref().map(|a| a.session_id) == Some(session_id) {
            *inner = None;
            tracing::debug!(session_id = session_id, "Publisher slot released");
        }
    }
}

impl Default for PublisherSlot {
    fn default() -> Self {
        Self::new()
    }
}

/// Guard held by the active publisher session
///
/// Dropping the guard returns the slot to idle and clears the preempt
/// flag with it.
pub struct PublisherGuard {
    slot: Arc<PublisherSlot>,
    session_id: u64,
    preempt: Arc<AtomicBool>,
}

impl PublisherGuard {
    /// Session id this guard is bound to
    pub fn session_id(&self) -> u64 {
        self.session_id
    }

    /// Whether a newer publisher has asked this session to yield
    ///
    /// Checked between frames by the broadcast loop.
    pub fn preempted(&self) -> bool {
        self.preempt.load(Ordering::Acquire)
    }
}

impl Drop for PublisherGuard {
    fn drop(&mut self) {
        self.slot.release(self.session_id);
    }
}

impl std::fmt::Debug for PublisherGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublisherGuard")
            .field("session_id", &self.session_id)
            .field("preempted", &self.preempted())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_idle_slot() {
        let slot = Arc::new(PublisherSlot::new());
        assert_eq!(slot.state(), SlotState::Idle);

        let guard = slot.acquire(1).unwrap();

        assert_eq!(slot.state(), SlotState::Active);
        assert_eq!(slot.holder(), Some(1));
        assert!(!guard.preempted());
    }

    #[test]
    fn test_second_acquire_rejected_and_signals_preempt() {
        let slot = Arc::new(PublisherSlot::new());
        let guard = slot.acquire(1).unwrap();

        let rejected = slot.acquire(2).unwrap_err();

        assert_eq!(rejected, Rejected { holder: 1 });
        assert!(guard.preempted());
        assert_eq!(slot.state(), SlotState::Preempting);
    }

    #[test]
    fn test_drop_returns_slot_to_idle() {
        let slot = Arc::new(PublisherSlot::new());
        let guard = slot.acquire(1).unwrap();
        drop(guard);

        assert_eq!(slot.state(), SlotState::Idle);
        assert_eq!(slot.holder(), None);
    }

    #[test]
    fn test_handoff_clears_preempt_for_new_holder() {
        let slot = Arc::new(PublisherSlot::new());
        let guard_a = slot.acquire(1).unwrap();

        slot.acquire(2).unwrap_err();
        assert!(guard_a.preempted());
        drop(guard_a);

        // New holder starts with a fresh flag
        let guard_b = slot.acquire(2).unwrap();
        assert!(!guard_b.preempted());
        assert_eq!(slot.state(), SlotState::Active);
    }

    #[test]
    fn test_stale_guard_does_not_release_new_holder() {
        let slot = Arc::new(PublisherSlot::new());

        // Simulate a release racing a re-acquire: holder 1 releases, holder 2
        // takes over, then 1's guard (already released) is dropped.
        let guard_a = slot.acquire(1).unwrap();
        slot.release(1);
        let _guard_b = slot.acquire(2).unwrap();
        drop(guard_a);

        assert_eq!(slot.holder(), Some(2));
    }
}
