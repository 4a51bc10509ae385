//! Deadline timers driven by caller-supplied time
//!
//! The engine never reads a clock. The host passes the current time (any monotonic
//! [`Duration`] since an arbitrary origin) with every event and calls
//! [`crate::MapSession::tick`] periodically; expired timers are then collected with
//! [`TimerQueue::take_expired`].

use crate::feature::FeatureId;
use std::time::Duration;

/// Opaque handle of a scheduled timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(u64);

/// What a timer gates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Pointer mode: window for the second click on a land
    ClickDisambiguation,
    /// Touch mode: auto-dismiss of the tooltip
    TooltipDismiss,
}

/// A timer whose deadline has passed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FiredTimer {
    pub handle: TimerHandle,
    pub kind: TimerKind,
    pub feature: FeatureId,
}

#[derive(Debug, Clone)]
struct Entry {
    handle: TimerHandle,
    kind: TimerKind,
    feature: FeatureId,
    deadline: Duration,
}

/// The pending timers of one session
///
/// Only two timers are ever alive at once, so a plain vector is all the structure needed.
#[derive(Debug, Default)]
pub struct TimerQueue {
    entries: Vec<Entry>,
    next_handle: u64,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule a timer firing at `now + delay`
    pub fn schedule(
        &mut self,
        kind: TimerKind,
        feature: FeatureId,
        now: Duration,
        delay: Duration,
    ) -> TimerHandle {
        let handle = TimerHandle(self.next_handle);
        self.next_handle += 1;
        self.entries.push(Entry {
            handle,
            kind,
            feature,
            deadline: now.saturating_add(delay),
        });
        tracing::trace!("Scheduled {kind:?} timer {handle:?} for {feature:?}");
        handle
    }

    /// Cancel a timer. Returns `false` if it already fired or was cancelled.
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.handle != handle);
        let cancelled = self.entries.len() != before;
        if cancelled {
            tracing::trace!("Cancelled timer {handle:?}");
        }
        cancelled
    }

    pub fn is_pending(&self, handle: TimerHandle) -> bool {
        self.entries.iter().any(|entry| entry.handle == handle)
    }

    /// Deadline of a pending timer
    pub fn deadline(&self, handle: TimerHandle) -> Option<Duration> {
        self.entries
            .iter()
            .find(|entry| entry.handle == handle)
            .map(|entry| entry.deadline)
    }

    /// Earliest pending deadline, for hosts that want to schedule a repaint
    pub fn next_deadline(&self) -> Option<Duration> {
        self.entries.iter().map(|entry| entry.deadline).min()
    }

    /// Remove and return every timer due at `now`, earliest first
    pub fn take_expired(&mut self, now: Duration) -> Vec<FiredTimer> {
        let mut fired: Vec<Entry> = Vec::new();
        self.entries.retain(|entry| {
            if entry.deadline <= now {
                fired.push(entry.clone());
                false
            } else {
                true
            }
        });
        fired.sort_by_key(|entry| (entry.deadline, entry.handle));
        fired
            .into_iter()
            .map(|entry| FiredTimer {
                handle: entry.handle,
                kind: entry.kind,
                feature: entry.feature,
            })
            .collect()
    }

    /// Cancel everything
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
