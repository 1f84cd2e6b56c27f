//! Push coalescing, independent of any timer implementation.
//!
//! Every change calls [`PushDebouncer::schedule`] and arms a timer for
//! [`PushDebouncer::window`]. When a timer fires it hands its ticket back to
//! [`PushDebouncer::take_due`]; only the ticket of the latest change yields a
//! push, so a burst of changes produces one push of the final state.
use std::time::Duration;

use super::{ProgressSnapshot, SyncId};

/// A push waiting for its quiet period to elapse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingPush {
    pub snapshot: ProgressSnapshot,
    pub sync_id: SyncId,
}

/// Identifies one scheduled push.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PushTicket(u64);

#[derive(Debug, Clone)]
pub struct PushDebouncer {
    window: Duration,
    generation: u64,
    pending: Option<PendingPush>,
}

impl PushDebouncer {
    #[must_use]
    pub const fn new(window: Duration) -> Self {
        Self {
            window,
            generation: 0,
            pending: None,
        }
    }

    #[must_use]
    pub const fn window(&self) -> Duration {
        self.window
    }

    #[must_use]
    pub const fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Replace any pending push with this one and return its ticket.
    pub fn schedule(&mut self, snapshot: ProgressSnapshot, sync_id: SyncId) -> PushTicket {
        self.generation = self.generation.wrapping_add(1);
        if self.pending.is_some() {
            log::debug!("Superseding pending cloud push");
        }
        self.pending = Some(PendingPush { snapshot, sync_id });
        PushTicket(self.generation)
    }

    /// The pending push, if `ticket` belongs to the most recent schedule.
    pub fn take_due(&mut self, ticket: PushTicket) -> Option<PendingPush> {
        if ticket.0 != self.generation {
            return None;
        }
        self.pending.take()
    }

    pub fn cancel(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        self.pending = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::{LevelId, Stars};

    fn snapshot_with(level: u16) -> ProgressSnapshot {
        ProgressSnapshot {
            progress: [(LevelId::Main(level), Stars::new(1).unwrap())]
                .into_iter()
                .collect(),
            ..ProgressSnapshot::default()
        }
    }

    fn id() -> SyncId {
        SyncId::parse("ZORA-WXYZ").unwrap()
    }

    #[test]
    fn only_the_latest_ticket_fires() {
        let mut debouncer = PushDebouncer::new(Duration::from_millis(2_000));
        let tickets: Vec<PushTicket> = (1..=3)
            .map(|n| debouncer.schedule(snapshot_with(n), id()))
            .collect();
        assert!(debouncer.take_due(tickets[0]).is_none());
        assert!(debouncer.take_due(tickets[1]).is_none());
        let due = debouncer.take_due(tickets[2]).unwrap();
        assert_eq!(due.snapshot, snapshot_with(3));
        assert!(debouncer.take_due(tickets[2]).is_none());
        assert!(!debouncer.is_pending());
    }

    #[test]
    fn cancel_invalidates_outstanding_tickets() {
        let mut debouncer = PushDebouncer::new(Duration::from_secs(2));
        let ticket = debouncer.schedule(snapshot_with(1), id());
        debouncer.cancel();
        assert!(debouncer.take_due(ticket).is_none());
    }
}
