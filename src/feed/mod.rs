//! Debounced change-feed adapter.
//!
//! Batches raw "document updated/removed/moved" notifications arriving in
//! bursts (filesystem watcher, asset pipeline) over a short quiet window,
//! deduplicates by id, and multicasts one consolidated change-set to
//! subscribers. Pure batching logic; nothing search-specific lives here.

use std::collections::HashMap;
use std::sync::mpsc::{Receiver, Sender, channel};
use std::time::{Duration, Instant};
use tracing::debug;

/// Default debounce window.
pub const DEFAULT_DEBOUNCE_MS: u64 = 500;

/// Raw notification from the host environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedEvent {
    /// Document content changed (or the document appeared).
    Updated(String),
    /// Document disappeared.
    Removed(String),
    /// Document moved; folded into removed(from) + updated(to).
    Moved { from: String, to: String },
}

/// Per-id pending state during debouncing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PendingKind {
    Updated,
    Removed,
}

/// A deduplicated batch of changes ready for an incremental index update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub updated: Vec<String>,
    pub removed: Vec<String>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.updated.is_empty() && self.removed.is_empty()
    }

    pub fn total(&self) -> usize {
        self.updated.len() + self.removed.len()
    }
}

/// Debouncing multicast batcher for change notifications.
pub struct ChangeFeed {
    window: Duration,
    pending: HashMap<String, PendingKind>,
    last_event: Option<Instant>,
    subscribers: Vec<Sender<ChangeSet>>,
}

impl ChangeFeed {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: HashMap::new(),
            last_event: None,
            subscribers: Vec::new(),
        }
    }

    /// Record a raw event, folding it into the pending state for its id.
    pub fn add_event(&mut self, event: FeedEvent) {
        self.last_event = Some(Instant::now());
        match event {
            FeedEvent::Updated(id) => self.fold(id, PendingKind::Updated),
            FeedEvent::Removed(id) => self.fold(id, PendingKind::Removed),
            FeedEvent::Moved { from, to } => {
                self.fold(from, PendingKind::Removed);
                self.fold(to, PendingKind::Updated);
            }
        }
    }

    fn fold(&mut self, id: String, kind: PendingKind) {
        // Latest state wins: update-then-remove is a removal, remove-then-
        // update is an update (the document was replaced).
        self.pending.insert(id, kind);
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// True once the quiet window has elapsed since the last raw event.
    pub fn is_ready(&self) -> bool {
        self.last_event
            .is_some_and(|last| last.elapsed() >= self.window)
    }

    /// Time until the pending batch becomes ready; `None` with no pending
    /// events.
    pub fn time_until_ready(&self) -> Option<Duration> {
        self.last_event
            .map(|last| self.window.saturating_sub(last.elapsed()))
    }

    /// Drain pending events into one consolidated change-set.
    pub fn flush(&mut self) -> Option<ChangeSet> {
        if self.pending.is_empty() {
            return None;
        }
        let mut batch = ChangeSet::default();
        for (id, kind) in self.pending.drain() {
            match kind {
                PendingKind::Updated => batch.updated.push(id),
                PendingKind::Removed => batch.removed.push(id),
            }
        }
        batch.updated.sort_unstable();
        batch.removed.sort_unstable();
        self.last_event = None;
        Some(batch)
    }

    /// Register a subscriber; each flushed batch is cloned to every live
    /// subscriber.
    pub fn subscribe(&mut self) -> Receiver<ChangeSet> {
        let (tx, rx) = channel();
        self.subscribers.push(tx);
        rx
    }

    /// Flush and multicast if the quiet window has elapsed. Returns the
    /// emitted change-set, if any. Disconnected subscribers are dropped.
    pub fn pump(&mut self) -> Option<ChangeSet> {
        if !self.is_ready() {
            return None;
        }
        let batch = self.flush()?;
        debug!(
            updated = batch.updated.len(),
            removed = batch.removed.len(),
            "emitting change-set"
        );
        self.subscribers
            .retain(|tx| tx.send(batch.clone()).is_ok());
        Some(batch)
    }

    /// Drop pending events without emitting a batch.
    pub fn clear(&mut self) {
        self.pending.clear();
        self.last_event = None;
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEFAULT_DEBOUNCE_MS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    fn quick_feed() -> ChangeFeed {
        ChangeFeed::new(Duration::from_millis(50))
    }

    #[test]
    fn test_single_event_batches() {
        let mut feed = quick_feed();
        feed.add_event(FeedEvent::Updated("a.png".into()));

        assert!(feed.has_pending());
        assert!(!feed.is_ready(), "not ready inside the quiet window");

        sleep(Duration::from_millis(60));
        assert!(feed.is_ready());
        let batch = feed.flush().unwrap();
        assert_eq!(batch.updated, vec!["a.png".to_string()]);
        assert!(batch.removed.is_empty());
    }

    #[test]
    fn test_update_then_remove_is_remove() {
        let mut feed = quick_feed();
        feed.add_event(FeedEvent::Updated("a.png".into()));
        feed.add_event(FeedEvent::Removed("a.png".into()));

        let batch = feed.flush().unwrap();
        assert!(batch.updated.is_empty());
        assert_eq!(batch.removed, vec!["a.png".to_string()]);
    }

    #[test]
    fn test_remove_then_update_is_update() {
        let mut feed = quick_feed();
        feed.add_event(FeedEvent::Removed("a.png".into()));
        feed.add_event(FeedEvent::Updated("a.png".into()));

        let batch = feed.flush().unwrap();
        assert_eq!(batch.updated, vec!["a.png".to_string()]);
        assert!(batch.removed.is_empty());
    }

    #[test]
    fn test_move_folds_into_update_and_remove() {
        let mut feed = quick_feed();
        feed.add_event(FeedEvent::Moved {
            from: "old/a.png".into(),
            to: "new/a.png".into(),
        });

        let batch = feed.flush().unwrap();
        assert_eq!(batch.updated, vec!["new/a.png".to_string()]);
        assert_eq!(batch.removed, vec!["old/a.png".to_string()]);
    }

    #[test]
    fn test_duplicate_events_dedup() {
        let mut feed = quick_feed();
        for _ in 0..5 {
            feed.add_event(FeedEvent::Updated("a.png".into()));
        }
        assert_eq!(feed.pending_count(), 1);
    }

    #[test]
    fn test_pump_multicasts_to_subscribers() {
        let mut feed = quick_feed();
        let rx1 = feed.subscribe();
        let rx2 = feed.subscribe();

        feed.add_event(FeedEvent::Updated("a.png".into()));
        assert!(feed.pump().is_none(), "window not elapsed yet");

        sleep(Duration::from_millis(60));
        let batch = feed.pump().unwrap();
        assert_eq!(rx1.recv().unwrap(), batch);
        assert_eq!(rx2.recv().unwrap(), batch);
    }

    #[test]
    fn test_clear_discards_pending() {
        let mut feed = quick_feed();
        feed.add_event(FeedEvent::Updated("a.png".into()));
        feed.clear();
        assert!(!feed.has_pending());
        assert!(feed.flush().is_none());
    }
}
