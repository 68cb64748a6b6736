//! Idle timer scheduling for FIB entries
//!
//! Every scheduled timer carries a [`TimerTag`]: the entry id plus the
//! generation the entry had when the timer was armed. When a tag comes back
//! the table compares it with the live entry, so a timer that was replaced
//! or cancelled after it already fired is recognized as stale.

use crate::entry::EntryId;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::trace;

/// Identity of one armed timer instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerTag {
    pub entry: EntryId,
    pub generation: u64,
}

/// Arms and disarms per-entry timers
///
/// At most one timer per entry: scheduling for an entry replaces whatever
/// was pending for it.
pub trait TimerScheduler: Send {
    fn schedule(&mut self, tag: TimerTag, deadline: Instant);

    fn cancel(&mut self, entry: EntryId);

    fn cancel_all(&mut self);
}

/// Timers backed by Tokio tasks
///
/// A fired timer sends its tag on the channel given at construction.
pub struct TokioTimers {
    fired: mpsc::UnboundedSender<TimerTag>,
    tasks: HashMap<EntryId, JoinHandle<()>>,
}

impl TokioTimers {
    /// Must be used from within a Tokio runtime
    pub fn new(fired: mpsc::UnboundedSender<TimerTag>) -> Self {
        Self {
            fired,
            tasks: HashMap::new(),
        }
    }

    /// Number of timer tasks not yet cancelled
    pub fn pending(&self) -> usize {
        self.tasks.values().filter(|task| !task.is_finished()).count()
    }
}

impl TimerScheduler for TokioTimers {
    fn schedule(&mut self, tag: TimerTag, deadline: Instant) {
        let fired = self.fired.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            trace!(entry = %tag.entry, generation = tag.generation, "idle timer fired");
            // Receiver gone means the table shut down
            let _ = fired.send(tag);
        });
        if let Some(previous) = self.tasks.insert(tag.entry, task) {
            previous.abort();
        }
    }

    fn cancel(&mut self, entry: EntryId) {
        if let Some(task) = self.tasks.remove(&entry) {
            task.abort();
        }
    }

    fn cancel_all(&mut self) {
        for (_, task) in self.tasks.drain() {
            task.abort();
        }
    }
}

impl Drop for TokioTimers {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

/// Timers driven by hand, for synchronous use of the table
///
/// Clones share the same pending set.
#[derive(Debug, Clone, Default)]
pub struct ManualTimers {
    pending: Arc<Mutex<HashMap<EntryId, (TimerTag, Instant)>>>,
}

impl ManualTimers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove and return every timer due at `now`, earliest first
    pub fn due(&self, now: Instant) -> Vec<TimerTag> {
        let mut pending = self.pending.lock();
        let mut due: Vec<(TimerTag, Instant)> = pending
            .values()
            .filter(|(_, deadline)| *deadline <= now)
            .copied()
            .collect();
        due.sort_by_key(|(_, deadline)| *deadline);
        for (tag, _) in &due {
            pending.remove(&tag.entry);
        }
        due.into_iter().map(|(tag, _)| tag).collect()
    }

    /// Currently armed timer of `entry`
    pub fn armed(&self, entry: EntryId) -> Option<(TimerTag, Instant)> {
        self.pending.lock().get(&entry).copied()
    }

    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }
}

impl TimerScheduler for ManualTimers {
    fn schedule(&mut self, tag: TimerTag, deadline: Instant) {
        self.pending.lock().insert(tag.entry, (tag, deadline));
    }

    fn cancel(&mut self, entry: EntryId) {
        self.pending.lock().remove(&entry);
    }

    fn cancel_all(&mut self) {
        self.pending.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn tag(entry: u64, generation: u64) -> TimerTag {
        TimerTag {
            entry: EntryId(entry),
            generation,
        }
    }

    #[test]
    fn test_manual_timers_replace_and_drain() {
        let mut timers = ManualTimers::new();
        let start = Instant::now();

        timers.schedule(tag(1, 0), start + Duration::from_secs(10));
        timers.schedule(tag(1, 1), start + Duration::from_secs(20));
        timers.schedule(tag(2, 0), start + Duration::from_secs(5));
        assert_eq!(timers.len(), 2);

        assert_eq!(timers.due(start + Duration::from_secs(10)), vec![tag(2, 0)]);
        assert_eq!(timers.due(start + Duration::from_secs(20)), vec![tag(1, 1)]);
        assert!(timers.is_empty());
    }

    #[test]
    fn test_manual_timers_cancel() {
        let mut timers = ManualTimers::new();
        let observer = timers.clone();
        let start = Instant::now();

        timers.schedule(tag(7, 3), start);
        assert!(observer.armed(EntryId(7)).is_some());
        timers.cancel(EntryId(7));
        assert!(observer.armed(EntryId(7)).is_none());
        assert!(observer.due(start).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_timer_fires_once() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timers = TokioTimers::new(tx);

        timers.schedule(tag(1, 0), Instant::now() + Duration::from_secs(30));
        timers.schedule(tag(1, 1), Instant::now() + Duration::from_secs(60));

        tokio::time::sleep(Duration::from_secs(45)).await;
        assert!(rx.try_recv().is_err());

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(rx.recv().await, Some(tag(1, 1)));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_timer_cancel() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timers = TokioTimers::new(tx);

        timers.schedule(tag(4, 0), Instant::now() + Duration::from_secs(1));
        timers.cancel(EntryId(4));
        assert_eq!(timers.pending(), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(rx.try_recv().is_err());
    }
}
