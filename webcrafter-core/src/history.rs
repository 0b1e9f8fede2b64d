//! Bounded, linear, debounced undo/redo history of Code Bundle snapshots.

use crate::bundle::{ChangeOrigin, CodeBundle};
use crate::debounce::Debouncer;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Maximum number of snapshots kept.
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// Quiet period after the last edit before it is recorded.
pub const DEFAULT_HISTORY_DEBOUNCE: Duration = Duration::from_millis(800);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryState {
    Idle,
    PendingRecord,
}

/// Snapshot list plus a cursor into it.
///
/// Invariant: `entries` is never empty and `index < entries.len()`.
#[derive(Debug, Clone)]
pub struct HistoryManager {
    entries: VecDeque<CodeBundle>,
    index: usize,
    limit: usize,
    recorder: Debouncer<CodeBundle>,
    paused: bool,
}

impl HistoryManager {
    pub fn new(initial: CodeBundle) -> Self {
        Self::with_settings(initial, DEFAULT_HISTORY_LIMIT, DEFAULT_HISTORY_DEBOUNCE)
    }

    pub fn with_settings(initial: CodeBundle, limit: usize, debounce: Duration) -> Self {
        let mut entries = VecDeque::with_capacity(limit.max(1) + 1);
        entries.push_back(initial);
        Self {
            entries,
            index: 0,
            limit: limit.max(1),
            recorder: Debouncer::new(debounce),
            paused: false,
        }
    }

    /// Drops every snapshot and starts over from `initial`.
    pub fn reset(&mut self, initial: CodeBundle) {
        self.recorder.cancel();
        self.entries.clear();
        self.entries.push_back(initial);
        self.index = 0;
    }

    /// While paused, changes are not recorded and any pending record is dropped.
    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
        if paused {
            self.recorder.cancel();
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn state(&self) -> HistoryState {
        if self.recorder.is_pending() {
            HistoryState::PendingRecord
        } else {
            HistoryState::Idle
        }
    }

    pub fn current(&self) -> &CodeBundle {
        &self.entries[self.index]
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &CodeBundle> {
        self.entries.iter()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.recorder.deadline()
    }

    pub fn can_undo(&self) -> bool {
        self.index > 0
    }

    pub fn can_redo(&self) -> bool {
        self.index + 1 < self.entries.len()
    }

    /// Feeds a bundle change into the recorder.
    ///
    /// Replays of history never schedule a recording; a change back to the
    /// current snapshot cancels any pending one.
    pub fn observe(&mut self, bundle: &CodeBundle, origin: ChangeOrigin, now: Instant) {
        if origin.is_replay() {
            tracing::debug!("history: ignoring time-travel change");
            self.recorder.cancel();
            return;
        }
        if self.paused {
            return;
        }
        if bundle == self.current() {
            self.recorder.cancel();
            return;
        }
        self.recorder.schedule(bundle.clone(), now);
    }

    /// Records the pending bundle if its debounce window elapsed.
    /// Returns true when a snapshot was appended.
    pub fn tick(&mut self, now: Instant) -> bool {
        match self.recorder.fire(now) {
            Some(bundle) => self.record(bundle),
            None => false,
        }
    }

    /// Records the pending bundle now, regardless of the deadline.
    pub fn flush(&mut self) -> bool {
        match self.recorder.flush() {
            Some(bundle) => self.record(bundle),
            None => false,
        }
    }

    fn record(&mut self, bundle: CodeBundle) -> bool {
        if &bundle == self.current() {
            return false;
        }
        self.entries.truncate(self.index + 1);
        self.entries.push_back(bundle);
        if self.entries.len() > self.limit {
            self.entries.pop_front();
        }
        self.index = self.entries.len() - 1;
        tracing::debug!(entries = self.entries.len(), "history: recorded snapshot");
        true
    }

    /// Steps back one snapshot and returns it for republishing.
    ///
    /// An edit still waiting in the debounce window is recorded first so it
    /// is not lost by the jump.
    pub fn undo(&mut self) -> Option<CodeBundle> {
        self.flush();
        if !self.can_undo() {
            return None;
        }
        self.index -= 1;
        Some(self.entries[self.index].clone())
    }

    /// Steps forward one snapshot and returns it for republishing.
    pub fn redo(&mut self) -> Option<CodeBundle> {
        self.flush();
        if !self.can_redo() {
            return None;
        }
        self.index += 1;
        Some(self.entries[self.index].clone())
    }
}

// ─── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn html(s: &str) -> CodeBundle {
        CodeBundle::new(s, "", "")
    }

    fn settle(history: &mut HistoryManager, bundle: &CodeBundle, now: &mut Instant) {
        history.observe(bundle, ChangeOrigin::Editor, *now);
        *now += DEFAULT_HISTORY_DEBOUNCE;
        history.tick(*now);
    }

    #[test]
    fn test_equal_bundle_does_not_schedule() {
        let now = Instant::now();
        let mut history = HistoryManager::new(html("a"));
        history.observe(&html("a"), ChangeOrigin::Editor, now);
        assert_eq!(history.state(), HistoryState::Idle);
    }

    #[test]
    fn test_debounce_coalesces_burst() {
        let start = Instant::now();
        let mut history = HistoryManager::new(html(""));

        history.observe(&html("a"), ChangeOrigin::Editor, start);
        history.observe(&html("ab"), ChangeOrigin::Editor, start + Duration::from_millis(40));
        history.observe(&html("abc"), ChangeOrigin::Editor, start + Duration::from_millis(90));
        assert_eq!(history.state(), HistoryState::PendingRecord);

        assert!(!history.tick(start + Duration::from_millis(800)));
        assert!(history.tick(start + Duration::from_millis(890)));
        assert_eq!(history.len(), 2);
        assert_eq!(history.current(), &html("abc"));
    }

    #[test]
    fn test_bounded_to_limit() {
        let mut now = Instant::now();
        let mut history = HistoryManager::new(html("initial"));
        for i in 1..=60 {
            settle(&mut history, &html(&format!("edit {}", i)), &mut now);
        }
        assert_eq!(history.len(), DEFAULT_HISTORY_LIMIT);
        assert_eq!(history.index(), DEFAULT_HISTORY_LIMIT - 1);
        assert_eq!(history.entries().next(), Some(&html("edit 11")));
        assert_eq!(history.current(), &html("edit 60"));
    }

    #[test]
    fn test_undo_redo_round_trip() {
        let mut now = Instant::now();
        let b0 = html("b0");
        let mut history = HistoryManager::new(b0.clone());
        for i in 1..=5 {
            settle(&mut history, &html(&format!("b{}", i)), &mut now);
        }

        let mut last = None;
        for _ in 0..5 {
            last = history.undo();
        }
        assert_eq!(last, Some(b0));
        assert_eq!(history.undo(), None);

        for _ in 0..5 {
            last = history.redo();
        }
        assert_eq!(last, Some(html("b5")));
        assert_eq!(history.redo(), None);
    }

    #[test]
    fn test_new_edit_after_undo_drops_future() {
        let mut now = Instant::now();
        let mut history = HistoryManager::new(html("b0"));
        for i in 1..=3 {
            settle(&mut history, &html(&format!("b{}", i)), &mut now);
        }
        let restored = history.undo().unwrap();
        // The republished snapshot comes back tagged as time travel.
        history.observe(&restored, ChangeOrigin::TimeTravel, now);
        assert_eq!(history.state(), HistoryState::Idle);

        let undo_position = history.index();
        settle(&mut history, &html("branch"), &mut now);
        assert!(!history.can_redo());
        assert_eq!(history.len(), (undo_position + 1) + 1);
    }

    #[test]
    fn test_time_travel_change_is_not_recorded() {
        let now = Instant::now();
        let mut history = HistoryManager::new(html("b0"));
        history.observe(&html("other"), ChangeOrigin::TimeTravel, now);
        assert!(!history.tick(now + Duration::from_secs(2)));
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn test_undo_records_pending_edit_first() {
        let now = Instant::now();
        let mut history = HistoryManager::new(html("b0"));
        history.observe(&html("typed"), ChangeOrigin::Editor, now);
        assert_eq!(history.undo(), Some(html("b0")));
        assert!(history.can_redo());
        assert_eq!(history.redo(), Some(html("typed")));
    }

    #[test]
    fn test_paused_history_drops_changes() {
        let now = Instant::now();
        let mut history = HistoryManager::new(html("b0"));
        history.observe(&html("typed"), ChangeOrigin::Editor, now);
        history.set_paused(true);
        assert_eq!(history.state(), HistoryState::Idle);

        history.observe(&html("during load"), ChangeOrigin::Editor, now);
        assert!(!history.tick(now + Duration::from_secs(2)));
        assert_eq!(history.len(), 1);

        history.set_paused(false);
        history.observe(&html("generated"), ChangeOrigin::External, now);
        assert!(history.tick(now + DEFAULT_HISTORY_DEBOUNCE));
        assert_eq!(history.current(), &html("generated"));
    }
}
