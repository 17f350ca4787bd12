use std::collections::VecDeque;

use crate::history::compose::{ComposeError, ComposedState, compose_state};
use crate::history::entry::HistoryEntry;

/// What changed in the log; handed to listeners after the mutation settles.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HistoryEvent {
    Push,
    ReplaceTop,
    Undo,
    Redo,
}

pub type HistoryListener = Box<dyn FnMut(HistoryEvent)>;

/// Runs right before a push mutates anything. May return a synthetic
/// corrective entry, which is appended ahead of the triggering entry; the
/// selection subsystem uses this to flush transient state when an unrelated
/// action commits.
pub type BeforePushHook = Box<dyn FnMut(&HistoryEntry) -> Option<HistoryEntry>>;

/// Append-only, truncate-on-branch undo/redo log of sparse entries.
///
/// `entries[0..=cursor]` are applied; entries past the cursor are redoable
/// until the next push abandons them. Listener notification is deferred
/// through a FIFO queue drained once the triggering mutation has settled, so
/// a listener always observes final post-mutation state.
pub struct HistoryLog {
    entries: Vec<HistoryEntry>,
    cursor: isize,
    tile_size: usize,
    change_count: u64,
    pause_depth: u32,
    listeners: Vec<HistoryListener>,
    before_push: Vec<BeforePushHook>,
    pending: VecDeque<HistoryEvent>,
    draining: bool,
}

impl HistoryLog {
    pub fn new(tile_size: usize) -> Self {
        Self {
            entries: Vec::new(),
            cursor: -1,
            tile_size,
            change_count: 0,
            pause_depth: 0,
            listeners: Vec::new(),
            before_push: Vec::new(),
            pending: VecDeque::new(),
            draining: false,
        }
    }

    pub fn tile_size(&self) -> usize {
        self.tile_size
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    /// Cursor into `entries`; `-1` means "before the first entry".
    pub fn cursor(&self) -> isize {
        self.cursor
    }

    /// Monotone counter bumped on every push/replace/undo/redo, letting
    /// pollers detect "did anything change" without comparing entries.
    pub fn get_change_count(&self) -> u64 {
        self.change_count
    }

    /// Sum of entry memory estimates, for external eviction policies.
    pub fn total_memory_estimate(&self) -> usize {
        self.entries.iter().map(|e| e.memory_estimate).sum()
    }

    pub fn add_listener(&mut self, listener: HistoryListener) {
        self.listeners.push(listener);
    }

    pub fn add_before_push_listener(&mut self, hook: BeforePushHook) {
        self.before_push.push(hook);
    }

    /// Nesting-safe suppression of pushes. While paused, instrumented drawing
    /// code can scribble freely and the caller pushes one consolidated entry
    /// after resuming.
    pub fn pause(&mut self, paused: bool) {
        if paused {
            self.pause_depth += 1;
        } else {
            debug_assert!(self.pause_depth > 0, "unbalanced HistoryLog::pause(false)");
            self.pause_depth = self.pause_depth.saturating_sub(1);
        }
    }

    pub fn push(&mut self, entry: HistoryEntry) {
        if self.pause_depth > 0 {
            log::debug!("history paused, dropping push");
            return;
        }
        // Hooks run before any mutation so they can observe the pre-push log.
        let mut injected = Vec::new();
        let mut hooks = std::mem::take(&mut self.before_push);
        for hook in &mut hooks {
            if let Some(corrective) = hook(&entry) {
                injected.push(corrective);
            }
        }
        hooks.append(&mut self.before_push);
        self.before_push = hooks;

        self.truncate_redo_tail();
        for corrective in injected {
            self.entries.push(corrective);
        }
        self.entries.push(entry);
        self.cursor = self.entries.len() as isize - 1;
        self.change_count += 1;
        self.enqueue(HistoryEvent::Push);
    }

    /// Swap out the top entry (live-adjust-then-finalize). Pushes when the
    /// log is empty.
    pub fn replace_top(&mut self, entry: HistoryEntry) {
        if self.pause_depth > 0 {
            log::debug!("history paused, dropping replace_top");
            return;
        }
        self.truncate_redo_tail();
        match self.entries.last_mut() {
            Some(top) => *top = entry,
            None => {
                self.entries.push(entry);
            }
        }
        self.cursor = self.entries.len() as isize - 1;
        self.change_count += 1;
        self.enqueue(HistoryEvent::ReplaceTop);
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > -1
    }

    pub fn can_redo(&self) -> bool {
        self.cursor < self.entries.len() as isize - 1
    }

    /// Step the cursor back. Returns `false` (no-op) at the floor.
    pub fn undo(&mut self) -> bool {
        if !self.can_undo() {
            return false;
        }
        self.cursor -= 1;
        self.change_count += 1;
        self.enqueue(HistoryEvent::Undo);
        true
    }

    /// Step the cursor forward. Returns `false` (no-op) at the top.
    pub fn redo(&mut self) -> bool {
        if !self.can_redo() {
            return false;
        }
        self.cursor += 1;
        self.change_count += 1;
        self.enqueue(HistoryEvent::Redo);
        true
    }

    /// Compose the state at the cursor; `None` before the first entry.
    pub fn compose_current(&self) -> Result<Option<ComposedState>, ComposeError> {
        if self.cursor < 0 {
            return Ok(None);
        }
        compose_state(&self.entries, self.cursor as usize, self.tile_size).map(Some)
    }

    pub fn compose_at(&self, index: usize) -> Result<ComposedState, ComposeError> {
        compose_state(&self.entries, index, self.tile_size)
    }

    fn truncate_redo_tail(&mut self) {
        let applied = (self.cursor + 1) as usize;
        if applied < self.entries.len() {
            self.entries.truncate(applied);
        }
    }

    fn enqueue(&mut self, event: HistoryEvent) {
        self.pending.push_back(event);
        self.drain();
    }

    /// Drain pending notifications FIFO. Re-entrant mutations from inside a
    /// listener queue behind the event being delivered and are picked up by
    /// the outermost drain.
    fn drain(&mut self) {
        if self.draining {
            return;
        }
        self.draining = true;
        while let Some(event) = self.pending.pop_front() {
            let mut listeners = std::mem::take(&mut self.listeners);
            for listener in &mut listeners {
                listener(event);
            }
            // Listeners added during dispatch land in self.listeners.
            listeners.append(&mut self.listeners);
            self.listeners = listeners;
        }
        self.draining = false;
    }
}
