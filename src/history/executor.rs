use std::sync::{Arc, Mutex};

use crate::history::log::HistoryLog;
use crate::history::temp::TempHistory;

/// Which stack a unified undo/redo call actually stepped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    Undo,
    Redo,
    TempUndo,
    TempRedo,
}

pub type CanUndoRedoCallback = Box<dyn FnMut(bool, bool)>;

/// Single control surface for a global Undo/Redo button pair.
///
/// Arbitrates between the temp stack (priority while active) and the main
/// log, debounces rapid double-invocations to one step per tick, and reports
/// combined availability changes only when they actually flip.
pub struct HistoryExecutor<E> {
    history: Arc<Mutex<HistoryLog>>,
    temp: Arc<Mutex<TempHistory<E>>>,
    stepping: bool,
    last_availability: (bool, bool),
    on_change: Option<CanUndoRedoCallback>,
}

impl<E> HistoryExecutor<E> {
    pub fn new(history: Arc<Mutex<HistoryLog>>, temp: Arc<Mutex<TempHistory<E>>>) -> Self {
        let mut executor = Self {
            history,
            temp,
            stepping: false,
            last_availability: (false, false),
            on_change: None,
        };
        executor.last_availability = executor.availability();
        executor
    }

    pub fn on_can_undo_redo_change(&mut self, callback: CanUndoRedoCallback) {
        self.on_change = Some(callback);
    }

    /// Combined, temp-aware undo availability.
    pub fn can_undo(&self) -> bool {
        self.availability().0
    }

    pub fn can_redo(&self) -> bool {
        self.availability().1
    }

    /// One unified undo step: temp stack first while active, then the main
    /// log. `None` when nothing could step (boundary, or debounced).
    pub fn undo(&mut self) -> Option<Step> {
        if self.stepping {
            log::debug!("undo debounced, waiting for tick");
            return None;
        }
        let step = {
            let mut temp = self.temp.lock().unwrap();
            if temp.is_active() && temp.can_decrease() {
                temp.decrease();
                Some(Step::TempUndo)
            } else {
                drop(temp);
                let mut history = self.history.lock().unwrap();
                history.undo().then_some(Step::Undo)
            }
        };
        if step.is_some() {
            self.stepping = true;
        }
        self.refresh();
        step
    }

    /// Mirror of `undo`, temp stack taking priority while active.
    pub fn redo(&mut self) -> Option<Step> {
        if self.stepping {
            log::debug!("redo debounced, waiting for tick");
            return None;
        }
        let step = {
            let mut temp = self.temp.lock().unwrap();
            if temp.is_active() && temp.can_increase() {
                temp.increase();
                Some(Step::TempRedo)
            } else {
                drop(temp);
                let mut history = self.history.lock().unwrap();
                history.redo().then_some(Step::Redo)
            }
        };
        if step.is_some() {
            self.stepping = true;
        }
        self.refresh();
        step
    }

    /// Clears the per-tick re-entrancy guard; the host run-loop calls this
    /// once per turn.
    pub fn tick(&mut self) {
        self.stepping = false;
    }

    /// Recompute combined availability and fire the change callback if the
    /// pair flipped. Hosts call this after pushing entries or toggling the
    /// temp stack.
    pub fn refresh(&mut self) {
        let availability = self.availability();
        if availability != self.last_availability {
            self.last_availability = availability;
            if let Some(callback) = &mut self.on_change {
                callback(availability.0, availability.1);
            }
        }
    }

    fn availability(&self) -> (bool, bool) {
        let temp = self.temp.lock().unwrap();
        let history = self.history.lock().unwrap();
        if temp.is_active() {
            (
                temp.can_decrease() || history.can_undo(),
                temp.can_increase() || history.can_redo(),
            )
        } else {
            (history.can_undo(), history.can_redo())
        }
    }
}
