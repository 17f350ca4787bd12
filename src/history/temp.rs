/// Short-lived, discardable secondary undo stack for in-progress interactive
/// operations.
///
/// Same stack shape as `HistoryLog` but generic over the entry type (a live
/// transform stores matrix snapshots, not canvas patches), cleared often, and
/// explicitly toggled active: while inactive the executor treats it as a
/// pass-through.
pub struct TempHistory<E> {
    entries: Vec<E>,
    cursor: isize,
    active: bool,
}

impl<E> Default for TempHistory<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> TempHistory<E> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            cursor: -1,
            active: false,
        }
    }

    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn push(&mut self, entry: E) {
        self.truncate_redo_tail();
        self.entries.push(entry);
        self.cursor = self.entries.len() as isize - 1;
    }

    /// Drop everything from the cursor onward (inclusive), then push. A live
    /// gesture calls this on every update so it stays one logical step
    /// instead of accumulating one step per mouse-move.
    pub fn replace_top(&mut self, entry: E) {
        if self.cursor >= 0 {
            self.entries.truncate(self.cursor as usize);
        } else {
            self.entries.clear();
        }
        self.entries.push(entry);
        self.cursor = self.entries.len() as isize - 1;
    }

    pub fn can_decrease(&self) -> bool {
        self.cursor > -1
    }

    pub fn can_increase(&self) -> bool {
        self.cursor < self.entries.len() as isize - 1
    }

    pub fn decrease(&mut self) -> bool {
        if !self.can_decrease() {
            return false;
        }
        self.cursor -= 1;
        true
    }

    pub fn increase(&mut self) -> bool {
        if !self.can_increase() {
            return false;
        }
        self.cursor += 1;
        true
    }

    /// Entries up to the cursor only; the discarded tail stays hidden.
    pub fn entries(&self) -> &[E] {
        &self.entries[..(self.cursor + 1) as usize]
    }

    /// The entry at the cursor, if any.
    pub fn current(&self) -> Option<&E> {
        if self.cursor < 0 {
            None
        } else {
            self.entries.get(self.cursor as usize)
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.cursor = -1;
    }

    fn truncate_redo_tail(&mut self) {
        self.entries.truncate((self.cursor + 1) as usize);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replace_top_keeps_one_logical_step() {
        let mut temp = TempHistory::new();
        temp.replace_top(1);
        temp.replace_top(2);
        temp.replace_top(3);
        assert_eq!(temp.entries(), &[3]);
        assert!(temp.can_decrease());
        assert!(temp.decrease());
        assert_eq!(temp.entries(), &[] as &[i32]);
        assert!(!temp.decrease());
    }

    #[test]
    fn replace_top_after_decrease_truncates_the_tail() {
        let mut temp = TempHistory::new();
        temp.push(1);
        temp.push(2);
        temp.decrease();
        assert!(temp.can_increase());
        temp.replace_top(9);
        assert_eq!(temp.entries(), &[9]);
        assert!(!temp.can_increase());
    }

    #[test]
    fn push_after_decrease_drops_the_hidden_tail() {
        let mut temp = TempHistory::new();
        temp.push(1);
        temp.push(2);
        temp.push(3);
        temp.decrease();
        temp.decrease();
        temp.push(9);
        assert_eq!(temp.entries(), &[1, 9]);
        assert!(!temp.can_increase());
        assert_eq!(temp.current(), Some(&9));
    }

    #[test]
    fn entries_hide_the_discarded_tail() {
        let mut temp = TempHistory::new();
        temp.push(1);
        temp.push(2);
        temp.push(3);
        temp.decrease();
        assert_eq!(temp.entries(), &[1, 2]);
        assert_eq!(temp.current(), Some(&2));
        temp.increase();
        assert_eq!(temp.entries(), &[1, 2, 3]);
    }

    #[test]
    fn clear_resets_cursor() {
        let mut temp = TempHistory::new();
        temp.push(1);
        temp.clear();
        assert_eq!(temp.entries(), &[] as &[i32]);
        assert!(!temp.can_decrease());
        assert!(!temp.can_increase());
        assert_eq!(temp.current(), None);
    }
}
