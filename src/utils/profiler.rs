use std::time::Instant;

/// Scope-based timer that logs the elapsed time of a named hot path on drop.
pub struct ScopeTimer {
    name: &'static str,
    start: Instant,
}

impl ScopeTimer {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            start: Instant::now(),
        }
    }
}

impl Drop for ScopeTimer {
    fn drop(&mut self) {
        log::debug!(target: "paintcore::timing", "{} took {:?}", self.name, self.start.elapsed());
    }
}
