use std::time::{Duration, Instant};

pub const DEFAULT_AUTOSAVE_DELAY: Duration = Duration::from_millis(1000);

/// What the status line shows. Not part of the persistence contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveStatus {
    Idle,
    Pending,
    Saved,
    Failed,
}

/// Debounce for persistence: each change pushes the deadline back, so a
/// burst of edits produces one save once the editor goes quiet.
#[derive(Debug, Clone)]
pub struct AutosaveScheduler {
    enabled: bool,
    delay: Duration,
    deadline: Option<Instant>,
    status: SaveStatus,
}

impl Default for AutosaveScheduler {
    fn default() -> Self {
        Self::new(true, DEFAULT_AUTOSAVE_DELAY)
    }
}

impl AutosaveScheduler {
    pub fn new(enabled: bool, delay: Duration) -> Self {
        Self {
            enabled,
            delay,
            deadline: None,
            status: SaveStatus::Idle,
        }
    }

    pub fn status(&self) -> SaveStatus {
        self.status
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// Replace any pending deadline with `now + delay`.
    pub fn notify_change(&mut self, now: Instant) {
        if !self.enabled {
            return;
        }
        self.deadline = Some(now + self.delay);
        self.status = SaveStatus::Pending;
    }

    /// True once, when the pending deadline has passed.
    pub fn take_due(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if deadline <= now => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    /// Drop the pending deadline; the caller is saving right now.
    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn record(&mut self, saved: bool) {
        self.status = if saved {
            SaveStatus::Saved
        } else {
            SaveStatus::Failed
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_burst_of_changes_fires_once_after_last() {
        let start = Instant::now();
        let mut autosave = AutosaveScheduler::new(true, Duration::from_millis(1000));

        autosave.notify_change(start);
        autosave.notify_change(start + Duration::from_millis(200));
        autosave.notify_change(start + Duration::from_millis(400));

        assert!(!autosave.take_due(start + Duration::from_millis(1000)));
        assert!(autosave.take_due(start + Duration::from_millis(1400)));
        assert!(!autosave.take_due(start + Duration::from_millis(5000)));
    }

    #[test]
    fn test_disabled_scheduler_never_fires() {
        let start = Instant::now();
        let mut autosave = AutosaveScheduler::new(false, Duration::from_millis(10));
        autosave.notify_change(start);
        assert_eq!(autosave.deadline(), None);
        assert_eq!(autosave.status(), SaveStatus::Idle);
    }

    #[test]
    fn test_cancel_clears_deadline() {
        let start = Instant::now();
        let mut autosave = AutosaveScheduler::default();
        autosave.notify_change(start);
        autosave.cancel();
        autosave.record(true);
        assert!(!autosave.is_pending());
        assert_eq!(autosave.status(), SaveStatus::Saved);
    }
}
