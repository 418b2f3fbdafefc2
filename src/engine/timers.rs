// Timer bookkeeping for setTimeout
use super::{Callback, TimerId};
use hashbrown::HashMap;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

/// A pending timer that will execute a callback after a delay
struct Timer {
    id: TimerId,
    deadline: Duration,
    callback: Callback,
}

impl std::fmt::Debug for Timer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Timer")
            .field("id", &self.id)
            .field("deadline", &self.deadline)
            .finish_non_exhaustive()
    }
}

/// Timer manager that tracks all active timers. Times are offsets from the
/// owning event loop's start.
#[derive(Clone)]
pub struct TimerManager {
    timers: Rc<RefCell<HashMap<TimerId, Timer>>>,
    next_id: Rc<Cell<TimerId>>,
}

impl Default for TimerManager {
    fn default() -> Self {
        Self::new()
    }
}

impl TimerManager {
    pub fn new() -> Self {
        Self {
            timers: Rc::new(RefCell::new(HashMap::new())),
            next_id: Rc::new(Cell::new(1)),
        }
    }

    /// Register a new timeout
    pub fn set_timeout(&self, now: Duration, delay: Duration, callback: Callback) -> TimerId {
        let id = self.next_id.get();
        self.next_id.set(id.wrapping_add(1).max(1));

        let timer = Timer {
            id,
            deadline: now + delay,
            callback,
        };

        self.timers.borrow_mut().insert(id, timer);
        id
    }

    /// Clear a timeout. Unknown or already fired ids are ignored.
    pub fn clear_timer(&self, id: TimerId) {
        self.timers.borrow_mut().remove(&id);
    }

    /// Remove and return the earliest timer due at `now`. Timers sharing a deadline
    /// come out in registration order.
    pub fn take_next_due(&self, now: Duration) -> Option<(TimerId, Callback)> {
        let mut timers = self.timers.borrow_mut();
        let id = timers
            .values()
            .filter(|timer| timer.deadline <= now)
            .min_by_key(|timer| (timer.deadline, timer.id))
            .map(|timer| timer.id)?;
        timers.remove(&id).map(|timer| (timer.id, timer.callback))
    }

    /// Check if there are any active timers
    pub fn has_active_timers(&self) -> bool {
        !self.timers.borrow().is_empty()
    }

    pub fn len(&self) -> usize {
        self.timers.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn next_deadline(&self) -> Option<Duration> {
        self.timers.borrow().values().map(|timer| timer.deadline).min()
    }

    /// Get the time until the next timer should fire
    pub fn time_until_next_timer(&self, now: Duration) -> Option<Duration> {
        self.next_deadline()
            .map(|deadline| deadline.saturating_sub(now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> Callback {
        Box::new(|| {})
    }

    fn ms(ms: u64) -> Duration {
        Duration::from_millis(ms)
    }

    #[test]
    fn due_timers_come_out_earliest_first() {
        let timers = TimerManager::new();
        let late = timers.set_timeout(ms(0), ms(50), noop());
        let early = timers.set_timeout(ms(0), ms(10), noop());
        let tied = timers.set_timeout(ms(0), ms(10), noop());

        assert!(timers.take_next_due(ms(5)).is_none());
        assert_eq!(timers.take_next_due(ms(60)).map(|(id, _)| id), Some(early));
        assert_eq!(timers.take_next_due(ms(60)).map(|(id, _)| id), Some(tied));
        assert_eq!(timers.take_next_due(ms(60)).map(|(id, _)| id), Some(late));
        assert!(timers.is_empty());
    }

    #[test]
    fn cleared_timers_never_fire() {
        let timers = TimerManager::new();
        let id = timers.set_timeout(ms(0), ms(10), noop());
        timers.clear_timer(id);
        timers.clear_timer(id);

        assert!(!timers.has_active_timers());
        assert!(timers.take_next_due(ms(100)).is_none());
    }

    #[test]
    fn reports_time_until_next_timer() {
        let timers = TimerManager::new();
        assert_eq!(timers.time_until_next_timer(ms(0)), None);

        timers.set_timeout(ms(20), ms(30), noop());
        timers.set_timeout(ms(20), ms(99), noop());

        assert_eq!(timers.next_deadline(), Some(ms(50)));
        assert_eq!(timers.time_until_next_timer(ms(45)), Some(ms(5)));
        assert_eq!(timers.time_until_next_timer(ms(70)), Some(Duration::ZERO));
    }
}
