// Trailing-edge debounce for resize bursts

use crate::engine::{Callback, Platform, TimerId};
use std::cell::Cell;
use std::rc::{Rc, Weak};
use std::time::Duration;

struct DebounceInner {
    func: Box<dyn Fn()>,
    wait: Duration,
    platform: Rc<dyn Platform>,
    /// Pending timer. Stays set across re-arms until the wrapped function runs.
    armed: Cell<Option<TimerId>>,
    last_call: Cell<Duration>,
    runs: Cell<u64>,
}

/// Wraps a function so a burst of calls results in one run, `wait` after the last
/// call of the burst. The run goes through idle-time scheduling when the platform
/// has it. Cloning yields another handle to the same debounced function.
#[derive(Clone)]
pub struct Debounced {
    inner: Rc<DebounceInner>,
}

/// Weak handle for listeners, so a registered listener does not keep the debounced
/// function alive
#[derive(Clone)]
pub struct WeakDebounced {
    inner: Weak<DebounceInner>,
}

impl Debounced {
    pub fn new<F>(platform: Rc<dyn Platform>, wait: Duration, func: F) -> Self
    where
        F: Fn() + 'static,
    {
        Self {
            inner: Rc::new(DebounceInner {
                func: Box::new(func),
                wait,
                platform,
                armed: Cell::new(None),
                last_call: Cell::new(Duration::ZERO),
                runs: Cell::new(0),
            }),
        }
    }

    /// Record a call. Arms the timer unless one is already pending.
    pub fn call(&self) {
        call(&self.inner);
    }

    pub fn is_armed(&self) -> bool {
        self.inner.armed.get().is_some()
    }

    /// How many times the wrapped function has run
    pub fn runs(&self) -> u64 {
        self.inner.runs.get()
    }

    pub fn wait(&self) -> Duration {
        self.inner.wait
    }

    /// Drop the pending timer, if any. The wrapped function does not run.
    pub fn cancel(&self) {
        if let Some(id) = self.inner.armed.take() {
            self.inner.platform.clear_timeout(id);
        }
    }

    pub fn downgrade(&self) -> WeakDebounced {
        WeakDebounced {
            inner: Rc::downgrade(&self.inner),
        }
    }
}

impl WeakDebounced {
    /// Returns `false` when the debounced function is gone
    pub fn call(&self) -> bool {
        match self.inner.upgrade() {
            Some(inner) => {
                call(&inner);
                true
            }
            None => false,
        }
    }
}

fn call(inner: &Rc<DebounceInner>) {
    inner.last_call.set(inner.platform.now());
    if inner.armed.get().is_none() {
        arm(inner, inner.wait);
    }
}

fn arm(inner: &Rc<DebounceInner>, delay: Duration) {
    let weak = Rc::downgrade(inner);
    let on_timeout: Callback = Box::new(move || {
        if let Some(inner) = weak.upgrade() {
            later(&inner);
        }
    });
    let id = inner.platform.set_timeout(delay, on_timeout);
    inner.armed.set(Some(id));
}

fn later(inner: &Rc<DebounceInner>) {
    let elapsed = inner.platform.now().saturating_sub(inner.last_call.get());
    if elapsed < inner.wait {
        let remaining = inner.wait - elapsed;
        tracing::trace!(remaining_ms = remaining.as_millis() as u64, "debounce re-armed");
        arm(inner, remaining);
        return;
    }

    let weak = Rc::downgrade(inner);
    let run_when_idle: Callback = Box::new(move || {
        if let Some(inner) = weak.upgrade() {
            run(&inner);
        }
    });
    if let Err(run_now) = inner.platform.request_idle_callback(run_when_idle) {
        run_now();
    }
}

fn run(inner: &Rc<DebounceInner>) {
    // Cleared by `cancel` while waiting for idle time
    if inner.armed.take().is_none() {
        return;
    }
    inner.runs.set(inner.runs.get() + 1);
    (inner.func)();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineConfig, EventLoop};
    use std::cell::RefCell;

    fn ms(ms: u64) -> Duration {
        Duration::from_millis(ms)
    }

    /// A debounced function recording the virtual time of each run
    fn setup(config: EngineConfig) -> (EventLoop, Debounced, Rc<RefCell<Vec<Duration>>>) {
        let event_loop = EventLoop::manual(config);
        let runs = Rc::new(RefCell::new(Vec::new()));
        let runs_in_func = runs.clone();
        let clock = event_loop.clone();
        let debounced = Debounced::new(Rc::new(event_loop.clone()), ms(99), move || {
            runs_in_func.borrow_mut().push(clock.now());
        });
        (event_loop, debounced, runs)
    }

    #[test]
    fn single_call_runs_after_the_wait() {
        let (event_loop, debounced, runs) = setup(EngineConfig::default());

        debounced.call();
        event_loop.advance(ms(98));
        assert!(runs.borrow().is_empty());

        event_loop.advance(ms(1));
        assert_eq!(*runs.borrow(), vec![ms(99)]);
        assert!(!debounced.is_armed());
    }

    #[test]
    fn burst_collapses_into_one_trailing_run() {
        let (event_loop, debounced, runs) = setup(EngineConfig::default());

        for _ in 0..5 {
            debounced.call();
            event_loop.advance(ms(30));
        }
        // Last call at t=120
        event_loop.advance(ms(1000));

        assert_eq!(runs.borrow().len(), 1);
        assert!(runs.borrow()[0] >= ms(120 + 99));
        assert_eq!(debounced.runs(), 1);
    }

    #[test]
    fn timer_is_armed_once_per_burst() {
        let (event_loop, debounced, _runs) = setup(EngineConfig::default());

        debounced.call();
        debounced.call();
        debounced.call();

        assert_eq!(event_loop.pending_timers(), 1);
    }

    #[test]
    fn runs_immediately_without_idle_callbacks() {
        let (event_loop, debounced, runs) = setup(EngineConfig {
            idle_callbacks: false,
            ..EngineConfig::default()
        });

        debounced.call();
        event_loop.advance(ms(99));

        assert_eq!(*runs.borrow(), vec![ms(99)]);
    }

    #[test]
    fn separate_bursts_run_separately() {
        let (event_loop, debounced, runs) = setup(EngineConfig::default());

        debounced.call();
        event_loop.advance(ms(200));
        debounced.call();
        event_loop.advance(ms(200));

        assert_eq!(*runs.borrow(), vec![ms(99), ms(299)]);
    }

    #[test]
    fn cancel_and_drop_stop_pending_runs() {
        let (event_loop, debounced, runs) = setup(EngineConfig::default());

        debounced.call();
        debounced.cancel();
        event_loop.advance(ms(500));
        assert!(runs.borrow().is_empty());

        let weak = debounced.downgrade();
        assert!(weak.call());
        drop(debounced);
        event_loop.advance(ms(500));

        assert!(runs.borrow().is_empty());
        assert!(!weak.call());
    }

    /// Fires timers as soon as they are set and holds idle callbacks until asked
    #[derive(Default)]
    struct HeldIdle {
        idle: RefCell<Vec<Callback>>,
    }

    impl Platform for HeldIdle {
        fn now(&self) -> Duration {
            ms(1000)
        }

        fn set_timeout(&self, _delay: Duration, callback: Callback) -> TimerId {
            self.idle.borrow_mut().push(callback);
            1
        }

        fn clear_timeout(&self, _id: TimerId) {}

        fn request_animation_frame(&self, callback: Callback) {
            callback();
        }

        fn request_idle_callback(&self, callback: Callback) -> Result<(), Callback> {
            self.idle.borrow_mut().push(callback);
            Ok(())
        }
    }

    impl HeldIdle {
        fn run_next(&self) {
            let next = self.idle.borrow_mut().pop();
            if let Some(callback) = next {
                callback();
            }
        }
    }

    #[test]
    fn cancel_while_waiting_for_idle_time_skips_the_run() {
        let platform = Rc::new(HeldIdle::default());
        let runs = Rc::new(Cell::new(0));
        let counter = runs.clone();
        let debounced = Debounced::new(platform.clone(), Duration::ZERO, move || {
            counter.set(counter.get() + 1);
        });

        debounced.call();
        // Timer fires and queues the idle run
        platform.run_next();
        debounced.cancel();
        platform.run_next();

        assert_eq!(runs.get(), 0);
        assert!(!debounced.is_armed());
    }
}
