use super::{Callback, EngineConfig, Platform, TimerId, TimerManager};
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::{Duration, Instant};

enum Clock {
    System(Instant),
    /// Virtual time that only moves when the loop is advanced
    Manual(Cell<Duration>),
}

impl Clock {
    fn now(&self) -> Duration {
        match self {
            Clock::System(start) => start.elapsed(),
            Clock::Manual(now) => now.get(),
        }
    }
}

struct LoopState {
    config: EngineConfig,
    clock: Clock,
    timers: TimerManager,
    frame_callbacks: RefCell<Vec<Callback>>,
    idle_callbacks: RefCell<VecDeque<Callback>>,
    hidden: Cell<bool>,
    last_frame: Cell<Duration>,
    frames_run: Cell<u64>,
}

/// Single-threaded task loop hosting one document: timers, animation frames and
/// idle callbacks. Cloning yields another handle to the same loop.
#[derive(Clone)]
pub struct EventLoop {
    inner: Rc<LoopState>,
}

impl EventLoop {
    /// Event loop driven by wall-clock time
    pub fn new(config: EngineConfig) -> Self {
        Self::with_clock(config, Clock::System(Instant::now()))
    }

    /// Event loop whose clock only moves through [`EventLoop::advance`]
    pub fn manual(config: EngineConfig) -> Self {
        Self::with_clock(config, Clock::Manual(Cell::new(Duration::ZERO)))
    }

    fn with_clock(config: EngineConfig, clock: Clock) -> Self {
        let hidden = config.document_hidden;
        Self {
            inner: Rc::new(LoopState {
                config,
                clock,
                timers: TimerManager::new(),
                frame_callbacks: RefCell::new(Vec::new()),
                idle_callbacks: RefCell::new(VecDeque::new()),
                hidden: Cell::new(hidden),
                last_frame: Cell::new(Duration::ZERO),
                frames_run: Cell::new(0),
            }),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub fn set_document_hidden(&self, hidden: bool) {
        self.inner.hidden.set(hidden);
    }

    /// Move virtual time forward by `by`, firing every timer that comes due on the
    /// way in deadline order. Idle callbacks run after each timer task. On a system
    /// clock only the timers already due run.
    pub fn advance(&self, by: Duration) {
        let Clock::Manual(now) = &self.inner.clock else {
            self.run_due_timers();
            return;
        };

        let target = now.get() + by;
        while let Some(deadline) = self.inner.timers.next_deadline() {
            if deadline > target {
                break;
            }
            now.set(now.get().max(deadline));
            self.run_due_timers();
        }
        now.set(target);
        self.run_idle_callbacks();
    }

    /// Fire all timers due at the current time. Returns how many ran.
    pub fn run_due_timers(&self) -> usize {
        let mut fired = 0;
        while let Some((id, callback)) = self.inner.timers.take_next_due(self.now()) {
            tracing::trace!(id, "timer fired");
            callback();
            fired += 1;
            self.run_idle_callbacks();
        }
        fired
    }

    /// Run one animation frame: the callbacks registered before the frame started.
    /// Callbacks registered while it runs wait for the next frame. Hidden documents
    /// get no frames.
    pub fn run_frame(&self) -> usize {
        if self.inner.hidden.get() {
            return 0;
        }

        let callbacks = std::mem::take(&mut *self.inner.frame_callbacks.borrow_mut());
        self.inner.last_frame.set(self.now());
        self.inner.frames_run.set(self.inner.frames_run.get() + 1);

        let count = callbacks.len();
        if count > 0 {
            tracing::trace!(count, "running animation frame callbacks");
        }
        for callback in callbacks {
            callback();
        }

        self.run_idle_callbacks();
        count
    }

    pub fn run_idle_callbacks(&self) -> usize {
        let mut ran = 0;
        loop {
            let Some(callback) = self.inner.idle_callbacks.borrow_mut().pop_front() else {
                break;
            };
            callback();
            ran += 1;
        }
        ran
    }

    pub fn pending_timers(&self) -> usize {
        self.inner.timers.len()
    }

    pub fn pending_frame_callbacks(&self) -> usize {
        self.inner.frame_callbacks.borrow().len()
    }

    pub fn frames_run(&self) -> u64 {
        self.inner.frames_run.get()
    }

    /// Whether anything is left that the loop could still run
    pub fn has_pending_work(&self) -> bool {
        let frames_blocked = self.inner.hidden.get();
        self.inner.timers.has_active_timers()
            || (!frames_blocked && !self.inner.frame_callbacks.borrow().is_empty())
            || !self.inner.idle_callbacks.borrow().is_empty()
    }

    /// Drive the loop until it has nothing left to do, ticking animation frames
    /// every `frame_interval`. A system clock sleeps in real time; a manual clock
    /// jumps straight to the next task.
    pub async fn run_until_idle(&self) {
        loop {
            self.run_due_timers();
            self.run_idle_callbacks();

            if self.pending_frame_callbacks() > 0 && self.frame_due() {
                self.run_frame();
                continue;
            }

            if !self.has_pending_work() {
                break;
            }

            let wait = self.time_until_next_task();
            match &self.inner.clock {
                Clock::Manual(_) => self.advance(wait),
                Clock::System(_) => tokio::time::sleep(wait).await,
            }
        }
    }

    fn frame_due(&self) -> bool {
        !self.inner.hidden.get()
            && self.now() >= self.inner.last_frame.get() + self.inner.config.frame_interval
    }

    fn time_until_next_task(&self) -> Duration {
        let now = self.now();
        let next_timer = self.inner.timers.time_until_next_timer(now);
        let next_frame = (!self.inner.hidden.get() && self.pending_frame_callbacks() > 0).then(|| {
            (self.inner.last_frame.get() + self.inner.config.frame_interval).saturating_sub(now)
        });

        match (next_timer, next_frame) {
            (Some(timer), Some(frame)) => timer.min(frame),
            (Some(wait), None) | (None, Some(wait)) => wait,
            (None, None) => Duration::ZERO,
        }
    }
}

impl Platform for EventLoop {
    fn now(&self) -> Duration {
        self.inner.clock.now()
    }

    fn set_timeout(&self, delay: Duration, callback: Callback) -> TimerId {
        self.inner.timers.set_timeout(self.now(), delay, callback)
    }

    fn clear_timeout(&self, id: TimerId) {
        self.inner.timers.clear_timer(id);
    }

    fn request_animation_frame(&self, callback: Callback) {
        self.inner.frame_callbacks.borrow_mut().push(callback);
    }

    fn request_idle_callback(&self, callback: Callback) -> Result<(), Callback> {
        if !self.inner.config.idle_callbacks {
            return Err(callback);
        }
        self.inner.idle_callbacks.borrow_mut().push_back(callback);
        Ok(())
    }

    fn document_hidden(&self) -> bool {
        self.inner.hidden.get()
    }
}
