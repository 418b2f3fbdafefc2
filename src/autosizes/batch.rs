// Paint-aligned write batching

use crate::engine::{Callback, Platform};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::{Rc, Weak};
use std::time::Duration;

#[derive(Default)]
struct BatchState {
    pending: VecDeque<Callback>,
    /// A batch is draining
    running: bool,
    /// A flush has been requested and not started yet
    waiting: bool,
}

/// Collects DOM writes and runs them together in the next animation frame.
///
/// Writes scheduled while a batch drains run inline, so a write triggered by another
/// write lands in the same frame. Cloning yields another handle to the same queue.
#[derive(Clone)]
pub struct FrameBatcher {
    state: Rc<RefCell<BatchState>>,
    platform: Rc<dyn Platform>,
}

impl FrameBatcher {
    pub fn new(platform: Rc<dyn Platform>) -> Self {
        Self {
            state: Rc::new(RefCell::new(BatchState::default())),
            platform,
        }
    }

    /// Run `op` with the next batch, or right away if a batch is draining
    pub fn schedule(&self, op: Callback) {
        if self.state.borrow().running {
            op();
            return;
        }
        self.enqueue(op);
    }

    /// Queue `op` for the next frame even if a batch is draining right now
    pub fn schedule_next_frame(&self, op: Callback) {
        self.enqueue(op);
    }

    fn enqueue(&self, op: Callback) {
        let request = {
            let mut state = self.state.borrow_mut();
            state.pending.push_back(op);
            !std::mem::replace(&mut state.waiting, true)
        };
        if request {
            self.request_flush();
        }
    }

    fn request_flush(&self) {
        let state: Weak<RefCell<BatchState>> = Rc::downgrade(&self.state);
        let flush: Callback = Box::new(move || {
            if let Some(state) = state.upgrade() {
                drain(&state);
            }
        });

        // Hidden documents get no frames
        if self.platform.document_hidden() {
            self.platform.set_timeout(Duration::ZERO, flush);
        } else {
            self.platform.request_animation_frame(flush);
        }
    }

    /// Drain the pending batch synchronously. Returns how many writes ran.
    pub fn flush_now(&self) -> usize {
        drain(&self.state)
    }

    pub fn pending(&self) -> usize {
        self.state.borrow().pending.len()
    }

    pub fn is_running(&self) -> bool {
        self.state.borrow().running
    }

    pub fn is_waiting(&self) -> bool {
        self.state.borrow().waiting
    }
}

fn drain(state: &Rc<RefCell<BatchState>>) -> usize {
    // Swap the queue out so forced schedules made while draining go to the next frame
    let (mut batch, was_running) = {
        let mut state = state.borrow_mut();
        state.waiting = false;
        let was_running = std::mem::replace(&mut state.running, true);
        (std::mem::take(&mut state.pending), was_running)
    };

    let count = batch.len();
    if count > 0 {
        tracing::trace!(count, "flushing write batch");
    }
    while let Some(op) = batch.pop_front() {
        op();
    }

    state.borrow_mut().running = was_running;
    count
}
