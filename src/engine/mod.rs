// Platform services: clock, timers, animation frames, idle callbacks
mod config;
mod event_loop;
mod timers;

use std::time::Duration;

pub use self::config::EngineConfig;
pub use self::event_loop::EventLoop;
pub use self::timers::TimerManager;

/// A one-shot task queued on the event loop
pub type Callback = Box<dyn FnOnce()>;

pub type TimerId = u32;

/// The scheduling primitives a document host offers to script-side code.
///
/// Everything runs on one thread; callbacks are never invoked re-entrantly from
/// inside the call that registered them.
pub trait Platform {
    /// Monotonic time since the host started
    fn now(&self) -> Duration;

    fn set_timeout(&self, delay: Duration, callback: Callback) -> TimerId;

    fn clear_timeout(&self, id: TimerId);

    /// Run `callback` before the next paint
    fn request_animation_frame(&self, callback: Callback);

    /// Queue `callback` for idle time. Hands the callback back when the host has no
    /// idle scheduling.
    fn request_idle_callback(&self, callback: Callback) -> Result<(), Callback>;

    /// Hidden documents get no animation frames
    fn document_hidden(&self) -> bool {
        false
    }
}
