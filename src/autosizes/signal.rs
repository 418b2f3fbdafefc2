// `beforeSizesUpdate` / `afterSizesUpdate` notifications

use crate::dom::{DomRef, Event, EventDispatcher, EventType};
use std::any::Any;

/// Detail of `beforeSizesUpdate`. Listeners may overwrite `width`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeforeSizesDetail {
    pub width: f32,
    /// Set when the caller asked for a `data-` prefixed update
    pub data_attr: bool,
}

/// Detail of `afterSizesUpdate`
#[derive(Debug, Clone, PartialEq)]
pub struct AfterSizesDetail {
    pub width: f32,
    /// The value written to the sizes attribute, e.g. `450px`
    pub sizes: String,
}

/// What the listeners left behind after a dispatch
#[derive(Debug, Clone, PartialEq)]
pub struct EventResult<D> {
    pub detail: D,
    /// A listener called `prevent_default`
    pub vetoed: bool,
}

/// Dispatch a bubbling, cancelable event carrying `detail` at `target` and hand back
/// the detail as the listeners left it.
pub fn emit<D: Any + Clone>(
    dom: &DomRef,
    target: usize,
    event_type: EventType,
    detail: D,
) -> EventResult<D> {
    let fallback = detail.clone();
    let mut event = EventDispatcher::dispatch_event(dom, target, Event::custom(event_type, detail));

    EventResult {
        vetoed: event.default_prevented(),
        detail: event.take_detail::<D>().unwrap_or(fallback),
    }
}

pub fn before_sizes_update(
    dom: &DomRef,
    target: usize,
    width: f32,
    data_attr: bool,
) -> EventResult<BeforeSizesDetail> {
    emit(
        dom,
        target,
        EventType::BeforeSizesUpdate,
        BeforeSizesDetail { width, data_attr },
    )
}

/// Informational; a veto here has no effect
pub fn after_sizes_update(dom: &DomRef, target: usize, width: f32, sizes: String) {
    let result = emit(
        dom,
        target,
        EventType::AfterSizesUpdate,
        AfterSizesDetail { width, sizes },
    );
    if result.vetoed {
        tracing::trace!(target, "afterSizesUpdate default prevented; ignored");
    }
}
