// Event system for DOM nodes
use crate::dom::DomRef;
use hashbrown::HashMap;
use std::any::Any;
use std::fmt;
use std::rc::Rc;

/// Event types supported by the document
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventType {
    // UI events
    Resize,

    // Responsive image sizing
    BeforeSizesUpdate,
    AfterSizesUpdate,

    // Custom/Unknown event
    Custom(String),
}

impl EventType {
    /// Parse an event type from a string
    pub fn from_name(s: &str) -> Self {
        match s {
            "beforeSizesUpdate" => return EventType::BeforeSizesUpdate,
            "afterSizesUpdate" => return EventType::AfterSizesUpdate,
            _ => {}
        }
        match s.to_lowercase().as_str() {
            "resize" => EventType::Resize,
            _ => EventType::Custom(s.to_string()),
        }
    }

    /// Convert event type to string
    pub fn as_str(&self) -> &str {
        match self {
            EventType::Resize => "resize",
            EventType::BeforeSizesUpdate => "beforeSizesUpdate",
            EventType::AfterSizesUpdate => "afterSizesUpdate",
            EventType::Custom(s) => s.as_str(),
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Listener callback. Delivery is synchronous; anything the listener wants honored
/// (a veto, a changed detail) must happen before it returns.
pub type ListenerCallback = Rc<dyn Fn(&mut Event)>;

#[derive(Clone)]
pub struct EventListener {
    pub callback: ListenerCallback,
    /// Whether to capture the event
    pub use_capture: bool,
    /// Unique ID for this listener
    pub id: usize,
}

/// Event listener registry for a DOM node
#[derive(Clone, Default)]
pub struct EventListenerRegistry {
    /// Map of event type to list of listeners
    listeners: HashMap<EventType, Vec<EventListener>>,
    /// Counter for generating unique listener IDs
    next_id: usize,
}

impl EventListenerRegistry {
    pub fn new() -> Self {
        Self {
            listeners: HashMap::new(),
            next_id: 0,
        }
    }

    /// Add an event listener
    pub fn add_listener(
        &mut self,
        event_type: EventType,
        callback: ListenerCallback,
        use_capture: bool,
    ) -> usize {
        let id = self.next_id;
        self.next_id += 1;

        self.listeners
            .entry(event_type)
            .or_default()
            .push(EventListener {
                callback,
                use_capture,
                id,
            });

        id
    }

    /// Remove an event listener by ID
    pub fn remove_listener_by_id(&mut self, event_type: &EventType, id: usize) -> bool {
        if let Some(listeners) = self.listeners.get_mut(event_type) {
            let initial_len = listeners.len();
            listeners.retain(|listener| listener.id != id);
            listeners.len() < initial_len
        } else {
            false
        }
    }

    /// Get all listeners for an event type
    pub fn get_listeners(&self, event_type: &EventType) -> Option<&Vec<EventListener>> {
        self.listeners.get(event_type)
    }

    /// Check if there are any listeners for an event type
    pub fn has_listeners(&self, event_type: &EventType) -> bool {
        self.listeners
            .get(event_type)
            .is_some_and(|l| !l.is_empty())
    }
}

/// Event phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventPhase {
    None = 0,
    Capturing = 1,
    AtTarget = 2,
    Bubbling = 3,
}

/// Event object that gets passed to event handlers
pub struct Event {
    /// Type of the event
    pub event_type: EventType,
    /// Target node id
    pub target: Option<usize>,
    /// Current target (node with the listener)
    pub current_target: Option<usize>,
    /// Whether the event bubbles
    pub bubbles: bool,
    /// Whether the event is cancelable
    pub cancelable: bool,
    default_prevented: bool,
    propagation_stopped: bool,
    immediate_propagation_stopped: bool,
    /// Event phase (capturing, at target, bubbling)
    pub phase: EventPhase,
    detail: Option<Box<dyn Any>>,
}

impl Event {
    /// Create a new event
    pub fn new(event_type: EventType) -> Self {
        Self {
            event_type,
            target: None,
            current_target: None,
            bubbles: true,
            cancelable: true,
            default_prevented: false,
            propagation_stopped: false,
            immediate_propagation_stopped: false,
            phase: EventPhase::None,
            detail: None,
        }
    }

    /// A bubbling, cancelable event carrying a payload, like a DOM `CustomEvent`.
    pub fn custom<D: Any>(event_type: EventType, detail: D) -> Self {
        let mut event = Self::new(event_type);
        event.detail = Some(Box::new(detail));
        event
    }

    pub fn non_bubbling(mut self) -> Self {
        self.bubbles = false;
        self
    }

    pub fn detail<D: Any>(&self) -> Option<&D> {
        self.detail.as_ref()?.downcast_ref()
    }

    pub fn detail_mut<D: Any>(&mut self) -> Option<&mut D> {
        self.detail.as_mut()?.downcast_mut()
    }

    pub fn take_detail<D: Any>(&mut self) -> Option<D> {
        let detail = self.detail.take()?;
        match detail.downcast::<D>() {
            Ok(detail) => Some(*detail),
            Err(detail) => {
                self.detail = Some(detail);
                None
            }
        }
    }

    /// Prevent default action
    pub fn prevent_default(&mut self) {
        if self.cancelable {
            self.default_prevented = true;
        }
    }

    pub fn default_prevented(&self) -> bool {
        self.default_prevented
    }

    /// Stop event propagation
    pub fn stop_propagation(&mut self) {
        self.propagation_stopped = true;
    }

    /// Stop immediate propagation
    pub fn stop_immediate_propagation(&mut self) {
        self.propagation_stopped = true;
        self.immediate_propagation_stopped = true;
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("event_type", &self.event_type)
            .field("target", &self.target)
            .field("current_target", &self.current_target)
            .field("phase", &self.phase)
            .field("default_prevented", &self.default_prevented)
            .finish_non_exhaustive()
    }
}

/// Event dispatcher for firing events on DOM nodes
pub struct EventDispatcher;

impl EventDispatcher {
    /// Dispatch an event on a target node with capture and bubbling, returning the
    /// event once every listener has seen it.
    pub fn dispatch_event(dom: &DomRef, target: usize, mut event: Event) -> Event {
        event.target = Some(target);

        let ancestors = dom.borrow().ancestor_ids(target);

        // Phase 1: Capturing phase
        event.phase = EventPhase::Capturing;
        for &ancestor in ancestors.iter().rev() {
            if event.propagation_stopped {
                break;
            }
            event.current_target = Some(ancestor);
            Self::fire_listeners(dom, ancestor, &mut event, Some(true));
        }

        // Phase 2: At target
        if !event.propagation_stopped {
            event.phase = EventPhase::AtTarget;
            event.current_target = Some(target);
            Self::fire_listeners(dom, target, &mut event, None);
        }

        // Phase 3: Bubbling phase
        if event.bubbles && !event.propagation_stopped {
            event.phase = EventPhase::Bubbling;
            for &ancestor in ancestors.iter() {
                if event.propagation_stopped {
                    break;
                }
                event.current_target = Some(ancestor);
                Self::fire_listeners(dom, ancestor, &mut event, Some(false));
            }
        }

        event.phase = EventPhase::None;
        event.current_target = None;
        event
    }

    /// Fire event listeners on a specific node. `capture` filters listeners by their
    /// capture flag; `None` fires all of them (at-target phase).
    fn fire_listeners(dom: &DomRef, node_id: usize, event: &mut Event, capture: Option<bool>) {
        // Clone the listeners so the document borrow is released before any of them run
        let listeners_to_fire: Vec<ListenerCallback> = {
            let dom = dom.borrow();
            let Some(node) = dom.get_node(node_id) else {
                return;
            };
            match node.event_listeners.get_listeners(&event.event_type) {
                Some(listeners) => listeners
                    .iter()
                    .filter(|l| capture.is_none_or(|capture| l.use_capture == capture))
                    .map(|l| l.callback.clone())
                    .collect(),
                None => return,
            }
        };

        for callback in listeners_to_fire {
            if event.immediate_propagation_stopped {
                break;
            }
            callback(event);
        }
    }
}
