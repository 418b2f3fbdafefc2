// Keeps the sizes attribute of marked responsive images in step with their
// rendered width.
//
// Elements opt in with the target class (`autosizes`) and `sizes="auto"`. A pass
// measures each one, lets `beforeSizesUpdate` listeners adjust or veto the width,
// and writes `"<n>px"` in the next animation frame, followed by
// `afterSizesUpdate`. Window resizes trigger a debounced pass.

mod batch;
mod config;
mod coordinator;
mod debounce;
mod resolve;
mod signal;

pub use self::batch::FrameBatcher;
pub use self::config::AutoSizesConfig;
pub use self::coordinator::{format_sizes, SizeUpdater, UpdateOutcome};
pub use self::debounce::{Debounced, WeakDebounced};
pub use self::resolve::{OffsetTree, WidthResolver};
pub use self::signal::{
    after_sizes_update, before_sizes_update, emit, AfterSizesDetail, BeforeSizesDetail,
    EventResult,
};

use crate::dom::{DomRef, Event, EventType};
use crate::engine::Platform;
use std::cell::Cell;
use std::rc::Rc;

/// Driver for one document: owns the updater, the write batcher and the debounced
/// resize pass.
pub struct AutoSizes {
    dom: DomRef,
    config: Rc<AutoSizesConfig>,
    batcher: FrameBatcher,
    updater: SizeUpdater,
    debounced: Debounced,
    initialized: Cell<bool>,
    resize_listener: Cell<Option<usize>>,
}

impl AutoSizes {
    pub fn new(dom: DomRef, platform: Rc<dyn Platform>, config: AutoSizesConfig) -> Self {
        let config = Rc::new(config);
        let batcher = FrameBatcher::new(platform.clone());
        let updater = SizeUpdater::new(dom.clone(), config.clone(), batcher.clone());

        let pass = updater.clone();
        let debounced = Debounced::new(platform, config.debounce(), move || {
            pass.update_all();
        });

        Self {
            dom,
            config,
            batcher,
            updater,
            debounced,
            initialized: Cell::new(false),
            resize_listener: Cell::new(None),
        }
    }

    /// Create the driver and, unless the config turns it off, run `init` right away
    pub fn install(dom: DomRef, platform: Rc<dyn Platform>, config: AutoSizesConfig) -> Self {
        let auto_init = config.auto_init;
        let autosizes = Self::new(dom, platform, config);
        if auto_init {
            autosizes.init();
        }
        autosizes
    }

    /// Start listening for resizes and size every tracked element once. Later calls
    /// do nothing and return `false`.
    pub fn init(&self) -> bool {
        if self.initialized.replace(true) {
            return false;
        }

        let resize_pass = self.debounced.downgrade();
        let listener = {
            let mut dom = self.dom.borrow_mut();
            let document = dom.root_node().id;
            dom.add_event_listener(
                document,
                EventType::Resize,
                Rc::new(move |_: &mut Event| {
                    resize_pass.call();
                }),
                false,
            )
        };
        self.resize_listener.set(listener);

        let outcomes = self.updater.update_all();
        tracing::info!(
            tracked = outcomes.len(),
            class = %self.config.target_element_class,
            "autosizes initialized"
        );
        true
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.get()
    }

    /// Run a pass now, bypassing the resize debounce
    pub fn update_all(&self) -> Vec<(usize, UpdateOutcome)> {
        self.updater.update_all()
    }

    /// Ask for a pass through the same debounce a resize goes through
    pub fn request_update_all(&self) {
        self.debounced.call();
    }

    pub fn update_one(
        &self,
        element: usize,
        data_attr: bool,
        preset_width: Option<f32>,
    ) -> UpdateOutcome {
        self.updater.update_one(element, data_attr, preset_width)
    }

    /// Apply queued writes without waiting for the frame
    pub fn flush(&self) -> usize {
        self.batcher.flush_now()
    }

    pub fn applied_width(&self, element: usize) -> Option<f32> {
        self.updater.applied_width(element)
    }

    pub fn tracked_elements(&self) -> Vec<usize> {
        self.updater.tracked_elements()
    }

    pub fn config(&self) -> &AutoSizesConfig {
        &self.config
    }

    pub fn dom(&self) -> &DomRef {
        &self.dom
    }

    pub fn resize_pass(&self) -> &Debounced {
        &self.debounced
    }
}

impl Drop for AutoSizes {
    fn drop(&mut self) {
        self.debounced.cancel();

        let Some(listener) = self.resize_listener.take() else {
            return;
        };
        match self.dom.try_borrow_mut() {
            Ok(mut dom) => {
                let document = dom.root_node().id;
                dom.remove_event_listener(document, &EventType::Resize, listener);
            }
            Err(_) => tracing::warn!("document busy; resize listener left in place"),
        }
    }
}
