// Per-element update decisions and the batched attribute commit

use super::batch::FrameBatcher;
use super::config::AutoSizesConfig;
use super::resolve::WidthResolver;
use super::signal;
use crate::dom::DomRef;
use hashbrown::HashMap;
use std::cell::RefCell;
use std::rc::Rc;

/// What `update_one` decided for an element
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UpdateOutcome {
    /// No parent, not in the document, or not an element
    Detached,
    /// A `beforeSizesUpdate` listener prevented the update
    Vetoed,
    /// The width came out as zero or NaN
    Ignored,
    /// The width equals the one already applied
    Unchanged,
    /// A commit of this width is queued for the next frame
    Scheduled(f32),
}

#[derive(Debug, Clone, Copy)]
struct AppliedWidth {
    /// Serial of the node the width was written to, so a reused slab id never
    /// inherits it
    serial: u64,
    width: f32,
}

struct UpdaterInner {
    dom: DomRef,
    config: Rc<AutoSizesConfig>,
    resolver: WidthResolver,
    batcher: FrameBatcher,
    applied: RefCell<HashMap<usize, AppliedWidth>>,
}

/// Measures tracked elements and writes their sizes attribute through the frame
/// batcher. Owns the last applied width of every element it has sized.
#[derive(Clone)]
pub struct SizeUpdater {
    inner: Rc<UpdaterInner>,
}

impl SizeUpdater {
    pub fn new(dom: DomRef, config: Rc<AutoSizesConfig>, batcher: FrameBatcher) -> Self {
        let resolver = WidthResolver::new(config.min_size);
        Self {
            inner: Rc::new(UpdaterInner {
                dom,
                config,
                resolver,
                batcher,
                applied: RefCell::new(HashMap::new()),
            }),
        }
    }

    /// Width last written to `element`, if it has ever been sized
    pub fn applied_width(&self, element: usize) -> Option<f32> {
        let serial = self.inner.dom.borrow().get_node(element)?.serial;
        applied_width(&self.inner, element, serial)
    }

    /// Recompute one element's width and queue the write if it changed.
    ///
    /// `data_attr` is passed through to listeners. A `preset_width` replaces the
    /// element's own measurement; zero or NaN counts as not supplied.
    pub fn update_one(
        &self,
        element: usize,
        data_attr: bool,
        preset_width: Option<f32>,
    ) -> UpdateOutcome {
        let inner = &self.inner;

        let (container, serial) = {
            let dom = inner.dom.borrow();
            let Some(node) = dom.get_node(element).filter(|node| node.is_element()) else {
                return UpdateOutcome::Detached;
            };
            let Some(parent) = node.parent.filter(|_| node.is_in_document()) else {
                tracing::trace!(element, "skipping detached element");
                return UpdateOutcome::Detached;
            };
            (dom.is_element(parent).then_some(parent), node.serial)
        };

        let previous = applied_width(inner, element, serial);
        let width = {
            let mut dom = inner.dom.borrow_mut();
            inner
                .resolver
                .resolve(&mut *dom, element, container, preset_width, previous.is_some())
        };

        let event = signal::before_sizes_update(&inner.dom, element, width, data_attr);
        if event.vetoed {
            tracing::debug!(element, width, "sizes update vetoed");
            return UpdateOutcome::Vetoed;
        }

        let width = event.detail.width;
        if width == 0.0 || width.is_nan() {
            tracing::trace!(element, "no usable width");
            return UpdateOutcome::Ignored;
        }
        if same_pixels(previous, width) {
            return UpdateOutcome::Unchanged;
        }

        let weak = Rc::downgrade(inner);
        inner.batcher.schedule(Box::new(move || {
            if let Some(inner) = weak.upgrade() {
                commit(&inner, element, serial, width);
            }
        }));
        UpdateOutcome::Scheduled(width)
    }

    /// Update every tracked element once, in document order
    pub fn update_all(&self) -> Vec<(usize, UpdateOutcome)> {
        self.prune();

        let elements = self.tracked_elements();
        tracing::debug!(count = elements.len(), "updating tracked elements");

        elements
            .into_iter()
            .map(|element| (element, self.update_one(element, false, None)))
            .collect()
    }

    /// In-document elements with the target class whose sizes attribute still reads
    /// `auto`, plus those already sized (their attribute now holds a width)
    pub fn tracked_elements(&self) -> Vec<usize> {
        let inner = &self.inner;
        let config = &inner.config;
        let applied = inner.applied.borrow();
        let dom = inner.dom.borrow();

        dom.find_node_ids(|node| {
            node.has_class(&config.target_element_class)
                && (node.attr(&config.sizes_attr) == Some("auto")
                    || applied
                        .get(&node.id)
                        .is_some_and(|entry| entry.serial == node.serial))
        })
    }

    /// Forget widths of elements that were dropped or left the document
    pub fn prune(&self) -> usize {
        let dom = self.inner.dom.borrow();
        let mut applied = self.inner.applied.borrow_mut();
        let before = applied.len();
        applied.retain(|&id, entry| {
            dom.get_node(id)
                .is_some_and(|node| node.serial == entry.serial && node.is_in_document())
        });

        let pruned = before - applied.len();
        if pruned > 0 {
            tracing::trace!(pruned, "pruned applied widths");
        }
        pruned
    }

    pub fn config(&self) -> &AutoSizesConfig {
        &self.inner.config
    }
}

fn applied_width(inner: &UpdaterInner, element: usize, serial: u64) -> Option<f32> {
    inner
        .applied
        .borrow()
        .get(&element)
        .filter(|entry| entry.serial == serial)
        .map(|entry| entry.width)
}

/// `450.0` -> `450px`
pub fn format_sizes(width: f32) -> String {
    format!("{}px", width.round() as i64)
}

/// Whether `width` would write the same attribute value as `applied`
fn same_pixels(applied: Option<f32>, width: f32) -> bool {
    applied.is_some_and(|applied| applied.round() == width.round())
}

fn commit(inner: &UpdaterInner, element: usize, serial: u64, width: f32) {
    let config = &inner.config;
    let sizes = format_sizes(width);

    {
        let mut dom = inner.dom.borrow_mut();
        if dom.get_node(element).is_none_or(|node| node.serial != serial) {
            tracing::trace!(element, "element gone before commit");
            return;
        }
        // An earlier commit in this batch may have written the same value already
        if same_pixels(applied_width(inner, element, serial), width) {
            return;
        }

        inner
            .applied
            .borrow_mut()
            .insert(element, AppliedWidth { serial, width });

        dom.set_attribute(element, &config.sizes_attr, &sizes);
        if let Some(bare) = config.dual_write_attr() {
            dom.set_attribute(element, bare, &sizes);
        }
        if let Some(class) = config.processed_class() {
            dom.add_class(element, class);
        }
    }

    tracing::debug!(element, sizes = %sizes, "sizes updated");
    signal::after_sizes_update(&inner.dom, element, width, sizes);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autosizes::signal::{AfterSizesDetail, BeforeSizesDetail};
    use crate::dom::{Attribute, Dom, DomConfig, Event, EventType, Viewport};
    use crate::engine::{EngineConfig, EventLoop};
    use std::rc::Rc;

    struct Fixture {
        event_loop: EventLoop,
        dom: DomRef,
        updater: SizeUpdater,
    }

    fn fixture(config: AutoSizesConfig) -> Fixture {
        let event_loop = EventLoop::manual(EngineConfig::default());
        let dom = Dom::new(DomConfig {
            viewport: Some(Viewport::new(1000.0, 800.0)),
        })
        .into_ref();
        let batcher = FrameBatcher::new(Rc::new(event_loop.clone()));
        let updater = SizeUpdater::new(dom.clone(), Rc::new(config), batcher);
        Fixture {
            event_loop,
            dom,
            updater,
        }
    }

    /// `<div style="width: {width}px"><img class="autosizes" sizes="auto"></div>`
    fn add_image(dom: &DomRef, width: f32) -> (usize, usize) {
        let mut dom = dom.borrow_mut();
        let style = format!("width: {width}px");
        let wrapper = dom.create_html_element("div", vec![Attribute::new("style", &style)]);
        let img = dom.create_html_element(
            "img",
            vec![
                Attribute::new("class", "autosizes"),
                Attribute::new("sizes", "auto"),
            ],
        );
        dom.append_children(0, &[wrapper]);
        dom.append_children(wrapper, &[img]);
        (wrapper, img)
    }

    fn sizes(dom: &DomRef, element: usize, attr: &str) -> Option<String> {
        dom.borrow().get_attribute(element, attr).map(str::to_string)
    }

    #[test]
    fn commit_waits_for_the_frame() {
        let fx = fixture(AutoSizesConfig::default());
        let (_, img) = add_image(&fx.dom, 450.0);

        assert_eq!(fx.updater.update_one(img, false, None), UpdateOutcome::Scheduled(450.0));
        assert_eq!(sizes(&fx.dom, img, "sizes").as_deref(), Some("auto"));
        assert_eq!(fx.updater.applied_width(img), None);

        fx.event_loop.run_frame();

        assert_eq!(sizes(&fx.dom, img, "sizes").as_deref(), Some("450px"));
        assert!(fx.dom.borrow().has_class(img, "autosized"));
        assert_eq!(fx.updater.applied_width(img), Some(450.0));
    }

    #[test]
    fn sub_pixel_change_is_not_rewritten() {
        let fx = fixture(AutoSizesConfig::default());
        let (_, img) = add_image(&fx.dom, 300.0);
        let width = Rc::new(std::cell::Cell::new(450.4));
        let listener_width = width.clone();
        fx.dom.borrow_mut().add_event_listener(
            0,
            EventType::BeforeSizesUpdate,
            Rc::new(move |event: &mut Event| {
                if let Some(detail) = event.detail_mut::<BeforeSizesDetail>() {
                    detail.width = listener_width.get();
                }
            }),
            false,
        );
        let written = Rc::new(std::cell::RefCell::new(Vec::new()));
        let sink = written.clone();
        fx.dom.borrow_mut().add_event_listener(
            0,
            EventType::AfterSizesUpdate,
            Rc::new(move |event: &mut Event| {
                if let Some(detail) = event.detail::<AfterSizesDetail>() {
                    sink.borrow_mut().push(detail.sizes.clone());
                }
            }),
            false,
        );

        fx.updater.update_one(img, false, None);
        fx.event_loop.run_frame();
        width.set(450.2);

        assert_eq!(fx.updater.update_one(img, false, None), UpdateOutcome::Unchanged);
        fx.event_loop.run_frame();
        assert_eq!(*written.borrow(), vec!["450px"]);

        width.set(450.6);
        assert_eq!(fx.updater.update_one(img, false, None), UpdateOutcome::Scheduled(450.6));
        fx.event_loop.run_frame();
        assert_eq!(*written.borrow(), vec!["450px", "451px"]);
    }

    #[test]
    fn unchanged_width_is_not_rewritten() {
        let fx = fixture(AutoSizesConfig::default());
        let (_, img) = add_image(&fx.dom, 300.0);

        fx.updater.update_one(img, false, None);
        fx.event_loop.run_frame();

        assert_eq!(fx.updater.update_one(img, false, None), UpdateOutcome::Unchanged);
        assert_eq!(fx.event_loop.pending_frame_callbacks(), 0);
    }

    #[test]
    fn two_updates_in_one_frame_write_once() {
        let fx = fixture(AutoSizesConfig::default());
        let (_, img) = add_image(&fx.dom, 300.0);
        let writes = Rc::new(std::cell::Cell::new(0));
        let counter = writes.clone();
        fx.dom.borrow_mut().add_event_listener(
            img,
            EventType::AfterSizesUpdate,
            Rc::new(move |_: &mut Event| counter.set(counter.get() + 1)),
            false,
        );

        fx.updater.update_one(img, false, None);
        fx.updater.update_one(img, false, None);
        fx.event_loop.run_frame();

        assert_eq!(writes.get(), 1);
    }

    #[test]
    fn detached_elements_are_skipped() {
        let fx = fixture(AutoSizesConfig::default());
        let loose = fx.dom.borrow_mut().create_html_element("img", vec![]);
        let (wrapper, img) = add_image(&fx.dom, 300.0);
        fx.dom.borrow_mut().remove_node(wrapper);

        assert_eq!(fx.updater.update_one(loose, false, None), UpdateOutcome::Detached);
        assert_eq!(fx.updater.update_one(img, false, None), UpdateOutcome::Detached);
        assert_eq!(fx.updater.update_one(4242, false, None), UpdateOutcome::Detached);
    }

    #[test]
    fn zero_width_is_ignored() {
        let fx = fixture(AutoSizesConfig::default());
        let (wrapper, img) = add_image(&fx.dom, 300.0);
        fx.dom.borrow_mut().set_attribute(wrapper, "style", "display: none");

        assert_eq!(fx.updater.update_one(img, false, None), UpdateOutcome::Ignored);
    }

    #[test]
    fn listener_width_wins_and_veto_blocks() {
        let fx = fixture(AutoSizesConfig::default());
        let (wrapper, img) = add_image(&fx.dom, 300.0);
        let listener = fx
            .dom
            .borrow_mut()
            .add_event_listener(
                wrapper,
                EventType::BeforeSizesUpdate,
                Rc::new(|event: &mut Event| {
                    let veto = event
                        .detail::<BeforeSizesDetail>()
                        .is_some_and(|detail| detail.data_attr);
                    if veto {
                        event.prevent_default();
                    } else if let Some(detail) = event.detail_mut::<BeforeSizesDetail>() {
                        detail.width = 123.0;
                    }
                }),
                false,
            )
            .unwrap();

        assert_eq!(fx.updater.update_one(img, true, None), UpdateOutcome::Vetoed);
        assert_eq!(fx.event_loop.pending_frame_callbacks(), 0);

        assert_eq!(fx.updater.update_one(img, false, None), UpdateOutcome::Scheduled(123.0));
        fx.event_loop.run_frame();
        assert_eq!(sizes(&fx.dom, img, "sizes").as_deref(), Some("123px"));

        fx.dom
            .borrow_mut()
            .remove_event_listener(wrapper, &EventType::BeforeSizesUpdate, listener);
        assert_eq!(fx.updater.update_one(img, false, None), UpdateOutcome::Scheduled(300.0));
    }

    #[test]
    fn prefixed_attribute_is_dual_written() {
        let config = AutoSizesConfig {
            sizes_attr: "data-sizes".to_string(),
            processed_element_class: None,
            ..AutoSizesConfig::default()
        };
        let fx = fixture(config);
        let (_, img) = add_image(&fx.dom, 450.0);
        fx.dom.borrow_mut().set_attribute(img, "data-sizes", "auto");

        let after = Rc::new(RefCell::new(None));
        let seen = after.clone();
        fx.dom.borrow_mut().add_event_listener(
            0,
            EventType::AfterSizesUpdate,
            Rc::new(move |event: &mut Event| {
                *seen.borrow_mut() = event.detail::<AfterSizesDetail>().cloned();
            }),
            false,
        );

        fx.updater.update_all();
        fx.event_loop.run_frame();

        assert_eq!(sizes(&fx.dom, img, "data-sizes").as_deref(), Some("450px"));
        assert_eq!(sizes(&fx.dom, img, "sizes").as_deref(), Some("450px"));
        assert_eq!(sizes(&fx.dom, img, "class").as_deref(), Some("autosizes"));
        assert_eq!(after.borrow().as_ref().map(|d| d.sizes.as_str()), Some("450px"));
    }

    #[test]
    fn sized_elements_stay_tracked_and_gone_ones_are_pruned() {
        let fx = fixture(AutoSizesConfig::default());
        let (first_wrapper, first) = add_image(&fx.dom, 200.0);
        let (_, second) = add_image(&fx.dom, 400.0);
        let untracked = {
            let mut dom = fx.dom.borrow_mut();
            let img = dom.create_html_element("img", vec![Attribute::new("class", "autosizes")]);
            dom.append_children(0, &[img]);
            img
        };

        fx.updater.update_all();
        fx.event_loop.run_frame();
        assert_eq!(fx.updater.tracked_elements(), vec![first, second]);
        assert!(!fx.updater.tracked_elements().contains(&untracked));

        fx.dom.borrow_mut().remove_and_drop(first_wrapper);
        let outcomes = fx.updater.update_all();

        assert_eq!(outcomes, vec![(second, UpdateOutcome::Unchanged)]);
        assert_eq!(fx.updater.applied_width(second), Some(400.0));
        assert_eq!(fx.updater.inner.applied.borrow().len(), 1);
    }

    #[test]
    fn reused_node_ids_start_unsized() {
        let fx = fixture(AutoSizesConfig::default());
        let (wrapper, img) = add_image(&fx.dom, 200.0);
        fx.updater.update_one(img, false, None);
        fx.event_loop.run_frame();

        fx.dom.borrow_mut().remove_and_drop(wrapper);
        let (_, reused) = add_image(&fx.dom, 200.0);

        assert_eq!(fx.updater.applied_width(reused), None);
        assert_eq!(fx.updater.update_one(reused, false, None), UpdateOutcome::Scheduled(200.0));
    }

    #[test]
    fn commit_for_dropped_element_is_discarded() {
        let fx = fixture(AutoSizesConfig::default());
        let (wrapper, img) = add_image(&fx.dom, 200.0);

        fx.updater.update_one(img, false, None);
        fx.dom.borrow_mut().remove_and_drop(wrapper);
        fx.event_loop.run_frame();

        assert_eq!(fx.updater.inner.applied.borrow().len(), 0);
    }

    #[test]
    fn formats_whole_pixels() {
        assert_eq!(format_sizes(450.0), "450px");
        assert_eq!(format_sizes(99.6), "100px");
    }
}
