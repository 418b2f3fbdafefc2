// Width resolution: climb out of collapsed containers until something is wide enough

use crate::dom::Dom;

/// The geometry the resolver reads. Measuring may force a layout flush, hence `&mut`.
pub trait OffsetTree {
    /// Rendered width in whole pixels, 0 for nodes without a box
    fn offset_width(&mut self, node: usize) -> f32;

    /// The parent if it is an element. The document node is not a container.
    fn parent_element(&self, node: usize) -> Option<usize>;
}

impl OffsetTree for Dom {
    fn offset_width(&mut self, node: usize) -> f32 {
        Dom::offset_width(self, node)
    }

    fn parent_element(&self, node: usize) -> Option<usize> {
        self.parent_id(node).filter(|&parent| self.is_element(parent))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct WidthResolver {
    min_size: f32,
}

impl WidthResolver {
    pub fn new(min_size: f32) -> Self {
        Self { min_size }
    }

    pub fn min_size(&self) -> f32 {
        self.min_size
    }

    /// Width to use for `element`.
    ///
    /// Starts from `measured` (zero and NaN count as not supplied) or the element's
    /// own width. While that is below the minimum, takes the width of `container`
    /// and moves on to its parent. Elements that were sized before never climb, so a
    /// collapsed container is not re-walked on every resize. The result can still be
    /// below the minimum once the ancestors run out.
    pub fn resolve<T: OffsetTree + ?Sized>(
        &self,
        tree: &mut T,
        element: usize,
        container: Option<usize>,
        measured: Option<f32>,
        previously_sized: bool,
    ) -> f32 {
        let mut width = match measured {
            Some(width) if width > 0.0 => width,
            _ => tree.offset_width(element),
        };

        if previously_sized {
            return width;
        }

        let mut container = container;
        let mut steps = 0usize;
        while width < self.min_size {
            let Some(parent) = container else {
                break;
            };
            width = tree.offset_width(parent);
            container = tree.parent_element(parent);
            steps += 1;
        }

        if steps > 0 {
            tracing::trace!(element, steps, width, "resolved width from ancestors");
        }
        width
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{DomConfig, HtmlParser, Viewport};
    use proptest::prelude::*;

    /// Node `i` has width `widths[i]` and parent `i + 1`
    struct Chain {
        widths: Vec<f32>,
        measured: Vec<usize>,
    }

    impl Chain {
        fn new(widths: Vec<f32>) -> Self {
            Self {
                widths,
                measured: Vec::new(),
            }
        }
    }

    impl OffsetTree for Chain {
        fn offset_width(&mut self, node: usize) -> f32 {
            self.measured.push(node);
            self.widths[node]
        }

        fn parent_element(&self, node: usize) -> Option<usize> {
            (node + 1 < self.widths.len()).then_some(node + 1)
        }
    }

    fn resolve_chain(chain: &mut Chain, min_size: f32, previously_sized: bool) -> f32 {
        let parent = chain.parent_element(0);
        WidthResolver::new(min_size).resolve(chain, 0, parent, None, previously_sized)
    }

    #[test]
    fn climbs_to_first_wide_enough_ancestor() {
        let mut chain = Chain::new(vec![10.0, 5.0, 300.0, 1000.0]);

        assert_eq!(resolve_chain(&mut chain, 40.0, false), 300.0);
        assert_eq!(chain.measured, vec![0, 1, 2]);
    }

    #[test]
    fn exhausted_ancestors_return_last_width() {
        let mut chain = Chain::new(vec![0.0, 0.0, 12.0]);
        assert_eq!(resolve_chain(&mut chain, 40.0, false), 12.0);

        let mut lonely = Chain::new(vec![3.0]);
        assert_eq!(resolve_chain(&mut lonely, 40.0, false), 3.0);
    }

    #[test]
    fn previously_sized_elements_never_climb() {
        let mut chain = Chain::new(vec![10.0, 300.0]);

        assert_eq!(resolve_chain(&mut chain, 40.0, true), 10.0);
        assert_eq!(chain.measured, vec![0]);
    }

    #[test]
    fn measured_width_skips_own_measurement() {
        let mut chain = Chain::new(vec![10.0, 300.0]);
        let resolver = WidthResolver::new(40.0);

        assert_eq!(resolver.resolve(&mut chain, 0, Some(1), Some(120.0), false), 120.0);
        assert!(chain.measured.is_empty());

        // Too small presets still climb
        assert_eq!(resolver.resolve(&mut chain, 0, Some(1), Some(20.0), false), 300.0);
    }

    #[test]
    fn zero_or_nan_preset_measures_instead() {
        let mut chain = Chain::new(vec![64.0]);
        let resolver = WidthResolver::new(40.0);

        assert_eq!(resolver.resolve(&mut chain, 0, None, Some(0.0), false), 64.0);
        assert_eq!(resolver.resolve(&mut chain, 0, None, Some(f32::NAN), false), 64.0);
    }

    #[test]
    fn resolves_against_document_layout() {
        let html = r#"
            <div id="outer" style="width: 300px">
              <div id="parent" style="width: 5px">
                <img id="img" style="width: 10px">
              </div>
            </div>"#;
        let config = DomConfig {
            viewport: Some(Viewport::new(800.0, 600.0)),
        };
        let mut dom = HtmlParser::new().parse(html, config).unwrap();
        let img = dom.get_element_by_id("img").unwrap();
        let parent = dom.parent_element(img);

        let width = WidthResolver::new(40.0).resolve(&mut dom, img, parent, None, false);
        assert_eq!(width, 300.0);
    }

    proptest! {
        #[test]
        fn terminates_at_first_ancestor_reaching_min(
            widths in prop::collection::vec(0u16..600, 1..24),
            min_size in 0u16..200,
        ) {
            let widths: Vec<f32> = widths.into_iter().map(f32::from).collect();
            let min_size = f32::from(min_size);
            let mut chain = Chain::new(widths.clone());

            let resolved = resolve_chain(&mut chain, min_size, false);

            let expected = widths
                .iter()
                .copied()
                .find(|width| *width >= min_size)
                .unwrap_or(widths[widths.len() - 1]);
            prop_assert_eq!(resolved, expected);
            prop_assert!(chain.measured.len() <= widths.len());
            prop_assert!(chain.measured.iter().enumerate().all(|(step, node)| step == *node));
        }
    }
}
