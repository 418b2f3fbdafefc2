// Inline style to taffy style conversion
use crate::dom::ElementData;
use taffy::prelude::*;
use taffy::style::BoxSizing;

/// A parsed CSS length for the handful of properties layout understands
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum CssLength {
    Px(f32),
    Percent(f32),
    Auto,
}

impl CssLength {
    fn dimension(self) -> Dimension {
        match self {
            CssLength::Px(px) => Dimension::length(px),
            CssLength::Percent(fraction) => Dimension::percent(fraction),
            CssLength::Auto => Dimension::auto(),
        }
    }

    fn length_percentage(self) -> LengthPercentage {
        match self {
            CssLength::Px(px) => LengthPercentage::length(px),
            CssLength::Percent(fraction) => LengthPercentage::percent(fraction),
            CssLength::Auto => LengthPercentage::length(0.0),
        }
    }

    fn length_percentage_auto(self) -> LengthPercentageAuto {
        match self {
            CssLength::Px(px) => LengthPercentageAuto::length(px),
            CssLength::Percent(fraction) => LengthPercentageAuto::percent(fraction),
            CssLength::Auto => LengthPercentageAuto::auto(),
        }
    }
}

pub(crate) fn parse_size(value: &str) -> Option<CssLength> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("auto") {
        return Some(CssLength::Auto);
    }

    if let Some(value) = value.strip_suffix("px") {
        let val: f32 = value.trim().parse().ok()?;
        return Some(CssLength::Px(val));
    }

    if let Some(value) = value.strip_suffix('%') {
        let val: f32 = value.trim().parse().ok()?;
        return Some(CssLength::Percent(val / 100.0));
    }

    // Unitless zero and bare numbers (quirks) are treated as pixels
    let val: f32 = value.parse().ok()?;
    Some(CssLength::Px(val))
}

/// Split a `style` attribute into lowercased property names and raw values
pub(crate) fn declarations(style: &str) -> impl Iterator<Item = (String, &str)> {
    style.split(';').filter_map(|declaration| {
        let (property, value) = declaration.split_once(':')?;
        let property = property.trim();
        if property.is_empty() {
            return None;
        }
        let value = value.trim().trim_end_matches("!important").trim();
        Some((property.to_ascii_lowercase(), value))
    })
}

/// Block container style for the document node, sized to the viewport
pub(crate) fn viewport_style(width: f32, height: f32) -> Style {
    let mut style: Style = Style::default();
    style.display = Display::Block;
    style.size = Size {
        width: Dimension::length(width),
        height: Dimension::length(height),
    };
    style
}

/// Compute the taffy style for an element from its attributes
pub(crate) fn element_style(element: &ElementData) -> Style {
    let mut style: Style = Style::default();
    style.display = Display::Block;
    style.box_sizing = BoxSizing::ContentBox;

    if element.has_attr("hidden") {
        style.display = Display::None;
    }

    // Presentational width attribute on replaced elements
    if matches!(element.tag_name(), "img" | "video" | "canvas" | "iframe") {
        if let Some(width) = element.attr_parsed::<f32>("width") {
            style.size.width = Dimension::length(width);
        }
    }

    let Some(inline) = element.attr("style") else {
        return style;
    };

    for (property, value) in declarations(inline) {
        match property.as_str() {
            "display" => {
                style.display = match value.to_ascii_lowercase().as_str() {
                    "none" => Display::None,
                    "flex" | "inline-flex" => Display::Flex,
                    _ => Display::Block,
                };
            }
            "width" => {
                if let Some(len) = parse_size(value) {
                    style.size.width = len.dimension();
                }
            }
            "min-width" => {
                if let Some(len) = parse_size(value) {
                    style.min_size.width = len.dimension();
                }
            }
            "max-width" => {
                if let Some(len) = parse_size(value) {
                    style.max_size.width = len.dimension();
                }
            }
            "height" => {
                if let Some(len) = parse_size(value) {
                    style.size.height = len.dimension();
                }
            }
            "padding" => {
                // Only the horizontal edges matter for widths; take the one- or two-value form
                let mut parts = value.split_whitespace().filter_map(parse_size);
                if let Some(first) = parts.next() {
                    let horizontal = parts.next().unwrap_or(first).length_percentage();
                    style.padding.left = horizontal;
                    style.padding.right = horizontal;
                }
            }
            "padding-left" => {
                if let Some(len) = parse_size(value) {
                    style.padding.left = len.length_percentage();
                }
            }
            "padding-right" => {
                if let Some(len) = parse_size(value) {
                    style.padding.right = len.length_percentage();
                }
            }
            "margin-left" => {
                if let Some(len) = parse_size(value) {
                    style.margin.left = len.length_percentage_auto();
                }
            }
            "margin-right" => {
                if let Some(len) = parse_size(value) {
                    style.margin.right = len.length_percentage_auto();
                }
            }
            "box-sizing" => {
                style.box_sizing = match value.to_ascii_lowercase().as_str() {
                    "border-box" => BoxSizing::BorderBox,
                    _ => BoxSizing::ContentBox,
                };
            }
            _ => {}
        }
    }

    style
}
