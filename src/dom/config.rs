/// Size of the area the document is laid out into, in CSS pixels
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(1024.0, 768.0)
    }
}

#[derive(Clone, Debug, Default)]
pub struct DomConfig {
    pub viewport: Option<Viewport>,
}
