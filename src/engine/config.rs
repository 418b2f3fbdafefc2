// Event loop configuration
use std::time::Duration;

/// Configuration for the event loop that hosts a document
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Time between animation frames
    pub frame_interval: Duration,
    /// Whether `request_idle_callback` is available
    pub idle_callbacks: bool,
    /// Start with the document hidden (no animation frames run)
    pub document_hidden: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            frame_interval: Duration::from_millis(16),
            idle_callbacks: true,
            document_hidden: false,
        }
    }
}
