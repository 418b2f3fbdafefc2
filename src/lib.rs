// Responsive image sizes engine with a small single-threaded document host
pub mod autosizes;
pub mod dom;
pub mod engine;
pub mod error;
pub mod layout;

pub use crate::autosizes::{AutoSizes, AutoSizesConfig, UpdateOutcome};
pub use crate::dom::{Dom, DomConfig, DomRef, HtmlParser, Viewport};
pub use crate::engine::{EngineConfig, EventLoop, Platform};
pub use crate::error::{ConfigError, DomError};
