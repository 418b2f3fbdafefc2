use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while building an [`AutoSizesConfig`](crate::autosizes::AutoSizesConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse autosizes config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid value for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Errors raised by document construction and layout.
#[derive(Debug, Error)]
pub enum DomError {
    #[error("failed to read document: {0}")]
    Parse(#[from] std::io::Error),

    #[error("layout failed: {0}")]
    Layout(#[from] taffy::TaffyError),

    #[error("node {0} does not exist")]
    NoSuchNode(usize),

    /// The node is not a text node
    #[error("node {0} is not a text node")]
    NotTextNode(usize),
}
