use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Fatal render-session failures. Everything else degrades to an inline marker.
#[derive(Debug, Error)]
pub enum DocweaveError {
    #[error("template not found: {}", .0.display())]
    TemplateNotFound(PathBuf),
    #[error("invalid context: {0}")]
    InvalidContext(String),
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("seal error: {0}")]
    Seal(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Markup that could not be turned into a node tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub message: String,
    /// 1-based position in the normalized, bound markup.
    pub line: u32,
    pub column: u32,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}:{}", self.message, self.line, self.column)
    }
}

impl std::error::Error for ParseError {}

/// Per-node failure. Never surfaced to the caller: the dispatcher turns it
/// into an error-marker fragment in the node's slot.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NodeError {
    #[error("data source error: {0}")]
    DataSource(String),
    #[error("image error: {0}")]
    Image(String),
    #[error("handler error: {0}")]
    Handler(String),
}

impl NodeError {
    pub fn kind(&self) -> &'static str {
        match self {
            NodeError::DataSource(_) => "data_source",
            NodeError::Image(_) => "image",
            NodeError::Handler(_) => "handler",
        }
    }
}
