//! Error types for template rendering.

use std::error::Error as StdError;

/// Boxed error produced by a collaborator.
pub type BoxError = Box<dyn StdError + Send + Sync>;

/// Error raised while parsing or rendering a directive.
///
/// Every variant is caught at the per-directive boundary of the collection
/// that owns the failing directive; it never aborts the rest of the pass.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// Malformed template grammar.
    #[error("parse error: {0}")]
    Parse(String),

    /// A block yielded no usable content parts.
    #[error("block `{0}` has no content")]
    EmptyBlock(String),

    /// A block declared more than one message template.
    #[error("block `{0}` declares more than one message template")]
    MultipleBlock(String),

    /// A `{N}` placeholder or parameter pointer referenced a missing parameter.
    #[error("format index {index} is out of range ({count} parameters)")]
    FormatIndexOutOfRange { index: usize, count: usize },

    /// The invoker failed to execute a bind or statement.
    #[error("execution of `{directive}` failed")]
    Execution {
        directive: String,
        #[source]
        source: InvokeError,
    },

    /// Missing or malformed collaborator configuration.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A directive panicked while rendering.
    #[error("directive panicked: {0}")]
    Panic(String),
}

/// Error returned by an [`Invoker`](crate::Invoker).
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct InvokeError {
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl InvokeError {
    /// Create an error with a message and no underlying cause.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Attach an underlying cause.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// The top-level message.
    pub fn message(&self) -> &str {
        &self.message
    }
}
