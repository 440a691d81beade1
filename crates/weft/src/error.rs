//! CLI error types.

use weft_config::ConfigError;
use weft_engine::RenderError;

#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Render(#[from] RenderError),

    #[error("cannot read template {path}: {source}")]
    Template {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
