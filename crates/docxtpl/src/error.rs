//! CLI error types.

use docxtpl_config::ConfigError;
use docxtpl_images::ImageError;
use docxtpl_template::{ErrorReport, TemplateError};

/// CLI error type.
#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Template(#[from] TemplateError),

    #[error("{0}")]
    Image(#[from] ImageError),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("invalid data file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Validation(String),
}

impl CliError {
    /// Pretty JSON report for template errors.
    pub(crate) fn report(&self) -> Option<String> {
        match self {
            Self::Template(err) => ErrorReport::new(err).to_json().ok(),
            _ => None,
        }
    }
}
