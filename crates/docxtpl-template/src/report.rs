//! Machine-readable error reports.
//!
//! A template error is turned into a JSON document of the form
//! `{"error": {"name", "message", "properties": {"id", "explanation", ...}}}`
//! where `properties.errors` lists every tag problem of a part and
//! `properties.rootError` follows the cause chain.

use std::error::Error;

use serde::Serialize;

use crate::error::{TagError, TemplateError};

/// Top-level report.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ErrorReport {
    pub error: ErrorDetails,
}

/// One error in the report tree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ErrorDetails {
    pub name: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<ErrorProperties>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Message followed by its causes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub part: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_error: Option<Box<ErrorDetails>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ErrorDetails>,
}

impl ErrorReport {
    /// Build the report for a template error.
    pub fn new(error: &TemplateError) -> Self {
        let (name, tag, errors) = match error {
            TemplateError::Compile { part, errors } => (
                "TemplateError",
                None,
                errors.iter().map(|err| tag_details(err, part)).collect(),
            ),
            TemplateError::Render { source, .. } => {
                ("RenderingError", Some(source.tag().to_owned()), Vec::new())
            }
            _ => ("InternalError", None, Vec::new()),
        };

        Self {
            error: ErrorDetails {
                name: name.to_owned(),
                message: error.to_string(),
                properties: Some(ErrorProperties {
                    id: Some(error.id().to_owned()),
                    explanation: Some(explain(error)),
                    part: error.part().map(str::to_owned),
                    tag,
                    root_error: error.source().map(cause_details),
                    errors,
                }),
            },
        }
    }

    /// Pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error only if serialization fails.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl From<&TemplateError> for ErrorReport {
    fn from(error: &TemplateError) -> Self {
        Self::new(error)
    }
}

fn tag_details(error: &TagError, part: &str) -> ErrorDetails {
    ErrorDetails {
        name: "TemplateError".to_owned(),
        message: error.to_string(),
        properties: Some(ErrorProperties {
            id: Some(error.id().to_owned()),
            explanation: Some(explain(error)),
            part: Some(part.to_owned()),
            tag: error.tag().map(str::to_owned),
            root_error: error.source().map(cause_details),
            errors: Vec::new(),
        }),
    }
}

fn cause_details(error: &(dyn Error + 'static)) -> Box<ErrorDetails> {
    Box::new(ErrorDetails {
        name: "Error".to_owned(),
        message: error.to_string(),
        properties: error.source().map(|source| ErrorProperties {
            root_error: Some(cause_details(source)),
            ..ErrorProperties::default()
        }),
    })
}

/// `message: cause: cause ...`
fn explain(error: &dyn Error) -> String {
    let mut explanation = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        explanation.push_str(": ");
        explanation.push_str(&cause.to_string());
        source = cause.source();
    }
    explanation
}
