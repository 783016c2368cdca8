//! Filters applied to tag values with the `|` operator.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::FilterError;

/// Name under which [`HtmlFilter`] is registered.
pub const HTML_FILTER: &str = "html";

/// Value transformation callable from a tag expression.
pub trait Filter: Send + Sync + fmt::Debug {
    /// Transform `input`, with the arguments given after `:` in the tag.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError`] when the input or an argument has the wrong type.
    fn apply(&self, input: &Value, args: &[Value]) -> Result<Value, FilterError>;
}

/// Registry of filters available to tag expressions.
#[derive(Clone, Debug, Default)]
pub struct Filters {
    filters: HashMap<String, Arc<dyn Filter>>,
}

impl Filters {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in filters.
    pub fn standard() -> Self {
        Self::new().with(HTML_FILTER, HtmlFilter)
    }

    /// Add or replace a filter.
    pub fn register(&mut self, name: impl Into<String>, filter: impl Filter + 'static) {
        self.filters.insert(name.into(), Arc::new(filter));
    }

    /// Builder form of [`register`](Self::register).
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, filter: impl Filter + 'static) -> Self {
        self.register(name, filter);
        self
    }

    /// Look up a filter by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Filter>> {
        self.filters.get(name).cloned()
    }
}

/// Converts an HTML fragment to WordprocessingML paragraphs.
///
/// Takes an optional paragraph style argument: `{@body | html:'Quote'}`.
#[derive(Clone, Copy, Debug, Default)]
pub struct HtmlFilter;

impl Filter for HtmlFilter {
    fn apply(&self, input: &Value, args: &[Value]) -> Result<Value, FilterError> {
        let markup = match input {
            Value::Null => "",
            Value::String(markup) => markup.as_str(),
            other => {
                return Err(FilterError::InvalidInput {
                    expected: "string",
                    found: type_name(other),
                });
            }
        };
        let style = match args.first() {
            None | Some(Value::Null) => None,
            Some(Value::String(style)) => Some(style.as_str()),
            Some(other) => {
                return Err(FilterError::InvalidArgument {
                    index: 0,
                    expected: "a style name",
                    found: type_name(other),
                });
            }
        };
        Ok(Value::String(docxtpl_html::convert(markup, style)))
    }
}

/// JSON type name for error messages.
pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
