//! Data preparation for image-paragraph templates.
//!
//! Templates that lay out images themselves loop over the blocks of an HTML
//! field instead of converting it in one go. This rewrites such fields into
//! the block list in place.

use serde_json::{Map, Value};

/// Default suffix marking HTML fields.
pub const DEFAULT_HTML_SUFFIX: &str = "_html";

/// Top-level key carrying render settings, never rewritten.
const CONFIG_KEY: &str = "config";

/// Replace every HTML field in `data` with its image-paragraph blocks.
///
/// A field is HTML when its key ends with `suffix`. A string becomes
/// `[{text, images: [{image, caption}]}]`, `null` becomes `[]`, anything else
/// is left as is.
pub fn prepare_image_paragraphs(data: Value, suffix: &str) -> Value {
    match data {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, value)| {
                    let value = if key == CONFIG_KEY {
                        value
                    } else {
                        prepare_field(&key, value, suffix)
                    };
                    (key, value)
                })
                .collect(),
        ),
        other => prepare_value(other, suffix),
    }
}

fn prepare_field(key: &str, value: Value, suffix: &str) -> Value {
    if !key.ends_with(suffix) {
        return prepare_value(value, suffix);
    }
    match value {
        Value::String(markup) => blocks(&markup),
        Value::Null => Value::Array(Vec::new()),
        other => other,
    }
}

fn prepare_value(value: Value, suffix: &str) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, value)| {
                    let value = prepare_field(&key, value, suffix);
                    (key, value)
                })
                .collect::<Map<_, _>>(),
        ),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| prepare_value(item, suffix))
                .collect(),
        ),
        scalar => scalar,
    }
}

fn blocks(markup: &str) -> Value {
    let tokens = docxtpl_html::split(Some(markup));
    tracing::debug!(blocks = tokens.len(), "Split HTML field into image paragraphs");
    serde_json::to_value(&tokens).unwrap_or_else(|err| {
        tracing::warn!(%err, "Failed to serialize image paragraphs");
        Value::Array(Vec::new())
    })
}
