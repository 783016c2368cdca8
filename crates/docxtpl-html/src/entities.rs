//! HTML entity decoding.
//!
//! The markup reader reports entity references (`&nbsp;`, `&#8212;`) as
//! separate events carrying only the entity name. Both those names and
//! free-standing attribute text are decoded here with the full HTML5 table.

use std::borrow::Cow;

/// Decode the body of an entity reference (the part between `&` and `;`).
///
/// Unknown entities are preserved as written, including the delimiters.
pub(crate) fn decode_entity(name: &str) -> String {
    let reference = format!("&{name};");
    match html_escape::decode_html_entities(&reference) {
        Cow::Borrowed(_) => reference,
        Cow::Owned(decoded) => decoded,
    }
}

/// Decode every HTML entity in `text`.
pub(crate) fn decode_html(text: &str) -> Cow<'_, str> {
    html_escape::decode_html_entities(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_xml_entities() {
        assert_eq!(decode_entity("amp"), "&");
        assert_eq!(decode_entity("lt"), "<");
        assert_eq!(decode_entity("quot"), "\"");
    }

    #[test]
    fn test_decode_html_named_entities() {
        assert_eq!(decode_entity("nbsp"), "\u{00a0}");
        assert_eq!(decode_entity("mdash"), "\u{2014}");
        assert_eq!(decode_entity("eacute"), "\u{00e9}");
    }

    #[test]
    fn test_decode_numeric_entities() {
        assert_eq!(decode_entity("#8212"), "\u{2014}");
        assert_eq!(decode_entity("#x41"), "A");
    }

    #[test]
    fn test_preserve_unknown_entity() {
        assert_eq!(decode_entity("unknown"), "&unknown;");
    }

    #[test]
    fn test_decode_html_text() {
        assert_eq!(decode_html("Caf&eacute; &amp; bar"), "Caf\u{00e9} & bar");
        assert_eq!(decode_html("plain"), "plain");
    }
}
