//! HTML fragment conversion for docxtpl.
//!
//! Two pure transformations over a markup string:
//!
//! - [`convert`] turns a restricted HTML dialect (headings, paragraphs,
//!   preformatted blocks, lists, bold/italic/underline/strike/code, line
//!   breaks) into a WordprocessingML fragment ready to be spliced into
//!   `word/document.xml`.
//! - [`split`] cuts markup at inline `<img>` elements into text blocks with
//!   attached image references, for templates that place images themselves.
//!
//! # Architecture
//!
//! Conversion runs in three explicit stages:
//! - [`tokenize`]: forward-only scan producing [`MarkupEvent`]s
//! - [`Builder`]: state machine folding events into [`Paragraph`]s
//! - [`serialize_fragment`]: paragraphs to `w:p` elements
//!
//! Neither function fails: unknown tags are ignored and malformed input
//! degrades to whatever could be read.
//!
//! # Example
//!
//! ```
//! let xml = docxtpl_html::convert("<p>a<b>b</b></p>", None);
//! assert!(xml.starts_with("<w:p>"));
//! assert!(xml.contains("<w:b/>"));
//! ```

mod builder;
mod entities;
mod model;
mod serializer;
mod splitter;
mod tokenizer;

pub use builder::{Builder, CODE_STYLE, FormattingState, ToggleStack};
pub use model::{ListInfo, ListKind, Paragraph, Run, RunContent, Toggle, Toggles};
pub use serializer::{
    BULLET_NUM_ID, CODE_CHAR_STYLE, LIST_PARAGRAPH_STYLE, ORDERED_NUM_ID, serialize_fragment,
};
pub use splitter::{ImageParagraph, ImageRef, split};
pub use tokenizer::{MarkupEvent, Tag, prepare_markup, strip_trailing_empty_paragraphs, tokenize};

/// Convert markup to paragraphs without serializing them.
///
/// `style` is applied to generic block paragraphs (`p`, `div`, and the
/// implicit wrapper around bare text).
pub fn convert_paragraphs(markup: &str, style: Option<&str>) -> Vec<Paragraph> {
    let Some(prepared) = prepare_markup(markup) else {
        return Vec::new();
    };
    let mut builder = Builder::new(style);
    builder.extend(tokenize(&prepared));
    builder.finish()
}

/// Convert markup to a WordprocessingML fragment.
///
/// Empty input (or input consisting only of trailing empty paragraphs)
/// yields an empty string.
pub fn convert(markup: &str, style: Option<&str>) -> String {
    let paragraphs = convert_paragraphs(markup, style);
    tracing::debug!(
        input_len = markup.len(),
        paragraphs = paragraphs.len(),
        "Converted HTML fragment"
    );
    serialize_fragment(&paragraphs)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_convert_bare_text() {
        assert_eq!(
            convert("hello", None),
            r#"<w:p><w:r><w:t xml:space="preserve">hello</w:t></w:r></w:p>"#
        );
    }

    #[test]
    fn test_convert_empty() {
        assert_eq!(convert("", None), "");
        assert_eq!(convert("<p></p>", Some("Body")), "");
    }

    #[test]
    fn test_convert_strips_trailing_empty_paragraphs() {
        let paragraphs = convert_paragraphs("<p>a</p><p></p><p></p>", None);
        assert_eq!(paragraphs.len(), 1);
    }

    #[test]
    fn test_convert_applies_style() {
        assert_eq!(
            convert("text", Some("Quote")),
            r#"<w:p><w:pPr><w:pStyle w:val="Quote"/></w:pPr><w:r><w:t xml:space="preserve">text</w:t></w:r></w:p>"#
        );
    }

    #[test]
    fn test_convert_preformatted_lines() {
        let xml = convert("<pre>a\nb</pre>", None);
        assert_eq!(xml.matches("<w:p>").count(), 2);
        assert_eq!(xml.matches(r#"<w:pStyle w:val="Code"/>"#).count(), 2);
        assert!(!xml.contains("<w:br/>"));
    }

    #[test]
    fn test_convert_line_break() {
        let xml = convert("line1\nline2", None);
        assert_eq!(
            xml,
            concat!(
                r#"<w:p><w:r><w:t xml:space="preserve">line1</w:t></w:r>"#,
                "<w:r><w:br/></w:r>",
                r#"<w:r><w:t xml:space="preserve">line2</w:t></w:r></w:p>"#
            )
        );
    }

    #[test]
    fn test_convert_is_total_on_malformed_input() {
        for markup in ["<p", "<<>>", "<p attr=\"x>y", "</b></i>", "<!--", "&", "a > b"] {
            let _ = convert(markup, None);
        }
    }

    #[test]
    fn test_convert_unknown_tags_keep_text() {
        let paragraphs = convert_paragraphs(r#"<p><a href="x">link</a> <span>s</span></p>"#, None);
        assert_eq!(paragraphs.len(), 1);
        assert_eq!(paragraphs[0].plain_text(), "link s");
    }
}
