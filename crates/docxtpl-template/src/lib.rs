//! DOCX template engine.
//!
//! Renders `{tag}` placeholders in the main document, headers and footers of
//! a WordprocessingML package against JSON data:
//!
//! - `{expr}` inserts escaped text
//! - `{@expr}` replaces the enclosing paragraph with raw XML, typically
//!   produced by the `html` filter: `{@body | html}`
//! - `{#expr}` ... `{/expr}` repeats or conditionally renders a section,
//!   `{^expr}` ... `{/expr}` renders when the section would not
//! - `{%expr}` inserts an inline image through an [`ImageLoader`]
//!
//! # Architecture
//!
//! - [`Package`]: the DOCX archive held in memory
//! - [`FieldResolver`]: compiles tag text into [`Field`]s; the default
//!   [`ExpressionResolver`] understands paths, literals and `|` filters from
//!   an explicit [`Filters`] registry
//! - [`TemplateEngine`]: compiles every template part, then renders them
//! - [`ErrorReport`]: JSON view of a [`TemplateError`] and its causes
//!
//! Templates that place images after each block of an HTML field can
//! rewrite their data with [`prepare_image_paragraphs`] first.

mod compile;
mod error;
mod expression;
mod filters;
mod media;
mod package;
mod prepare;
mod render;
mod report;
mod scope;
mod xml;

pub use compile::{CLOSE_DELIMITER, CompiledPart, OPEN_DELIMITER};
pub use error::{BoxError, ExpressionError, FilterError, RenderError, TagError, TemplateError};
pub use expression::{Expression, ExpressionResolver, Field, FieldResolver};
pub use filters::{Filter, Filters, HTML_FILTER, HtmlFilter};
pub use media::{EMU_PER_PIXEL, ImageLoader, LoadedImage};
pub use package::{CONTENT_TYPES_PART, DOCUMENT_PART, Package};
pub use prepare::{DEFAULT_HTML_SUFFIX, prepare_image_paragraphs};
pub use render::{TemplateEngine, TemplateOptions};
pub use report::{ErrorDetails, ErrorProperties, ErrorReport};
pub use scope::Scope;

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use serde_json::json;

    use super::*;

    /// Minimal package as a word processor would write it, run through a
    /// real ZIP round trip.
    fn docx(body: &str) -> Vec<u8> {
        let document = format!(
            concat!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
                r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">"#,
                "<w:body>{}</w:body></w:document>"
            ),
            body
        );
        let package = Package::from_parts([
            (
                CONTENT_TYPES_PART.to_owned(),
                r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="xml" ContentType="application/xml"/></Types>"#.to_owned(),
            ),
            (DOCUMENT_PART.to_owned(), document),
        ]);
        package.write_to(Cursor::new(Vec::new())).unwrap().into_inner()
    }

    #[test]
    fn test_end_to_end_with_prepared_data() {
        let body = concat!(
            "<w:p><w:r><w:t>{title}</w:t></w:r></w:p>",
            "<w:p><w:r><w:t>{#intro_html}</w:t></w:r></w:p>",
            "<w:p><w:r><w:t>{@text | html:'Body'}</w:t></w:r></w:p>",
            "<w:p><w:r><w:t>{/intro_html}</w:t></w:r></w:p>",
        );
        let data = prepare_image_paragraphs(
            json!({"title": "Report", "intro_html": "<p>First</p><p>Second</p>"}),
            DEFAULT_HTML_SUFFIX,
        );

        let mut package = Package::from_reader(Cursor::new(docx(body))).unwrap();
        TemplateEngine::default().render(&mut package, &data).unwrap();
        let bytes = package.write_to(Cursor::new(Vec::new())).unwrap().into_inner();
        let reread = Package::from_reader(Cursor::new(bytes)).unwrap();
        let xml = reread.part_text(DOCUMENT_PART).unwrap().unwrap();

        assert!(xml.contains(r#"<w:t xml:space="preserve">Report</w:t>"#));
        assert_eq!(xml.matches(r#"<w:pStyle w:val="Body"/>"#).count(), 2);
        assert!(xml.contains(r#"<w:t xml:space="preserve">Second</w:t>"#));
        assert!(!xml.contains("intro_html"));
    }

    #[test]
    fn test_report_for_template_mistakes() {
        let mut package = Package::from_reader(Cursor::new(docx(
            "<w:p><w:r><w:t>{#a}{b | nope}</w:t></w:r></w:p>",
        )))
        .unwrap();
        let err = TemplateEngine::default()
            .render(&mut package, &json!({}))
            .unwrap_err();
        let report = serde_json::to_value(ErrorReport::new(&err)).unwrap();

        assert_eq!(report["error"]["properties"]["id"], "multi_error");
        let errors = report["error"]["properties"]["errors"].as_array().unwrap();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0]["properties"]["id"], "invalid_expression");
        assert_eq!(errors[1]["properties"]["id"], "unclosed_loop");
    }
}
