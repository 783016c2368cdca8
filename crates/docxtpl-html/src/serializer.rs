//! WordprocessingML fragment serializer.
//!
//! Each [`Paragraph`] becomes one `w:p` element. The output has no document or
//! body wrapper so it can be spliced into an existing `word/document.xml`.
//! Numbering ids and style ids are fixed; the target template is expected to
//! define them.

use std::fmt::Write;

use quick_xml::escape::escape;

use crate::model::{ListKind, Paragraph, Run, RunContent, Toggles};

/// Numbering definition used for bullet list items.
pub const BULLET_NUM_ID: u32 = 1;
/// Numbering definition used for ordered list items.
pub const ORDERED_NUM_ID: u32 = 2;
/// Paragraph style for list items without an explicit style.
pub const LIST_PARAGRAPH_STYLE: &str = "ListParagraph";
/// Character style for inline code.
pub const CODE_CHAR_STYLE: &str = "CodeChar";

/// Serialize paragraphs to a WordprocessingML fragment.
///
/// An empty slice yields an empty string.
pub fn serialize_fragment(paragraphs: &[Paragraph]) -> String {
    let mut out = String::with_capacity(paragraphs.len() * 128);
    for paragraph in paragraphs {
        serialize_paragraph(paragraph, &mut out);
    }
    out
}

fn serialize_paragraph(paragraph: &Paragraph, out: &mut String) {
    out.push_str("<w:p>");

    let style = paragraph_style(paragraph);
    if style.is_some() || paragraph.list.is_some() {
        out.push_str("<w:pPr>");
        if let Some(style) = style {
            write!(out, r#"<w:pStyle w:val="{}"/>"#, escape(style.as_str())).unwrap();
        }
        if let Some(list) = paragraph.list {
            let num_id = match list.kind {
                ListKind::Bullet => BULLET_NUM_ID,
                ListKind::Ordered => ORDERED_NUM_ID,
            };
            write!(
                out,
                r#"<w:numPr><w:ilvl w:val="{}"/><w:numId w:val="{num_id}"/></w:numPr>"#,
                list.level
            )
            .unwrap();
        }
        out.push_str("</w:pPr>");
    }

    for run in &paragraph.runs {
        serialize_run(run, out);
    }

    out.push_str("</w:p>");
}

/// Resolve the `w:pStyle` value: headings win, then the explicit style, then
/// the list default.
fn paragraph_style(paragraph: &Paragraph) -> Option<String> {
    if let Some(level) = paragraph.heading {
        return Some(format!("Heading{level}"));
    }
    if let Some(style) = &paragraph.style {
        return Some(style.clone());
    }
    paragraph
        .list
        .map(|_| LIST_PARAGRAPH_STYLE.to_owned())
}

fn serialize_run(run: &Run, out: &mut String) {
    match &run.content {
        RunContent::Break => out.push_str("<w:r><w:br/></w:r>"),
        RunContent::Text(text) => {
            out.push_str("<w:r>");
            serialize_run_properties(run.toggles, out);
            write!(out, r#"<w:t xml:space="preserve">{}</w:t>"#, escape(text.as_str())).unwrap();
            out.push_str("</w:r>");
        }
    }
}

/// Write `w:rPr` in schema order; nothing when no toggle is active.
fn serialize_run_properties(toggles: Toggles, out: &mut String) {
    if toggles.is_empty() {
        return;
    }
    out.push_str("<w:rPr>");
    if toggles.code {
        write!(out, r#"<w:rStyle w:val="{CODE_CHAR_STYLE}"/>"#).unwrap();
    }
    if toggles.bold {
        out.push_str("<w:b/>");
    }
    if toggles.italic {
        out.push_str("<w:i/>");
    }
    if toggles.strike {
        out.push_str("<w:strike/>");
    }
    if toggles.underline {
        out.push_str(r#"<w:u w:val="single"/>"#);
    }
    out.push_str("</w:rPr>");
}
