//! Forward-only markup scanner.
//!
//! Turns an HTML fragment into a flat sequence of [`MarkupEvent`]s. Scanning
//! is backed by the quick-xml pull reader in its most lenient configuration;
//! the fragment is first normalized by [`prepare_markup`] so that ordinary
//! HTML (bare text, `\n` line breaks, stray `<`) reads as XML.

use std::sync::LazyLock;

use quick_xml::events::Event;
use quick_xml::reader::Reader;
use regex::Regex;

use crate::entities::decode_entity;
use crate::model::{ListKind, Toggle};

/// Trailing run of literal empty paragraphs left behind by template editors.
static TRAILING_EMPTY_PARAGRAPHS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:<p></p>)+$").expect("invalid trailing paragraph regex"));

/// Markup that already opens with a block-level element.
static BLOCK_START: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*<(?i:p|div|h[1-6]|pre|ul|ol)(?:[\s/>]|$)").expect("invalid block start regex")
});

/// Recognized markup element.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tag {
    /// `h1` to `h6`.
    Heading(u8),
    /// `p`
    Paragraph,
    /// `div`
    Division,
    /// `pre`
    Preformatted,
    /// `br`
    LineBreak,
    Bold,
    Italic,
    Underline,
    Strike,
    Code,
    UnorderedList,
    OrderedList,
    ListItem,
}

impl Tag {
    /// Map an element name to a tag, case-insensitively.
    ///
    /// Returns `None` for elements the converter does not know about.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        let tag = match name.to_ascii_lowercase().as_str() {
            "h1" => Self::Heading(1),
            "h2" => Self::Heading(2),
            "h3" => Self::Heading(3),
            "h4" => Self::Heading(4),
            "h5" => Self::Heading(5),
            "h6" => Self::Heading(6),
            "p" => Self::Paragraph,
            "div" => Self::Division,
            "pre" => Self::Preformatted,
            "br" => Self::LineBreak,
            "b" | "strong" => Self::Bold,
            "i" | "em" => Self::Italic,
            "u" => Self::Underline,
            "s" | "strike" | "del" => Self::Strike,
            "code" => Self::Code,
            "ul" => Self::UnorderedList,
            "ol" => Self::OrderedList,
            "li" => Self::ListItem,
            _ => return None,
        };
        Some(tag)
    }

    /// Inline toggle introduced by this tag.
    #[must_use]
    pub fn toggle(self) -> Option<Toggle> {
        match self {
            Self::Bold => Some(Toggle::Bold),
            Self::Italic => Some(Toggle::Italic),
            Self::Underline => Some(Toggle::Underline),
            Self::Strike => Some(Toggle::Strike),
            Self::Code => Some(Toggle::Code),
            _ => None,
        }
    }

    /// List kind opened by this tag.
    #[must_use]
    pub fn list_kind(self) -> Option<ListKind> {
        match self {
            Self::UnorderedList => Some(ListKind::Bullet),
            Self::OrderedList => Some(ListKind::Ordered),
            _ => None,
        }
    }
}

/// Structural event emitted by the scanner.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MarkupEvent {
    Open(Tag),
    /// Decoded character data.
    Text(String),
    Close(Tag),
    EndOfDocument,
}

/// Remove a trailing run of literal `<p></p>` markers.
///
/// Only that exact marker is stripped; empty headings or paragraphs with
/// attributes are kept.
pub fn strip_trailing_empty_paragraphs(markup: &str) -> &str {
    match TRAILING_EMPTY_PARAGRAPHS.find(markup) {
        Some(found) => &markup[..found.start()],
        None => markup,
    }
}

/// Normalize a fragment before scanning.
///
/// Strips trailing empty paragraphs, wraps bare content in `<p>`, turns
/// newlines into `<br/>` and escapes `<` characters that cannot open a tag.
/// Returns `None` when nothing is left to convert.
pub fn prepare_markup(markup: &str) -> Option<String> {
    let markup = strip_trailing_empty_paragraphs(markup);
    if markup.is_empty() {
        return None;
    }

    let wrapped = if BLOCK_START.is_match(markup) {
        markup.to_owned()
    } else {
        format!("<p>{markup}</p>")
    };

    let with_breaks = wrapped.replace("\r\n", "\n").replace('\n', "<br/>");
    Some(escape_stray_lt(&with_breaks))
}

/// Escape every `<` that cannot start a tag, comment or declaration.
fn escape_stray_lt(markup: &str) -> String {
    let mut out = String::with_capacity(markup.len());
    let mut chars = markup.chars().peekable();
    while let Some(ch) = chars.next() {
        let opens_markup = chars
            .peek()
            .is_some_and(|&next| next.is_ascii_alphabetic() || matches!(next, '/' | '!' | '?'));
        if ch == '<' && !opens_markup {
            out.push_str("&lt;");
        } else {
            out.push(ch);
        }
    }
    out
}

/// Scan prepared markup into events.
///
/// Unrecognized elements, comments and declarations produce no events.
/// Adjacent character data and entity references are merged into a single
/// [`MarkupEvent::Text`]. The sequence always ends with
/// [`MarkupEvent::EndOfDocument`]; a malformed construct ends the scan at
/// that point instead of failing.
pub fn tokenize(markup: &str) -> Vec<MarkupEvent> {
    let mut reader = Reader::from_str(markup);
    let config = reader.config_mut();
    config.trim_text(false);
    config.check_end_names = false;
    config.allow_unmatched_ends = true;
    config.expand_empty_elements = true;
    config.allow_dangling_amp = true;
    config.check_comments = false;

    let mut events = Vec::new();
    let mut text = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e) | Event::Empty(e)) => {
                flush_text(&mut text, &mut events);
                if let Some(tag) = tag_for(e.name().as_ref()) {
                    events.push(MarkupEvent::Open(tag));
                }
            }
            Ok(Event::End(e)) => {
                flush_text(&mut text, &mut events);
                if let Some(tag) = tag_for(e.name().as_ref()) {
                    events.push(MarkupEvent::Close(tag));
                }
            }
            Ok(Event::Text(e)) => {
                text.push_str(&String::from_utf8_lossy(&e));
            }
            Ok(Event::GeneralRef(e)) => {
                text.push_str(&decode_entity(&String::from_utf8_lossy(&e)));
            }
            Ok(Event::CData(e)) => {
                text.push_str(&String::from_utf8_lossy(&e));
            }
            Ok(Event::Eof) => break,
            Ok(Event::Comment(_) | Event::Decl(_) | Event::PI(_) | Event::DocType(_)) => {}
            Err(e) => {
                tracing::debug!(error = %e, "Markup scan stopped at malformed input");
                break;
            }
        }
    }

    flush_text(&mut text, &mut events);
    events.push(MarkupEvent::EndOfDocument);
    events
}

fn tag_for(name: &[u8]) -> Option<Tag> {
    Tag::from_name(&String::from_utf8_lossy(name))
}

fn flush_text(text: &mut String, events: &mut Vec<MarkupEvent>) {
    if !text.is_empty() {
        events.push(MarkupEvent::Text(std::mem::take(text)));
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_tag_from_name_aliases() {
        assert_eq!(Tag::from_name("strong"), Some(Tag::Bold));
        assert_eq!(Tag::from_name("EM"), Some(Tag::Italic));
        assert_eq!(Tag::from_name("h4"), Some(Tag::Heading(4)));
        assert_eq!(Tag::from_name("strike"), Some(Tag::Strike));
        assert_eq!(Tag::from_name("span"), None);
        assert_eq!(Tag::from_name("h7"), None);
    }

    #[test]
    fn test_prepare_wraps_bare_text() {
        assert_eq!(prepare_markup("hello").as_deref(), Some("<p>hello</p>"));
    }

    #[test]
    fn test_prepare_keeps_block_markup() {
        assert_eq!(
            prepare_markup("<h2>Title</h2>").as_deref(),
            Some("<h2>Title</h2>")
        );
        assert_eq!(
            prepare_markup("  <UL><li>a</li></UL>").as_deref(),
            Some("  <UL><li>a</li></UL>")
        );
    }

    #[test]
    fn test_prepare_does_not_mistake_pre_prefix() {
        // `<progress>` starts with `p` but is not a paragraph
        assert_eq!(
            prepare_markup("<progress>x</progress>").as_deref(),
            Some("<p><progress>x</progress></p>")
        );
    }

    #[test]
    fn test_prepare_translates_newlines() {
        assert_eq!(
            prepare_markup("a\r\nb\nc").as_deref(),
            Some("<p>a<br/>b<br/>c</p>")
        );
    }

    #[test]
    fn test_prepare_escapes_stray_lt() {
        assert_eq!(
            prepare_markup("1 < 2").as_deref(),
            Some("<p>1 &lt; 2</p>")
        );
    }

    #[test]
    fn test_escape_consecutive_stray_lt() {
        assert_eq!(escape_stray_lt("<<b>"), "&lt;<b>");
        assert_eq!(escape_stray_lt("a<"), "a&lt;");
    }

    #[test]
    fn test_prepare_empty_input() {
        assert_eq!(prepare_markup(""), None);
        assert_eq!(prepare_markup("<p></p><p></p>"), None);
    }

    #[test]
    fn test_strip_only_literal_empty_paragraphs() {
        assert_eq!(
            strip_trailing_empty_paragraphs("<p>a</p><p></p><p></p>"),
            "<p>a</p>"
        );
        assert_eq!(
            strip_trailing_empty_paragraphs("<p>a</p><h1></h1>"),
            "<p>a</p><h1></h1>"
        );
        assert_eq!(
            strip_trailing_empty_paragraphs("<p></p><p>a</p>"),
            "<p></p><p>a</p>"
        );
    }

    #[test]
    fn test_tokenize_simple_paragraph() {
        assert_eq!(
            tokenize("<p>a<b>b</b>c</p>"),
            vec![
                MarkupEvent::Open(Tag::Paragraph),
                MarkupEvent::Text("a".to_owned()),
                MarkupEvent::Open(Tag::Bold),
                MarkupEvent::Text("b".to_owned()),
                MarkupEvent::Close(Tag::Bold),
                MarkupEvent::Text("c".to_owned()),
                MarkupEvent::Close(Tag::Paragraph),
                MarkupEvent::EndOfDocument,
            ]
        );
    }

    #[test]
    fn test_tokenize_drops_unknown_tags() {
        assert_eq!(
            tokenize(r#"<p><span class="x">a</span></p>"#),
            vec![
                MarkupEvent::Open(Tag::Paragraph),
                MarkupEvent::Text("a".to_owned()),
                MarkupEvent::Close(Tag::Paragraph),
                MarkupEvent::EndOfDocument,
            ]
        );
    }

    #[test]
    fn test_tokenize_merges_entities_into_text() {
        assert_eq!(
            tokenize("<p>a &amp; b&nbsp;c</p>"),
            vec![
                MarkupEvent::Open(Tag::Paragraph),
                MarkupEvent::Text("a & b\u{00a0}c".to_owned()),
                MarkupEvent::Close(Tag::Paragraph),
                MarkupEvent::EndOfDocument,
            ]
        );
    }

    #[test]
    fn test_tokenize_self_closing_break() {
        assert_eq!(
            tokenize("<p>a<br/>b</p>"),
            vec![
                MarkupEvent::Open(Tag::Paragraph),
                MarkupEvent::Text("a".to_owned()),
                MarkupEvent::Open(Tag::LineBreak),
                MarkupEvent::Close(Tag::LineBreak),
                MarkupEvent::Text("b".to_owned()),
                MarkupEvent::Close(Tag::Paragraph),
                MarkupEvent::EndOfDocument,
            ]
        );
    }

    #[test]
    fn test_tokenize_ignores_comments() {
        assert_eq!(
            tokenize("<p>a<!-- note -->b</p>"),
            vec![
                MarkupEvent::Open(Tag::Paragraph),
                MarkupEvent::Text("ab".to_owned()),
                MarkupEvent::Close(Tag::Paragraph),
                MarkupEvent::EndOfDocument,
            ]
        );
    }

    #[test]
    fn test_tokenize_empty_input() {
        assert_eq!(tokenize(""), vec![MarkupEvent::EndOfDocument]);
    }
}
