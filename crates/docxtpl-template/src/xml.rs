//! Span-preserving lexer for template parts.
//!
//! Every piece of the input comes back as a slice of the original text, so
//! markup the template engine does not touch is emitted byte for byte.

use quick_xml::Reader;
use quick_xml::events::Event;

/// Lexical piece of an XML part.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum XmlPiece<'a> {
    /// Start tag, with its qualified name.
    Start { name: &'a str, raw: &'a str },
    /// End tag, with its qualified name.
    End { name: &'a str, raw: &'a str },
    /// Self-closing tag, with its qualified name.
    Empty { name: &'a str, raw: &'a str },
    /// Character data, still escaped.
    Text(&'a str),
    /// Declaration, comment, CDATA, processing instruction or doctype.
    Other(&'a str),
}

impl<'a> XmlPiece<'a> {
    /// Exact source text.
    pub(crate) fn raw(&self) -> &'a str {
        match self {
            Self::Start { raw, .. } | Self::End { raw, .. } | Self::Empty { raw, .. } => raw,
            Self::Text(raw) | Self::Other(raw) => raw,
        }
    }
}

/// Split `xml` into pieces covering the whole input.
///
/// Adjacent text and entity references are merged into one [`XmlPiece::Text`].
pub(crate) fn lex(xml: &str) -> Result<Vec<XmlPiece<'_>>, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut pieces = Vec::new();
    let mut start = 0;
    let mut text_start = None;

    loop {
        let event = reader.read_event()?;
        let end = usize::try_from(reader.buffer_position()).unwrap_or(xml.len());

        if !matches!(event, Event::Text(_) | Event::GeneralRef(_))
            && let Some(from) = text_start.take()
        {
            pieces.push(XmlPiece::Text(slice(xml, from, start)));
        }

        let raw = slice(xml, start, end);
        match event {
            Event::Start(_) => pieces.push(XmlPiece::Start {
                name: tag_name(raw, 1),
                raw,
            }),
            Event::End(_) => pieces.push(XmlPiece::End {
                name: tag_name(raw, 2),
                raw,
            }),
            Event::Empty(_) => pieces.push(XmlPiece::Empty {
                name: tag_name(raw, 1),
                raw,
            }),
            Event::Text(_) | Event::GeneralRef(_) => {
                text_start.get_or_insert(start);
            }
            Event::Eof => break,
            _ => pieces.push(XmlPiece::Other(raw)),
        }
        start = end;
    }

    Ok(pieces)
}

fn slice(xml: &str, from: usize, to: usize) -> &str {
    xml.get(from..to).unwrap_or_default()
}

/// Qualified name of a tag, skipping `offset` bytes of `<` or `</`.
fn tag_name(raw: &str, offset: usize) -> &str {
    let rest = raw.get(offset..).unwrap_or_default();
    let end = rest
        .find(|c: char| c.is_whitespace() || c == '>' || c == '/')
        .unwrap_or(rest.len());
    &rest[..end]
}
