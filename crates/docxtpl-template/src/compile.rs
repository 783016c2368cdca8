//! Template part compiler.
//!
//! Compilation runs in four passes over one XML part:
//! - lex the part into span-preserving pieces
//! - decode the text of `w:t` elements, merge tags split across runs into the
//!   run where they start, and cut the text into literal and tag tokens
//! - widen raw tags and paragraph-loop section tags to their whole paragraph
//! - fold tokens into a node tree, compiling every tag expression
//!
//! Tag problems are collected rather than returned one at a time so that a
//! template author sees every mistake in a part at once.

use std::borrow::Cow;

use quick_xml::escape::unescape;

use crate::error::{TagError, TemplateError};
use crate::expression::{Field, FieldResolver};
use crate::xml::{XmlPiece, lex};

/// Opening tag delimiter.
pub const OPEN_DELIMITER: char = '{';
/// Closing tag delimiter.
pub const CLOSE_DELIMITER: char = '}';

const TEXT_ELEMENT: &str = "w:t";
const PARAGRAPH_ELEMENT: &str = "w:p";
const PRESERVED_TEXT_START: &str = r#"<w:t xml:space="preserve">"#;

/// Characters of an unclosed tag quoted in the error.
const UNCLOSED_CONTEXT_CHARS: usize = 20;

/// A compiled tag with the text it was written as.
#[derive(Debug)]
pub(crate) struct Placeholder {
    pub(crate) tag: String,
    pub(crate) field: Box<dyn Field>,
}

#[derive(Debug)]
pub(crate) enum Node {
    /// Markup copied verbatim.
    Markup(String),
    /// Decoded literal text inside `w:t`.
    Text(String),
    /// `{expr}`: escaped text.
    Value(Placeholder),
    /// `{@expr}`: XML inserted verbatim.
    RawXml(Placeholder),
    /// `{%expr}`: inline image.
    Image(Placeholder),
    /// `{#expr}` / `{^expr}` ... `{/expr}`.
    Section {
        tag: Placeholder,
        inverted: bool,
        body: Vec<Node>,
    },
}

/// Template part ready to render.
#[derive(Debug)]
pub struct CompiledPart {
    pub(crate) nodes: Vec<Node>,
}

impl CompiledPart {
    /// Number of tags in the part, sections counted once.
    pub fn tag_count(&self) -> usize {
        count_tags(&self.nodes)
    }
}

fn count_tags(nodes: &[Node]) -> usize {
    nodes
        .iter()
        .map(|node| match node {
            Node::Markup(_) | Node::Text(_) => 0,
            Node::Value(_) | Node::RawXml(_) | Node::Image(_) => 1,
            Node::Section { body, .. } => 1 + count_tags(body),
        })
        .sum()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TagKind {
    Value,
    Raw,
    Image,
    Open,
    Inverted,
    Close,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct TagToken {
    kind: TagKind,
    /// Expression after the prefix character.
    expr: String,
    /// Tag content as written, without delimiters.
    source: String,
}

impl TagToken {
    fn parse(content: &str) -> Self {
        let source = content.trim();
        let mut chars = source.chars();
        let kind = match chars.next() {
            Some('#') => TagKind::Open,
            Some('^') => TagKind::Inverted,
            Some('/') => TagKind::Close,
            Some('@') => TagKind::Raw,
            Some('%') => TagKind::Image,
            _ => TagKind::Value,
        };
        let expr = if kind == TagKind::Value {
            source
        } else {
            chars.as_str()
        };
        Self {
            kind,
            expr: expr.trim().to_owned(),
            source: source.to_owned(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Element<'a> {
    Start(&'a str),
    End(&'a str),
    Other,
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Token<'a> {
    Markup {
        raw: Cow<'a, str>,
        element: Element<'a>,
    },
    Text(String),
    Tag(TagToken),
}

impl Token<'_> {
    fn element(&self) -> Element<'_> {
        match self {
            Self::Markup { element, .. } => *element,
            Self::Text(_) | Self::Tag(_) => Element::Other,
        }
    }
}

/// Compile one XML part.
pub(crate) fn compile_part(
    xml: &str,
    part: &str,
    resolver: &dyn FieldResolver,
    paragraph_loop: bool,
) -> Result<CompiledPart, TemplateError> {
    let pieces = lex(xml).map_err(|source| TemplateError::Xml {
        part: part.to_owned(),
        source,
    })?;

    let mut errors = Vec::new();
    let tokens = tokenize(&pieces, &mut errors);
    let tokens = expand_to_paragraphs(tokens, paragraph_loop, &mut errors);
    let nodes = build_tree(tokens, resolver, &mut errors);

    if !errors.is_empty() {
        tracing::debug!(part, errors = errors.len(), "Template part has tag errors");
        return Err(TemplateError::Compile {
            part: part.to_owned(),
            errors,
        });
    }

    let compiled = CompiledPart { nodes };
    tracing::debug!(part, tags = compiled.tag_count(), "Compiled template part");
    Ok(compiled)
}

fn tokenize<'a>(pieces: &[XmlPiece<'a>], errors: &mut Vec<TagError>) -> Vec<Token<'a>> {
    let mut texts = Vec::new();
    let mut slots = vec![None; pieces.len()];
    let mut in_text = false;

    for (slot, piece) in slots.iter_mut().zip(pieces) {
        match piece {
            XmlPiece::Start { name, .. } if *name == TEXT_ELEMENT => in_text = true,
            XmlPiece::End { name, .. } if *name == TEXT_ELEMENT => in_text = false,
            XmlPiece::Text(raw) if in_text => {
                *slot = Some(texts.len());
                texts.push(unescape(raw).map_or_else(|_| (*raw).to_owned(), Cow::into_owned));
            }
            _ => {}
        }
    }

    merge_split_tags(&mut texts, errors);

    let mut tokens = Vec::with_capacity(pieces.len());
    for (piece, slot) in pieces.iter().zip(&slots) {
        if let Some(index) = slot {
            split_tags(&texts[*index], &mut tokens);
            continue;
        }
        let token = match *piece {
            XmlPiece::Start { name, raw } if name == TEXT_ELEMENT => Token::Markup {
                raw: preserve_space(raw),
                element: Element::Start(name),
            },
            XmlPiece::Start { name, raw } => Token::Markup {
                raw: Cow::Borrowed(raw),
                element: Element::Start(name),
            },
            XmlPiece::End { name, raw } => Token::Markup {
                raw: Cow::Borrowed(raw),
                element: Element::End(name),
            },
            other => Token::Markup {
                raw: Cow::Borrowed(other.raw()),
                element: Element::Other,
            },
        };
        tokens.push(token);
    }
    tokens
}

/// Text runs are rewritten, so leading and trailing spaces must survive.
fn preserve_space(raw: &str) -> Cow<'_, str> {
    if raw.contains("xml:space") {
        Cow::Borrowed(raw)
    } else {
        Cow::Borrowed(PRESERVED_TEXT_START)
    }
}

/// Move the remainder of every tag that spans several texts into the text
/// where it starts.
fn merge_split_tags(texts: &mut [String], errors: &mut Vec<TagError>) {
    let mut spans = Vec::new();
    let mut open: Option<(usize, usize)> = None;

    for (index, text) in texts.iter().enumerate() {
        for (offset, ch) in text.char_indices() {
            match (ch, open) {
                (OPEN_DELIMITER, None) => open = Some((index, offset)),
                (CLOSE_DELIMITER, Some(start)) => {
                    spans.push((start.0, index, offset + ch.len_utf8()));
                    open = None;
                }
                _ => {}
            }
        }
    }

    if let Some((index, offset)) = open {
        let context = texts[index]
            .get(offset + 1..)
            .unwrap_or_default()
            .chars()
            .take(UNCLOSED_CONTEXT_CHARS)
            .collect();
        errors.push(TagError::UnclosedTag { context });
    }

    for &(first, last, end) in spans.iter().rev() {
        if first == last {
            continue;
        }
        let tail: String = texts[last].drain(..end).collect();
        let mut moved = String::new();
        for text in &mut texts[first + 1..last] {
            moved.push_str(&std::mem::take(text));
        }
        texts[first].push_str(&moved);
        texts[first].push_str(&tail);
    }
}

fn split_tags<'a>(text: &str, tokens: &mut Vec<Token<'a>>) {
    let mut rest = text;
    while let Some(open) = rest.find(OPEN_DELIMITER) {
        let Some(length) = rest[open..].find(CLOSE_DELIMITER) else {
            break;
        };
        let close = open + length;
        if open > 0 {
            tokens.push(Token::Text(rest[..open].to_owned()));
        }
        tokens.push(Token::Tag(TagToken::parse(&rest[open + 1..close])));
        rest = &rest[close + 1..];
    }
    if !rest.is_empty() {
        tokens.push(Token::Text(rest.to_owned()));
    }
}

/// Start and end token of the innermost paragraph around `index`.
fn paragraph_bounds(tokens: &[Token<'_>], index: usize) -> Option<(usize, usize)> {
    let mut depth = 0usize;
    let mut start = None;
    for (position, token) in tokens[..index].iter().enumerate().rev() {
        match token.element() {
            Element::End(PARAGRAPH_ELEMENT) => depth += 1,
            Element::Start(PARAGRAPH_ELEMENT) if depth == 0 => {
                start = Some(position);
                break;
            }
            Element::Start(PARAGRAPH_ELEMENT) => depth -= 1,
            _ => {}
        }
    }
    let start = start?;

    depth = 0;
    for (position, token) in tokens.iter().enumerate().skip(index + 1) {
        match token.element() {
            Element::Start(PARAGRAPH_ELEMENT) => depth += 1,
            Element::End(PARAGRAPH_ELEMENT) if depth == 0 => return Some((start, position)),
            Element::End(PARAGRAPH_ELEMENT) => depth -= 1,
            _ => {}
        }
    }
    None
}

/// Whether the tag at `index` is the only non-blank content of its paragraph.
fn is_alone(tokens: &[Token<'_>], index: usize, (start, end): (usize, usize)) -> bool {
    tokens[start..=end]
        .iter()
        .enumerate()
        .all(|(offset, token)| match token {
            _ if start + offset == index => true,
            Token::Text(text) => text.trim().is_empty(),
            Token::Tag(_) => false,
            Token::Markup { .. } => true,
        })
}

/// Pairs of (open, close) token indexes for well-nested sections.
fn pair_sections(tokens: &[Token<'_>]) -> Vec<(usize, usize)> {
    let mut stack: Vec<(usize, &str)> = Vec::new();
    let mut pairs = Vec::new();
    for (index, token) in tokens.iter().enumerate() {
        let Token::Tag(tag) = token else {
            continue;
        };
        match tag.kind {
            TagKind::Open | TagKind::Inverted => stack.push((index, tag.expr.as_str())),
            TagKind::Close => {
                if let Some(&(open, expr)) = stack.last()
                    && (tag.expr.is_empty() || tag.expr == expr)
                {
                    stack.pop();
                    pairs.push((open, index));
                }
            }
            TagKind::Value | TagKind::Raw | TagKind::Image => {}
        }
    }
    pairs
}

/// Replace the paragraphs of raw tags, and of section tags standing alone
/// in their own paragraphs, by the tag itself.
fn expand_to_paragraphs<'a>(
    tokens: Vec<Token<'a>>,
    paragraph_loop: bool,
    errors: &mut Vec<TagError>,
) -> Vec<Token<'a>> {
    // (paragraph start, paragraph end, tag index)
    let mut replacements = Vec::new();

    for (index, token) in tokens.iter().enumerate() {
        let Token::Tag(tag) = token else {
            continue;
        };
        if tag.kind != TagKind::Raw {
            continue;
        }
        let Some(bounds) = paragraph_bounds(&tokens, index) else {
            continue;
        };
        if is_alone(&tokens, index, bounds) {
            replacements.push((bounds.0, bounds.1, index));
        } else {
            errors.push(TagError::RawTagNotAlone {
                tag: tag.source.clone(),
            });
        }
    }

    if paragraph_loop {
        for (open, close) in pair_sections(&tokens) {
            let (Some(first), Some(last)) = (
                paragraph_bounds(&tokens, open),
                paragraph_bounds(&tokens, close),
            ) else {
                continue;
            };
            if first.1 < last.0 && is_alone(&tokens, open, first) && is_alone(&tokens, close, last)
            {
                replacements.push((first.0, first.1, open));
                replacements.push((last.0, last.1, close));
            }
        }
    }

    if replacements.is_empty() {
        return tokens;
    }
    replacements.sort_unstable_by_key(|&(start, _, _)| start);

    let mut slots: Vec<Option<Token<'a>>> = tokens.into_iter().map(Some).collect();
    let mut expanded = Vec::with_capacity(slots.len());
    let mut cursor = 0;
    for (start, end, tag) in replacements {
        if start < cursor {
            continue;
        }
        expanded.extend(slots[cursor..start].iter_mut().filter_map(Option::take));
        expanded.extend(slots[tag].take());
        cursor = end + 1;
    }
    expanded.extend(slots[cursor..].iter_mut().filter_map(Option::take));
    expanded
}

struct Frame {
    section: Option<(Placeholder, bool)>,
    token: TagToken,
    body: Vec<Node>,
}

fn build_tree(
    tokens: Vec<Token<'_>>,
    resolver: &dyn FieldResolver,
    errors: &mut Vec<TagError>,
) -> Vec<Node> {
    let mut root = Vec::new();
    let mut stack: Vec<Frame> = Vec::new();

    for token in tokens {
        let body = stack.last_mut().map_or(&mut root, |frame| &mut frame.body);
        match token {
            Token::Markup { raw, .. } => {
                if let Some(Node::Markup(markup)) = body.last_mut() {
                    markup.push_str(&raw);
                } else {
                    body.push(Node::Markup(raw.into_owned()));
                }
            }
            Token::Text(text) => body.push(Node::Text(text)),
            Token::Tag(tag) => match tag.kind {
                TagKind::Value | TagKind::Raw | TagKind::Image => {
                    if let Some(placeholder) = compile_tag(&tag, resolver, errors) {
                        body.push(match tag.kind {
                            TagKind::Raw => Node::RawXml(placeholder),
                            TagKind::Image => Node::Image(placeholder),
                            _ => Node::Value(placeholder),
                        });
                    }
                }
                TagKind::Open | TagKind::Inverted => {
                    let inverted = tag.kind == TagKind::Inverted;
                    let section =
                        compile_tag(&tag, resolver, errors).map(|placeholder| (placeholder, inverted));
                    stack.push(Frame {
                        section,
                        token: tag,
                        body: Vec::new(),
                    });
                }
                TagKind::Close => {
                    let Some(frame) = stack.pop() else {
                        errors.push(TagError::UnopenedSection { tag: tag.source });
                        continue;
                    };
                    if !tag.expr.is_empty() && tag.expr != frame.token.expr {
                        errors.push(TagError::MismatchedSection {
                            open: frame.token.source,
                            close: tag.source,
                        });
                        continue;
                    }
                    if let Some((placeholder, inverted)) = frame.section {
                        let parent = stack.last_mut().map_or(&mut root, |frame| &mut frame.body);
                        parent.push(Node::Section {
                            tag: placeholder,
                            inverted,
                            body: frame.body,
                        });
                    }
                }
            },
        }
    }

    for frame in stack {
        errors.push(TagError::UnclosedSection {
            tag: frame.token.source,
        });
    }
    root
}

fn compile_tag(
    tag: &TagToken,
    resolver: &dyn FieldResolver,
    errors: &mut Vec<TagError>,
) -> Option<Placeholder> {
    match resolver.resolve(&tag.expr) {
        Ok(field) => Some(Placeholder {
            tag: tag.source.clone(),
            field,
        }),
        Err(source) => {
            errors.push(TagError::Expression {
                tag: tag.source.clone(),
                source,
            });
            None
        }
    }
}
