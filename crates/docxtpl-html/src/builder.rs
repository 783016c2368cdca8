//! Paragraph builder driven by markup events.
//!
//! [`Builder`] is an explicit state machine: every [`MarkupEvent`] is applied
//! to a [`FormattingState`] and sealed paragraphs are appended to the output
//! in input order.

use crate::model::{ListInfo, ListKind, Paragraph, Run, Toggle, Toggles};
use crate::tokenizer::{MarkupEvent, Tag};

/// Paragraph style applied to preformatted blocks.
pub const CODE_STYLE: &str = "Code";

/// Stack of currently open inline tags.
///
/// Each open pushes its toggle; a close removes the most recent matching
/// entry, so a close only ever switches off the toggle its own open switched
/// on. Closes without a matching open are ignored.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ToggleStack {
    open: Vec<Toggle>,
}

impl ToggleStack {
    pub fn open(&mut self, toggle: Toggle) {
        self.open.push(toggle);
    }

    /// Remove the innermost entry for `toggle`. Returns false if none was open.
    pub fn close(&mut self, toggle: Toggle) -> bool {
        match self.open.iter().rposition(|&t| t == toggle) {
            Some(index) => {
                self.open.remove(index);
                true
            }
            None => false,
        }
    }

    /// Toggle set produced by the open entries.
    #[must_use]
    pub fn active(&self) -> Toggles {
        self.open
            .iter()
            .fold(Toggles::NONE, |toggles, &toggle| toggles.with(toggle))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.open.is_empty()
    }
}

/// Per-conversion state carried across events.
#[derive(Clone, Debug, Default)]
pub struct FormattingState {
    /// Paragraph under construction.
    pub current: Option<Paragraph>,
    pub toggles: ToggleStack,
    /// Open lists, innermost last.
    pub lists: Vec<ListKind>,
    pub preformatted: bool,
}

impl FormattingState {
    /// List membership for a list item opened now.
    fn list_item_info(&self) -> ListInfo {
        match self.lists.last() {
            Some(&kind) => ListInfo {
                kind,
                level: u8::try_from(self.lists.len() - 1).unwrap_or(u8::MAX),
            },
            None => ListInfo::TOP_LEVEL_BULLET,
        }
    }
}

/// Accumulates paragraphs from a stream of markup events.
#[derive(Debug, Default)]
pub struct Builder {
    style: Option<String>,
    state: FormattingState,
    paragraphs: Vec<Paragraph>,
    /// No line of the open preformatted block has ended yet.
    first_code_line: bool,
}

impl Builder {
    /// Create a builder; `style` is applied to generic block paragraphs.
    #[must_use]
    pub fn new(style: Option<&str>) -> Self {
        Self {
            style: style.map(ToOwned::to_owned),
            ..Self::default()
        }
    }

    /// Current formatting state.
    #[must_use]
    pub fn state(&self) -> &FormattingState {
        &self.state
    }

    /// Paragraphs sealed so far.
    #[must_use]
    pub fn paragraphs(&self) -> &[Paragraph] {
        &self.paragraphs
    }

    /// Apply a sequence of events.
    pub fn extend<I>(&mut self, events: I)
    where
        I: IntoIterator<Item = MarkupEvent>,
    {
        for event in events {
            self.handle(event);
        }
    }

    /// Apply a single event.
    pub fn handle(&mut self, event: MarkupEvent) {
        match event {
            MarkupEvent::Open(tag) => self.open(tag),
            MarkupEvent::Close(tag) => self.close(tag),
            MarkupEvent::Text(text) => self.text(text),
            MarkupEvent::EndOfDocument => self.seal(),
        }
    }

    /// Seal any open paragraph and return the output sequence.
    #[must_use]
    pub fn finish(mut self) -> Vec<Paragraph> {
        self.seal();
        self.paragraphs
    }

    fn open(&mut self, tag: Tag) {
        match tag {
            Tag::Heading(level) => {
                self.start_block();
                self.state.current = Some(Paragraph::heading(level));
            }
            Tag::Paragraph | Tag::Division => {
                let list = self.start_block();
                let mut paragraph = Paragraph::styled(self.style.clone());
                paragraph.list = list;
                self.state.current = Some(paragraph);
            }
            Tag::Preformatted => {
                self.start_block();
                self.state.preformatted = true;
                self.first_code_line = true;
                self.state.current = Some(code_paragraph());
            }
            Tag::LineBreak => self.line_break(),
            Tag::ListItem => {
                let list = self.state.list_item_info();
                self.start_block();
                self.state.current = Some(Paragraph {
                    list: Some(list),
                    ..Paragraph::default()
                });
            }
            Tag::UnorderedList | Tag::OrderedList => {
                if let Some(kind) = tag.list_kind() {
                    self.state.lists.push(kind);
                }
            }
            Tag::Bold | Tag::Italic | Tag::Underline | Tag::Strike | Tag::Code => {
                if let Some(toggle) = tag.toggle() {
                    self.state.toggles.open(toggle);
                }
            }
        }
    }

    fn close(&mut self, tag: Tag) {
        match tag {
            Tag::Heading(_) | Tag::Paragraph | Tag::Division | Tag::ListItem => self.seal(),
            Tag::Preformatted => {
                self.seal();
                self.state.preformatted = false;
            }
            Tag::UnorderedList | Tag::OrderedList => {
                if let Some(kind) = tag.list_kind()
                    && let Some(index) = self.state.lists.iter().rposition(|&k| k == kind)
                {
                    self.state.lists.remove(index);
                }
            }
            Tag::Bold | Tag::Italic | Tag::Underline | Tag::Strike | Tag::Code => {
                if let Some(toggle) = tag.toggle()
                    && !self.state.toggles.close(toggle)
                {
                    tracing::debug!(?toggle, "Ignoring close of an inline tag that is not open");
                }
            }
            Tag::LineBreak => {}
        }
    }

    fn text(&mut self, text: String) {
        if self.state.current.is_none() {
            // Whitespace between blocks, e.g. between `</li>` and `<li>`.
            if text.trim().is_empty() {
                return;
            }
            self.state.current = Some(self.implicit_paragraph());
        }
        let toggles = self.state.toggles.active();
        if let Some(paragraph) = self.state.current.as_mut() {
            paragraph.runs.push(Run::text(text, toggles));
        }
    }

    /// Paragraph for text outside any open block, such as `<p>a</p>b` or the
    /// tail of a list item after a nested list.
    fn implicit_paragraph(&self) -> Paragraph {
        if self.state.preformatted {
            return code_paragraph();
        }
        let mut paragraph = Paragraph::styled(self.style.clone());
        if !self.state.lists.is_empty() {
            paragraph.list = Some(self.state.list_item_info());
        }
        paragraph
    }

    fn line_break(&mut self) {
        if self.state.preformatted {
            let first_line = std::mem::replace(&mut self.first_code_line, false);
            if first_line && self.state.current.as_ref().is_some_and(|p| p.runs.is_empty()) {
                return;
            }
            self.seal();
            self.state.current = Some(code_paragraph());
        } else if let Some(paragraph) = self.state.current.as_mut() {
            paragraph.runs.push(Run::line_break());
        }
    }

    /// Make room for a new block paragraph.
    ///
    /// A paragraph with content is sealed. An empty one is dropped and its
    /// list membership handed back so a block nested in a list item keeps it.
    fn start_block(&mut self) -> Option<ListInfo> {
        match self.state.current.take() {
            Some(paragraph) if paragraph.runs.is_empty() => paragraph.list,
            Some(paragraph) => {
                self.paragraphs.push(paragraph);
                None
            }
            None => None,
        }
    }

    fn seal(&mut self) {
        if let Some(paragraph) = self.state.current.take() {
            self.paragraphs.push(paragraph);
        }
    }
}

fn code_paragraph() -> Paragraph {
    Paragraph::styled(Some(CODE_STYLE.to_owned()))
}
