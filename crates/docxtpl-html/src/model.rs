//! Document model produced by the markup builder.
//!
//! A conversion yields an ordered sequence of [`Paragraph`]s, each owning its
//! [`Run`]s. Values are plain data: once the builder seals a paragraph it is
//! never touched again.

/// Inline formatting attribute switched on by an inline tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Toggle {
    Bold,
    Italic,
    Underline,
    Strike,
    Code,
}

/// Set of active inline toggles.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Toggles {
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub strike: bool,
    pub code: bool,
}

impl Toggles {
    /// Toggle set with nothing active.
    pub const NONE: Self = Self {
        bold: false,
        italic: false,
        underline: false,
        strike: false,
        code: false,
    };

    /// Whether `toggle` is active.
    #[must_use]
    pub fn contains(self, toggle: Toggle) -> bool {
        match toggle {
            Toggle::Bold => self.bold,
            Toggle::Italic => self.italic,
            Toggle::Underline => self.underline,
            Toggle::Strike => self.strike,
            Toggle::Code => self.code,
        }
    }

    /// Return a copy with `toggle` switched on.
    #[must_use]
    pub fn with(mut self, toggle: Toggle) -> Self {
        match toggle {
            Toggle::Bold => self.bold = true,
            Toggle::Italic => self.italic = true,
            Toggle::Underline => self.underline = true,
            Toggle::Strike => self.strike = true,
            Toggle::Code => self.code = true,
        }
        self
    }

    /// True when no toggle is active.
    #[must_use]
    pub fn is_empty(self) -> bool {
        self == Self::NONE
    }
}

/// Kind of list a list item belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ListKind {
    Bullet,
    Ordered,
}

/// List membership of a paragraph.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ListInfo {
    pub kind: ListKind,
    /// Zero-based nesting level.
    pub level: u8,
}

impl ListInfo {
    /// Fallback membership for a list item outside any list.
    pub const TOP_LEVEL_BULLET: Self = Self {
        kind: ListKind::Bullet,
        level: 0,
    };
}

/// Content of a single run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RunContent {
    Text(String),
    /// Hard line break inside the paragraph.
    Break,
}

/// Span of inline content sharing one toggle set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Run {
    pub content: RunContent,
    pub toggles: Toggles,
}

impl Run {
    /// Create a text run.
    #[must_use]
    pub fn text(text: impl Into<String>, toggles: Toggles) -> Self {
        Self {
            content: RunContent::Text(text.into()),
            toggles,
        }
    }

    /// Create a hard line break.
    #[must_use]
    pub fn line_break() -> Self {
        Self {
            content: RunContent::Break,
            toggles: Toggles::NONE,
        }
    }

    /// Text of the run, `None` for breaks.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match &self.content {
            RunContent::Text(text) => Some(text),
            RunContent::Break => None,
        }
    }

    #[must_use]
    pub fn is_break(&self) -> bool {
        matches!(self.content, RunContent::Break)
    }
}

/// One block-level unit of output.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Paragraph {
    /// Heading level 1-6.
    pub heading: Option<u8>,
    /// Paragraph style identifier.
    pub style: Option<String>,
    pub list: Option<ListInfo>,
    pub runs: Vec<Run>,
}

impl Paragraph {
    /// Paragraph with a named style.
    #[must_use]
    pub fn styled(style: Option<String>) -> Self {
        Self {
            style,
            ..Self::default()
        }
    }

    /// Heading paragraph.
    #[must_use]
    pub fn heading(level: u8) -> Self {
        Self {
            heading: Some(level),
            ..Self::default()
        }
    }

    /// Concatenated text of all text runs, breaks omitted.
    #[must_use]
    pub fn plain_text(&self) -> String {
        self.runs.iter().filter_map(Run::as_text).collect()
    }
}
