//! Error types for template compilation and rendering.

/// Boxed error returned by pluggable collaborators such as image loaders.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Error raised by a filter while transforming a value.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum FilterError {
    /// The piped value has the wrong type.
    #[error("expected {expected} input, found {found}")]
    InvalidInput {
        /// Accepted input type.
        expected: &'static str,
        /// Type that was received.
        found: &'static str,
    },

    /// A filter argument has the wrong type.
    #[error("argument {index} must be {expected}, found {found}")]
    InvalidArgument {
        /// Zero-based argument position.
        index: usize,
        /// Accepted argument type.
        expected: &'static str,
        /// Type that was received.
        found: &'static str,
    },
}

/// Error in a tag expression, raised while compiling or evaluating it.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ExpressionError {
    /// Character that cannot start any token.
    #[error("unexpected character '{ch}' at position {position}")]
    UnexpectedChar {
        /// Offending character.
        ch: char,
        /// Byte offset inside the expression.
        position: usize,
    },

    /// Token in a position the grammar does not allow.
    #[error("unexpected `{0}`")]
    UnexpectedToken(String),

    /// Expression ended where more input was required.
    #[error("unexpected end of expression")]
    UnexpectedEnd,

    /// String literal without its closing quote.
    #[error("unterminated string literal")]
    UnterminatedString,

    /// Filter name not present in the registry.
    #[error("unknown filter `{0}`")]
    UnknownFilter(String),

    /// Filter failed while evaluating.
    #[error("filter `{name}` failed")]
    Filter {
        /// Filter name as written.
        name: String,
        /// Underlying filter error.
        #[source]
        source: FilterError,
    },
}

/// Problem with a single tag, found while compiling a template part.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum TagError {
    /// Opening delimiter without a closing one.
    #[error("unclosed tag starting with `{{{context}`")]
    UnclosedTag {
        /// Text following the opening delimiter.
        context: String,
    },

    /// Section opened but never closed.
    #[error("section `{tag}` is never closed")]
    UnclosedSection {
        /// Opening tag as written.
        tag: String,
    },

    /// Closing tag without an open section.
    #[error("closing tag `{tag}` has no open section")]
    UnopenedSection {
        /// Closing tag as written.
        tag: String,
    },

    /// Closing tag naming a different section than the open one.
    #[error("closing tag `{close}` does not match section `{open}`")]
    MismatchedSection {
        /// Innermost open section.
        open: String,
        /// Closing tag as written.
        close: String,
    },

    /// Raw XML tag sharing its paragraph with other content.
    #[error("raw tag `{tag}` must be the only content of its paragraph")]
    RawTagNotAlone {
        /// Raw tag as written.
        tag: String,
    },

    /// Tag whose expression does not compile.
    #[error("invalid expression in tag `{tag}`")]
    Expression {
        /// Tag as written.
        tag: String,
        /// Underlying expression error.
        #[source]
        source: ExpressionError,
    },
}

impl TagError {
    /// Stable identifier used in error reports.
    pub fn id(&self) -> &'static str {
        match self {
            Self::UnclosedTag { .. } => "unclosed_tag",
            Self::UnclosedSection { .. } => "unclosed_loop",
            Self::UnopenedSection { .. } => "unopened_loop",
            Self::MismatchedSection { .. } => "closing_tag_does_not_match_opening_tag",
            Self::RawTagNotAlone { .. } => "raw_xml_tag_should_be_only_text_in_paragraph",
            Self::Expression { .. } => "invalid_expression",
        }
    }

    /// Tag text the error refers to, when there is one.
    pub fn tag(&self) -> Option<&str> {
        match self {
            Self::UnclosedTag { .. } => None,
            Self::UnclosedSection { tag }
            | Self::UnopenedSection { tag }
            | Self::RawTagNotAlone { tag }
            | Self::Expression { tag, .. } => Some(tag),
            Self::MismatchedSection { close, .. } => Some(close),
        }
    }
}

/// Error raised while rendering a compiled part.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum RenderError {
    /// Tag expression failed to evaluate.
    #[error("failed to evaluate tag `{tag}`")]
    Expression {
        /// Tag as written.
        tag: String,
        /// Underlying expression error.
        #[source]
        source: ExpressionError,
    },

    /// Image loader rejected the tag value.
    #[error("failed to load image for tag `{tag}`")]
    Image {
        /// Tag as written.
        tag: String,
        /// Loader error.
        #[source]
        source: BoxError,
    },
}

impl RenderError {
    /// Stable identifier used in error reports.
    pub fn id(&self) -> &'static str {
        match self {
            Self::Expression { .. } => "scopeparser_execution_failed",
            Self::Image { .. } => "image_load_failed",
        }
    }

    /// Tag that failed.
    pub fn tag(&self) -> &str {
        match self {
            Self::Expression { tag, .. } | Self::Image { tag, .. } => tag,
        }
    }
}

/// Error from loading, compiling, rendering or saving a template.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum TemplateError {
    /// I/O error reading or writing the package.
    #[error("I/O error")]
    Io(#[from] std::io::Error),

    /// The package is not a readable ZIP archive.
    #[error("invalid template archive")]
    Zip(#[from] zip::result::ZipError),

    /// A required package part is absent.
    #[error("template part `{0}` is missing")]
    MissingPart(String),

    /// A part that should hold XML is not UTF-8.
    #[error("template part `{part}` is not valid UTF-8")]
    Utf8 {
        /// Part name.
        part: String,
        /// Decoding error.
        #[source]
        source: std::string::FromUtf8Error,
    },

    /// A part is not well-formed XML.
    #[error("malformed XML in `{part}`")]
    Xml {
        /// Part name.
        part: String,
        /// Parser error.
        #[source]
        source: quick_xml::Error,
    },

    /// One or more tags in a part failed to compile.
    #[error("{} tag error(s) in `{part}`", .errors.len())]
    Compile {
        /// Part name.
        part: String,
        /// Every problem found in the part.
        errors: Vec<TagError>,
    },

    /// A compiled part failed to render.
    #[error("rendering `{part}` failed")]
    Render {
        /// Part name.
        part: String,
        /// Underlying render error.
        #[source]
        source: RenderError,
    },
}

impl TemplateError {
    /// Stable identifier used in error reports.
    pub fn id(&self) -> &'static str {
        match self {
            Self::Io(_) => "io_error",
            Self::Zip(_) => "invalid_archive",
            Self::MissingPart(_) => "missing_part",
            Self::Utf8 { .. } => "invalid_encoding",
            Self::Xml { .. } => "malformed_xml",
            Self::Compile { .. } => "multi_error",
            Self::Render { source, .. } => source.id(),
        }
    }

    /// Package part the error refers to, when there is one.
    pub fn part(&self) -> Option<&str> {
        match self {
            Self::Io(_) | Self::Zip(_) => None,
            Self::MissingPart(part)
            | Self::Utf8 { part, .. }
            | Self::Xml { part, .. }
            | Self::Compile { part, .. }
            | Self::Render { part, .. } => Some(part),
        }
    }
}
