//! Template engine: compiles every template part of a package and renders it
//! against JSON data.

use std::borrow::Cow;

use quick_xml::escape::partial_escape;
use serde_json::Value;

use crate::compile::{CompiledPart, Node, Placeholder, compile_part};
use crate::error::{RenderError, TemplateError};
use crate::expression::{ExpressionResolver, FieldResolver};
use crate::media::{ImageLoader, MediaCollector};
use crate::package::{DOCUMENT_PART, Package};
use crate::scope::Scope;

/// Closes the current text element, breaks the line and reopens it.
const LINE_BREAK: &str = r#"</w:t><w:br/><w:t xml:space="preserve">"#;
const TEXT_END: &str = "</w:t>";
const TEXT_START: &str = r#"<w:t xml:space="preserve">"#;

/// Rendering switches.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TemplateOptions {
    /// Sections whose tags stand alone in their own paragraphs repeat the
    /// paragraphs between them, and the tag paragraphs are dropped.
    pub paragraph_loop: bool,
    /// `\n` in text values becomes a line break.
    pub linebreaks: bool,
}

impl Default for TemplateOptions {
    fn default() -> Self {
        Self {
            paragraph_loop: true,
            linebreaks: true,
        }
    }
}

/// Renders DOCX templates.
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
///
/// use docxtpl_template::{ExpressionResolver, Package, TemplateEngine};
///
/// let mut package = Package::open(Path::new("template.docx"))?;
/// let data = serde_json::json!({"name": "Ada"});
/// TemplateEngine::new(ExpressionResolver::default()).render(&mut package, &data)?;
/// package.save(Path::new("out.docx"))?;
/// # Ok::<(), docxtpl_template::TemplateError>(())
/// ```
pub struct TemplateEngine {
    resolver: Box<dyn FieldResolver>,
    options: TemplateOptions,
    images: Option<Box<dyn ImageLoader>>,
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new(ExpressionResolver::default())
    }
}

impl TemplateEngine {
    /// Engine compiling tags with `resolver`, with default options and no
    /// image support.
    pub fn new(resolver: impl FieldResolver + 'static) -> Self {
        Self {
            resolver: Box::new(resolver),
            options: TemplateOptions::default(),
            images: None,
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: TemplateOptions) -> Self {
        self.options = options;
        self
    }

    /// Enable `{%tag}` images, loaded with `loader`.
    #[must_use]
    pub fn with_image_loader(mut self, loader: impl ImageLoader + 'static) -> Self {
        self.images = Some(Box::new(loader));
        self
    }

    pub fn options(&self) -> TemplateOptions {
        self.options
    }

    /// Compile one XML part without rendering it.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::Xml`] for malformed XML and
    /// [`TemplateError::Compile`] with every tag problem found.
    pub fn compile(&self, xml: &str, part: &str) -> Result<CompiledPart, TemplateError> {
        compile_part(xml, part, self.resolver.as_ref(), self.options.paragraph_loop)
    }

    /// Render every template part of `package` in place.
    ///
    /// All parts are compiled before any is rendered, so a template error
    /// leaves the package untouched.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError`] when a part is missing, malformed, has tag
    /// errors, or fails to render.
    pub fn render(&self, package: &mut Package, data: &Value) -> Result<(), TemplateError> {
        let mut compiled = Vec::new();
        for part in package.template_parts() {
            let xml = package
                .part_text(&part)?
                .ok_or_else(|| TemplateError::MissingPart(part.clone()))?;
            let part_template = self.compile(&xml, &part)?;
            compiled.push((part, part_template));
        }
        if compiled.is_empty() {
            return Err(TemplateError::MissingPart(DOCUMENT_PART.to_owned()));
        }

        let scope = Scope::root(data);
        let mut media = MediaCollector::default();
        for (part, part_template) in &compiled {
            let mut renderer = Renderer {
                options: self.options,
                images: self.images.as_deref(),
                media: &mut media,
            };
            let mut out = String::new();
            renderer
                .render(&part_template.nodes, &scope, &mut out)
                .map_err(|source| TemplateError::Render {
                    part: part.clone(),
                    source,
                })?;
            package.set_part(part, out);
            media.flush(package, part)?;
            tracing::debug!(part = %part, "Rendered template part");
        }

        tracing::info!(parts = compiled.len(), "Rendered template");
        Ok(())
    }
}

struct Renderer<'a> {
    options: TemplateOptions,
    images: Option<&'a dyn ImageLoader>,
    media: &'a mut MediaCollector,
}

impl Renderer<'_> {
    fn render(
        &mut self,
        nodes: &[Node],
        scope: &Scope<'_>,
        out: &mut String,
    ) -> Result<(), RenderError> {
        for node in nodes {
            match node {
                Node::Markup(markup) => out.push_str(markup),
                Node::Text(text) => out.push_str(&partial_escape(text.as_str())),
                Node::Value(placeholder) => {
                    let value = evaluate(placeholder, scope)?;
                    write_text(&value_to_text(&value), self.options.linebreaks, out);
                }
                Node::RawXml(placeholder) => {
                    let value = evaluate(placeholder, scope)?;
                    out.push_str(&value_to_text(&value));
                }
                Node::Image(placeholder) => self.image(placeholder, scope, out)?,
                Node::Section {
                    tag,
                    inverted,
                    body,
                } => self.section(tag, *inverted, body, scope, out)?,
            }
        }
        Ok(())
    }

    fn section(
        &mut self,
        tag: &Placeholder,
        inverted: bool,
        body: &[Node],
        scope: &Scope<'_>,
        out: &mut String,
    ) -> Result<(), RenderError> {
        let value = evaluate(tag, scope)?;
        if inverted {
            if !is_truthy(&value) {
                self.render(body, scope, out)?;
            }
            return Ok(());
        }

        match &value {
            Value::Array(items) => {
                for item in items {
                    let inner = scope.child(item);
                    self.render(body, &inner, out)?;
                }
            }
            Value::Object(_) => {
                let inner = scope.child(&value);
                self.render(body, &inner, out)?;
            }
            other if is_truthy(other) => self.render(body, scope, out)?,
            _ => {}
        }
        Ok(())
    }

    fn image(
        &mut self,
        placeholder: &Placeholder,
        scope: &Scope<'_>,
        out: &mut String,
    ) -> Result<(), RenderError> {
        let value = evaluate(placeholder, scope)?;
        let Some(name) = value.as_str().filter(|name| !name.is_empty()) else {
            return Ok(());
        };
        let Some(loader) = self.images else {
            tracing::warn!(tag = %placeholder.tag, "Image support is disabled, skipping image tag");
            return Ok(());
        };

        let image = loader.load(name).map_err(|source| RenderError::Image {
            tag: placeholder.tag.clone(),
            source,
        })?;
        out.push_str(TEXT_END);
        out.push_str(&self.media.embed(image, name));
        out.push_str(TEXT_START);
        Ok(())
    }
}

fn evaluate(placeholder: &Placeholder, scope: &Scope<'_>) -> Result<Value, RenderError> {
    placeholder
        .field
        .get(scope)
        .map_err(|source| RenderError::Expression {
            tag: placeholder.tag.clone(),
            source,
        })
}

/// Truthiness used by sections.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(_) => true,
    }
}

/// Text form of a value: strings verbatim, `null` empty, the rest as JSON.
fn value_to_text(value: &Value) -> Cow<'_, str> {
    match value {
        Value::String(text) => Cow::Borrowed(text),
        Value::Null => Cow::Borrowed(""),
        other => Cow::Owned(other.to_string()),
    }
}

fn write_text(text: &str, linebreaks: bool, out: &mut String) {
    if !linebreaks || !text.contains('\n') {
        out.push_str(&partial_escape(text));
        return;
    }
    for (index, line) in text.split('\n').enumerate() {
        if index > 0 {
            out.push_str(LINE_BREAK);
        }
        let line = line.strip_suffix('\r').unwrap_or(line);
        out.push_str(&partial_escape(line));
    }
}
