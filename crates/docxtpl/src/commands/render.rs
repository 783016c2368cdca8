//! `docxtpl` render command implementation.

use std::path::{Path, PathBuf};

use clap::Args;
use docxtpl_config::{CliSettings, Config, DataConfig};
use docxtpl_images::FsImageLoader;
use docxtpl_template::{Package, TemplateEngine, TemplateOptions, prepare_image_paragraphs};
use serde_json::Value;

use crate::error::CliError;
use crate::output::Output;

/// Template file extension accepted by the renderer.
const TEMPLATE_EXTENSION: &str = "docx";

/// Arguments for rendering a template.
#[derive(Args)]
pub(crate) struct RenderArgs {
    /// Template document (.docx).
    template: PathBuf,

    /// JSON data file.
    data: PathBuf,

    /// Where to write the rendered document.
    output: PathBuf,

    /// Path to configuration file (default: auto-discover docxtpl.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory images are loaded from; enables `{%tag}` images.
    #[arg(long, env = "DOCXTPL_IMAGE_DIR")]
    image_dir: Option<PathBuf>,

    /// Split HTML fields into image paragraphs before rendering.
    #[arg(long)]
    split_images: bool,

    /// Enable verbose output.
    #[arg(short, long)]
    pub verbose: bool,
}

impl RenderArgs {
    /// Execute the render command.
    ///
    /// # Errors
    ///
    /// Returns an error if the inputs cannot be read, configuration is
    /// invalid, the template has errors, or the output cannot be written.
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let output = Output::new();
        check_template(&self.template)?;

        let mut data: Value = serde_json::from_str(&std::fs::read_to_string(&self.data)?)?;
        let data_config = DataConfig::from_data(&data)?;

        let cli_settings = CliSettings {
            image_dir: self.image_dir,
            split_images: self.split_images.then_some(true),
        };
        let config = Config::load(self.config.as_deref(), Some(&data_config), Some(&cli_settings))?;

        if config.render.split_images {
            data = prepare_image_paragraphs(data, &config.render.html_suffix);
        }

        let mut package = Package::open(&self.template)?;
        build_engine(&config)?.render(&mut package, &data)?;
        package.save(&self.output)?;

        tracing::info!(
            template = %self.template.display(),
            output = %self.output.display(),
            "Rendered document"
        );
        output.success(&format!("Wrote {}", self.output.display()));
        Ok(())
    }
}

/// Build a template engine from configuration.
fn build_engine(config: &Config) -> Result<TemplateEngine, CliError> {
    let engine = TemplateEngine::default().with_options(TemplateOptions {
        paragraph_loop: config.render.paragraph_loop,
        linebreaks: config.render.linebreaks,
    });
    if !config.images_resolved.enabled {
        return Ok(engine);
    }
    let loader = FsImageLoader::new(
        &config.images_resolved.dir,
        config.images_resolved.max_width,
    )?;
    Ok(engine.with_image_loader(loader))
}

/// Only WordprocessingML templates are supported.
fn check_template(path: &Path) -> Result<(), CliError> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some(TEMPLATE_EXTENSION) => Ok(()),
        Some(other) => Err(CliError::Validation(format!(
            "unsupported template type `.{other}`, expected a .docx file"
        ))),
        None => Err(CliError::Validation(format!(
            "template {} has no extension, expected a .docx file",
            path.display()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use docxtpl_template::{CONTENT_TYPES_PART, DOCUMENT_PART};
    use pretty_assertions::assert_eq;

    use super::*;

    fn write_template(path: &Path, body: &str) {
        let document = format!(
            r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{body}</w:body></w:document>"#
        );
        Package::from_parts([
            (
                CONTENT_TYPES_PART.to_owned(),
                r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"></Types>"#
                    .to_owned(),
            ),
            (DOCUMENT_PART.to_owned(), document),
        ])
        .save(path)
        .unwrap();
    }

    fn args(dir: &Path, template: &str) -> RenderArgs {
        let config = dir.join("docxtpl.toml");
        std::fs::write(&config, "").unwrap();
        RenderArgs {
            template: dir.join(template),
            data: dir.join("data.json"),
            output: dir.join("out.docx"),
            config: Some(config),
            image_dir: None,
            split_images: false,
            verbose: false,
        }
    }

    #[test]
    fn test_check_template() {
        assert!(check_template(Path::new("a.docx")).is_ok());
        assert!(check_template(Path::new("A.DOCX")).is_ok());

        let err = check_template(Path::new("slides.pptx")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "unsupported template type `.pptx`, expected a .docx file"
        );
        assert!(matches!(
            check_template(Path::new("template")).unwrap_err(),
            CliError::Validation(_)
        ));
    }

    #[test]
    fn test_execute_renders_document() {
        let dir = tempfile::tempdir().unwrap();
        write_template(
            &dir.path().join("in.docx"),
            "<w:p><w:r><w:t>Hello {name}</w:t></w:r></w:p>",
        );
        std::fs::write(dir.path().join("data.json"), r#"{"name": "World"}"#).unwrap();

        args(dir.path(), "in.docx").execute().unwrap();

        let rendered = Package::open(&dir.path().join("out.docx")).unwrap();
        let xml = rendered.part_text(DOCUMENT_PART).unwrap().unwrap();
        assert!(xml.contains("Hello World"));
    }

    #[test]
    fn test_execute_splits_images_from_data_config() {
        let dir = tempfile::tempdir().unwrap();
        write_template(
            &dir.path().join("in.docx"),
            concat!(
                "<w:p><w:r><w:t>{#body_html}</w:t></w:r></w:p>",
                "<w:p><w:r><w:t>{text}</w:t></w:r></w:p>",
                "<w:p><w:r><w:t>{/body_html}</w:t></w:r></w:p>",
            ),
        );
        std::fs::write(
            dir.path().join("data.json"),
            r#"{"config": {"splitImages": true}, "body_html": "one<img src='a.png'>two"}"#,
        )
        .unwrap();

        args(dir.path(), "in.docx").execute().unwrap();

        let rendered = Package::open(&dir.path().join("out.docx")).unwrap();
        let xml = rendered.part_text(DOCUMENT_PART).unwrap().unwrap();
        assert!(xml.contains(">one<"));
        assert!(xml.contains(">two<"));
    }

    #[test]
    fn test_template_error_has_report() {
        let dir = tempfile::tempdir().unwrap();
        write_template(
            &dir.path().join("in.docx"),
            "<w:p><w:r><w:t>{#items}</w:t></w:r></w:p>",
        );
        std::fs::write(dir.path().join("data.json"), "{}").unwrap();

        let err = args(dir.path(), "in.docx").execute().unwrap_err();
        let report: Value = serde_json::from_str(&err.report().unwrap()).unwrap();
        assert_eq!(report["error"]["name"], "TemplateError");
        assert!(!dir.path().join("out.docx").exists());
    }

    #[test]
    fn test_invalid_data_file() {
        let dir = tempfile::tempdir().unwrap();
        write_template(&dir.path().join("in.docx"), "<w:p/>");
        std::fs::write(dir.path().join("data.json"), "{not json").unwrap();

        let err = args(dir.path(), "in.docx").execute().unwrap_err();
        assert!(matches!(err, CliError::Json(_)));
        assert!(err.report().is_none());
    }

    #[test]
    fn test_missing_image_dir() {
        let dir = tempfile::tempdir().unwrap();
        write_template(&dir.path().join("in.docx"), "<w:p/>");
        std::fs::write(dir.path().join("data.json"), "{}").unwrap();

        let mut args = args(dir.path(), "in.docx");
        args.image_dir = Some(dir.path().join("missing"));
        assert!(matches!(args.execute().unwrap_err(), CliError::Image(_)));
    }
}
