//! Configuration management for docxtpl.
//!
//! Parses `docxtpl.toml` configuration files with serde and provides
//! auto-discovery of config files in parent directories.
//!
//! Settings come from three layers, later ones winning:
//! 1. the config file (or built-in defaults)
//! 2. the `config` object embedded in the render data, see [`DataConfig`]
//! 3. command-line overrides, see [`CliSettings`]
//!
//! ## Environment Variable Expansion
//!
//! `images.dir` supports environment variable expansion:
//!
//! - `${VAR}` - expands to the value of VAR, errors if unset
//! - `${VAR:-default}` - expands to VAR if set, otherwise uses default

mod expand;

use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "docxtpl.toml";

/// Key of the settings object inside the render data.
pub const DATA_CONFIG_KEY: &str = "config";

/// Module names in the data `config.modules` list that enable images.
const IMAGE_MODULES: &[&str] = &["image", "docxtemplater-image-module-free"];

const DEFAULT_HTML_SUFFIX: &str = "_html";
const DEFAULT_MAX_WIDTH: u32 = 600;

/// CLI settings that override configuration file and data values.
///
/// All fields are optional. Only non-None values override the loaded config.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Image directory; setting it enables images.
    pub image_dir: Option<PathBuf>,
    /// Override image-paragraph data preparation.
    pub split_images: Option<bool>,
}

/// Application configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Rendering options.
    pub render: RenderConfig,
    /// Image configuration (paths are relative strings from TOML).
    images: ImagesConfigRaw,

    /// Resolved image configuration (set after loading).
    #[serde(skip)]
    pub images_resolved: ImagesConfig,
    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self::default_with_base(Path::new("."))
    }
}

/// Rendering configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Repeat whole paragraphs for sections whose tags stand alone.
    pub paragraph_loop: bool,
    /// Turn newlines in values into line breaks.
    pub linebreaks: bool,
    /// Suffix marking HTML fields in the data.
    pub html_suffix: String,
    /// Split HTML fields into image paragraphs before rendering.
    pub split_images: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            paragraph_loop: true,
            linebreaks: true,
            html_suffix: DEFAULT_HTML_SUFFIX.to_owned(),
            split_images: false,
        }
    }
}

/// Raw image configuration as parsed from TOML (paths as strings).
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ImagesConfigRaw {
    enabled: Option<bool>,
    dir: Option<String>,
    max_width: Option<u32>,
}

/// Resolved image configuration with absolute paths.
#[derive(Debug, PartialEq, Eq)]
pub struct ImagesConfig {
    /// Whether `{%tag}` images are rendered.
    pub enabled: bool,
    /// Directory image paths are resolved against.
    pub dir: PathBuf,
    /// Maximum display width in pixels.
    pub max_width: u32,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            dir: PathBuf::from("."),
            max_width: DEFAULT_MAX_WIDTH,
        }
    }
}

/// Settings embedded in the render data under the `config` key.
///
/// ```json
/// {"config": {"modules": ["image"], "imageDir": "img", "splitImages": true}}
/// ```
#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct DataConfig {
    /// Enabled modules; `image` turns on images.
    pub modules: Vec<String>,
    /// Image directory, relative to the working directory.
    pub image_dir: Option<String>,
    /// Split HTML fields into image paragraphs.
    pub split_images: Option<bool>,
    /// Suffix marking HTML fields.
    pub html_suffix: Option<String>,
}

impl DataConfig {
    /// Read the `config` object of the render data; absent means empty.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Data` if the object has the wrong shape.
    pub fn from_data(data: &Value) -> Result<Self, ConfigError> {
        match data.get(DATA_CONFIG_KEY) {
            None | Some(Value::Null) => Ok(Self::default()),
            Some(config) => Ok(Self::deserialize(config)?),
        }
    }

    /// Whether the module list enables images.
    pub fn images_enabled(&self) -> bool {
        self.modules
            .iter()
            .any(|module| IMAGE_MODULES.contains(&module.as_str()))
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Malformed `config` object in the render data.
    #[error("Invalid data config: {0}")]
    Data(#[from] serde_json::Error),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
    /// Environment variable error during expansion.
    #[error("Environment variable error in {field}: {message}")]
    EnvVar {
        /// Config field path (e.g., "`images.dir`").
        field: String,
        /// Error message (e.g., "${`IMAGE_ROOT`} not set").
        message: String,
    },
}

/// Require a string field to be non-empty.
fn require_non_empty(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

impl Config {
    /// Load configuration from file, then apply data and CLI settings.
    ///
    /// If `config_path` is provided, loads from that file.
    /// Otherwise, searches for `docxtpl.toml` in current directory and parents.
    /// Data settings resolve paths against the current directory.
    ///
    /// # Errors
    ///
    /// Returns error if explicit `config_path` doesn't exist, parsing fails,
    /// or the merged configuration is invalid.
    pub fn load(
        config_path: Option<&Path>,
        data_config: Option<&DataConfig>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path)?
        } else if let Some(discovered) = Self::discover_config() {
            Self::load_from_file(&discovered)?
        } else {
            Self::default_with_cwd()
        };

        if let Some(data) = data_config {
            let cwd = std::env::current_dir().unwrap_or_default();
            config.apply_data_config(data, &cwd);
        }
        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings);
        }

        config.validate()?;
        tracing::debug!(
            config_path = ?config.config_path,
            images = config.images_resolved.enabled,
            split_images = config.render.split_images,
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Apply settings from the render data; relative paths resolve against `base`.
    fn apply_data_config(&mut self, data: &DataConfig, base: &Path) {
        if data.images_enabled() {
            self.images_resolved.enabled = true;
            self.images_resolved.dir = base.join(data.image_dir.as_deref().unwrap_or_default());
        }
        if let Some(split_images) = data.split_images {
            self.render.split_images = split_images;
        }
        if let Some(suffix) = &data.html_suffix {
            self.render.html_suffix.clone_from(suffix);
        }
    }

    /// Apply CLI settings to the configuration.
    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(image_dir) = &settings.image_dir {
            self.images_resolved.enabled = true;
            self.images_resolved.dir.clone_from(image_dir);
        }
        if let Some(split_images) = settings.split_images {
            self.render.split_images = split_images;
        }
    }

    /// Search for config file in current directory and parents.
    fn discover_config() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.exists() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    /// Create default config with paths relative to current working directory.
    fn default_with_cwd() -> Self {
        let cwd = std::env::current_dir().unwrap_or_default();
        Self::default_with_base(&cwd)
    }

    /// Create default config with paths relative to given base directory.
    fn default_with_base(base: &Path) -> Self {
        Self {
            render: RenderConfig::default(),
            images: ImagesConfigRaw::default(),
            images_resolved: ImagesConfig {
                dir: base.to_path_buf(),
                ..ImagesConfig::default()
            },
            config_path: None,
        }
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;

        // Expand environment variables before path resolution
        config.expand_env_vars()?;

        let config_dir = path.parent().unwrap_or(Path::new("."));
        config.resolve_paths(config_dir);
        config.config_path = Some(path.to_path_buf());

        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_non_empty(&self.render.html_suffix, "render.html_suffix")?;
        if self.images_resolved.max_width == 0 {
            return Err(ConfigError::Validation(
                "images.max_width must be greater than 0".to_owned(),
            ));
        }
        Ok(())
    }

    /// Expand environment variable references in configuration strings.
    fn expand_env_vars(&mut self) -> Result<(), ConfigError> {
        if let Some(dir) = &self.images.dir {
            self.images.dir = Some(expand::expand_env(dir, "images.dir")?);
        }
        Ok(())
    }

    /// Resolve relative paths to absolute paths based on config directory.
    fn resolve_paths(&mut self, config_dir: &Path) {
        self.images_resolved = ImagesConfig {
            enabled: self.images.enabled.unwrap_or(false),
            dir: config_dir.join(self.images.dir.as_deref().unwrap_or_default()),
            max_width: self.images.max_width.unwrap_or(DEFAULT_MAX_WIDTH),
        };
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default_with_base(Path::new("/test"));
        assert!(config.render.paragraph_loop);
        assert!(config.render.linebreaks);
        assert_eq!(config.render.html_suffix, "_html");
        assert!(!config.render.split_images);
        assert_eq!(
            config.images_resolved,
            ImagesConfig {
                enabled: false,
                dir: PathBuf::from("/test"),
                max_width: 600,
            }
        );
    }

    #[test]
    fn test_parse_minimal_config() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.render.html_suffix, "_html");
        assert!(config.render.paragraph_loop);
    }

    #[test]
    fn test_parse_render_config() {
        let toml = r#"
[render]
paragraph_loop = false
linebreaks = false
html_suffix = "Html"
split_images = true
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert!(!config.render.paragraph_loop);
        assert!(!config.render.linebreaks);
        assert_eq!(config.render.html_suffix, "Html");
        assert!(config.render.split_images);
    }

    #[test]
    fn test_resolve_paths() {
        let toml = r#"
[images]
enabled = true
dir = "assets"
max_width = 400
"#;
        let mut config: Config = toml::from_str(toml).unwrap();
        config.resolve_paths(Path::new("/project"));
        assert_eq!(
            config.images_resolved,
            ImagesConfig {
                enabled: true,
                dir: PathBuf::from("/project/assets"),
                max_width: 400,
            }
        );
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        std::fs::write(&path, "[images]\nenabled = true\ndir = \"img\"\n").unwrap();

        let config = Config::load(Some(&path), None, None).unwrap();
        assert_eq!(config.config_path.as_deref(), Some(path.as_path()));
        assert!(config.images_resolved.enabled);
        assert_eq!(config.images_resolved.dir, dir.path().join("img"));
    }

    #[test]
    fn test_load_missing_explicit_file() {
        let err = Config::load(Some(Path::new("/nonexistent/docxtpl.toml")), None, None).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn test_load_rejects_invalid_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        std::fs::write(&path, "[render\n").unwrap();
        assert!(matches!(
            Config::load(Some(&path), None, None).unwrap_err(),
            ConfigError::Parse(_)
        ));
    }

    #[test]
    fn test_data_config_parse() {
        let data = json!({
            "config": {
                "modules": ["docxtemplater-image-module-free"],
                "imageDir": "pictures",
                "splitImages": true,
                "htmlSuffix": "Html",
            },
            "title": "x",
        });
        let config = DataConfig::from_data(&data).unwrap();
        assert!(config.images_enabled());
        assert_eq!(config.image_dir.as_deref(), Some("pictures"));
        assert_eq!(config.split_images, Some(true));
        assert_eq!(config.html_suffix.as_deref(), Some("Html"));
    }

    #[test]
    fn test_data_config_absent() {
        assert_eq!(
            DataConfig::from_data(&json!({"title": "x"})).unwrap(),
            DataConfig::default()
        );
        assert!(!DataConfig::default().images_enabled());
    }

    #[test]
    fn test_data_config_wrong_shape() {
        let err = DataConfig::from_data(&json!({"config": {"modules": "image"}})).unwrap_err();
        assert!(matches!(err, ConfigError::Data(_)));
    }

    #[test]
    fn test_apply_data_config() {
        let mut config = Config::default_with_base(Path::new("/test"));
        let data = DataConfig {
            modules: vec!["image".to_owned()],
            image_dir: Some("img".to_owned()),
            split_images: Some(true),
            html_suffix: Some("Rich".to_owned()),
        };
        config.apply_data_config(&data, Path::new("/work"));

        assert!(config.images_resolved.enabled);
        assert_eq!(config.images_resolved.dir, PathBuf::from("/work/img"));
        assert!(config.render.split_images);
        assert_eq!(config.render.html_suffix, "Rich");
    }

    #[test]
    fn test_data_image_dir_without_module_is_ignored() {
        let mut config = Config::default_with_base(Path::new("/test"));
        let data = DataConfig {
            image_dir: Some("img".to_owned()),
            ..DataConfig::default()
        };
        config.apply_data_config(&data, Path::new("/work"));
        assert!(!config.images_resolved.enabled);
        assert_eq!(config.images_resolved.dir, PathBuf::from("/test"));
    }

    #[test]
    fn test_cli_settings_override_data() {
        let mut config = Config::default_with_base(Path::new("/test"));
        config.apply_data_config(
            &DataConfig {
                modules: vec!["image".to_owned()],
                image_dir: Some("from-data".to_owned()),
                split_images: Some(true),
                ..DataConfig::default()
            },
            Path::new("/work"),
        );
        config.apply_cli_settings(&CliSettings {
            image_dir: Some(PathBuf::from("/cli/images")),
            split_images: Some(false),
        });

        assert_eq!(config.images_resolved.dir, PathBuf::from("/cli/images"));
        assert!(!config.render.split_images);
    }

    #[test]
    fn test_apply_cli_settings_empty() {
        let mut config = Config::default_with_base(Path::new("/test"));
        config.apply_cli_settings(&CliSettings::default());
        assert!(!config.images_resolved.enabled);
        assert!(!config.render.split_images);
    }

    #[test]
    fn test_expand_env_vars_images_dir() {
        // SAFETY: test runs single-threaded per test function
        unsafe {
            std::env::set_var("DOCXTPL_TEST_IMAGE_ROOT", "/srv/images");
        }

        let toml = r#"
[images]
dir = "${DOCXTPL_TEST_IMAGE_ROOT}/logos"
"#;
        let mut config: Config = toml::from_str(toml).unwrap();
        config.expand_env_vars().unwrap();
        config.resolve_paths(Path::new("/project"));

        assert_eq!(config.images_resolved.dir, PathBuf::from("/srv/images/logos"));

        unsafe {
            std::env::remove_var("DOCXTPL_TEST_IMAGE_ROOT");
        }
    }

    #[test]
    fn test_validate_default_config_passes() {
        assert!(Config::default_with_base(Path::new("/test")).validate().is_ok());
    }

    #[test]
    fn test_validate_empty_suffix() {
        let mut config = Config::default_with_base(Path::new("/test"));
        config.render.html_suffix = String::new();
        let err = config.validate().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Configuration error: render.html_suffix cannot be empty"
        );
    }

    #[test]
    fn test_validate_zero_max_width() {
        let mut config = Config::default_with_base(Path::new("/test"));
        config.images_resolved.max_width = 0;
        assert!(matches!(
            config.validate().unwrap_err(),
            ConfigError::Validation(_)
        ));
    }
}
