//! Filesystem image loader for `{%tag}` images.
//!
//! Tag values are paths relative to one image directory. Resolved paths must
//! stay inside that directory; symlinks and `..` are followed before the
//! check. Images wider than the configured maximum are scaled down, keeping
//! the aspect ratio.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//!
//! use docxtpl_images::{DEFAULT_MAX_WIDTH, FsImageLoader};
//! use docxtpl_template::TemplateEngine;
//!
//! let loader = FsImageLoader::new(Path::new("images"), DEFAULT_MAX_WIDTH)?;
//! let engine = TemplateEngine::default().with_image_loader(loader);
//! # Ok::<(), docxtpl_images::ImageError>(())
//! ```

use std::io::Cursor;
use std::path::{Path, PathBuf};

use docxtpl_template::{BoxError, ImageLoader, LoadedImage};
use image::ImageReader;

/// Default maximum display width in pixels.
pub const DEFAULT_MAX_WIDTH: u32 = 600;

/// Error loading an image from disk.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ImageError {
    /// The image directory does not exist or cannot be resolved.
    #[error("image directory {} cannot be read", path.display())]
    BaseDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The tag value resolves outside the image directory.
    #[error("images must be stored under folder {}", base.display())]
    OutsideBase { path: PathBuf, base: PathBuf },

    /// The image file cannot be read.
    #[error("image {} cannot be read", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not an image in a supported format.
    #[error("image {} has an unsupported format", path.display())]
    Format {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// The image reports a zero width or height.
    #[error("image {} is empty", path.display())]
    Empty { path: PathBuf },
}

/// Loads images from a base directory.
#[derive(Clone, Debug)]
pub struct FsImageLoader {
    base_dir: PathBuf,
    max_width: u32,
}

impl FsImageLoader {
    /// Loader rooted at `base_dir`, capping widths at `max_width` pixels.
    ///
    /// # Errors
    ///
    /// Returns [`ImageError::BaseDir`] when `base_dir` cannot be resolved.
    pub fn new(base_dir: &Path, max_width: u32) -> Result<Self, ImageError> {
        let base_dir = base_dir
            .canonicalize()
            .map_err(|source| ImageError::BaseDir {
                path: base_dir.to_path_buf(),
                source,
            })?;
        tracing::debug!(base_dir = %base_dir.display(), max_width, "Image loader ready");
        Ok(Self {
            base_dir,
            max_width: max_width.max(1),
        })
    }

    /// Canonical image directory.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Resolve a tag value to a file inside the image directory.
    fn resolve(&self, value: &str) -> Result<PathBuf, ImageError> {
        let candidate = self.base_dir.join(value);
        let path = candidate
            .canonicalize()
            .map_err(|source| ImageError::Io {
                path: candidate.clone(),
                source,
            })?;
        if !path.starts_with(&self.base_dir) {
            tracing::warn!(path = %path.display(), "Rejected image outside image directory");
            return Err(ImageError::OutsideBase {
                path,
                base: self.base_dir.clone(),
            });
        }
        Ok(path)
    }

    /// Read and measure the image named by `value`.
    ///
    /// # Errors
    ///
    /// Returns [`ImageError`] when the path escapes the image directory, the
    /// file cannot be read, or its format is not recognized.
    pub fn load_image(&self, value: &str) -> Result<LoadedImage, ImageError> {
        let path = self.resolve(value)?;
        let data = std::fs::read(&path).map_err(|source| ImageError::Io {
            path: path.clone(),
            source,
        })?;

        let format_error = |source| ImageError::Format {
            path: path.clone(),
            source,
        };
        let format = image::guess_format(&data).map_err(format_error)?;
        let (width, height) = ImageReader::with_format(Cursor::new(&data), format)
            .into_dimensions()
            .map_err(format_error)?;
        if width == 0 || height == 0 {
            return Err(ImageError::Empty { path });
        }

        let (width, height) = fit_width(width, height, self.max_width);
        let extension = format
            .extensions_str()
            .first()
            .copied()
            .unwrap_or("bin")
            .to_owned();
        tracing::debug!(path = %path.display(), width, height, "Loaded image");

        Ok(LoadedImage {
            data,
            extension,
            width,
            height,
        })
    }
}

impl ImageLoader for FsImageLoader {
    fn load(&self, value: &str) -> Result<LoadedImage, BoxError> {
        Ok(self.load_image(value)?)
    }
}

/// Scale `(width, height)` down to at most `max_width` wide.
fn fit_width(width: u32, height: u32, max_width: u32) -> (u32, u32) {
    if width <= max_width {
        return (width, height);
    }
    let scaled = u64::from(height) * u64::from(max_width) / u64::from(width);
    (max_width, u32::try_from(scaled).unwrap_or(u32::MAX))
}

#[cfg(test)]
mod tests {
    use image::{ImageFormat, RgbImage};
    use pretty_assertions::assert_eq;

    use super::*;

    fn write_png(dir: &Path, name: &str, width: u32, height: u32) {
        RgbImage::new(width, height)
            .save_with_format(dir.join(name), ImageFormat::Png)
            .unwrap();
    }

    #[test]
    fn test_fit_width() {
        assert_eq!(fit_width(300, 200, 600), (300, 200));
        assert_eq!(fit_width(600, 200, 600), (600, 200));
        assert_eq!(fit_width(1200, 301, 600), (600, 150));
        assert_eq!(fit_width(1000, 333, 600), (600, 199));
    }

    #[test]
    fn test_load_png() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "logo.png", 20, 10);

        let loader = FsImageLoader::new(dir.path(), DEFAULT_MAX_WIDTH).unwrap();
        let image = loader.load_image("logo.png").unwrap();

        assert_eq!(image.extension, "png");
        assert_eq!((image.width, image.height), (20, 10));
        assert!(image.data.starts_with(b"\x89PNG"));
    }

    #[test]
    fn test_wide_image_is_capped() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "wide.png", 1200, 300);

        let loader = FsImageLoader::new(dir.path(), 600).unwrap();
        let image = loader.load("wide.png").unwrap();
        assert_eq!((image.width, image.height), (600, 150));
    }

    #[test]
    fn test_subdirectory_is_allowed() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        write_png(&dir.path().join("sub"), "a.png", 1, 1);

        let loader = FsImageLoader::new(dir.path(), DEFAULT_MAX_WIDTH).unwrap();
        assert!(loader.load_image("sub/../sub/a.png").is_ok());
    }

    #[test]
    fn test_rejects_path_outside_base() {
        let dir = tempfile::tempdir().unwrap();
        let images = dir.path().join("images");
        std::fs::create_dir(&images).unwrap();
        write_png(dir.path(), "secret.png", 1, 1);

        let loader = FsImageLoader::new(&images, DEFAULT_MAX_WIDTH).unwrap();
        let err = loader.load_image("../secret.png").unwrap_err();
        assert!(matches!(err, ImageError::OutsideBase { .. }));
        assert!(err.to_string().starts_with("images must be stored under folder"));

        let absolute = dir.path().join("secret.png");
        let err = loader.load_image(absolute.to_str().unwrap()).unwrap_err();
        assert!(matches!(err, ImageError::OutsideBase { .. }));
    }

    #[test]
    fn test_missing_and_invalid_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.txt"), "not an image").unwrap();

        let loader = FsImageLoader::new(dir.path(), DEFAULT_MAX_WIDTH).unwrap();
        assert!(matches!(
            loader.load_image("absent.png").unwrap_err(),
            ImageError::Io { .. }
        ));
        assert!(matches!(
            loader.load_image("notes.txt").unwrap_err(),
            ImageError::Format { .. }
        ));
    }

    #[test]
    fn test_missing_base_dir() {
        let dir = tempfile::tempdir().unwrap();
        let err = FsImageLoader::new(&dir.path().join("nope"), DEFAULT_MAX_WIDTH).unwrap_err();
        assert!(matches!(err, ImageError::BaseDir { .. }));
    }
}
