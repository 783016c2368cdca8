//! In-memory OOXML package.
//!
//! The whole archive is read into memory, parts are replaced in place and the
//! archive is written back with DEFLATE compression. Entry order is preserved
//! so `[Content_Types].xml` stays first.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, Write};
use std::path::Path;

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::TemplateError;

/// Main document part of a WordprocessingML package.
pub const DOCUMENT_PART: &str = "word/document.xml";
/// Content types part.
pub const CONTENT_TYPES_PART: &str = "[Content_Types].xml";

#[derive(Clone, Debug)]
struct Entry {
    name: String,
    data: Vec<u8>,
}

/// DOCX package held in memory.
#[derive(Clone, Debug, Default)]
pub struct Package {
    entries: Vec<Entry>,
}

impl Package {
    /// Read a package from disk.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError`] when the file cannot be read or is not a ZIP archive.
    pub fn open(path: &Path) -> Result<Self, TemplateError> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    /// Read a package from any seekable source.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError`] when the source is not a readable ZIP archive.
    pub fn from_reader<R: Read + Seek>(reader: R) -> Result<Self, TemplateError> {
        let mut archive = ZipArchive::new(reader)?;
        let mut entries = Vec::with_capacity(archive.len());

        for index in 0..archive.len() {
            let mut file = archive.by_index(index)?;
            if file.is_dir() {
                continue;
            }
            let mut data = Vec::with_capacity(usize::try_from(file.size()).unwrap_or_default());
            file.read_to_end(&mut data)?;
            entries.push(Entry {
                name: file.name().to_owned(),
                data,
            });
        }

        tracing::debug!(entries = entries.len(), "Read template package");
        Ok(Self { entries })
    }

    /// Build a package from named parts, in order.
    pub fn from_parts<I, N, D>(parts: I) -> Self
    where
        I: IntoIterator<Item = (N, D)>,
        N: Into<String>,
        D: Into<Vec<u8>>,
    {
        Self {
            entries: parts
                .into_iter()
                .map(|(name, data)| Entry {
                    name: name.into(),
                    data: data.into(),
                })
                .collect(),
        }
    }

    /// Raw bytes of a part.
    pub fn part(&self, name: &str) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| entry.data.as_slice())
    }

    /// Part decoded as UTF-8 text.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::Utf8`] when the part is not valid UTF-8.
    pub fn part_text(&self, name: &str) -> Result<Option<String>, TemplateError> {
        self.part(name)
            .map(|data| {
                String::from_utf8(data.to_vec()).map_err(|source| TemplateError::Utf8 {
                    part: name.to_owned(),
                    source,
                })
            })
            .transpose()
    }

    /// Replace a part, or append it when absent.
    pub fn set_part(&mut self, name: &str, data: impl Into<Vec<u8>>) {
        let data = data.into();
        match self.entries.iter_mut().find(|entry| entry.name == name) {
            Some(entry) => entry.data = data,
            None => self.entries.push(Entry {
                name: name.to_owned(),
                data,
            }),
        }
    }

    /// Names of all parts, in archive order.
    pub fn part_names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.name.as_str())
    }

    /// Parts that may contain template tags: the main document first, then
    /// headers and footers in archive order.
    pub fn template_parts(&self) -> Vec<String> {
        let mut parts = Vec::new();
        if self.part(DOCUMENT_PART).is_some() {
            parts.push(DOCUMENT_PART.to_owned());
        }
        parts.extend(
            self.part_names()
                .filter(|name| is_header_or_footer(name))
                .map(str::to_owned),
        );
        parts
    }

    /// Write the package as a DEFLATE-compressed ZIP archive.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError`] when writing fails.
    pub fn write_to<W: Write + Seek>(&self, writer: W) -> Result<W, TemplateError> {
        let mut zip = ZipWriter::new(writer);
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        for entry in &self.entries {
            zip.start_file(entry.name.as_str(), options)?;
            zip.write_all(&entry.data)?;
        }
        Ok(zip.finish()?)
    }

    /// Write the package to disk.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError`] when the file cannot be created or written.
    pub fn save(&self, path: &Path) -> Result<(), TemplateError> {
        let file = File::create(path)?;
        let mut writer = self.write_to(BufWriter::new(file))?;
        writer.flush()?;
        tracing::debug!(path = %path.display(), "Saved package");
        Ok(())
    }
}

fn is_header_or_footer(name: &str) -> bool {
    let Some(file) = name.strip_prefix("word/") else {
        return false;
    };
    let Some(stem) = file.strip_suffix(".xml") else {
        return false;
    };
    !stem.contains('/') && (stem.starts_with("header") || stem.starts_with("footer"))
}
