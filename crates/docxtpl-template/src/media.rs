//! Embedding images into the package.
//!
//! Each embedded image gets its own media part, a relationship in the rels
//! file of the part that references it, and an inline `w:drawing`.

use std::fmt::Write;

use quick_xml::escape::escape;

use crate::error::{BoxError, TemplateError};
use crate::package::{CONTENT_TYPES_PART, Package};

/// English Metric Units per pixel at 96 DPI.
pub const EMU_PER_PIXEL: u64 = 9525;

/// Relationship type for images.
const IMAGE_RELATIONSHIP: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";

/// Base for `wp:docPr` ids, kept clear of ids written by word processors.
const DOC_PR_ID_BASE: usize = 10_000;

/// Image bytes with their display size in pixels.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoadedImage {
    pub data: Vec<u8>,
    /// File extension without the dot, lowercase.
    pub extension: String,
    pub width: u32,
    pub height: u32,
}

/// Resolves the value of an image tag to image data.
pub trait ImageLoader: Send + Sync {
    /// Load the image named by a tag value.
    ///
    /// # Errors
    ///
    /// Returns an error when the image cannot be located or decoded.
    fn load(&self, value: &str) -> Result<LoadedImage, BoxError>;
}

#[derive(Debug)]
struct PendingImage {
    index: usize,
    image: LoadedImage,
}

/// Images embedded while rendering, waiting to be written to the package.
///
/// Numbering continues across parts so media names stay unique.
#[derive(Debug, Default)]
pub(crate) struct MediaCollector {
    next_index: usize,
    pending: Vec<PendingImage>,
}

impl MediaCollector {
    /// Queue an image and return the drawing markup that references it.
    pub(crate) fn embed(&mut self, image: LoadedImage, description: &str) -> String {
        self.next_index += 1;
        let index = self.next_index;
        let xml = drawing_xml(index, image.width, image.height, description);
        self.pending.push(PendingImage { index, image });
        xml
    }

    /// Write queued images for `part` into the package.
    pub(crate) fn flush(&mut self, package: &mut Package, part: &str) -> Result<(), TemplateError> {
        if self.pending.is_empty() {
            return Ok(());
        }

        let rels_part = rels_path(part);
        let mut rels = package
            .part_text(&rels_part)?
            .unwrap_or_else(empty_relationships);
        let mut types = package
            .part_text(CONTENT_TYPES_PART)?
            .ok_or_else(|| TemplateError::MissingPart(CONTENT_TYPES_PART.to_owned()))?;

        for PendingImage { index, image } in self.pending.drain(..) {
            let file_name = format!("docxtpl_image{index}.{}", image.extension);
            let relationship = format!(
                r#"<Relationship Id="{}" Type="{IMAGE_RELATIONSHIP}" Target="media/{file_name}"/>"#,
                relationship_id(index)
            );
            insert_before_close(&mut rels, "</Relationships>", &relationship);
            ensure_content_type(&mut types, &image.extension);
            package.set_part(&media_path(part, &file_name), image.data);
            tracing::debug!(part, index, "Embedded image");
        }

        package.set_part(&rels_part, rels);
        package.set_part(CONTENT_TYPES_PART, types);
        Ok(())
    }
}

fn relationship_id(index: usize) -> String {
    format!("rIdDocxtpl{index}")
}

/// `word/document.xml` -> `word/_rels/document.xml.rels`.
pub(crate) fn rels_path(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{dir}/_rels/{file}.rels"),
        None => format!("_rels/{part}.rels"),
    }
}

fn media_path(part: &str, file_name: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, _)) => format!("{dir}/media/{file_name}"),
        None => format!("media/{file_name}"),
    }
}

fn empty_relationships() -> String {
    concat!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
        "\n",
        r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"></Relationships>"#
    )
    .to_owned()
}

fn insert_before_close(xml: &mut String, close: &str, element: &str) {
    match xml.rfind(close) {
        Some(position) => xml.insert_str(position, element),
        None => xml.push_str(element),
    }
}

fn ensure_content_type(types: &mut String, extension: &str) {
    let declared = format!(r#"Extension="{extension}""#);
    if types.to_ascii_lowercase().contains(&declared) {
        return;
    }
    let default = format!(
        r#"<Default Extension="{extension}" ContentType="{}"/>"#,
        mime_type(extension)
    );
    insert_before_close(types, "</Types>", &default);
}

fn mime_type(extension: &str) -> &'static str {
    match extension {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "webp" => "image/webp",
        "tif" | "tiff" => "image/tiff",
        "svg" => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

/// Inline drawing for image `index`, sized in pixels.
fn drawing_xml(index: usize, width: u32, height: u32, description: &str) -> String {
    let cx = u64::from(width) * EMU_PER_PIXEL;
    let cy = u64::from(height) * EMU_PER_PIXEL;
    let id = DOC_PR_ID_BASE + index;
    let rel_id = relationship_id(index);
    let description = escape(description);

    let mut xml = String::with_capacity(1024);
    write!(
        xml,
        concat!(
            "<w:drawing>",
            r#"<wp:inline distT="0" distB="0" distL="0" distR="0" xmlns:wp="http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing">"#,
            r#"<wp:extent cx="{cx}" cy="{cy}"/>"#,
            r#"<wp:effectExtent l="0" t="0" r="0" b="0"/>"#,
            r#"<wp:docPr id="{id}" name="Picture {index}" descr="{description}"/>"#,
            "<wp:cNvGraphicFramePr>",
            r#"<a:graphicFrameLocks xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" noChangeAspect="1"/>"#,
            "</wp:cNvGraphicFramePr>",
            r#"<a:graphic xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main">"#,
            r#"<a:graphicData uri="http://schemas.openxmlformats.org/drawingml/2006/picture">"#,
            r#"<pic:pic xmlns:pic="http://schemas.openxmlformats.org/drawingml/2006/picture">"#,
            r#"<pic:nvPicPr><pic:cNvPr id="{id}" name="Picture {index}"/><pic:cNvPicPr/></pic:nvPicPr>"#,
            r#"<pic:blipFill><a:blip r:embed="{rel_id}" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"/>"#,
            "<a:stretch><a:fillRect/></a:stretch></pic:blipFill>",
            r#"<pic:spPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="{cx}" cy="{cy}"/></a:xfrm>"#,
            r#"<a:prstGeom prst="rect"><a:avLst/></a:prstGeom></pic:spPr>"#,
            "</pic:pic></a:graphicData></a:graphic></wp:inline></w:drawing>"
        ),
        cx = cx,
        cy = cy,
        id = id,
        index = index,
        description = description,
        rel_id = rel_id,
    )
    .unwrap();
    xml
}
