//! Image-paragraph splitter.
//!
//! Cuts a fragment at every inline `<img>` element. Literal pieces become text
//! blocks that are forwarded unconverted; each image is attached to the block
//! that precedes it so a template can place images after their paragraph.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::entities::decode_html;

/// Inline image element.
static IMAGE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<img\b[^>]*>").expect("invalid image regex"));

/// Attribute inside an image element, single or double quoted. The name must
/// follow whitespace so `data-src` is not taken for `src`.
static ATTRIBUTE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(?:^|\s)(src|alt)\s*=\s*(?:"([^"]*)"|'([^']*)')"#)
        .expect("invalid attribute regex")
});

/// Reference to an image found in the markup.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ImageRef {
    /// Source path or identifier, as written.
    pub image: String,
    /// Decoded `alt` text.
    pub caption: String,
}

/// A block of literal markup followed by the images that trail it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ImageParagraph {
    pub text: String,
    pub images: Vec<ImageRef>,
}

/// Split markup into text blocks with attached images.
///
/// `None` and empty input give an empty sequence. An image that appears before
/// any text is hosted by a synthesized empty block.
pub fn split(markup: Option<&str>) -> Vec<ImageParagraph> {
    let Some(markup) = markup else {
        return Vec::new();
    };

    let mut tokens: Vec<ImageParagraph> = Vec::new();
    let mut last = 0;

    for found in IMAGE_PATTERN.find_iter(markup) {
        let Some(image) = parse_image(found.as_str()) else {
            continue;
        };

        push_text(&mut tokens, &markup[last..found.start()]);
        last = found.end();

        if tokens.is_empty() {
            tokens.push(ImageParagraph::default());
        }
        if let Some(host) = tokens.last_mut() {
            host.images.push(image);
        }
    }

    push_text(&mut tokens, &markup[last..]);
    tokens
}

fn push_text(tokens: &mut Vec<ImageParagraph>, text: &str) {
    if !text.is_empty() {
        tokens.push(ImageParagraph {
            text: text.to_owned(),
            images: Vec::new(),
        });
    }
}

/// Extract `src` and `alt` from an image element; `None` without a `src`.
fn parse_image(element: &str) -> Option<ImageRef> {
    let mut src = None;
    let mut alt = None;
    for caps in ATTRIBUTE_PATTERN.captures_iter(element) {
        let value = caps
            .get(2)
            .or_else(|| caps.get(3))
            .map_or("", |m| m.as_str());
        let slot = if caps[1].eq_ignore_ascii_case("src") {
            &mut src
        } else {
            &mut alt
        };
        if slot.is_none() {
            *slot = Some(value);
        }
    }

    Some(ImageRef {
        image: src?.to_owned(),
        caption: decode_html(alt.unwrap_or_default()).into_owned(),
    })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn image(src: &str, caption: &str) -> ImageRef {
        ImageRef {
            image: src.to_owned(),
            caption: caption.to_owned(),
        }
    }

    #[test]
    fn test_split_empty_and_absent() {
        assert!(split(None).is_empty());
        assert!(split(Some("")).is_empty());
    }

    #[test]
    fn test_split_text_only() {
        assert_eq!(
            split(Some("<p>plain</p>")),
            vec![ImageParagraph {
                text: "<p>plain</p>".to_owned(),
                images: Vec::new(),
            }]
        );
    }

    #[test]
    fn test_split_image_between_text() {
        assert_eq!(
            split(Some(r#"before<img src="x.png" alt="cap">after"#)),
            vec![
                ImageParagraph {
                    text: "before".to_owned(),
                    images: vec![image("x.png", "cap")],
                },
                ImageParagraph {
                    text: "after".to_owned(),
                    images: Vec::new(),
                },
            ]
        );
    }

    #[test]
    fn test_split_leading_image_gets_empty_host() {
        assert_eq!(
            split(Some(r#"<img src="a.png" alt="A"/>text"#)),
            vec![
                ImageParagraph {
                    text: String::new(),
                    images: vec![image("a.png", "A")],
                },
                ImageParagraph {
                    text: "text".to_owned(),
                    images: Vec::new(),
                },
            ]
        );
    }

    #[test]
    fn test_split_adjacent_images_share_host() {
        let tokens = split(Some(
            r#"intro<img src="1.png" alt="one"><img alt='two' src='2.png'>"#,
        ));
        assert_eq!(
            tokens,
            vec![ImageParagraph {
                text: "intro".to_owned(),
                images: vec![image("1.png", "one"), image("2.png", "two")],
            }]
        );
    }

    #[test]
    fn test_split_decodes_caption_entities() {
        let tokens = split(Some(r#"x<img src="c.png" alt="Caf&eacute; &amp; co">"#));
        assert_eq!(tokens[0].images, vec![image("c.png", "Caf\u{00e9} & co")]);
    }

    #[test]
    fn test_split_ignores_prefixed_attributes() {
        let tokens = split(Some(
            r#"x<img data-src="lazy.png" src="real.png" data-alt="no" alt="c">"#,
        ));
        assert_eq!(tokens[0].images, vec![image("real.png", "c")]);
    }

    #[test]
    fn test_split_missing_alt_gives_empty_caption() {
        let tokens = split(Some(r#"x<img src="c.png">"#));
        assert_eq!(tokens[0].images, vec![image("c.png", "")]);
    }

    #[test]
    fn test_split_keeps_image_without_src_as_text() {
        let markup = r#"a<img alt="nothing">b"#;
        assert_eq!(
            split(Some(markup)),
            vec![ImageParagraph {
                text: markup.to_owned(),
                images: Vec::new(),
            }]
        );
    }

    #[test]
    fn test_split_serializes_to_expected_shape() {
        let tokens = split(Some(r#"before<img src="x.png" alt="cap">"#));
        let json = serde_json::to_value(&tokens).unwrap();
        assert_eq!(
            json,
            serde_json::json!([
                {"text": "before", "images": [{"image": "x.png", "caption": "cap"}]}
            ])
        );
    }
}
