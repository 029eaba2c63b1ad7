//! Conversion engine: render stored bytes as another representation.
//!
//! Given the stored bytes, the fragment's declared type and an optional
//! requested extension, produce the bytes to send and the Content-Type to send
//! them with. The allowed targets per source type are [`media::formats`].
//!
//! ```text
//! no extension              -> stored bytes, stored type
//! text/markdown -> html     -> rendered markup
//! text/html     -> txt      -> markup stripped
//! md/json       -> txt      -> same bytes, retagged text/plain
//! image/*       -> png|jpg|webp|gif -> decoded and re-encoded
//! ```

use std::borrow::Cow;
use std::io::Cursor;

use bytes::Bytes;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use pulldown_cmark::{Options, Parser};
use scraper::{ElementRef, Html, Node};

use crate::error::{FragmentError, Result};
use crate::media::{self, MediaType};

/// Bounds applied to stored images at write time.
pub const MAX_IMAGE_WIDTH: u32 = 1000;
pub const MAX_IMAGE_HEIGHT: u32 = 800;

/// Output of a conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Converted {
    pub data: Bytes,
    pub content_type: String,
}

impl Converted {
    fn new(data: impl Into<Bytes>, content_type: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            content_type: content_type.into(),
        }
    }
}

fn tagged(essence: &str) -> String {
    if essence.starts_with("text/") {
        format!("{essence}; charset=utf-8")
    } else {
        essence.to_string()
    }
}

/// Convert `data` (stored as `content_type`) to the type named by `extension`.
pub fn convert(data: Bytes, content_type: &str, extension: Option<&str>) -> Result<Converted> {
    let Some(extension) = extension else {
        return Ok(Converted::new(data, content_type));
    };

    let media = MediaType::parse(content_type)?;
    let source = media.essence();
    let target = media::mime_for_extension(extension)
        .filter(|target| media::formats(source).contains(target))
        .ok_or_else(|| FragmentError::UnsupportedConversion {
            from: source.to_string(),
            extension: extension.to_string(),
        })?;

    tracing::debug!(source, target, bytes = data.len(), "converting fragment");

    if source == target {
        return Ok(Converted::new(data, tagged(target)));
    }

    match (source, target) {
        ("text/markdown", "text/html") => {
            let html = render_markdown(&String::from_utf8_lossy(&data));
            Ok(Converted::new(html, tagged(target)))
        }
        ("text/html", "text/plain") => {
            let text = html_to_text(&String::from_utf8_lossy(&data));
            Ok(Converted::new(text, tagged(target)))
        }
        ("text/markdown" | "application/json", "text/plain") => {
            Ok(Converted::new(data, tagged(target)))
        }
        _ => {
            let (Some(from), Some(to)) = (image_format(source), image_format(target)) else {
                return Err(FragmentError::UnsupportedConversion {
                    from: source.to_string(),
                    extension: extension.to_string(),
                });
            };
            let image = decode(&data, from)?;
            let encoded = encode(&image, to)?;
            Ok(Converted::new(encoded, target))
        }
    }
}

/// Render CommonMark (plus tables and strikethrough) to HTML.
pub fn render_markdown(source: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);

    let mut html = String::with_capacity(source.len() * 3 / 2);
    pulldown_cmark::html::push_html(&mut html, Parser::new_ext(source, options));
    html
}

const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "blockquote", "br", "dd", "div", "dl", "dt", "figcaption",
    "figure", "footer", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "li", "main", "nav",
    "ol", "p", "pre", "section", "table", "td", "th", "tr", "ul",
];

// Elements whose content is never rendered as text.
const SKIPPED_TAGS: &[&str] = &["script", "style", "template", "noscript"];

/// Strip markup from an HTML document, keeping readable text.
///
/// The document is parsed with an HTML5 parser, so entities, quoted attributes
/// and bare `<` in text behave as a browser would treat them. Block-level
/// boundaries become line breaks, blank lines are dropped, whitespace runs
/// collapse and `<script>`/`<style>` bodies are skipped.
pub fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut out = String::with_capacity(html.len());
    collect_text(document.root_element(), &mut out);

    out.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    let name = element.value().name();
    if SKIPPED_TAGS.contains(&name) {
        return;
    }
    let block = BLOCK_TAGS.contains(&name);
    if block {
        break_line(out);
    }

    for child in element.children() {
        match child.value() {
            Node::Text(text) => push_text(out, text),
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(child) {
                    collect_text(child, out);
                }
            }
            _ => {}
        }
    }

    if block {
        break_line(out);
    }
}

fn push_text(out: &mut String, text: &str) {
    for c in text.chars() {
        if c.is_whitespace() {
            if !out.is_empty() && !out.ends_with(' ') && !out.ends_with('\n') {
                out.push(' ');
            }
        } else {
            out.push(c);
        }
    }
}

fn break_line(out: &mut String) {
    while out.ends_with(' ') {
        out.pop();
    }
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
}

fn image_format(essence: &str) -> Option<ImageFormat> {
    match essence {
        "image/png" => Some(ImageFormat::Png),
        "image/jpeg" => Some(ImageFormat::Jpeg),
        "image/webp" => Some(ImageFormat::WebP),
        "image/gif" => Some(ImageFormat::Gif),
        _ => None,
    }
}

fn decode(data: &[u8], format: ImageFormat) -> Result<DynamicImage> {
    image::load_from_memory_with_format(data, format)
        .map_err(|e| FragmentError::Conversion(format!("cannot decode {format:?} image: {e}")))
}

fn encode(image: &DynamicImage, format: ImageFormat) -> Result<Vec<u8>> {
    // JPEG has no alpha channel; the WebP and GIF encoders want 8-bit RGBA.
    let image: Cow<'_, DynamicImage> = match format {
        ImageFormat::Jpeg => Cow::Owned(DynamicImage::ImageRgb8(image.to_rgb8())),
        ImageFormat::WebP | ImageFormat::Gif => {
            Cow::Owned(DynamicImage::ImageRgba8(image.to_rgba8()))
        }
        _ => Cow::Borrowed(image),
    };

    let mut out = Cursor::new(Vec::new());
    image
        .write_to(&mut out, format)
        .map_err(|e| FragmentError::Conversion(format!("cannot encode {format:?} image: {e}")))?;
    Ok(out.into_inner())
}

/// Shrink an image payload to fit within [`MAX_IMAGE_WIDTH`]×[`MAX_IMAGE_HEIGHT`].
///
/// Non-image types and images already within bounds are returned untouched.
/// Undecodable image bytes are a validation failure.
pub fn normalize_image(content_type: &str, data: Bytes) -> Result<Bytes> {
    let media = MediaType::parse(content_type)?;
    let Some(format) = image_format(media.essence()) else {
        return Ok(data);
    };

    let image = image::load_from_memory_with_format(&data, format).map_err(|e| {
        FragmentError::Validation(format!("invalid {} data: {e}", media.essence()))
    })?;
    if image.width() <= MAX_IMAGE_WIDTH && image.height() <= MAX_IMAGE_HEIGHT {
        return Ok(data);
    }

    let resized = image.resize(MAX_IMAGE_WIDTH, MAX_IMAGE_HEIGHT, FilterType::Lanczos3);
    tracing::debug!(
        from = ?(image.width(), image.height()),
        to = ?(resized.width(), resized.height()),
        "resized image fragment"
    );
    Ok(Bytes::from(encode(&resized, format)?))
}
