//! HTML text extraction
//!
//! Visible text is collected from the parsed tree with block elements on their
//! own lines. `<img>` sources are returned alongside so the caller can OCR them
//! when the text is too thin.

use base64::Engine;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::documents::EmbeddedImage;

const SKIP_TAGS: &[&str] = &["head", "script", "style", "noscript", "template"];

const BLOCK_TAGS: &[&str] = &[
    "p", "div", "li", "ul", "ol", "tr", "table", "section", "article", "header", "footer",
    "main", "nav", "aside", "blockquote", "pre", "h1", "h2", "h3", "h4", "h5", "h6", "dt", "dd",
];

#[derive(Debug, Default)]
pub struct HtmlContent {
    pub text: String,
    /// Raw `src` attribute values in document order
    pub image_sources: Vec<String>,
}

/// Where an `<img>` can be read from.
#[derive(Debug)]
pub enum ImageSource {
    Inline(EmbeddedImage),
    Remote { url: Url, extension: String },
}

pub fn parse(html: &str) -> HtmlContent {
    let document = Html::parse_document(html);

    let mut raw = String::new();
    collect_text(document.root_element(), &mut raw);

    let image_sources = match Selector::parse("img[src]") {
        Ok(selector) => document
            .select(&selector)
            .filter_map(|img| img.value().attr("src"))
            .map(|src| src.trim().to_string())
            .filter(|src| !src.is_empty())
            .collect(),
        Err(_) => Vec::new(),
    };

    HtmlContent {
        text: clean_lines(&raw),
        image_sources,
    }
}

fn collect_text(element: ElementRef, out: &mut String) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            push_collapsed(out, text);
        } else if let Some(el) = child.value().as_element() {
            let tag = el.name();
            if SKIP_TAGS.contains(&tag) {
                continue;
            }
            if tag == "br" {
                out.push('\n');
                continue;
            }
            if let Some(child_element) = ElementRef::wrap(child) {
                let block = BLOCK_TAGS.contains(&tag);
                if block {
                    out.push('\n');
                }
                collect_text(child_element, out);
                if block {
                    out.push('\n');
                } else if matches!(tag, "td" | "th") {
                    out.push(' ');
                }
            }
        }
    }
}

// Whitespace inside text nodes is insignificant in HTML
fn push_collapsed(out: &mut String, text: &str) {
    for c in text.chars() {
        if c.is_whitespace() {
            if !out.ends_with(|last: char| last.is_whitespace()) && !out.is_empty() {
                out.push(' ');
            }
        } else {
            out.push(c);
        }
    }
}

fn clean_lines(raw: &str) -> String {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Resolve an `<img src>` against the page URL. Returns `None` for sources
/// that can't be OCR'd (non-raster data URIs, unsupported schemes).
pub fn resolve_image_source(src: &str, base: &Url) -> Option<ImageSource> {
    if let Some(data) = src.strip_prefix("data:") {
        return decode_data_uri(data).map(ImageSource::Inline);
    }

    let url = base.join(src).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }

    let extension = std::path::Path::new(url.path())
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
        .unwrap_or_else(|| "img".to_string());

    Some(ImageSource::Remote { url, extension })
}

fn decode_data_uri(data: &str) -> Option<EmbeddedImage> {
    let (meta, payload) = data.split_once(',')?;
    let mime_type = meta.strip_suffix(";base64")?;
    let extension = match mime_type.to_lowercase().as_str() {
        "image/png" => "png",
        "image/jpeg" | "image/jpg" => "jpg",
        "image/gif" => "gif",
        "image/bmp" => "bmp",
        "image/tiff" => "tiff",
        "image/webp" => "webp",
        _ => return None,
    };

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .ok()?;

    Some(EmbeddedImage {
        bytes,
        extension: extension.to_string(),
    })
}
