//! Document retrieval and text extraction
//!
//! - `fetch` - downloads the document named by the request
//! - `extractor` - dispatches on extension and applies the OCR fallback
//! - `pdf`, `docx`, `html` - format-specific text and image collection

pub mod docx;
pub mod extractor;
pub mod fetch;
pub mod html;
pub mod pdf;

pub use extractor::TextExtractor;
pub use fetch::DocumentFetcher;

use bytes::Bytes;
use url::Url;

/// Text returned for documents whose extension has no extractor.
pub const UNSUPPORTED_FORMAT: &str = "Unsupported file format";

const DOCX_MIME: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// A downloaded document, alive for the duration of one request.
#[derive(Debug, Clone)]
pub struct Document {
    pub url: Url,
    pub file_name: String,
    /// Lower-cased, with the leading dot (`.pdf`); empty when unknown
    pub extension: String,
    pub bytes: Bytes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Docx,
    Html,
    PlainText,
    Image,
    Unsupported,
}

impl DocumentKind {
    pub fn from_extension(extension: &str) -> Self {
        match extension.to_lowercase().as_str() {
            ".pdf" => DocumentKind::Pdf,
            ".docx" => DocumentKind::Docx,
            ".html" | ".htm" => DocumentKind::Html,
            ".txt" => DocumentKind::PlainText,
            ".jpg" | ".jpeg" | ".png" | ".bmp" | ".tiff" | ".tif" => DocumentKind::Image,
            _ => DocumentKind::Unsupported,
        }
    }

    /// Whether the kind carries embedded text that may need an OCR fallback
    pub fn supports_ocr_fallback(&self) -> bool {
        matches!(self, DocumentKind::Pdf | DocumentKind::Docx | DocumentKind::Html)
    }
}

impl std::fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DocumentKind::Pdf => write!(f, "pdf"),
            DocumentKind::Docx => write!(f, "docx"),
            DocumentKind::Html => write!(f, "html"),
            DocumentKind::PlainText => write!(f, "text"),
            DocumentKind::Image => write!(f, "image"),
            DocumentKind::Unsupported => write!(f, "unsupported"),
        }
    }
}

/// Map a `Content-Type` header onto an extension the dispatcher understands.
pub fn extension_for_mime(content_type: &str) -> Option<&'static str> {
    let mime: mime::Mime = content_type.parse().ok()?;
    match mime.essence_str() {
        "application/pdf" => Some(".pdf"),
        DOCX_MIME => Some(".docx"),
        "text/html" => Some(".html"),
        "text/plain" => Some(".txt"),
        "image/jpeg" => Some(".jpg"),
        "image/png" => Some(".png"),
        "image/bmp" => Some(".bmp"),
        "image/tiff" => Some(".tiff"),
        _ => None,
    }
}

/// An encoded raster image pulled out of a container document.
#[derive(Debug, Clone)]
pub struct EmbeddedImage {
    pub bytes: Vec<u8>,
    /// Without the leading dot
    pub extension: String,
}

/// Embedded text plus the images to OCR if that text turns out to be too thin.
#[derive(Debug, Default)]
pub struct ParsedDocument {
    pub text: String,
    pub images: Vec<EmbeddedImage>,
}

pub fn has_enough_text(text: &str, min_chars: usize) -> bool {
    text.trim().chars().count() >= min_chars
}
