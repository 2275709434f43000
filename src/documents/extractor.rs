use std::sync::Arc;

use tracing::{debug, info, warn};
use url::Url;

use crate::documents::html::{self, ImageSource};
use crate::documents::{
    docx, extension_for_mime, has_enough_text, pdf, Document, DocumentFetcher, DocumentKind,
    EmbeddedImage, ParsedDocument, UNSUPPORTED_FORMAT,
};
use crate::ocr::OcrEngine;
use crate::types::{AppError, AppResult};

/// Most `<img>` sources loaded for one HTML fallback; the rest are ignored.
const MAX_HTML_IMAGES: usize = 20;

/// Dispatches a document to its format extractor and applies the OCR fallback.
pub struct TextExtractor {
    ocr: Arc<dyn OcrEngine>,
    fetcher: DocumentFetcher,
    min_text_chars: usize,
}

impl TextExtractor {
    pub fn new(ocr: Arc<dyn OcrEngine>, fetcher: DocumentFetcher, min_text_chars: usize) -> Self {
        Self {
            ocr,
            fetcher,
            min_text_chars,
        }
    }

    pub async fn extract(&self, document: &Document) -> AppResult<String> {
        let kind = DocumentKind::from_extension(&document.extension);
        info!("Extracting text from {} as {}", document.file_name, kind);

        match kind {
            DocumentKind::Pdf => {
                let min_text_chars = self.min_text_chars;
                let parsed = self
                    .parse_blocking(document, move |bytes| pdf::parse(bytes, min_text_chars))
                    .await?;
                self.with_ocr_fallback(kind, parsed).await
            }
            DocumentKind::Docx => {
                let min_text_chars = self.min_text_chars;
                let max_part_bytes = self.fetcher.max_bytes();
                let parsed = self
                    .parse_blocking(document, move |bytes| {
                        docx::parse(bytes, min_text_chars, max_part_bytes)
                    })
                    .await?;
                self.with_ocr_fallback(kind, parsed).await
            }
            DocumentKind::Html => {
                let content = html::parse(decode_utf8(&document.bytes, kind)?);
                let images = if has_enough_text(&content.text, self.min_text_chars) {
                    Vec::new()
                } else {
                    self.load_html_images(&content.image_sources, &document.url)
                        .await
                };
                let parsed = ParsedDocument {
                    text: content.text,
                    images,
                };
                self.with_ocr_fallback(kind, parsed).await
            }
            DocumentKind::PlainText => Ok(decode_utf8(&document.bytes, kind)?.to_string()),
            DocumentKind::Image => {
                self.ocr
                    .recognize(&document.bytes, document.extension.trim_start_matches('.'))
                    .await
            }
            DocumentKind::Unsupported => {
                warn!(
                    "No extractor for {} (extension {:?})",
                    document.file_name, document.extension
                );
                Ok(UNSUPPORTED_FORMAT.to_string())
            }
        }
    }

    async fn parse_blocking<F>(&self, document: &Document, parser: F) -> AppResult<ParsedDocument>
    where
        F: FnOnce(&[u8]) -> AppResult<ParsedDocument> + Send + 'static,
    {
        let bytes = document.bytes.clone();

        tokio::task::spawn_blocking(move || parser(&bytes))
            .await
            .map_err(|e| AppError::Internal(format!("extraction task failed: {}", e)))?
    }

    /// Keep the embedded text unless it is under the threshold and OCR of the
    /// collected images produces something longer.
    async fn with_ocr_fallback(&self, kind: DocumentKind, parsed: ParsedDocument) -> AppResult<String> {
        if has_enough_text(&parsed.text, self.min_text_chars) {
            return Ok(parsed.text);
        }
        if parsed.images.is_empty() {
            debug!("{} has too little text and no images to OCR", kind);
            return Ok(parsed.text);
        }

        info!(
            "{} has too little embedded text, running OCR on {} image(s)",
            kind,
            parsed.images.len()
        );

        let mut recognized = Vec::new();
        for (index, image) in parsed.images.iter().enumerate() {
            match self.ocr.recognize(&image.bytes, &image.extension).await {
                Ok(text) if !text.trim().is_empty() => recognized.push(text.trim().to_string()),
                Ok(_) => debug!("OCR found no text in image {}", index),
                Err(e) => warn!("OCR failed for image {} of {}: {}", index, kind, e),
            }
        }

        let ocr_text = recognized.join("\n");
        if ocr_text.chars().count() > parsed.text.trim().chars().count() {
            Ok(ocr_text)
        } else {
            Ok(parsed.text)
        }
    }

    /// Load `<img>` sources in document order, up to [`MAX_HTML_IMAGES`] images
    /// and one document's worth of bytes in total.
    async fn load_html_images(&self, sources: &[String], base: &Url) -> Vec<EmbeddedImage> {
        let budget = self.fetcher.max_bytes();
        let mut total = 0usize;
        let mut images = Vec::new();

        for src in sources {
            if images.len() == MAX_HTML_IMAGES {
                warn!(
                    "HTML has more than {} images, ignoring the rest",
                    MAX_HTML_IMAGES
                );
                break;
            }

            let image = match html::resolve_image_source(src, base) {
                Some(ImageSource::Inline(image)) => image,
                Some(ImageSource::Remote { url, extension }) => {
                    match self.fetcher.download(&url).await {
                        Ok((bytes, content_type)) => EmbeddedImage {
                            bytes: bytes.to_vec(),
                            extension: content_type
                                .as_deref()
                                .and_then(extension_for_mime)
                                .map(|ext| ext.trim_start_matches('.').to_string())
                                .unwrap_or(extension),
                        },
                        Err(e) => {
                            warn!("Skipping image {}: {}", url, e);
                            continue;
                        }
                    }
                }
                None => {
                    debug!("Ignoring image source {:.64}", src);
                    continue;
                }
            };

            total += image.bytes.len();
            if total > budget {
                warn!("HTML images exceed {} bytes, ignoring the rest", budget);
                break;
            }
            images.push(image);
        }

        images
    }
}

fn decode_utf8(bytes: &[u8], kind: DocumentKind) -> AppResult<&str> {
    std::str::from_utf8(bytes)
        .map_err(|e| AppError::Extraction(format!("{} document is not valid UTF-8: {}", kind, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FetchConfig;
    use crate::documents::docx::tests::build_docx;
    use crate::documents::fetch::infer_extension;
    use crate::documents::pdf::tests::{build_pdf, image_stream};
    use crate::ocr::testing::StubOcr;
    use bytes::Bytes;
    use lopdf::dictionary;

    const PNG_DATA_URI: &str = "data:image/png;base64,aGVsbG8=";

    fn extractor(ocr: Arc<StubOcr>, min_text_chars: usize) -> TextExtractor {
        extractor_with_limit(ocr, min_text_chars, 1024 * 1024)
    }

    fn extractor_with_limit(ocr: Arc<StubOcr>, min_text_chars: usize, max_bytes: usize) -> TextExtractor {
        let fetcher = DocumentFetcher::new(&FetchConfig {
            timeout_secs: 5,
            max_document_bytes: max_bytes,
        })
        .unwrap();
        TextExtractor::new(ocr, fetcher, min_text_chars)
    }

    fn html_with_images(count: usize) -> String {
        let images = format!(r#"<img src="{}">"#, PNG_DATA_URI).repeat(count);
        format!("<html><body>{}</body></html>", images)
    }

    fn document(url: &str, bytes: impl Into<Bytes>) -> Document {
        let url = Url::parse(url).unwrap();
        let file_name = crate::documents::fetch::file_name_from_url(&url);
        let extension = infer_extension(&file_name, None);
        Document {
            url,
            file_name,
            extension,
            bytes: bytes.into(),
        }
    }

    #[tokio::test]
    async fn test_plain_text_is_decoded() {
        let ocr = Arc::new(StubOcr::returning("ocr"));
        let text = extractor(ocr.clone(), 50)
            .extract(&document("https://x.test/cv.txt", "Jane Doe\nRust"))
            .await
            .unwrap();
        assert_eq!(text, "Jane Doe\nRust");
        assert_eq!(ocr.calls(), 0);
    }

    #[tokio::test]
    async fn test_invalid_utf8_text_fails() {
        let ocr = Arc::new(StubOcr::returning("ocr"));
        let err = extractor(ocr, 50)
            .extract(&document("https://x.test/cv.txt", vec![0xff, 0xfe, 0xfd]))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Extraction(_)));
    }

    #[tokio::test]
    async fn test_unsupported_extension_yields_marker() {
        let ocr = Arc::new(StubOcr::returning("ocr"));
        let text = extractor(ocr.clone(), 50)
            .extract(&document("https://x.test/cv.odt", "whatever"))
            .await
            .unwrap();
        assert_eq!(text, UNSUPPORTED_FORMAT);
        assert_eq!(ocr.calls(), 0);
    }

    #[tokio::test]
    async fn test_image_goes_straight_to_ocr() {
        let ocr = Arc::new(StubOcr::returning("Jane Doe from a photo"));
        let text = extractor(ocr.clone(), 50)
            .extract(&document("https://x.test/scan.JPEG", vec![1, 2, 3]))
            .await
            .unwrap();
        assert_eq!(text, "Jane Doe from a photo");
        assert_eq!(ocr.extensions(), vec!["jpeg"]);
    }

    #[tokio::test]
    async fn test_image_ocr_failure_is_an_error() {
        let ocr = Arc::new(StubOcr::failing());
        let err = extractor(ocr, 50)
            .extract(&document("https://x.test/scan.png", vec![1, 2, 3]))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Ocr(_)));
    }

    #[tokio::test]
    async fn test_scanned_pdf_falls_back_to_ocr() {
        let jpeg = image_stream(dictionary! { "Filter" => "DCTDecode" }, b"jpeg".to_vec());
        let pdf = build_pdf("", vec![jpeg]);
        let ocr = Arc::new(StubOcr::returning("Scanned resume text"));

        let text = extractor(ocr.clone(), 50)
            .extract(&document("https://x.test/cv.pdf", pdf))
            .await
            .unwrap();

        assert_eq!(text, "Scanned resume text");
        assert_eq!(ocr.calls(), 1);
        assert_eq!(ocr.extensions(), vec!["jpg"]);
    }

    #[tokio::test]
    async fn test_text_pdf_skips_ocr() {
        let pdf = build_pdf("BT /F1 24 Tf 72 720 Td (Hello World) Tj ET", vec![]);
        let ocr = Arc::new(StubOcr::returning("ocr"));

        let text = extractor(ocr.clone(), 5)
            .extract(&document("https://x.test/cv.pdf", pdf))
            .await
            .unwrap();

        assert!(text.contains("Hello World"));
        assert_eq!(ocr.calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_docx_falls_back_to_ocr() {
        let docx = build_docx("<w:p/>", &[("image1.png", b"png")]);
        let ocr = Arc::new(StubOcr::returning("Text from embedded image"));

        let text = extractor(ocr.clone(), 50)
            .extract(&document("https://x.test/cv.docx", docx))
            .await
            .unwrap();

        assert_eq!(text, "Text from embedded image");
        assert_eq!(ocr.calls(), 1);
    }

    #[tokio::test]
    async fn test_fallback_keeps_embedded_text_when_ocr_is_empty() {
        let docx = build_docx(
            "<w:p><w:r><w:t>Jane</w:t></w:r></w:p>",
            &[("image1.png", b"png")],
        );
        let ocr = Arc::new(StubOcr::returning("   "));

        let text = extractor(ocr.clone(), 50)
            .extract(&document("https://x.test/cv.docx", docx))
            .await
            .unwrap();

        assert_eq!(text, "Jane");
        assert_eq!(ocr.calls(), 1);
    }

    #[tokio::test]
    async fn test_fallback_tolerates_ocr_failures() {
        let docx = build_docx(
            "<w:p><w:r><w:t>Jane</w:t></w:r></w:p>",
            &[("a.png", b"png"), ("b.jpg", b"jpg")],
        );
        let ocr = Arc::new(StubOcr::failing());

        let text = extractor(ocr.clone(), 50)
            .extract(&document("https://x.test/cv.docx", docx))
            .await
            .unwrap();

        assert_eq!(text, "Jane");
        assert_eq!(ocr.calls(), 2);
    }

    #[tokio::test]
    async fn test_html_with_inline_image_falls_back_to_ocr() {
        let html = r#"<html><body><img src="data:image/png;base64,aGVsbG8="></body></html>"#;
        let ocr = Arc::new(StubOcr::returning("Resume rendered as image"));

        let text = extractor(ocr.clone(), 50)
            .extract(&document("https://x.test/cv.html", html))
            .await
            .unwrap();

        assert_eq!(text, "Resume rendered as image");
        assert_eq!(ocr.extensions(), vec!["png"]);
    }

    #[tokio::test]
    async fn test_html_remote_image_is_downloaded() {
        let mut server = mockito::Server::new_async().await;
        let image = server
            .mock("GET", "/assets/page1")
            .with_status(200)
            .with_header("content-type", "image/jpeg")
            .with_body(vec![0xff, 0xd8, 0xff])
            .create_async()
            .await;

        let html = r#"<html><body><img src="assets/page1"></body></html>"#;
        let ocr = Arc::new(StubOcr::returning("Downloaded scan"));

        let text = extractor(ocr.clone(), 50)
            .extract(&document(&format!("{}/cv.html", server.url()), html))
            .await
            .unwrap();

        image.assert_async().await;
        assert_eq!(text, "Downloaded scan");
        assert_eq!(ocr.extensions(), vec!["jpg"]);
    }

    #[tokio::test]
    async fn test_html_with_text_skips_ocr() {
        let html = "<html><body><p>Jane Doe, backend engineer</p><img src=\"data:image/png;base64,aGVsbG8=\"></body></html>";
        let ocr = Arc::new(StubOcr::returning("ocr"));

        let text = extractor(ocr.clone(), 10)
            .extract(&document("https://x.test/cv.html", html))
            .await
            .unwrap();

        assert_eq!(text, "Jane Doe, backend engineer");
        assert_eq!(ocr.calls(), 0);
    }

    #[tokio::test]
    async fn test_html_skips_image_that_fails_to_load() {
        let mut server = mockito::Server::new_async().await;
        let missing = server
            .mock("GET", "/assets/missing.png")
            .with_status(404)
            .create_async()
            .await;

        let html = format!(
            r#"<html><body><img src="assets/missing.png"><img src="{}"></body></html>"#,
            PNG_DATA_URI
        );
        let ocr = Arc::new(StubOcr::returning("Text from the inline image"));

        let text = extractor(ocr.clone(), 50)
            .extract(&document(&format!("{}/cv.html", server.url()), html))
            .await
            .unwrap();

        missing.assert_async().await;
        assert_eq!(text, "Text from the inline image");
        assert_eq!(ocr.extensions(), vec!["png"]);
    }

    #[tokio::test]
    async fn test_html_image_count_is_capped() {
        let ocr = Arc::new(StubOcr::returning("page"));

        extractor(ocr.clone(), 50)
            .extract(&document("https://x.test/cv.html", html_with_images(MAX_HTML_IMAGES + 5)))
            .await
            .unwrap();

        assert_eq!(ocr.calls(), MAX_HTML_IMAGES);
    }

    #[tokio::test]
    async fn test_html_image_bytes_share_download_limit() {
        let ocr = Arc::new(StubOcr::returning("page"));

        // Each inline image decodes to 5 bytes.
        extractor_with_limit(ocr.clone(), 50, 12)
            .extract(&document("https://x.test/cv.html", html_with_images(4)))
            .await
            .unwrap();

        assert_eq!(ocr.calls(), 2);
    }

    #[tokio::test]
    async fn test_zero_threshold_never_runs_ocr() {
        let ocr = Arc::new(StubOcr::returning("ocr"));
        let extractor = extractor(ocr.clone(), 0);

        let jpeg = image_stream(dictionary! { "Filter" => "DCTDecode" }, b"jpeg".to_vec());
        let pdf = extractor
            .extract(&document("https://x.test/cv.pdf", build_pdf("", vec![jpeg])))
            .await
            .unwrap();
        let docx = extractor
            .extract(&document(
                "https://x.test/cv.docx",
                build_docx("<w:p/>", &[("image1.png", b"png")]),
            ))
            .await
            .unwrap();
        let html = extractor
            .extract(&document("https://x.test/cv.html", html_with_images(1)))
            .await
            .unwrap();

        assert!(pdf.trim().is_empty());
        assert!(docx.is_empty());
        assert!(html.is_empty());
        assert_eq!(ocr.calls(), 0);
    }
}
