// DOCX text extraction: paragraphs from word/document.xml, images from word/media/.

use std::io::{Cursor, Read};

use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::debug;
use zip::ZipArchive;

use crate::documents::{has_enough_text, EmbeddedImage, ParsedDocument};
use crate::types::{AppError, AppResult};

const DOCUMENT_PART: &str = "word/document.xml";
const MEDIA_PREFIX: &str = "word/media/";
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "tif", "tiff", "gif"];

pub fn parse(bytes: &[u8], min_text_chars: usize, max_part_bytes: usize) -> AppResult<ParsedDocument> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;

    let entry = archive
        .by_name(DOCUMENT_PART)
        .map_err(|_| AppError::Extraction(format!("DOCX has no {}", DOCUMENT_PART)))?;
    let xml = read_bounded(entry, DOCUMENT_PART, max_part_bytes)?;
    let xml = String::from_utf8(xml)
        .map_err(|e| AppError::Extraction(format!("{} is not valid UTF-8: {}", DOCUMENT_PART, e)))?;

    let text = paragraphs_text(&xml)?;

    let images = if has_enough_text(&text, min_text_chars) {
        Vec::new()
    } else {
        media_images(&mut archive, max_part_bytes)?
    };

    Ok(ParsedDocument { text, images })
}

/// Read at most `limit` decompressed bytes; declared sizes in the archive are not trusted.
fn read_bounded<R: Read>(entry: R, name: &str, limit: usize) -> AppResult<Vec<u8>> {
    let mut bytes = Vec::new();
    entry
        .take(limit as u64 + 1)
        .read_to_end(&mut bytes)
        .map_err(|e| AppError::Extraction(format!("cannot read {}: {}", name, e)))?;

    if bytes.len() > limit {
        return Err(AppError::Extraction(format!(
            "{} expands beyond the {} byte limit",
            name, limit
        )));
    }
    Ok(bytes)
}

/// Paragraph text joined with newlines. Tabs and explicit breaks are kept.
///
/// Paragraphs nest inside text boxes (`w:txbxContent`), so each open `w:p`
/// gets its own buffer and an inner paragraph is emitted before its parent.
fn paragraphs_text(xml: &str) -> AppResult<String> {
    let mut reader = Reader::from_str(xml);
    let mut paragraphs: Vec<String> = Vec::new();
    let mut open: Vec<String> = Vec::new();
    let mut run_depth = 0usize;
    // Tab stops under w:pPr/w:tabs are layout, not content.
    let mut properties_depth = 0usize;
    let mut in_text = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.name().as_ref() {
                b"w:p" => open.push(String::new()),
                b"w:r" => run_depth += 1,
                b"w:pPr" => properties_depth += 1,
                b"w:t" => in_text = true,
                _ => {}
            },
            Event::Empty(e) => {
                let in_run = run_depth > 0 && properties_depth == 0;
                match (e.name().as_ref(), open.last_mut()) {
                    (b"w:p", _) => paragraphs.push(String::new()),
                    (b"w:tab", Some(current)) if in_run => current.push('\t'),
                    (b"w:br" | b"w:cr", Some(current)) if in_run => current.push('\n'),
                    _ => {}
                }
            }
            Event::Text(t) if in_text => {
                if let Some(current) = open.last_mut() {
                    current.push_str(&t.unescape()?);
                }
            }
            Event::End(e) => match e.name().as_ref() {
                b"w:t" => in_text = false,
                b"w:r" => run_depth = run_depth.saturating_sub(1),
                b"w:pPr" => properties_depth = properties_depth.saturating_sub(1),
                b"w:p" => {
                    if let Some(done) = open.pop() {
                        paragraphs.push(done);
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(paragraphs.join("\n"))
}

/// Raster images under `word/media/`, sharing one decompressed byte budget.
fn media_images<R: Read + std::io::Seek>(
    archive: &mut ZipArchive<R>,
    max_total_bytes: usize,
) -> AppResult<Vec<EmbeddedImage>> {
    let mut images = Vec::new();
    let mut remaining = max_total_bytes;

    for index in 0..archive.len() {
        let entry = archive.by_index(index)?;
        if !entry.is_file() || !entry.name().starts_with(MEDIA_PREFIX) {
            continue;
        }

        let name = entry.name().to_string();
        let extension = match std::path::Path::new(&name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase())
        {
            Some(ext) if IMAGE_EXTENSIONS.contains(&ext.as_str()) => ext,
            _ => {
                debug!("Skipping non-raster media {}", name);
                continue;
            }
        };

        let bytes = read_bounded(entry, &name, remaining)?;
        remaining -= bytes.len();
        images.push(EmbeddedImage { bytes, extension });
    }

    Ok(images)
}
