// PDF text extraction with lopdf.
// When the text layer is too thin, every image XObject is collected for OCR.

use std::io::Cursor;

use image::{DynamicImage, GrayImage, ImageFormat, RgbImage};
use lopdf::{Dictionary, Object, ObjectId, Stream};
use tracing::{debug, warn};

use crate::documents::{has_enough_text, EmbeddedImage, ParsedDocument};
use crate::types::AppResult;

pub fn parse(bytes: &[u8], min_text_chars: usize) -> AppResult<ParsedDocument> {
    let doc = lopdf::Document::load_mem(bytes)?;
    let text = extract_text(&doc);

    let images = if has_enough_text(&text, min_text_chars) {
        Vec::new()
    } else {
        extract_images(&doc)
    };

    Ok(ParsedDocument { text, images })
}

fn extract_text(doc: &lopdf::Document) -> String {
    let mut pages = Vec::new();
    for page_number in doc.get_pages().keys() {
        match doc.extract_text(&[*page_number]) {
            Ok(text) => pages.push(text),
            Err(e) => warn!("Skipping text of PDF page {}: {}", page_number, e),
        }
    }
    pages.join("\n")
}

/// Every image XObject in object order, re-encoded where OCR can't read the raw stream.
fn extract_images(doc: &lopdf::Document) -> Vec<EmbeddedImage> {
    doc.objects
        .iter()
        .filter_map(|(id, object)| match object {
            Object::Stream(stream) if is_image(stream) => image_from_stream(*id, stream),
            _ => None,
        })
        .collect()
}

fn is_image(stream: &Stream) -> bool {
    stream
        .dict
        .get(b"Subtype")
        .and_then(|subtype| subtype.as_name())
        .map(|name| name == b"Image")
        .unwrap_or(false)
}

fn filters(dict: &Dictionary) -> Vec<Vec<u8>> {
    match dict.get(b"Filter") {
        Ok(Object::Name(name)) => vec![name.clone()],
        Ok(Object::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_name().ok().map(|name| name.to_vec()))
            .collect(),
        _ => Vec::new(),
    }
}

fn image_from_stream(id: ObjectId, stream: &Stream) -> Option<EmbeddedImage> {
    let filters = filters(&stream.dict);
    let names: Vec<&[u8]> = filters.iter().map(Vec::as_slice).collect();

    match names.as_slice() {
        [b"DCTDecode"] => Some(EmbeddedImage {
            bytes: stream.content.clone(),
            extension: "jpg".to_string(),
        }),
        [b"JPXDecode"] => Some(EmbeddedImage {
            bytes: stream.content.clone(),
            extension: "jp2".to_string(),
        }),
        [] => raster_to_png(&stream.dict, &stream.content),
        [b"FlateDecode"] | [b"LZWDecode"] => match stream.decompressed_content() {
            Ok(raw) => raster_to_png(&stream.dict, &raw),
            Err(e) => {
                debug!("Cannot decompress image object {:?}: {}", id, e);
                None
            }
        },
        other => {
            debug!(
                "Skipping image object {:?} with filters {:?}",
                id,
                other
                    .iter()
                    .map(|f| String::from_utf8_lossy(f).into_owned())
                    .collect::<Vec<_>>()
            );
            None
        }
    }
}

fn dimension(dict: &Dictionary, key: &[u8]) -> Option<u32> {
    let value = dict.get(key).ok()?.as_i64().ok()?;
    u32::try_from(value).ok().filter(|v| *v > 0)
}

// Component count is derived from the data length so that ICC-based and
// indexed-less colour spaces don't need to be resolved.
fn raster_to_png(dict: &Dictionary, raw: &[u8]) -> Option<EmbeddedImage> {
    let width = dimension(dict, b"Width")?;
    let height = dimension(dict, b"Height")?;
    let bits = dict
        .get(b"BitsPerComponent")
        .and_then(|o| o.as_i64())
        .unwrap_or(8);
    let pixels = (width as usize).checked_mul(height as usize)?;

    let image = match bits {
        8 => match raw.len() / pixels {
            1 => DynamicImage::ImageLuma8(GrayImage::from_raw(width, height, raw[..pixels].to_vec())?),
            3 => DynamicImage::ImageRgb8(RgbImage::from_raw(
                width,
                height,
                raw[..pixels * 3].to_vec(),
            )?),
            4 => DynamicImage::ImageRgb8(RgbImage::from_raw(
                width,
                height,
                cmyk_to_rgb(&raw[..pixels * 4]),
            )?),
            _ => return None,
        },
        1 => DynamicImage::ImageLuma8(GrayImage::from_raw(
            width,
            height,
            unpack_bilevel(raw, width as usize, height as usize)?,
        )?),
        _ => return None,
    };

    encode_png(&image)
}

fn cmyk_to_rgb(cmyk: &[u8]) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(cmyk.len() / 4 * 3);
    for px in cmyk.chunks_exact(4) {
        let k = 255 - px[3] as u16;
        for channel in &px[..3] {
            rgb.push(((255 - *channel as u16) * k / 255) as u8);
        }
    }
    rgb
}

fn unpack_bilevel(raw: &[u8], width: usize, height: usize) -> Option<Vec<u8>> {
    let stride = width.div_ceil(8);
    if raw.len() < stride * height {
        return None;
    }

    let mut out = Vec::with_capacity(width * height);
    for row in raw.chunks_exact(stride).take(height) {
        for x in 0..width {
            let bit = (row[x / 8] >> (7 - x % 8)) & 1;
            out.push(if bit == 1 { 255 } else { 0 });
        }
    }
    Some(out)
}

fn encode_png(image: &DynamicImage) -> Option<EmbeddedImage> {
    let mut buffer = Cursor::new(Vec::new());
    if let Err(e) = image.write_to(&mut buffer, ImageFormat::Png) {
        debug!("Cannot encode image as PNG: {}", e);
        return None;
    }
    Some(EmbeddedImage {
        bytes: buffer.into_inner(),
        extension: "png".to_string(),
    })
}
