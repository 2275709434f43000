//! Optical character recognition
//!
//! Extractors hand raster images to an [`OcrEngine`]; the production engine
//! shells out to the Tesseract CLI.

pub mod tesseract;

pub use tesseract::TesseractCli;

use async_trait::async_trait;
use crate::types::AppResult;

#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Recognize the text in one encoded image.
    ///
    /// `extension` is the image's file extension without the leading dot
    /// (`png`, `jpg`, ...), used as a format hint.
    async fn recognize(&self, image: &[u8], extension: &str) -> AppResult<String>;
}
