// Tesseract adapter
// Runs `tesseract <image> stdout -l <lang>` against a temporary copy of the image.

use async_trait::async_trait;
use std::io::Write;
use tokio::process::Command;
use tracing::debug;

use crate::config::OcrConfig;
use crate::ocr::OcrEngine;
use crate::types::{AppError, AppResult};

pub struct TesseractCli {
    command: String,
    language: String,
}

impl TesseractCli {
    pub fn new(config: &OcrConfig) -> Self {
        Self {
            command: config.command.clone(),
            language: config.language.clone(),
        }
    }

    fn write_temp_image(image: &[u8], extension: &str) -> AppResult<tempfile::NamedTempFile> {
        let suffix = format!(".{}", sanitize_extension(extension));
        let mut file = tempfile::Builder::new()
            .prefix("resume-ocr-")
            .suffix(&suffix)
            .tempfile()
            .map_err(|e| AppError::Ocr(format!("cannot create temp file: {}", e)))?;
        file.write_all(image)
            .and_then(|_| file.flush())
            .map_err(|e| AppError::Ocr(format!("cannot write temp file: {}", e)))?;
        Ok(file)
    }
}

#[async_trait]
impl OcrEngine for TesseractCli {
    async fn recognize(&self, image: &[u8], extension: &str) -> AppResult<String> {
        // Dropping the handle removes the file, so it must outlive the child process
        let file = Self::write_temp_image(image, extension)?;

        debug!(
            "Running {} on {} bytes ({})",
            self.command,
            image.len(),
            extension
        );

        let output = Command::new(&self.command)
            .arg(file.path())
            .arg("stdout")
            .arg("-l")
            .arg(&self.language)
            .output()
            .await
            .map_err(|e| AppError::Ocr(format!("cannot run {}: {}", self.command, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AppError::Ocr(format!(
                "{} exited with {}: {}",
                self.command,
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

fn sanitize_extension(extension: &str) -> String {
    let cleaned: String = extension
        .trim_start_matches('.')
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect();
    if cleaned.is_empty() {
        "img".to_string()
    } else {
        cleaned.to_ascii_lowercase()
    }
}
