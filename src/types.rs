// Error types shared by the handlers, extractors and collaborators

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    InvalidRequest(String),

    #[error("Could not download file: {0}")]
    Fetch(String),

    #[error("Text extraction failed: {0}")]
    Extraction(String),

    #[error("Failed to parse PDF: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("Failed to read DOCX archive: {0}")]
    Docx(#[from] zip::result::ZipError),

    #[error("Failed to parse DOCX XML: {0}")]
    DocxXml(#[from] quick_xml::Error),

    #[error("OCR failed: {0}")]
    Ocr(String),

    #[error("Webhook delivery failed: {0}")]
    Webhook(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.to_string() });
        (self.status_code(), Json(body)).into_response()
    }
}

pub type AppResult<T> = std::result::Result<T, AppError>;
