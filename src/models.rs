use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use validator::Validate;

use crate::config::Config;
use crate::db::{AuditLog, PgAuditLog};
use crate::documents::{DocumentFetcher, TextExtractor};
use crate::ocr::TesseractCli;
use crate::types::{AppError, AppResult};
use crate::webhook::WebhookForwarder;

pub const MISSING_FIELDS_MESSAGE: &str = "Missing required fields in the request body";

/// Identifier stamped on every audit row written by this service
pub const MICROSERVICE_NAME: &str = "resume-text-extractor";

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub fetcher: DocumentFetcher,
    pub extractor: Arc<TextExtractor>,
    pub forwarder: WebhookForwarder,
    pub audit: Arc<dyn AuditLog>,
}

impl AppState {
    /// Wire the production collaborators: HTTP fetcher, Tesseract OCR, webhook and Postgres audit log.
    pub fn new(config: Config, pool: PgPool) -> anyhow::Result<Self> {
        let fetcher = DocumentFetcher::new(&config.fetch)?;
        let ocr = Arc::new(TesseractCli::new(&config.ocr));
        let extractor = Arc::new(TextExtractor::new(
            ocr,
            fetcher.clone(),
            config.ocr.min_text_chars,
        ));
        let forwarder = WebhookForwarder::new(&config.webhook)?;
        let audit: Arc<dyn AuditLog> = Arc::new(PgAuditLog::new(pool));

        Ok(Self {
            config,
            fetcher,
            extractor,
            forwarder,
            audit,
        })
    }
}

// Inbound request. Every field is optional at the serde level so that a missing
// field surfaces as a 400 from validation rather than a deserialization error.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResumeRequest {
    #[validate(required, length(min = 1))]
    pub company_name: Option<String>,
    #[validate(required, length(min = 1))]
    pub posting_id: Option<String>,
    #[validate(required, length(min = 1))]
    pub source: Option<String>,
    #[validate(required, length(min = 1))]
    pub resume_url: Option<String>,
    #[validate(required, length(min = 1))]
    pub batch_id: Option<String>,
    #[validate(required, length(min = 1))]
    pub sheet_name: Option<String>,
}

/// A request whose required fields have all been checked.
#[derive(Debug, Clone)]
pub struct ResumeSubmission {
    pub company_name: String,
    pub posting_id: String,
    pub source: String,
    pub resume_url: String,
    pub batch_id: String,
    pub sheet_name: String,
}

impl SubmitResumeRequest {
    pub fn into_submission(self) -> AppResult<ResumeSubmission> {
        if let Err(errors) = self.validate() {
            tracing::debug!("Rejected submission: {}", errors);
            return Err(AppError::InvalidRequest(MISSING_FIELDS_MESSAGE.to_string()));
        }

        match (
            self.company_name,
            self.posting_id,
            self.source,
            self.resume_url,
            self.batch_id,
            self.sheet_name,
        ) {
            (
                Some(company_name),
                Some(posting_id),
                Some(source),
                Some(resume_url),
                Some(batch_id),
                Some(sheet_name),
            ) => Ok(ResumeSubmission {
                company_name,
                posting_id,
                source,
                resume_url,
                batch_id,
                sheet_name,
            }),
            _ => Err(AppError::InvalidRequest(MISSING_FIELDS_MESSAGE.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResumeResponse {
    pub company_name: String,
    pub posting_id: String,
    pub source: String,
    pub batch_id: String,
    pub resume_text: String,
    pub external_response: serde_json::Value,
}

/// Body posted to the downstream collector
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookPayload {
    pub posting_id: String,
    pub sheet_name: String,
    pub file_name: String,
    pub file_id: String,
    pub source: String,
    pub resume_content: String,
    pub parsed_resume: Option<serde_json::Value>,
}

impl WebhookPayload {
    pub fn new(submission: &ResumeSubmission, file_name: &str, resume_content: &str) -> Self {
        Self {
            posting_id: submission.posting_id.clone(),
            sheet_name: submission.sheet_name.clone(),
            file_name: file_name.to_string(),
            file_id: submission.batch_id.clone(),
            source: submission.source.clone(),
            resume_content: resume_content.to_string(),
            parsed_resume: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    Received,
    Processed,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Received => write!(f, "Received"),
            Stage::Processed => write!(f, "Processed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessingStatus {
    #[serde(rename = "In Progress")]
    InProgress,
    Success,
    Failure,
}

impl std::fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessingStatus::InProgress => write!(f, "In Progress"),
            ProcessingStatus::Success => write!(f, "Success"),
            ProcessingStatus::Failure => write!(f, "Failure"),
        }
    }
}

/// One row of the processing audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub resume_url: String,
    pub stage: Stage,
    pub status: ProcessingStatus,
    pub error_message: Option<String>,
    pub microservice: String,
    pub created_at: DateTime<Utc>,
}

impl LogEntry {
    fn new(resume_url: &str, stage: Stage, status: ProcessingStatus, error_message: Option<String>) -> Self {
        Self {
            resume_url: resume_url.to_string(),
            stage,
            status,
            error_message,
            microservice: MICROSERVICE_NAME.to_string(),
            created_at: Utc::now(),
        }
    }

    pub fn received(resume_url: &str) -> Self {
        Self::new(resume_url, Stage::Received, ProcessingStatus::InProgress, None)
    }

    pub fn succeeded(resume_url: &str) -> Self {
        Self::new(resume_url, Stage::Processed, ProcessingStatus::Success, None)
    }

    pub fn failed(resume_url: &str, error: &str) -> Self {
        Self::new(
            resume_url,
            Stage::Processed,
            ProcessingStatus::Failure,
            Some(error.to_string()),
        )
    }
}
