use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::models::{
    AppState, LogEntry, ResumeSubmission, SubmitResumeRequest, SubmitResumeResponse,
    WebhookPayload,
};
use crate::types::{AppError, AppResult};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/submit-resumes", post(submit_resume))
        .with_state(state)
}

pub async fn submit_resume(
    State(state): State<AppState>,
    payload: Result<Json<SubmitResumeRequest>, JsonRejection>,
) -> AppResult<Json<SubmitResumeResponse>> {
    let Json(request) = payload.map_err(|rejection| {
        warn!("Rejected request body: {}", rejection);
        AppError::InvalidRequest(format!("Invalid request body: {}", rejection.body_text()))
    })?;
    let submission = request.into_submission()?;

    let span = info_span!(
        "submit_resume",
        request_id = %Uuid::new_v4(),
        resume_url = %submission.resume_url
    );

    async move {
        info!("Received resume for posting {}", submission.posting_id);
        record_audit(&state, LogEntry::received(&submission.resume_url)).await;

        match process(&state, &submission).await {
            Ok(response) => {
                info!("Resume processed ({} chars)", response.resume_text.len());
                record_audit(&state, LogEntry::succeeded(&submission.resume_url)).await;
                Ok(Json(response))
            }
            Err(e) => {
                error!("Resume processing failed: {}", e);
                record_audit(
                    &state,
                    LogEntry::failed(&submission.resume_url, &e.to_string()),
                )
                .await;
                Err(e)
            }
        }
    }
    .instrument(span)
    .await
}

async fn process(state: &AppState, submission: &ResumeSubmission) -> AppResult<SubmitResumeResponse> {
    let document = state.fetcher.fetch(&submission.resume_url).await?;
    let resume_text = state.extractor.extract(&document).await?;

    let payload = WebhookPayload::new(submission, &document.file_name, &resume_text);
    debug!(
        "Forwarding {} to {}",
        document.file_name, state.config.webhook.url
    );
    let external_response = state.forwarder.forward(&payload).await?;

    Ok(SubmitResumeResponse {
        company_name: submission.company_name.clone(),
        posting_id: submission.posting_id.clone(),
        source: submission.source.clone(),
        batch_id: submission.batch_id.clone(),
        resume_text,
        external_response,
    })
}

// Audit rows are best effort; a failed write never changes the response.
async fn record_audit(state: &AppState, entry: LogEntry) {
    if let Err(e) = state.audit.record(&entry).await {
        warn!(
            "Failed to write {} / {} audit row: {:#}",
            entry.stage, entry.status, e
        );
    }
}
