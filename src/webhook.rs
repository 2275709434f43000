// Result forwarder
// Posts extracted resume text to the collector configured by EXTERNAL_ENDPOINT_URL.

use std::time::Duration;

use reqwest::Client;
use tracing::{debug, info};

use crate::config::WebhookConfig;
use crate::models::WebhookPayload;
use crate::types::{AppError, AppResult};

#[derive(Clone)]
pub struct WebhookForwarder {
    client: Client,
    url: String,
}

impl WebhookForwarder {
    pub fn new(config: &WebhookConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            url: config.url.clone(),
        })
    }

    /// POST the payload and return the collector's response body.
    ///
    /// JSON bodies are returned as parsed values; anything else is wrapped in a
    /// JSON string so it can be echoed back to the caller unchanged.
    pub async fn forward(&self, payload: &WebhookPayload) -> AppResult<serde_json::Value> {
        info!(
            "Forwarding {} ({} chars) to webhook",
            payload.file_name,
            payload.resume_content.len()
        );

        let response = self
            .client
            .post(&self.url)
            .json(payload)
            .send()
            .await
            .map_err(|e| AppError::Webhook(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AppError::Webhook(e.to_string()))?;

        if !status.is_success() {
            return Err(AppError::Webhook(format!(
                "collector returned {}: {}",
                status,
                body.trim()
            )));
        }

        debug!("Webhook responded with {}", status);

        Ok(serde_json::from_str(&body).unwrap_or(serde_json::Value::String(body)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn payload() -> WebhookPayload {
        WebhookPayload {
            posting_id: "P-1".to_string(),
            sheet_name: "Sheet1".to_string(),
            file_name: "cv.pdf".to_string(),
            file_id: "batch-1".to_string(),
            source: "referral".to_string(),
            resume_content: "Jane Doe".to_string(),
            parsed_resume: None,
        }
    }

    fn forwarder(url: String) -> WebhookForwarder {
        WebhookForwarder::new(&WebhookConfig {
            url,
            timeout_secs: 5,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_forward_posts_payload_and_parses_json() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/collect")
            .match_header("content-type", "application/json")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "posting_id": "P-1",
                "file_name": "cv.pdf",
                "file_id": "batch-1",
                "resume_content": "Jane Doe",
                "parsed_resume": null,
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"stored": true}"#)
            .create_async()
            .await;

        let response = forwarder(format!("{}/collect", server.url()))
            .forward(&payload())
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(response, serde_json::json!({ "stored": true }));
    }

    #[tokio::test]
    async fn test_forward_wraps_plain_text_response() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/collect")
            .with_status(202)
            .with_body("queued")
            .create_async()
            .await;

        let response = forwarder(format!("{}/collect", server.url()))
            .forward(&payload())
            .await
            .unwrap();

        assert_eq!(response, serde_json::Value::String("queued".to_string()));
    }

    #[tokio::test]
    async fn test_forward_fails_on_error_status() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/collect")
            .with_status(503)
            .with_body("down for maintenance")
            .create_async()
            .await;

        let err = forwarder(format!("{}/collect", server.url()))
            .forward(&payload())
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Webhook(_)));
        assert!(err.to_string().contains("503"));
    }
}
