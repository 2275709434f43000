use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub fetch: FetchConfig,
    pub webhook: WebhookConfig,
    pub ocr: OcrConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    pub timeout_secs: u64,
    /// Upper bound for any single download, documents and embedded images alike
    pub max_document_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookConfig {
    pub url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OcrConfig {
    pub command: String,
    pub language: String,
    /// Embedded text shorter than this (trimmed, in chars) triggers OCR
    pub min_text_chars: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            server: ServerConfig {
                port: parse_var("PORT", "8080")?,
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            },
            database: DatabaseConfig {
                url: required_var("DATABASE_URL")?,
                max_connections: parse_var("DB_MAX_CONNECTIONS", "5")?,
                min_connections: parse_var("DB_MIN_CONNECTIONS", "1")?,
            },
            fetch: FetchConfig {
                timeout_secs: parse_var("FETCH_TIMEOUT_SECS", "30")?,
                max_document_bytes: parse_var("MAX_DOCUMENT_BYTES", "26214400")?,
            },
            webhook: WebhookConfig {
                url: required_var("EXTERNAL_ENDPOINT_URL")?,
                timeout_secs: parse_var("WEBHOOK_TIMEOUT_SECS", "30")?,
            },
            ocr: OcrConfig {
                command: env::var("TESSERACT_CMD").unwrap_or_else(|_| "tesseract".to_string()),
                language: env::var("OCR_LANGUAGE").unwrap_or_else(|_| "eng".to_string()),
                min_text_chars: parse_var("OCR_MIN_TEXT_CHARS", "50")?,
            },
        })
    }
}

fn required_var(name: &str) -> Result<String> {
    env::var(name).with_context(|| format!("{} must be set", name))
}

fn parse_var<T>(name: &str, default: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .with_context(|| format!("{} has an invalid value", name))
}
