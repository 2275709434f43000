use anyhow::Result;
use async_trait::async_trait;
use sqlx::PgPool;

use crate::models::LogEntry;

/// Sink for the processing audit trail.
#[async_trait]
pub trait AuditLog: Send + Sync {
    async fn record(&self, entry: &LogEntry) -> Result<()>;
}

pub struct PgAuditLog {
    pool: PgPool,
}

impl PgAuditLog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditLog for PgAuditLog {
    async fn record(&self, entry: &LogEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO resume_processing_logs (resume_url, stage, status, error_message, microservice, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(&entry.resume_url)
        .bind(entry.stage.to_string())
        .bind(entry.status.to_string())
        .bind(&entry.error_message)
        .bind(&entry.microservice)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// In-memory audit log; optionally fails every write.
    #[derive(Default)]
    pub(crate) struct RecordingAuditLog {
        entries: Mutex<Vec<LogEntry>>,
        fail: bool,
    }

    impl RecordingAuditLog {
        pub(crate) fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        pub(crate) fn entries(&self) -> Vec<LogEntry> {
            self.entries.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl AuditLog for RecordingAuditLog {
        async fn record(&self, entry: &LogEntry) -> Result<()> {
            if self.fail {
                anyhow::bail!("audit database unavailable");
            }
            self.entries.lock().unwrap().push(entry.clone());
            Ok(())
        }
    }
}
