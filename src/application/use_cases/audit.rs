use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::app_error::AppResult;

#[derive(Debug, Clone, Serialize)]
pub struct AuditLogProfile {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub action: String,
    pub description: Option<String>,
    pub metadata: serde_json::Value,
    pub ip_address: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Input for one audit trail entry. Written after the primary record is
/// committed; a failed append is logged and never rolls the action back.
#[derive(Debug, Clone)]
pub struct CreateAuditLogInput {
    pub user_id: Option<Uuid>,
    pub action: String,
    pub description: Option<String>,
    pub metadata: serde_json::Value,
    pub ip_address: Option<String>,
}

#[async_trait]
pub trait AuditLogRepo: Send + Sync {
    async fn append(&self, input: &CreateAuditLogInput) -> AppResult<()>;
}

/// Append an audit entry, swallowing and logging failures.
pub async fn record_audit(repo: &dyn AuditLogRepo, input: CreateAuditLogInput) {
    if let Err(e) = repo.append(&input).await {
        tracing::warn!(action = %input.action, error = %e, "Failed to write audit log entry");
    }
}
