use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::audit::{AuditLogRepo, CreateAuditLogInput},
};

#[async_trait]
impl AuditLogRepo for PostgresPersistence {
    async fn append(&self, input: &CreateAuditLogInput) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO audit_logs (id, user_id, action, description, metadata, ip_address)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(input.user_id)
        .bind(&input.action)
        .bind(&input.description)
        .bind(&input.metadata)
        .bind(&input.ip_address)
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(())
    }
}
