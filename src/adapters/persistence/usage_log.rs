use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::subscription::{CreateUsageLogInput, UsageLogRepo},
};

#[async_trait]
impl UsageLogRepo for PostgresPersistence {
    async fn append(&self, input: &CreateUsageLogInput) -> AppResult<Uuid> {
        let id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO usage_logs (id, subscription_id, metric, quantity, recorded_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(id)
        .bind(input.subscription_id)
        .bind(&input.metric)
        .bind(input.quantity)
        .bind(input.recorded_at)
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(id)
    }
}
