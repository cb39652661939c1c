use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::Row;
use uuid::Uuid;

use crate::{
    adapters::persistence::{plan, PostgresPersistence},
    app_error::{AppError, AppResult},
    application::use_cases::subscription::{
        CreateSubscriptionRecord, SubscriptionProfile, SubscriptionRepo,
        SubscriptionSearchFilters, SubscriptionWithPlan,
    },
};

const SELECT_COLS: &str = r#"
    id, user_id, plan_id, gateway_subscription_ref, status, quantity,
    current_period_start, current_period_end, cancel_at_period_end,
    canceled_at, trial_end, coupon_code, created_at, updated_at
"#;

// Subscription columns aliased so a joined row can feed both mappers.
const JOINED_COLS: &str = r#"
    s.id, s.user_id, s.plan_id, s.gateway_subscription_ref, s.status, s.quantity,
    s.current_period_start, s.current_period_end, s.cancel_at_period_end,
    s.canceled_at, s.trial_end, s.coupon_code, s.created_at, s.updated_at,
    p.id AS plan_pk, p.name AS plan_name, p.description AS plan_description,
    p.amount AS plan_amount, p.billing_interval AS plan_billing_interval,
    p.trial_days AS plan_trial_days, p.features AS plan_features,
    p.gateway_product_ref AS plan_gateway_product_ref,
    p.gateway_price_ref AS plan_gateway_price_ref, p.active AS plan_active,
    p.setup_fee AS plan_setup_fee, p.created_at AS plan_created_at
"#;

fn row_to_profile(row: &sqlx::postgres::PgRow) -> SubscriptionProfile {
    SubscriptionProfile {
        id: row.get("id"),
        user_id: row.get("user_id"),
        plan_id: row.get("plan_id"),
        gateway_subscription_ref: row.get("gateway_subscription_ref"),
        status: row.get("status"),
        quantity: row.get("quantity"),
        current_period_start: row.get("current_period_start"),
        current_period_end: row.get("current_period_end"),
        cancel_at_period_end: row.get("cancel_at_period_end"),
        canceled_at: row.get("canceled_at"),
        trial_end: row.get("trial_end"),
        coupon_code: row.get("coupon_code"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn row_to_profile_with_plan(row: sqlx::postgres::PgRow) -> SubscriptionWithPlan {
    let subscription = row_to_profile(&row);
    let plan = plan::joined_row_to_profile(&row);
    SubscriptionWithPlan { subscription, plan }
}

#[async_trait]
impl SubscriptionRepo for PostgresPersistence {
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<SubscriptionProfile>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM subscriptions WHERE id = $1",
            SELECT_COLS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row.map(|r| row_to_profile(&r)))
    }

    async fn list_by_user(&self, user_id: Uuid) -> AppResult<Vec<SubscriptionWithPlan>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {} FROM subscriptions s
            JOIN plans p ON p.id = s.plan_id
            WHERE s.user_id = $1
            ORDER BY s.created_at DESC
            "#,
            JOINED_COLS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(rows.into_iter().map(row_to_profile_with_plan).collect())
    }

    async fn create(
        &self,
        record: &CreateSubscriptionRecord,
    ) -> AppResult<SubscriptionProfile> {
        let mut tx = self.pool.begin().await.map_err(AppError::from)?;

        // Consume one coupon use atomically; zero rows means the limit
        // was reached after validation, so the whole insert aborts.
        if let Some(code) = &record.coupon_code {
            let result = sqlx::query(
                r#"
                UPDATE coupons
                SET current_uses = current_uses + 1
                WHERE code = $1 AND active = true
                  AND (max_uses IS NULL OR current_uses < max_uses)
                "#,
            )
            .bind(code)
            .execute(&mut *tx)
            .await
            .map_err(AppError::from)?;
            if result.rows_affected() == 0 {
                return Err(AppError::InvalidInput(
                    "Coupon usage limit reached".into(),
                ));
            }
        }

        let id = Uuid::new_v4();
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO subscriptions (
                id, user_id, plan_id, gateway_subscription_ref, status, quantity,
                current_period_start, current_period_end, trial_end, coupon_code
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {}
            "#,
            SELECT_COLS
        ))
        .bind(id)
        .bind(record.user_id)
        .bind(record.plan_id)
        .bind(&record.gateway_subscription_ref)
        .bind(record.status)
        .bind(record.quantity)
        .bind(record.current_period_start)
        .bind(record.current_period_end)
        .bind(record.trial_end)
        .bind(&record.coupon_code)
        .fetch_one(&mut *tx)
        .await
        .map_err(AppError::from)?;

        tx.commit().await.map_err(AppError::from)?;
        Ok(row_to_profile(&row))
    }

    async fn update_quantity(&self, id: Uuid, quantity: i32) -> AppResult<SubscriptionProfile> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE subscriptions
            SET quantity = $2, updated_at = CURRENT_TIMESTAMP
            WHERE id = $1
            RETURNING {}
            "#,
            SELECT_COLS
        ))
        .bind(id)
        .bind(quantity)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row_to_profile(&row))
    }

    async fn mark_canceled(&self, id: Uuid) -> AppResult<SubscriptionProfile> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE subscriptions
            SET status = 'canceled', canceled_at = CURRENT_TIMESTAMP,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $1
            RETURNING {}
            "#,
            SELECT_COLS
        ))
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row_to_profile(&row))
    }

    async fn set_cancel_at_period_end(&self, id: Uuid) -> AppResult<SubscriptionProfile> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE subscriptions
            SET cancel_at_period_end = true, updated_at = CURRENT_TIMESTAMP
            WHERE id = $1
            RETURNING {}
            "#,
            SELECT_COLS
        ))
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row_to_profile(&row))
    }

    async fn reactivate(&self, id: Uuid) -> AppResult<SubscriptionProfile> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE subscriptions
            SET status = 'active', cancel_at_period_end = false,
                canceled_at = NULL, updated_at = CURRENT_TIMESTAMP
            WHERE id = $1
            RETURNING {}
            "#,
            SELECT_COLS
        ))
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row_to_profile(&row))
    }

    async fn update_plan(&self, id: Uuid, plan_id: Uuid) -> AppResult<SubscriptionProfile> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE subscriptions
            SET plan_id = $2, updated_at = CURRENT_TIMESTAMP
            WHERE id = $1
            RETURNING {}
            "#,
            SELECT_COLS
        ))
        .bind(id)
        .bind(plan_id)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row_to_profile(&row))
    }

    async fn search(
        &self,
        filters: &SubscriptionSearchFilters,
    ) -> AppResult<(Vec<SubscriptionProfile>, i64)> {
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM subscriptions
            WHERE ($1::subscription_status IS NULL OR status = $1)
              AND ($2::uuid IS NULL OR plan_id = $2)
            "#,
        )
        .bind(filters.status)
        .bind(filters.plan_id)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;

        let rows = sqlx::query(&format!(
            r#"
            SELECT {} FROM subscriptions
            WHERE ($1::subscription_status IS NULL OR status = $1)
              AND ($2::uuid IS NULL OR plan_id = $2)
            ORDER BY created_at DESC
            LIMIT $3 OFFSET $4
            "#,
            SELECT_COLS
        ))
        .bind(filters.status)
        .bind(filters.plan_id)
        .bind(filters.per_page)
        .bind((filters.page - 1) * filters.per_page)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;

        Ok((rows.iter().map(row_to_profile).collect(), total))
    }

    async fn list_all_with_plans(&self) -> AppResult<Vec<SubscriptionWithPlan>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {} FROM subscriptions s
            JOIN plans p ON p.id = s.plan_id
            ORDER BY s.created_at DESC
            "#,
            JOINED_COLS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(rows.into_iter().map(row_to_profile_with_plan).collect())
    }

    async fn bulk_cancel(&self, ids: &[Uuid], immediate: bool) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE subscriptions
            SET status = 'canceled',
                canceled_at = CASE WHEN $2 THEN CURRENT_TIMESTAMP ELSE canceled_at END,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = ANY($1)
            "#,
        )
        .bind(ids)
        .bind(immediate)
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(result.rows_affected())
    }

    async fn count_all(&self) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM subscriptions")
            .fetch_one(&self.pool)
            .await
            .map_err(AppError::from)?;
        Ok(count)
    }

    async fn count_active(&self) -> AppResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM subscriptions WHERE status = 'active'")
                .fetch_one(&self.pool)
                .await
                .map_err(AppError::from)?;
        Ok(count)
    }

    async fn count_active_by_user(&self, user_id: Uuid) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM subscriptions WHERE user_id = $1 AND status = 'active'",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(count)
    }

    async fn monthly_revenue(&self) -> AppResult<Decimal> {
        let revenue: Decimal = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(p.amount * s.quantity), 0)
            FROM subscriptions s
            JOIN plans p ON p.id = s.plan_id
            WHERE s.status = 'active'
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(revenue)
    }
}
