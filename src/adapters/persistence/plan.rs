use async_trait::async_trait;
use sqlx::Row;
use uuid::Uuid;

use crate::{
    adapters::persistence::{parse_json_with_fallback, PostgresPersistence},
    app_error::{AppError, AppResult},
    application::use_cases::plan::{CreatePlanInput, PlanProfile, PlanRepo, UpdatePlanInput},
};

const SELECT_COLS: &str = r#"
    id, name, description, amount, billing_interval, trial_days, features,
    gateway_product_ref, gateway_price_ref, active, setup_fee, created_at
"#;

fn row_to_profile(row: sqlx::postgres::PgRow) -> PlanProfile {
    let id: Uuid = row.get("id");
    let features_json: serde_json::Value = row.get("features");
    let features =
        parse_json_with_fallback(&features_json, "features", "plan", &id.to_string());

    PlanProfile {
        id,
        name: row.get("name"),
        description: row.get("description"),
        amount: row.get("amount"),
        billing_interval: row.get("billing_interval"),
        trial_days: row.get("trial_days"),
        features,
        gateway_product_ref: row.get("gateway_product_ref"),
        gateway_price_ref: row.get("gateway_price_ref"),
        active: row.get("active"),
        setup_fee: row.get("setup_fee"),
        created_at: row.get("created_at"),
    }
}

/// Map a joined row whose plan columns are aliased with a `plan_` prefix.
pub(crate) fn joined_row_to_profile(row: &sqlx::postgres::PgRow) -> PlanProfile {
    let id: Uuid = row.get("plan_pk");
    let features_json: serde_json::Value = row.get("plan_features");
    let features =
        parse_json_with_fallback(&features_json, "features", "plan", &id.to_string());

    PlanProfile {
        id,
        name: row.get("plan_name"),
        description: row.get("plan_description"),
        amount: row.get("plan_amount"),
        billing_interval: row.get("plan_billing_interval"),
        trial_days: row.get("plan_trial_days"),
        features,
        gateway_product_ref: row.get("plan_gateway_product_ref"),
        gateway_price_ref: row.get("plan_gateway_price_ref"),
        active: row.get("plan_active"),
        setup_fee: row.get("plan_setup_fee"),
        created_at: row.get("plan_created_at"),
    }
}

#[async_trait]
impl PlanRepo for PostgresPersistence {
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<PlanProfile>> {
        let row = sqlx::query(&format!("SELECT {} FROM plans WHERE id = $1", SELECT_COLS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::from)?;
        Ok(row.map(row_to_profile))
    }

    async fn list_active(&self) -> AppResult<Vec<PlanProfile>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM plans WHERE active = true ORDER BY amount",
            SELECT_COLS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(rows.into_iter().map(row_to_profile).collect())
    }

    async fn create(&self, input: &CreatePlanInput) -> AppResult<PlanProfile> {
        let id = Uuid::new_v4();
        let features_json = serde_json::to_value(&input.features).unwrap_or(serde_json::json!([]));

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO plans (
                id, name, description, amount, billing_interval, trial_days, features,
                gateway_product_ref, gateway_price_ref, active, setup_fee
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, true, $10)
            RETURNING {}
            "#,
            SELECT_COLS
        ))
        .bind(id)
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.amount)
        .bind(input.billing_interval)
        .bind(input.trial_days)
        .bind(&features_json)
        .bind(&input.gateway_product_ref)
        .bind(&input.gateway_price_ref)
        .bind(input.setup_fee)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row_to_profile(row))
    }

    async fn update(&self, id: Uuid, input: &UpdatePlanInput) -> AppResult<PlanProfile> {
        let features_json = input
            .features
            .as_ref()
            .map(|f| serde_json::to_value(f).unwrap_or(serde_json::json!([])));

        let row = sqlx::query(&format!(
            r#"
            UPDATE plans SET
                name = COALESCE($2, name),
                description = COALESCE($3, description),
                amount = COALESCE($4, amount),
                trial_days = COALESCE($5, trial_days),
                features = COALESCE($6, features),
                active = COALESCE($7, active),
                setup_fee = COALESCE($8, setup_fee)
            WHERE id = $1
            RETURNING {}
            "#,
            SELECT_COLS
        ))
        .bind(id)
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.amount)
        .bind(input.trial_days)
        .bind(&features_json)
        .bind(input.active)
        .bind(input.setup_fee)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row_to_profile(row))
    }
}
