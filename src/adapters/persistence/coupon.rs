use async_trait::async_trait;
use sqlx::Row;
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::coupon::{CouponProfile, CouponRepo, CreateCouponInput},
};

const SELECT_COLS: &str = r#"
    id, code, discount_type, discount_value, max_uses, current_uses,
    valid_from, valid_until, gateway_coupon_ref, active, created_at
"#;

fn row_to_profile(row: sqlx::postgres::PgRow) -> CouponProfile {
    CouponProfile {
        id: row.get("id"),
        code: row.get("code"),
        discount_type: row.get("discount_type"),
        discount_value: row.get("discount_value"),
        max_uses: row.get("max_uses"),
        current_uses: row.get("current_uses"),
        valid_from: row.get("valid_from"),
        valid_until: row.get("valid_until"),
        gateway_coupon_ref: row.get("gateway_coupon_ref"),
        active: row.get("active"),
        created_at: row.get("created_at"),
    }
}

#[async_trait]
impl CouponRepo for PostgresPersistence {
    async fn get_active_by_code(&self, code: &str) -> AppResult<Option<CouponProfile>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM coupons WHERE code = $1 AND active = true",
            SELECT_COLS
        ))
        .bind(code)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row.map(row_to_profile))
    }

    async fn create(&self, input: &CreateCouponInput) -> AppResult<CouponProfile> {
        let id = Uuid::new_v4();
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO coupons (
                id, code, discount_type, discount_value, max_uses,
                current_uses, valid_from, valid_until, gateway_coupon_ref, active
            )
            VALUES ($1, $2, $3, $4, $5, 0, COALESCE($6, CURRENT_TIMESTAMP), $7, $8, true)
            RETURNING {}
            "#,
            SELECT_COLS
        ))
        .bind(id)
        .bind(&input.code)
        .bind(input.discount_type)
        .bind(input.discount_value)
        .bind(input.max_uses)
        .bind(input.valid_from)
        .bind(input.valid_until)
        .bind(&input.gateway_coupon_ref)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row_to_profile(row))
    }
}
