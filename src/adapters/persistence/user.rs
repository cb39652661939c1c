use async_trait::async_trait;
use sqlx::Row;
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::user::{CreateUserInput, UserProfile, UserRepo},
};

const SELECT_COLS: &str = r#"
    id, email, name, phone, company, gateway_customer_ref,
    status, created_at, last_login
"#;

fn row_to_profile(row: sqlx::postgres::PgRow) -> UserProfile {
    UserProfile {
        id: row.get("id"),
        email: row.get("email"),
        name: row.get("name"),
        phone: row.get("phone"),
        company: row.get("company"),
        gateway_customer_ref: row.get("gateway_customer_ref"),
        status: row.get("status"),
        created_at: row.get("created_at"),
        last_login: row.get("last_login"),
    }
}

#[async_trait]
impl UserRepo for PostgresPersistence {
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<UserProfile>> {
        let row = sqlx::query(&format!("SELECT {} FROM users WHERE id = $1", SELECT_COLS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::from)?;
        Ok(row.map(row_to_profile))
    }

    async fn get_by_email(&self, email: &str) -> AppResult<Option<UserProfile>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM users WHERE email = $1",
            SELECT_COLS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row.map(row_to_profile))
    }

    async fn list(&self, email: Option<&str>) -> AppResult<Vec<UserProfile>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM users WHERE $1::text IS NULL OR email = $1 ORDER BY created_at DESC",
            SELECT_COLS
        ))
        .bind(email)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(rows.into_iter().map(row_to_profile).collect())
    }

    async fn create(&self, input: &CreateUserInput) -> AppResult<UserProfile> {
        let id = Uuid::new_v4();
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO users (id, email, name, phone, company, gateway_customer_ref, status)
            VALUES ($1, $2, $3, $4, $5, $6, 'active')
            RETURNING {}
            "#,
            SELECT_COLS
        ))
        .bind(id)
        .bind(&input.email)
        .bind(&input.name)
        .bind(&input.phone)
        .bind(&input.company)
        .bind(&input.gateway_customer_ref)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row_to_profile(row))
    }
}
