pub mod coupon;
pub mod dashboard;
pub mod plan;
pub mod subscription;
pub mod user;

use axum::{Router, extract::State, routing::get};

use crate::{adapters::http::app_state::AppState, app_error::AppResult};

pub fn router() -> Router<AppState> {
    Router::new()
        .nest("/users", user::router())
        .nest("/plans", plan::router())
        .nest("/coupons", coupon::router())
        .nest("/subscriptions", subscription::router())
        .nest("/dashboard", dashboard::router())
        .route("/export/subscriptions", get(subscription::export))
}

/// Liveness probe; checks the database connection.
pub async fn health(State(app_state): State<AppState>) -> AppResult<axum::Json<serde_json::Value>> {
    sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(&app_state.pool)
        .await
        .map_err(crate::app_error::AppError::from)?;
    Ok(axum::Json(serde_json::json!({ "status": "healthy" })))
}
