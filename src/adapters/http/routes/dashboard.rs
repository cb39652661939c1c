use axum::{Json, Router, extract::State, response::IntoResponse, routing::get};

use crate::{adapters::http::app_state::AppState, app_error::AppResult};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/revenue", get(revenue))
        .route("/subscriptions", get(subscription_counts))
}

async fn revenue(State(app_state): State<AppState>) -> AppResult<impl IntoResponse> {
    let stats = app_state.subscription_use_cases.dashboard_stats().await?;
    Ok(Json(serde_json::json!({
        "monthly_revenue": stats.monthly_revenue,
    })))
}

async fn subscription_counts(
    State(app_state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let stats = app_state.subscription_use_cases.dashboard_stats().await?;
    Ok(Json(serde_json::json!({
        "total_subscriptions": stats.total_subscriptions,
        "active_subscriptions": stats.active_subscriptions,
    })))
}
