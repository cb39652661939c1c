use std::net::SocketAddr;

use axum::{
    Json, Router,
    extract::{ConnectInfo, Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
    routing::{get, post, put},
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    adapters::http::{app_state::AppState, middleware::client_ip},
    app_error::{AppError, AppResult},
    application::use_cases::subscription::{
        CreateSubscriptionInput, SubscriptionSearchFilters,
    },
    domain::entities::subscription::SubscriptionStatus,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_subscription))
        .route("/search", get(search_subscriptions))
        .route("/bulk-cancel", post(bulk_cancel))
        .route("/{id}", get(get_subscription))
        .route("/{id}/quantity", put(update_quantity))
        .route("/{id}/cancel", post(cancel_subscription))
        .route("/{id}/reactivate", post(reactivate_subscription))
        .route("/{id}/change-plan", put(change_plan))
        .route("/{id}/usage", post(track_usage))
}

#[derive(Deserialize)]
struct CreateSubscriptionPayload {
    user_id: Uuid,
    plan_id: Uuid,
    #[serde(default = "default_quantity")]
    quantity: i32,
    coupon_code: Option<String>,
}

fn default_quantity() -> i32 {
    1
}

async fn create_subscription(
    State(app_state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(payload): Json<CreateSubscriptionPayload>,
) -> AppResult<impl IntoResponse> {
    let ip = client_ip(app_state.config.trust_proxy, &headers, addr);
    let created = app_state
        .subscription_use_cases
        .create(
            CreateSubscriptionInput {
                user_id: payload.user_id,
                plan_id: payload.plan_id,
                quantity: payload.quantity,
                coupon_code: payload.coupon_code,
            },
            Some(ip),
        )
        .await?;

    let mut body = serde_json::to_value(&created.subscription)
        .map_err(|e| AppError::Internal(e.to_string()))?;
    // Clients without a pending payment still get a stable marker value.
    body["client_secret"] = serde_json::Value::String(
        created
            .client_secret
            .unwrap_or_else(|| "no_payment_required".to_string()),
    );
    Ok((StatusCode::CREATED, Json(body)))
}

async fn get_subscription(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let subscription = app_state.subscription_use_cases.get(id).await?;
    Ok(Json(subscription))
}

#[derive(Deserialize)]
struct UpdateQuantityPayload {
    quantity: i32,
}

async fn update_quantity(
    State(app_state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(payload): Json<UpdateQuantityPayload>,
) -> AppResult<impl IntoResponse> {
    let ip = client_ip(app_state.config.trust_proxy, &headers, addr);
    let subscription = app_state
        .subscription_use_cases
        .update_quantity(id, payload.quantity, Some(ip))
        .await?;
    Ok(Json(subscription))
}

#[derive(Deserialize, Default)]
struct CancelPayload {
    #[serde(default)]
    immediate: bool,
}

async fn cancel_subscription(
    State(app_state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    payload: Option<Json<CancelPayload>>,
) -> AppResult<impl IntoResponse> {
    let ip = client_ip(app_state.config.trust_proxy, &headers, addr);
    let immediate = payload.map(|Json(p)| p.immediate).unwrap_or(false);
    let subscription = app_state
        .subscription_use_cases
        .cancel(id, immediate, Some(ip))
        .await?;
    Ok(Json(subscription))
}

async fn reactivate_subscription(
    State(app_state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> AppResult<impl IntoResponse> {
    let ip = client_ip(app_state.config.trust_proxy, &headers, addr);
    let subscription = app_state
        .subscription_use_cases
        .reactivate(id, Some(ip))
        .await?;
    Ok(Json(subscription))
}

#[derive(Deserialize)]
struct ChangePlanPayload {
    plan_id: Uuid,
    #[serde(default = "default_prorate")]
    prorate: bool,
}

fn default_prorate() -> bool {
    true
}

async fn change_plan(
    State(app_state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(payload): Json<ChangePlanPayload>,
) -> AppResult<impl IntoResponse> {
    let ip = client_ip(app_state.config.trust_proxy, &headers, addr);
    let subscription = app_state
        .subscription_use_cases
        .change_plan(id, payload.plan_id, payload.prorate, Some(ip))
        .await?;
    Ok(Json(subscription))
}

#[derive(Deserialize)]
struct SearchQuery {
    status: Option<String>,
    plan_id: Option<Uuid>,
    #[serde(default = "default_page")]
    page: i64,
    #[serde(default = "default_per_page")]
    per_page: i64,
}

fn default_page() -> i64 {
    1
}

fn default_per_page() -> i64 {
    20
}

async fn search_subscriptions(
    State(app_state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> AppResult<impl IntoResponse> {
    let status = match query.status.as_deref() {
        Some(s) => Some(
            SubscriptionStatus::parse(s)
                .ok_or_else(|| AppError::InvalidInput("Invalid status filter".to_string()))?,
        ),
        None => None,
    };
    let page = app_state
        .subscription_use_cases
        .search(SubscriptionSearchFilters {
            status,
            plan_id: query.plan_id,
            page: query.page,
            per_page: query.per_page,
        })
        .await?;
    Ok(Json(page))
}

#[derive(Deserialize)]
struct BulkCancelPayload {
    subscription_ids: Vec<Uuid>,
    #[serde(default)]
    immediate: bool,
}

async fn bulk_cancel(
    State(app_state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(payload): Json<BulkCancelPayload>,
) -> AppResult<impl IntoResponse> {
    let ip = client_ip(app_state.config.trust_proxy, &headers, addr);
    let canceled = app_state
        .subscription_use_cases
        .bulk_cancel(&payload.subscription_ids, payload.immediate, Some(ip))
        .await?;
    Ok(Json(serde_json::json!({
        "requested": payload.subscription_ids.len(),
        "canceled": canceled,
    })))
}

#[derive(Deserialize)]
struct TrackUsagePayload {
    #[serde(default = "default_metric")]
    metric: String,
    quantity: i32,
}

fn default_metric() -> String {
    "usage".to_string()
}

async fn track_usage(
    State(app_state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(payload): Json<TrackUsagePayload>,
) -> AppResult<impl IntoResponse> {
    let ip = client_ip(app_state.config.trust_proxy, &headers, addr);
    let usage_id = app_state
        .subscription_use_cases
        .track_usage(id, payload.metric, payload.quantity, Some(ip))
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "id": usage_id })),
    ))
}

#[derive(Deserialize)]
pub struct ExportQuery {
    #[serde(default = "default_format")]
    format: String,
}

fn default_format() -> String {
    "json".to_string()
}

pub async fn export(
    State(app_state): State<AppState>,
    Query(query): Query<ExportQuery>,
) -> AppResult<axum::response::Response> {
    match query.format.as_str() {
        "json" => {
            let rows = app_state.subscription_use_cases.list_all().await?;
            Ok(Json(rows).into_response())
        }
        "csv" => {
            let csv = app_state.subscription_use_cases.export_csv().await?;
            Ok((
                [
                    (header::CONTENT_TYPE, "text/csv"),
                    (
                        header::CONTENT_DISPOSITION,
                        "attachment; filename=\"subscriptions.csv\"",
                    ),
                ],
                csv,
            )
                .into_response())
        }
        _ => Err(AppError::InvalidInput(
            "Format must be json or csv".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_payload_accepts_quantity_only() {
        let payload: TrackUsagePayload =
            serde_json::from_value(serde_json::json!({ "quantity": 5 })).unwrap();
        assert_eq!(payload.metric, "usage");
        assert_eq!(payload.quantity, 5);
    }

    #[test]
    fn usage_payload_keeps_explicit_metric() {
        let payload: TrackUsagePayload =
            serde_json::from_value(serde_json::json!({ "metric": "api_calls", "quantity": 2 }))
                .unwrap();
        assert_eq!(payload.metric, "api_calls");
    }
}
