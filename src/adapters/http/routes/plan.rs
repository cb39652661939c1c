use std::net::SocketAddr;

use axum::{
    Json, Router,
    extract::{ConnectInfo, Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::get,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    adapters::http::{app_state::AppState, middleware::client_ip},
    app_error::AppResult,
    application::use_cases::plan::{CreatePlanInput, UpdatePlanInput},
    domain::entities::plan::BillingInterval,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_plans).post(create_plan))
        .route("/{id}", get(get_plan).put(update_plan))
}

#[derive(Deserialize)]
struct CreatePlanPayload {
    name: String,
    description: Option<String>,
    amount: Decimal,
    #[serde(default)]
    billing_interval: Option<String>,
    #[serde(default)]
    trial_days: i32,
    #[serde(default)]
    features: Vec<String>,
    #[serde(default)]
    setup_fee: Decimal,
}

async fn create_plan(
    State(app_state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(payload): Json<CreatePlanPayload>,
) -> AppResult<impl IntoResponse> {
    let ip = client_ip(app_state.config.trust_proxy, &headers, addr);
    let billing_interval = payload
        .billing_interval
        .as_deref()
        .map(BillingInterval::parse_or_monthly)
        .unwrap_or(BillingInterval::Monthly);
    let profile = app_state
        .plan_use_cases
        .create(
            CreatePlanInput {
                name: payload.name,
                description: payload.description,
                amount: payload.amount,
                billing_interval,
                trial_days: payload.trial_days,
                features: payload.features,
                setup_fee: payload.setup_fee,
                gateway_product_ref: None,
                gateway_price_ref: None,
            },
            Some(ip),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(profile)))
}

async fn list_plans(State(app_state): State<AppState>) -> AppResult<impl IntoResponse> {
    let plans = app_state.plan_use_cases.list_active().await?;
    Ok(Json(plans))
}

async fn get_plan(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let plan = app_state.plan_use_cases.get(id).await?;
    Ok(Json(plan))
}

#[derive(Deserialize, Default)]
struct UpdatePlanPayload {
    name: Option<String>,
    description: Option<String>,
    amount: Option<Decimal>,
    trial_days: Option<i32>,
    features: Option<Vec<String>>,
    active: Option<bool>,
    setup_fee: Option<Decimal>,
}

async fn update_plan(
    State(app_state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(payload): Json<UpdatePlanPayload>,
) -> AppResult<impl IntoResponse> {
    let ip = client_ip(app_state.config.trust_proxy, &headers, addr);
    let profile = app_state
        .plan_use_cases
        .update(
            id,
            UpdatePlanInput {
                name: payload.name,
                description: payload.description,
                amount: payload.amount,
                trial_days: payload.trial_days,
                features: payload.features,
                active: payload.active,
                setup_fee: payload.setup_fee,
            },
            Some(ip),
        )
        .await?;
    Ok(Json(profile))
}
