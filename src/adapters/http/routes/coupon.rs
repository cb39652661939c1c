use std::net::SocketAddr;

use axum::{
    Json, Router,
    extract::{ConnectInfo, Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::{
    adapters::http::{app_state::AppState, middleware::client_ip},
    app_error::{AppError, AppResult},
    application::use_cases::coupon::CreateCouponInput,
    domain::entities::coupon::{CouponValidity, DiscountType},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_coupon))
        .route("/{code}/validate", post(validate_coupon))
}

#[derive(Deserialize)]
struct CreateCouponPayload {
    code: String,
    discount_type: String,
    discount_value: Decimal,
    max_uses: Option<i32>,
    valid_from: Option<DateTime<Utc>>,
    valid_until: Option<DateTime<Utc>>,
}

async fn create_coupon(
    State(app_state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(payload): Json<CreateCouponPayload>,
) -> AppResult<impl IntoResponse> {
    let ip = client_ip(app_state.config.trust_proxy, &headers, addr);
    let discount_type = DiscountType::parse(&payload.discount_type)
        .ok_or_else(|| AppError::InvalidInput("Invalid discount type".to_string()))?;
    let profile = app_state
        .coupon_use_cases
        .create(
            CreateCouponInput {
                code: payload.code,
                discount_type,
                discount_value: payload.discount_value,
                max_uses: payload.max_uses,
                valid_from: payload.valid_from,
                valid_until: payload.valid_until,
                gateway_coupon_ref: None,
            },
            Some(ip),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(profile)))
}

async fn validate_coupon(
    State(app_state): State<AppState>,
    Path(code): Path<String>,
) -> AppResult<impl IntoResponse> {
    let validity = app_state
        .coupon_use_cases
        .validate(&code, Utc::now())
        .await?;
    match validity {
        CouponValidity::Valid {
            discount_type,
            discount_value,
        } => Ok(Json(serde_json::json!({
            "valid": true,
            "discount_type": discount_type.as_str(),
            "discount_value": discount_value,
        }))),
        CouponValidity::Expired => Err(AppError::InvalidInput("Coupon expired".to_string())),
        CouponValidity::LimitReached => Err(AppError::InvalidInput(
            "Coupon usage limit reached".to_string(),
        )),
    }
}
