use std::net::SocketAddr;

use axum::{
    Json, Router,
    extract::{ConnectInfo, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::get,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    adapters::http::{app_state::AppState, middleware::client_ip},
    app_error::AppResult,
    application::use_cases::user::CreateUserInput,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route("/{id}", get(get_user))
        .route("/{id}/subscriptions", get(list_user_subscriptions))
}

#[derive(Deserialize)]
struct CreateUserPayload {
    email: String,
    name: String,
    phone: Option<String>,
    company: Option<String>,
}

async fn create_user(
    State(app_state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(payload): Json<CreateUserPayload>,
) -> AppResult<impl IntoResponse> {
    let ip = client_ip(app_state.config.trust_proxy, &headers, addr);
    let profile = app_state
        .user_use_cases
        .create(
            CreateUserInput {
                email: payload.email,
                name: payload.name,
                phone: payload.phone,
                company: payload.company,
                gateway_customer_ref: None,
            },
            Some(ip),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(profile)))
}

#[derive(Deserialize)]
struct ListUsersQuery {
    email: Option<String>,
}

async fn list_users(
    State(app_state): State<AppState>,
    Query(query): Query<ListUsersQuery>,
) -> AppResult<impl IntoResponse> {
    let users = app_state
        .user_use_cases
        .list(query.email.as_deref())
        .await?;
    Ok(Json(users))
}

async fn get_user(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let detail = app_state.user_use_cases.get(id).await?;
    Ok(Json(detail))
}

async fn list_user_subscriptions(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let subscriptions = app_state.subscription_use_cases.list_for_user(id).await?;
    Ok(Json(subscriptions))
}
