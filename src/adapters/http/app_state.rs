use std::sync::Arc;

use sqlx::PgPool;

use crate::{
    application::use_cases::{
        coupon::CouponUseCases, plan::PlanUseCases, subscription::SubscriptionUseCases,
        user::UserUseCases,
    },
    infra::config::AppConfig,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub pool: PgPool,
    pub user_use_cases: Arc<UserUseCases>,
    pub plan_use_cases: Arc<PlanUseCases>,
    pub coupon_use_cases: Arc<CouponUseCases>,
    pub subscription_use_cases: Arc<SubscriptionUseCases>,
}
