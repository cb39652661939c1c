use std::fs::File;
use std::sync::Arc;

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    adapters::http::app_state::AppState,
    application::{
        ports::payment_gateway::PaymentGatewayPort,
        use_cases::{
            audit::AuditLogRepo,
            coupon::{CouponRepo, CouponUseCases},
            plan::{PlanRepo, PlanUseCases},
            subscription::{SubscriptionRepo, SubscriptionUseCases, UsageLogRepo},
            user::{UserRepo, UserUseCases},
        },
    },
    infra::{
        config::AppConfig, postgres_persistence, stripe_client::StripeClient,
        stripe_gateway::StripeGateway,
    },
};

pub async fn init_app_state() -> anyhow::Result<AppState> {
    let config = AppConfig::from_env();

    let postgres_arc = Arc::new(postgres_persistence(&config.database_url).await?);

    let stripe_client = StripeClient::new(
        config.stripe_secret_key.clone(),
        config.gateway_timeout,
    );
    let gateway: Arc<dyn PaymentGatewayPort> =
        Arc::new(StripeGateway::new(stripe_client, config.currency.clone()));

    let user_repo = postgres_arc.clone() as Arc<dyn UserRepo>;
    let plan_repo = postgres_arc.clone() as Arc<dyn PlanRepo>;
    let coupon_repo = postgres_arc.clone() as Arc<dyn CouponRepo>;
    let subscription_repo = postgres_arc.clone() as Arc<dyn SubscriptionRepo>;
    let usage_repo = postgres_arc.clone() as Arc<dyn UsageLogRepo>;
    let audit_repo = postgres_arc.clone() as Arc<dyn AuditLogRepo>;

    let user_use_cases = UserUseCases::new(
        user_repo.clone(),
        subscription_repo.clone(),
        gateway.clone(),
        audit_repo.clone(),
    );
    let plan_use_cases = PlanUseCases::new(plan_repo.clone(), gateway.clone(), audit_repo.clone());
    let coupon_use_cases =
        CouponUseCases::new(coupon_repo.clone(), gateway.clone(), audit_repo.clone());
    let subscription_use_cases = SubscriptionUseCases::new(
        user_repo,
        plan_repo,
        coupon_repo,
        subscription_repo,
        usage_repo,
        audit_repo,
        gateway,
    );

    Ok(AppState {
        config: Arc::new(config),
        pool: postgres_arc.pool().clone(),
        user_use_cases: Arc::new(user_use_cases),
        plan_use_cases: Arc::new(plan_use_cases),
        coupon_use_cases: Arc::new(coupon_use_cases),
        subscription_use_cases: Arc::new(subscription_use_cases),
    })
}

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "subledger=debug,tower_http=debug".into());

    // Console (pretty logs)
    let console_layer = fmt::layer()
        .with_target(false)
        .with_level(true)
        .pretty();

    // File (structured JSON logs)
    let file = File::create("app.log").expect("cannot create log file");
    let json_layer = fmt::layer()
        .json()
        .with_writer(file)
        .with_current_span(true)
        .with_span_list(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(json_layer)
        .try_init()
        .ok();
}
