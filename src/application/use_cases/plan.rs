use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::{
        ports::payment_gateway::{BestEffort, PaymentGatewayPort},
        use_cases::audit::{record_audit, AuditLogRepo, CreateAuditLogInput},
    },
    domain::entities::plan::BillingInterval,
};

#[derive(Debug, Clone, Serialize)]
pub struct PlanProfile {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub amount: Decimal,
    pub billing_interval: BillingInterval,
    pub trial_days: i32,
    pub features: Vec<String>,
    pub gateway_product_ref: Option<String>,
    pub gateway_price_ref: Option<String>,
    pub active: bool,
    pub setup_fee: Decimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreatePlanInput {
    pub name: String,
    pub description: Option<String>,
    pub amount: Decimal,
    pub billing_interval: BillingInterval,
    pub trial_days: i32,
    pub features: Vec<String>,
    pub setup_fee: Decimal,
    pub gateway_product_ref: Option<String>,
    pub gateway_price_ref: Option<String>,
}

/// Partial update; `None` fields keep their current value.
#[derive(Debug, Clone, Default)]
pub struct UpdatePlanInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub amount: Option<Decimal>,
    pub trial_days: Option<i32>,
    pub features: Option<Vec<String>>,
    pub active: Option<bool>,
    pub setup_fee: Option<Decimal>,
}

#[async_trait]
pub trait PlanRepo: Send + Sync {
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<PlanProfile>>;
    async fn list_active(&self) -> AppResult<Vec<PlanProfile>>;
    async fn create(&self, input: &CreatePlanInput) -> AppResult<PlanProfile>;
    async fn update(&self, id: Uuid, input: &UpdatePlanInput) -> AppResult<PlanProfile>;
}

#[derive(Clone)]
pub struct PlanUseCases {
    plan_repo: Arc<dyn PlanRepo>,
    gateway: Arc<dyn PaymentGatewayPort>,
    audit_repo: Arc<dyn AuditLogRepo>,
}

impl PlanUseCases {
    pub fn new(
        plan_repo: Arc<dyn PlanRepo>,
        gateway: Arc<dyn PaymentGatewayPort>,
        audit_repo: Arc<dyn AuditLogRepo>,
    ) -> Self {
        Self {
            plan_repo,
            gateway,
            audit_repo,
        }
    }

    /// Create a plan and opportunistically provision the matching product
    /// and price in the gateway. Plans without gateway refs cannot back
    /// new subscriptions until backfilled.
    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create(
        &self,
        mut input: CreatePlanInput,
        ip_address: Option<String>,
    ) -> AppResult<PlanProfile> {
        if input.name.trim().is_empty() {
            return Err(AppError::InvalidInput("Plan name is required".to_string()));
        }
        if input.amount < Decimal::ZERO {
            return Err(AppError::InvalidInput(
                "Amount must not be negative".to_string(),
            ));
        }

        match self
            .gateway
            .create_product_and_price(&input.name, input.amount, input.billing_interval)
            .await
        {
            BestEffort::Provisioned(refs) => {
                input.gateway_product_ref = Some(refs.product_ref);
                input.gateway_price_ref = Some(refs.price_ref);
            }
            BestEffort::Skipped { reason } => {
                tracing::warn!(name = %input.name, %reason, "Gateway product creation skipped");
            }
        }

        let profile = self.plan_repo.create(&input).await?;

        record_audit(
            self.audit_repo.as_ref(),
            CreateAuditLogInput {
                user_id: None,
                action: "PLAN_CREATED".to_string(),
                description: Some(format!("Plan {} created", profile.name)),
                metadata: serde_json::json!({
                    "plan_id": profile.id,
                    "amount": profile.amount,
                    "billing_interval": profile.billing_interval.as_str(),
                }),
                ip_address,
            },
        )
        .await;

        Ok(profile)
    }

    #[instrument(skip(self, input))]
    pub async fn update(
        &self,
        id: Uuid,
        input: UpdatePlanInput,
        ip_address: Option<String>,
    ) -> AppResult<PlanProfile> {
        if let Some(amount) = input.amount {
            if amount < Decimal::ZERO {
                return Err(AppError::InvalidInput(
                    "Amount must not be negative".to_string(),
                ));
            }
        }
        if self.plan_repo.get_by_id(id).await?.is_none() {
            return Err(AppError::NotFound);
        }

        let profile = self.plan_repo.update(id, &input).await?;

        record_audit(
            self.audit_repo.as_ref(),
            CreateAuditLogInput {
                user_id: None,
                action: "PLAN_UPDATED".to_string(),
                description: Some(format!("Plan {} updated", profile.name)),
                metadata: serde_json::json!({ "plan_id": profile.id }),
                ip_address,
            },
        )
        .await;

        Ok(profile)
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: Uuid) -> AppResult<PlanProfile> {
        self.plan_repo.get_by_id(id).await?.ok_or(AppError::NotFound)
    }

    #[instrument(skip(self))]
    pub async fn list_active(&self) -> AppResult<Vec<PlanProfile>> {
        self.plan_repo.list_active().await
    }
}
