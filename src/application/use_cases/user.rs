use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::{
        ports::payment_gateway::{BestEffort, PaymentGatewayPort},
        use_cases::{
            audit::{record_audit, AuditLogRepo, CreateAuditLogInput},
            subscription::SubscriptionRepo,
        },
        validators::is_valid_email,
    },
    domain::entities::user::UserStatus,
};

#[derive(Debug, Clone, Serialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub gateway_customer_ref: Option<String>,
    pub status: UserStatus,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct CreateUserInput {
    pub email: String,
    pub name: String,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub gateway_customer_ref: Option<String>,
}

#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<UserProfile>>;
    async fn get_by_email(&self, email: &str) -> AppResult<Option<UserProfile>>;
    async fn list(&self, email: Option<&str>) -> AppResult<Vec<UserProfile>>;
    async fn create(&self, input: &CreateUserInput) -> AppResult<UserProfile>;
}

/// A user together with their active subscription count, for detail views.
#[derive(Debug, Clone, Serialize)]
pub struct UserDetail {
    #[serde(flatten)]
    pub user: UserProfile,
    pub active_subscriptions: i64,
}

#[derive(Clone)]
pub struct UserUseCases {
    user_repo: Arc<dyn UserRepo>,
    subscription_repo: Arc<dyn SubscriptionRepo>,
    gateway: Arc<dyn PaymentGatewayPort>,
    audit_repo: Arc<dyn AuditLogRepo>,
}

impl UserUseCases {
    pub fn new(
        user_repo: Arc<dyn UserRepo>,
        subscription_repo: Arc<dyn SubscriptionRepo>,
        gateway: Arc<dyn PaymentGatewayPort>,
        audit_repo: Arc<dyn AuditLogRepo>,
    ) -> Self {
        Self {
            user_repo,
            subscription_repo,
            gateway,
            audit_repo,
        }
    }

    /// Create a user, opportunistically mirroring it to the gateway. A
    /// gateway failure leaves the customer reference empty; a duplicate
    /// email is a conflict regardless of the gateway outcome.
    #[instrument(skip(self, input), fields(email = %input.email))]
    pub async fn create(
        &self,
        mut input: CreateUserInput,
        ip_address: Option<String>,
    ) -> AppResult<UserProfile> {
        let email = input.email.trim().to_lowercase();
        if !is_valid_email(&email) {
            return Err(AppError::InvalidInput("Invalid email address".to_string()));
        }
        if input.name.trim().is_empty() {
            return Err(AppError::InvalidInput("Name is required".to_string()));
        }
        input.email = email;

        if self.user_repo.get_by_email(&input.email).await?.is_some() {
            return Err(AppError::Conflict(
                "User with this email already exists".to_string(),
            ));
        }

        match self.gateway.create_customer(&input.email, &input.name).await {
            BestEffort::Provisioned(customer_ref) => {
                input.gateway_customer_ref = Some(customer_ref.0);
            }
            BestEffort::Skipped { reason } => {
                tracing::warn!(email = %input.email, %reason, "Gateway customer creation skipped");
            }
        }

        let profile = self.user_repo.create(&input).await?;

        record_audit(
            self.audit_repo.as_ref(),
            CreateAuditLogInput {
                user_id: Some(profile.id),
                action: "USER_CREATED".to_string(),
                description: Some(format!("User {} created", profile.email)),
                metadata: serde_json::json!({
                    "email": profile.email,
                    "gateway_customer_ref": profile.gateway_customer_ref,
                }),
                ip_address,
            },
        )
        .await;

        Ok(profile)
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: Uuid) -> AppResult<UserDetail> {
        let user = self.user_repo.get_by_id(id).await?.ok_or(AppError::NotFound)?;
        let active_subscriptions = self.subscription_repo.count_active_by_user(id).await?;
        Ok(UserDetail {
            user,
            active_subscriptions,
        })
    }

    #[instrument(skip(self))]
    pub async fn list(&self, email: Option<&str>) -> AppResult<Vec<UserProfile>> {
        self.user_repo.list(email).await
    }
}
