use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::{
        ports::payment_gateway::{
            CustomerRef, NewRemoteSubscription, PaymentGatewayPort, SubscriptionRef,
        },
        use_cases::{
            audit::{record_audit, AuditLogRepo, CreateAuditLogInput},
            coupon::CouponRepo,
            plan::{PlanProfile, PlanRepo},
            user::UserRepo,
        },
    },
    domain::entities::{coupon::CouponValidity, subscription::SubscriptionStatus},
};

#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionProfile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan_id: Uuid,
    pub gateway_subscription_ref: Option<String>,
    pub status: SubscriptionStatus,
    pub quantity: i32,
    pub current_period_start: Option<DateTime<Utc>>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub cancel_at_period_end: bool,
    pub canceled_at: Option<DateTime<Utc>>,
    pub trial_end: Option<DateTime<Utc>>,
    pub coupon_code: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Subscription joined with its plan, for listings and exports.
#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionWithPlan {
    #[serde(flatten)]
    pub subscription: SubscriptionProfile,
    pub plan: PlanProfile,
}

#[derive(Debug, Clone)]
pub struct CreateSubscriptionRecord {
    pub user_id: Uuid,
    pub plan_id: Uuid,
    pub gateway_subscription_ref: Option<String>,
    pub status: SubscriptionStatus,
    pub quantity: i32,
    pub current_period_start: DateTime<Utc>,
    pub current_period_end: DateTime<Utc>,
    pub trial_end: Option<DateTime<Utc>>,
    pub coupon_code: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SubscriptionSearchFilters {
    pub status: Option<SubscriptionStatus>,
    pub plan_id: Option<Uuid>,
    pub page: i64,
    pub per_page: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionSearchPage {
    pub subscriptions: Vec<SubscriptionProfile>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
}

#[async_trait]
pub trait SubscriptionRepo: Send + Sync {
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<SubscriptionProfile>>;
    async fn list_by_user(&self, user_id: Uuid) -> AppResult<Vec<SubscriptionWithPlan>>;
    /// Insert the subscription and, when a coupon code is given, consume
    /// one coupon use in the same transaction. Zero rows updated on the
    /// coupon means its limit was hit between validation and insert.
    async fn create(
        &self,
        record: &CreateSubscriptionRecord,
    ) -> AppResult<SubscriptionProfile>;
    async fn update_quantity(&self, id: Uuid, quantity: i32) -> AppResult<SubscriptionProfile>;
    async fn mark_canceled(&self, id: Uuid) -> AppResult<SubscriptionProfile>;
    async fn set_cancel_at_period_end(&self, id: Uuid) -> AppResult<SubscriptionProfile>;
    async fn reactivate(&self, id: Uuid) -> AppResult<SubscriptionProfile>;
    async fn update_plan(&self, id: Uuid, plan_id: Uuid) -> AppResult<SubscriptionProfile>;
    async fn search(
        &self,
        filters: &SubscriptionSearchFilters,
    ) -> AppResult<(Vec<SubscriptionProfile>, i64)>;
    async fn list_all_with_plans(&self) -> AppResult<Vec<SubscriptionWithPlan>>;
    /// Cancel every listed subscription locally without touching the
    /// gateway. Returns the number of rows updated.
    async fn bulk_cancel(&self, ids: &[Uuid], immediate: bool) -> AppResult<u64>;
    async fn count_all(&self) -> AppResult<i64>;
    async fn count_active(&self) -> AppResult<i64>;
    async fn count_active_by_user(&self, user_id: Uuid) -> AppResult<i64>;
    /// Sum of plan amount times quantity over active subscriptions.
    async fn monthly_revenue(&self) -> AppResult<Decimal>;
}

#[derive(Debug, Clone)]
pub struct CreateUsageLogInput {
    pub subscription_id: Uuid,
    pub metric: String,
    pub quantity: i32,
    pub recorded_at: DateTime<Utc>,
}

#[async_trait]
pub trait UsageLogRepo: Send + Sync {
    async fn append(&self, input: &CreateUsageLogInput) -> AppResult<Uuid>;
}

#[derive(Debug, Clone)]
pub struct CreateSubscriptionInput {
    pub user_id: Uuid,
    pub plan_id: Uuid,
    pub quantity: i32,
    pub coupon_code: Option<String>,
}

/// Created subscription plus the gateway's payment confirmation secret.
#[derive(Debug, Clone, Serialize)]
pub struct CreatedSubscription {
    #[serde(flatten)]
    pub subscription: SubscriptionProfile,
    pub client_secret: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardStats {
    pub total_subscriptions: i64,
    pub active_subscriptions: i64,
    pub monthly_revenue: Decimal,
}

#[derive(Clone)]
pub struct SubscriptionUseCases {
    user_repo: Arc<dyn UserRepo>,
    plan_repo: Arc<dyn PlanRepo>,
    coupon_repo: Arc<dyn CouponRepo>,
    subscription_repo: Arc<dyn SubscriptionRepo>,
    usage_repo: Arc<dyn UsageLogRepo>,
    audit_repo: Arc<dyn AuditLogRepo>,
    gateway: Arc<dyn PaymentGatewayPort>,
}

impl SubscriptionUseCases {
    pub fn new(
        user_repo: Arc<dyn UserRepo>,
        plan_repo: Arc<dyn PlanRepo>,
        coupon_repo: Arc<dyn CouponRepo>,
        subscription_repo: Arc<dyn SubscriptionRepo>,
        usage_repo: Arc<dyn UsageLogRepo>,
        audit_repo: Arc<dyn AuditLogRepo>,
        gateway: Arc<dyn PaymentGatewayPort>,
    ) -> Self {
        Self {
            user_repo,
            plan_repo,
            coupon_repo,
            subscription_repo,
            usage_repo,
            audit_repo,
            gateway,
        }
    }

    /// Create a subscription. The gateway call is mandatory here: if the
    /// remote subscription cannot be created, nothing is written locally,
    /// including the coupon usage counter.
    #[instrument(skip(self, input), fields(user_id = %input.user_id, plan_id = %input.plan_id))]
    pub async fn create(
        &self,
        input: CreateSubscriptionInput,
        ip_address: Option<String>,
    ) -> AppResult<CreatedSubscription> {
        if input.quantity < 1 {
            return Err(AppError::InvalidInput(
                "Quantity must be at least 1".to_string(),
            ));
        }

        let user = self
            .user_repo
            .get_by_id(input.user_id)
            .await?
            .ok_or(AppError::NotFound)?;
        let plan = self
            .plan_repo
            .get_by_id(input.plan_id)
            .await?
            .ok_or(AppError::NotFound)?;

        let now = Utc::now();

        // Validate the coupon before any gateway traffic. The counter is
        // only consumed inside the insert transaction.
        let coupon = match &input.coupon_code {
            Some(code) => {
                let coupon = self
                    .coupon_repo
                    .get_active_by_code(&code.trim().to_uppercase())
                    .await?
                    .ok_or_else(|| AppError::InvalidInput("Invalid coupon code".to_string()))?;
                match coupon.validate(now) {
                    CouponValidity::Valid { .. } => {}
                    CouponValidity::Expired => {
                        return Err(AppError::InvalidInput("Coupon expired".to_string()));
                    }
                    CouponValidity::LimitReached => {
                        return Err(AppError::InvalidInput(
                            "Coupon usage limit reached".to_string(),
                        ));
                    }
                }
                Some(coupon)
            }
            None => None,
        };

        let customer_ref = user
            .gateway_customer_ref
            .clone()
            .map(CustomerRef::new)
            .ok_or_else(|| {
                AppError::Gateway("User has no payment gateway customer".to_string())
            })?;
        let price_ref = plan.gateway_price_ref.clone().ok_or_else(|| {
            AppError::Gateway("Plan has no payment gateway price".to_string())
        })?;

        let remote = self
            .gateway
            .create_subscription(&NewRemoteSubscription {
                customer_ref,
                price_ref,
                quantity: input.quantity,
                trial_period_days: (plan.trial_days > 0).then_some(plan.trial_days),
                coupon_ref: coupon
                    .as_ref()
                    .and_then(|c| c.gateway_coupon_ref.clone()),
            })
            .await?;

        let record = CreateSubscriptionRecord {
            user_id: user.id,
            plan_id: plan.id,
            gateway_subscription_ref: Some(remote.subscription_ref.0.clone()),
            status: SubscriptionStatus::Active,
            quantity: input.quantity,
            current_period_start: now,
            current_period_end: now + Duration::days(30),
            trial_end: (plan.trial_days > 0)
                .then(|| now + Duration::days(plan.trial_days as i64)),
            coupon_code: coupon.as_ref().map(|c| c.code.clone()),
        };
        let subscription = self.subscription_repo.create(&record).await?;

        record_audit(
            self.audit_repo.as_ref(),
            CreateAuditLogInput {
                user_id: Some(user.id),
                action: "SUBSCRIPTION_CREATED".to_string(),
                description: Some(format!(
                    "Subscription to plan {} created for {}",
                    plan.name, user.email
                )),
                metadata: serde_json::json!({
                    "subscription_id": subscription.id,
                    "plan_id": plan.id,
                    "quantity": subscription.quantity,
                    "coupon_code": subscription.coupon_code,
                }),
                ip_address,
            },
        )
        .await;

        Ok(CreatedSubscription {
            subscription,
            client_secret: remote.client_secret,
        })
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: Uuid) -> AppResult<SubscriptionProfile> {
        self.subscription_repo
            .get_by_id(id)
            .await?
            .ok_or(AppError::NotFound)
    }

    #[instrument(skip(self))]
    pub async fn list_for_user(&self, user_id: Uuid) -> AppResult<Vec<SubscriptionWithPlan>> {
        if self.user_repo.get_by_id(user_id).await?.is_none() {
            return Err(AppError::NotFound);
        }
        self.subscription_repo.list_by_user(user_id).await
    }

    /// Change the seat count. Gateway first, then local; a gateway failure
    /// leaves the local row untouched.
    #[instrument(skip(self))]
    pub async fn update_quantity(
        &self,
        id: Uuid,
        quantity: i32,
        ip_address: Option<String>,
    ) -> AppResult<SubscriptionProfile> {
        if quantity < 1 {
            return Err(AppError::InvalidInput(
                "Quantity must be at least 1".to_string(),
            ));
        }
        let existing = self.get(id).await?;

        if let Some(sub_ref) = &existing.gateway_subscription_ref {
            self.gateway
                .update_quantity(&SubscriptionRef::new(sub_ref.clone()), quantity)
                .await?;
        }

        let updated = self.subscription_repo.update_quantity(id, quantity).await?;

        record_audit(
            self.audit_repo.as_ref(),
            CreateAuditLogInput {
                user_id: Some(updated.user_id),
                action: "SUBSCRIPTION_QUANTITY_UPDATED".to_string(),
                description: None,
                metadata: serde_json::json!({
                    "subscription_id": id,
                    "old_quantity": existing.quantity,
                    "new_quantity": quantity,
                }),
                ip_address,
            },
        )
        .await;

        Ok(updated)
    }

    /// Cancel a subscription. Immediate cancellation ends it now; otherwise
    /// it is flagged to lapse at the end of the current period.
    #[instrument(skip(self))]
    pub async fn cancel(
        &self,
        id: Uuid,
        immediate: bool,
        ip_address: Option<String>,
    ) -> AppResult<SubscriptionProfile> {
        let existing = self.get(id).await?;

        if let Some(sub_ref) = &existing.gateway_subscription_ref {
            self.gateway
                .cancel_subscription(&SubscriptionRef::new(sub_ref.clone()), !immediate)
                .await?;
        }

        let updated = if immediate {
            self.subscription_repo.mark_canceled(id).await?
        } else {
            self.subscription_repo.set_cancel_at_period_end(id).await?
        };

        record_audit(
            self.audit_repo.as_ref(),
            CreateAuditLogInput {
                user_id: Some(updated.user_id),
                action: "SUBSCRIPTION_CANCELED".to_string(),
                description: None,
                metadata: serde_json::json!({
                    "subscription_id": id,
                    "immediate": immediate,
                }),
                ip_address,
            },
        )
        .await;

        Ok(updated)
    }

    /// Undo a cancellation. Restores active status and clears both the
    /// period-end flag and the cancellation timestamp.
    #[instrument(skip(self))]
    pub async fn reactivate(
        &self,
        id: Uuid,
        ip_address: Option<String>,
    ) -> AppResult<SubscriptionProfile> {
        let existing = self.get(id).await?;

        if let Some(sub_ref) = &existing.gateway_subscription_ref {
            self.gateway
                .clear_cancel_at_period_end(&SubscriptionRef::new(sub_ref.clone()))
                .await?;
        }

        let updated = self.subscription_repo.reactivate(id).await?;

        record_audit(
            self.audit_repo.as_ref(),
            CreateAuditLogInput {
                user_id: Some(updated.user_id),
                action: "SUBSCRIPTION_REACTIVATED".to_string(),
                description: None,
                metadata: serde_json::json!({ "subscription_id": id }),
                ip_address,
            },
        )
        .await;

        Ok(updated)
    }

    /// Move a subscription to a different plan, prorating remotely when
    /// requested. The remote swap only happens when both the subscription
    /// and the new plan carry gateway references.
    #[instrument(skip(self))]
    pub async fn change_plan(
        &self,
        id: Uuid,
        new_plan_id: Uuid,
        prorate: bool,
        ip_address: Option<String>,
    ) -> AppResult<SubscriptionProfile> {
        let existing = self.get(id).await?;
        if existing.plan_id == new_plan_id {
            return Err(AppError::InvalidInput(
                "User is already on this plan".to_string(),
            ));
        }
        let old_plan = self
            .plan_repo
            .get_by_id(existing.plan_id)
            .await?
            .ok_or(AppError::NotFound)?;
        let new_plan = self
            .plan_repo
            .get_by_id(new_plan_id)
            .await?
            .ok_or(AppError::NotFound)?;

        if let (Some(sub_ref), Some(price_ref)) = (
            &existing.gateway_subscription_ref,
            &new_plan.gateway_price_ref,
        ) {
            self.gateway
                .change_price(&SubscriptionRef::new(sub_ref.clone()), price_ref, prorate)
                .await?;
        }

        let updated = self.subscription_repo.update_plan(id, new_plan_id).await?;

        record_audit(
            self.audit_repo.as_ref(),
            CreateAuditLogInput {
                user_id: Some(updated.user_id),
                action: "SUBSCRIPTION_PLAN_CHANGED".to_string(),
                description: Some(format!(
                    "Plan changed from {} to {}",
                    old_plan.name, new_plan.name
                )),
                metadata: serde_json::json!({
                    "subscription_id": id,
                    "old_plan_id": old_plan.id,
                    "new_plan_id": new_plan.id,
                    "prorate": prorate,
                }),
                ip_address,
            },
        )
        .await;

        Ok(updated)
    }

    #[instrument(skip(self))]
    pub async fn search(
        &self,
        filters: SubscriptionSearchFilters,
    ) -> AppResult<SubscriptionSearchPage> {
        let page = filters.page.max(1);
        let per_page = filters.per_page.clamp(1, 100);
        let filters = SubscriptionSearchFilters {
            page,
            per_page,
            ..filters
        };
        let (subscriptions, total) = self.subscription_repo.search(&filters).await?;
        Ok(SubscriptionSearchPage {
            subscriptions,
            total,
            page,
            per_page,
        })
    }

    /// Cancel many subscriptions at once, locally only. Intended for
    /// admin cleanup; the gateway is deliberately left alone.
    #[instrument(skip(self, ids), fields(count = ids.len()))]
    pub async fn bulk_cancel(
        &self,
        ids: &[Uuid],
        immediate: bool,
        ip_address: Option<String>,
    ) -> AppResult<u64> {
        if ids.is_empty() {
            return Err(AppError::InvalidInput(
                "No subscription ids given".to_string(),
            ));
        }
        let canceled = self.subscription_repo.bulk_cancel(ids, immediate).await?;

        record_audit(
            self.audit_repo.as_ref(),
            CreateAuditLogInput {
                user_id: None,
                action: "SUBSCRIPTIONS_BULK_CANCELED".to_string(),
                description: Some(format!("{} subscriptions canceled", canceled)),
                metadata: serde_json::json!({
                    "requested": ids.len(),
                    "canceled": canceled,
                    "immediate": immediate,
                }),
                ip_address,
            },
        )
        .await;

        Ok(canceled)
    }

    #[instrument(skip(self))]
    pub async fn track_usage(
        &self,
        subscription_id: Uuid,
        metric: String,
        quantity: i32,
        ip_address: Option<String>,
    ) -> AppResult<Uuid> {
        if metric.trim().is_empty() {
            return Err(AppError::InvalidInput("Metric is required".to_string()));
        }
        if quantity <= 0 {
            return Err(AppError::InvalidInput(
                "Quantity must be positive".to_string(),
            ));
        }
        let subscription = self.get(subscription_id).await?;

        let usage_id = self
            .usage_repo
            .append(&CreateUsageLogInput {
                subscription_id,
                metric: metric.clone(),
                quantity,
                recorded_at: Utc::now(),
            })
            .await?;

        record_audit(
            self.audit_repo.as_ref(),
            CreateAuditLogInput {
                user_id: Some(subscription.user_id),
                action: "USAGE_RECORDED".to_string(),
                description: None,
                metadata: serde_json::json!({
                    "subscription_id": subscription_id,
                    "metric": metric,
                    "quantity": quantity,
                }),
                ip_address,
            },
        )
        .await;

        Ok(usage_id)
    }

    #[instrument(skip(self))]
    pub async fn dashboard_stats(&self) -> AppResult<DashboardStats> {
        let total_subscriptions = self.subscription_repo.count_all().await?;
        let active_subscriptions = self.subscription_repo.count_active().await?;
        let monthly_revenue = self.subscription_repo.monthly_revenue().await?;
        Ok(DashboardStats {
            total_subscriptions,
            active_subscriptions,
            monthly_revenue,
        })
    }

    #[instrument(skip(self))]
    pub async fn list_all(&self) -> AppResult<Vec<SubscriptionWithPlan>> {
        self.subscription_repo.list_all_with_plans().await
    }

    /// Export all subscriptions as CSV
    #[instrument(skip(self))]
    pub async fn export_csv(&self) -> AppResult<String> {
        let rows = self.subscription_repo.list_all_with_plans().await?;

        let mut csv = String::new();
        csv.push_str("Id,User Id,Plan,Status,Quantity,Period End,Coupon,Created At\n");

        for row in rows {
            let period_end = row
                .subscription
                .current_period_end
                .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_default();
            let created = row
                .subscription
                .created_at
                .format("%Y-%m-%d %H:%M:%S")
                .to_string();

            // Escape all user-provided fields, including formula injection prevention
            let plan = escape_csv_field(&row.plan.name);
            let coupon = escape_csv_field(row.subscription.coupon_code.as_deref().unwrap_or(""));

            csv.push_str(&format!(
                "{},{},{},{},{},{},{},{}\n",
                row.subscription.id,
                row.subscription.user_id,
                plan,
                row.subscription.status.as_str(),
                row.subscription.quantity,
                period_end,
                coupon,
                created
            ));
        }

        Ok(csv)
    }
}

/// Escape a field for CSV output, including formula injection prevention.
/// Spreadsheet applications (Excel, Google Sheets, etc.) will execute formulas
/// starting with =, +, -, @, tab, or carriage return. We prefix such values
/// with a single quote to prevent formula execution.
fn escape_csv_field(field: &str) -> String {
    let needs_quoting =
        field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r');

    let is_formula = field
        .chars()
        .next()
        .map(|c| matches!(c, '=' | '+' | '-' | '@' | '\t' | '\r'))
        .unwrap_or(false);

    let escaped = if is_formula {
        format!("'{}", field)
    } else {
        field.to_string()
    };

    if needs_quoting || is_formula {
        format!("\"{}\"", escaped.replace('"', "\"\""))
    } else {
        escaped
    }
}
