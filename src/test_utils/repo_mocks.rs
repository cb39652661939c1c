//! In-memory mock implementations for repository traits.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::use_cases::{
        audit::{AuditLogRepo, CreateAuditLogInput},
        coupon::{CouponProfile, CouponRepo, CreateCouponInput},
        plan::{CreatePlanInput, PlanProfile, PlanRepo, UpdatePlanInput},
        subscription::{
            CreateSubscriptionRecord, CreateUsageLogInput, SubscriptionProfile,
            SubscriptionRepo, SubscriptionSearchFilters, SubscriptionWithPlan, UsageLogRepo,
        },
        user::{CreateUserInput, UserProfile, UserRepo},
    },
    domain::entities::{subscription::SubscriptionStatus, user::UserStatus},
    test_utils::factories::create_test_plan,
};

/// In-memory implementation of UserRepo for testing.
#[derive(Default)]
pub struct InMemoryUserRepo {
    pub users: Mutex<HashMap<Uuid, UserProfile>>,
}

impl InMemoryUserRepo {
    pub fn insert(&self, user: UserProfile) {
        self.users.lock().unwrap().insert(user.id, user);
    }
}

#[async_trait]
impl UserRepo for InMemoryUserRepo {
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<UserProfile>> {
        Ok(self.users.lock().unwrap().get(&id).cloned())
    }

    async fn get_by_email(&self, email: &str) -> AppResult<Option<UserProfile>> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn list(&self, email: Option<&str>) -> AppResult<Vec<UserProfile>> {
        let users = self.users.lock().unwrap();
        Ok(users
            .values()
            .filter(|u| email.is_none_or(|e| u.email == e))
            .cloned()
            .collect())
    }

    async fn create(&self, input: &CreateUserInput) -> AppResult<UserProfile> {
        let mut users = self.users.lock().unwrap();
        if users.values().any(|u| u.email == input.email) {
            return Err(AppError::Conflict(
                "User with this email already exists".into(),
            ));
        }
        let profile = UserProfile {
            id: Uuid::new_v4(),
            email: input.email.clone(),
            name: input.name.clone(),
            phone: input.phone.clone(),
            company: input.company.clone(),
            gateway_customer_ref: input.gateway_customer_ref.clone(),
            status: UserStatus::Active,
            created_at: Utc::now(),
            last_login: None,
        };
        users.insert(profile.id, profile.clone());
        Ok(profile)
    }
}

/// In-memory implementation of PlanRepo for testing.
#[derive(Default)]
pub struct InMemoryPlanRepo {
    pub plans: Mutex<HashMap<Uuid, PlanProfile>>,
}

impl InMemoryPlanRepo {
    pub fn insert(&self, plan: PlanProfile) {
        self.plans.lock().unwrap().insert(plan.id, plan);
    }
}

#[async_trait]
impl PlanRepo for InMemoryPlanRepo {
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<PlanProfile>> {
        Ok(self.plans.lock().unwrap().get(&id).cloned())
    }

    async fn list_active(&self) -> AppResult<Vec<PlanProfile>> {
        Ok(self
            .plans
            .lock()
            .unwrap()
            .values()
            .filter(|p| p.active)
            .cloned()
            .collect())
    }

    async fn create(&self, input: &CreatePlanInput) -> AppResult<PlanProfile> {
        let profile = PlanProfile {
            id: Uuid::new_v4(),
            name: input.name.clone(),
            description: input.description.clone(),
            amount: input.amount,
            billing_interval: input.billing_interval,
            trial_days: input.trial_days,
            features: input.features.clone(),
            gateway_product_ref: input.gateway_product_ref.clone(),
            gateway_price_ref: input.gateway_price_ref.clone(),
            active: true,
            setup_fee: input.setup_fee,
            created_at: Utc::now(),
        };
        self.plans
            .lock()
            .unwrap()
            .insert(profile.id, profile.clone());
        Ok(profile)
    }

    async fn update(&self, id: Uuid, input: &UpdatePlanInput) -> AppResult<PlanProfile> {
        let mut plans = self.plans.lock().unwrap();
        let plan = plans.get_mut(&id).ok_or(AppError::NotFound)?;
        if let Some(name) = &input.name {
            plan.name = name.clone();
        }
        if let Some(description) = &input.description {
            plan.description = Some(description.clone());
        }
        if let Some(amount) = input.amount {
            plan.amount = amount;
        }
        if let Some(trial_days) = input.trial_days {
            plan.trial_days = trial_days;
        }
        if let Some(features) = &input.features {
            plan.features = features.clone();
        }
        if let Some(active) = input.active {
            plan.active = active;
        }
        if let Some(setup_fee) = input.setup_fee {
            plan.setup_fee = setup_fee;
        }
        Ok(plan.clone())
    }
}

/// In-memory implementation of CouponRepo for testing.
#[derive(Default)]
pub struct InMemoryCouponRepo {
    pub coupons: Mutex<HashMap<Uuid, CouponProfile>>,
}

impl InMemoryCouponRepo {
    pub fn insert(&self, coupon: CouponProfile) {
        self.coupons.lock().unwrap().insert(coupon.id, coupon);
    }

    /// Consume one use, mirroring the conditional UPDATE the real store
    /// runs inside the subscription insert transaction.
    pub fn try_consume_use(&self, code: &str) -> bool {
        let mut coupons = self.coupons.lock().unwrap();
        let Some(coupon) = coupons
            .values_mut()
            .find(|c| c.code == code && c.active)
        else {
            return false;
        };
        if coupon
            .max_uses
            .is_some_and(|max| coupon.current_uses >= max)
        {
            return false;
        }
        coupon.current_uses += 1;
        true
    }
}

#[async_trait]
impl CouponRepo for InMemoryCouponRepo {
    async fn get_active_by_code(&self, code: &str) -> AppResult<Option<CouponProfile>> {
        Ok(self
            .coupons
            .lock()
            .unwrap()
            .values()
            .find(|c| c.code == code && c.active)
            .cloned())
    }

    async fn create(&self, input: &CreateCouponInput) -> AppResult<CouponProfile> {
        let mut coupons = self.coupons.lock().unwrap();
        if coupons.values().any(|c| c.code == input.code) {
            return Err(AppError::Conflict(
                "Coupon with this code already exists".into(),
            ));
        }
        let profile = CouponProfile {
            id: Uuid::new_v4(),
            code: input.code.clone(),
            discount_type: input.discount_type,
            discount_value: input.discount_value,
            max_uses: input.max_uses,
            current_uses: 0,
            valid_from: input.valid_from.unwrap_or_else(Utc::now),
            valid_until: input.valid_until,
            gateway_coupon_ref: input.gateway_coupon_ref.clone(),
            active: true,
            created_at: Utc::now(),
        };
        coupons.insert(profile.id, profile.clone());
        Ok(profile)
    }
}

/// In-memory implementation of SubscriptionRepo for testing.
///
/// Optionally shares the coupon and plan repos so the conditional
/// use-consumption in `create` and the plan joins behave like the real
/// store.
#[derive(Default)]
pub struct InMemorySubscriptionRepo {
    pub subscriptions: Mutex<HashMap<Uuid, SubscriptionProfile>>,
    coupons: Option<Arc<InMemoryCouponRepo>>,
    plans: Option<Arc<InMemoryPlanRepo>>,
}

impl InMemorySubscriptionRepo {
    pub fn with_stores(
        coupons: Arc<InMemoryCouponRepo>,
        plans: Arc<InMemoryPlanRepo>,
    ) -> Self {
        Self {
            coupons: Some(coupons),
            plans: Some(plans),
            ..Default::default()
        }
    }

    pub fn insert(&self, subscription: SubscriptionProfile) {
        self.subscriptions
            .lock()
            .unwrap()
            .insert(subscription.id, subscription);
    }

    fn plan_for(&self, plan_id: Uuid) -> PlanProfile {
        self.plans
            .as_ref()
            .and_then(|p| p.plans.lock().unwrap().get(&plan_id).cloned())
            .unwrap_or_else(|| create_test_plan(|p| p.id = plan_id))
    }
}

#[async_trait]
impl SubscriptionRepo for InMemorySubscriptionRepo {
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<SubscriptionProfile>> {
        Ok(self.subscriptions.lock().unwrap().get(&id).cloned())
    }

    async fn list_by_user(&self, user_id: Uuid) -> AppResult<Vec<SubscriptionWithPlan>> {
        let subs: Vec<SubscriptionProfile> = self
            .subscriptions
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        Ok(subs
            .into_iter()
            .map(|s| {
                let plan = self.plan_for(s.plan_id);
                SubscriptionWithPlan {
                    subscription: s,
                    plan,
                }
            })
            .collect())
    }

    async fn create(
        &self,
        record: &CreateSubscriptionRecord,
    ) -> AppResult<SubscriptionProfile> {
        if let (Some(code), Some(coupons)) = (&record.coupon_code, &self.coupons) {
            if !coupons.try_consume_use(code) {
                return Err(AppError::InvalidInput(
                    "Coupon usage limit reached".into(),
                ));
            }
        }
        let now = Utc::now();
        let profile = SubscriptionProfile {
            id: Uuid::new_v4(),
            user_id: record.user_id,
            plan_id: record.plan_id,
            gateway_subscription_ref: record.gateway_subscription_ref.clone(),
            status: record.status,
            quantity: record.quantity,
            current_period_start: Some(record.current_period_start),
            current_period_end: Some(record.current_period_end),
            cancel_at_period_end: false,
            canceled_at: None,
            trial_end: record.trial_end,
            coupon_code: record.coupon_code.clone(),
            created_at: now,
            updated_at: now,
        };
        self.subscriptions
            .lock()
            .unwrap()
            .insert(profile.id, profile.clone());
        Ok(profile)
    }

    async fn update_quantity(&self, id: Uuid, quantity: i32) -> AppResult<SubscriptionProfile> {
        let mut subs = self.subscriptions.lock().unwrap();
        let sub = subs.get_mut(&id).ok_or(AppError::NotFound)?;
        sub.quantity = quantity;
        sub.updated_at = Utc::now();
        Ok(sub.clone())
    }

    async fn mark_canceled(&self, id: Uuid) -> AppResult<SubscriptionProfile> {
        let mut subs = self.subscriptions.lock().unwrap();
        let sub = subs.get_mut(&id).ok_or(AppError::NotFound)?;
        sub.status = SubscriptionStatus::Canceled;
        sub.canceled_at = Some(Utc::now());
        sub.updated_at = Utc::now();
        Ok(sub.clone())
    }

    async fn set_cancel_at_period_end(&self, id: Uuid) -> AppResult<SubscriptionProfile> {
        let mut subs = self.subscriptions.lock().unwrap();
        let sub = subs.get_mut(&id).ok_or(AppError::NotFound)?;
        sub.cancel_at_period_end = true;
        sub.updated_at = Utc::now();
        Ok(sub.clone())
    }

    async fn reactivate(&self, id: Uuid) -> AppResult<SubscriptionProfile> {
        let mut subs = self.subscriptions.lock().unwrap();
        let sub = subs.get_mut(&id).ok_or(AppError::NotFound)?;
        sub.status = SubscriptionStatus::Active;
        sub.cancel_at_period_end = false;
        sub.canceled_at = None;
        sub.updated_at = Utc::now();
        Ok(sub.clone())
    }

    async fn update_plan(&self, id: Uuid, plan_id: Uuid) -> AppResult<SubscriptionProfile> {
        let mut subs = self.subscriptions.lock().unwrap();
        let sub = subs.get_mut(&id).ok_or(AppError::NotFound)?;
        sub.plan_id = plan_id;
        sub.updated_at = Utc::now();
        Ok(sub.clone())
    }

    async fn search(
        &self,
        filters: &SubscriptionSearchFilters,
    ) -> AppResult<(Vec<SubscriptionProfile>, i64)> {
        let mut matching: Vec<SubscriptionProfile> = self
            .subscriptions
            .lock()
            .unwrap()
            .values()
            .filter(|s| filters.status.is_none_or(|st| s.status == st))
            .filter(|s| filters.plan_id.is_none_or(|p| s.plan_id == p))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let total = matching.len() as i64;
        let offset = ((filters.page - 1) * filters.per_page) as usize;
        let page: Vec<SubscriptionProfile> = matching
            .into_iter()
            .skip(offset)
            .take(filters.per_page as usize)
            .collect();
        Ok((page, total))
    }

    async fn list_all_with_plans(&self) -> AppResult<Vec<SubscriptionWithPlan>> {
        let subs: Vec<SubscriptionProfile> = self
            .subscriptions
            .lock()
            .unwrap()
            .values()
            .cloned()
            .collect();
        Ok(subs
            .into_iter()
            .map(|s| {
                let plan = self.plan_for(s.plan_id);
                SubscriptionWithPlan {
                    subscription: s,
                    plan,
                }
            })
            .collect())
    }

    async fn bulk_cancel(&self, ids: &[Uuid], immediate: bool) -> AppResult<u64> {
        let mut subs = self.subscriptions.lock().unwrap();
        let mut canceled = 0u64;
        for id in ids {
            if let Some(sub) = subs.get_mut(id) {
                sub.status = SubscriptionStatus::Canceled;
                if immediate {
                    sub.canceled_at = Some(Utc::now());
                }
                sub.updated_at = Utc::now();
                canceled += 1;
            }
        }
        Ok(canceled)
    }

    async fn count_all(&self) -> AppResult<i64> {
        Ok(self.subscriptions.lock().unwrap().len() as i64)
    }

    async fn count_active(&self) -> AppResult<i64> {
        Ok(self
            .subscriptions
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.status.is_active())
            .count() as i64)
    }

    async fn count_active_by_user(&self, user_id: Uuid) -> AppResult<i64> {
        Ok(self
            .subscriptions
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.user_id == user_id && s.status.is_active())
            .count() as i64)
    }

    async fn monthly_revenue(&self) -> AppResult<Decimal> {
        let subs = self.subscriptions.lock().unwrap();
        let mut total = Decimal::ZERO;
        for sub in subs.values().filter(|s| s.status.is_active()) {
            let plan = self.plan_for(sub.plan_id);
            total += plan.amount * Decimal::from(sub.quantity);
        }
        Ok(total)
    }
}

/// In-memory implementation of UsageLogRepo for testing.
#[derive(Default)]
pub struct InMemoryUsageLogRepo {
    pub entries: Mutex<Vec<CreateUsageLogInput>>,
}

impl InMemoryUsageLogRepo {
    pub fn count(&self) -> usize {
        self.entries.lock().unwrap().len()
    }
}

#[async_trait]
impl UsageLogRepo for InMemoryUsageLogRepo {
    async fn append(&self, input: &CreateUsageLogInput) -> AppResult<Uuid> {
        self.entries.lock().unwrap().push(input.clone());
        Ok(Uuid::new_v4())
    }
}

/// In-memory implementation of AuditLogRepo for testing.
#[derive(Default)]
pub struct InMemoryAuditLogRepo {
    pub entries: Mutex<Vec<CreateAuditLogInput>>,
}

impl InMemoryAuditLogRepo {
    /// Recorded action names, in order (for test assertions).
    pub fn actions(&self) -> Vec<String> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.action.clone())
            .collect()
    }
}

#[async_trait]
impl AuditLogRepo for InMemoryAuditLogRepo {
    async fn append(&self, input: &CreateAuditLogInput) -> AppResult<()> {
        self.entries.lock().unwrap().push(input.clone());
        Ok(())
    }
}
