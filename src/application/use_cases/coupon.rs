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
        validators::is_valid_coupon_code,
    },
    domain::entities::coupon::{CouponValidity, DiscountType},
};

#[derive(Debug, Clone, Serialize)]
pub struct CouponProfile {
    pub id: Uuid,
    pub code: String,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    pub max_uses: Option<i32>,
    pub current_uses: i32,
    pub valid_from: DateTime<Utc>,
    pub valid_until: Option<DateTime<Utc>>,
    pub gateway_coupon_ref: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl CouponProfile {
    /// Check expiry before the usage counter, so a coupon that is both
    /// expired and exhausted reports as expired.
    pub fn validate(&self, now: DateTime<Utc>) -> CouponValidity {
        if let Some(valid_until) = self.valid_until {
            if now > valid_until {
                return CouponValidity::Expired;
            }
        }
        if let Some(max_uses) = self.max_uses {
            if self.current_uses >= max_uses {
                return CouponValidity::LimitReached;
            }
        }
        CouponValidity::Valid {
            discount_type: self.discount_type,
            discount_value: self.discount_value,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CreateCouponInput {
    pub code: String,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    pub max_uses: Option<i32>,
    /// Start of the validity window; defaults to creation time.
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    pub gateway_coupon_ref: Option<String>,
}

#[async_trait]
pub trait CouponRepo: Send + Sync {
    /// Look up an active coupon by code. Inactive coupons are invisible.
    async fn get_active_by_code(&self, code: &str) -> AppResult<Option<CouponProfile>>;
    async fn create(&self, input: &CreateCouponInput) -> AppResult<CouponProfile>;
}

#[derive(Clone)]
pub struct CouponUseCases {
    coupon_repo: Arc<dyn CouponRepo>,
    gateway: Arc<dyn PaymentGatewayPort>,
    audit_repo: Arc<dyn AuditLogRepo>,
}

impl CouponUseCases {
    pub fn new(
        coupon_repo: Arc<dyn CouponRepo>,
        gateway: Arc<dyn PaymentGatewayPort>,
        audit_repo: Arc<dyn AuditLogRepo>,
    ) -> Self {
        Self {
            coupon_repo,
            gateway,
            audit_repo,
        }
    }

    #[instrument(skip(self, input), fields(code = %input.code))]
    pub async fn create(
        &self,
        mut input: CreateCouponInput,
        ip_address: Option<String>,
    ) -> AppResult<CouponProfile> {
        let code = input.code.trim().to_uppercase();
        if !is_valid_coupon_code(&code) {
            return Err(AppError::InvalidInput("Invalid coupon code".to_string()));
        }
        if input.discount_value <= Decimal::ZERO {
            return Err(AppError::InvalidInput(
                "Discount value must be positive".to_string(),
            ));
        }
        if input.discount_type == DiscountType::Percentage
            && input.discount_value > Decimal::ONE_HUNDRED
        {
            return Err(AppError::InvalidInput(
                "Percentage discount cannot exceed 100".to_string(),
            ));
        }
        input.code = code;
        input.valid_from.get_or_insert_with(Utc::now);

        if self
            .coupon_repo
            .get_active_by_code(&input.code)
            .await?
            .is_some()
        {
            return Err(AppError::Conflict(
                "Coupon with this code already exists".to_string(),
            ));
        }

        let redeem_by = input.valid_until.map(|dt| dt.timestamp());
        match self
            .gateway
            .create_coupon(
                &input.code,
                input.discount_type,
                input.discount_value,
                input.max_uses,
                redeem_by,
            )
            .await
        {
            BestEffort::Provisioned(coupon_ref) => {
                input.gateway_coupon_ref = Some(coupon_ref);
            }
            BestEffort::Skipped { reason } => {
                tracing::warn!(code = %input.code, %reason, "Gateway coupon creation skipped");
            }
        }

        let profile = self.coupon_repo.create(&input).await?;

        record_audit(
            self.audit_repo.as_ref(),
            CreateAuditLogInput {
                user_id: None,
                action: "COUPON_CREATED".to_string(),
                description: Some(format!("Coupon {} created", profile.code)),
                metadata: serde_json::json!({
                    "coupon_id": profile.id,
                    "discount_type": profile.discount_type.as_str(),
                    "discount_value": profile.discount_value,
                }),
                ip_address,
            },
        )
        .await;

        Ok(profile)
    }

    /// Validate a coupon code. Missing or inactive codes are not found;
    /// known codes report their validity without consuming a use.
    #[instrument(skip(self))]
    pub async fn validate(&self, code: &str, now: DateTime<Utc>) -> AppResult<CouponValidity> {
        let code = code.trim().to_uppercase();
        let coupon = self
            .coupon_repo
            .get_active_by_code(&code)
            .await?
            .ok_or(AppError::NotFound)?;
        Ok(coupon.validate(now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use crate::test_utils::{
        factories::{create_test_coupon, test_datetime},
        gateway_mocks::MockGateway,
        repo_mocks::{InMemoryAuditLogRepo, InMemoryCouponRepo},
    };

    fn dec(s: &str) -> Decimal {
        Decimal::from_str_exact(s).unwrap()
    }

    fn make_use_cases(
        coupons: Arc<InMemoryCouponRepo>,
        gateway: Arc<MockGateway>,
    ) -> CouponUseCases {
        CouponUseCases::new(coupons, gateway, Arc::new(InMemoryAuditLogRepo::default()))
    }

    fn input(code: &str) -> CreateCouponInput {
        CreateCouponInput {
            code: code.to_string(),
            discount_type: DiscountType::Percentage,
            discount_value: dec("20"),
            max_uses: None,
            valid_from: None,
            valid_until: None,
            gateway_coupon_ref: None,
        }
    }

    #[tokio::test]
    async fn create_uppercases_code_and_mirrors_to_gateway() {
        let coupons = Arc::new(InMemoryCouponRepo::default());
        let gateway = Arc::new(MockGateway::default());
        let uc = make_use_cases(coupons, gateway);

        let profile = uc.create(input("save20"), None).await.unwrap();

        assert_eq!(profile.code, "SAVE20");
        assert!(profile.gateway_coupon_ref.is_some());
    }

    #[tokio::test]
    async fn create_keeps_coupon_when_gateway_is_down() {
        let coupons = Arc::new(InMemoryCouponRepo::default());
        let gateway = Arc::new(MockGateway::default());
        gateway.fail_best_effort();
        let uc = make_use_cases(coupons.clone(), gateway);

        let profile = uc.create(input("LAUNCH"), None).await.unwrap();

        assert!(profile.gateway_coupon_ref.is_none());
        assert!(coupons
            .get_active_by_code("LAUNCH")
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn create_defaults_valid_from_to_now() {
        let coupons = Arc::new(InMemoryCouponRepo::default());
        let gateway = Arc::new(MockGateway::default());
        let uc = make_use_cases(coupons, gateway);

        let before = Utc::now();
        let profile = uc.create(input("FRESH"), None).await.unwrap();

        assert!(profile.valid_from >= before);
        assert!(profile.valid_from <= Utc::now());
    }

    #[tokio::test]
    async fn create_keeps_explicit_valid_from() {
        let coupons = Arc::new(InMemoryCouponRepo::default());
        let gateway = Arc::new(MockGateway::default());
        let uc = make_use_cases(coupons, gateway);

        let start = test_datetime();
        let mut scheduled = input("SPRING");
        scheduled.valid_from = Some(start);
        let profile = uc.create(scheduled, None).await.unwrap();

        assert_eq!(profile.valid_from, start);
    }

    #[tokio::test]
    async fn create_rejects_duplicate_and_bad_values() {
        let coupons = Arc::new(InMemoryCouponRepo::default());
        let gateway = Arc::new(MockGateway::default());
        let uc = make_use_cases(coupons, gateway);

        uc.create(input("VIP"), None).await.unwrap();
        let err = uc.create(input("vip"), None).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let mut over = input("OVER");
        over.discount_value = dec("150");
        let err = uc.create(over, None).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));

        let mut zero = input("ZERO");
        zero.discount_value = Decimal::ZERO;
        let err = uc.create(zero, None).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn validate_reports_expired_before_limit() {
        let now = test_datetime();
        let coupon = create_test_coupon(|c| {
            c.valid_until = Some(now - Duration::days(1));
            c.max_uses = Some(1);
            c.current_uses = 1;
        });

        assert_eq!(coupon.validate(now), CouponValidity::Expired);
    }

    #[tokio::test]
    async fn validate_accepts_coupon_on_its_expiry_instant() {
        let now = test_datetime();
        let coupon = create_test_coupon(|c| c.valid_until = Some(now));

        assert!(coupon.validate(now).is_valid());
    }

    #[tokio::test]
    async fn validate_reports_limit_reached() {
        let now = test_datetime();
        let coupon = create_test_coupon(|c| {
            c.max_uses = Some(5);
            c.current_uses = 5;
        });

        assert_eq!(coupon.validate(now), CouponValidity::LimitReached);
    }

    #[tokio::test]
    async fn validate_returns_discount_for_good_coupon() {
        let now = test_datetime();
        let coupon = create_test_coupon(|c| {
            c.discount_value = dec("15");
            c.valid_until = Some(now + Duration::days(30));
        });

        assert_eq!(
            coupon.validate(now),
            CouponValidity::Valid {
                discount_type: DiscountType::Percentage,
                discount_value: dec("15"),
            }
        );
    }

    #[tokio::test]
    async fn validate_unknown_code_is_not_found() {
        let coupons = Arc::new(InMemoryCouponRepo::default());
        let gateway = Arc::new(MockGateway::default());
        let uc = make_use_cases(coupons, gateway);

        let err = uc.validate("NOPE", Utc::now()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound));
    }
}
