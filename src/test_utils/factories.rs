//! Test data factories for creating valid test fixtures.
//!
//! Each factory function creates a complete, valid object with sensible defaults.
//! Use the closure parameter to override specific fields as needed.

use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    application::use_cases::{
        coupon::CouponProfile,
        plan::PlanProfile,
        subscription::SubscriptionProfile,
        user::UserProfile,
    },
    domain::entities::{
        coupon::DiscountType, plan::BillingInterval, subscription::SubscriptionStatus,
        user::UserStatus,
    },
};

/// Fixed timestamp for deterministic test data.
pub fn test_datetime() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap()
}

/// Create a test user with sensible defaults.
pub fn create_test_user(overrides: impl FnOnce(&mut UserProfile)) -> UserProfile {
    let mut user = UserProfile {
        id: Uuid::new_v4(),
        email: format!("user-{}@example.com", Uuid::new_v4()),
        name: "Test User".to_string(),
        phone: None,
        company: Some("Acme Inc".to_string()),
        gateway_customer_ref: Some("cus_test123".to_string()),
        status: UserStatus::Active,
        created_at: test_datetime(),
        last_login: None,
    };
    overrides(&mut user);
    user
}

/// Create a test plan with sensible defaults.
pub fn create_test_plan(overrides: impl FnOnce(&mut PlanProfile)) -> PlanProfile {
    let mut plan = PlanProfile {
        id: Uuid::new_v4(),
        name: "Basic Plan".to_string(),
        description: Some("A basic subscription plan".to_string()),
        amount: Decimal::new(999, 2),
        billing_interval: BillingInterval::Monthly,
        trial_days: 0,
        features: vec!["Feature 1".to_string(), "Feature 2".to_string()],
        gateway_product_ref: Some("prod_test123".to_string()),
        gateway_price_ref: Some("price_test123".to_string()),
        active: true,
        setup_fee: Decimal::ZERO,
        created_at: test_datetime(),
    };
    overrides(&mut plan);
    plan
}

/// Create a test coupon with sensible defaults.
pub fn create_test_coupon(overrides: impl FnOnce(&mut CouponProfile)) -> CouponProfile {
    let mut coupon = CouponProfile {
        id: Uuid::new_v4(),
        code: "TESTCODE".to_string(),
        discount_type: DiscountType::Percentage,
        discount_value: Decimal::new(20, 0),
        max_uses: None,
        current_uses: 0,
        valid_from: test_datetime(),
        valid_until: None,
        gateway_coupon_ref: Some("coupon_test123".to_string()),
        active: true,
        created_at: test_datetime(),
    };
    overrides(&mut coupon);
    coupon
}

/// Create a test subscription with sensible defaults.
pub fn create_test_subscription(
    user_id: Uuid,
    plan_id: Uuid,
    overrides: impl FnOnce(&mut SubscriptionProfile),
) -> SubscriptionProfile {
    let mut subscription = SubscriptionProfile {
        id: Uuid::new_v4(),
        user_id,
        plan_id,
        gateway_subscription_ref: Some("sub_test123".to_string()),
        status: SubscriptionStatus::Active,
        quantity: 1,
        current_period_start: Some(test_datetime()),
        current_period_end: Some(test_datetime() + Duration::days(30)),
        cancel_at_period_end: false,
        canceled_at: None,
        trial_end: None,
        coupon_code: None,
        created_at: test_datetime(),
        updated_at: test_datetime(),
    };
    overrides(&mut subscription);
    subscription
}
