use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    app_error::AppResult,
    domain::entities::{coupon::DiscountType, plan::BillingInterval},
};

// ============================================================================
// Port Types - Gateway-agnostic domain types
// ============================================================================

/// Unique identifier for a customer in the payment gateway
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CustomerRef(pub String);

impl CustomerRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CustomerRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a subscription in the payment gateway
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionRef(pub String);

impl SubscriptionRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SubscriptionRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Outcome of a gateway call the caller does not depend on.
///
/// Customer, product and coupon mirroring is opportunistic: when the
/// gateway is down or unconfigured the local record is still created and
/// the remote reference stays empty. Subscription mutations never use
/// this type; those fail hard.
#[derive(Debug, Clone)]
pub enum BestEffort<T> {
    Provisioned(T),
    Skipped { reason: String },
}

/// Product and recurring price pair provisioned for a plan
#[derive(Debug, Clone)]
pub struct ProductAndPrice {
    pub product_ref: String,
    pub price_ref: String,
}

/// Request to create a subscription in the gateway
#[derive(Debug, Clone)]
pub struct NewRemoteSubscription {
    pub customer_ref: CustomerRef,
    pub price_ref: String,
    pub quantity: i32,
    pub trial_period_days: Option<i32>,
    pub coupon_ref: Option<String>,
}

/// Result of creating a subscription in the gateway
#[derive(Debug, Clone)]
pub struct RemoteSubscription {
    pub subscription_ref: SubscriptionRef,
    /// Client secret of the first invoice's payment intent, when the
    /// gateway requires payment confirmation up front.
    pub client_secret: Option<String>,
}

// ============================================================================
// Payment Gateway Port
// ============================================================================

/// Payment gateway port - abstracts the remote billing provider.
///
/// Methods returning `BestEffort` swallow gateway failures; methods
/// returning `AppResult` propagate them and the caller must abort.
#[async_trait]
pub trait PaymentGatewayPort: Send + Sync {
    // ========================================================================
    // Best-effort mirroring
    // ========================================================================

    /// Create a customer record in the gateway.
    async fn create_customer(&self, email: &str, name: &str) -> BestEffort<CustomerRef>;

    /// Create a product and a recurring price for a plan.
    async fn create_product_and_price(
        &self,
        name: &str,
        amount: Decimal,
        interval: BillingInterval,
    ) -> BestEffort<ProductAndPrice>;

    /// Create a coupon in the gateway.
    async fn create_coupon(
        &self,
        code: &str,
        discount_type: DiscountType,
        discount_value: Decimal,
        max_uses: Option<i32>,
        redeem_by: Option<i64>,
    ) -> BestEffort<String>;

    // ========================================================================
    // Subscription lifecycle (hard-fail)
    // ========================================================================

    /// Create a subscription. Failure aborts the local write.
    async fn create_subscription(
        &self,
        req: &NewRemoteSubscription,
    ) -> AppResult<RemoteSubscription>;

    /// Update the quantity on the subscription's single line item.
    async fn update_quantity(
        &self,
        subscription_ref: &SubscriptionRef,
        quantity: i32,
    ) -> AppResult<()>;

    /// Cancel a subscription, either immediately or at period end.
    async fn cancel_subscription(
        &self,
        subscription_ref: &SubscriptionRef,
        at_period_end: bool,
    ) -> AppResult<()>;

    /// Undo a pending at-period-end cancellation.
    async fn clear_cancel_at_period_end(
        &self,
        subscription_ref: &SubscriptionRef,
    ) -> AppResult<()>;

    /// Swap the subscription's line item to a new price.
    async fn change_price(
        &self,
        subscription_ref: &SubscriptionRef,
        new_price_ref: &str,
        prorate: bool,
    ) -> AppResult<()>;
}
