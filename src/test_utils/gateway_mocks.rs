//! Scriptable payment gateway mock.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::ports::payment_gateway::{
        BestEffort, CustomerRef, NewRemoteSubscription, PaymentGatewayPort, ProductAndPrice,
        RemoteSubscription, SubscriptionRef,
    },
    domain::entities::{coupon::DiscountType, plan::BillingInterval},
};

/// Gateway mock with switchable failure modes and call counters.
pub struct MockGateway {
    fail_best_effort: AtomicBool,
    fail_hard: AtomicBool,
    quantity_updates: AtomicUsize,
    price_changes: AtomicUsize,
    cancellations: AtomicUsize,
    pub client_secret: Mutex<Option<String>>,
}

impl Default for MockGateway {
    fn default() -> Self {
        Self {
            fail_best_effort: AtomicBool::new(false),
            fail_hard: AtomicBool::new(false),
            quantity_updates: AtomicUsize::new(0),
            price_changes: AtomicUsize::new(0),
            cancellations: AtomicUsize::new(0),
            client_secret: Mutex::new(Some("pi_test_secret".to_string())),
        }
    }
}

impl MockGateway {
    /// Make all best-effort mirroring calls report as skipped.
    pub fn fail_best_effort(&self) {
        self.fail_best_effort.store(true, Ordering::SeqCst);
    }

    /// Make all subscription lifecycle calls fail.
    pub fn fail_hard_calls(&self) {
        self.fail_hard.store(true, Ordering::SeqCst);
    }

    pub fn quantity_updates(&self) -> usize {
        self.quantity_updates.load(Ordering::SeqCst)
    }

    pub fn price_changes(&self) -> usize {
        self.price_changes.load(Ordering::SeqCst)
    }

    pub fn cancellations(&self) -> usize {
        self.cancellations.load(Ordering::SeqCst)
    }

    fn check_hard(&self) -> AppResult<()> {
        if self.fail_hard.load(Ordering::SeqCst) {
            return Err(AppError::Gateway("gateway unavailable".to_string()));
        }
        Ok(())
    }

    fn skipped<T>(&self) -> Option<BestEffort<T>> {
        if self.fail_best_effort.load(Ordering::SeqCst) {
            Some(BestEffort::Skipped {
                reason: "gateway unavailable".to_string(),
            })
        } else {
            None
        }
    }
}

#[async_trait]
impl PaymentGatewayPort for MockGateway {
    async fn create_customer(&self, _email: &str, _name: &str) -> BestEffort<CustomerRef> {
        if let Some(skipped) = self.skipped() {
            return skipped;
        }
        BestEffort::Provisioned(CustomerRef::new(format!("cus_{}", Uuid::new_v4().simple())))
    }

    async fn create_product_and_price(
        &self,
        _name: &str,
        _amount: Decimal,
        _interval: BillingInterval,
    ) -> BestEffort<ProductAndPrice> {
        if let Some(skipped) = self.skipped() {
            return skipped;
        }
        BestEffort::Provisioned(ProductAndPrice {
            product_ref: format!("prod_{}", Uuid::new_v4().simple()),
            price_ref: format!("price_{}", Uuid::new_v4().simple()),
        })
    }

    async fn create_coupon(
        &self,
        code: &str,
        _discount_type: DiscountType,
        _discount_value: Decimal,
        _max_uses: Option<i32>,
        _redeem_by: Option<i64>,
    ) -> BestEffort<String> {
        if let Some(skipped) = self.skipped() {
            return skipped;
        }
        BestEffort::Provisioned(code.to_string())
    }

    async fn create_subscription(
        &self,
        _req: &NewRemoteSubscription,
    ) -> AppResult<RemoteSubscription> {
        self.check_hard()?;
        Ok(RemoteSubscription {
            subscription_ref: SubscriptionRef::new(format!("sub_{}", Uuid::new_v4().simple())),
            client_secret: self.client_secret.lock().unwrap().clone(),
        })
    }

    async fn update_quantity(
        &self,
        _subscription_ref: &SubscriptionRef,
        _quantity: i32,
    ) -> AppResult<()> {
        self.check_hard()?;
        self.quantity_updates.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn cancel_subscription(
        &self,
        _subscription_ref: &SubscriptionRef,
        _at_period_end: bool,
    ) -> AppResult<()> {
        self.check_hard()?;
        self.cancellations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn clear_cancel_at_period_end(
        &self,
        _subscription_ref: &SubscriptionRef,
    ) -> AppResult<()> {
        self.check_hard()
    }

    async fn change_price(
        &self,
        _subscription_ref: &SubscriptionRef,
        _new_price_ref: &str,
        _prorate: bool,
    ) -> AppResult<()> {
        self.check_hard()?;
        self.price_changes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
