use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::{
    app_error::{AppError, AppResult},
    application::ports::payment_gateway::{
        BestEffort, CustomerRef, NewRemoteSubscription, PaymentGatewayPort, ProductAndPrice,
        RemoteSubscription, SubscriptionRef,
    },
    domain::entities::{coupon::DiscountType, plan::BillingInterval},
    infra::stripe_client::StripeClient,
};

/// Stripe-backed implementation of the payment gateway port.
pub struct StripeGateway {
    client: StripeClient,
    currency: String,
}

impl StripeGateway {
    pub fn new(client: StripeClient, currency: String) -> Self {
        Self { client, currency }
    }

    /// Resolve the single line item of a remote subscription.
    async fn first_item_id(&self, subscription_ref: &SubscriptionRef) -> AppResult<String> {
        let remote = self.client.get_subscription(subscription_ref.as_str()).await?;
        remote
            .first_item_id()
            .map(|id| id.to_string())
            .ok_or_else(|| AppError::Gateway("Subscription has no line items".to_string()))
    }
}

fn amount_to_cents(amount: Decimal) -> i64 {
    (amount * Decimal::ONE_HUNDRED).round().to_i64().unwrap_or(0)
}

#[async_trait]
impl PaymentGatewayPort for StripeGateway {
    async fn create_customer(&self, email: &str, name: &str) -> BestEffort<CustomerRef> {
        match self.client.create_customer(email, name).await {
            Ok(customer) => BestEffort::Provisioned(CustomerRef::new(customer.id)),
            Err(e) => {
                tracing::warn!(email, error = %e, "Stripe customer creation failed");
                BestEffort::Skipped {
                    reason: e.to_string(),
                }
            }
        }
    }

    async fn create_product_and_price(
        &self,
        name: &str,
        amount: Decimal,
        interval: BillingInterval,
    ) -> BestEffort<ProductAndPrice> {
        let product = match self.client.create_product(name).await {
            Ok(product) => product,
            Err(e) => {
                tracing::warn!(name, error = %e, "Stripe product creation failed");
                return BestEffort::Skipped {
                    reason: e.to_string(),
                };
            }
        };

        match self
            .client
            .create_price(
                &product.id,
                amount_to_cents(amount),
                &self.currency,
                interval.gateway_interval(),
            )
            .await
        {
            Ok(price) => BestEffort::Provisioned(ProductAndPrice {
                product_ref: product.id,
                price_ref: price.id,
            }),
            Err(e) => {
                tracing::warn!(name, error = %e, "Stripe price creation failed");
                BestEffort::Skipped {
                    reason: e.to_string(),
                }
            }
        }
    }

    async fn create_coupon(
        &self,
        code: &str,
        discount_type: DiscountType,
        discount_value: Decimal,
        max_uses: Option<i32>,
        redeem_by: Option<i64>,
    ) -> BestEffort<String> {
        let (percent_off, amount_off) = match discount_type {
            DiscountType::Percentage => (Some(discount_value.to_string()), None),
            DiscountType::FixedAmount => (None, Some(amount_to_cents(discount_value))),
        };

        match self
            .client
            .create_coupon(code, percent_off, amount_off, &self.currency, max_uses, redeem_by)
            .await
        {
            Ok(coupon) => BestEffort::Provisioned(coupon.id),
            Err(e) => {
                tracing::warn!(code, error = %e, "Stripe coupon creation failed");
                BestEffort::Skipped {
                    reason: e.to_string(),
                }
            }
        }
    }

    async fn create_subscription(
        &self,
        req: &NewRemoteSubscription,
    ) -> AppResult<RemoteSubscription> {
        let remote = self
            .client
            .create_subscription(
                req.customer_ref.as_str(),
                &req.price_ref,
                req.quantity,
                req.trial_period_days,
                req.coupon_ref.as_deref(),
            )
            .await?;

        let client_secret = remote.client_secret();
        Ok(RemoteSubscription {
            subscription_ref: SubscriptionRef::new(remote.id),
            client_secret,
        })
    }

    async fn update_quantity(
        &self,
        subscription_ref: &SubscriptionRef,
        quantity: i32,
    ) -> AppResult<()> {
        let item_id = self.first_item_id(subscription_ref).await?;
        self.client
            .update_subscription_item_quantity(subscription_ref.as_str(), &item_id, quantity)
            .await?;
        Ok(())
    }

    async fn cancel_subscription(
        &self,
        subscription_ref: &SubscriptionRef,
        at_period_end: bool,
    ) -> AppResult<()> {
        if at_period_end {
            self.client
                .set_cancel_at_period_end(subscription_ref.as_str(), true)
                .await?;
        } else {
            self.client
                .cancel_subscription_now(subscription_ref.as_str())
                .await?;
        }
        Ok(())
    }

    async fn clear_cancel_at_period_end(
        &self,
        subscription_ref: &SubscriptionRef,
    ) -> AppResult<()> {
        self.client
            .set_cancel_at_period_end(subscription_ref.as_str(), false)
            .await?;
        Ok(())
    }

    async fn change_price(
        &self,
        subscription_ref: &SubscriptionRef,
        new_price_ref: &str,
        prorate: bool,
    ) -> AppResult<()> {
        let item_id = self.first_item_id(subscription_ref).await?;
        self.client
            .update_subscription_item_price(
                subscription_ref.as_str(),
                &item_id,
                new_price_ref,
                prorate,
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amount_to_cents_rounds_to_nearest() {
        assert_eq!(amount_to_cents(Decimal::new(2999, 2)), 2999);
        assert_eq!(amount_to_cents(Decimal::new(10, 0)), 1000);
        assert_eq!(amount_to_cents(Decimal::new(19995, 3)), 2000);
    }
}
