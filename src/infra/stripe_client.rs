use std::time::Duration;

use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::app_error::{AppError, AppResult};

const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";

/// Thin form-encoded client for the Stripe v1 API. Every request carries
/// a bounded timeout so a stalled gateway cannot hold a handler open.
#[derive(Clone)]
pub struct StripeClient {
    client: Client,
    secret_key: SecretString,
    timeout: Duration,
}

impl StripeClient {
    pub fn new(secret_key: SecretString, timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            secret_key,
            timeout,
        }
    }

    fn auth_header(&self) -> String {
        use base64::Engine;
        let encoded = base64::engine::general_purpose::STANDARD
            .encode(format!("{}:", self.secret_key.expose_secret()));
        format!("Basic {}", encoded)
    }

    // ========================================================================
    // Customers
    // ========================================================================

    pub async fn create_customer(&self, email: &str, name: &str) -> AppResult<StripeCustomer> {
        let params = vec![("email", email.to_string()), ("name", name.to_string())];

        let response = self
            .client
            .post(format!("{}/customers", STRIPE_API_BASE))
            .header("Authorization", self.auth_header())
            .timeout(self.timeout)
            .form(&params)
            .send()
            .await
            .map_err(|e| AppError::Gateway(format!("Stripe request failed: {}", e)))?;

        self.handle_response(response).await
    }

    // ========================================================================
    // Products and Prices
    // ========================================================================

    pub async fn create_product(&self, name: &str) -> AppResult<StripeProduct> {
        let params = vec![("name", name.to_string())];

        let response = self
            .client
            .post(format!("{}/products", STRIPE_API_BASE))
            .header("Authorization", self.auth_header())
            .timeout(self.timeout)
            .form(&params)
            .send()
            .await
            .map_err(|e| AppError::Gateway(format!("Stripe request failed: {}", e)))?;

        self.handle_response(response).await
    }

    pub async fn create_price(
        &self,
        product_id: &str,
        unit_amount: i64,
        currency: &str,
        interval: &str,
    ) -> AppResult<StripePrice> {
        let params: Vec<(&str, String)> = vec![
            ("product", product_id.to_string()),
            ("unit_amount", unit_amount.to_string()),
            ("currency", currency.to_lowercase()),
            ("recurring[interval]", interval.to_string()),
        ];

        let response = self
            .client
            .post(format!("{}/prices", STRIPE_API_BASE))
            .header("Authorization", self.auth_header())
            .timeout(self.timeout)
            .form(&params)
            .send()
            .await
            .map_err(|e| AppError::Gateway(format!("Stripe request failed: {}", e)))?;

        self.handle_response(response).await
    }

    // ========================================================================
    // Coupons
    // ========================================================================

    pub async fn create_coupon(
        &self,
        code: &str,
        percent_off: Option<String>,
        amount_off_cents: Option<i64>,
        currency: &str,
        max_redemptions: Option<i32>,
        redeem_by: Option<i64>,
    ) -> AppResult<StripeCoupon> {
        let mut params: Vec<(String, String)> = vec![
            ("id".to_string(), code.to_string()),
            ("duration".to_string(), "once".to_string()),
        ];
        if let Some(pct) = percent_off {
            params.push(("percent_off".to_string(), pct));
        }
        if let Some(amount) = amount_off_cents {
            params.push(("amount_off".to_string(), amount.to_string()));
            params.push(("currency".to_string(), currency.to_lowercase()));
        }
        if let Some(max) = max_redemptions {
            params.push(("max_redemptions".to_string(), max.to_string()));
        }
        if let Some(ts) = redeem_by {
            params.push(("redeem_by".to_string(), ts.to_string()));
        }

        let response = self
            .client
            .post(format!("{}/coupons", STRIPE_API_BASE))
            .header("Authorization", self.auth_header())
            .timeout(self.timeout)
            .form(&params)
            .send()
            .await
            .map_err(|e| AppError::Gateway(format!("Stripe request failed: {}", e)))?;

        self.handle_response(response).await
    }

    // ========================================================================
    // Subscriptions
    // ========================================================================

    pub async fn create_subscription(
        &self,
        customer_id: &str,
        price_id: &str,
        quantity: i32,
        trial_days: Option<i32>,
        coupon: Option<&str>,
    ) -> AppResult<StripeSubscription> {
        let mut params: Vec<(String, String)> = vec![
            ("customer".to_string(), customer_id.to_string()),
            ("items[0][price]".to_string(), price_id.to_string()),
            ("items[0][quantity]".to_string(), quantity.to_string()),
            (
                "expand[]".to_string(),
                "latest_invoice.payment_intent".to_string(),
            ),
        ];
        if let Some(days) = trial_days {
            if days > 0 {
                params.push(("trial_period_days".to_string(), days.to_string()));
            }
        }
        if let Some(coupon) = coupon {
            params.push(("coupon".to_string(), coupon.to_string()));
        }

        let response = self
            .client
            .post(format!("{}/subscriptions", STRIPE_API_BASE))
            .header("Authorization", self.auth_header())
            .timeout(self.timeout)
            .form(&params)
            .send()
            .await
            .map_err(|e| AppError::Gateway(format!("Stripe request failed: {}", e)))?;

        self.handle_response(response).await
    }

    pub async fn get_subscription(&self, subscription_id: &str) -> AppResult<StripeSubscription> {
        let response = self
            .client
            .get(format!(
                "{}/subscriptions/{}",
                STRIPE_API_BASE, subscription_id
            ))
            .header("Authorization", self.auth_header())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| AppError::Gateway(format!("Stripe request failed: {}", e)))?;

        self.handle_response(response).await
    }

    /// Update the quantity of a subscription's line item.
    pub async fn update_subscription_item_quantity(
        &self,
        subscription_id: &str,
        item_id: &str,
        quantity: i32,
    ) -> AppResult<StripeSubscription> {
        let params = vec![
            ("items[0][id]".to_string(), item_id.to_string()),
            ("items[0][quantity]".to_string(), quantity.to_string()),
        ];

        let response = self
            .client
            .post(format!(
                "{}/subscriptions/{}",
                STRIPE_API_BASE, subscription_id
            ))
            .header("Authorization", self.auth_header())
            .timeout(self.timeout)
            .form(&params)
            .send()
            .await
            .map_err(|e| AppError::Gateway(format!("Stripe request failed: {}", e)))?;

        self.handle_response(response).await
    }

    /// Swap a subscription's line item to a different price.
    pub async fn update_subscription_item_price(
        &self,
        subscription_id: &str,
        item_id: &str,
        price_id: &str,
        prorate: bool,
    ) -> AppResult<StripeSubscription> {
        let proration = if prorate { "create_prorations" } else { "none" };
        let params = vec![
            ("items[0][id]".to_string(), item_id.to_string()),
            ("items[0][price]".to_string(), price_id.to_string()),
            ("proration_behavior".to_string(), proration.to_string()),
        ];

        let response = self
            .client
            .post(format!(
                "{}/subscriptions/{}",
                STRIPE_API_BASE, subscription_id
            ))
            .header("Authorization", self.auth_header())
            .timeout(self.timeout)
            .form(&params)
            .send()
            .await
            .map_err(|e| AppError::Gateway(format!("Stripe request failed: {}", e)))?;

        self.handle_response(response).await
    }

    pub async fn set_cancel_at_period_end(
        &self,
        subscription_id: &str,
        cancel: bool,
    ) -> AppResult<StripeSubscription> {
        let value = if cancel { "true" } else { "false" };
        let response = self
            .client
            .post(format!(
                "{}/subscriptions/{}",
                STRIPE_API_BASE, subscription_id
            ))
            .header("Authorization", self.auth_header())
            .timeout(self.timeout)
            .form(&[("cancel_at_period_end", value)])
            .send()
            .await
            .map_err(|e| AppError::Gateway(format!("Stripe request failed: {}", e)))?;

        self.handle_response(response).await
    }

    pub async fn cancel_subscription_now(
        &self,
        subscription_id: &str,
    ) -> AppResult<StripeSubscription> {
        let response = self
            .client
            .delete(format!(
                "{}/subscriptions/{}",
                STRIPE_API_BASE, subscription_id
            ))
            .header("Authorization", self.auth_header())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| AppError::Gateway(format!("Stripe request failed: {}", e)))?;

        self.handle_response(response).await
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    async fn handle_response<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> AppResult<T> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AppError::Gateway(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            tracing::error!(status = %status, body = %body, "Stripe API error");

            // Try to parse Stripe error
            if let Ok(error) = serde_json::from_str::<StripeErrorResponse>(&body) {
                return Err(AppError::Gateway(format!(
                    "Stripe error: {}",
                    error.error.message.unwrap_or(error.error.error_type)
                )));
            }

            return Err(AppError::Gateway(format!(
                "Stripe API error: {} - {}",
                status, body
            )));
        }

        serde_json::from_str(&body).map_err(|e| {
            tracing::error!(body = %body, error = %e, "Failed to parse Stripe response");
            AppError::Gateway(format!("Failed to parse Stripe response: {}", e))
        })
    }
}

// ============================================================================
// Stripe Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct StripeCustomer {
    pub id: String,
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StripeProduct {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct StripePrice {
    pub id: String,
    pub product: String,
    pub unit_amount: Option<i64>,
    pub currency: String,
}

#[derive(Debug, Deserialize)]
pub struct StripeCoupon {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct StripeSubscription {
    pub id: String,
    pub customer: String,
    pub status: String,
    pub items: StripeSubscriptionItems,
    pub latest_invoice: Option<StripeInvoice>,
}

impl StripeSubscription {
    /// Id of the first line item, if any.
    pub fn first_item_id(&self) -> Option<&str> {
        self.items.data.first().map(|item| item.id.as_str())
    }

    /// Client secret of the first invoice's payment intent.
    pub fn client_secret(&self) -> Option<String> {
        self.latest_invoice
            .as_ref()?
            .payment_intent
            .as_ref()?
            .client_secret
            .clone()
    }
}

#[derive(Debug, Deserialize)]
pub struct StripeSubscriptionItems {
    pub data: Vec<StripeSubscriptionItem>,
}

#[derive(Debug, Deserialize)]
pub struct StripeSubscriptionItem {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct StripeInvoice {
    pub id: String,
    pub payment_intent: Option<StripePaymentIntent>,
}

#[derive(Debug, Deserialize)]
pub struct StripePaymentIntent {
    pub id: String,
    pub client_secret: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StripeErrorResponse {
    pub error: StripeError,
}

#[derive(Debug, Deserialize)]
pub struct StripeError {
    #[serde(rename = "type")]
    pub error_type: String,
    pub message: Option<String>,
    pub code: Option<String>,
}
