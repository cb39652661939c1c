use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "billing_interval", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BillingInterval {
    Monthly,
    Yearly,
    Weekly,
    Daily,
}

impl BillingInterval {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingInterval::Monthly => "monthly",
            BillingInterval::Yearly => "yearly",
            BillingInterval::Weekly => "weekly",
            BillingInterval::Daily => "daily",
        }
    }

    /// Parse a client-supplied interval. Unknown values fall back to
    /// monthly, matching how the gateway request is built.
    pub fn parse_or_monthly(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "monthly" | "month" => BillingInterval::Monthly,
            "yearly" | "year" => BillingInterval::Yearly,
            "weekly" | "week" => BillingInterval::Weekly,
            "daily" | "day" => BillingInterval::Daily,
            _ => BillingInterval::Monthly,
        }
    }

    /// The gateway's recurring interval vocabulary (day/week/month/year).
    pub fn gateway_interval(&self) -> &'static str {
        match self {
            BillingInterval::Monthly => "month",
            BillingInterval::Yearly => "year",
            BillingInterval::Weekly => "week",
            BillingInterval::Daily => "day",
        }
    }
}
