use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "discount_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    Percentage,
    FixedAmount,
}

impl DiscountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscountType::Percentage => "percentage",
            DiscountType::FixedAmount => "fixed_amount",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "percentage" => Some(DiscountType::Percentage),
            "fixed_amount" => Some(DiscountType::FixedAmount),
            _ => None,
        }
    }
}

/// Outcome of validating a coupon against the current time and its usage
/// counter. A missing or inactive coupon never reaches this type; the
/// lookup itself reports that as not-found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CouponValidity {
    Valid {
        discount_type: DiscountType,
        discount_value: Decimal,
    },
    Expired,
    LimitReached,
}

impl CouponValidity {
    pub fn is_valid(&self) -> bool {
        matches!(self, CouponValidity::Valid { .. })
    }
}
