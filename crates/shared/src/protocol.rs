use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::CouponCode;

pub const CHECK_CLAIM_PATH: &str = "/check-claim";
pub const CLAIM_PATH: &str = "/claim";

/// `GET /check-claim` response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckClaimResponse {
    pub is_claimed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coupon: Option<CouponCode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl CheckClaimResponse {
    pub fn unclaimed() -> Self {
        Self::default()
    }

    pub fn claimed(coupon: impl Into<CouponCode>, timestamp: DateTime<Utc>) -> Self {
        Self {
            is_claimed: true,
            coupon: Some(coupon.into()),
            timestamp: Some(timestamp),
        }
    }
}

/// Empty body sent with `POST /claim`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClaimRequest {}

/// Successful `POST /claim` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimResponse {
    pub message: String,
    pub coupon: CouponCode,
}
