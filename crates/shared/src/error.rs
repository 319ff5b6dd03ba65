use serde::{Deserialize, Serialize};

use crate::domain::CouponCode;

/// Message the distribution service uses to reject a visitor that already holds a claim.
pub const ALREADY_CLAIMED_MESSAGE: &str = "You have already claimed a coupon.";

/// Body of a non-2xx `/claim` response. Every field is optional because the
/// service is not guaranteed to send a structured payload on failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coupon: Option<CouponCode>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectionReason {
    AlreadyClaimed { coupon: CouponCode, message: String },
    Other { message: String },
    Unspecified,
}

impl ApiError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            coupon: None,
        }
    }

    pub fn already_claimed(coupon: CouponCode) -> Self {
        Self {
            message: Some(ALREADY_CLAIMED_MESSAGE.to_string()),
            coupon: Some(coupon),
        }
    }

    /// An already-claimed rejection without a coupon cannot be adopted and is
    /// reported as a plain rejection.
    pub fn reason(&self) -> RejectionReason {
        match (self.message.as_deref(), &self.coupon) {
            (Some(ALREADY_CLAIMED_MESSAGE), Some(coupon)) => RejectionReason::AlreadyClaimed {
                coupon: coupon.clone(),
                message: ALREADY_CLAIMED_MESSAGE.to_string(),
            },
            (Some(message), _) if !message.trim().is_empty() => RejectionReason::Other {
                message: message.to_string(),
            },
            _ => RejectionReason::Unspecified,
        }
    }
}
