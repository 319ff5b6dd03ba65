use std::fmt;

use serde::{Deserialize, Serialize};

/// Cooldown window agreed with the distribution service.
pub const COOLDOWN_WINDOW_SECS: u64 = 3600;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CouponCode(pub String);

impl CouponCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CouponCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CouponCode {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for CouponCode {
    fn from(value: String) -> Self {
        Self(value)
    }
}
