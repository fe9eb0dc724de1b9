use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Admin-issued discount code. Reusable for as long as it stays active.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Coupon {
    pub id: Uuid,
    pub code: String,
    pub discount_amount: i64,
    pub is_active: bool,
}

impl Coupon {
    /// Coupon codes are matched exactly after trimming surrounding whitespace.
    pub fn normalize_code(code: &str) -> Option<&str> {
        let code = code.trim();
        (!code.is_empty()).then_some(code)
    }
}
