//! Cart snapshot embedded in checkout session metadata.
//!
//! Unit prices are captured when the session is created and read back
//! verbatim when payment confirms, so product edits between checkout start
//! and confirmation never change what the customer is charged.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;

pub const METADATA_CART_KEY: &str = "cart_data";
pub const METADATA_USER_KEY: &str = "user_id";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: Uuid,
    pub quantity: i32,
    /// Effective unit price at session-creation time, minor units.
    pub price: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_color: Option<String>,
}

impl CartLine {
    pub fn line_total(&self) -> i64 {
        self.price * i64::from(self.quantity)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartSnapshot {
    pub lines: Vec<CartLine>,
}

impl CartSnapshot {
    pub fn new(lines: Vec<CartLine>) -> Self {
        Self { lines }
    }

    pub fn items_total(&self) -> i64 {
        self.lines.iter().map(CartLine::line_total).sum()
    }

    pub fn total_with_shipping(&self, shipping_fee: i64) -> i64 {
        self.items_total() + shipping_fee
    }

    /// Serialized form stored under the session's `cart_data` metadata key.
    pub fn to_metadata(&self) -> Result<String, ApiError> {
        serde_json::to_string(&self.lines)
            .map_err(|e| ApiError::Validation(format!("Cart snapshot failed to serialize: {e}")))
    }

    /// Parses the metadata back. A missing, malformed, or empty snapshot is
    /// a validation error; the reconciler must not create a partial order
    /// from it.
    pub fn from_metadata(raw: &str) -> Result<Self, ApiError> {
        let lines: Vec<CartLine> = serde_json::from_str(raw)
            .map_err(|e| ApiError::Validation(format!("Malformed cart metadata: {e}")))?;
        if lines.is_empty() {
            return Err(ApiError::Validation("Cart metadata is empty".into()));
        }
        for line in &lines {
            if line.quantity <= 0 {
                return Err(ApiError::Validation(format!(
                    "Cart line for product {} has non-positive quantity",
                    line.product_id
                )));
            }
            if line.price < 0 {
                return Err(ApiError::Validation(format!(
                    "Cart line for product {} has negative price",
                    line.product_id
                )));
            }
        }
        Ok(Self { lines })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(price: i64, quantity: i32) -> CartLine {
        CartLine {
            product_id: Uuid::now_v7(),
            quantity,
            price,
            selected_size: Some("M".into()),
            selected_color: None,
        }
    }

    #[test]
    fn metadata_round_trip() {
        let snapshot = CartSnapshot::new(vec![line(1250, 2), line(400, 1)]);
        let raw = snapshot.to_metadata().unwrap();
        assert_eq!(CartSnapshot::from_metadata(&raw).unwrap(), snapshot);
    }

    #[test]
    fn snapshotted_price_survives_product_edits() {
        // The snapshot was taken when the product cost 1250; by the time the
        // payment confirms the live price is irrelevant.
        let snapshot = CartSnapshot::new(vec![line(1250, 2)]);
        let raw = snapshot.to_metadata().unwrap();

        let live_product_price = 9999_i64;
        let parsed = CartSnapshot::from_metadata(&raw).unwrap();
        assert_eq!(parsed.lines[0].price, 1250);
        assert_ne!(parsed.lines[0].price, live_product_price);
    }

    #[test]
    fn totals_include_flat_shipping() {
        let snapshot = CartSnapshot::new(vec![line(1250, 2), line(400, 1)]);
        assert_eq!(snapshot.items_total(), 2900);
        assert_eq!(snapshot.total_with_shipping(500), 3400);
    }

    #[test]
    fn malformed_metadata_is_rejected() {
        assert!(CartSnapshot::from_metadata("not json").is_err());
        assert!(CartSnapshot::from_metadata("{\"product_id\": 1}").is_err());
    }

    #[test]
    fn empty_snapshot_is_rejected() {
        assert!(CartSnapshot::from_metadata("[]").is_err());
    }

    #[test]
    fn non_positive_quantities_are_rejected() {
        let snapshot = CartSnapshot::new(vec![line(1250, 0)]);
        let raw = snapshot.to_metadata().unwrap();
        assert!(CartSnapshot::from_metadata(&raw).is_err());
    }
}
