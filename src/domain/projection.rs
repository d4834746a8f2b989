//! Role-based variant projection.
//!
//! Admins edit stored per-variant capacities, so they see raw rows.
//! Customers see the shared pool: every variant of a product carries the
//! same derived availability, broadcast identically.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::auth::Role;
use crate::domain::stock;
use crate::models::{Product, ProductVariant};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProjectionStrategy {
    AdminView,
    CustomerView,
}

impl ProjectionStrategy {
    /// Selected once per request from the trusted role value.
    pub fn for_role(role: Role) -> Self {
        match role {
            Role::Admin => Self::AdminView,
            Role::Customer | Role::Anonymous => Self::CustomerView,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct VariantView {
    pub id: Uuid,
    pub color: Option<String>,
    pub size: String,
    pub quantity: i32,
    pub available: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiscountView {
    #[serde(rename = "type")]
    pub discount_type: Option<String>,
    pub value: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VoucherView {
    pub code: Option<String>,
    pub discount_type: Option<String>,
    pub discount_value: Option<i64>,
    pub expiry_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductView {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub price: i64,
    pub category: String,
    pub image: Option<String>,
    pub available_stock: i32,
    pub in_stock: bool,
    pub variants: Vec<VariantView>,
    pub discount: Option<DiscountView>,
    pub voucher: Option<VoucherView>,
    pub created_at: DateTime<Utc>,
}

impl ProjectionStrategy {
    /// Builds the response shape for one product. `ordered` is the ledger
    /// sum for this product; availability is computed once here and reused
    /// for the product-level fields and every variant row.
    pub fn project(&self, product: &Product, variants: &[ProductVariant], ordered: i64) -> ProductView {
        let available = stock::available(product.initial_stock, ordered);
        let in_stock = available > 0;

        let variants = variants
            .iter()
            .map(|variant| {
                let quantity = match self {
                    Self::AdminView => variant.quantity,
                    Self::CustomerView => available,
                };
                VariantView {
                    id: variant.id,
                    color: variant.color.clone(),
                    size: variant.size.clone(),
                    quantity,
                    available: in_stock,
                }
            })
            .collect();

        ProductView {
            id: product.id,
            name: product.name.clone(),
            description: product.description.clone(),
            price: product.price,
            category: product.category.clone(),
            image: product.image.clone(),
            available_stock: available,
            in_stock,
            variants,
            discount: product.discount_enabled.then(|| DiscountView {
                discount_type: product.discount_type.clone(),
                value: product.discount_value,
            }),
            voucher: product.voucher_enabled.then(|| VoucherView {
                code: product.voucher_code.clone(),
                discount_type: product.voucher_discount_type.clone(),
                discount_value: product.voucher_discount_value,
                expiry_date: product.voucher_expiry_date,
            }),
            created_at: product.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(initial_stock: i32) -> Product {
        let now = Utc::now();
        Product {
            id: Uuid::now_v7(),
            name: "Classic Blazer".into(),
            description: "Premium blazer".into(),
            price: 125_000,
            category: "Outerwear".into(),
            initial_stock,
            image: None,
            discount_enabled: false,
            discount_type: None,
            discount_value: None,
            voucher_enabled: false,
            voucher_code: None,
            voucher_discount_type: None,
            voucher_discount_value: None,
            voucher_expiry_date: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn variant(product_id: Uuid, color: Option<&str>, size: &str, quantity: i32) -> ProductVariant {
        ProductVariant {
            id: Uuid::now_v7(),
            product_id,
            color: color.map(str::to_string),
            size: size.to_string(),
            quantity,
        }
    }

    #[test]
    fn admin_sees_stored_quantities_customer_sees_the_pool() {
        let product = product(3);
        let variants = vec![variant(product.id, Some("red"), "S", 3)];
        let ordered = 2;

        let admin = ProjectionStrategy::AdminView.project(&product, &variants, ordered);
        assert_eq!(admin.variants[0].quantity, 3);
        assert_eq!(admin.available_stock, 1);

        let customer = ProjectionStrategy::CustomerView.project(&product, &variants, ordered);
        assert_eq!(customer.variants[0].quantity, 1);
        assert!(customer.variants[0].available);
    }

    #[test]
    fn pool_is_broadcast_to_every_variant() {
        let product = product(10);
        let variants = vec![
            variant(product.id, Some("red"), "S", 4),
            variant(product.id, Some("blue"), "M", 6),
            variant(product.id, None, "L", 2),
        ];

        let view = ProjectionStrategy::CustomerView.project(&product, &variants, 3);
        assert!(view.variants.iter().all(|v| v.quantity == 7));
        assert!(view.variants.iter().all(|v| v.available));
    }

    #[test]
    fn depleted_pool_flags_every_variant_unavailable() {
        let product = product(5);
        let variants = vec![
            variant(product.id, Some("red"), "S", 5),
            variant(product.id, Some("blue"), "M", 5),
        ];

        let view = ProjectionStrategy::CustomerView.project(&product, &variants, 8);
        assert_eq!(view.available_stock, 0);
        assert!(!view.in_stock);
        assert!(view.variants.iter().all(|v| v.quantity == 0 && !v.available));
    }

    #[test]
    fn strategy_follows_role() {
        assert_eq!(ProjectionStrategy::for_role(Role::Admin), ProjectionStrategy::AdminView);
        assert_eq!(ProjectionStrategy::for_role(Role::Customer), ProjectionStrategy::CustomerView);
        assert_eq!(ProjectionStrategy::for_role(Role::Anonymous), ProjectionStrategy::CustomerView);
    }

    #[test]
    fn discount_block_only_renders_when_enabled() {
        let mut p = product(1);
        let view = ProjectionStrategy::CustomerView.project(&p, &[], 0);
        assert!(view.discount.is_none());

        p.discount_enabled = true;
        p.discount_type = Some("percentage".into());
        p.discount_value = Some(20);
        let view = ProjectionStrategy::CustomerView.project(&p, &[], 0);
        assert_eq!(view.discount.unwrap().value, Some(20));
    }
}
