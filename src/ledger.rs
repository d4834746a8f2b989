//! Read side of the order ledger.
//!
//! Orders and their items are the source of truth for stock committed
//! against a product. These queries always hit the base tables; availability
//! is never cached or stored.

use std::collections::HashMap;

use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::stock;
use crate::error::Result;
use crate::models::Product;

/// Total quantity ever ordered for one product, across all order statuses.
pub async fn ordered_sum(db: &PgPool, product_id: Uuid) -> Result<i64> {
    let (sum,): (i64,) =
        sqlx::query_as("SELECT COALESCE(SUM(quantity), 0) FROM order_items WHERE product_id = $1")
            .bind(product_id)
            .fetch_one(db)
            .await?;
    Ok(sum)
}

/// Batched ledger sums for a page of products. Products with no order items
/// are simply absent from the map.
pub async fn ordered_sums(db: &PgPool, product_ids: &[Uuid]) -> Result<HashMap<Uuid, i64>> {
    if product_ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows: Vec<(Uuid, i64)> = sqlx::query_as(
        "SELECT product_id, COALESCE(SUM(quantity), 0) \
         FROM order_items WHERE product_id = ANY($1) GROUP BY product_id",
    )
    .bind(product_ids)
    .fetch_all(db)
    .await?;
    Ok(rows.into_iter().collect())
}

/// Derived availability for one product.
pub async fn available(db: &PgPool, product: &Product) -> Result<i32> {
    let ordered = ordered_sum(db, product.id).await?;
    Ok(stock::available(product.initial_stock, ordered))
}
