//! Order routes: the webhook reconciliation trigger, customer order
//! history, and admin order management.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::audit::{self, OrderEvent};
use crate::auth::Identity;
use crate::error::{ApiError, Result};
use crate::models::{Order, OrderStatus};
use crate::reconcile;
use crate::stripe::WebhookEvent;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct OrderItemView {
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_name: Option<String>,
    pub product_image: Option<String>,
    pub quantity: i32,
    pub price: i64,
}

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItemView>,
}

/// Pushed gateway events. Signature verification is the gateway library's
/// concern upstream of this handler; the payload is parsed, not trusted
/// beyond the idempotency guarantees of the reconciler itself.
pub async fn webhook(
    State(state): State<AppState>,
    Json(payload): Json<serde_json::Value>,
) -> Result<Json<serde_json::Value>> {
    let event: WebhookEvent = serde_json::from_value(payload)
        .map_err(|e| ApiError::Validation(format!("Malformed webhook payload: {e}")))?;

    if let Some(session) = event.checkout_session() {
        if session.is_paid() {
            reconcile::reconcile_paid_session(&state, &session).await?;
        }
    }

    Ok(Json(serde_json::json!({ "status": "success" })))
}

pub async fn my_orders(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<Json<Vec<OrderResponse>>> {
    let user_id = identity.require_user()?;
    let orders: Vec<Order> =
        sqlx::query_as("SELECT * FROM orders WHERE user_id = $1 ORDER BY created_at DESC")
            .bind(user_id)
            .fetch_all(&state.db)
            .await?;
    attach_items(&state, orders).await.map(Json)
}

pub async fn get_order(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<Uuid>,
) -> Result<Json<OrderResponse>> {
    let user_id = identity.require_user()?;
    let order: Order = sqlx::query_as("SELECT * FROM orders WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user_id)
        .fetch_optional(&state.db)
        .await?
        .ok_or(ApiError::NotFound("Order"))?;
    let mut responses = attach_items(&state, vec![order]).await?;
    Ok(Json(responses.remove(0)))
}

#[derive(Debug, Deserialize)]
pub struct AdminListParams {
    pub status: Option<String>,
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

pub async fn admin_list_orders(
    State(state): State<AppState>,
    identity: Identity,
    Query(params): Query<AdminListParams>,
) -> Result<Json<Vec<OrderResponse>>> {
    identity.require_admin()?;
    let limit = params.limit.unwrap_or(100).clamp(1, 100);
    let skip = params.skip.unwrap_or(0).max(0);

    let orders: Vec<Order> = sqlx::query_as(
        "SELECT * FROM orders WHERE ($1::text IS NULL OR status = $1) \
         ORDER BY created_at DESC LIMIT $2 OFFSET $3",
    )
    .bind(&params.status)
    .bind(limit)
    .bind(skip)
    .fetch_all(&state.db)
    .await?;
    attach_items(&state, orders).await.map(Json)
}

#[derive(Debug, Deserialize)]
pub struct OrderStatusUpdate {
    pub status: OrderStatus,
}

pub async fn update_order_status(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<Uuid>,
    Json(payload): Json<OrderStatusUpdate>,
) -> Result<Json<serde_json::Value>> {
    let admin_id = identity.require_admin()?;

    let order: Order = sqlx::query_as("SELECT * FROM orders WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .ok_or(ApiError::NotFound("Order"))?;

    // Completed and cancelled orders are immutable except for the audit
    // trail written below.
    if OrderStatus::parse(&order.status).is_some_and(|s| s.is_terminal()) {
        return Err(ApiError::Validation(format!(
            "Order is {} and can no longer change status",
            order.status
        )));
    }

    let previous = order.status.clone();
    let updated: Order = sqlx::query_as(
        "UPDATE orders SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(payload.status.as_str())
    .fetch_one(&state.db)
    .await?;

    audit::log_order_event(
        &state.db,
        OrderEvent::status_changed(&updated, &previous, payload.status.as_str(), admin_id),
    )
    .await;

    Ok(Json(serde_json::json!({
        "message": "Order status updated successfully",
        "status": payload.status.as_str(),
    })))
}

/// Loads line items for a page of orders in one query, joined with the live
/// product for display name and image. Prices always come from the item row,
/// never the product.
async fn attach_items(state: &AppState, orders: Vec<Order>) -> Result<Vec<OrderResponse>> {
    if orders.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();
    let items: Vec<(Uuid, OrderItemView)> = sqlx::query_as::<_, ItemRow>(
        "SELECT oi.id, oi.order_id, oi.product_id, oi.quantity, oi.price, \
                p.name AS product_name, p.image AS product_image \
         FROM order_items oi LEFT JOIN products p ON p.id = oi.product_id \
         WHERE oi.order_id = ANY($1) ORDER BY oi.created_at",
    )
    .bind(&ids)
    .fetch_all(&state.db)
    .await?
    .into_iter()
    .map(|row| {
        (
            row.order_id,
            OrderItemView {
                id: row.id,
                product_id: row.product_id,
                product_name: row.product_name,
                product_image: row.product_image,
                quantity: row.quantity,
                price: row.price,
            },
        )
    })
    .collect();

    let mut grouped: std::collections::HashMap<Uuid, Vec<OrderItemView>> =
        std::collections::HashMap::new();
    for (order_id, item) in items {
        grouped.entry(order_id).or_default().push(item);
    }

    Ok(orders
        .into_iter()
        .map(|order| {
            let items = grouped.remove(&order.id).unwrap_or_default();
            OrderResponse { order, items }
        })
        .collect())
}

#[derive(sqlx::FromRow)]
struct ItemRow {
    id: Uuid,
    order_id: Uuid,
    product_id: Uuid,
    quantity: i32,
    price: i64,
    product_name: Option<String>,
    product_image: Option<String>,
}
