//! Write-only audit sinks.
//!
//! Failures here are reported and swallowed: a lost log line must never
//! abort the operation that produced it.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::Order;

pub struct OrderEvent {
    pub order_id: Uuid,
    pub user_id: Option<Uuid>,
    pub action: &'static str,
    pub order_status: Option<String>,
    pub payment_status: Option<String>,
    pub payment_method: Option<String>,
    pub total_amount: Option<i64>,
    pub description: Option<String>,
    pub previous_value: Option<serde_json::Value>,
    pub new_value: Option<serde_json::Value>,
}

impl OrderEvent {
    pub fn created(order: &Order) -> Self {
        Self {
            order_id: order.id,
            user_id: Some(order.user_id),
            action: "order_created",
            order_status: Some(order.status.clone()),
            payment_status: Some(order.payment_status.clone()),
            payment_method: order.payment_method.clone(),
            total_amount: Some(order.total_amount),
            description: Some(format!("Order {} created", order.order_number)),
            previous_value: None,
            new_value: None,
        }
    }

    pub fn status_changed(order: &Order, from: &str, to: &str, changed_by: Uuid) -> Self {
        Self {
            order_id: order.id,
            user_id: Some(changed_by),
            action: "status_updated",
            order_status: Some(to.to_string()),
            payment_status: Some(order.payment_status.clone()),
            payment_method: order.payment_method.clone(),
            total_amount: Some(order.total_amount),
            description: Some(format!("Order status changed from {from} to {to}")),
            previous_value: Some(serde_json::json!({ "status": from })),
            new_value: Some(serde_json::json!({ "status": to })),
        }
    }
}

pub async fn log_order_event(db: &PgPool, event: OrderEvent) {
    let result = sqlx::query(
        "INSERT INTO order_logs (id, order_id, user_id, action, order_status, payment_status, \
                                 payment_method, total_amount, description, previous_value, new_value) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
    )
    .bind(Uuid::now_v7())
    .bind(event.order_id)
    .bind(event.user_id)
    .bind(event.action)
    .bind(&event.order_status)
    .bind(&event.payment_status)
    .bind(&event.payment_method)
    .bind(event.total_amount)
    .bind(&event.description)
    .bind(&event.previous_value)
    .bind(&event.new_value)
    .execute(db)
    .await;

    if let Err(error) = result {
        tracing::warn!(%error, action = event.action, order_id = %event.order_id, "failed to write order log");
    }
}

pub struct Activity {
    pub user_id: Option<Uuid>,
    pub activity_type: &'static str,
    pub resource_type: Option<&'static str>,
    pub resource_id: Option<String>,
    pub description: String,
}

pub async fn log_activity(db: &PgPool, activity: Activity) {
    let result = sqlx::query(
        "INSERT INTO activity_logs (id, user_id, activity_type, resource_type, resource_id, description) \
         VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(Uuid::now_v7())
    .bind(activity.user_id)
    .bind(activity.activity_type)
    .bind(activity.resource_type)
    .bind(&activity.resource_id)
    .bind(&activity.description)
    .execute(db)
    .await;

    if let Err(error) = result {
        tracing::warn!(%error, activity_type = activity.activity_type, "failed to write activity log");
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct OrderLogRow {
    pub id: Uuid,
    pub order_id: Uuid,
    pub user_id: Option<Uuid>,
    pub action: String,
    pub order_status: Option<String>,
    pub payment_status: Option<String>,
    pub payment_method: Option<String>,
    pub total_amount: Option<i64>,
    pub description: Option<String>,
    pub previous_value: Option<serde_json::Value>,
    pub new_value: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ActivityLogRow {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub activity_type: String,
    pub resource_type: Option<String>,
    pub resource_id: Option<String>,
    pub description: Option<String>,
    pub details: Option<serde_json::Value>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}
